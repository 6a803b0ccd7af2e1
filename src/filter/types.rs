//! Filter definitions and their persisted JSON shape.

use crate::record::loosely_equal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What an option compares the row's property against.
///
/// An array condition means "any of these", which is how a single option
/// expresses e.g. "is false or unset" (`[false, null]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    AnyOf(Vec<Value>),
    Value(Value),
}

impl Default for Condition {
    fn default() -> Self {
        Self::Value(Value::Null)
    }
}

impl Condition {
    pub fn null() -> Self {
        Self::Value(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Value(Value::Null))
    }

    /// Does a row whose property resolved to `actual` satisfy this condition?
    /// `None` means the property is absent on the row.
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        match self {
            Self::AnyOf(alternatives) => alternatives
                .iter()
                .any(|alt| scalar_matches(alt, actual)),
            Self::Value(expected) => scalar_matches(expected, actual),
        }
    }
}

impl From<Value> for Condition {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::AnyOf(items),
            other => Self::Value(other),
        }
    }
}

fn scalar_matches(expected: &Value, actual: Option<&Value>) -> bool {
    match actual {
        None | Some(Value::Null) => matches!(expected, Value::Null | Value::Bool(false)),
        Some(Value::Array(items)) => {
            if expected.is_null() {
                items.is_empty()
            } else {
                items.iter().any(|item| loosely_equal(item, expected))
            }
        }
        Some(value) => loosely_equal(value, expected),
    }
}

/// One selectable choice within a filter dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOption {
    #[serde(default)]
    pub condition: Condition,
    pub label: String,
    #[serde(default)]
    pub is_active: bool,
    /// Number of current rows matching this option on its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Sub-options sharing the parent's property.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FilterOption>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_child: bool,
}

impl FilterOption {
    pub fn new(condition: impl Into<Condition>, label: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            label: label.into(),
            is_active: false,
            count: None,
            children: Vec::new(),
            is_child: false,
        }
    }

    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }

    pub fn with_children(mut self, children: Vec<FilterOption>) -> Self {
        self.children = children
            .into_iter()
            .map(|mut child| {
                child.is_child = true;
                child
            })
            .collect();
        self
    }

    /// This option followed by all of its descendants, depth first.
    pub fn flatten(&self) -> Vec<&FilterOption> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }

    fn visit_mut(&mut self, f: &mut impl FnMut(&mut FilterOption)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }
}

impl From<Condition> for Value {
    fn from(condition: Condition) -> Self {
        match condition {
            Condition::AnyOf(items) => Value::Array(items),
            Condition::Value(v) => v,
        }
    }
}

/// An entry in an options list: a visual separator or a real option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterEntry {
    Separator(String),
    Choice(FilterOption),
}

impl FilterEntry {
    pub fn as_option(&self) -> Option<&FilterOption> {
        match self {
            Self::Choice(option) => Some(option),
            Self::Separator(_) => None,
        }
    }
}

impl From<FilterOption> for FilterEntry {
    fn from(option: FilterOption) -> Self {
        Self::Choice(option)
    }
}

/// One filterable dimension of a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    /// Field name or dotted path examined on each row.
    pub property: String,
    pub label: String,
    pub options: Vec<FilterEntry>,
    /// Number of active options, for badge display.
    #[serde(default)]
    pub count: usize,
}

impl FilterDefinition {
    pub fn new(property: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            label: label.into(),
            options: Vec::new(),
            count: 0,
        }
    }

    pub fn with_options(mut self, options: Vec<FilterEntry>) -> Self {
        self.options = options;
        self.update_count();
        self
    }

    /// Every option (children included), separators skipped.
    pub fn all_options(&self) -> Vec<&FilterOption> {
        self.options
            .iter()
            .filter_map(FilterEntry::as_option)
            .flat_map(FilterOption::flatten)
            .collect()
    }

    pub fn active_options(&self) -> Vec<&FilterOption> {
        self.all_options()
            .into_iter()
            .filter(|option| option.is_active)
            .collect()
    }

    pub fn has_active(&self) -> bool {
        self.all_options().iter().any(|option| option.is_active)
    }

    /// Apply `f` to every option, children included.
    pub fn for_each_option_mut(&mut self, mut f: impl FnMut(&mut FilterOption)) {
        for entry in &mut self.options {
            if let FilterEntry::Choice(option) = entry {
                option.visit_mut(&mut f);
            }
        }
    }

    pub fn update_count(&mut self) {
        self.count = self.active_options().len();
    }
}

/// One active `(definition, option)` pair of the filter stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveFilter {
    pub property: String,
    pub definition_label: String,
    pub option: FilterOption,
}

/// Parse a persisted filter record. `None` when the value is not an array of
/// objects each carrying `property`, `label` and `options`.
pub fn parse_persisted(raw: Value) -> Option<Vec<FilterDefinition>> {
    let items = raw.as_array()?;
    let shape_ok = items.iter().all(|item| {
        item.as_object().is_some_and(|obj| {
            obj.get("property").is_some_and(Value::is_string)
                && obj.get("label").is_some_and(Value::is_string)
                && obj.get("options").is_some_and(Value::is_array)
        })
    });
    if !shape_ok {
        return None;
    }
    serde_json::from_value(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn any_of_false_or_null_matches_only_falsy_unset() {
        let cond = Condition::AnyOf(vec![json!(false), Value::Null]);
        assert!(cond.matches(Some(&json!(false))));
        assert!(cond.matches(Some(&Value::Null)));
        assert!(cond.matches(None));
        assert!(!cond.matches(Some(&json!(true))));
        assert!(!cond.matches(Some(&json!(0))));
        assert!(!cond.matches(Some(&json!(""))));
    }

    #[test]
    fn scalar_and_null_conditions() {
        assert!(Condition::from(json!(true)).matches(Some(&json!(true))));
        assert!(!Condition::from(json!(true)).matches(None));
        assert!(Condition::null().matches(None));
        assert!(Condition::from(json!(false)).matches(None));
        assert!(Condition::from(json!(3)).matches(Some(&json!(3.0))));
    }

    #[test]
    fn array_row_values_contain_condition() {
        let groups = json!([2, 5]);
        assert!(Condition::from(json!(5)).matches(Some(&groups)));
        assert!(!Condition::from(json!(4)).matches(Some(&groups)));
        assert!(Condition::null().matches(Some(&json!([]))));
        assert!(!Condition::null().matches(Some(&groups)));
    }

    #[test]
    fn entries_deserialize_separators_and_options() {
        let raw = json!([
            {"condition": 1, "label": "Delegates", "isActive": true},
            "-",
            {"condition": null, "label": "No group"}
        ]);
        let entries: Vec<FilterEntry> = serde_json::from_value(raw).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[1], FilterEntry::Separator(ref s) if s == "-"));
        let first = entries[0].as_option().unwrap();
        assert!(first.is_active);
        assert_eq!(first.condition, Condition::Value(json!(1)));
        assert!(entries[2].as_option().unwrap().condition.is_null());
    }

    #[test]
    fn children_are_flattened_and_counted() {
        let def = FilterDefinition::new("category_id", "Category").with_options(vec![
            FilterOption::new(json!(1), "Budget")
                .with_children(vec![FilterOption::new(json!(2), "Taxes").active()])
                .into(),
        ]);
        assert_eq!(def.all_options().len(), 2);
        assert!(def.all_options()[1].is_child);
        assert_eq!(def.count, 1);
        assert!(def.has_active());
    }

    #[test]
    fn persisted_shape_check() {
        let good = json!([{"property": "a", "label": "A", "options": []}]);
        assert_eq!(parse_persisted(good).unwrap().len(), 1);

        assert!(parse_persisted(json!({"property": "a"})).is_none());
        assert!(parse_persisted(json!([{"property": "a", "label": "A"}])).is_none());
        assert!(parse_persisted(json!([{"property": 1, "label": "A", "options": []}])).is_none());
        assert!(parse_persisted(json!(["a"])).is_none());
    }

    #[test]
    fn persisted_option_shape_is_camel_case() {
        let def = FilterDefinition::new("active", "Active")
            .with_options(vec![FilterOption::new(json!(true), "Active").active().into()]);
        insta::assert_json_snapshot!(def, @r#"
        {
          "property": "active",
          "label": "Active",
          "options": [
            {
              "condition": true,
              "label": "Active",
              "isActive": true
            }
          ],
          "count": 1
        }
        "#);
    }
}
