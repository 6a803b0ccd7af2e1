//! Row access used by the filter, search and sort engines.
//!
//! A list row is anything implementing [`Record`]: it exposes a stable
//! [`RowId`] and named attributes. Attributes may be plain JSON values, nested
//! records, or zero-argument getters that are only evaluated when a path
//! actually reaches them. Dotted paths (`"category.name"`) are walked segment by
//! segment with [`resolve_path`].

use serde_json::Value;

/// Stable, unique, orderable row identity.
pub type RowId = i64;

/// One attribute of a [`Record`].
pub enum Attr<'a> {
    Value(Value),
    Record(&'a dyn Record),
    /// Derived attribute, evaluated on demand.
    Getter(Box<dyn Fn() -> Value + 'a>),
}

impl std::fmt::Debug for Attr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Record(r) => f.debug_tuple("Record").field(&r.id()).finish(),
            Self::Getter(_) => f.write_str("Getter(..)"),
        }
    }
}

pub trait Record {
    fn id(&self) -> RowId;

    /// Look up a single (non-dotted) attribute.
    fn attr(&self, name: &str) -> Option<Attr<'_>>;
}

/// JSON objects are records; the id is read from `"id"`.
impl Record for Value {
    fn id(&self) -> RowId {
        self.get("id").and_then(Value::as_i64).unwrap_or_default()
    }

    fn attr(&self, name: &str) -> Option<Attr<'_>> {
        self.get(name).cloned().map(Attr::Value)
    }
}

enum Cursor<'a> {
    Record(&'a dyn Record),
    Value(Value),
}

/// Walk a dotted path on `row`.
///
/// Returns `None` as soon as a segment is missing or lands on `null` before the
/// last segment. A path ending on a nested record resolves to that record's id.
pub fn resolve_path(row: &dyn Record, path: &str) -> Option<Value> {
    let mut cursor = Cursor::Record(row);
    for segment in path.split('.') {
        cursor = match cursor {
            Cursor::Record(record) => match record.attr(segment)? {
                Attr::Value(value) => Cursor::Value(value),
                Attr::Record(child) => Cursor::Record(child),
                Attr::Getter(getter) => Cursor::Value(getter()),
            },
            Cursor::Value(value) => Cursor::Value(value.get(segment)?.clone()),
        };
    }
    Some(match cursor {
        Cursor::Record(record) => Value::from(record.id()),
        Cursor::Value(value) => value,
    })
}

/// Search-style stringification: arrays and object values are concatenated
/// without separator, `null` becomes the empty string. Object keys never
/// contribute.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(stringify).collect(),
        Value::Object(fields) => fields.values().map(stringify).collect(),
    }
}

/// `null`, `""` and `[]` count as "no value". `false` and `0` are values.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Equality that treats `1` and `1.0` as the same number.
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Category {
        id: RowId,
        name: String,
    }

    impl Record for Category {
        fn id(&self) -> RowId {
            self.id
        }

        fn attr(&self, name: &str) -> Option<Attr<'_>> {
            match name {
                "name" => Some(Attr::Value(json!(self.name))),
                _ => None,
            }
        }
    }

    struct Motion {
        id: RowId,
        number: &'static str,
        category: Option<Category>,
    }

    impl Record for Motion {
        fn id(&self) -> RowId {
            self.id
        }

        fn attr(&self, name: &str) -> Option<Attr<'_>> {
            match name {
                "number" => Some(Attr::Value(json!(self.number))),
                "category" => self.category.as_ref().map(|c| Attr::Record(c as &dyn Record)),
                "label" => Some(Attr::Getter(Box::new(move || {
                    json!(format!("Motion {}", self.number))
                }))),
                _ => None,
            }
        }
    }

    #[test]
    fn json_rows_resolve_nested_paths() {
        let row = json!({"id": 4, "user": {"name": "Ada", "tags": ["a", "b"]}});
        assert_eq!(row.id(), 4);
        assert_eq!(resolve_path(&row, "user.name"), Some(json!("Ada")));
        assert_eq!(resolve_path(&row, "user.missing"), None);
        assert_eq!(resolve_path(&row, "nope.name"), None);
    }

    #[test]
    fn null_mid_path_stops_the_walk() {
        let row = json!({"id": 1, "user": null});
        assert_eq!(resolve_path(&row, "user"), Some(Value::Null));
        assert_eq!(resolve_path(&row, "user.name"), None);
    }

    #[test]
    fn nested_records_and_getters() {
        let motion = Motion {
            id: 7,
            number: "A1",
            category: Some(Category {
                id: 3,
                name: "Finance".into(),
            }),
        };
        assert_eq!(resolve_path(&motion, "category.name"), Some(json!("Finance")));
        assert_eq!(resolve_path(&motion, "category"), Some(json!(3)));
        assert_eq!(resolve_path(&motion, "label"), Some(json!("Motion A1")));

        let orphan = Motion {
            id: 8,
            number: "A2",
            category: None,
        };
        assert_eq!(resolve_path(&orphan, "category.name"), None);
    }

    #[test]
    fn stringify_joins_arrays_without_separator() {
        assert_eq!(stringify(&json!(["ab", "cd", 1])), "abcd1");
        assert_eq!(stringify(&Value::Null), "");
        assert_eq!(stringify(&json!(false)), "false");
        assert_eq!(stringify(&json!({"name": "Ada", "tags": ["x"], "n": null})), "Adax");
        assert_eq!(stringify(&json!([{"name": "Ada"}, "b"])), "Adab");
    }

    #[test]
    fn emptiness_and_loose_equality() {
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!([])));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
        assert!(loosely_equal(&json!(1), &json!(1.0)));
        assert!(!loosely_equal(&json!(1), &json!("1")));
    }
}
