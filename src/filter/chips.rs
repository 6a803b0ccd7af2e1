//! Removable filter chips rendered from the active filter stack.

use super::types::{ActiveFilter, Condition};

#[derive(Clone, Debug, PartialEq)]
pub struct FilterChip {
    /// Dimension label, e.g. "Groups".
    pub label: String,
    /// Option label, e.g. "Delegates".
    pub value: String,
    pub property: String,
    /// Condition to pass back to `toggle_filter_option` when the chip is removed.
    pub condition: Condition,
    pub active: bool,
}

impl From<&ActiveFilter> for FilterChip {
    fn from(filter: &ActiveFilter) -> Self {
        Self {
            label: filter.definition_label.clone(),
            value: filter.option.label.clone(),
            property: filter.property.clone(),
            condition: filter.option.condition.clone(),
            active: filter.option.is_active,
        }
    }
}

impl std::fmt::Display for FilterChip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.label, self.value)
    }
}
