//! Filter options populated from another live collection (groups, categories,
//! tags, ...).

use super::types::{FilterEntry, FilterOption};
use serde_json::Value;

/// Item of a live collection that can back a filter option.
pub trait OptionSource {
    /// Becomes the option's condition.
    fn option_id(&self) -> Value;

    fn title(&self) -> String;

    /// Hierarchical children (e.g. sub-categories). Flat collections keep the
    /// default.
    fn children(&self) -> &[Self]
    where
        Self: Sized,
    {
        &[]
    }
}

/// Optional row predicate applied to live items before they become options.
pub type ItemPredicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Separator inserted before the "no value" option.
pub const NONE_OPTION_SEPARATOR: &str = "-";

pub(crate) fn option_for_item<T: OptionSource>(item: &T) -> FilterOption {
    let children: Vec<FilterOption> = item.children().iter().map(option_for_item).collect();
    FilterOption::new(item.option_id(), item.title()).with_children(children)
}

/// Map live items to an options list, optionally followed by a separator and a
/// `condition: null` option labelled `none_option_label`.
pub fn options_from_items<T: OptionSource>(
    items: &[T],
    predicate: Option<&ItemPredicate<T>>,
    none_option_label: Option<&str>,
) -> Vec<FilterEntry> {
    let mut options: Vec<FilterEntry> = items
        .iter()
        .filter(|item| predicate.is_none_or(|keep| keep(*item)))
        .map(|item| FilterEntry::Choice(option_for_item(item)))
        .collect();
    if let Some(label) = none_option_label {
        options.push(FilterEntry::Separator(NONE_OPTION_SEPARATOR.to_string()));
        options.push(FilterEntry::Choice(FilterOption::new(Value::Null, label)));
    }
    options
}
