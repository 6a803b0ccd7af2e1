//! Property tests for the sort comparator.

use meeting_lists::sort::{SortDefinition, SortEngine, compare_values};
use meeting_lists::storage::{AlwaysLive, MemoryStorage};
use proptest::prelude::*;
use serde_json::{Value, json};
use std::cmp::Ordering;
use std::sync::Arc;

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-20i64..20).prop_map(Value::from),
        (-20.0f64..20.0).prop_map(|n| json!(n)),
        (0u32..30).prop_map(|n| Value::from(n.to_string())),
        "[a-cA-C0-9]{0,3}".prop_map(Value::from),
    ]
}

fn mixed_value() -> impl Strategy<Value = Option<Value>> {
    prop::option::of(prop_oneof![
        4 => leaf(),
        1 => prop::collection::vec(leaf(), 0..3).prop_map(Value::from),
        1 => leaf().prop_map(|v| json!({"name": v})),
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn comparator_is_antisymmetric(a in mixed_value(), b in mixed_value()) {
        prop_assert_eq!(
            compare_values(a.as_ref(), b.as_ref()),
            compare_values(b.as_ref(), a.as_ref()).reverse()
        );
    }

    #[test]
    fn comparator_is_transitive(a in mixed_value(), b in mixed_value(), c in mixed_value()) {
        let ab = compare_values(a.as_ref(), b.as_ref());
        let bc = compare_values(b.as_ref(), c.as_ref());
        let ac = compare_values(a.as_ref(), c.as_ref());
        if ab != Ordering::Greater && bc != Ordering::Greater {
            prop_assert_ne!(ac, Ordering::Greater);
        }
        if ab == Ordering::Equal && bc == Ordering::Equal {
            prop_assert_eq!(ac, Ordering::Equal);
        }
    }

    #[test]
    fn mixed_number_column_sorts_in_order(
        numbers in prop::collection::vec((0u32..100, any::<bool>()), 2..64),
        ascending in any::<bool>(),
    ) {
        let definition = if ascending {
            SortDefinition::ascending("number")
        } else {
            SortDefinition::descending("number")
        };
        let sort: SortEngine<Value> = SortEngine::new(
            "motions",
            definition,
            Arc::new(MemoryStorage::new()),
            Arc::new(AlwaysLive),
        );
        let rows: Vec<Value> = numbers
            .iter()
            .enumerate()
            .map(|(id, (n, as_text))| {
                let number = if *as_text { json!(n.to_string()) } else { json!(n) };
                json!({"id": id, "number": number})
            })
            .collect();

        let sorted = sort.sort_rows(&rows);
        prop_assert_eq!(sorted.len(), rows.len());
        for pair in sorted.windows(2) {
            let ord = compare_values(pair[0].get("number"), pair[1].get("number"));
            let expected_bad = if ascending { Ordering::Greater } else { Ordering::Less };
            prop_assert_ne!(ord, expected_bad);
        }
    }
}
