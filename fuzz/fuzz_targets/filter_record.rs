//! Fuzz target for persisted filter records.
//!
//! Whatever a previous version (or a corrupted store) left under
//! `filter_<view>`, parsing must either reject it or yield definitions that
//! can be applied to rows and written back without panicking.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::{Value, json};

use meeting_lists::filter::{apply_definitions, compute_stack, parse_persisted};

#[derive(Arbitrary, Debug)]
struct RecordInput {
    /// Raw JSON of the stored record
    json_content: String,
    /// Field values for the probe rows
    values: Vec<(String, Option<i64>, bool)>,
}

fuzz_target!(|input: RecordInput| {
    let Ok(raw) = serde_json::from_str::<Value>(&input.json_content) else {
        return;
    };
    let Some(definitions) = parse_persisted(raw) else {
        return;
    };

    let rows: Vec<Value> = input
        .values
        .iter()
        .enumerate()
        .take(64)
        .map(|(id, (name, number, flag))| {
            json!({"id": id, "name": name, "number": number, "active": flag, "tags": [number]})
        })
        .collect();

    let filtered = apply_definitions(&definitions, &rows);
    assert!(filtered.len() <= rows.len());
    let _ = compute_stack(&definitions);

    // Written records must parse back.
    let written = serde_json::to_value(&definitions).expect("definitions serialize");
    assert!(parse_persisted(written).is_some());
});
