use meeting_lists::filter::{DefaultDefinitions, FilterDefinition, FilterEngine, FilterOption};
use meeting_lists::record::Record;
use meeting_lists::storage::{FilterStorage, ModeGate};
use serde_json::{Value, json};
use std::sync::Arc;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Participant rows as the server would deliver them.
#[allow(dead_code)]
pub fn participants() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "Apple", "active": true, "group_ids": [1, 2], "is_present": true}),
        json!({"id": 2, "name": "Banana", "active": false, "group_ids": [2], "is_present": false}),
        json!({"id": 3, "name": "Cherry", "active": true, "group_ids": [], "is_present": null}),
        json!({"id": 4, "name": "Date", "group_ids": [3]}),
    ]
}

/// Definitions for the participant list: activity, groups and presence.
#[allow(dead_code)]
pub fn participant_definitions() -> Vec<FilterDefinition> {
    vec![
        FilterDefinition::new("active", "Active")
            .with_options(vec![FilterOption::new(json!(true), "Active").into()]),
        FilterDefinition::new("group_ids", "Groups").with_options(vec![
            FilterOption::new(json!(1), "Admin").into(),
            FilterOption::new(json!(2), "Delegates").into(),
            FilterOption::new(json!(3), "Guests").into(),
        ]),
        FilterDefinition::new("is_present", "Presence").with_options(vec![
            FilterOption::new(json!(true), "Present").into(),
            FilterOption::new(json!([false, null]), "Absent").into(),
        ]),
    ]
}

#[allow(dead_code)]
pub fn participant_filter(
    storage: Arc<dyn FilterStorage>,
    gate: Arc<dyn ModeGate>,
) -> Arc<FilterEngine<Value>> {
    Arc::new(FilterEngine::new(
        "participants",
        storage,
        gate,
        Arc::new(DefaultDefinitions(participant_definitions)),
    ))
}

#[allow(dead_code)]
pub fn ids<V: Record>(rows: &[V]) -> Vec<i64> {
    rows.iter().map(Record::id).collect()
}
