//! In-memory attendance roster.
//!
//! Records keep the order the roster endpoint returned them in; an id index
//! gives constant-time lookup for streamed events.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AttendanceStatus {
    #[default]
    Absent,
    Present,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "Absent",
            Self::Present => "Present",
        }
    }
}

/// One tracked individual, as served by the roster endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Biometric sensor id
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "class", default)]
    pub group: String,
    #[serde(rename = "section", default)]
    pub subgroup: String,
    #[serde(default)]
    pub status: AttendanceStatus,
    /// Time of day of the last presence event, only set once Present
    #[serde(rename = "time", default, skip_serializing_if = "Option::is_none")]
    pub last_event_time: Option<String>,
}

impl EntityRecord {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        group: impl Into<String>,
        subgroup: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            group: group.into(),
            subgroup: subgroup.into(),
            status: AttendanceStatus::Absent,
            last_event_time: None,
        }
    }

    pub fn is_present(&self) -> bool {
        self.status == AttendanceStatus::Present
    }
}

/// Accept ids as JSON strings or numbers; sensor firmware emits both.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or number id, got {}",
            other
        ))),
    }
}

#[derive(Debug, Default, Clone)]
pub struct EntityStore {
    records: Vec<EntityRecord>,
    index: HashMap<String, usize>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole content with a fresh snapshot.
    ///
    /// Ids must be unique; a repeated id keeps its first record and the
    /// duplicate is dropped with a warning. Returns the number of records kept.
    pub fn replace_all(&mut self, records: Vec<EntityRecord>) -> usize {
        self.records.clear();
        self.index.clear();

        for record in records {
            if self.index.contains_key(&record.id) {
                warn!("Duplicate id '{}' in roster snapshot, keeping first", record.id);
                continue;
            }
            self.index.insert(record.id.clone(), self.records.len());
            self.records.push(record);
        }

        self.records.len()
    }

    pub fn get(&self, id: &str) -> Option<&EntityRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Mark an existing record Present at `time`. Unknown ids are left alone
    /// and yield `None`; the store never grows from streamed events.
    pub fn mark_present(&mut self, id: &str, time: &str) -> Option<&EntityRecord> {
        let &i = self.index.get(id)?;
        let record = &mut self.records[i];
        record.status = AttendanceStatus::Present;
        record.last_event_time = Some(time.to_string());
        Some(&*record)
    }

    /// Records in roster order
    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn present_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_present()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<EntityRecord> {
        vec![
            EntityRecord::new("F1", "Alice", "10", "A"),
            EntityRecord::new("F2", "Bob", "10", "B"),
        ]
    }

    #[test]
    fn replace_all_is_a_full_replace() {
        let mut store = EntityStore::new();
        store.replace_all(roster());
        store.mark_present("F1", "09:00:00");

        let kept = store.replace_all(vec![EntityRecord::new("F3", "Carol", "11", "A")]);
        assert_eq!(kept, 1);
        assert!(store.get("F1").is_none());
        assert!(store.get("F3").is_some());
    }

    #[test]
    fn duplicate_ids_keep_first_record() {
        let mut store = EntityStore::new();
        let kept = store.replace_all(vec![
            EntityRecord::new("F1", "Alice", "10", "A"),
            EntityRecord::new("F1", "Impostor", "12", "C"),
            EntityRecord::new("F2", "Bob", "10", "B"),
        ]);
        assert_eq!(kept, 2);
        assert_eq!(store.get("F1").unwrap().display_name, "Alice");
        assert_eq!(store.records()[1].id, "F2");
    }

    #[test]
    fn mark_present_sets_status_and_time() {
        let mut store = EntityStore::new();
        store.replace_all(roster());

        let record = store.mark_present("F2", "08:15:00").expect("known id");
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.last_event_time.as_deref(), Some("08:15:00"));
        assert_eq!(record.display_name, "Bob");

        let untouched = store.get("F1").unwrap();
        assert_eq!(untouched.status, AttendanceStatus::Absent);
        assert!(untouched.last_event_time.is_none());
        assert_eq!(store.present_count(), 1);
    }

    #[test]
    fn mark_present_ignores_unknown_ids() {
        let mut store = EntityStore::new();
        store.replace_all(roster());
        let before = store.records().to_vec();

        assert!(store.mark_present("F9", "08:15:00").is_none());
        assert_eq!(store.records(), before.as_slice());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn roster_json_uses_wire_names() {
        let json = r#"[
            {"id": "F1", "name": "Alice", "class": "10", "section": "A", "status": "Absent"},
            {"id": 42, "name": "Dan", "class": "11", "section": "B"}
        ]"#;
        let records: Vec<EntityRecord> = serde_json::from_str(json).expect("parse roster");

        assert_eq!(records[0].display_name, "Alice");
        assert_eq!(records[0].group, "10");
        assert_eq!(records[0].subgroup, "A");
        assert_eq!(records[1].id, "42");
        assert_eq!(records[1].status, AttendanceStatus::Absent);
        assert!(records[1].last_event_time.is_none());
    }

    #[test]
    fn roster_rejects_structured_ids() {
        let json = r#"[{"id": {"nested": true}, "name": "X"}]"#;
        assert!(serde_json::from_str::<Vec<EntityRecord>>(json).is_err());
    }
}
