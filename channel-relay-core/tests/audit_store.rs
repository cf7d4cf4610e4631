use channel_relay_core::audit::AuditStore;
use channel_relay_core::contract::AuditRecord;
use channel_relay_core::error::PersistenceError;
use tempfile::tempdir;

fn record(id: i64, text: &str, caption: &str) -> AuditRecord {
    AuditRecord {
        telegram_id: id,
        original_text: text.to_string(),
        translated_caption: caption.to_string(),
        fb_status: "Posted".to_string(),
        date_posted: "2025-01-02 03:04:05".to_string(),
    }
}

#[test]
fn missing_log_yields_empty_dedup_set() {
    let dir = tempdir().unwrap();
    let store = AuditStore::new(dir.path().join("results.json"));
    assert!(store.load_dedup_keys().is_empty());
}

#[test]
fn malformed_log_yields_empty_dedup_set() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.json");
    std::fs::write(&path, "{ not json").unwrap();
    let store = AuditStore::new(&path);

    assert!(store.load_dedup_keys().is_empty());
    assert!(matches!(
        store.read_records(),
        Err(PersistenceError::Malformed { .. })
    ));
}

#[test]
fn dedup_keys_are_trimmed_original_texts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.json");
    let store = AuditStore::new(&path);
    store
        .append(&[
            record(1, "  first post here \n", "a"),
            record(2, "second post here", "b"),
            record(3, "   ", "blank"),
        ])
        .unwrap();

    let keys = store.load_dedup_keys();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains("first post here"));
    assert!(keys.contains("second post here"));
}

#[test]
fn append_keeps_existing_records_first_in_order() {
    let dir = tempdir().unwrap();
    let store = AuditStore::new(dir.path().join("results.json"));
    store.append(&[record(1, "one one one", "1")]).unwrap();
    store
        .append(&[record(3, "three three three", "3"), record(2, "two two two", "2")])
        .unwrap();

    let ids: Vec<i64> = store
        .read_records()
        .unwrap()
        .iter()
        .map(|r| r.telegram_id)
        .collect();
    assert_eq!(ids, vec![1, 3, 2]);
}

#[test]
fn append_over_corrupt_log_starts_from_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.json");
    std::fs::write(&path, "[{\"telegram_id\": ").unwrap();
    let store = AuditStore::new(&path);

    store.append(&[record(9, "fresh start here", "x")]).unwrap();

    let records = store.read_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].telegram_id, 9);
}

#[test]
fn log_is_pretty_printed_and_keeps_non_ascii() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.json");
    let store = AuditStore::new(&path);
    store
        .append(&[record(5, "café déjà vu ✨", "Selamat pagi semua ✨")])
        .unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("Selamat pagi semua ✨"));
    assert!(raw.contains("café déjà vu ✨"));
    assert!(raw.contains("\n  {\n    \"telegram_id\": 5,"));
    assert!(raw.contains("\"fb_status\": \"Posted\""));
    assert!(raw.contains("\"date_posted\": \"2025-01-02 03:04:05\""));
}

#[test]
fn append_into_missing_directory_is_an_error() {
    let dir = tempdir().unwrap();
    let store = AuditStore::new(dir.path().join("no-such-dir").join("results.json"));
    let result = store.append(&[record(1, "one one one", "1")]);
    assert!(matches!(result, Err(PersistenceError::Io { .. })));
}

#[test]
fn incomplete_entries_keep_their_dedup_keys_and_survive_append() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.json");
    std::fs::write(
        &path,
        r#"[
  {"telegram_id": 1, "original_text": "first post here", "translated_caption": "a", "fb_status": "Posted", "date_posted": "2025-01-01 00:00:00"},
  {"telegram_id": 2, "original_text": "second post here", "translated_caption": "b", "note": "legacy"},
  {"telegram_id": 3, "translated_caption": "no text at all"}
]"#,
    )
    .unwrap();
    let store = AuditStore::new(&path);

    let keys = store.load_dedup_keys();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains("first post here"));
    assert!(keys.contains("second post here"));

    store.append(&[record(4, "fourth post here", "d")]).unwrap();

    let entries = store.read_entries().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[1]["note"], "legacy");
    assert!(entries[1].get("fb_status").is_none());
    assert_eq!(entries[2]["translated_caption"], "no text at all");
    assert_eq!(entries[3]["telegram_id"], 4);

    let typed: Vec<i64> = store
        .read_records()
        .unwrap()
        .iter()
        .map(|r| r.telegram_id)
        .collect();
    assert_eq!(typed, vec![1, 4]);
}

#[test]
fn non_array_log_counts_as_malformed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.json");
    std::fs::write(&path, r#"{"original_text": "not a list"}"#).unwrap();
    let store = AuditStore::new(&path);

    assert!(store.load_dedup_keys().is_empty());
    assert!(matches!(
        store.read_entries(),
        Err(PersistenceError::Malformed { .. })
    ));
}
