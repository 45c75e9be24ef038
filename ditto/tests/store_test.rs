use ditto::engine::DelayTable;
use ditto::{CoordLabel, CoordinateSet, CoordinateStore, DittoError, Position};

fn full_set() -> CoordinateSet {
    let mut set = CoordinateSet::new();
    for (i, label) in CoordLabel::ALL.into_iter().enumerate() {
        let i = i as i32;
        set.set(label, Position::new(310 + i, 184 + i));
    }
    set
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = CoordinateStore::new(dir.path().join("coordinates.json"));

    let set = full_set();
    store.save(&set).unwrap();
    let loaded = store.load().unwrap().expect("file should exist");
    assert_eq!(loaded, set);
}

#[test]
fn absent_file_loads_as_unconfigured() {
    let dir = tempfile::tempdir().unwrap();
    let store = CoordinateStore::new(dir.path().join("coordinates.json"));
    assert!(store.load().unwrap().is_none());
}

#[test]
fn partial_sets_persist_too() {
    let dir = tempfile::tempdir().unwrap();
    let store = CoordinateStore::new(dir.path().join("coordinates.json"));

    let mut set = CoordinateSet::new();
    set.set(CoordLabel::LookupButton, Position::new(310, 184));
    store.save(&set).unwrap();

    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(!loaded.is_complete());
    assert_eq!(
        loaded.get(CoordLabel::LookupButton),
        Some(Position::new(310, 184))
    );
}

#[test]
fn save_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let store = CoordinateStore::new(dir.path().join("nested/deeper/coordinates.json"));
    store.save(&full_set()).unwrap();
    assert!(store.load().unwrap().is_some());
}

#[test]
fn corrupt_file_is_reported_with_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coordinates.json");
    std::fs::write(&path, "not json at all").unwrap();

    let store = CoordinateStore::new(&path);
    let err = store.load().unwrap_err();
    match err {
        DittoError::Corrupt { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn file_is_a_flat_label_keyed_object() {
    let dir = tempfile::tempdir().unwrap();
    let store = CoordinateStore::new(dir.path().join("coordinates.json"));
    store.save(&full_set()).unwrap();

    let text = std::fs::read_to_string(store.path()).unwrap();
    // Pretty-printed for hand editing.
    assert!(text.contains('\n'));

    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 6);
    for label in CoordLabel::ALL {
        let pair = object[label.key()].as_array().unwrap();
        assert_eq!(pair.len(), 2);
    }
}

#[test]
fn delay_table_file_overrides_only_named_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("delays.json");
    std::fs::write(&path, r#"{"lookup_ms": 4000, "keystroke_ms": 50}"#).unwrap();

    let table = DelayTable::load_from(&path).unwrap();
    assert_eq!(table.lookup_ms, 4000);
    assert_eq!(table.keystroke_ms, 50);
    assert_eq!(table.action_ms, DelayTable::default().action_ms);
}

#[test]
fn delay_table_missing_file_is_a_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DelayTable::load_from(dir.path().join("nowhere.json")).unwrap_err();
    assert!(matches!(err, DittoError::Persistence { .. }));
}

#[test]
fn delay_table_garbage_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("delays.json");
    std::fs::write(&path, r#"{"lookup_ms": "slow"}"#).unwrap();
    let err = DelayTable::load_from(&path).unwrap_err();
    assert!(matches!(err, DittoError::Corrupt { .. }));
}
