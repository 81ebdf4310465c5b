use dcat_storage::{keys, FileStore, PreferenceStore, Preferences, UserData};
use serde_json::json;

#[test]
fn preferences_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");

    let prefs = Preferences::new(FileStore::new(&path)).unwrap();
    prefs.set_custom_value("theme", json!("dark")).unwrap();
    prefs
        .set_user_data(&UserData {
            user_id: Some("u7".into()),
            ..UserData::default()
        })
        .unwrap();
    prefs.close().unwrap();

    let reopened = Preferences::new(FileStore::new(&path)).unwrap();
    assert_eq!(reopened.custom_value("theme").unwrap(), Some(json!("dark")));
    assert_eq!(reopened.user_data().unwrap().user_id.as_deref(), Some("u7"));
}

#[test]
fn corrupt_entry_is_healed_on_next_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");

    let store = FileStore::open(&path).unwrap();
    store.write(keys::APP, "not json at all").unwrap();
    let prefs = Preferences::new(store).unwrap();

    // Existing (corrupt) document is left alone by `new` and read as default
    assert!(prefs.pinned_items().unwrap().is_empty());
    prefs.set_custom_value("k", json!(1)).unwrap();

    let raw = prefs.store().read(keys::APP).unwrap().unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["customData"]["k"], json!(1));
}
