use std::fs;
use std::path::Path;
use std::time::Duration;

use poff::poff::{
    content_hash, ensure_file_config, ensure_folder_config, file_config_path, folder_config_path, load, load_raw,
    reconcile_file, reconcile_folder, save_folder, write, FileConfig, FolderConfig, SaveRequest,
};
use serde_json::{json, Value};

fn touch(dir: &Path, name: &str, body: &[u8]) {
    fs::write(dir.join(name), body).expect("write fixture");
}

fn set_entry_key(dir: &Path, name: &str, key: &str, value: Value) {
    let p = folder_config_path(dir);
    let mut raw = load_raw(&p).expect("sidecar exists");
    let tree = raw["tree"].as_array_mut().expect("tree array");
    let item = tree.iter_mut().find(|e| e["name"] == name).expect("entry present");
    item[key] = value;
    write(&p, &raw).expect("rewrite sidecar");
}

#[test]
fn folder_ensure_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "a.txt", b"a");
    fs::create_dir(tmp.path().join("sub")).unwrap();

    let first = ensure_folder_config(tmp.path()).unwrap();
    let before = fs::read(folder_config_path(tmp.path())).unwrap();
    // Second-precision timestamps: a rewrite would change updatedAt after this pause.
    std::thread::sleep(Duration::from_millis(1100));
    let second = ensure_folder_config(tmp.path()).unwrap();
    let after = fs::read(folder_config_path(tmp.path())).unwrap();

    assert_eq!(first, second);
    assert_eq!(before, after);
    assert_eq!(second.updated_at, first.updated_at);
}

#[test]
fn visibility_survives_rescans() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "a.txt", b"a");
    touch(tmp.path(), "b.txt", b"b");
    ensure_folder_config(tmp.path()).unwrap();
    set_entry_key(tmp.path(), "a.txt", "visible", json!(false));

    touch(tmp.path(), "c.txt", b"c");
    let cfg = ensure_folder_config(tmp.path()).unwrap();
    let vis: Vec<_> = cfg.tree.iter().map(|e| (e.name.as_str(), e.visible)).collect();
    assert_eq!(vis, vec![("a.txt", false), ("b.txt", true), ("c.txt", true)]);
}

#[test]
fn custom_tree_keys_are_preserved() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "a.txt", b"a");
    ensure_folder_config(tmp.path()).unwrap();
    set_entry_key(tmp.path(), "a.txt", "color", json!("red"));
    set_entry_key(tmp.path(), "a.txt", "slug", json!("tampered"));

    touch(tmp.path(), "b.txt", b"b");
    let cfg = ensure_folder_config(tmp.path()).unwrap();
    let a = cfg.tree.iter().find(|e| e.name == "a.txt").unwrap();
    assert_eq!(a.extra.get("color"), Some(&json!("red")));
    assert_eq!(a.slug, "a-txt");
}

#[test]
fn tree_hash_tracks_listing() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "a.txt", b"a");
    let first = ensure_folder_config(tmp.path()).unwrap();
    assert_eq!(first.tree_hash, content_hash(&first.tree).unwrap());

    touch(tmp.path(), "b.txt", b"b");
    let second = reconcile_folder(tmp.path()).unwrap();
    assert!(second.written);
    assert_ne!(second.config.tree_hash, first.tree_hash);
    assert_eq!(second.config.id, first.id);
}

#[test]
fn disappearing_entries_drop_out() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "a.txt", b"a");
    touch(tmp.path(), "b.txt", b"b");
    ensure_folder_config(tmp.path()).unwrap();
    set_entry_key(tmp.path(), "b.txt", "visible", json!(false));

    fs::remove_file(tmp.path().join("b.txt")).unwrap();
    let cfg = ensure_folder_config(tmp.path()).unwrap();
    assert_eq!(cfg.tree.len(), 1);

    // Re-created entries start fresh: no tombstones.
    touch(tmp.path(), "b.txt", b"b");
    let cfg = ensure_folder_config(tmp.path()).unwrap();
    assert!(cfg.tree.iter().all(|e| e.visible));
}

#[test]
fn user_metadata_and_unknown_keys_are_carried_forward() {
    let tmp = tempfile::tempdir().unwrap();
    ensure_folder_config(tmp.path()).unwrap();
    let p = folder_config_path(tmp.path());
    let mut raw = load_raw(&p).unwrap();
    raw["title"] = json!("My Title");
    raw["link"] = json!("https://example.org/x");
    raw["work"] = json!({ "type": "gallery" });
    raw["theme"] = json!("dark");
    write(&p, &raw).unwrap();

    touch(tmp.path(), "new.md", b"# new");
    let cfg = ensure_folder_config(tmp.path()).unwrap();
    assert_eq!(cfg.title.as_deref(), Some("My Title"));
    assert_eq!(cfg.link.as_deref(), Some("https://example.org/x"));
    assert_eq!(cfg.work.as_ref().and_then(|w| w.get("type")), Some(&json!("gallery")));
    assert_eq!(cfg.extra.get("theme"), Some(&json!("dark")));

    let text = fs::read_to_string(&p).unwrap();
    assert!(text.contains("\"link\": \"https://example.org/x\""), "{text}");
}

#[test]
fn stored_work_does_not_force_a_rewrite() {
    let tmp = tempfile::tempdir().unwrap();
    ensure_folder_config(tmp.path()).unwrap();
    let p = folder_config_path(tmp.path());
    let mut raw = load_raw(&p).unwrap();
    raw["work"] = json!({ "type": "gallery" });
    write(&p, &raw).unwrap();

    // The stored sidecar already carries `work`; nothing else changed.
    let r = reconcile_folder(tmp.path()).unwrap();
    assert!(!r.written);
    assert!(r.config.work.is_some());
}

#[test]
fn malformed_sidecar_is_treated_as_absent() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(folder_config_path(tmp.path()), "{ oops").unwrap();
    let r = reconcile_folder(tmp.path()).unwrap();
    assert!(r.written);
    assert!(r.config.id.starts_with("poff_"));
    let stored: FolderConfig = load(&folder_config_path(tmp.path())).unwrap();
    assert_eq!(stored.id, r.config.id);
}

#[test]
fn file_sidecar_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "photo.png", b"\x89PNG");
    let cfg = ensure_file_config(tmp.path(), "photo.png").unwrap();
    assert_eq!(cfg.mime_type.as_deref(), Some("image/png"));
    assert_eq!(cfg.slug, "photo-png");

    let p = file_config_path(tmp.path(), "photo.png");
    assert!(p.starts_with(tmp.path().join(".works")));
    let mut raw = load_raw(&p).unwrap();
    raw["title"] = json!("Sunset");
    raw["visible"] = json!(false);
    raw["rating"] = json!(5);
    write(&p, &raw).unwrap();

    let r = reconcile_file(tmp.path(), "photo.png").unwrap();
    assert!(!r.written);
    assert_eq!(r.config.title.as_deref(), Some("Sunset"));
    assert!(!r.config.visible);
    assert_eq!(r.config.extra.get("rating"), Some(&json!(5)));
    assert_eq!(r.config.id, cfg.id);

    let stored: FileConfig = load(&p).unwrap();
    assert_eq!(stored, r.config);
}

#[test]
fn file_content_change_rewrites_with_new_hash() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "notes.txt", b"one");
    let first = ensure_file_config(tmp.path(), "notes.txt").unwrap();
    touch(tmp.path(), "notes.txt", b"one two three");
    let second = reconcile_file(tmp.path(), "notes.txt").unwrap();
    assert!(second.written);
    assert_eq!(second.config.size, Some(13));
    assert_ne!(second.config.hash, first.hash);
    assert_eq!(second.config.id, first.id);
}

#[test]
fn save_then_ensure_keeps_saved_state() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "a.txt", b"a");
    touch(tmp.path(), "b.txt", b"b");
    let req: SaveRequest = serde_json::from_value(json!({ "description": "docs", "tree_visible": ["a.txt"] })).unwrap();
    let saved = save_folder(tmp.path(), &req).unwrap();
    assert_eq!(saved.tree.iter().filter(|e| e.visible).count(), 1);

    let r = reconcile_folder(tmp.path()).unwrap();
    assert!(!r.written);
    assert_eq!(r.config.description.as_deref(), Some("docs"));
    assert!(r.config.tree.iter().find(|e| e.name == "b.txt").map(|e| !e.visible).unwrap());
}

#[test]
fn legacy_sidecars_keep_identity_and_user_state() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "a.txt", b"a");
    touch(tmp.path(), "b.txt", b"b");
    touch(tmp.path(), "photo.png", b"\x89PNG");

    // Shape written by older tools: empty `work` array, local-offset mtimes, numeric flags.
    let folder = json!({
        "folderName": "site", "slug": "site", "title": "Holiday", "description": "",
        "type": "folder", "id": "poff_65f1a2b3c4d5e",
        "tree": [
            { "name": "a.txt", "slug": "a-txt", "type": "file", "path": "a.txt",
              "modifiedAt": "2024-05-01T10:00:00+02:00", "visible": 0 },
            { "name": "b.txt", "slug": "b-txt", "type": "file", "path": "b.txt",
              "modifiedAt": "2024-05-01T10:00:00+02:00", "visible": false, "caption": "Beach" }
        ],
        "treeHash": "stale", "updatedAt": "2024-05-01T10:00:00+02:00", "work": []
    });
    write(&folder_config_path(tmp.path()), &folder).unwrap();
    let file = json!({
        "name": "photo.png", "slug": "photo-png", "type": "file", "path": "photo.png",
        "size": 4, "visible": false, "hash": "stale", "id": "poff_65f1a2b3c4d5f",
        "title": "Sunset", "work": []
    });
    write(&file_config_path(tmp.path(), "photo.png"), &file).unwrap();

    let r = reconcile_folder(tmp.path()).unwrap();
    assert!(r.written);
    assert_eq!(r.config.id, "poff_65f1a2b3c4d5e");
    assert_eq!(r.config.title.as_deref(), Some("Holiday"));
    assert!(r.config.work.is_none());
    let b = r.config.tree.iter().find(|e| e.name == "b.txt").unwrap();
    assert!(!b.visible);
    assert_eq!(b.extra.get("caption"), Some(&json!("Beach")));
    assert!(r.config.tree.iter().find(|e| e.name == "a.txt").unwrap().visible);
    assert!(!reconcile_folder(tmp.path()).unwrap().written);

    let f = reconcile_file(tmp.path(), "photo.png").unwrap();
    assert!(f.written);
    assert_eq!(f.config.id, "poff_65f1a2b3c4d5f");
    assert_eq!(f.config.title.as_deref(), Some("Sunset"));
    assert!(!f.config.visible);
    assert!(!reconcile_file(tmp.path(), "photo.png").unwrap().written);
}
