//! Session-level behavior: root entries, dotted paths, the tracking
//! toggle, and the pack/clear log lifecycle.

use deltacache::{List, Map, PathKey, SessionConfig, TrackingSession, Value};

use crate::helpers::{assert_delete, assert_set, player_root, player_session};

#[test]
fn root_entry_access() {
    let session = player_session();

    assert!(session.contains_data("base"));
    assert!(!session.contains_data("missing"));
    assert_eq!(session.get_value("name").unwrap(), "arthur");
    assert_eq!(session.data_keys(), vec!["base", "inventory", "name"]);

    assert!(session.get_data("missing").unwrap_err().is_not_found());
    // scalars have no tracked view; read them with get_value
    assert!(session.get_data("name").unwrap_err().is_type_error());
}

#[test]
fn set_and_remove_root_entries() {
    let session = player_session();

    let previous = session.set_value("name", "lancelot");
    assert_eq!(previous, Some(Value::Text("arthur".into())));

    let removed = session.remove_data("inventory").unwrap();
    assert!(removed.as_list().is_some());
    assert!(session.remove_data("inventory").unwrap_err().is_not_found());

    let diff = session.pack_cache();
    assert_eq!(diff.len(), 2);
    assert_set(&diff, "name", "lancelot");
    assert_delete(&diff, "inventory");
}

#[test]
fn set_path_creates_intermediate_maps() {
    let session = player_session();
    session.set_path("base.stats.strength", 7).unwrap();

    let base = session.get_value("base").unwrap();
    let stats = base.as_map().unwrap().get("stats").unwrap();
    assert_eq!(stats.as_map().unwrap().get("strength").unwrap(), &7);

    let diff = session.pack_cache();
    assert_eq!(diff.len(), 1);
    assert_set(&diff, "base.stats.strength", 7);
}

#[test]
fn set_path_rejects_scalars_and_bad_indices() {
    let session = player_session();

    assert!(session.set_path("name.sub", 1).unwrap_err().is_type_error());
    // sequence holes cannot be created
    assert!(
        session
            .set_path("inventory.9", "axe")
            .unwrap_err()
            .is_type_error()
    );
    assert_eq!(session.log_len(), 0);
}

#[test]
fn remove_path_on_maps_and_lists() {
    let session = player_session();

    let removed = session.remove_path("base.props.weapon_1").unwrap();
    assert_eq!(removed, Value::Int(1));
    assert!(
        session
            .remove_path("base.props.weapon_1")
            .unwrap_err()
            .is_not_found()
    );
    assert!(session.remove_path("inventory.9").unwrap_err().is_type_error());

    let removed = session.remove_path("inventory.0").unwrap();
    assert_eq!(removed, "sword");

    let diff = session.pack_cache();
    assert_delete(&diff, "base.props.weapon_1");
    // element removal shifts indices, so the whole list is re-sent
    assert_set(&diff, "inventory", List::from(["shield"]));
}

#[test]
fn paused_tracking_applies_writes_without_records() {
    let session = player_session();
    let base = session.get_data("base").unwrap();

    session.pause_tracking();
    assert!(!session.is_tracking());
    base.set("money", 999).unwrap();

    session.resume_tracking();
    assert!(session.is_tracking());
    base.set("level", 4).unwrap();

    // the untracked write reached the data all the same
    assert_eq!(base.get("money").unwrap().as_int(), Some(999));

    let diff = session.pack_cache();
    assert_eq!(diff.len(), 1);
    assert_set(&diff, "base.level", 4);
}

#[test]
fn pack_clears_the_log_by_default() {
    let session = player_session();
    session.set_value("gold", 5);
    assert_eq!(session.log_len(), 1);

    let first = session.pack_cache();
    assert_eq!(first.len(), 1);
    assert_eq!(session.log_len(), 0);
    assert!(session.pack_cache().is_empty());
}

#[test]
fn preserve_log_config_repacks_the_full_diff() {
    let session = TrackingSession::with_config(player_root(), SessionConfig::preserve_log());
    session.set_value("gold", 5);
    let first = session.pack_cache();
    session.set_value("silver", 7);
    let second = session.pack_cache();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 2);
    assert!(second.get_path("gold").is_some());
    assert!(second.get_path("silver").is_some());
}

#[test]
fn clear_cache_discards_pending_records() {
    let session = player_session();
    session.set_value("gold", 5);
    session.clear_cache();

    assert_eq!(session.log_len(), 0);
    assert!(session.pack_cache().is_empty());
    // the write itself still landed
    assert_eq!(session.get_value("gold").unwrap(), 5);
}

#[test]
fn log_exposes_ordered_records() {
    let session = player_session();
    session.set_value("a", 1);
    session.remove_data("name").unwrap();

    let log = session.log();
    assert_eq!(log.len(), 2);
    assert!(log[0].is_set());
    assert!(log[1].is_delete());
    assert_eq!(log[0].sequence, 0);
    assert_eq!(log[1].sequence, 1);
    assert_eq!(log[1].path, PathKey::root("name"));
}

#[test]
fn export_and_json_output() {
    let session = TrackingSession::new(Map::new().with("a", 1));
    assert_eq!(session.export(), Map::new().with("a", 1));
    assert_eq!(session.to_json_string(), r#"{"a":1}"#);
}
