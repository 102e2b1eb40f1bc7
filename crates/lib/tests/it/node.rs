//! TrackedNode operations: wrap-on-read, map mutations, list mutations,
//! and the records each one leaves behind.

use deltacache::{CacheError, Error, List, Map, Tracked, Value};
use serde::{Deserialize, Serialize};

use crate::helpers::{assert_set, player_session};

#[test]
fn reads_wrap_containers_and_clone_leaves() {
    let session = player_session();
    let base = session.get_data("base").unwrap();

    assert!(base.is_map().unwrap());
    assert!(!base.is_list().unwrap());
    assert_eq!(base.len().unwrap(), 3);
    assert!(!base.is_empty().unwrap());
    assert_eq!(base.snapshot().unwrap().as_map().map(Map::len), Some(3));

    match base.get("money").unwrap() {
        Tracked::Leaf(value) => assert_eq!(value, 100),
        Tracked::Node(_) => panic!("scalar came back wrapped as a node"),
    }

    let props = base.get("props").unwrap().into_node().unwrap();
    assert_eq!(props.path().to_string(), "base.props");
    assert!(base.get("missing").unwrap_err().is_not_found());
    // reads record nothing
    assert_eq!(session.log_len(), 0);
}

#[test]
fn nested_writes_record_full_paths() {
    let session = player_session();
    let props = session
        .get_data("base")
        .unwrap()
        .get("props")
        .unwrap()
        .into_node()
        .unwrap();
    props.set("weapon_2", 20).unwrap();

    let log = session.log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].path.to_string(), "base.props.weapon_2");
    assert_eq!(log[0].value, Some(Value::Int(20)));
}

#[test]
fn set_default_records_only_on_miss() {
    let session = player_session();
    let base = session.get_data("base").unwrap();

    let existing = base.set_default("money", 0).unwrap();
    assert_eq!(existing.as_int(), Some(100));
    assert_eq!(session.log_len(), 0);

    let created = base.set_default("mana", 50).unwrap();
    assert_eq!(created.as_int(), Some(50));
    assert_eq!(session.log_len(), 1);
}

#[test]
fn pop_and_pop_or() {
    let session = player_session();
    let base = session.get_data("base").unwrap();

    assert_eq!(base.pop("money").unwrap(), 100);
    assert!(base.pop("money").unwrap_err().is_not_found());
    assert_eq!(base.pop_or("money", -1), Value::Int(-1));
    assert_eq!(base.pop_or("level", -1), Value::Int(3));

    // two successful removals, two delete records
    let log = session.log();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|record| record.is_delete()));
}

#[test]
fn update_and_clear_mark_the_whole_node() {
    let session = player_session();
    let base = session.get_data("base").unwrap();

    base.update([("a", 1), ("b", 2)]).unwrap();
    let log = session.log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].path.to_string(), "base");

    base.clear().unwrap();
    assert_eq!(base.len().unwrap(), 0);

    let diff = session.pack_cache();
    assert_eq!(diff.len(), 1);
    assert_set(&diff, "base", Map::new());
}

#[test]
fn untracked_reads_leave_no_records() {
    let session = player_session();
    let base = session.get_data("base").unwrap();

    assert!(base.contains_key("money").unwrap());
    assert_eq!(base.keys().unwrap(), vec!["level", "money", "props"]);
    assert_eq!(base.values().unwrap()[1], Value::Int(100));
    assert_eq!(
        base.get_raw("props").unwrap(),
        Value::Map(Map::new().with("weapon_1", 1))
    );
    assert_eq!(session.log_len(), 0);
}

#[test]
fn nodes_over_one_path_stay_consistent() {
    let session = player_session();
    let first = session.get_data("base").unwrap();
    let second = session.get_data("base").unwrap();

    first.set("money", 500).unwrap();
    assert_eq!(second.get("money").unwrap().as_int(), Some(500));
}

#[test]
fn stale_node_reports_missing_path() {
    let session = player_session();
    let props = session
        .get_data("base")
        .unwrap()
        .get("props")
        .unwrap()
        .into_node()
        .unwrap();
    session.remove_data("base").unwrap();

    assert!(props.len().unwrap_err().is_not_found());
    assert!(props.set("x", 1).unwrap_err().is_not_found());
}

#[test]
fn map_operations_on_a_list_are_type_errors() {
    let session = player_session();
    let inventory = session.get_data("inventory").unwrap();

    let err = inventory.keys().unwrap_err();
    assert!(err.is_type_error());
    assert!(matches!(
        err,
        Error::Cache(CacheError::TypeMismatch {
            expected: "map",
            actual: "list",
            ..
        })
    ));
    assert!(inventory.set("key", 1).unwrap_err().is_type_error());
    assert!(session.get_data("base").unwrap().push(1).unwrap_err().is_type_error());
}

#[test]
fn push_and_set_index_record_index_paths() {
    let session = player_session();
    let inventory = session.get_data("inventory").unwrap();

    let index = inventory.push("potion").unwrap();
    assert_eq!(index, 2);
    inventory.set_index(0, "axe").unwrap();

    let log = session.log();
    assert_eq!(log[0].path.to_string(), "inventory.2");
    assert_eq!(log[1].path.to_string(), "inventory.0");
    assert!(inventory.set_index(9, "x").unwrap_err().is_type_error());
}

#[test]
fn push_unique_skips_present_values() {
    let session = player_session();
    let inventory = session.get_data("inventory").unwrap();

    assert!(!inventory.push_unique("sword").unwrap());
    assert_eq!(session.log_len(), 0);

    assert!(inventory.push_unique("bow").unwrap());
    assert_eq!(inventory.len().unwrap(), 3);
    assert_eq!(session.log_len(), 1);
}

#[test]
fn shifting_removals_record_the_whole_list() {
    let session = player_session();
    let inventory = session.get_data("inventory").unwrap();

    assert_eq!(inventory.remove_index(0).unwrap(), "sword");
    assert!(inventory.pull("shield").unwrap());
    assert!(!inventory.pull("shield").unwrap());

    let log = session.log();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|record| record.path.to_string() == "inventory"));
    assert_eq!(inventory.to_vec().unwrap(), Vec::<Value>::new());
    assert!(inventory.remove_index(0).unwrap_err().is_type_error());
}

#[test]
fn extend_reset_and_replace() {
    let session = player_session();
    let inventory = session.get_data("inventory").unwrap();

    inventory.extend(["bow", "rope"]).unwrap();
    assert_eq!(inventory.len().unwrap(), 4);

    inventory.reset(["torch"]).unwrap();
    assert_eq!(inventory.to_vec().unwrap(), vec![Value::from("torch")]);

    assert!(inventory.replace("torch", "lantern").unwrap());
    assert!(!inventory.replace("torch", "x").unwrap());
    assert!(inventory.contains(&Value::from("lantern")).unwrap());

    let diff = session.pack_cache();
    assert_eq!(diff.len(), 1);
    assert_set(&diff, "inventory", List::from(["lantern"]));
}

#[test]
fn get_index_wraps_like_get() {
    let session = player_session();
    let inventory = session.get_data("inventory").unwrap();

    assert_eq!(inventory.get_index(1).unwrap().as_text(), Some("shield"));
    assert!(inventory.get_index(5).unwrap_err().is_type_error());
}

#[test]
fn structs_round_trip_through_json_accessors() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Quest {
        id: i64,
        title: String,
        done: bool,
    }

    let session = player_session();
    let base = session.get_data("base").unwrap();
    let quest = Quest {
        id: 7,
        title: "grail".into(),
        done: false,
    };

    base.set_json("quest", &quest).unwrap();
    assert_eq!(session.log_len(), 1);

    let back: Quest = base.get_json("quest").unwrap();
    assert_eq!(back, quest);
}
