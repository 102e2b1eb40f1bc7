//! End-to-end packing scenarios: whole mutation flows reduced to diffs.

use deltacache::{List, Map, Op, PathKey, Value};

use crate::helpers::{assert_delete, assert_set, player_session};

#[test]
fn repeated_writes_collapse_to_the_final_value() {
    let session = player_session();
    let base = session.get_data("base").unwrap();

    base.set("money", 150).unwrap();
    base.set("money", 200).unwrap();
    base.set("money", 250).unwrap();

    let diff = session.pack_cache();
    assert_eq!(diff.len(), 1);
    assert_set(&diff, "base.money", 250);
}

#[test]
fn child_writes_fold_into_a_replaced_subtree() {
    let session = player_session();
    let base = session.get_data("base").unwrap();

    base.set("props", Map::new()).unwrap();
    let props = base.get("props").unwrap().into_node().unwrap();
    props.set("weapon_1", 10).unwrap();
    props.set("weapon_2", 20).unwrap();
    props.delete("weapon_1").unwrap();

    let diff = session.pack_cache();
    assert_eq!(diff.len(), 1);
    assert_set(&diff, "base.props", Map::new().with("weapon_2", 20));
}

#[test]
fn subtree_deletion_subsumes_descendant_changes() {
    let session = player_session();
    let props = session
        .get_data("base")
        .unwrap()
        .get("props")
        .unwrap()
        .into_node()
        .unwrap();
    props.set("weapon_2", 20).unwrap();
    props.set("weapon_3", 30).unwrap();
    session.get_data("base").unwrap().delete("props").unwrap();

    let diff = session.pack_cache();
    assert_eq!(diff.len(), 1);
    assert_delete(&diff, "base.props");
}

#[test]
fn rebuilt_subtree_after_deletion_packs_as_replacement() {
    let session = player_session();
    session.get_data("base").unwrap().delete("props").unwrap();
    session.set_path("base.props.weapon_9", 99).unwrap();

    let diff = session.pack_cache();
    assert_eq!(diff.len(), 1);
    assert_set(&diff, "base.props", Map::new().with("weapon_9", 99));
}

#[test]
fn non_shifting_list_writes_stay_index_level() {
    let session = player_session();
    let inventory = session.get_data("inventory").unwrap();

    inventory.push("potion").unwrap();
    let diff = session.pack_cache();
    assert_eq!(diff.len(), 1);
    assert_set(&diff, "inventory.2", "potion");

    inventory.remove_index(0).unwrap();
    let diff = session.pack_cache();
    assert_eq!(diff.len(), 1);
    assert_set(&diff, "inventory", List::from(["shield", "potion"]));
}

#[test]
fn push_after_shift_folds_into_the_list_snapshot() {
    let session = player_session();
    let inventory = session.get_data("inventory").unwrap();

    inventory.remove_index(0).unwrap();
    inventory.push("potion").unwrap();

    let diff = session.pack_cache();
    assert_eq!(diff.len(), 1);
    assert_set(&diff, "inventory", List::from(["shield", "potion"]));
}

#[test]
fn packed_entries_never_overlap() {
    let session = player_session();
    let base = session.get_data("base").unwrap();

    base.set("money", 1).unwrap();
    base.set("props", Map::new().with("w", 1)).unwrap();
    session.set_path("base.props.x.y", 2).unwrap();
    base.delete("level").unwrap();
    session.remove_data("name").unwrap();

    let inventory = session.get_data("inventory").unwrap();
    inventory.push("potion").unwrap();
    inventory.remove_index(1).unwrap();

    let diff = session.pack_cache();
    let paths: Vec<PathKey> = diff.iter().map(|(path, _)| path.clone()).collect();
    for outer in &paths {
        for inner in &paths {
            assert!(!outer.is_ancestor_of(inner), "{outer} covers {inner}");
        }
    }
}

#[test]
fn folded_entries_match_the_live_data() {
    let session = player_session();
    let base = session.get_data("base").unwrap();

    base.set("props", Map::new()).unwrap();
    session.set_path("base.props.a.b", 1).unwrap();
    session.remove_path("base.props.a.b").unwrap();

    let diff = session.pack_cache();
    assert_eq!(diff.len(), 1);
    let live = base.get_raw("props").unwrap();
    assert_eq!(diff.get_path("base.props").and_then(Op::as_set), Some(&live));
}

#[test]
fn document_ops_split_upserts_and_removes() {
    let session = player_session();
    session.get_data("base").unwrap().set("money", 300).unwrap();
    session.remove_data("name").unwrap();
    session.get_data("base").unwrap().delete("level").unwrap();

    let ops = session.pack_cache().into_document_ops();
    assert_eq!(ops.upserts.len(), 1);
    assert_eq!(ops.upserts.get("base.money"), Some(&Value::Int(300)));
    assert_eq!(ops.removes.len(), 2);
    assert!(ops.removes.contains("name"));
    assert!(ops.removes.contains("base.level"));
}
