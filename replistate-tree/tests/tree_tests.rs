use pretty_assertions::assert_eq;
use replistate_tree::{Change, ObservableTree, TreeError};
use replistate_types::Path;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

fn player_data() -> Value {
    json!({
        "Resources": {"Cash": 0, "XP": 0},
        "Inventory": {},
    })
}

/// Collects every `Change` a listener receives.
fn recorder() -> (Arc<Mutex<Vec<Change>>>, impl Fn(&Change) + Send + Sync + 'static) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    (log, move |c: &Change| sink.lock().unwrap().push(c.clone()))
}

// ── Reads ────────────────────────────────────────────────────────

#[test]
fn get_reads_paths_and_root() {
    let tree = ObservableTree::new(player_data());
    assert_eq!(tree.get("Resources/Cash"), Some(json!(0)));
    assert_eq!(tree.get(""), Some(player_data()));
    assert_eq!(tree.get("Resources/Gems"), None);
}

#[test]
fn with_borrows_without_copying() {
    let tree = ObservableTree::new(player_data());
    let keys = tree.with("Resources", |v| {
        v.and_then(Value::as_object).map(|m| m.len()).unwrap_or(0)
    });
    assert_eq!(keys, 2);
}

#[test]
fn get_as_deserializes() {
    let tree = ObservableTree::new(json!({"Resources": {"Cash": 42}}));
    let cash: u64 = tree.get_as("Resources/Cash").unwrap();
    assert_eq!(cash, 42);
    assert!(matches!(
        tree.get_as::<u64>("Resources/Gems"),
        Err(TreeError::PathNotFound(_))
    ));
    assert!(matches!(
        tree.get_as::<String>("Resources/Cash"),
        Err(TreeError::Deserialize(_))
    ));
}

// ── Writes ───────────────────────────────────────────────────────

#[test]
fn set_requires_existing_parent() {
    let tree = ObservableTree::new(player_data());
    tree.set("Resources/Cash", json!(100)).unwrap();
    assert_eq!(tree.get("Resources/Cash"), Some(json!(100)));

    let err = tree.set("Quests/Active", json!(1)).unwrap_err();
    assert!(matches!(err, TreeError::PathNotFound(p) if p == Path::parse("Quests/Active")));
}

#[test]
fn set_may_add_a_key_to_an_existing_object() {
    let tree = ObservableTree::new(player_data());
    tree.set("Inventory/Sword", json!(1)).unwrap();
    assert_eq!(tree.get("Inventory"), Some(json!({"Sword": 1})));
}

#[test]
fn validator_sees_path_and_value_and_can_veto() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);
    let tree = ObservableTree::with_validator(player_data(), move |path, value| {
        seen_in.lock().unwrap().push((path.to_string(), value.clone()));
        if value.is_number() {
            Ok(())
        } else {
            Err(format!("{path} expects a number"))
        }
    });

    tree.set("Resources/Cash", json!(5)).unwrap();
    let err = tree.set("Resources/Cash", json!("lots")).unwrap_err();
    match err {
        TreeError::ValidationRejected { path, reason } => {
            assert_eq!(path, Path::parse("Resources/Cash"));
            assert_eq!(reason, "Resources/Cash expects a number");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(tree.get("Resources/Cash"), Some(json!(5)));
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[test]
fn rejected_write_does_not_notify() {
    let tree = ObservableTree::with_validator(player_data(), |_, _| Err("no".into()));
    let (log, listener) = recorder();
    let _d = tree.listen("", listener);
    assert!(tree.set("Resources/Cash", json!(1)).is_err());
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn apply_update_creates_and_skips_validator() {
    let tree = ObservableTree::with_validator(player_data(), |_, _| Err("never".into()));
    tree.apply_update("Quests/Daily/Done", json!(true));
    assert_eq!(tree.get("Quests/Daily/Done"), Some(json!(true)));
}

// ── Hierarchical notification ────────────────────────────────────

#[test]
fn ancestors_fire_root_first_and_siblings_stay_quiet() {
    let tree = ObservableTree::new(player_data());
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut disconnects = Vec::new();
    for path in ["", "Resources", "Resources/Cash", "Resources/XP", "Inventory"] {
        let order = Arc::clone(&order);
        disconnects.push(tree.listen(path, move |c: &Change| {
            order.lock().unwrap().push(c.path.to_string());
        }));
    }

    tree.set("Resources/Cash", json!(100)).unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["", "Resources", "Resources/Cash"]);
}

#[test]
fn each_listener_sees_its_own_subtree() {
    let tree = ObservableTree::new(player_data());
    let (root_log, root) = recorder();
    let (res_log, res) = recorder();
    let _a = tree.listen("", root);
    let _b = tree.listen("Resources", res);

    tree.set("Resources/Cash", json!(7)).unwrap();

    let root_change = root_log.lock().unwrap()[0].clone();
    assert_eq!(root_change.path, Path::root());
    assert_eq!(root_change.value["Resources"]["Cash"], json!(7));
    assert_eq!(root_change.changed_value, json!(7));
    assert_eq!(root_change.changed_path, Path::parse("Resources/Cash"));

    let res_change = res_log.lock().unwrap()[0].clone();
    assert_eq!(res_change.value, json!({"Cash": 7, "XP": 0}));
    assert_eq!(res_change.changed_path, Path::parse("Resources/Cash"));
}

#[test]
fn descendants_do_not_fire_for_ancestor_write() {
    let tree = ObservableTree::new(player_data());
    let (log, listener) = recorder();
    let _d = tree.listen("Resources/Cash", listener);
    tree.set("Resources", json!({"Cash": 1, "XP": 1})).unwrap();
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn root_write_notifies_only_root() {
    let tree = ObservableTree::new(player_data());
    let (root_log, root) = recorder();
    let (res_log, res) = recorder();
    let _a = tree.listen("", root);
    let _b = tree.listen("Resources", res);

    tree.set("", json!({"Resources": {"Cash": 1, "XP": 1}, "Inventory": {}})).unwrap();
    assert_eq!(root_log.lock().unwrap().len(), 1);
    assert!(res_log.lock().unwrap().is_empty());
}

#[test]
fn apply_update_notifies_like_a_native_write() {
    let tree = ObservableTree::new(json!({}));
    let (log, listener) = recorder();
    let _d = tree.listen("Resources", listener);
    tree.apply_update("Resources/Cash", json!(3));
    let changes = log.lock().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].value, json!({"Cash": 3}));
}

#[test]
fn removal_reports_null() {
    let tree = ObservableTree::new(json!({"Inventory": {"Sword": 1}}));
    let (log, listener) = recorder();
    let _d = tree.listen("Inventory/Sword", listener);
    tree.set("Inventory/Sword", Value::Null).unwrap();
    let changes = log.lock().unwrap();
    assert_eq!(changes[0].value, Value::Null);
    assert_eq!(changes[0].changed_value, Value::Null);
    assert_eq!(tree.get("Inventory"), Some(json!({})));
}

#[test]
fn listener_can_write_reentrantly() {
    let tree = ObservableTree::new(json!({"Resources": {"Cash": 0, "Total": 0}}));
    let writer = tree.clone();
    let _d = tree.listen("Resources/Cash", move |c: &Change| {
        let _ = writer.set("Resources/Total", c.value.clone());
    });
    tree.set("Resources/Cash", json!(9)).unwrap();
    assert_eq!(tree.get("Resources/Total"), Some(json!(9)));
}

#[test]
fn reentrant_write_is_delivered_after_current_fanout() {
    let tree = ObservableTree::new(json!({"Resources": {"Cash": 0, "Total": 0}}));
    let writer = tree.clone();
    let _w = tree.listen("", move |c: &Change| {
        if c.changed_path == Path::from("Resources/Cash") {
            let _ = writer.set("Resources/Total", c.changed_value.clone());
        }
    });
    let (log, on_root) = recorder();
    let _r = tree.listen("", on_root);

    tree.set("Resources/Cash", json!(9)).unwrap();

    let paths: Vec<String> = log
        .lock()
        .unwrap()
        .iter()
        .map(|c| c.changed_path.to_string())
        .collect();
    assert_eq!(paths, vec!["Resources/Cash", "Resources/Total"]);
    assert_eq!(tree.get("Resources/Total"), Some(json!(9)));
}

#[test]
fn concurrent_writers_notify_in_commit_order() {
    let tree = ObservableTree::new(json!({"Cash": 0}));
    let stalled = Arc::new(Barrier::new(2));
    let resume = Arc::new(Barrier::new(2));
    let first = Arc::new(AtomicBool::new(true));

    // Holds the first delivery open until the second write has committed.
    let _stall = tree.listen("", {
        let (stalled, resume, first) = (Arc::clone(&stalled), Arc::clone(&resume), Arc::clone(&first));
        move |_: &Change| {
            if first.swap(false, Ordering::SeqCst) {
                stalled.wait();
                resume.wait();
            }
        }
    });
    let (log, on_root) = recorder();
    let _log = tree.listen("", on_root);

    let writer = {
        let tree = tree.clone();
        thread::spawn(move || tree.set("Cash", json!(1)).unwrap())
    };
    stalled.wait();
    tree.set("Cash", json!(2)).unwrap();
    resume.wait();
    writer.join().unwrap();

    let log = log.lock().unwrap();
    let seen: Vec<(Value, Value)> = log
        .iter()
        .map(|c| (c.changed_value.clone(), c.value.clone()))
        .collect();
    assert_eq!(
        seen,
        vec![
            (json!(1), json!({"Cash": 1})),
            (json!(2), json!({"Cash": 2})),
        ]
    );
    assert_eq!(tree.get("Cash"), Some(json!(2)));
}

// ── bind ─────────────────────────────────────────────────────────

#[test]
fn bind_fires_immediately_then_on_changes() {
    let tree = ObservableTree::new(player_data());
    let (log, listener) = recorder();
    let _d = tree.bind("Resources/Cash", listener);

    {
        let changes = log.lock().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].value, json!(0));
        assert_eq!(changes[0].changed_path, Path::parse("Resources/Cash"));
    }

    tree.set("Resources/Cash", json!(5)).unwrap();
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[test]
fn bind_on_absent_path_reports_null() {
    let tree = ObservableTree::new(json!({}));
    let (log, listener) = recorder();
    let _d = tree.bind("Missing", listener);
    assert_eq!(log.lock().unwrap()[0].value, Value::Null);
}

// ── Disconnect & destroy ─────────────────────────────────────────

#[test]
fn disconnect_stops_delivery_and_prunes_signal() {
    let tree = ObservableTree::new(player_data());
    let (log, listener) = recorder();
    let disconnect = tree.listen("Resources", listener);
    assert_eq!(tree.listener_count(), 1);

    disconnect();
    tree.set("Resources/Cash", json!(1)).unwrap();
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(tree.listener_count(), 0);
}

#[test]
fn destroy_invalidates_listeners() {
    let tree = ObservableTree::new(player_data());
    let (log, listener) = recorder();
    let disconnect = tree.listen("", listener);

    tree.destroy();
    assert!(tree.is_destroyed());
    tree.set("Resources/Cash", json!(1)).unwrap();
    disconnect();

    assert!(log.lock().unwrap().is_empty());
    assert_eq!(tree.listener_count(), 0);
    assert_eq!(tree.get("Resources/Cash"), Some(json!(1)));
}

#[test]
fn listen_after_destroy_is_inert() {
    let tree = ObservableTree::new(player_data());
    tree.destroy();
    let (log, listener) = recorder();
    let disconnect = tree.bind("", listener);
    tree.set("Resources/Cash", json!(1)).unwrap();
    disconnect();
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn clones_share_state() {
    let tree = ObservableTree::new(player_data());
    let other = tree.clone();
    other.set("Resources/XP", json!(10)).unwrap();
    assert_eq!(tree.get("Resources/XP"), Some(json!(10)));
}

// ── Snapshots ────────────────────────────────────────────────────

#[test]
fn snapshot_reaches_listeners_registered_beneath() {
    let tree = ObservableTree::new(json!({"Resources": {"Cash": 0}}));
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut disconnects = Vec::new();
    for path in ["Resources/Cash", "", "Resources", "Inventory"] {
        let order = Arc::clone(&order);
        disconnects.push(tree.listen(path, move |c: &Change| {
            order.lock().unwrap().push((c.path.to_string(), c.value.clone()));
        }));
    }

    tree.apply_snapshot("", json!({"Resources": {"Cash": 50}}));

    assert_eq!(
        *order.lock().unwrap(),
        vec![
            ("".to_string(), json!({"Resources": {"Cash": 50}})),
            ("Inventory".to_string(), Value::Null),
            ("Resources".to_string(), json!({"Cash": 50})),
            ("Resources/Cash".to_string(), json!(50)),
        ]
    );
}
