mod common;

use common::Harness;
use nitro_core::{
    RemoteList, RemoteTask, ServiceError, Snapshot, SnapshotList, SnapshotReport, TaskType,
};

fn remote_list(id: &str, name: &str, order: &[&str]) -> RemoteList {
    RemoteList {
        id: id.to_string(),
        name: Some(name.to_string()),
        order: Some(order.iter().map(|id| id.to_string()).collect()),
        ..RemoteList::default()
    }
}

fn remote_task(id: &str, name: &str) -> RemoteTask {
    RemoteTask {
        name: Some(name.to_string()),
        ..RemoteTask::new(id)
    }
}

fn snapshot(lists: Vec<SnapshotList>) -> Snapshot {
    Snapshot { lists }
}

#[test]
fn snapshot_adds_lists_tasks_and_server_order() {
    let mut harness = Harness::new();

    let report = harness
        .service()
        .apply_snapshot(snapshot(vec![SnapshotList {
            list: remote_list("L1", "Work", &["t2", "t1", "gone"]),
            tasks: vec![remote_task("t1", "one"), remote_task("t2", "two")],
        }]))
        .unwrap();

    assert_eq!(
        report,
        SnapshotReport {
            lists_added: 1,
            lists_patched: 0,
            tasks_added: 2,
            tasks_patched: 0,
        }
    );
    let list = harness.service().get_list_by_server_id("L1").unwrap();
    let t1 = harness.service().get_task_by_server_id("t1").unwrap();
    let t2 = harness.service().get_task_by_server_id("t2").unwrap();
    assert_eq!(t1.list, list.id);
    assert_eq!(list.local_order, vec![t2.id, t1.id]);
    assert_eq!(list.order, vec!["t2".to_string(), "t1".to_string()]);
    assert!(harness.task_queue.pending().is_empty());
    assert!(harness.list_queue.pending().is_empty());
}

#[test]
fn second_snapshot_patches_instead_of_duplicating() {
    let mut harness = Harness::new();
    let first = snapshot(vec![SnapshotList {
        list: remote_list("L1", "Work", &["t1"]),
        tasks: vec![remote_task("t1", "one")],
    }]);
    harness.service().apply_snapshot(first).unwrap();

    let second = snapshot(vec![SnapshotList {
        list: remote_list("L1", "Work renamed", &["t3", "t1"]),
        tasks: vec![remote_task("t1", "one edited"), remote_task("t3", "three")],
    }]);
    let report = harness.service().apply_snapshot(second).unwrap();

    assert_eq!(report.lists_added, 0);
    assert_eq!(report.lists_patched, 1);
    assert_eq!(report.tasks_patched, 1);
    assert_eq!(report.tasks_added, 1);
    let list = harness.service().get_list_by_server_id("L1").unwrap();
    assert_eq!(list.name, "Work renamed");
    assert_eq!(list.local_order.len(), 2);
    assert_eq!(
        harness.service().get_task_by_server_id("t1").unwrap().name,
        "one edited"
    );
    assert_eq!(harness.service().task_store().len(), 2);
}

#[test]
fn reserved_names_bind_to_local_system_lists() {
    let mut harness = Harness::new();

    harness
        .service()
        .apply_snapshot(snapshot(vec![SnapshotList {
            list: remote_list("S-inbox", "nitrosys-inbox", &["t1"]),
            tasks: vec![remote_task("t1", "from server")],
        }]))
        .unwrap();

    let inbox = harness.service().get_list("inbox").unwrap();
    assert_eq!(inbox.server_id.as_deref(), Some("S-inbox"));
    assert_eq!(inbox.name, "inbox");
    assert_eq!(harness.service().get_lists().len(), 4);
    assert_eq!(
        harness.service().get_task_by_server_id("t1").unwrap().list,
        "inbox"
    );
}

#[test]
fn null_dates_keep_local_values_and_values_overwrite() {
    let mut harness = Harness::new();
    let completed_task = RemoteTask {
        completed: Some(10),
        ..remote_task("t1", "done upstream")
    };
    harness
        .service()
        .apply_snapshot(snapshot(vec![SnapshotList {
            list: remote_list("S-inbox", "nitrosys-inbox", &[]),
            tasks: vec![completed_task],
        }]))
        .unwrap();

    harness
        .service()
        .apply_task_patches("inbox", vec![RemoteTask::new("t1")])
        .unwrap();
    assert_eq!(
        harness.service().get_task_by_server_id("t1").unwrap().completed,
        Some(10)
    );

    let overwrite = RemoteTask {
        completed: Some(20),
        ..RemoteTask::new("t1")
    };
    harness
        .service()
        .apply_task_patches("inbox", vec![overwrite])
        .unwrap();
    assert_eq!(
        harness.service().get_task_by_server_id("t1").unwrap().completed,
        Some(20)
    );
}

#[test]
fn explicit_null_notes_clear_while_absent_notes_keep() {
    let mut harness = Harness::new();
    let with_notes: RemoteTask =
        serde_json::from_str(r#"{"id":"t1","name":"n","notes":"remember"}"#).unwrap();
    harness
        .service()
        .apply_snapshot(snapshot(vec![SnapshotList {
            list: remote_list("S-inbox", "nitrosys-inbox", &[]),
            tasks: vec![with_notes],
        }]))
        .unwrap();

    let absent: RemoteTask = serde_json::from_str(r#"{"id":"t1"}"#).unwrap();
    harness
        .service()
        .apply_task_patches("inbox", vec![absent])
        .unwrap();
    assert_eq!(
        harness
            .service()
            .get_task_by_server_id("t1")
            .unwrap()
            .notes
            .as_deref(),
        Some("remember")
    );

    let cleared: RemoteTask = serde_json::from_str(r#"{"id":"t1","notes":null}"#).unwrap();
    harness
        .service()
        .apply_task_patches("inbox", vec![cleared])
        .unwrap();
    assert_eq!(
        harness.service().get_task_by_server_id("t1").unwrap().notes,
        None
    );
}

#[test]
fn patches_for_unknown_server_ids_are_skipped() {
    let mut harness = Harness::new();
    let archived = RemoteTask {
        kind: Some(TaskType::Archived),
        ..RemoteTask::new("never-seen")
    };

    let patched = harness
        .service()
        .apply_task_patches("inbox", vec![archived])
        .unwrap();

    assert!(patched.is_empty());
    assert!(harness.service().task_store().is_empty());
}

#[test]
fn snapshot_moves_tasks_the_server_relocated() {
    let mut harness = Harness::new();
    harness
        .service()
        .apply_snapshot(snapshot(vec![
            SnapshotList {
                list: remote_list("L1", "Old", &["t1"]),
                tasks: vec![remote_task("t1", "nomad")],
            },
            SnapshotList {
                list: remote_list("L2", "New", &[]),
                tasks: Vec::new(),
            },
        ]))
        .unwrap();

    harness
        .service()
        .apply_snapshot(snapshot(vec![
            SnapshotList {
                list: remote_list("L1", "Old", &[]),
                tasks: Vec::new(),
            },
            SnapshotList {
                list: remote_list("L2", "New", &["t1"]),
                tasks: vec![remote_task("t1", "nomad")],
            },
        ]))
        .unwrap();

    let old = harness.service().get_list_by_server_id("L1").unwrap();
    let new = harness.service().get_list_by_server_id("L2").unwrap();
    let task = harness.service().get_task_by_server_id("t1").unwrap();
    assert_eq!(task.list, new.id);
    assert!(old.local_order.is_empty());
    assert_eq!(new.local_order, vec![task.id]);
}

#[test]
fn snapshot_moves_known_task_into_a_list_new_to_this_device() {
    let mut harness = Harness::new();
    harness
        .service()
        .apply_snapshot(snapshot(vec![SnapshotList {
            list: remote_list("L1", "Old", &["t1"]),
            tasks: vec![remote_task("t1", "nomad")],
        }]))
        .unwrap();

    let report = harness
        .service()
        .apply_snapshot(snapshot(vec![
            SnapshotList {
                list: remote_list("L1", "Old", &[]),
                tasks: Vec::new(),
            },
            SnapshotList {
                list: remote_list("L2", "Fresh", &["t1"]),
                tasks: vec![remote_task("t1", "nomad renamed")],
            },
        ]))
        .unwrap();

    assert_eq!(report.lists_added, 1);
    assert_eq!(report.tasks_added, 0);
    assert_eq!(report.tasks_patched, 1);
    let old = harness.service().get_list_by_server_id("L1").unwrap();
    let fresh = harness.service().get_list_by_server_id("L2").unwrap();
    let task = harness.service().get_task_by_server_id("t1").unwrap();
    assert_eq!(task.list, fresh.id);
    assert_eq!(task.name, "nomad renamed");
    assert!(old.local_order.is_empty());
    assert_eq!(fresh.local_order, vec![task.id]);
    assert_eq!(fresh.order, vec!["t1".to_string()]);
    assert_eq!(harness.service().task_store().len(), 1);
}

#[test]
fn list_patch_with_order_rebuilds_local_order() {
    let mut harness = Harness::new();
    harness
        .service()
        .apply_snapshot(snapshot(vec![SnapshotList {
            list: remote_list("L1", "Work", &["t1", "t2"]),
            tasks: vec![remote_task("t1", "one"), remote_task("t2", "two")],
        }]))
        .unwrap();

    let patched = harness
        .service()
        .apply_list_patches(vec![RemoteList {
            id: "L1".to_string(),
            order: Some(vec!["t2".to_string(), "t1".to_string(), "gone".to_string()]),
            ..RemoteList::default()
        }])
        .unwrap();

    let list = harness.service().get_list_by_server_id("L1").unwrap();
    let t1 = harness.service().get_task_by_server_id("t1").unwrap();
    let t2 = harness.service().get_task_by_server_id("t2").unwrap();
    assert_eq!(patched, vec![list.id.clone()]);
    assert_eq!(list.name, "Work");
    assert_eq!(list.local_order, vec![t2.id.clone(), t1.id.clone()]);
    assert_eq!(list.order, vec!["t2".to_string(), "t1".to_string()]);
    assert_eq!(harness.order_of(&list.id), vec![t2.id, t1.id]);
    assert!(harness.list_queue.pending().is_empty());
}

#[test]
fn token_acquired_downloads_and_applies_snapshot() {
    let mut harness = Harness::new();
    let err = harness.service().on_token_acquired().unwrap_err();
    assert!(matches!(err, ServiceError::Sync(ref sync) if sync.retryable));

    harness.snapshots.replace(snapshot(vec![SnapshotList {
        list: remote_list("L1", "Remote", &[]),
        tasks: vec![remote_task("t1", "fetched")],
    }]));
    let report = harness.service().on_token_acquired().unwrap();

    assert_eq!(report.lists_added, 1);
    assert_eq!(report.tasks_added, 1);
}

#[test]
fn queues_only_process_while_signed_in() {
    let mut harness = Harness::new();

    assert!(!harness.service().handle_process_request());
    assert_eq!(harness.task_queue.process_calls(), 0);

    harness.session.set_signed_in(true);
    assert!(harness.service().handle_process_request());
    assert_eq!(harness.task_queue.process_calls(), 1);
    assert_eq!(harness.list_queue.process_calls(), 1);
}
