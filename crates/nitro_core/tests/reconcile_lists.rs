mod common;

use common::Harness;
use nitro_core::{ListPatch, NewList, NewTask, ServiceError, SyncVerb, SystemList, TaskPatch};

#[test]
fn system_lists_are_seeded_with_display_names() {
    let mut harness = Harness::new();

    let lists = harness.service().get_lists();
    let ids: Vec<&str> = lists.iter().map(|summary| summary.list.id.as_str()).collect();
    assert_eq!(ids, vec!["inbox", "today", "next", "all"]);
    for summary in &lists {
        assert_eq!(summary.list.name, summary.list.id);
    }
    assert!(harness.list_queue.pending().is_empty());
}

#[test]
fn add_list_strips_reserved_prefix_and_collapses_spaces() {
    let mut harness = Harness::new();

    let list = harness
        .service()
        .add_list(NewList::new("nitrosys-Weekend   plans"))
        .unwrap();

    assert_eq!(list.name, "Weekend plans");
    assert_eq!(
        harness.service().list_store().find_by_local_id(&list.id).unwrap().name,
        "Weekend plans"
    );
    let pending = harness.list_queue.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].verb, SyncVerb::Post);
    assert_eq!(pending[0].key.parent, None);
}

#[test]
fn update_list_renames_and_queues_patch() {
    let mut harness = Harness::new();
    let list = harness.service().add_list(NewList::new("Draft")).unwrap();
    harness.list_queue.drain();

    let patch = ListPatch {
        name: Some("nitrosys-Final".to_string()),
        notes: Some(Some("q3".to_string())),
    };
    let updated = harness.service().update_list(&list.id, patch).unwrap();

    assert_eq!(updated.name, "Final");
    assert_eq!(updated.notes.as_deref(), Some("q3"));
    assert_eq!(harness.list_queue.pending()[0].verb, SyncVerb::Patch);
}

#[test]
fn counts_only_include_open_tasks() {
    let mut harness = Harness::new();
    let done = harness
        .service()
        .add_task(NewTask::new("inbox", "done"))
        .unwrap();
    harness
        .service()
        .add_task(NewTask::new("inbox", "open"))
        .unwrap();
    harness
        .service()
        .add_task(NewTask::new("today", "due"))
        .unwrap();
    harness.service().complete_task(&done.id).unwrap();

    let counts: Vec<(String, usize)> = harness
        .service()
        .get_lists()
        .into_iter()
        .map(|summary| (summary.list.id, summary.count))
        .collect();

    assert!(counts.contains(&("inbox".to_string(), 2)));
    assert!(counts.contains(&("today".to_string(), 1)));
    assert!(counts.contains(&("all".to_string(), 2)));
}

#[test]
fn system_lists_cannot_be_deleted() {
    let mut harness = Harness::new();
    let task = harness
        .service()
        .add_task(NewTask::new("inbox", "safe"))
        .unwrap();

    for system in SystemList::ALL {
        let err = harness.service().delete_list(system.id()).unwrap_err();
        assert!(matches!(err, ServiceError::ProtectedList(_)));
    }

    assert!(harness.service().get_list("inbox").is_some());
    assert!(harness.service().get_task(&task.id).is_some());
}

#[test]
fn deleting_a_list_removes_its_tasks_first() {
    let mut harness = Harness::new();
    let list = harness.service().add_list(NewList::new("Errands")).unwrap();
    let mut ids = Vec::new();
    for name in ["milk", "bread", "stamps"] {
        let task = harness
            .service()
            .add_task(NewTask::new(list.id.as_str(), name))
            .unwrap();
        ids.push(task.id);
    }
    let bystander = harness
        .service()
        .add_task(NewTask::new("inbox", "bystander"))
        .unwrap();
    harness.task_queue.drain();
    harness.list_queue.drain();

    harness.service().delete_list(&list.id).unwrap();

    assert!(harness.service().get_list(&list.id).is_none());
    for id in &ids {
        assert!(harness.service().get_task(id).is_none());
    }
    assert!(harness.service().get_task(&bystander.id).is_some());

    let task_intents = harness.task_queue.pending();
    assert_eq!(task_intents.len(), 3);
    assert!(task_intents
        .iter()
        .all(|intent| intent.verb == SyncVerb::Delete));
    let list_intents = harness.list_queue.pending();
    assert_eq!(list_intents.len(), 1);
    assert_eq!(list_intents[0].verb, SyncVerb::Delete);
}

#[test]
fn deleting_unknown_list_is_an_error() {
    let mut harness = Harness::new();

    let err = harness.service().delete_list("nope").unwrap_err();

    assert!(matches!(err, ServiceError::ListNotFound(id) if id == "nope"));
}

#[test]
fn moving_into_deleted_list_is_rejected() {
    let mut harness = Harness::new();
    let list = harness.service().add_list(NewList::new("Temp")).unwrap();
    let task = harness
        .service()
        .add_task(NewTask::new("inbox", "wanderer"))
        .unwrap();
    harness.service().delete_list(&list.id).unwrap();

    let patch = TaskPatch {
        list: Some(list.id.clone()),
        ..TaskPatch::default()
    };
    let err = harness.service().update_task(&task.id, patch).unwrap_err();

    assert!(matches!(err, ServiceError::ListNotFound(_)));
    assert_eq!(harness.service().get_task(&task.id).unwrap().list, "inbox");
}

#[test]
fn acknowledge_list_binds_server_id_once() {
    let mut harness = Harness::new();
    let list = harness.service().add_list(NewList::new("Work")).unwrap();

    harness
        .service()
        .acknowledge_list(&list.id, "L-1".to_string(), 10)
        .unwrap();
    let again = harness
        .service()
        .acknowledge_list(&list.id, "L-2".to_string(), 20)
        .unwrap();

    assert_eq!(again.server_id.as_deref(), Some("L-1"));
    assert_eq!(
        harness.service().get_list_by_server_id("L-1").unwrap().id,
        list.id
    );
    assert!(harness.service().get_list_by_server_id("L-2").is_none());
}
