use super::*;
use serde_json::json;

// =============================================================
// TaskId
// =============================================================

#[test]
fn task_id_accepts_string_and_integer() {
    let text: TaskId = serde_json::from_value(json!("65f1c0ffee")).unwrap();
    let int: TaskId = serde_json::from_value(json!(7)).unwrap();
    assert_eq!(text, TaskId::from("65f1c0ffee"));
    assert_eq!(int, TaskId::Int(7));
}

#[test]
fn task_id_serializes_untagged() {
    assert_eq!(serde_json::to_value(TaskId::Int(3)).unwrap(), json!(3));
    assert_eq!(serde_json::to_value(TaskId::from("abc")).unwrap(), json!("abc"));
}

#[test]
fn task_id_from_str_keeps_text() {
    assert_eq!("12".parse::<TaskId>().unwrap(), TaskId::from("12"));
    assert_eq!("65f1c0".parse::<TaskId>().unwrap(), TaskId::from("65f1c0"));
}

#[test]
fn task_id_string_and_int_not_equal() {
    assert_ne!(TaskId::Int(1), TaskId::from("1"));
}

// =============================================================
// TaskStatus
// =============================================================

#[test]
fn task_status_known_values() {
    let status: TaskStatus = serde_json::from_value(json!("in_progress")).unwrap();
    assert_eq!(status, TaskStatus::InProgress);
    assert_eq!(serde_json::to_value(TaskStatus::Completed).unwrap(), json!("completed"));
}

#[test]
fn task_status_unknown_value_preserved() {
    let status: TaskStatus = serde_json::from_value(json!("archived")).unwrap();
    assert_eq!(status, TaskStatus::Other("archived".into()));
    assert_eq!(status.as_str(), "archived");
    assert_eq!(serde_json::to_value(&status).unwrap(), json!("archived"));
}

// =============================================================
// Task
// =============================================================

#[test]
fn task_minimal_record_defaults_overdue() {
    let task: Task = serde_json::from_value(json!({ "id": 1, "status": "pending" })).unwrap();
    assert_eq!(task.id, TaskId::Int(1));
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(!task.is_overdue);
    assert!(task.extra.is_empty());
}

#[test]
fn task_overdue_flag_read_leniently() {
    let overdue = |flag: Value| {
        serde_json::from_value::<Task>(json!({ "id": "t", "status": "pending", "is_overdue": flag }))
            .unwrap()
            .is_overdue
    };
    assert!(!overdue(Value::Null));
    assert!(!overdue(json!(0)));
    assert!(!overdue(json!("")));
    assert!(!overdue(json!(false)));
    assert!(overdue(json!(1)));
    assert!(overdue(json!("yes")));
    assert!(overdue(json!(true)));
}

#[test]
fn task_extra_fields_round_trip() {
    let raw = json!({
        "id": "t-1",
        "title": "Write report",
        "status": "in_progress",
        "is_overdue": true,
        "priority": 4,
        "category": "work",
        "due_date": "2026-10-01T09:00:00Z",
        "tags": ["q4"],
    });
    let task: Task = serde_json::from_value(raw.clone()).unwrap();
    assert_eq!(task.title(), Some("Write report"));
    assert_eq!(task.priority(), Some(4));
    assert_eq!(task.category(), Some("work"));
    assert_eq!(task.due_date(), Some("2026-10-01T09:00:00Z"));
    assert!(task.is_overdue);

    let back = serde_json::to_value(&task).unwrap();
    assert_eq!(back, raw);
}

#[test]
fn task_without_id_rejected() {
    assert!(serde_json::from_value::<Task>(json!({ "status": "pending" })).is_err());
}

// =============================================================
// TaskListResponse
// =============================================================

#[test]
fn list_response_bare_array() {
    let list: TaskListResponse =
        serde_json::from_value(json!([{ "id": 1, "status": "pending" }, { "id": 2, "status": "completed" }])).unwrap();
    let ids: Vec<TaskId> = list.into_tasks().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![TaskId::Int(1), TaskId::Int(2)]);
}

#[test]
fn list_response_paginated_envelope() {
    let list: TaskListResponse = serde_json::from_value(json!({
        "count": 2,
        "next": null,
        "results": [{ "id": 1, "status": "pending" }, { "id": 2, "status": "completed" }],
    }))
    .unwrap();
    let ids: Vec<TaskId> = list.into_tasks().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![TaskId::Int(1), TaskId::Int(2)]);
}

#[test]
fn list_response_empty_array() {
    let list: TaskListResponse = serde_json::from_value(json!([])).unwrap();
    assert!(list.into_tasks().is_empty());
}

// =============================================================
// TaskDraft / TaskQuery
// =============================================================

#[test]
fn draft_skips_unset_fields() {
    let draft = TaskDraft { title: Some("Plan sprint".into()), priority: Some(2), ..TaskDraft::default() };
    assert_eq!(serde_json::to_value(&draft).unwrap(), json!({ "title": "Plan sprint", "priority": 2 }));
}

#[test]
fn draft_serializes_status_and_tags() {
    let draft = TaskDraft {
        status: Some(TaskStatus::InProgress),
        tags: vec!["home".into()],
        ..TaskDraft::default()
    };
    assert_eq!(serde_json::to_value(&draft).unwrap(), json!({ "status": "in_progress", "tags": ["home"] }));
}

#[test]
fn query_pairs_in_stable_order() {
    let query = TaskQuery {
        status: Some(TaskStatus::Completed),
        priority: Some(5),
        search: Some("tax".into()),
        ordering: Some("-due_date".into()),
        ..TaskQuery::default()
    };
    assert_eq!(
        query.to_pairs(),
        vec![
            ("status".to_owned(), "completed".to_owned()),
            ("priority".to_owned(), "5".to_owned()),
            ("search".to_owned(), "tax".to_owned()),
            ("ordering".to_owned(), "-due_date".to_owned()),
        ]
    );
}

#[test]
fn default_query_is_empty() {
    assert!(TaskQuery::default().is_empty());
}

// =============================================================
// User / auth bodies
// =============================================================

#[test]
fn user_accessors_read_profile_fields() {
    let user = User(json!({ "id": "u1", "username": "ada", "email": "ada@example.test" }));
    assert_eq!(user.id(), Some("u1"));
    assert_eq!(user.username(), Some("ada"));
    assert_eq!(user.email(), Some("ada@example.test"));
}

#[test]
fn auth_response_parses_tokens() {
    let body = json!({
        "user": { "id": "u1" },
        "tokens": { "access": "a1", "refresh": "r1" },
    });
    let auth: AuthResponse = serde_json::from_value(body).unwrap();
    assert_eq!(auth.tokens, TokenPair { access: "a1".into(), refresh: "r1".into() });
    assert_eq!(auth.user.id(), Some("u1"));
}

#[test]
fn registration_skips_missing_names() {
    let reg = Registration {
        username: "ada".into(),
        email: "ada@example.test".into(),
        password: "pw".into(),
        ..Registration::default()
    };
    assert_eq!(
        serde_json::to_value(&reg).unwrap(),
        json!({ "username": "ada", "email": "ada@example.test", "password": "pw" })
    );
}
