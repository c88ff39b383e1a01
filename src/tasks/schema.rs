// @generated manually, mirrors migrations/2024-01-01-000000_init_tasks/up.sql

diesel::table! {
    tasks (id) {
        id -> Text,
        parent_id -> Nullable<Text>,
        context_id -> Text,
        title -> Text,
        description -> Text,
        category -> Text,
        priority -> Text,
        status -> Text,
        assigned_agent_id -> Nullable<Text>,
        created_at -> Text,
        started_at -> Nullable<Text>,
        finished_at -> Nullable<Text>,
        result -> Nullable<Text>,
        error -> Nullable<Text>,
    }
}

diesel::table! {
    task_updates (id) {
        id -> Text,
        task_id -> Text,
        at -> Text,
        kind -> Text,
        payload -> Text,
    }
}
