use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Server-assigned row id of a task.
pub type TaskId = i64;

/// A note row as stored in the remote table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Description text, or an empty string when the column is null
    pub fn description_or_empty(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// Insert payload. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub user_id: Uuid,
}

/// Update payload. Only title and description are ever changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskChanges {
    pub title: String,
    pub description: String,
}

/// Authenticated identity behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: Principal,
}

impl Session {
    pub fn principal(&self) -> &Principal {
        &self.user
    }
}

/// Result of a sign-up request.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// Email confirmation is off and the backend signed the user in.
    SignedIn(Session),
    /// Account created; the user has to confirm their email before signing in.
    ConfirmationPending,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Newest first: the ordering of the notes list.
    pub fn newest_first() -> Self {
        Self::desc("created_at")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_task_deserializes_null_description() {
        let row = serde_json::json!({
            "id": 7,
            "title": "Groceries",
            "description": null,
            "user_id": "7f1d3a52-3c7e-4b9b-9a55-0d7f5e4c2a11",
            "created_at": "2024-05-01T10:15:30.123456+00:00"
        });

        let task: Task = serde_json::from_value(row).unwrap();
        assert_eq!(task.id, 7);
        assert_eq!(task.description, None);
        assert_eq!(task.description_or_empty(), "");
    }

    #[test]
    fn test_task_deserializes_missing_description() {
        let row = serde_json::json!({
            "id": 1,
            "title": "A",
            "user_id": Uuid::new_v4(),
            "created_at": "2024-05-01T10:15:30Z"
        });

        let task: Task = serde_json::from_value(row).unwrap();
        assert_eq!(task.description_or_empty(), "");
    }

    #[test]
    fn test_new_task_payload_has_no_server_fields() {
        let payload = serde_json::to_value(NewTask {
            title: "Groceries".to_string(),
            description: String::new(),
            user_id: Uuid::nil(),
        })
        .unwrap();

        let object = payload.as_object().unwrap();
        assert!(object.get("id").is_none());
        assert!(object.get("created_at").is_none());
        assert_eq!(object.len(), 3);
    }

    #[test]
    fn test_sort_direction_strings() {
        assert_eq!(SortDirection::Desc.to_string(), "desc");
        assert_eq!(SortDirection::from_str("asc").unwrap(), SortDirection::Asc);
        assert_eq!(OrderBy::newest_first(), OrderBy::desc("created_at"));
    }
}
