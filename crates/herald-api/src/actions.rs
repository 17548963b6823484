//! Pending offline actions

use chrono::{DateTime, Local};
use herald_util::{ActionId, TodoId};
use serde::{Deserialize, Serialize};

/// Replay attempts before a queued action is dropped.
pub const MAX_ACTION_RETRIES: u32 = 3;

/// Default snooze offset for a todo reminder, in minutes.
pub const SNOOZE_MINUTES: u32 = 10;

/// Default postpone offset for a routine reminder, in minutes.
pub const POSTPONE_MINUTES: u32 = 60;

/// The fixed vocabulary of actions a user can take on a reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Complete,
    Snooze,
    Skip,
    Postpone,
}

/// Action-specific payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionData {
    #[serde(rename = "todoId")]
    pub todo_id: TodoId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<u32>,
}

/// An action that failed due to connectivity, queued for later replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: ActionId,
    pub action: ActionKind,
    pub data: ActionData,
    pub created_at: DateTime<Local>,
    pub retry_count: u32,
}

impl PendingAction {
    pub fn new(action: ActionKind, data: ActionData) -> Self {
        Self {
            id: ActionId::generate(),
            action,
            data,
            created_at: herald_util::now(),
            retry_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_action_starts_at_zero_retries() {
        let action = PendingAction::new(
            ActionKind::Snooze,
            ActionData {
                todo_id: TodoId::new(42),
                minutes: Some(SNOOZE_MINUTES),
            },
        );

        assert_eq!(action.retry_count, 0);
        assert_eq!(action.action, ActionKind::Snooze);
    }

    #[test]
    fn action_serialization_round_trip() {
        let action = PendingAction::new(
            ActionKind::Postpone,
            ActionData {
                todo_id: TodoId::new(7),
                minutes: Some(POSTPONE_MINUTES),
            },
        );

        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"postpone\""));
        assert!(json.contains("\"todoId\":7"));

        let parsed: PendingAction = serde_json::from_str(&json).unwrap();
        assert_eq!(action, parsed);
    }

    #[test]
    fn data_without_minutes_omits_field() {
        let data = ActionData {
            todo_id: TodoId::new(1),
            minutes: None,
        };
        let json = serde_json::to_string(&data).unwrap();
        assert!(!json.contains("minutes"));
    }
}
