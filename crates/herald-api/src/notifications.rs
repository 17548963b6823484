//! Notification kinds, wire payloads, and history entries

use chrono::{DateTime, Local};
use herald_util::{NotificationId, TodoId};
use serde::{Deserialize, Serialize};

/// Maximum number of history entries kept; the oldest are evicted silently.
pub const HISTORY_CAP: usize = 100;

/// Notification kind tag.
///
/// Wire values are kebab-case; anything the server sends that we do not
/// recognize maps to `Unknown` instead of failing the whole event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    TodoReminder,
    RoutineReminder,
    Achievement,
    System,
    #[serde(other)]
    Unknown,
}

impl NotificationKind {
    /// Whether the in-app alert for this kind stays on screen until dismissed.
    pub fn alert_is_persistent(&self) -> bool {
        matches!(self, Self::TodoReminder | Self::RoutineReminder)
    }
}

/// Resolve the deep-link route for a notification kind.
///
/// Reminders navigate to the referenced todo when one is present; everything
/// else lands on a fixed view.
pub fn route_for(kind: NotificationKind, todo_id: Option<TodoId>) -> String {
    match (kind, todo_id) {
        (NotificationKind::TodoReminder | NotificationKind::RoutineReminder, Some(id)) => {
            format!("/todo/{}", id)
        }
        (NotificationKind::Achievement, _) => "/achievements".to_string(),
        _ => "/notifications".to_string(),
    }
}

/// Payload of a `notification` event on the wire (camelCase, no local fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(rename = "todoId", default, skip_serializing_if = "Option::is_none")]
    pub todo_id: Option<TodoId>,
}

/// A notification history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub todo_id: Option<TodoId>,
    pub received_at: DateTime<Local>,
    pub read: bool,
}

impl Notification {
    /// Build a history entry from a wire payload at receipt time.
    pub fn from_event(event: NotificationEvent) -> Self {
        Self {
            id: NotificationId::generate(),
            kind: event.kind,
            title: event.title,
            body: event.body,
            todo_id: event.todo_id,
            received_at: herald_util::now(),
            read: false,
        }
    }

    /// Deep-link route this entry navigates to on click.
    pub fn route(&self) -> String {
        route_for(self.kind, self.todo_id)
    }
}
