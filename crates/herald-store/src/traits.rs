//! Store trait definitions

use herald_api::{Notification, PendingAction};
use herald_util::{ActionId, NotificationId};

use crate::StoreResult;

/// Fixed key under which the auth token is stored.
pub const AUTH_TOKEN_KEY: &str = "token";

/// Meta key recording that the one-time permission flow has run.
pub const META_PERMISSION_FLOW_DONE: &str = "permission_flow_done";

/// Meta key holding the persisted push subscription (JSON).
pub const META_PUSH_SUBSCRIPTION: &str = "push_subscription";

/// Main store trait
pub trait Store: Send + Sync {
    // Auth token

    /// Read the stored auth token
    fn auth_token(&self) -> StoreResult<Option<String>>;

    /// Write the auth token
    fn set_auth_token(&self, token: &str) -> StoreResult<()>;

    /// Remove the auth token
    fn clear_auth_token(&self) -> StoreResult<()>;

    // Notification history

    /// Append a notification; evicts the oldest entries past the history cap
    fn append_notification(&self, notification: &Notification) -> StoreResult<()>;

    /// List history entries, newest first
    fn list_notifications(&self) -> StoreResult<Vec<Notification>>;

    /// Count unread history entries
    fn unread_count(&self) -> StoreResult<usize>;

    /// Mark one entry read
    fn mark_read(&self, id: &NotificationId) -> StoreResult<()>;

    /// Mark every entry read
    fn mark_all_read(&self) -> StoreResult<()>;

    /// Delete one entry
    fn delete_notification(&self, id: &NotificationId) -> StoreResult<()>;

    /// Delete the entire history
    fn clear_notifications(&self) -> StoreResult<()>;

    // Offline action queue

    /// Append an action to the queue
    fn enqueue_action(&self, action: &PendingAction) -> StoreResult<()>;

    /// List queued actions in insertion order
    fn pending_actions(&self) -> StoreResult<Vec<PendingAction>>;

    /// Write back an updated retry count
    fn update_retry_count(&self, id: &ActionId, retry_count: u32) -> StoreResult<()>;

    /// Remove an action from the queue
    fn remove_action(&self, id: &ActionId) -> StoreResult<()>;

    // Meta key-value

    /// Read a meta record
    fn get_meta(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a meta record
    fn set_meta(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove a meta record
    fn delete_meta(&self, key: &str) -> StoreResult<()>;

    // Health

    /// Check if the store is healthy
    fn is_healthy(&self) -> bool;
}
