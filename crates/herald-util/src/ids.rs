//! Strongly-typed identifiers for heraldd

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a receipt-ordered identifier: millisecond timestamp plus a random
/// tie-break suffix. Lexicographic order matches arrival order at millisecond
/// granularity, which is all the history and queue views need.
fn receipt_id() -> String {
    let millis = crate::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{}-{:06}", millis, suffix)
}

/// Unique identifier for a notification history entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn generate() -> Self {
        Self(receipt_id())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NotificationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NotificationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a pending offline action
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(String);

impl ActionId {
    pub fn generate() -> Self {
        Self(receipt_id())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ActionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ActionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Foreign reference to a todo entity on the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TodoId(i64);

impl TodoId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TodoId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Registration token identifying one push worker instance at the gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationToken(Uuid);

impl RegistrationToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RegistrationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_id_equality() {
        let id1 = NotificationId::new("1700000000000-000042");
        let id2 = NotificationId::new("1700000000000-000042");
        let id3 = NotificationId::new("1700000000000-000043");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = ActionId::generate();
        let b = ActionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn registration_token_uniqueness() {
        let t1 = RegistrationToken::new();
        let t2 = RegistrationToken::new();
        assert_ne!(t1, t2);
    }

    #[test]
    fn ids_serialize_deserialize() {
        let id = NotificationId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: NotificationId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);

        let todo = TodoId::new(42);
        let json = serde_json::to_string(&todo).unwrap();
        assert_eq!(json, "42");
        let parsed: TodoId = serde_json::from_str(&json).unwrap();
        assert_eq!(todo, parsed);
    }
}
