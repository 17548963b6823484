//! SQLite-based store implementation

use herald_api::{ActionData, ActionKind, Notification, NotificationKind, PendingAction, HISTORY_CAP};
use herald_util::{ActionId, NotificationId, TodoId};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::{Store, StoreResult, AUTH_TOKEN_KEY};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            -- Auth token (single fixed key)
            CREATE TABLE IF NOT EXISTS auth (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Notification history; position orders by insertion
            CREATE TABLE IF NOT EXISTS history (
                position INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                todo_id INTEGER,
                received_at TEXT NOT NULL,
                read INTEGER NOT NULL DEFAULT 0
            );

            -- Offline action queue, drained in insertion order
            CREATE TABLE IF NOT EXISTS offline_actions (
                position INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                action TEXT NOT NULL,
                data_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0
            );

            -- Meta key-value records
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_history_read ON history(read);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn kind_to_db(kind: NotificationKind) -> StoreResult<String> {
    let value = serde_json::to_value(kind)?;
    Ok(value.as_str().unwrap_or("unknown").to_string())
}

fn kind_from_db(s: &str) -> NotificationKind {
    // The Unknown fallback also absorbs rows written by newer versions
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .unwrap_or(NotificationKind::Unknown)
}

fn action_to_db(action: ActionKind) -> StoreResult<String> {
    let value = serde_json::to_value(action)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| crate::StoreError::Serialization("action kind is not a string".into()))
}

impl Store for SqliteStore {
    fn auth_token(&self) -> StoreResult<Option<String>> {
        let conn = self.conn.lock().unwrap();

        let token: Option<String> = conn
            .query_row(
                "SELECT value FROM auth WHERE key = ?",
                [AUTH_TOKEN_KEY],
                |row| row.get(0),
            )
            .optional()?;

        Ok(token)
    }

    fn set_auth_token(&self, token: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT INTO auth (key, value)
            VALUES (?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value = excluded.value
            "#,
            params![AUTH_TOKEN_KEY, token],
        )?;

        debug!("Auth token updated");
        Ok(())
    }

    fn clear_auth_token(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM auth WHERE key = ?", [AUTH_TOKEN_KEY])?;
        Ok(())
    }

    fn append_notification(&self, notification: &Notification) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let kind = kind_to_db(notification.kind)?;

        conn.execute(
            r#"
            INSERT INTO history (id, kind, title, body, todo_id, received_at, read)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                notification.id.as_str(),
                kind,
                notification.title,
                notification.body,
                notification.todo_id.map(|t| t.value()),
                herald_util::to_storage(&notification.received_at),
                notification.read as i64,
            ],
        )?;

        // Evict the oldest entries past the cap
        let evicted = conn.execute(
            r#"
            DELETE FROM history WHERE position NOT IN (
                SELECT position FROM history ORDER BY position DESC LIMIT ?
            )
            "#,
            [HISTORY_CAP],
        )?;

        if evicted > 0 {
            debug!(evicted, "Evicted oldest history entries");
        }

        Ok(())
    }

    fn list_notifications(&self) -> StoreResult<Vec<Notification>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            r#"
            SELECT id, kind, title, body, todo_id, received_at, read
            FROM history ORDER BY position DESC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let kind: String = row.get(1)?;
            let title: String = row.get(2)?;
            let body: String = row.get(3)?;
            let todo_id: Option<i64> = row.get(4)?;
            let received_at: String = row.get(5)?;
            let read: i64 = row.get(6)?;
            Ok((id, kind, title, body, todo_id, received_at, read))
        })?;

        let mut notifications = Vec::new();
        for row in rows {
            let (id, kind, title, body, todo_id, received_at, read) = row?;
            notifications.push(Notification {
                id: NotificationId::new(id),
                kind: kind_from_db(&kind),
                title,
                body,
                todo_id: todo_id.map(TodoId::new),
                received_at: herald_util::from_storage(&received_at),
                read: read != 0,
            });
        }

        Ok(notifications)
    }

    fn unread_count(&self) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();

        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM history WHERE read = 0", [], |row| {
                row.get(0)
            })?;

        Ok(count as usize)
    }

    fn mark_read(&self, id: &NotificationId) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("UPDATE history SET read = 1 WHERE id = ?", [id.as_str()])?;
        Ok(())
    }

    fn mark_all_read(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute("UPDATE history SET read = 1 WHERE read = 0", [])?;
        debug!(updated, "Marked all notifications read");
        Ok(())
    }

    fn delete_notification(&self, id: &NotificationId) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM history WHERE id = ?", [id.as_str()])?;
        Ok(())
    }

    fn clear_notifications(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM history", [])?;
        Ok(())
    }

    fn enqueue_action(&self, action: &PendingAction) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let kind = action_to_db(action.action)?;
        let data_json = serde_json::to_string(&action.data)?;

        conn.execute(
            r#"
            INSERT INTO offline_actions (id, action, data_json, created_at, retry_count)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                action.id.as_str(),
                kind,
                data_json,
                herald_util::to_storage(&action.created_at),
                action.retry_count,
            ],
        )?;

        debug!(action_id = %action.id, action = %kind, "Offline action enqueued");
        Ok(())
    }

    fn pending_actions(&self) -> StoreResult<Vec<PendingAction>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            r#"
            SELECT id, action, data_json, created_at, retry_count
            FROM offline_actions ORDER BY position ASC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let action: String = row.get(1)?;
            let data_json: String = row.get(2)?;
            let created_at: String = row.get(3)?;
            let retry_count: u32 = row.get(4)?;
            Ok((id, action, data_json, created_at, retry_count))
        })?;

        let mut actions = Vec::new();
        for row in rows {
            let (id, action, data_json, created_at, retry_count) = row?;
            let action: ActionKind =
                serde_json::from_value(serde_json::Value::String(action))?;
            let data: ActionData = serde_json::from_str(&data_json)?;

            actions.push(PendingAction {
                id: ActionId::new(id),
                action,
                data,
                created_at: herald_util::from_storage(&created_at),
                retry_count,
            });
        }

        Ok(actions)
    }

    fn update_retry_count(&self, id: &ActionId, retry_count: u32) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE offline_actions SET retry_count = ? WHERE id = ?",
            params![retry_count, id.as_str()],
        )?;

        Ok(())
    }

    fn remove_action(&self, id: &ActionId) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM offline_actions WHERE id = ?", [id.as_str()])?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn.lock().unwrap();

        let value: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(value)
    }

    fn set_meta(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            INSERT INTO meta (key, value)
            VALUES (?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )?;

        Ok(())
    }

    fn delete_meta(&self, key: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM meta WHERE key = ?", [key])?;
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_api::NotificationEvent;

    fn make_notification(title: &str) -> Notification {
        Notification::from_event(NotificationEvent {
            kind: NotificationKind::TodoReminder,
            title: title.into(),
            body: "body".into(),
            todo_id: Some(TodoId::new(7)),
        })
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_auth_token_round_trip() {
        let store = SqliteStore::in_memory().unwrap();

        assert!(store.auth_token().unwrap().is_none());

        store.set_auth_token("secret").unwrap();
        assert_eq!(store.auth_token().unwrap().as_deref(), Some("secret"));

        store.set_auth_token("rotated").unwrap();
        assert_eq!(store.auth_token().unwrap().as_deref(), Some("rotated"));

        store.clear_auth_token().unwrap();
        assert!(store.auth_token().unwrap().is_none());
    }

    #[test]
    fn test_history_newest_first() {
        let store = SqliteStore::in_memory().unwrap();

        store.append_notification(&make_notification("first")).unwrap();
        store.append_notification(&make_notification("second")).unwrap();

        let list = store.list_notifications().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "second");
        assert_eq!(list[1].title, "first");
    }

    #[test]
    fn test_history_cap_eviction() {
        let store = SqliteStore::in_memory().unwrap();

        for i in 0..HISTORY_CAP + 5 {
            store
                .append_notification(&make_notification(&format!("n{}", i)))
                .unwrap();
        }

        let list = store.list_notifications().unwrap();
        assert_eq!(list.len(), HISTORY_CAP);
        // Newest survives, the first five are gone
        assert_eq!(list[0].title, format!("n{}", HISTORY_CAP + 4));
        assert_eq!(list.last().unwrap().title, "n5");
    }

    #[test]
    fn test_mark_read_and_unread_count() {
        let store = SqliteStore::in_memory().unwrap();

        let a = make_notification("a");
        let b = make_notification("b");
        store.append_notification(&a).unwrap();
        store.append_notification(&b).unwrap();
        assert_eq!(store.unread_count().unwrap(), 2);

        store.mark_read(&a.id).unwrap();
        assert_eq!(store.unread_count().unwrap(), 1);

        let list = store.list_notifications().unwrap();
        let stored_a = list.iter().find(|n| n.id == a.id).unwrap();
        assert!(stored_a.read);
    }

    #[test]
    fn test_mark_all_read_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();

        for i in 0..3 {
            store
                .append_notification(&make_notification(&format!("n{}", i)))
                .unwrap();
        }

        store.mark_all_read().unwrap();
        let once = store.list_notifications().unwrap();

        store.mark_all_read().unwrap();
        let twice = store.list_notifications().unwrap();

        assert_eq!(once, twice);
        assert_eq!(store.unread_count().unwrap(), 0);
    }

    #[test]
    fn test_delete_and_clear() {
        let store = SqliteStore::in_memory().unwrap();

        let a = make_notification("a");
        store.append_notification(&a).unwrap();
        store.append_notification(&make_notification("b")).unwrap();

        store.delete_notification(&a.id).unwrap();
        assert_eq!(store.list_notifications().unwrap().len(), 1);

        store.clear_notifications().unwrap();
        assert!(store.list_notifications().unwrap().is_empty());
    }

    #[test]
    fn test_action_queue_fifo() {
        let store = SqliteStore::in_memory().unwrap();

        let first = PendingAction::new(
            ActionKind::Complete,
            ActionData {
                todo_id: TodoId::new(1),
                minutes: None,
            },
        );
        let second = PendingAction::new(
            ActionKind::Snooze,
            ActionData {
                todo_id: TodoId::new(2),
                minutes: Some(10),
            },
        );

        store.enqueue_action(&first).unwrap();
        store.enqueue_action(&second).unwrap();

        let actions = store.pending_actions().unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].id, first.id);
        assert_eq!(actions[1].id, second.id);
    }

    #[test]
    fn test_action_retry_count_write_back() {
        let store = SqliteStore::in_memory().unwrap();

        let action = PendingAction::new(
            ActionKind::Postpone,
            ActionData {
                todo_id: TodoId::new(3),
                minutes: Some(60),
            },
        );
        store.enqueue_action(&action).unwrap();

        store.update_retry_count(&action.id, 2).unwrap();
        let actions = store.pending_actions().unwrap();
        assert_eq!(actions[0].retry_count, 2);

        store.remove_action(&action.id).unwrap();
        assert!(store.pending_actions().unwrap().is_empty());
    }

    #[test]
    fn test_meta_round_trip() {
        let store = SqliteStore::in_memory().unwrap();

        assert!(store.get_meta("gate").unwrap().is_none());

        store.set_meta("gate", "true").unwrap();
        assert_eq!(store.get_meta("gate").unwrap().as_deref(), Some("true"));

        store.set_meta("gate", "false").unwrap();
        assert_eq!(store.get_meta("gate").unwrap().as_deref(), Some("false"));

        store.delete_meta("gate").unwrap();
        assert!(store.get_meta("gate").unwrap().is_none());
    }

    #[test]
    fn test_on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herald.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set_auth_token("persisted").unwrap();
            store.append_notification(&make_notification("kept")).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.auth_token().unwrap().as_deref(), Some("persisted"));
        assert_eq!(store.list_notifications().unwrap().len(), 1);
    }
}
