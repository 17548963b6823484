//! Background sync drain
//!
//! Woken when connectivity is restored: replays every pending offline action
//! in insertion order. Each action gets at most three replay attempts across
//! all drain passes before it is dropped. Delivery is at-least-once by
//! design; a call that succeeds server-side but fails client-side will be
//! replayed.

use herald_api::{ActionKind, MAX_ACTION_RETRIES, PendingAction, POSTPONE_MINUTES, SNOOZE_MINUTES};
use herald_store::Store;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{ApiResult, TodoApi};

/// Outcome of one drain pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// Left in the queue with an incremented retry count
    pub retried: usize,
    /// Gave up after the retry cap
    pub dropped: usize,
}

pub struct SyncDrain {
    store: Arc<dyn Store>,
    api: Arc<dyn TodoApi>,
}

impl SyncDrain {
    pub fn new(store: Arc<dyn Store>, api: Arc<dyn TodoApi>) -> Self {
        Self { store, api }
    }

    /// Replay the pending queue once, in insertion order.
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();

        let actions = match self.store.pending_actions() {
            Ok(actions) => actions,
            Err(e) => {
                warn!(error = %e, "Failed to read offline action queue");
                return report;
            }
        };

        if actions.is_empty() {
            debug!("Offline action queue is empty");
            return report;
        }

        info!(count = actions.len(), "Draining offline action queue");

        for action in actions {
            report.attempted += 1;

            match self.replay(&action).await {
                Ok(()) => {
                    debug!(id = %action.id, action = ?action.action, "Queued action replayed");
                    if let Err(e) = self.store.remove_action(&action.id) {
                        warn!(error = %e, id = %action.id, "Failed to remove replayed action");
                    }
                    report.succeeded += 1;
                }
                Err(e) => {
                    let retry_count = action.retry_count + 1;

                    if retry_count >= MAX_ACTION_RETRIES {
                        warn!(
                            id = %action.id,
                            action = ?action.action,
                            retry_count,
                            "Dropping action after final failed replay"
                        );
                        if let Err(e) = self.store.remove_action(&action.id) {
                            warn!(error = %e, id = %action.id, "Failed to drop action");
                        }
                        report.dropped += 1;
                    } else {
                        warn!(
                            id = %action.id,
                            action = ?action.action,
                            error = %e,
                            retry_count,
                            "Replay failed, keeping for next sync"
                        );
                        if let Err(e) = self.store.update_retry_count(&action.id, retry_count) {
                            warn!(error = %e, id = %action.id, "Failed to record retry");
                        }
                        report.retried += 1;
                    }
                }
            }
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            retried = report.retried,
            dropped = report.dropped,
            "Drain pass complete"
        );

        report
    }

    async fn replay(&self, action: &PendingAction) -> ApiResult<()> {
        let todo_id = action.data.todo_id;

        match action.action {
            ActionKind::Complete => self.api.complete(todo_id).await,
            ActionKind::Skip => self.api.skip_today(todo_id).await,
            ActionKind::Snooze => {
                self.api
                    .snooze(todo_id, action.data.minutes.unwrap_or(SNOOZE_MINUTES))
                    .await
            }
            ActionKind::Postpone => {
                self.api
                    .postpone(todo_id, action.data.minutes.unwrap_or(POSTPONE_MINUTES))
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApiCall, MockFailure, MockTodoApi};
    use herald_api::ActionData;
    use herald_store::SqliteStore;
    use herald_util::TodoId;

    fn setup() -> (Arc<dyn Store>, Arc<MockTodoApi>, SyncDrain) {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let api = Arc::new(MockTodoApi::new());
        let drain = SyncDrain::new(store.clone(), api.clone());
        (store, api, drain)
    }

    fn snooze_action(todo_id: i64) -> PendingAction {
        PendingAction::new(
            ActionKind::Snooze,
            ActionData {
                todo_id: TodoId::new(todo_id),
                minutes: Some(10),
            },
        )
    }

    #[tokio::test]
    async fn successful_replay_empties_queue_in_order() {
        let (store, api, drain) = setup();
        store.enqueue_action(&snooze_action(42)).unwrap();
        store
            .enqueue_action(&PendingAction::new(
                ActionKind::Complete,
                ActionData {
                    todo_id: TodoId::new(7),
                    minutes: None,
                },
            ))
            .unwrap();

        let report = drain.drain().await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 2);
        assert!(store.pending_actions().unwrap().is_empty());

        // FIFO: the snooze was enqueued first, so it is replayed first
        let calls = api.calls.lock().unwrap();
        assert_eq!(calls[0], ApiCall::Snooze(TodoId::new(42), 10));
        assert_eq!(calls[1], ApiCall::Complete(TodoId::new(7)));
    }

    #[tokio::test]
    async fn failed_replay_increments_retry_count() {
        let (store, api, drain) = setup();
        store.enqueue_action(&snooze_action(1)).unwrap();
        api.set_failure(Some(MockFailure::Request));

        let report = drain.drain().await;

        assert_eq!(report.retried, 1);
        let pending = store.pending_actions().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].retry_count, 1);
    }

    #[tokio::test]
    async fn action_is_dropped_after_exactly_three_attempts() {
        let (store, api, drain) = setup();
        store.enqueue_action(&snooze_action(1)).unwrap();
        api.set_failure(Some(MockFailure::Request));

        let first = drain.drain().await;
        let second = drain.drain().await;
        let third = drain.drain().await;

        assert_eq!(first.retried, 1);
        assert_eq!(second.retried, 1);
        assert_eq!(third.dropped, 1);
        assert!(store.pending_actions().unwrap().is_empty());

        // Exactly three backend attempts were made, never a fourth
        assert_eq!(api.call_count(), 3);
        assert_eq!(drain.drain().await, DrainReport::default());
        assert_eq!(api.call_count(), 3);
    }

    #[tokio::test]
    async fn partial_failure_keeps_only_failed_actions() {
        let (store, api, drain) = setup();
        store.enqueue_action(&snooze_action(1)).unwrap();

        api.set_failure(Some(MockFailure::Offline));
        drain.drain().await;

        // Connectivity is back for the second pass
        api.set_failure(None);
        let report = drain.drain().await;

        assert_eq!(report.succeeded, 1);
        assert!(store.pending_actions().unwrap().is_empty());
    }
}
