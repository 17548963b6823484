//! Background action processor
//!
//! Runs on the push worker's task: turns an inbound push payload into a
//! system notification with actionable buttons, and executes the selected
//! action against the backend when the user interacts with it. Connectivity
//! failures enqueue the action for the sync drain instead.

use herald_api::{
    ActionData, ActionKind, NotificationEvent, NotificationKind, POSTPONE_MINUTES, PendingAction,
    SNOOZE_MINUTES, route_for,
};
use herald_store::Store;
use herald_surface::{
    Interaction, InteractionChoice, NotificationButton, Surface, SystemNotification, Urgency,
};
use herald_util::{NotificationId, TodoId};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::{ApiError, TodoApi};

/// Most contexts kept for un-clicked notifications; the oldest are evicted
/// past this, like the history cap in the store
const MAX_PENDING_CONTEXTS: usize = 64;

/// What an interaction needs to know about the notification it came from
#[derive(Debug, Clone)]
struct PushContext {
    kind: NotificationKind,
    todo_id: Option<TodoId>,
}

pub struct ActionProcessor {
    store: Arc<dyn Store>,
    surface: Arc<dyn Surface>,
    api: Arc<dyn TodoApi>,
    /// Contexts of shown notifications in display order, consumed on
    /// interaction, bounded by [`MAX_PENDING_CONTEXTS`]
    contexts: Mutex<VecDeque<(String, PushContext)>>,
}

impl ActionProcessor {
    pub fn new(store: Arc<dyn Store>, surface: Arc<dyn Surface>, api: Arc<dyn TodoApi>) -> Self {
        Self {
            store,
            surface,
            api,
            contexts: Mutex::new(VecDeque::new()),
        }
    }

    /// Handle one raw push payload: parse, build the per-kind display
    /// options, and show a system notification.
    pub async fn handle_push(&self, payload: &str) {
        let event = match serde_json::from_str::<NotificationEvent>(payload) {
            Ok(event) => event,
            Err(e) => {
                // Not JSON we know; show the raw text rather than dropping it
                debug!(error = %e, "Push payload is not structured, using plain text");
                NotificationEvent {
                    kind: NotificationKind::Unknown,
                    title: "Notification".to_string(),
                    body: payload.to_string(),
                    todo_id: None,
                }
            }
        };

        let tag = NotificationId::generate().to_string();
        let (icon, urgency, buttons) = display_profile(event.kind);

        {
            let mut contexts = self.contexts.lock().unwrap();
            contexts.push_back((
                tag.clone(),
                PushContext {
                    kind: event.kind,
                    todo_id: event.todo_id,
                },
            ));
            while contexts.len() > MAX_PENDING_CONTEXTS {
                contexts.pop_front();
            }
        }

        let notification = SystemNotification {
            tag,
            title: event.title,
            body: event.body,
            icon: icon.to_string(),
            urgency,
            buttons,
        };

        debug!(kind = ?event.kind, "Showing push notification");

        if let Err(e) = self.surface.show_system_notification(notification).await {
            warn!(error = %e, "Failed to show push notification");
        }
    }

    /// Handle a user interaction with a previously shown notification.
    pub async fn handle_interaction(&self, interaction: Interaction) {
        let context = {
            let mut contexts = self.contexts.lock().unwrap();
            contexts
                .iter()
                .position(|(tag, _)| *tag == interaction.tag)
                .and_then(|i| contexts.remove(i))
                .map(|(_, context)| context)
        };

        let Some(context) = context else {
            debug!(tag = %interaction.tag, "Interaction for unknown notification");
            return;
        };

        debug!(tag = %interaction.tag, choice = ?interaction.choice, "Handling interaction");

        match interaction.choice {
            InteractionChoice::Complete => {
                self.run_action(ActionKind::Complete, context.todo_id, None)
                    .await;
            }
            InteractionChoice::Skip => {
                self.run_action(ActionKind::Skip, context.todo_id, None)
                    .await;
            }
            InteractionChoice::Snooze => {
                self.run_action(ActionKind::Snooze, context.todo_id, Some(SNOOZE_MINUTES))
                    .await;
            }
            InteractionChoice::Postpone => {
                self.run_action(
                    ActionKind::Postpone,
                    context.todo_id,
                    Some(POSTPONE_MINUTES),
                )
                .await;
            }
            InteractionChoice::View
            | InteractionChoice::Acknowledge
            | InteractionChoice::Default => {
                let route = route_for(context.kind, context.todo_id);
                if let Err(e) = self.surface.open_route(&route).await {
                    warn!(error = %e, route = %route, "Failed to open route");
                }
            }
        }
    }

    /// Execute one action against the backend, with the offline-queue and
    /// auth error handling the background path requires.
    async fn run_action(&self, action: ActionKind, todo_id: Option<TodoId>, minutes: Option<u32>) {
        // Validated locally; an action without a target never goes out
        let Some(todo_id) = todo_id else {
            warn!(action = ?action, "Action without a todo reference");
            self.notify(
                "Action failed",
                "This notification does not reference a todo",
                Urgency::Normal,
            )
            .await;
            return;
        };

        let result = match action {
            ActionKind::Complete => self.api.complete(todo_id).await,
            ActionKind::Skip => self.api.skip_today(todo_id).await,
            ActionKind::Snooze => {
                self.api
                    .snooze(todo_id, minutes.unwrap_or(SNOOZE_MINUTES))
                    .await
            }
            ActionKind::Postpone => {
                self.api
                    .postpone(todo_id, minutes.unwrap_or(POSTPONE_MINUTES))
                    .await
            }
        };

        match result {
            Ok(()) => {
                debug!(action = ?action, todo_id = %todo_id, "Action completed");
            }

            Err(e) if e.is_offline() => {
                let pending = PendingAction::new(action, ActionData { todo_id, minutes });

                match self.store.enqueue_action(&pending) {
                    Ok(()) => {
                        info!(action = ?action, todo_id = %todo_id, "Action queued for sync");
                        self.notify(
                            "Saved",
                            "You're offline; this will sync when you're back online",
                            Urgency::Low,
                        )
                        .await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to queue offline action");
                        self.notify("Action failed", "Could not save the action", Urgency::Normal)
                            .await;
                    }
                }
            }

            Err(ApiError::Auth) => {
                warn!(action = ?action, "Authentication required");
                self.notify(
                    "Sign-in required",
                    "Please sign in again to complete this action",
                    Urgency::Normal,
                )
                .await;
            }

            Err(e) => {
                warn!(action = ?action, error = %e, "Action failed");
                self.notify("Action failed", &e.to_string(), Urgency::Normal)
                    .await;
            }
        }
    }

    /// Show a buttonless status notification.
    async fn notify(&self, title: &str, body: &str, urgency: Urgency) {
        let notification = SystemNotification {
            tag: NotificationId::generate().to_string(),
            title: title.to_string(),
            body: body.to_string(),
            icon: "status".to_string(),
            urgency,
            buttons: Vec::new(),
        };

        if let Err(e) = self.surface.show_system_notification(notification).await {
            warn!(error = %e, "Failed to show status notification");
        }
    }
}

/// Per-kind display options: icon, urgency, and action buttons.
fn display_profile(kind: NotificationKind) -> (&'static str, Urgency, Vec<NotificationButton>) {
    match kind {
        NotificationKind::TodoReminder => (
            "todo",
            Urgency::Normal,
            vec![
                NotificationButton::new(InteractionChoice::Complete, "Complete"),
                NotificationButton::new(InteractionChoice::Snooze, "Snooze 10 min"),
                NotificationButton::new(InteractionChoice::View, "View"),
            ],
        ),
        NotificationKind::RoutineReminder => (
            "routine",
            Urgency::Normal,
            vec![
                NotificationButton::new(InteractionChoice::Complete, "Complete"),
                NotificationButton::new(InteractionChoice::Skip, "Skip today"),
                NotificationButton::new(InteractionChoice::Postpone, "Postpone 1 hour"),
            ],
        ),
        NotificationKind::Achievement => (
            "achievement",
            Urgency::Low,
            vec![NotificationButton::new(InteractionChoice::View, "View")],
        ),
        NotificationKind::System => (
            "system",
            Urgency::Normal,
            vec![NotificationButton::new(InteractionChoice::Acknowledge, "OK")],
        ),
        NotificationKind::Unknown => (
            "notification",
            Urgency::Normal,
            vec![NotificationButton::new(InteractionChoice::Acknowledge, "OK")],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApiCall, MockFailure, MockTodoApi};
    use herald_store::SqliteStore;
    use herald_surface::MockSurface;

    struct Fixture {
        store: Arc<dyn Store>,
        surface: Arc<MockSurface>,
        api: Arc<MockTodoApi>,
        processor: ActionProcessor,
    }

    fn setup() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let surface = Arc::new(MockSurface::new());
        let api = Arc::new(MockTodoApi::new());
        let processor = ActionProcessor::new(store.clone(), surface.clone(), api.clone());
        Fixture {
            store,
            surface,
            api,
            processor,
        }
    }

    fn todo_payload(todo_id: i64) -> String {
        format!(
            r#"{{"type":"todo-reminder","title":"Water plants","body":"Due now","todoId":{}}}"#,
            todo_id
        )
    }

    fn shown_tag(surface: &MockSurface) -> String {
        surface.system_notifications.lock().unwrap()[0].tag.clone()
    }

    #[tokio::test]
    async fn push_shows_notification_with_kind_buttons() {
        let f = setup();

        f.processor.handle_push(&todo_payload(7)).await;

        let shown = f.surface.system_notifications.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Water plants");

        let choices: Vec<_> = shown[0].buttons.iter().map(|b| b.choice).collect();
        assert_eq!(
            choices,
            [
                InteractionChoice::Complete,
                InteractionChoice::Snooze,
                InteractionChoice::View
            ]
        );
    }

    #[tokio::test]
    async fn plain_text_payload_falls_back() {
        let f = setup();

        f.processor.handle_push("server maintenance at noon").await;

        let shown = f.surface.system_notifications.lock().unwrap();
        assert_eq!(shown[0].title, "Notification");
        assert_eq!(shown[0].body, "server maintenance at noon");
        assert_eq!(shown[0].buttons[0].choice, InteractionChoice::Acknowledge);
    }

    #[tokio::test]
    async fn complete_interaction_calls_backend() {
        let f = setup();
        f.processor.handle_push(&todo_payload(7)).await;
        let tag = shown_tag(&f.surface);

        f.processor
            .handle_interaction(Interaction {
                tag: tag.clone(),
                choice: InteractionChoice::Complete,
            })
            .await;

        assert_eq!(
            f.api.calls.lock().unwrap().as_slice(),
            [ApiCall::Complete(TodoId::new(7))]
        );

        // Context is consumed; replaying the interaction does nothing
        f.processor
            .handle_interaction(Interaction {
                tag,
                choice: InteractionChoice::Complete,
            })
            .await;
        assert_eq!(f.api.call_count(), 1);
    }

    #[tokio::test]
    async fn snooze_and_postpone_use_fixed_offsets() {
        let f = setup();

        f.processor.handle_push(&todo_payload(7)).await;
        f.processor
            .handle_interaction(Interaction {
                tag: shown_tag(&f.surface),
                choice: InteractionChoice::Snooze,
            })
            .await;

        f.surface.system_notifications.lock().unwrap().clear();
        f.processor
            .handle_push(r#"{"type":"routine-reminder","title":"Stretch","body":"","todoId":9}"#)
            .await;
        f.processor
            .handle_interaction(Interaction {
                tag: shown_tag(&f.surface),
                choice: InteractionChoice::Postpone,
            })
            .await;

        let calls = f.api.calls.lock().unwrap();
        assert_eq!(calls[0], ApiCall::Snooze(TodoId::new(7), 10));
        assert_eq!(calls[1], ApiCall::Postpone(TodoId::new(9), 60));
    }

    #[tokio::test]
    async fn view_opens_kind_route() {
        let f = setup();
        f.processor.handle_push(&todo_payload(7)).await;

        f.processor
            .handle_interaction(Interaction {
                tag: shown_tag(&f.surface),
                choice: InteractionChoice::View,
            })
            .await;

        assert!(f.api.calls.lock().unwrap().is_empty());
        assert_eq!(
            f.surface.opened_routes.lock().unwrap().as_slice(),
            ["/todo/7"]
        );
    }

    #[tokio::test]
    async fn offline_failure_queues_action_with_confirmation() {
        let f = setup();
        f.api.set_failure(Some(MockFailure::Offline));

        f.processor.handle_push(&todo_payload(42)).await;
        f.processor
            .handle_interaction(Interaction {
                tag: shown_tag(&f.surface),
                choice: InteractionChoice::Snooze,
            })
            .await;

        let pending = f.store.pending_actions().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].action, ActionKind::Snooze);
        assert_eq!(pending[0].data.todo_id, TodoId::new(42));
        assert_eq!(pending[0].data.minutes, Some(10));
        assert_eq!(pending[0].retry_count, 0);

        let shown = f.surface.system_notifications.lock().unwrap();
        assert_eq!(shown.last().unwrap().title, "Saved");
    }

    #[tokio::test]
    async fn auth_failure_is_not_queued() {
        let f = setup();
        f.api.set_failure(Some(MockFailure::Auth));

        f.processor.handle_push(&todo_payload(7)).await;
        f.processor
            .handle_interaction(Interaction {
                tag: shown_tag(&f.surface),
                choice: InteractionChoice::Complete,
            })
            .await;

        assert!(f.store.pending_actions().unwrap().is_empty());
        let shown = f.surface.system_notifications.lock().unwrap();
        assert_eq!(shown.last().unwrap().title, "Sign-in required");
    }

    #[tokio::test]
    async fn unclicked_contexts_are_evicted_past_cap() {
        let f = setup();

        for i in 0..=(MAX_PENDING_CONTEXTS as i64) {
            f.processor.handle_push(&todo_payload(i)).await;
        }

        let (oldest, newest) = {
            let shown = f.surface.system_notifications.lock().unwrap();
            assert_eq!(shown.len(), MAX_PENDING_CONTEXTS + 1);
            (shown[0].tag.clone(), shown.last().unwrap().tag.clone())
        };

        // The oldest context was evicted, so its interaction is a no-op
        f.processor
            .handle_interaction(Interaction {
                tag: oldest,
                choice: InteractionChoice::Complete,
            })
            .await;
        assert!(f.api.calls.lock().unwrap().is_empty());

        f.processor
            .handle_interaction(Interaction {
                tag: newest,
                choice: InteractionChoice::Complete,
            })
            .await;
        assert_eq!(
            f.api.calls.lock().unwrap().as_slice(),
            [ApiCall::Complete(TodoId::new(MAX_PENDING_CONTEXTS as i64))]
        );
    }

    #[tokio::test]
    async fn missing_todo_id_is_rejected_locally() {
        let f = setup();

        f.processor
            .handle_push(r#"{"type":"todo-reminder","title":"??","body":""}"#)
            .await;
        f.processor
            .handle_interaction(Interaction {
                tag: shown_tag(&f.surface),
                choice: InteractionChoice::Complete,
            })
            .await;

        assert!(f.api.calls.lock().unwrap().is_empty());
        assert!(f.store.pending_actions().unwrap().is_empty());
        let shown = f.surface.system_notifications.lock().unwrap();
        assert_eq!(shown.last().unwrap().title, "Action failed");
    }
}
