//! Notification router
//!
//! Classifies each inbound stream event and produces exactly one alert plus
//! a durable history append. The router never touches connection state.

use herald_api::{Notification, NotificationEvent, NotificationKind, StreamEvent};
use herald_store::Store;
use herald_surface::{Alert, AlertKind, Surface};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct NotificationRouter {
    store: Arc<dyn Store>,
    surface: Arc<dyn Surface>,
}

impl NotificationRouter {
    pub fn new(store: Arc<dyn Store>, surface: Arc<dyn Surface>) -> Self {
        Self { store, surface }
    }

    /// Handle one decoded stream event.
    pub async fn route(&self, event: StreamEvent) {
        match event {
            StreamEvent::Notification(event) => self.handle_notification(event).await,

            // Heartbeats are the connection manager's concern
            StreamEvent::Heartbeat => {}

            StreamEvent::Malformed { error } => {
                warn!(error = %error, "Malformed event payload");

                let alert = Alert::error(
                    "Notification error",
                    "Received a notification that could not be read",
                );
                if let Err(e) = self.surface.show_alert(alert).await {
                    warn!(error = %e, "Failed to show alert");
                }
            }
        }
    }

    async fn handle_notification(&self, event: NotificationEvent) {
        let notification = Notification::from_event(event);

        debug!(
            id = %notification.id,
            kind = ?notification.kind,
            "Routing notification"
        );

        if let Err(e) = self.store.append_notification(&notification) {
            warn!(error = %e, "Failed to persist notification");
        }

        let alert = Alert {
            kind: alert_kind_for(notification.kind),
            title: notification.title.clone(),
            body: notification.body.clone(),
            route: Some(notification.route()),
            persistent: notification.kind.alert_is_persistent(),
            notification_id: Some(notification.id.clone()),
        };

        if let Err(e) = self.surface.show_alert(alert).await {
            warn!(error = %e, "Failed to show alert");
        }
    }

    /// Handle a click on a previously shown alert: mark the underlying
    /// history entry read and open its route.
    pub async fn alert_clicked(&self, alert: &Alert) {
        if let Some(id) = &alert.notification_id
            && let Err(e) = self.store.mark_read(id)
        {
            warn!(error = %e, "Failed to mark notification read");
        }

        if let Some(route) = &alert.route
            && let Err(e) = self.surface.open_route(route).await
        {
            warn!(error = %e, "Failed to open route");
        }
    }
}

fn alert_kind_for(kind: NotificationKind) -> AlertKind {
    match kind {
        NotificationKind::Achievement => AlertKind::Success,
        NotificationKind::TodoReminder
        | NotificationKind::RoutineReminder
        | NotificationKind::System
        | NotificationKind::Unknown => AlertKind::Info,
    }
}
