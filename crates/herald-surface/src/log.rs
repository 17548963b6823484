//! Logging surface
//!
//! Fallback surface for headless runs: alerts and system notifications go to
//! the log, routes are logged rather than opened, and the permission state is
//! fixed at construction. Interactions never arrive.

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    Alert, AlertKind, Interaction, PermissionState, Surface, SurfaceCapabilities, SurfaceResult,
    SystemNotification,
};

/// Surface that writes everything to the log
pub struct LogSurface {
    capabilities: SurfaceCapabilities,
    permission: PermissionState,
    // Kept alive so the interaction receiver stays open
    _interaction_tx: mpsc::UnboundedSender<Interaction>,
    interaction_rx: Mutex<Option<mpsc::UnboundedReceiver<Interaction>>>,
}

impl LogSurface {
    pub fn new(permission: PermissionState) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            capabilities: SurfaceCapabilities {
                can_show_alerts: true,
                can_show_system_notifications: true,
                can_prompt_permission: false,
                can_run_push_worker: true,
                can_focus_window: false,
            },
            permission,
            _interaction_tx: tx,
            interaction_rx: Mutex::new(Some(rx)),
        }
    }
}

#[async_trait]
impl Surface for LogSurface {
    fn capabilities(&self) -> &SurfaceCapabilities {
        &self.capabilities
    }

    async fn show_alert(&self, alert: Alert) -> SurfaceResult<()> {
        match alert.kind {
            AlertKind::Error | AlertKind::Warning => warn!(
                title = %alert.title,
                body = %alert.body,
                persistent = alert.persistent,
                "Alert"
            ),
            _ => info!(
                title = %alert.title,
                body = %alert.body,
                persistent = alert.persistent,
                "Alert"
            ),
        }
        Ok(())
    }

    async fn show_system_notification(
        &self,
        notification: SystemNotification,
    ) -> SurfaceResult<()> {
        info!(
            tag = %notification.tag,
            title = %notification.title,
            body = %notification.body,
            urgency = ?notification.urgency,
            buttons = notification.buttons.len(),
            "System notification"
        );
        Ok(())
    }

    async fn open_route(&self, route: &str) -> SurfaceResult<()> {
        info!(route = %route, "Open route");
        Ok(())
    }

    fn permission_state(&self) -> PermissionState {
        self.permission
    }

    async fn request_permission(&self) -> SurfaceResult<PermissionState> {
        // Cannot prompt; the configured state is final
        Ok(self.permission)
    }

    fn interactions(&self) -> mpsc::UnboundedReceiver<Interaction> {
        self.interaction_rx
            .lock()
            .unwrap()
            .take()
            .expect("interactions() can only be called once")
    }
}
