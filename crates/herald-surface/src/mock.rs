//! Mock surface for testing

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::{
    Alert, Interaction, InteractionChoice, PermissionState, Surface, SurfaceCapabilities,
    SurfaceError, SurfaceResult, SystemNotification,
};

/// Mock surface for unit/integration testing
pub struct MockSurface {
    capabilities: SurfaceCapabilities,

    /// Every alert shown, in order
    pub alerts: Arc<Mutex<Vec<Alert>>>,

    /// Every system notification shown, in order
    pub system_notifications: Arc<Mutex<Vec<SystemNotification>>>,

    /// Every route opened, in order
    pub opened_routes: Arc<Mutex<Vec<String>>>,

    /// Configure alert display to fail
    pub fail_alert: Arc<Mutex<bool>>,

    /// Configure system notification display to fail
    pub fail_system_notification: Arc<Mutex<bool>>,

    /// Number of times the permission prompt was shown
    pub prompt_count: Arc<Mutex<u32>>,

    permission: Arc<Mutex<PermissionState>>,
    prompt_result: Arc<Mutex<PermissionState>>,
    interaction_tx: mpsc::UnboundedSender<Interaction>,
    interaction_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<Interaction>>>>,
}

impl MockSurface {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            capabilities: SurfaceCapabilities::full(),
            alerts: Arc::new(Mutex::new(Vec::new())),
            system_notifications: Arc::new(Mutex::new(Vec::new())),
            opened_routes: Arc::new(Mutex::new(Vec::new())),
            fail_alert: Arc::new(Mutex::new(false)),
            fail_system_notification: Arc::new(Mutex::new(false)),
            prompt_count: Arc::new(Mutex::new(0)),
            permission: Arc::new(Mutex::new(PermissionState::Default)),
            prompt_result: Arc::new(Mutex::new(PermissionState::Granted)),
            interaction_tx: tx,
            interaction_rx: Arc::new(Mutex::new(Some(rx))),
        }
    }

    pub fn with_capabilities(mut self, caps: SurfaceCapabilities) -> Self {
        self.capabilities = caps;
        self
    }

    /// Set the current permission state
    pub fn set_permission(&self, state: PermissionState) {
        *self.permission.lock().unwrap() = state;
    }

    /// Set what the permission becomes after prompting
    pub fn set_prompt_result(&self, state: PermissionState) {
        *self.prompt_result.lock().unwrap() = state;
    }

    /// Simulate the user pressing a button on a shown notification
    pub fn inject_interaction(&self, tag: impl Into<String>, choice: InteractionChoice) {
        let _ = self.interaction_tx.send(Interaction {
            tag: tag.into(),
            choice,
        });
    }

    /// Titles of shown alerts, for assertions
    pub fn alert_titles(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.title.clone())
            .collect()
    }
}

impl Default for MockSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Surface for MockSurface {
    fn capabilities(&self) -> &SurfaceCapabilities {
        &self.capabilities
    }

    async fn show_alert(&self, alert: Alert) -> SurfaceResult<()> {
        if *self.fail_alert.lock().unwrap() {
            return Err(SurfaceError::DisplayFailed("Mock alert failure".into()));
        }
        self.alerts.lock().unwrap().push(alert);
        Ok(())
    }

    async fn show_system_notification(
        &self,
        notification: SystemNotification,
    ) -> SurfaceResult<()> {
        if *self.fail_system_notification.lock().unwrap() {
            return Err(SurfaceError::DisplayFailed(
                "Mock notification failure".into(),
            ));
        }
        self.system_notifications.lock().unwrap().push(notification);
        Ok(())
    }

    async fn open_route(&self, route: &str) -> SurfaceResult<()> {
        self.opened_routes.lock().unwrap().push(route.to_string());
        Ok(())
    }

    fn permission_state(&self) -> PermissionState {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> SurfaceResult<PermissionState> {
        *self.prompt_count.lock().unwrap() += 1;
        let result = *self.prompt_result.lock().unwrap();
        *self.permission.lock().unwrap() = result;
        Ok(result)
    }

    fn interactions(&self) -> mpsc::UnboundedReceiver<Interaction> {
        self.interaction_rx
            .lock()
            .unwrap()
            .take()
            .expect("interactions() can only be called once")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_records_alerts_and_routes() {
        let surface = MockSurface::new();

        surface.show_alert(Alert::info("Hi", "there")).await.unwrap();
        surface.open_route("/todo/7").await.unwrap();

        assert_eq!(surface.alert_titles(), vec!["Hi"]);
        assert_eq!(surface.opened_routes.lock().unwrap().as_slice(), ["/todo/7"]);
    }

    #[tokio::test]
    async fn mock_permission_prompt() {
        let surface = MockSurface::new();
        surface.set_prompt_result(PermissionState::Denied);

        assert_eq!(surface.permission_state(), PermissionState::Default);
        let result = surface.request_permission().await.unwrap();

        assert_eq!(result, PermissionState::Denied);
        assert_eq!(surface.permission_state(), PermissionState::Denied);
        assert_eq!(*surface.prompt_count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn mock_interaction_injection() {
        let surface = MockSurface::new();
        let mut rx = surface.interactions();

        surface.inject_interaction("tag-1", InteractionChoice::Complete);

        let interaction = rx.recv().await.unwrap();
        assert_eq!(interaction.tag, "tag-1");
        assert_eq!(interaction.choice, InteractionChoice::Complete);
    }
}
