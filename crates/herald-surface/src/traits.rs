//! Surface trait

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{Alert, Interaction, PermissionState, SurfaceCapabilities, SystemNotification};

/// Errors from surface operations
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Unsupported on this surface: {0}")]
    Unsupported(String),

    #[error("Display failed: {0}")]
    DisplayFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Surface trait - implemented by platform-specific surfaces
#[async_trait]
pub trait Surface: Send + Sync {
    /// Get the capabilities of this surface
    fn capabilities(&self) -> &SurfaceCapabilities;

    /// Show a transient in-app alert
    async fn show_alert(&self, alert: Alert) -> SurfaceResult<()>;

    /// Show a system-level notification
    async fn show_system_notification(
        &self,
        notification: SystemNotification,
    ) -> SurfaceResult<()>;

    /// Open a deep-link route, focusing an existing window where supported
    async fn open_route(&self, route: &str) -> SurfaceResult<()>;

    /// Current notification permission state
    fn permission_state(&self) -> PermissionState;

    /// Prompt the user for notification permission.
    /// Implementations prompt at most once per call.
    async fn request_permission(&self) -> SurfaceResult<PermissionState>;

    /// Subscribe to notification interactions.
    /// Can only be called once per surface instance.
    fn interactions(&self) -> mpsc::UnboundedReceiver<Interaction>;
}
