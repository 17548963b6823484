//! Surface capabilities model

use serde::{Deserialize, Serialize};

/// Describes what a surface implementation can do
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceCapabilities {
    /// Can show transient in-app alerts
    pub can_show_alerts: bool,

    /// Can show system-level notifications with action buttons
    pub can_show_system_notifications: bool,

    /// Can prompt the user for notification permission
    pub can_prompt_permission: bool,

    /// Can host the background push worker
    pub can_run_push_worker: bool,

    /// Can focus an existing window when opening a route
    pub can_focus_window: bool,
}

impl SurfaceCapabilities {
    /// Create minimal capabilities (alerts only, no push worker)
    pub fn minimal() -> Self {
        Self {
            can_show_alerts: true,
            can_show_system_notifications: false,
            can_prompt_permission: false,
            can_run_push_worker: false,
            can_focus_window: false,
        }
    }

    /// Create capabilities for a full desktop surface
    pub fn full() -> Self {
        Self {
            can_show_alerts: true,
            can_show_system_notifications: true,
            can_prompt_permission: true,
            can_run_push_worker: true,
            can_focus_window: true,
        }
    }
}

impl Default for SurfaceCapabilities {
    fn default() -> Self {
        Self::minimal()
    }
}
