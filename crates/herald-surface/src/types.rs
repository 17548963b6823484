//! Surface display types

use herald_util::NotificationId;
use serde::{Deserialize, Serialize};

/// Visual flavor of a transient in-app alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient in-app alert
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub body: String,
    /// Deep-link route opened when the alert is clicked
    pub route: Option<String>,
    /// Persistent alerts stay on screen until dismissed
    pub persistent: bool,
    /// History entry this alert belongs to, marked read on click
    pub notification_id: Option<NotificationId>,
}

impl Alert {
    /// A one-shot informational alert with no click target.
    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Info,
            title: title.into(),
            body: body.into(),
            route: None,
            persistent: false,
            notification_id: None,
        }
    }

    /// A one-shot error alert with no click target.
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Error,
            title: title.into(),
            body: body.into(),
            route: None,
            persistent: false,
            notification_id: None,
        }
    }
}

/// Urgency of a system-level notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Normal,
    Critical,
}

/// The button the user pressed on a system notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionChoice {
    Complete,
    Snooze,
    Skip,
    Postpone,
    View,
    Acknowledge,
    /// Click on the notification body rather than a button
    Default,
}

/// One action button on a system notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationButton {
    pub choice: InteractionChoice,
    pub label: String,
}

impl NotificationButton {
    pub fn new(choice: InteractionChoice, label: impl Into<String>) -> Self {
        Self {
            choice,
            label: label.into(),
        }
    }
}

/// A system-level notification shown while the foreground may be unloaded
#[derive(Debug, Clone, PartialEq)]
pub struct SystemNotification {
    /// Correlates a later interaction back to this notification
    pub tag: String,
    pub title: String,
    pub body: String,
    /// Icon reference (opaque, interpreted by the surface)
    pub icon: String,
    pub urgency: Urgency,
    pub buttons: Vec<NotificationButton>,
}

/// A user interaction with a previously shown system notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub tag: String,
    pub choice: InteractionChoice,
}

/// Notification permission state reported by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    Denied,
    /// Not yet asked
    Default,
}
