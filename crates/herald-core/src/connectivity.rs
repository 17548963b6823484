//! Network connectivity monitoring
//!
//! Probes a configured URL on an interval and emits edge-triggered
//! online/offline transitions. Transitions feed the connection manager's
//! network handling and trigger the sync drain.

use chrono::{DateTime, Local};
use herald_util::HeraldError;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc, watch};
use tracing::{debug, info};

/// Connectivity transitions, emitted only on change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

/// Configuration for the connectivity monitor
#[derive(Debug, Clone)]
pub struct ConnectivityConfig {
    /// URL probed for network reachability
    pub check_url: String,
    pub check_interval: Duration,
    pub check_timeout: Duration,
}

/// Cached probe result
#[derive(Debug, Clone)]
struct CheckResult {
    connected: bool,
    checked_at: DateTime<Local>,
}

/// Connectivity monitor that tracks network availability
pub struct ConnectivityMonitor {
    client: Client,
    config: ConnectivityConfig,
    status: Arc<RwLock<Option<CheckResult>>>,
    event_tx: mpsc::Sender<ConnectivityEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ConnectivityMonitor {
    pub fn new(
        config: ConnectivityConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> herald_util::Result<(Self, mpsc::Receiver<ConnectivityEvent>)> {
        let (event_tx, event_rx) = mpsc::channel(32);

        let client = Client::builder()
            .timeout(config.check_timeout)
            .connect_timeout(config.check_timeout)
            .build()
            .map_err(|e| HeraldError::transport(format!("Failed to build HTTP client: {}", e)))?;

        let monitor = Self {
            client,
            config,
            status: Arc::new(RwLock::new(None)),
            event_tx,
            shutdown_rx,
        };

        Ok((monitor, event_rx))
    }

    /// Handle for reading the current status elsewhere in the daemon.
    pub fn handle(&self) -> ConnectivityHandle {
        ConnectivityHandle {
            status: self.status.clone(),
        }
    }

    /// Run until shutdown is signalled. The first probe fires immediately.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.config.check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let connected =
                        check_url_reachable(&self.client, &self.config.check_url).await;
                    update_status(&self.status, &self.event_tx, connected).await;
                }
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Connectivity monitor stopped");
    }
}

/// Handle for accessing connectivity status from other parts of the daemon
#[derive(Clone)]
pub struct ConnectivityHandle {
    status: Arc<RwLock<Option<CheckResult>>>,
}

impl ConnectivityHandle {
    /// Current connectivity status; false until the first probe completes.
    pub async fn is_connected(&self) -> bool {
        self.status
            .read()
            .await
            .as_ref()
            .is_some_and(|r| r.connected)
    }

    /// Time of the last completed probe.
    pub async fn last_check_time(&self) -> Option<DateTime<Local>> {
        self.status.read().await.as_ref().map(|r| r.checked_at)
    }
}

/// Check if a URL is reachable. A 204 counts as success.
async fn check_url_reachable(client: &Client, url: &str) -> bool {
    debug!(url = %url, "Checking connectivity");

    match client.get(url).send().await {
        Ok(response) => {
            let status = response.status();
            let connected = status.is_success() || status.as_u16() == 204;
            debug!(url = %url, status = %status, connected, "Connectivity check complete");
            connected
        }
        Err(e) => {
            debug!(url = %url, error = %e, "Connectivity check failed");
            false
        }
    }
}

/// Record a probe result and emit an event if the status flipped.
async fn update_status(
    status: &Arc<RwLock<Option<CheckResult>>>,
    event_tx: &mpsc::Sender<ConnectivityEvent>,
    connected: bool,
) {
    let mut guard = status.write().await;
    let previous = guard.as_ref().map(|r| r.connected);

    *guard = Some(CheckResult {
        connected,
        checked_at: herald_util::now(),
    });
    drop(guard);

    if previous != Some(connected) {
        info!(connected, "Connectivity status changed");

        let event = if connected {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        };
        let _ = event_tx.send(event).await;
    }
}
