//! Event stream connection manager
//!
//! One actor task owns the connection state machine. Commands arrive on an
//! mpsc channel, the current state is published through a watch channel, and
//! decoded stream events flow out on their own channel. Each connect attempt
//! spawns a transport task; only one transport may be live at a time, and a
//! new attempt always tears the previous one down first.

use chrono::{DateTime, Local};
use futures::StreamExt;
use herald_api::StreamEvent;
use herald_store::Store;
use herald_util::HeraldError;
use reqwest::header;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::RetryPolicy;
use crate::SseDecoder;

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

/// Published connection state snapshot
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    /// Human-readable message, set only while reconnecting or failed
    pub error: Option<String>,
    /// Updated on connect and on each heartbeat
    pub last_connected_at: Option<DateTime<Local>>,
    /// Failed attempts since the last successful connect
    pub retry_count: u32,
}

impl ConnectionState {
    fn initial() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            error: None,
            last_connected_at: None,
            retry_count: 0,
        }
    }
}

/// Connection manager configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Full URL of the event stream endpoint
    pub events_url: String,
    /// Name of the cookie carrying the stream credential
    pub token_cookie: String,
    pub retry: RetryPolicy,
}

enum Command {
    Connect,
    Disconnect,
    Online,
    Offline,
    Foregrounded,
}

enum TransportEvent {
    Opened { generation: u64 },
    Event { generation: u64, event: StreamEvent },
    Closed { generation: u64, error: Option<String> },
}

/// Handle to the connection manager actor
#[derive(Clone)]
pub struct ConnectionManager {
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl ConnectionManager {
    /// Spawn the manager actor. Decoded stream events arrive on the returned
    /// receiver; the actor stops when every handle is dropped.
    pub fn start(
        config: ConnectionConfig,
        store: Arc<dyn Store>,
    ) -> herald_util::Result<(Self, mpsc::Receiver<StreamEvent>)> {
        // No overall request timeout: the stream is long-lived by design
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HeraldError::transport(format!("Failed to build HTTP client: {}", e)))?;

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(64);
        let (transport_tx, transport_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(ConnectionState::initial());

        let task = ManagerTask {
            config,
            store,
            client,
            state_tx,
            event_tx,
            transport_tx,
            generation: 0,
            current: None,
            intentional: false,
            retry_at: None,
        };

        tokio::spawn(task.run(cmd_rx, transport_rx));

        Ok((Self { cmd_tx, state_rx }, event_rx))
    }

    /// Manual connect/reconnect. Resets the retry counter first.
    pub async fn connect(&self) {
        let _ = self.cmd_tx.send(Command::Connect).await;
    }

    /// Intentional disconnect. The close is not auto-recovered.
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect).await;
    }

    /// Network came back: reconnect immediately if not already connected.
    pub async fn online(&self) {
        let _ = self.cmd_tx.send(Command::Online).await;
    }

    /// Network went away: close the transport and report failed.
    pub async fn offline(&self) {
        let _ = self.cmd_tx.send(Command::Offline).await;
    }

    /// Foregrounded hint: reconnect if currently disconnected.
    pub async fn foregrounded(&self) {
        let _ = self.cmd_tx.send(Command::Foregrounded).await;
    }

    /// Current state snapshot.
    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Watch channel for state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }
}

struct ManagerTask {
    config: ConnectionConfig,
    store: Arc<dyn Store>,
    client: reqwest::Client,
    state_tx: watch::Sender<ConnectionState>,
    event_tx: mpsc::Sender<StreamEvent>,
    transport_tx: mpsc::Sender<TransportEvent>,
    /// Bumped per connect attempt; events from older transports are stale
    generation: u64,
    current: Option<JoinHandle<()>>,
    /// Set by disconnect so the close handler does not auto-reconnect
    intentional: bool,
    retry_at: Option<Instant>,
}

impl ManagerTask {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut transport_rx: mpsc::Receiver<TransportEvent>,
    ) {
        loop {
            let retry_at = self.retry_at;

            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(ev) = transport_rx.recv() => self.handle_transport(ev).await,
                _ = sleep_until_opt(retry_at) => {
                    self.retry_at = None;
                    self.begin_connect().await;
                }
            }
        }

        self.teardown_transport();
        debug!("Connection manager stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => {
                info!("Manual connect requested");
                self.intentional = false;
                self.retry_at = None;
                self.update(|s| s.retry_count = 0);
                self.begin_connect().await;
            }

            Command::Disconnect => {
                info!("Disconnecting");
                self.intentional = true;
                self.retry_at = None;
                self.teardown_transport();
                self.update(|s| {
                    s.status = ConnectionStatus::Disconnected;
                    s.error = None;
                });
            }

            Command::Online => {
                let status = self.state_tx.borrow().status;
                if matches!(status, ConnectionStatus::Connected | ConnectionStatus::Connecting) {
                    return;
                }

                match self.store.auth_token() {
                    Ok(Some(_)) => {
                        info!("Network online, reconnecting");
                        self.intentional = false;
                        self.retry_at = None;
                        self.update(|s| s.retry_count = 0);
                        self.begin_connect().await;
                    }
                    Ok(None) => debug!("Network online but no stored credential"),
                    Err(e) => warn!(error = %e, "Failed to read stored credential"),
                }
            }

            Command::Offline => {
                info!("Network offline");
                self.retry_at = None;
                self.teardown_transport();
                self.update(|s| {
                    s.status = ConnectionStatus::Failed;
                    s.error = Some("Network offline".to_string());
                });
            }

            Command::Foregrounded => {
                let status = self.state_tx.borrow().status;
                if status == ConnectionStatus::Disconnected {
                    debug!("Foregrounded while disconnected, reconnecting");
                    self.begin_connect().await;
                }
            }
        }
    }

    async fn begin_connect(&mut self) {
        self.teardown_transport();

        // The error field carries a message only while reconnecting or
        // failed; a missing credential just leaves us disconnected
        let token = match self.store.auth_token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                warn!("No stored credential, staying disconnected");
                self.update(|s| {
                    s.status = ConnectionStatus::Disconnected;
                    s.error = None;
                });
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential");
                self.update(|s| {
                    s.status = ConnectionStatus::Disconnected;
                    s.error = None;
                });
                return;
            }
        };

        self.generation += 1;
        let generation = self.generation;

        self.update(|s| {
            s.status = ConnectionStatus::Connecting;
            s.error = None;
        });

        debug!(generation, url = %self.config.events_url, "Opening event stream");

        // The cookie is rebuilt from the stored token on every attempt, so a
        // refreshed token is picked up and stale values never accumulate
        let cookie = format!("{}={}", self.config.token_cookie, token);
        let client = self.client.clone();
        let url = self.config.events_url.clone();
        let tx = self.transport_tx.clone();

        self.current = Some(tokio::spawn(run_transport(client, url, cookie, generation, tx)));
    }

    async fn handle_transport(&mut self, ev: TransportEvent) {
        match ev {
            TransportEvent::Opened { generation } if generation == self.generation => {
                info!("Event stream connected");
                self.update(|s| {
                    s.status = ConnectionStatus::Connected;
                    s.error = None;
                    s.retry_count = 0;
                    s.last_connected_at = Some(herald_util::now());
                });
            }

            TransportEvent::Event { generation, event } if generation == self.generation => {
                if matches!(event, StreamEvent::Heartbeat) {
                    self.update(|s| s.last_connected_at = Some(herald_util::now()));
                }
                let _ = self.event_tx.send(event).await;
            }

            TransportEvent::Closed { generation, error } if generation == self.generation => {
                self.current = None;

                if self.intentional {
                    debug!("Transport closed after intentional disconnect");
                    return;
                }

                self.handle_connection_lost(error);
            }

            // Stale transport, already torn down
            _ => {}
        }
    }

    fn handle_connection_lost(&mut self, error: Option<String>) {
        let retry = self.config.retry.clone();
        let mut schedule = None;

        self.state_tx.send_modify(|s| {
            s.retry_count += 1;

            if retry.retries_remaining(s.retry_count) {
                let delay = retry.delay_for(s.retry_count - 1);
                s.status = ConnectionStatus::Reconnecting;
                s.error = error.clone();
                schedule = Some(delay);

                warn!(
                    retry_count = s.retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Connection lost, retrying"
                );
            } else {
                s.status = ConnectionStatus::Failed;
                s.error = Some(
                    error
                        .clone()
                        .unwrap_or_else(|| "Connection lost".to_string()),
                );

                warn!(retry_count = s.retry_count, "Retries exhausted, reconnect manually");
            }
        });

        self.retry_at = schedule.map(|delay| Instant::now() + delay);
    }

    fn teardown_transport(&mut self) {
        // Also invalidates any events the old transport already buffered;
        // without the bump a dying transport's close report could pass the
        // generation check and re-schedule a retry
        self.generation += 1;
        if let Some(handle) = self.current.take() {
            handle.abort();
            debug!("Transport task stopped");
        }
    }

    fn update(&self, f: impl FnOnce(&mut ConnectionState)) {
        self.state_tx.send_modify(f);
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// One connect attempt: open the stream, decode frames, report the close.
async fn run_transport(
    client: reqwest::Client,
    url: String,
    cookie: String,
    generation: u64,
    tx: mpsc::Sender<TransportEvent>,
) {
    let response = client
        .get(&url)
        .header(header::ACCEPT, "text/event-stream")
        .header(header::COOKIE, cookie)
        .send()
        .await;

    let response = match response {
        Ok(resp) if resp.status().is_success() => resp,
        Ok(resp) => {
            let _ = tx
                .send(TransportEvent::Closed {
                    generation,
                    error: Some(format!("HTTP {}", resp.status())),
                })
                .await;
            return;
        }
        Err(e) => {
            let _ = tx
                .send(TransportEvent::Closed {
                    generation,
                    error: Some(e.to_string()),
                })
                .await;
            return;
        }
    };

    let _ = tx.send(TransportEvent::Opened { generation }).await;

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                for frame in decoder.feed(&bytes) {
                    let event = StreamEvent::classify(frame.event.as_deref(), &frame.data);
                    if tx
                        .send(TransportEvent::Event { generation, event })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = tx
                    .send(TransportEvent::Closed {
                        generation,
                        error: Some(e.to_string()),
                    })
                    .await;
                return;
            }
        }
    }

    // Server closed the stream cleanly
    let _ = tx.send(TransportEvent::Closed { generation, error: None }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_store::SqliteStore;

    // Nothing listens on this port, so connect attempts fail immediately
    const REFUSED_URL: &str = "http://127.0.0.1:9/events";

    fn test_config(max_attempts: u32, base_delay: Duration) -> ConnectionConfig {
        ConnectionConfig {
            events_url: REFUSED_URL.to_string(),
            token_cookie: "sse_token".to_string(),
            retry: RetryPolicy {
                base_delay,
                max_delay: Duration::from_millis(50),
                max_attempts,
            },
        }
    }

    fn store_with_token() -> Arc<dyn Store> {
        let store = SqliteStore::in_memory().unwrap();
        store.set_auth_token("test-token").unwrap();
        Arc::new(store)
    }

    async fn wait_for(
        rx: &mut watch::Receiver<ConnectionState>,
        pred: impl Fn(&ConnectionState) -> bool,
    ) -> ConnectionState {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if pred(&rx.borrow()) {
                    return rx.borrow().clone();
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("timed out waiting for connection state")
    }

    #[tokio::test]
    async fn retries_exhaust_to_failed() {
        let config = test_config(3, Duration::from_millis(5));
        let (manager, _events) = ConnectionManager::start(config, store_with_token()).unwrap();
        let mut state = manager.watch_state();

        manager.connect().await;

        let s = wait_for(&mut state, |s| s.status == ConnectionStatus::Failed).await;
        assert_eq!(s.retry_count, 3);
        assert!(s.error.is_some());
    }

    #[tokio::test]
    async fn manual_connect_resets_retry_count() {
        let config = test_config(3, Duration::from_millis(5));
        let (manager, _events) = ConnectionManager::start(config, store_with_token()).unwrap();
        let mut state = manager.watch_state();

        manager.connect().await;
        wait_for(&mut state, |s| s.status == ConnectionStatus::Failed).await;

        // Reconnect resets the counter to 0 first; without the reset the next
        // failure would land at 4
        state.borrow_and_update();
        manager.connect().await;

        let s = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                state.changed().await.unwrap();
                let current = state.borrow_and_update().clone();
                if current.status == ConnectionStatus::Failed {
                    return current;
                }
            }
        })
        .await
        .expect("timed out waiting for second failure");

        assert_eq!(s.retry_count, 3);
    }

    #[tokio::test]
    async fn disconnect_is_intentional() {
        let config = test_config(10, Duration::from_millis(50));
        let (manager, _events) = ConnectionManager::start(config, store_with_token()).unwrap();
        let mut state = manager.watch_state();

        manager.connect().await;
        wait_for(&mut state, |s| s.status == ConnectionStatus::Reconnecting).await;

        manager.disconnect().await;
        wait_for(&mut state, |s| s.status == ConnectionStatus::Disconnected).await;

        // The pending retry timer was cleared; nothing reconnects
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(manager.state().status, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn offline_forces_failed_with_message() {
        // Long backoff so the manager sits in reconnecting when offline hits
        let config = test_config(10, Duration::from_secs(30));
        let (manager, _events) = ConnectionManager::start(config, store_with_token()).unwrap();
        let mut state = manager.watch_state();

        manager.connect().await;
        wait_for(&mut state, |s| s.status == ConnectionStatus::Reconnecting).await;

        manager.offline().await;
        let s = wait_for(&mut state, |s| s.status == ConnectionStatus::Failed).await;
        assert_eq!(s.error.as_deref(), Some("Network offline"));
    }

    #[tokio::test]
    async fn offline_during_inflight_connect_stays_failed() {
        // Short backoff: a stale failure report that slipped through would
        // schedule a retry and flip the state within milliseconds
        let config = test_config(10, Duration::from_millis(1));
        let (manager, _events) = ConnectionManager::start(config, store_with_token()).unwrap();

        // The refused connect fails within microseconds, so sweeping the gap
        // lands the offline command on both sides of the failure report
        for delay_us in [0u64, 200, 500, 1000, 2000] {
            manager.connect().await;
            tokio::time::sleep(Duration::from_micros(delay_us)).await;
            manager.offline().await;

            let mut state = manager.watch_state();
            let s = wait_for(&mut state, |s| s.status == ConnectionStatus::Failed).await;
            assert_eq!(s.error.as_deref(), Some("Network offline"));

            tokio::time::sleep(Duration::from_millis(100)).await;
            let s = manager.state();
            assert_eq!(s.status, ConnectionStatus::Failed);
            assert_eq!(s.error.as_deref(), Some("Network offline"));
        }
    }

    #[tokio::test]
    async fn connect_without_token_stays_disconnected() {
        let config = test_config(3, Duration::from_millis(5));
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let (manager, _events) = ConnectionManager::start(config, store).unwrap();

        manager.connect().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Disconnected is not an error state; the message stays empty
        let s = manager.state();
        assert_eq!(s.status, ConnectionStatus::Disconnected);
        assert_eq!(s.error, None);
        assert_eq!(s.retry_count, 0);
    }

    #[tokio::test]
    async fn online_without_token_does_nothing() {
        let config = test_config(3, Duration::from_millis(5));
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let (manager, _events) = ConnectionManager::start(config, store).unwrap();

        manager.online().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let s = manager.state();
        assert_eq!(s.status, ConnectionStatus::Disconnected);
        assert_eq!(s.retry_count, 0);
    }
}
