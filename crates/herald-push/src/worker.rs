//! Push worker
//!
//! An isolated background task that receives events independent of the
//! foreground stream: it runs the gateway transport, feeds payloads to the
//! action processor, and dispatches notification interactions back to it.

use async_trait::async_trait;
use futures::StreamExt;
use herald_api::EVENT_HEARTBEAT;
use herald_core::SseDecoder;
use herald_surface::Surface;
use herald_util::HeraldError;
use reqwest::header;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::ActionProcessor;

/// Transport feeding raw push payloads to the worker
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Deliver payloads until shutdown is signalled or the receiver closes.
    async fn run(&self, payload_tx: mpsc::Sender<String>, shutdown_rx: watch::Receiver<bool>);
}

/// SSE transport against the push gateway's worker endpoint.
///
/// Keeps its own flat reconnect loop: the gateway stream is a background
/// concern, so there is no status to surface and no retry cap to honor.
pub struct GatewayTransport {
    client: reqwest::Client,
    endpoint: String,
    retry_delay: Duration,
}

impl GatewayTransport {
    pub fn new(endpoint: impl Into<String>) -> herald_util::Result<Self> {
        // No overall request timeout: the stream is long-lived
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HeraldError::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            retry_delay: Duration::from_secs(5),
        })
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn stream_once(&self, payload_tx: &mpsc::Sender<String>) -> Result<(), String> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        debug!(endpoint = %self.endpoint, "Gateway stream open");

        let mut decoder = SseDecoder::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let bytes = chunk.map_err(|e| e.to_string())?;
            for frame in decoder.feed(&bytes) {
                if frame.event.as_deref() == Some(EVENT_HEARTBEAT) {
                    continue;
                }
                if payload_tx.send(frame.data).await.is_err() {
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl PushTransport for GatewayTransport {
    async fn run(&self, payload_tx: mpsc::Sender<String>, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                result = self.stream_once(&payload_tx) => {
                    match result {
                        Ok(()) => debug!("Gateway stream closed"),
                        Err(e) => warn!(error = %e, "Gateway stream error"),
                    }
                }
                _ = shutdown_signalled(&mut shutdown_rx) => return,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.retry_delay) => {}
                _ = shutdown_signalled(&mut shutdown_rx) => return,
            }
        }
    }
}

/// Mock transport delivering a scripted set of payloads, then idling
pub struct MockPushTransport {
    payloads: Mutex<Vec<String>>,
}

impl MockPushTransport {
    pub fn new(payloads: Vec<String>) -> Self {
        Self {
            payloads: Mutex::new(payloads),
        }
    }
}

#[async_trait]
impl PushTransport for MockPushTransport {
    async fn run(&self, payload_tx: mpsc::Sender<String>, mut shutdown_rx: watch::Receiver<bool>) {
        let payloads = std::mem::take(&mut *self.payloads.lock().unwrap());

        for payload in payloads {
            if payload_tx.send(payload).await.is_err() {
                return;
            }
        }

        shutdown_signalled(&mut shutdown_rx).await;
    }
}

/// The push worker task: transport payloads in, processed actions out
pub struct PushWorker {
    processor: Arc<ActionProcessor>,
    surface: Arc<dyn Surface>,
    transport: Arc<dyn PushTransport>,
}

impl PushWorker {
    pub fn new(
        processor: Arc<ActionProcessor>,
        surface: Arc<dyn Surface>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            processor,
            surface,
            transport,
        }
    }

    /// Run until shutdown. Takes the surface's interaction receiver, so at
    /// most one worker may run per surface instance.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let (payload_tx, mut payload_rx) = mpsc::channel(32);

        let transport = self.transport.clone();
        let transport_shutdown = shutdown_rx.clone();
        let transport_task =
            tokio::spawn(async move { transport.run(payload_tx, transport_shutdown).await });

        let mut interactions = self.surface.interactions();

        info!("Push worker running");

        loop {
            tokio::select! {
                Some(payload) = payload_rx.recv() => {
                    self.processor.handle_push(&payload).await;
                }
                Some(interaction) = interactions.recv() => {
                    self.processor.handle_interaction(interaction).await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        transport_task.abort();
        info!("Push worker stopped");
    }
}

/// Resolves when shutdown is signalled or the sender side is gone.
async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
