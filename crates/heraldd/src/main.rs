//! heraldd - The herald background service
//!
//! This is the main entry point for the heraldd service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Event stream connection manager
//! - Connectivity monitor
//! - Notification router
//! - Push worker and offline sync drain

use anyhow::{Context, Result};
use clap::Parser;
use herald_config::{Settings, load_config};
use herald_core::{
    ConnectionConfig, ConnectionManager, ConnectivityConfig, ConnectivityEvent,
    ConnectivityMonitor, NotificationRouter, RetryPolicy,
};
use herald_push::{
    ActionProcessor, BackendClient, GatewayTransport, PushConfig, PushWorker, SubscriptionManager,
    SyncDrain, TodoApi,
};
use herald_store::{SqliteStore, Store};
use herald_surface::{LogSurface, PermissionState, Surface};
use herald_util::default_config_path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// heraldd - Notification delivery service for the todo client
#[derive(Parser, Debug)]
#[command(name = "heraldd")]
#[command(about = "Notification delivery service for the todo client", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/heraldd/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set HERALD_DATA_DIR env var)
    #[arg(short, long, env = "HERALD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    settings: Settings,
    store: Arc<dyn Store>,
    surface: Arc<dyn Surface>,
    api: Arc<dyn TodoApi>,
    manager: ConnectionManager,
    stream_events: mpsc::Receiver<herald_api::StreamEvent>,
    router: NotificationRouter,
    drain: SyncDrain,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        // Load configuration
        let settings = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            api_base_url = %settings.server.api_base_url,
            "Configuration loaded"
        );

        // Determine data directory
        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.storage.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        // Initialize store
        let db_path = data_dir.join("heraldd.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        // Headless surface: alerts land in the journal, permission is granted
        let surface: Arc<dyn Surface> = Arc::new(LogSurface::new(PermissionState::Granted));

        // Backend API client
        let api: Arc<dyn TodoApi> = Arc::new(
            BackendClient::new(&settings.server.api_base_url, store.clone())
                .context("Failed to build backend client")?,
        );

        // Event stream connection manager
        let (manager, stream_events) = ConnectionManager::start(
            ConnectionConfig {
                events_url: settings.server.events_url(),
                token_cookie: settings.server.token_cookie.clone(),
                retry: RetryPolicy::default(),
            },
            store.clone(),
        )
        .context("Failed to start connection manager")?;

        let router = NotificationRouter::new(store.clone(), surface.clone());
        let drain = SyncDrain::new(store.clone(), api.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            settings,
            store,
            surface,
            api,
            manager,
            stream_events,
            router,
            drain,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Register the worker, walk the permission flow, subscribe, and spawn
    /// the push worker task. Every failure here degrades to stream-only
    /// operation; none is fatal to the daemon.
    async fn start_push_worker(
        &self,
        processor: Arc<ActionProcessor>,
    ) -> Option<JoinHandle<()>> {
        let subscriptions = SubscriptionManager::new(
            PushConfig {
                enabled: self.settings.push.enabled,
                public_key: self.settings.push.public_key.clone(),
                gateway_url: self.settings.push.gateway_url.clone(),
            },
            self.store.clone(),
            self.surface.clone(),
            self.api.clone(),
        );

        let registration = match subscriptions.register_worker() {
            Ok(Some(registration)) => registration,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Push worker registration failed");
                return None;
            }
        };

        let granted = match subscriptions.ensure_permission_flow().await {
            Ok(granted) => granted,
            Err(e) => {
                warn!(error = %e, "Notification permission flow failed");
                false
            }
        };

        if !granted {
            info!("Notification permission not granted, push disabled");
            return None;
        }

        // The worker still runs if backend registration fails: the gateway
        // stream is independent, and the subscription is retried next start.
        if let Err(e) = subscriptions.subscribe(&registration).await {
            warn!(error = %e, "Push subscription failed");
        }

        let transport = match GatewayTransport::new(&registration.endpoint) {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                warn!(error = %e, "Failed to build gateway transport");
                return None;
            }
        };

        info!(endpoint = %registration.endpoint, "Push worker starting");

        let worker = PushWorker::new(processor, self.surface.clone(), transport);
        Some(tokio::spawn(worker.run(self.shutdown_rx.clone())))
    }

    async fn run(mut self) -> Result<()> {
        // Start connectivity monitor
        let (monitor, mut connectivity_events) = ConnectivityMonitor::new(
            ConnectivityConfig {
                check_url: self.settings.connectivity.check_url.clone(),
                check_interval: self.settings.connectivity.check_interval,
                check_timeout: self.settings.connectivity.check_timeout,
            },
            self.shutdown_rx.clone(),
        )
        .context("Failed to start connectivity monitor")?;
        let monitor_handle = tokio::spawn(monitor.run());

        // Start push worker
        let processor = Arc::new(ActionProcessor::new(
            self.store.clone(),
            self.surface.clone(),
            self.api.clone(),
        ));
        let worker_handle = self.start_push_worker(processor).await;

        // Connect the event stream when a credential is already stored
        match self.store.auth_token() {
            Ok(Some(_)) => self.manager.connect().await,
            Ok(None) => info!("No stored credential, event stream idle"),
            Err(e) => warn!(error = %e, "Failed to read stored credential"),
        }

        // Set up signal handlers
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        // SIGUSR1 is the foreground nudge from the client UI
        let mut sigusr1 =
            signal(SignalKind::user_defined1()).context("Failed to create SIGUSR1 handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                _ = sigusr1.recv() => {
                    info!("Received SIGUSR1, client is foregrounded");
                    self.manager.foregrounded().await;
                }

                // Connectivity transitions
                Some(event) = connectivity_events.recv() => {
                    match event {
                        ConnectivityEvent::Online => {
                            info!("Network available");
                            self.manager.online().await;
                            self.drain.drain().await;
                        }
                        ConnectivityEvent::Offline => {
                            warn!("Network lost");
                            self.manager.offline().await;
                        }
                    }
                }

                // Decoded stream events
                Some(event) = self.stream_events.recv() => {
                    self.router.route(event).await;
                }
            }
        }

        // Graceful shutdown
        info!("Shutting down heraldd");

        self.manager.disconnect().await;
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = worker_handle
            && tokio::time::timeout(Duration::from_secs(5), handle).await.is_err()
        {
            warn!("Push worker did not stop in time");
        }
        if tokio::time::timeout(Duration::from_secs(5), monitor_handle)
            .await
            .is_err()
        {
            warn!("Connectivity monitor did not stop in time");
        }

        info!("Shutdown complete");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging: RUST_LOG wins over the CLI flag
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting heraldd");

    let service = Service::new(&args)?;
    service.run().await
}
