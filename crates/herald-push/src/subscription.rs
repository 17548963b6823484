//! Push subscription manager
//!
//! Ensures the device can receive events while the foreground stream is not
//! connected: registers the push worker at the gateway, runs the one-time
//! permission flow, and creates/tears down the subscription with the backend.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use herald_api::{PushSubscription, SubscriptionKeys};
use herald_store::{META_PERMISSION_FLOW_DONE, META_PUSH_SUBSCRIPTION, Store};
use herald_surface::{PermissionState, Surface};
use herald_util::{HeraldError, RegistrationToken};
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::TodoApi;

/// Push configuration, as the subscription manager needs it
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub enabled: bool,
    /// Server-provided public key, base64url without padding
    pub public_key: Option<String>,
    pub gateway_url: Option<String>,
}

/// A registered push worker: its gateway token and the stream endpoint
/// derived from it
#[derive(Debug, Clone)]
pub struct WorkerRegistration {
    pub token: RegistrationToken,
    pub endpoint: String,
}

pub struct SubscriptionManager {
    config: PushConfig,
    store: Arc<dyn Store>,
    surface: Arc<dyn Surface>,
    api: Arc<dyn TodoApi>,
}

impl SubscriptionManager {
    pub fn new(
        config: PushConfig,
        store: Arc<dyn Store>,
        surface: Arc<dyn Surface>,
        api: Arc<dyn TodoApi>,
    ) -> Self {
        Self {
            config,
            store,
            surface,
            api,
        }
    }

    /// Register the push worker at the gateway.
    ///
    /// Returns `None` silently when push is disabled, no gateway is
    /// configured, or the surface cannot host a worker. Idempotent: a
    /// persisted subscription keeps its endpoint (and thus its token) across
    /// restarts.
    pub fn register_worker(&self) -> herald_util::Result<Option<WorkerRegistration>> {
        if !self.config.enabled {
            debug!("Push disabled by configuration");
            return Ok(None);
        }

        let Some(gateway_url) = &self.config.gateway_url else {
            debug!("No push gateway configured");
            return Ok(None);
        };

        if !self.surface.capabilities().can_run_push_worker {
            debug!("Surface cannot host a push worker");
            return Ok(None);
        }

        // Reuse the endpoint of a persisted subscription so the gateway
        // keeps recognizing us
        if let Some(subscription) = self.persisted_subscription()?
            && let Some(token) = token_from_endpoint(&subscription.endpoint)
        {
            debug!(endpoint = %subscription.endpoint, "Reusing persisted worker registration");
            return Ok(Some(WorkerRegistration {
                token,
                endpoint: subscription.endpoint,
            }));
        }

        let token = RegistrationToken::new();
        let endpoint = format!("{}/sse/{}", gateway_url.trim_end_matches('/'), token);

        info!(endpoint = %endpoint, "Push worker registered");

        Ok(Some(WorkerRegistration { token, endpoint }))
    }

    /// Resolve notification permission.
    ///
    /// Returns true only if permission is already granted or becomes granted
    /// after at most one prompt. A prior explicit denial is returned as-is
    /// without prompting again.
    pub async fn request_permission(&self) -> herald_util::Result<bool> {
        match self.surface.permission_state() {
            PermissionState::Granted => Ok(true),
            PermissionState::Denied => {
                debug!("Notification permission previously denied, not prompting");
                Ok(false)
            }
            PermissionState::Default => {
                if !self.surface.capabilities().can_prompt_permission {
                    debug!("Surface cannot prompt for permission");
                    return Ok(false);
                }

                let state = self
                    .surface
                    .request_permission()
                    .await
                    .map_err(|e| HeraldError::surface(e.to_string()))?;

                info!(state = ?state, "Permission prompt resolved");
                Ok(state == PermissionState::Granted)
            }
        }
    }

    /// Run the permission flow at most once per installation.
    ///
    /// The gate is set whatever the outcome, so the user is never re-prompted
    /// automatically on later starts.
    pub async fn ensure_permission_flow(&self) -> herald_util::Result<bool> {
        let done = self
            .store
            .get_meta(META_PERMISSION_FLOW_DONE)
            .map_err(|e| HeraldError::store(e.to_string()))?
            .is_some();

        if done {
            return Ok(self.surface.permission_state() == PermissionState::Granted);
        }

        let granted = self.request_permission().await?;

        self.store
            .set_meta(META_PERMISSION_FLOW_DONE, "1")
            .map_err(|e| HeraldError::store(e.to_string()))?;

        Ok(granted)
    }

    /// Create the push subscription and register it with the backend.
    ///
    /// Requires a registered worker and a well-formed server public key. When
    /// a persisted subscription already matches the worker's endpoint, it is
    /// returned without another backend call.
    pub async fn subscribe(
        &self,
        registration: &WorkerRegistration,
    ) -> herald_util::Result<PushSubscription> {
        let Some(public_key) = &self.config.public_key else {
            return Err(HeraldError::config("Push public key is not configured"));
        };
        validate_public_key(public_key)?;

        if let Some(existing) = self.persisted_subscription()?
            && existing.endpoint == registration.endpoint
        {
            debug!(endpoint = %existing.endpoint, "Subscription already registered");
            return Ok(existing);
        }

        let subscription = PushSubscription {
            endpoint: registration.endpoint.clone(),
            keys: generate_client_keys(),
        };

        self.api
            .register_subscription(&subscription)
            .await
            .map_err(|e| HeraldError::transport(e.to_string()))?;

        let json = serde_json::to_string(&subscription)
            .map_err(|e| HeraldError::internal(e.to_string()))?;
        self.store
            .set_meta(META_PUSH_SUBSCRIPTION, &json)
            .map_err(|e| HeraldError::store(e.to_string()))?;

        info!(endpoint = %subscription.endpoint, "Push subscription created");

        Ok(subscription)
    }

    /// Unregister an endpoint with the backend and clear the local record.
    pub async fn unsubscribe(&self, endpoint: &str) -> herald_util::Result<()> {
        self.api
            .unregister_subscription(endpoint)
            .await
            .map_err(|e| HeraldError::transport(e.to_string()))?;

        self.store
            .delete_meta(META_PUSH_SUBSCRIPTION)
            .map_err(|e| HeraldError::store(e.to_string()))?;

        info!(endpoint = %endpoint, "Push subscription removed");
        Ok(())
    }

    /// Read the locally persisted subscription, if any.
    pub fn persisted_subscription(&self) -> herald_util::Result<Option<PushSubscription>> {
        let Some(json) = self
            .store
            .get_meta(META_PUSH_SUBSCRIPTION)
            .map_err(|e| HeraldError::store(e.to_string()))?
        else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(subscription) => Ok(Some(subscription)),
            Err(e) => {
                // A corrupt record is as good as no record
                warn!(error = %e, "Discarding unreadable subscription record");
                let _ = self.store.delete_meta(META_PUSH_SUBSCRIPTION);
                Ok(None)
            }
        }
    }
}

/// Validate the server public key: base64url, 65-byte uncompressed P-256
/// point (leading 0x04).
fn validate_public_key(key: &str) -> herald_util::Result<Vec<u8>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(key.trim())
        .map_err(|e| HeraldError::config(format!("Push public key is not valid base64url: {}", e)))?;

    if bytes.len() != 65 || bytes[0] != 0x04 {
        return Err(HeraldError::config(
            "Push public key must be a 65-byte uncompressed point",
        ));
    }

    Ok(bytes)
}

/// Generate fresh client key material for a subscription.
fn generate_client_keys() -> SubscriptionKeys {
    let mut rng = rand::thread_rng();

    // Point-shaped client key (0x04 prefix) and a 16-byte auth secret
    let mut p256dh = [0u8; 65];
    rng.fill_bytes(&mut p256dh);
    p256dh[0] = 0x04;

    let mut auth = [0u8; 16];
    rng.fill_bytes(&mut auth);

    SubscriptionKeys {
        p256dh: URL_SAFE_NO_PAD.encode(p256dh),
        auth: URL_SAFE_NO_PAD.encode(auth),
    }
}

fn token_from_endpoint(endpoint: &str) -> Option<RegistrationToken> {
    endpoint
        .rsplit('/')
        .next()
        .and_then(|segment| Uuid::parse_str(segment).ok())
        .map(RegistrationToken::from_uuid)
}
