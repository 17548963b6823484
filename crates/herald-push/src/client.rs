//! Backend todo API client
//!
//! Every call reads the bearer token freshly from the store, so a refreshed
//! token is picked up without restarting anything. Connectivity failures are
//! classified separately from other request failures because the caller's
//! handling differs: offline errors are queueable, the rest are not.

use async_trait::async_trait;
use herald_api::PushSubscription;
use herald_store::Store;
use herald_util::{HeraldError, TodoId};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from backend API calls
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never reached the backend
    #[error("Offline: {0}")]
    Offline(String),

    /// Missing credential or a 401 response
    #[error("Authentication required")]
    Auth,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Whether the failure was a connectivity problem, making the action
    /// eligible for the offline queue.
    pub fn is_offline(&self) -> bool {
        matches!(self, ApiError::Offline(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth)
    }
}

/// Backend todo API seam
#[async_trait]
pub trait TodoApi: Send + Sync {
    async fn complete(&self, todo_id: TodoId) -> ApiResult<()>;

    async fn skip_today(&self, todo_id: TodoId) -> ApiResult<()>;

    async fn snooze(&self, todo_id: TodoId, minutes: u32) -> ApiResult<()>;

    async fn postpone(&self, todo_id: TodoId, minutes: u32) -> ApiResult<()>;

    /// Register a push subscription with the backend
    async fn register_subscription(&self, subscription: &PushSubscription) -> ApiResult<()>;

    /// Tell the backend to stop pushing to an endpoint
    async fn unregister_subscription(&self, endpoint: &str) -> ApiResult<()>;
}

/// HTTP implementation of [`TodoApi`]
pub struct BackendClient {
    client: reqwest::Client,
    api_base_url: String,
    store: Arc<dyn Store>,
}

impl BackendClient {
    pub fn new(api_base_url: impl Into<String>, store: Arc<dyn Store>) -> herald_util::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HeraldError::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base_url: api_base_url.into(),
            store,
        })
    }

    fn bearer(&self) -> ApiResult<String> {
        match self.store.auth_token() {
            Ok(Some(token)) => Ok(token),
            Ok(None) => Err(ApiError::Auth),
            Err(e) => Err(ApiError::Store(e.to_string())),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ApiResult<()> {
        let token = self.bearer()?;

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(ApiError::Auth),
            status => Err(ApiError::Request(format!("HTTP {}", status))),
        }
    }

    async fn patch_todo(
        &self,
        todo_id: TodoId,
        segment: &str,
        body: Option<serde_json::Value>,
    ) -> ApiResult<()> {
        let url = format!("{}/todos/{}/{}", self.api_base_url, todo_id, segment);
        debug!(url = %url, "Todo action request");

        let mut request = self.client.patch(&url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        self.send(request).await
    }
}

#[async_trait]
impl TodoApi for BackendClient {
    async fn complete(&self, todo_id: TodoId) -> ApiResult<()> {
        self.patch_todo(todo_id, "complete", None).await
    }

    async fn skip_today(&self, todo_id: TodoId) -> ApiResult<()> {
        self.patch_todo(todo_id, "skip-today", None).await
    }

    async fn snooze(&self, todo_id: TodoId, minutes: u32) -> ApiResult<()> {
        self.patch_todo(todo_id, "snooze", Some(json!({ "minutes": minutes })))
            .await
    }

    async fn postpone(&self, todo_id: TodoId, minutes: u32) -> ApiResult<()> {
        self.patch_todo(todo_id, "postpone", Some(json!({ "minutes": minutes })))
            .await
    }

    async fn register_subscription(&self, subscription: &PushSubscription) -> ApiResult<()> {
        let url = format!("{}/push/subscriptions", self.api_base_url);
        debug!(endpoint = %subscription.endpoint, "Registering push subscription");

        self.send(self.client.post(&url).json(subscription)).await
    }

    async fn unregister_subscription(&self, endpoint: &str) -> ApiResult<()> {
        let url = format!("{}/push/subscriptions", self.api_base_url);
        debug!(endpoint = %endpoint, "Unregistering push subscription");

        self.send(self.client.delete(&url).query(&[("endpoint", endpoint)]))
            .await
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> ApiError {
    if e.is_connect() || e.is_timeout() {
        ApiError::Offline(e.to_string())
    } else {
        ApiError::Request(e.to_string())
    }
}

/// One recorded call against the mock API
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Complete(TodoId),
    SkipToday(TodoId),
    Snooze(TodoId, u32),
    Postpone(TodoId, u32),
    RegisterSubscription(PushSubscription),
    UnregisterSubscription(String),
}

/// Scripted failure mode for the mock API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Offline,
    Auth,
    Request,
}

/// Mock API for unit/integration testing
pub struct MockTodoApi {
    /// Every call made, in order
    pub calls: Arc<Mutex<Vec<ApiCall>>>,
    fail_with: Arc<Mutex<Option<MockFailure>>>,
}

impl MockTodoApi {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: Arc::new(Mutex::new(None)),
        }
    }

    /// Make every subsequent call fail this way; `None` restores success.
    pub fn set_failure(&self, failure: Option<MockFailure>) {
        *self.fail_with.lock().unwrap() = failure;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: ApiCall) -> ApiResult<()> {
        self.calls.lock().unwrap().push(call);

        match *self.fail_with.lock().unwrap() {
            None => Ok(()),
            Some(MockFailure::Offline) => Err(ApiError::Offline("Mock offline".into())),
            Some(MockFailure::Auth) => Err(ApiError::Auth),
            Some(MockFailure::Request) => Err(ApiError::Request("Mock request failure".into())),
        }
    }
}

impl Default for MockTodoApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TodoApi for MockTodoApi {
    async fn complete(&self, todo_id: TodoId) -> ApiResult<()> {
        self.record(ApiCall::Complete(todo_id))
    }

    async fn skip_today(&self, todo_id: TodoId) -> ApiResult<()> {
        self.record(ApiCall::SkipToday(todo_id))
    }

    async fn snooze(&self, todo_id: TodoId, minutes: u32) -> ApiResult<()> {
        self.record(ApiCall::Snooze(todo_id, minutes))
    }

    async fn postpone(&self, todo_id: TodoId, minutes: u32) -> ApiResult<()> {
        self.record(ApiCall::Postpone(todo_id, minutes))
    }

    async fn register_subscription(&self, subscription: &PushSubscription) -> ApiResult<()> {
        self.record(ApiCall::RegisterSubscription(subscription.clone()))
    }

    async fn unregister_subscription(&self, endpoint: &str) -> ApiResult<()> {
        self.record(ApiCall::UnregisterSubscription(endpoint.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_store::SqliteStore;

    #[tokio::test]
    async fn missing_token_is_auth_error() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let client = BackendClient::new("http://127.0.0.1:9", store).unwrap();

        let err = client.complete(TodoId::new(1)).await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn unreachable_backend_is_offline_error() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_auth_token("tok").unwrap();
        let client = BackendClient::new("http://127.0.0.1:9", Arc::new(store)).unwrap();

        let err = client.complete(TodoId::new(1)).await.unwrap_err();
        assert!(err.is_offline(), "got {:?}", err);
    }

    #[tokio::test]
    async fn mock_records_calls_in_order() {
        let api = MockTodoApi::new();

        api.complete(TodoId::new(1)).await.unwrap();
        api.snooze(TodoId::new(2), 10).await.unwrap();

        let calls = api.calls.lock().unwrap();
        assert_eq!(calls[0], ApiCall::Complete(TodoId::new(1)));
        assert_eq!(calls[1], ApiCall::Snooze(TodoId::new(2), 10));
    }

    #[tokio::test]
    async fn mock_failure_modes() {
        let api = MockTodoApi::new();

        api.set_failure(Some(MockFailure::Offline));
        assert!(api.complete(TodoId::new(1)).await.unwrap_err().is_offline());

        api.set_failure(Some(MockFailure::Auth));
        assert!(api.complete(TodoId::new(1)).await.unwrap_err().is_auth());

        api.set_failure(None);
        assert!(api.complete(TodoId::new(1)).await.is_ok());
    }
}
