//! Authenticated request gateway.
//!
//! Every call made through `Gateway::send` carries the current access token.
//! A 401 on the first attempt triggers one token refresh and one retry; a
//! failed refresh clears the credential store and surfaces the original 401
//! as `ApiError::SessionExpired`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use super::request::{join_url, ApiRequest};
use super::ApiError;
use crate::auth::CredentialStore;
use crate::models::{RefreshRequest, RefreshResponse};

// ============================================================================
// Constants
// ============================================================================

/// Token refresh endpoint, relative to the API base URL
pub const REFRESH_PATH: &str = "/auth/token/refresh/";

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Where a host should send the user once the session is gone
pub const DEFAULT_SIGN_IN_PATH: &str = "/login";

/// Default API base URL for a local backend
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

/// Session events are advisory; slow subscribers may miss old ones.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Why the access token could not be renewed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Refresh token rejected with status {0}")]
    Rejected(u16),

    #[error("Refresh request failed: {0}")]
    Transport(String),

    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("Session was cleared while refreshing")]
    SessionCleared,
}

/// Changes to the session that a host may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    LoggedOut,
    /// The session could not be recovered; the user must sign in again.
    Expired { sign_in_path: String },
}

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub base_url: String,
    pub request_timeout: Duration,
    /// Share one in-flight refresh between concurrent 401s.
    pub dedupe_refresh: bool,
    pub sign_in_path: String,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            dedupe_refresh: true,
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_string(),
        }
    }
}

/// Position of a dispatch within one call. A call gets at most one `Retry`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Attempt {
    Initial,
    Retry { token: String },
}

/// A refresh that failed, with the refresh token it was attempted for.
#[derive(Debug)]
struct RecoveryFailure {
    refresh_used: Option<String>,
    reason: RefreshError,
}

type SharedRefresh = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

struct PendingRefresh {
    id: u64,
    refresh: String,
    future: SharedRefresh,
}

/// Wraps outbound API calls with bearer auth and one-shot refresh.
/// Clone is cheap - the client, store and refresh slot are shared.
#[derive(Clone)]
pub struct Gateway {
    client: Client,
    base_url: Arc<str>,
    store: Arc<CredentialStore>,
    dedupe_refresh: bool,
    sign_in_path: Arc<str>,
    pending: Arc<Mutex<Option<PendingRefresh>>>,
    next_refresh_id: Arc<AtomicU64>,
    events: broadcast::Sender<SessionEvent>,
}

impl Gateway {
    pub fn new(options: GatewayOptions, store: Arc<CredentialStore>) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(options.request_timeout).build()?;
        Ok(Self::with_client(client, options, store))
    }

    /// Build on an existing client, sharing its connection pool.
    /// `options.request_timeout` is ignored in favor of the client's own.
    pub fn with_client(client: Client, options: GatewayOptions, store: Arc<CredentialStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            client,
            base_url: options.base_url.into(),
            store,
            dedupe_refresh: options.dedupe_refresh,
            sign_in_path: options.sign_in_path.into(),
            pending: Arc::new(Mutex::new(None)),
            next_refresh_id: Arc::new(AtomicU64::new(0)),
            events,
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn notify(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    // ===== Dispatch =====

    /// Send an authenticated request.
    ///
    /// Returns the response unchanged on success. A 401 on the first attempt
    /// is recovered with one refresh and one retry; the retry's outcome is
    /// final. Every other failure passes through untouched.
    pub async fn send(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let mut attempt = Attempt::Initial;

        loop {
            let token = match &attempt {
                Attempt::Initial => self.store.access_token(),
                Attempt::Retry { token } => Some(token.clone()),
            };

            let response = self.dispatch(request, token.as_deref()).await?;
            if response.status() != StatusCode::UNAUTHORIZED || attempt != Attempt::Initial {
                return Self::check_response(response).await;
            }

            let original = Self::into_error(response).await;
            debug!(method = %request.method, path = %request.path, "Access token rejected, refreshing");

            match self.recover(token.as_deref()).await {
                Ok(fresh) => attempt = Attempt::Retry { token: fresh },
                Err(failure) => {
                    if self.expire_session(&failure) {
                        return Err(ApiError::SessionExpired(Box::new(original)));
                    }
                    return Err(original);
                }
            }
        }
    }

    /// Send an authenticated request and parse the JSON response body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        Self::parse_json(response, &request.path).await
    }

    /// Send a request without credentials and without the refresh path.
    /// Used for sign-in style endpoints where a 401 means bad input.
    pub async fn send_public(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let response = self.dispatch(request, None).await?;
        Self::check_response(response).await
    }

    pub async fn send_public_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.send_public(request).await?;
        Self::parse_json(response, &request.path).await
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response, ApiError> {
        debug!(
            method = %request.method,
            path = %request.path,
            authenticated = token.is_some(),
            "Dispatching request"
        );

        let mut builder = self.client.request(request.method.clone(), self.url(&request.path));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::into_error(response).await)
        }
    }

    async fn into_error(response: Response) -> ApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ApiError::from_status(status, &body)
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e)))
    }

    // ===== Refresh =====

    /// Exchange the stored refresh token for a new access token now.
    ///
    /// Unlike the recovery path inside `send`, a failure here leaves the
    /// session in place.
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        let refresh = self
            .store
            .refresh_token()
            .ok_or(RefreshError::MissingRefreshToken)?;
        if self.dedupe_refresh {
            self.shared_refresh(refresh).await
        } else {
            self.exchange(refresh).await
        }
    }

    /// Obtain a token to retry with after `stale` was rejected.
    async fn recover(&self, stale: Option<&str>) -> Result<String, RecoveryFailure> {
        let current = self.store.snapshot();
        let Some(tokens) = current.tokens.as_ref() else {
            return Err(RecoveryFailure {
                refresh_used: None,
                reason: RefreshError::MissingRefreshToken,
            });
        };

        if self.dedupe_refresh && stale != Some(tokens.access.as_str()) {
            debug!("Access token already replaced, retrying with the current one");
            return Ok(tokens.access.clone());
        }

        let outcome = if self.dedupe_refresh {
            self.shared_refresh(tokens.refresh.clone()).await
        } else {
            self.exchange(tokens.refresh.clone()).await
        };
        outcome.map_err(|reason| RecoveryFailure {
            refresh_used: Some(tokens.refresh.clone()),
            reason,
        })
    }

    /// Join the in-flight refresh for `refresh`, or start one.
    async fn shared_refresh(&self, refresh: String) -> Result<String, RefreshError> {
        let (id, future) = {
            let mut pending = self.pending.lock().await;
            // A finished refresh left behind by a dropped waiter is never joined
            let joined = pending
                .as_ref()
                .filter(|p| p.refresh == refresh && p.future.peek().is_none())
                .map(|p| (p.id, p.future.clone()));

            match joined {
                Some(joined) => {
                    debug!("Joining in-flight token refresh");
                    joined
                }
                None => {
                    let id = self.next_refresh_id.fetch_add(1, Ordering::Relaxed);
                    let future = self.exchange(refresh.clone()).shared();
                    *pending = Some(PendingRefresh {
                        id,
                        refresh,
                        future: future.clone(),
                    });
                    (id, future)
                }
            }
        };

        let outcome = future.await;

        let mut pending = self.pending.lock().await;
        if pending.as_ref().is_some_and(|p| p.id == id) {
            *pending = None;
        }
        outcome
    }

    fn exchange(&self, refresh: String) -> BoxFuture<'static, Result<String, RefreshError>> {
        exchange_refresh_token(
            self.client.clone(),
            self.url(REFRESH_PATH),
            Arc::clone(&self.store),
            self.events.clone(),
            refresh,
        )
        .boxed()
    }

    /// Clear the session the failed refresh belonged to. Returns `false`
    /// when a newer session replaced it in the meantime and was left alone.
    fn expire_session(&self, failure: &RecoveryFailure) -> bool {
        let cleared = match self.store.expire_if_current(failure.refresh_used.as_deref()) {
            Ok(cleared) => cleared,
            Err(e) => {
                warn!("Failed to clear persisted credentials: {:#}", e);
                true
            }
        };

        if !cleared {
            debug!(reason = %failure.reason, "Refresh failed for a replaced session, keeping the current one");
            return false;
        }

        warn!(reason = %failure.reason, "Session expired, clearing credentials");
        self.notify(SessionEvent::Expired {
            sign_in_path: self.sign_in_path.to_string(),
        });
        true
    }
}

async fn exchange_refresh_token(
    client: Client,
    url: String,
    store: Arc<CredentialStore>,
    events: broadcast::Sender<SessionEvent>,
    refresh: String,
) -> Result<String, RefreshError> {
    debug!("Exchanging refresh token");

    let response = client
        .post(&url)
        .json(&RefreshRequest { refresh: &refresh })
        .send()
        .await
        .map_err(|e| RefreshError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RefreshError::Rejected(status.as_u16()));
    }

    let body: RefreshResponse = response
        .json()
        .await
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

    match store.apply_refresh(&refresh, body.access.clone()) {
        Ok(true) => {
            info!("Access token refreshed");
            let _ = events.send(SessionEvent::Refreshed);
            Ok(body.access)
        }
        // Logged out or logged in again while the exchange was in flight
        Ok(false) => store.access_token().ok_or(RefreshError::SessionCleared),
        Err(e) => {
            warn!("Failed to persist refreshed access token: {:#}", e);
            Ok(body.access)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
