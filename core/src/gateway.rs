//! Authenticated request gateway.
//!
//! # Overview
//! Every API request passes through [`Gateway::send`], which wraps the
//! transport call in two middleware stages:
//!
//! - before send: circuit breaker admission, then a valid bearer token
//!   (authenticating first if needed). The token-issuance endpoint itself
//!   bypasses both so authentication never recurses.
//! - after receive: a 401 clears the session, forces one re-authentication
//!   and retries once. Transport errors and every other non-2xx response
//!   count against the breaker; a 2xx response counts as success.
//!
//! # Single flight
//! At most one authentication attempt runs at a time. The attempt runs on
//! its own tokio task and is published as a shared future; every caller that
//! needs a token while it runs awaits that same future and receives the same
//! outcome, success or failure. Running the attempt on a task means an
//! abandoned caller cannot strand the others; if the task itself dies the
//! waiters see [`ApiError::Cancelled`].
//!
//! A refresh token, when held, is tried first; if the refresh is rejected
//! the attempt falls back to the password grant. The two calls form one
//! attempt and count as at most one breaker failure.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::json;
use tokio::time::Instant;

use crate::breaker::{BreakerSnapshot, CircuitBreaker};
use crate::config::{Config, GatewaySettings};
use crate::error::{ApiError, AuthError, ConfigError, UpstreamError};
use crate::http::{HttpRequest, HttpResponse};
use crate::session::Session;
use crate::transport::Transport;
use crate::types::TokenResponse;

pub const ISSUE_TOKEN_PATH: &str = "/aladdin/api/v1/issue-token";

type Flight = Shared<BoxFuture<'static, Result<String, AuthError>>>;

/// Attaches credentials to requests for one Pathao account.
///
/// Cloning is cheap and clones share the same session and breaker.
pub struct Gateway<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Gateway<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    transport: T,
    config: Config,
    settings: GatewaySettings,
    state: Mutex<State>,
}

struct State {
    session: Session,
    breaker: CircuitBreaker,
    in_flight: Option<InFlight>,
    /// Number of attempts ever started; identifies the current one.
    attempts: u64,
}

struct InFlight {
    attempt: u64,
    flight: Flight,
}

impl State {
    fn new(settings: &GatewaySettings, attempts: u64) -> Self {
        Self {
            session: Session::default(),
            breaker: CircuitBreaker::new(settings.failure_threshold, settings.open_duration),
            in_flight: None,
            attempts,
        }
    }

    fn owns_flight(&self, attempt: u64) -> bool {
        self.in_flight.as_ref().is_some_and(|f| f.attempt == attempt)
    }
}

impl<T: Transport> Gateway<T> {
    /// Build a gateway with default [`GatewaySettings`].
    ///
    /// Fails immediately when the configuration is incomplete.
    pub fn new(config: Config, transport: T) -> Result<Self, ConfigError> {
        Self::with_settings(config, transport, GatewaySettings::default())
    }

    pub fn with_settings(config: Config, transport: T, settings: GatewaySettings) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                state: Mutex::new(State::new(&settings, 0)),
                config,
                settings,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Resolve once the session holds a valid access token.
    ///
    /// A token that is already valid is returned without consulting the
    /// breaker, so it never takes the half-open trial slot.
    ///
    /// # Errors
    ///
    /// [`ApiError::BreakerOpen`] without network I/O while the breaker is
    /// open, [`ApiError::Auth`] when the upstream rejects the credentials or
    /// cannot be reached.
    pub async fn ensure_authenticated(&self) -> Result<(), ApiError> {
        if self.has_valid_token() {
            return Ok(());
        }
        self.inner.admit()?;
        self.inner.access_token().await?;
        Ok(())
    }

    /// Clear the session and close the breaker.
    ///
    /// An attempt already in flight still resolves its waiters, but its
    /// result is not stored. Calling this on a fresh gateway changes nothing.
    pub fn reset_session(&self) {
        let mut state = self.inner.lock();
        let attempts = state.attempts;
        *state = State::new(&self.inner.settings, attempts);
        tracing::debug!("session reset");
    }

    pub fn breaker_state(&self) -> BreakerSnapshot {
        self.inner.lock().breaker.snapshot()
    }

    pub fn has_valid_token(&self) -> bool {
        self.inner.lock().session.valid_token(Instant::now()).is_some()
    }

    /// Send `request` with a bearer token attached.
    ///
    /// Non-2xx responses are returned as `Ok` for the caller to interpret,
    /// including a 401 that persisted through the one retry.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        if self.inner.is_token_request(&request) {
            return Ok(self.inner.transport.execute(request).await?);
        }

        self.inner.admit()?;
        let token = self.inner.access_token().await?;
        let response = self.inner.dispatch(request.clone().with_bearer(&token)).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        tracing::info!(url = %request.url, "access token rejected, re-authenticating once");
        self.inner.invalidate(&token);
        let token = self.inner.access_token().await?;
        let response = self.inner.dispatch(request.with_bearer(&token)).await?;
        if response.is_unauthorized() {
            tracing::warn!("access token rejected again after re-authentication");
            self.inner.invalidate(&token);
            self.inner.lock().breaker.record_failure(Instant::now());
        }
        Ok(response)
    }
}

impl<T: Transport> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_token_request(&self, request: &HttpRequest) -> bool {
        request.url.trim_end_matches('/').ends_with(ISSUE_TOKEN_PATH)
    }

    fn admit(&self) -> Result<(), ApiError> {
        self.lock()
            .breaker
            .admit(Instant::now())
            .map_err(|retry_after| {
                tracing::warn!(retry_after_ms = retry_after.as_millis() as u64, "circuit breaker open, rejecting request");
                ApiError::BreakerOpen { retry_after }
            })
    }

    fn invalidate(&self, token: &str) {
        if self.lock().session.invalidate_if_current(token) {
            tracing::debug!("session invalidated");
        }
    }

    /// Send an authenticated request and feed the outcome to the breaker.
    async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        match self.transport.execute(request).await {
            Err(err) => {
                tracing::warn!(error = %err, "request failed without a response");
                self.lock().breaker.record_failure(Instant::now());
                Err(err.into())
            }
            // A first 401 is settled by the caller's retry.
            Ok(response) if response.is_unauthorized() => Ok(response),
            Ok(response) if !response.is_success() => {
                tracing::warn!(status = response.status, "upstream returned an error status");
                self.lock().breaker.record_failure(Instant::now());
                Ok(response)
            }
            Ok(response) => {
                self.lock().breaker.record_success();
                Ok(response)
            }
        }
    }

    /// A valid access token: the current one, or the result of the single
    /// in-flight authentication (started here if there is none).
    async fn access_token(self: &Arc<Self>) -> Result<String, AuthError> {
        let flight = {
            let mut state = self.lock();
            if let Some(token) = state.session.valid_token(Instant::now()) {
                return Ok(token.to_owned());
            }
            if let Some(in_flight) = &state.in_flight {
                tracing::debug!(attempt = in_flight.attempt, "joining in-flight authentication");
                in_flight.flight.clone()
            } else {
                state.attempts += 1;
                let attempt = state.attempts;
                let flight = self.start_authentication(attempt);
                state.in_flight = Some(InFlight {
                    attempt,
                    flight: flight.clone(),
                });
                flight
            }
        };
        flight.await
    }

    fn start_authentication(self: &Arc<Self>, attempt: u64) -> Flight {
        let inner = Arc::clone(self);
        let task = tokio::spawn(async move {
            let outcome = inner.authenticate().await;
            inner.complete(attempt, outcome)
        });

        let inner = Arc::clone(self);
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(error = %err, "authentication task did not complete");
                    inner.abandon(attempt);
                    Err(AuthError::Cancelled)
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Refresh if possible, otherwise (or if the refresh is rejected) use
    /// the password grant.
    async fn authenticate(&self) -> Result<(TokenResponse, Instant), AuthError> {
        let refresh_token = self.lock().session.refresh_token().map(str::to_owned);
        if let Some(refresh_token) = refresh_token {
            tracing::debug!("refreshing access token");
            let body = json!({
                "client_id": self.config.client_id(),
                "client_secret": self.config.client_secret(),
                "refresh_token": refresh_token,
                "grant_type": "refresh_token",
            });
            match self.issue_token(body).await {
                Ok(grant) => return Ok(grant),
                Err(err) => {
                    tracing::info!(error = %err, "token refresh failed, falling back to password grant");
                    self.lock().session.discard_refresh_token();
                }
            }
        }

        tracing::debug!("requesting access token with credentials");
        let body = json!({
            "client_id": self.config.client_id(),
            "client_secret": self.config.client_secret(),
            "username": self.config.username(),
            "password": self.config.password(),
            "grant_type": "password",
        });
        self.issue_token(body).await
    }

    async fn issue_token(&self, body: serde_json::Value) -> Result<(TokenResponse, Instant), AuthError> {
        let request = HttpRequest::post_json(self.config.endpoint(ISSUE_TOKEN_PATH), &body)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        let response = self
            .transport
            .execute(request)
            .await
            .map_err(AuthError::Transport)?;
        if !response.is_success() {
            return Err(AuthError::Rejected(UpstreamError::from_response(&response)));
        }
        let grant: TokenResponse =
            serde_json::from_str(&response.body).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        Ok((grant, Instant::now()))
    }

    /// Publish an attempt's outcome: store the session, update the breaker
    /// and free the in-flight slot, all under one lock.
    fn complete(
        &self,
        attempt: u64,
        outcome: Result<(TokenResponse, Instant), AuthError>,
    ) -> Result<String, AuthError> {
        let mut state = self.lock();
        if !state.owns_flight(attempt) {
            tracing::debug!(attempt, "session was reset during authentication, result not stored");
            return outcome.map(|(grant, _)| grant.access_token);
        }
        state.in_flight = None;

        match outcome {
            Ok((grant, issued_at)) => {
                state.session.store(&grant, issued_at, self.settings.expiry_margin);
                state.breaker.record_success();
                tracing::info!(expires_in = grant.expires_in, "authenticated with Pathao");
                Ok(grant.access_token)
            }
            Err(err) => {
                state.breaker.record_failure(Instant::now());
                tracing::warn!(error = %err, "authentication failed");
                Err(err)
            }
        }
    }

    fn abandon(&self, attempt: u64) {
        let mut state = self.lock();
        if state.owns_flight(attempt) {
            state.in_flight = None;
            state.breaker.record_failure(Instant::now());
        }
    }
}
