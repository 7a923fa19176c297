//! Token state held by one gateway.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::TokenResponse;

/// Access token, refresh token and expiry. Empty until the first successful
/// authentication; never persisted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<Instant>,
}

impl Session {
    /// The access token, if one is held and `now` is before its expiry.
    pub fn valid_token(&self, now: Instant) -> Option<&str> {
        match (&self.access_token, self.expires_at) {
            (Some(token), Some(expires_at)) if now < expires_at => Some(token),
            _ => None,
        }
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Install a freshly issued grant. A grant without a refresh token keeps
    /// the one already held.
    pub fn store(&mut self, grant: &TokenResponse, issued_at: Instant, margin: Duration) {
        self.access_token = Some(grant.access_token.clone());
        self.refresh_token = grant.refresh_token.clone().or_else(|| self.refresh_token.take());
        self.expires_at = Some(expiry(issued_at, grant.expires_in, margin));
    }

    pub fn discard_refresh_token(&mut self) {
        self.refresh_token = None;
    }

    /// Clear the session if `token` is still the current access token.
    ///
    /// A 401 observed with an older token must not wipe a newer one.
    pub fn invalidate_if_current(&mut self, token: &str) -> bool {
        if self.access_token.as_deref() == Some(token) {
            *self = Session::default();
            true
        } else {
            false
        }
    }
}

/// `issued_at + lifetime - margin`, clamped to `issued_at` for lifetimes
/// shorter than the margin.
pub(crate) fn expiry(issued_at: Instant, expires_in_secs: u64, margin: Duration) -> Instant {
    issued_at + Duration::from_secs(expires_in_secs).saturating_sub(margin)
}
