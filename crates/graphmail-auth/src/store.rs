//! In-memory holder for the current delegated token triple

use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Where the held token sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenLifecycle {
    /// No access token and no refresh token
    Unauthenticated,
    /// Access token usable right now
    Valid,
    /// Access token stale, or only a refresh token is held
    Expired,
    /// A refresh exchange is in flight
    Refreshing,
}

/// The single current token triple.
///
/// `access_token` and `expires_at` are only ever written together.
pub struct TokenStore {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    /// Tokens are treated as expired this long before `expires_at`
    margin: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenStore {
    /// Create an empty store
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            expires_at: None,
            margin: Duration::zero(),
            clock,
        }
    }

    /// Treat tokens as expired `seconds` before their declared expiry
    pub fn with_expiry_margin(mut self, seconds: u64) -> Self {
        self.margin = seconds_to_duration(seconds);
        self
    }

    /// True iff an access token is held and `now < expires_at - margin`
    pub fn is_valid(&self) -> bool {
        match (&self.access_token, self.expires_at) {
            (Some(_), Some(expires_at)) => {
                let deadline = expires_at
                    .checked_sub_signed(self.margin)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                self.clock.now() < deadline
            }
            _ => false,
        }
    }

    /// Record a freshly issued token.
    ///
    /// A `None` refresh token keeps the one already held.
    pub fn set(&mut self, access_token: String, expires_in: u64, refresh_token: Option<String>) {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(seconds_to_duration(expires_in))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.access_token = Some(access_token);
        self.expires_at = Some(expires_at);

        let rotated = refresh_token.is_some();
        if let Some(refresh_token) = refresh_token {
            self.refresh_token = Some(refresh_token);
        }

        info!(
            "Tokens set: expires_in={}s expires_at={} refresh_token_rotated={}",
            expires_in, expires_at, rotated
        );
    }

    pub fn current_access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn current_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Lifecycle as seen from the stored state alone
    pub fn lifecycle(&self) -> TokenLifecycle {
        if self.is_valid() {
            TokenLifecycle::Valid
        } else if self.access_token.is_some() || self.refresh_token.is_some() {
            TokenLifecycle::Expired
        } else {
            TokenLifecycle::Unauthenticated
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("margin", &self.margin)
            .finish()
    }
}

fn seconds_to_duration(seconds: u64) -> Duration {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store_at(start: DateTime<Utc>) -> (Arc<ManualClock>, TokenStore) {
        let clock = Arc::new(ManualClock::new(start));
        let store = TokenStore::new(clock.clone());
        (clock, store)
    }

    #[test]
    fn test_fresh_store_is_invalid() {
        let (_, store) = store_at(Utc::now());
        assert!(!store.is_valid());
        assert_eq!(store.current_access_token(), None);
        assert_eq!(store.current_refresh_token(), None);
        assert_eq!(store.expires_at(), None);
        assert_eq!(store.lifecycle(), TokenLifecycle::Unauthenticated);
    }

    #[test]
    fn test_set_makes_store_valid() {
        let start = Utc::now();
        let (_, mut store) = store_at(start);
        store.set("token".to_string(), 3600, Some("refresh".to_string()));

        assert!(store.is_valid());
        assert_eq!(store.current_access_token(), Some("token"));
        assert_eq!(store.current_refresh_token(), Some("refresh"));
        assert_eq!(store.expires_at(), Some(start + Duration::seconds(3600)));
        assert_eq!(store.lifecycle(), TokenLifecycle::Valid);
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let start = Utc::now();
        for expires_in in [1u64, 2, 59, 60, 3599, 3600, 86_400] {
            let (clock, mut store) = store_at(start);
            store.set("token".to_string(), expires_in, None);

            let expires_at = store.expires_at().expect("expiry set");
            assert!(clock.now() < expires_at, "expires_in={}", expires_in);
            assert!(store.is_valid(), "expires_in={}", expires_in);

            clock.advance(expires_in as i64 - 1);
            assert!(store.is_valid(), "one second before expiry, expires_in={}", expires_in);

            clock.set(expires_at);
            assert!(!store.is_valid(), "at expiry, expires_in={}", expires_in);
            assert_eq!(store.lifecycle(), TokenLifecycle::Expired);
        }
    }

    #[test]
    fn test_zero_lifetime_is_immediately_invalid() {
        let (_, mut store) = store_at(Utc::now());
        store.set("token".to_string(), 0, None);
        assert!(!store.is_valid());
    }

    #[test]
    fn test_missing_refresh_token_keeps_previous() {
        let (_, mut store) = store_at(Utc::now());
        store.set("A1".to_string(), 60, Some("R1".to_string()));
        store.set("A2".to_string(), 3600, None);

        assert_eq!(store.current_access_token(), Some("A2"));
        assert_eq!(store.current_refresh_token(), Some("R1"));

        store.set("A3".to_string(), 3600, Some("R2".to_string()));
        assert_eq!(store.current_refresh_token(), Some("R2"));
    }

    #[test]
    fn test_expiry_margin_shortens_validity() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let mut store = TokenStore::new(clock.clone()).with_expiry_margin(60);
        store.set("token".to_string(), 3600, None);

        // The stored expiry is not adjusted, only the validity check
        assert_eq!(store.expires_at(), Some(start + Duration::seconds(3600)));

        clock.advance(3539);
        assert!(store.is_valid());
        clock.advance(1);
        assert!(!store.is_valid());
    }

    #[test]
    fn test_huge_lifetime_saturates() {
        let (_, mut store) = store_at(Utc::now());
        store.set("token".to_string(), u64::MAX, None);
        assert!(store.is_valid());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let (_, mut store) = store_at(Utc::now());
        store.set("secret-access".to_string(), 60, Some("secret-refresh".to_string()));
        let rendered = format!("{:?}", store);
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }
}
