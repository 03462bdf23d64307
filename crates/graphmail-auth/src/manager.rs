//! Token lifecycle manager
//!
//! Hands out a usable bearer token on demand. Check, refresh and store update
//! are serialized by an async gate, so concurrent callers that find the token
//! expired trigger a single refresh and then share its result. The store
//! itself is only locked for short reads and writes, never across the
//! network exchange, which keeps [`TokenManager::status`] responsive.

use crate::endpoint::TokenEndpoint;
use crate::store::{TokenLifecycle, TokenStore};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Anything that can produce a bearer token for an outbound API call
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> AuthResult<String>;
}

/// Snapshot of the token state that is safe to expose
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    pub state: TokenLifecycle,
    pub expires_at: Option<DateTime<Utc>>,
    pub has_refresh_token: bool,
}

/// Owns the process-wide [`TokenStore`] and the token endpoint
pub struct TokenManager {
    store: RwLock<TokenStore>,
    /// Held from the validity check until the refreshed tokens are stored
    refresh_gate: Mutex<()>,
    endpoint: Arc<dyn TokenEndpoint>,
    refreshing: AtomicBool,
}

impl TokenManager {
    pub fn new(endpoint: Arc<dyn TokenEndpoint>, store: TokenStore) -> Self {
        Self {
            store: RwLock::new(store),
            refresh_gate: Mutex::new(()),
            endpoint,
            refreshing: AtomicBool::new(false),
        }
    }

    /// Return a valid access token, refreshing it first if it has expired.
    ///
    /// Fails with [`AuthError::NoRefreshToken`] when there is nothing to
    /// refresh with. A failed refresh leaves the stored tokens untouched.
    pub async fn get_access_token(&self) -> AuthResult<String> {
        let _gate = self.refresh_gate.lock().await;

        let refresh_token = {
            let store = self.store.read().await;
            if store.is_valid() {
                if let Some(token) = store.current_access_token() {
                    debug!("Access token is valid, no refresh needed");
                    return Ok(token.to_string());
                }
            }

            match store.current_refresh_token() {
                Some(token) => token.to_string(),
                None => {
                    warn!("Access token unavailable and no refresh token held");
                    return Err(AuthError::NoRefreshToken);
                }
            }
        };

        info!("Access token expired, refreshing");
        let result = {
            let _refreshing = RefreshingFlag::raise(&self.refreshing);
            self.endpoint.refresh(&refresh_token).await
        };

        let refreshed = result.map_err(|e| {
            error!("Token refresh failed: {}", e);
            e
        })?;

        let access_token = refreshed.access_token.clone();
        self.store.write().await.set(
            refreshed.access_token,
            refreshed.expires_in,
            refreshed.refresh_token,
        );
        Ok(access_token)
    }

    /// Seed the store from an authorization code (the login callback).
    ///
    /// On failure the store is left as it was.
    pub async fn complete_authorization(&self, code: &str) -> AuthResult<()> {
        if code.trim().is_empty() {
            return Err(AuthError::Bootstrap("empty authorization code".to_string()));
        }

        let tokens = self.endpoint.exchange_code(code).await.map_err(|e| {
            error!("Authorization code exchange failed: {}", e);
            e
        })?;

        if tokens.access_token.is_empty() {
            return Err(AuthError::Bootstrap(
                "token response contained no access token".to_string(),
            ));
        }

        let _gate = self.refresh_gate.lock().await;
        self.store
            .write()
            .await
            .set(tokens.access_token, tokens.expires_in, tokens.refresh_token);
        info!("Authorization completed, token store seeded");
        Ok(())
    }

    /// Login page the operator has to visit to (re-)authorize the application
    pub fn authorization_url(&self) -> String {
        self.endpoint.authorization_url()
    }

    /// Current lifecycle state. Does not wait for an in-flight refresh.
    pub async fn status(&self) -> TokenStatus {
        let store = self.store.read().await;
        let state = if self.refreshing.load(Ordering::SeqCst) {
            TokenLifecycle::Refreshing
        } else {
            store.lifecycle()
        };

        TokenStatus {
            state,
            expires_at: store.expires_at(),
            has_refresh_token: store.current_refresh_token().is_some(),
        }
    }

    pub async fn lifecycle(&self) -> TokenLifecycle {
        self.status().await.state
    }
}

#[async_trait]
impl AccessTokenSource for TokenManager {
    async fn access_token(&self) -> AuthResult<String> {
        self.get_access_token().await
    }
}

/// Marks a refresh as in flight until dropped
struct RefreshingFlag<'a>(&'a AtomicBool);

impl<'a> RefreshingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RefreshingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
