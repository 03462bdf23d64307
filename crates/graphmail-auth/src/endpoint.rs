//! Token endpoint client for the authorization-code and refresh grants
//!
//! Talks to a Microsoft identity platform style authority
//! (`{authority}/oauth2/v2.0/{authorize,token}`). Client credentials travel
//! in the form body rather than a Basic auth header.

use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use oauth2::{
    basic::{BasicClient, BasicErrorResponse, BasicTokenResponse},
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl,
    RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// OAuth2 application registration
#[derive(Clone)]
pub struct OAuth2Config {
    /// Application (client) ID
    pub client_id: String,
    /// Client secret of the confidential client
    pub client_secret: String,
    /// Authority base URL, e.g. `https://login.microsoftonline.com/<tenant>`
    pub authority: String,
    /// Delegated permissions to request
    pub scopes: Vec<String>,
    /// Registered redirect URI of the callback route
    pub redirect_uri: String,
}

impl OAuth2Config {
    pub fn auth_url(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.authority.trim_end_matches('/'))
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authority", &self.authority)
            .field("scopes", &self.scopes)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Outcome of a successful token exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRefreshResult {
    pub access_token: String,
    /// `None` when the provider did not rotate the refresh token
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, relative to the time of issuance
    pub expires_in: u64,
}

impl TokenRefreshResult {
    fn from_response(response: &BasicTokenResponse) -> Result<Self, String> {
        let expires_in = response
            .expires_in()
            .ok_or_else(|| "token response has no expires_in".to_string())?;

        Ok(Self {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            expires_in: expires_in.as_secs(),
        })
    }
}

/// The provider's token endpoint, as seen by the lifecycle manager
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange a refresh token for a new triple. Single attempt.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenRefreshResult>;

    /// Exchange a one-time authorization code for the initial triple
    async fn exchange_code(&self, code: &str) -> AuthResult<TokenRefreshResult>;

    /// URL of the user-facing login page that redirects back with a code
    fn authorization_url(&self) -> String;
}

/// Failure of a single exchange, before it is mapped to a grant-specific error
enum ExchangeFailure {
    Transport(String),
    Rejected(String),
}

/// Upper bound on a single token endpoint round trip
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`TokenEndpoint`] backed by the `oauth2` crate
pub struct OAuth2TokenClient {
    config: OAuth2Config,
    client: BasicClient,
    timeout: Duration,
}

impl OAuth2TokenClient {
    pub fn new(config: OAuth2Config) -> AuthResult<Self> {
        let client_id = ClientId::new(config.client_id.clone());
        let client_secret = ClientSecret::new(config.client_secret.clone());
        let auth_url = AuthUrl::new(config.auth_url())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(config.token_url())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid token URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid redirect URL: {}", e)))?;

        let client = BasicClient::new(client_id, Some(client_secret), auth_url, Some(token_url))
            .set_auth_type(AuthType::RequestBody)
            .set_redirect_uri(redirect_url);

        Ok(Self {
            config,
            client,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Give up on the token endpoint after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Run one exchange, treating a stalled endpoint as a transport failure
    async fn bounded<T, RE, F>(&self, exchange: F) -> Result<T, ExchangeFailure>
    where
        F: Future<Output = Result<T, RequestTokenError<RE, BasicErrorResponse>>>,
        RE: std::error::Error + 'static,
    {
        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result.map_err(classify),
            Err(_) => Err(ExchangeFailure::Transport(format!(
                "token endpoint did not answer within {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl TokenEndpoint for OAuth2TokenClient {
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenRefreshResult> {
        debug!("Requesting refresh grant from {}", self.config.token_url());

        let refresh_token = RefreshToken::new(refresh_token.to_string());
        let mut request = self.client.exchange_refresh_token(&refresh_token);
        for scope in &self.config.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let response = self
            .bounded(request.request_async(oauth2::reqwest::async_http_client))
            .await
            .map_err(|failure| match failure {
                ExchangeFailure::Transport(cause) => AuthError::Transport(cause),
                ExchangeFailure::Rejected(body) => {
                    warn!("Refresh grant rejected: {}", body);
                    AuthError::RefreshRejected { body }
                }
            })?;

        let result = TokenRefreshResult::from_response(&response)
            .map_err(|body| AuthError::RefreshRejected { body })?;
        info!("Refresh grant succeeded, expires_in={}s", result.expires_in);
        Ok(result)
    }

    async fn exchange_code(&self, code: &str) -> AuthResult<TokenRefreshResult> {
        debug!("Exchanging authorization code at {}", self.config.token_url());

        let request = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .add_extra_param("scope", self.config.scopes.join(" "));

        let response = self
            .bounded(request.request_async(oauth2::reqwest::async_http_client))
            .await
            .map_err(|failure| match failure {
                ExchangeFailure::Transport(cause) => AuthError::Bootstrap(cause),
                ExchangeFailure::Rejected(body) => AuthError::Bootstrap(body),
            })?;

        let result = TokenRefreshResult::from_response(&response).map_err(AuthError::Bootstrap)?;
        info!("Authorization code exchanged, expires_in={}s", result.expires_in);
        Ok(result)
    }

    fn authorization_url(&self) -> String {
        let mut request = self.client.authorize_url(CsrfToken::new_random);
        for scope in &self.config.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (url, _csrf_token) = request.url();
        url.to_string()
    }
}

/// Split a token request error into "could not talk to the provider" and
/// "the provider said no", keeping the raw payload of the latter.
fn classify<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> ExchangeFailure
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::Request(e) => ExchangeFailure::Transport(e.to_string()),
        RequestTokenError::ServerResponse(response) => ExchangeFailure::Rejected(
            serde_json::to_string(&response).unwrap_or_else(|_| response.to_string()),
        ),
        RequestTokenError::Parse(e, body) => {
            if body.is_empty() {
                ExchangeFailure::Rejected(e.to_string())
            } else {
                ExchangeFailure::Rejected(String::from_utf8_lossy(&body).into_owned())
            }
        }
        RequestTokenError::Other(message) => ExchangeFailure::Rejected(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(authority: &str) -> OAuth2Config {
        OAuth2Config {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            authority: authority.to_string(),
            scopes: vec!["offline_access".to_string(), "Mail.Send".to_string()],
            redirect_uri: "http://localhost:8000/api/auth/callback".to_string(),
        }
    }

    #[test]
    fn test_endpoint_urls() {
        let config = config_for("https://login.microsoftonline.com/tenant/");
        assert_eq!(
            config.token_url(),
            "https://login.microsoftonline.com/tenant/oauth2/v2.0/token"
        );
        assert_eq!(
            config.auth_url(),
            "https://login.microsoftonline.com/tenant/oauth2/v2.0/authorize"
        );
    }

    #[test]
    fn test_invalid_redirect_uri() {
        let mut config = config_for("https://login.microsoftonline.com/tenant");
        config.redirect_uri = "not a url".to_string();
        assert!(matches!(
            OAuth2TokenClient::new(config),
            Err(AuthError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_authorization_url() {
        let client =
            OAuth2TokenClient::new(config_for("https://login.microsoftonline.com/tenant")).unwrap();
        let url = client.authorization_url();
        assert!(url.starts_with("https://login.microsoftonline.com/tenant/oauth2/v2.0/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("offline_access"));
        assert!(url.contains("redirect_uri="));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = config_for("https://login.microsoftonline.com/tenant");
        assert!(!format!("{:?}", config).contains("client-secret"));
    }

    #[tokio::test]
    async fn test_refresh_success_without_rotation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=R1"))
            .and(body_string_contains("client_id=client-id"))
            .and(body_string_contains("client_secret=client-secret"))
            .and(body_string_contains("scope=offline_access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A2",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuth2TokenClient::new(config_for(&server.uri())).unwrap();
        let result = client.refresh("R1").await.unwrap();

        assert_eq!(
            result,
            TokenRefreshResult {
                access_token: "A2".to_string(),
                refresh_token: None,
                expires_in: 3600,
            }
        );
    }

    #[tokio::test]
    async fn test_refresh_success_with_rotation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A2",
                "refresh_token": "R2",
                "token_type": "Bearer",
                "expires_in": 4000
            })))
            .mount(&server)
            .await;

        let client = OAuth2TokenClient::new(config_for(&server.uri())).unwrap();
        let result = client.refresh("R1").await.unwrap();
        assert_eq!(result.refresh_token.as_deref(), Some("R2"));
        assert_eq!(result.expires_in, 4000);
    }

    #[tokio::test]
    async fn test_refresh_rejection_carries_provider_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "AADSTS70008: The refresh token has expired."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuth2TokenClient::new(config_for(&server.uri())).unwrap();
        match client.refresh("R1").await {
            Err(AuthError::RefreshRejected { body }) => {
                assert!(body.contains("invalid_grant"));
                assert!(body.contains("AADSTS70008"));
            }
            other => panic!("expected RefreshRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_non_json_error_body_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let client = OAuth2TokenClient::new(config_for(&server.uri())).unwrap();
        match client.refresh("R1").await {
            Err(AuthError::RefreshRejected { body }) => {
                assert_eq!(body, "upstream unavailable");
            }
            other => panic!("expected RefreshRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_transport_failure() {
        // Nothing listens on port 1
        let client = OAuth2TokenClient::new(config_for("http://127.0.0.1:1")).unwrap();
        let err = client.refresh("R1").await.unwrap_err();
        assert!(err.is_transient(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_stalled_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "access_token": "A2",
                        "token_type": "Bearer",
                        "expires_in": 3600
                    }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = OAuth2TokenClient::new(config_for(&server.uri()))
            .unwrap()
            .with_timeout(Duration::from_millis(100));

        let err = client.refresh("R1").await.unwrap_err();
        assert!(err.is_transient(), "got {:?}", err);
        assert!(err.to_string().contains("did not answer"));

        assert!(matches!(
            client.exchange_code("the-code").await,
            Err(AuthError::Bootstrap(_))
        ));
    }

    #[tokio::test]
    async fn test_exchange_code_sends_redirect_uri() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("redirect_uri="))
            .and(body_string_contains("scope=offline_access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A1",
                "refresh_token": "R1",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuth2TokenClient::new(config_for(&server.uri())).unwrap();
        let result = client.exchange_code("the-code").await.unwrap();
        assert_eq!(result.access_token, "A1");
        assert_eq!(result.refresh_token.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_exchange_code_without_access_token_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let client = OAuth2TokenClient::new(config_for(&server.uri())).unwrap();
        assert!(matches!(
            client.exchange_code("the-code").await,
            Err(AuthError::Bootstrap(_))
        ));
    }
}
