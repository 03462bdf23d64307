//! Authentication module for GraphMail
//!
//! Manages the delegated OAuth2 token used for Microsoft Graph calls:
//! 1. Authorization-code grant - seeds the token store from the login callback
//! 2. Refresh grant - renews the access token transparently once it expires

mod clock;
mod endpoint;
mod error;
mod manager;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use endpoint::{OAuth2Config, OAuth2TokenClient, TokenEndpoint, TokenRefreshResult};
pub use error::{AuthError, AuthResult};
pub use manager::{AccessTokenSource, TokenManager, TokenStatus};
pub use store::{TokenLifecycle, TokenStore};

/// Microsoft identity platform defaults
pub mod microsoft {
    /// Delegated permissions needed to send and read mail, plus a refresh token
    pub const MAIL_SCOPES: &[&str] = &["offline_access", "Mail.Send", "Mail.Read"];

    /// Authority for a given tenant (`common`, `organizations` or a tenant ID)
    pub fn authority(tenant: &str) -> String {
        format!("https://login.microsoftonline.com/{}", tenant)
    }
}
