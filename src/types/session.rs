use chrono::{DateTime, Utc};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Bearer credentials issued by the identity provider. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens").finish_non_exhaustive()
    }
}

/// An authenticated user session.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: String,
    pub email: Option<String>,
    pub tokens: SessionTokens,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// Name shown in the navigation bar.
    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or("User")
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The first half of a PKCE sign-in: where to send the user, and the verifier
/// to present when the provider redirects back with a code.
pub struct SignInRequest {
    pub authorize_url: String,
    pub code_verifier: zeroize::Zeroizing<String>,
}
