//! OAuth sign-in for the hosted backend.
//!
//! Uses the authorization-code flow with PKCE: `begin_sign_in` builds the
//! provider URL and a one-time verifier, the provider redirects back to
//! `{site_url}/auth/callback?code=...`, and `complete_sign_in` trades the
//! code and verifier for a session.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::Client;
use reqwest::Url;
use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use serde_json::json;
use zeroize::Zeroizing;

use crate::types::errors::AuthError;
use crate::types::session::{AuthSession, SessionTokens, SignInRequest};
use crate::types::settings::{AuthSettings, BackendSettings};

/// Path the provider redirects back to, relative to the site URL.
pub const CALLBACK_PATH: &str = "/auth/callback";

const VERIFIER_BYTES: usize = 32;

/// Trait defining the sign-in operations.
pub trait AuthServiceTrait {
    fn begin_sign_in(&self, redirect_to: Option<&str>) -> Result<SignInRequest, AuthError>;
    fn complete_sign_in(&self, code: &str, code_verifier: &str) -> Result<AuthSession, AuthError>;
    fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
    email: Option<String>,
}

/// Auth client for the backend's `/auth/v1` endpoints.
pub struct AuthService {
    client: Client,
    base_url: String,
    anon_key: String,
    provider: String,
    site_url: String,
    rng: SystemRandom,
}

impl AuthService {
    pub fn new(backend: &BackendSettings, auth: &AuthSettings) -> Result<Self, AuthError> {
        let client = Client::builder()
            .user_agent(concat!("smartmarks/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: backend.url.trim_end_matches('/').to_string(),
            anon_key: backend.anon_key.clone(),
            provider: auth.provider.clone(),
            site_url: auth.site_url.trim_end_matches('/').to_string(),
            rng: SystemRandom::new(),
        })
    }

    /// The redirect target used when the caller does not supply one.
    pub fn default_redirect(&self) -> String {
        format!("{}{}", self.site_url, CALLBACK_PATH)
    }

    fn generate_verifier(&self) -> Result<Zeroizing<String>, AuthError> {
        let mut bytes = Zeroizing::new([0u8; VERIFIER_BYTES]);
        self.rng
            .fill(&mut bytes[..])
            .map_err(|_| AuthError::Crypto("failed to generate PKCE verifier".to_string()))?;
        Ok(Zeroizing::new(URL_SAFE_NO_PAD.encode(&bytes[..])))
    }

    fn authorize_url(&self, redirect_to: &str, challenge: &str) -> Result<Url, AuthError> {
        Url::parse_with_params(
            &format!("{}/auth/v1/authorize", self.base_url),
            &[
                ("provider", self.provider.as_str()),
                ("redirect_to", redirect_to),
                ("code_challenge", challenge),
                ("code_challenge_method", "s256"),
            ],
        )
        .map_err(|e| AuthError::InvalidRequest(format!("backend url: {}", e)))
    }
}

/// S256 code challenge for a PKCE verifier.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(digest(&SHA256, verifier.as_bytes()).as_ref())
}

/// When a session issued at `now` with the provider's `expires_in` (seconds) ends.
pub fn session_expiry(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, AuthError> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| AuthError::Provider(format!("invalid expires_in: {}", expires_in)))
}

/// Extracts the authorization code from a callback URL, or the provider's
/// error description when sign-in was refused.
pub fn code_from_callback(callback_url: &str) -> Result<String, AuthError> {
    let url = Url::parse(callback_url).map_err(|e| AuthError::InvalidRequest(e.to_string()))?;
    let mut code = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error_description" => error = Some(value.into_owned()),
            "error" if error.is_none() => error = Some(value.into_owned()),
            _ => {}
        }
    }
    match (code, error) {
        (Some(code), _) if !code.is_empty() => Ok(code),
        (_, Some(error)) => Err(AuthError::Provider(error)),
        _ => Err(AuthError::InvalidRequest("callback has no code".to_string())),
    }
}

impl AuthServiceTrait for AuthService {
    fn begin_sign_in(&self, redirect_to: Option<&str>) -> Result<SignInRequest, AuthError> {
        let redirect = match redirect_to {
            Some(r) => r.to_string(),
            None => self.default_redirect(),
        };
        let code_verifier = self.generate_verifier()?;
        let challenge = code_challenge(&code_verifier);
        let authorize_url = self.authorize_url(&redirect, &challenge)?;
        Ok(SignInRequest {
            authorize_url: authorize_url.to_string(),
            code_verifier,
        })
    }

    fn complete_sign_in(&self, code: &str, code_verifier: &str) -> Result<AuthSession, AuthError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "pkce")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "auth_code": code, "code_verifier": code_verifier }))
            .send()
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(AuthError::Provider(format!("{}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| AuthError::Provider(format!("unreadable token response: {}", e)))?;

        tracing::info!(user_id = %token.user.id, "signed in");
        Ok(AuthSession {
            user_id: token.user.id.clone(),
            email: token.user.email.clone(),
            tokens: SessionTokens {
                access_token: token.access_token.clone(),
                refresh_token: token.refresh_token.clone(),
            },
            expires_at: session_expiry(Utc::now(), token.expires_in)?,
        })
    }

    fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.tokens.access_token)
            .send()
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        // 401: the token already expired or was revoked.
        if status.is_success() || status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::info!(user_id = %session.user_id, "signed out");
            Ok(())
        } else {
            Err(AuthError::Provider(format!("sign-out failed: {}", status)))
        }
    }
}
