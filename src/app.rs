//! App Core for Smartmarks.
//!
//! Holds settings, the sign-in state and the open bookmark session, and
//! constructs the store handle the session talks to.

use std::sync::Arc;

use chrono::{Duration, Utc};
use zeroize::Zeroizing;

use crate::managers::bookmark_session::BookmarkSession;
use crate::services::auth_service::{self, AuthService, AuthServiceTrait};
use crate::services::local_store::LocalStore;
use crate::services::remote_store::RemoteStore;
use crate::services::rest_store::RestStore;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::errors::{AppError, AuthError};
use crate::types::session::{AuthSession, SessionTokens};
use crate::types::settings::{AppSettings, BackendMode};

/// Outcome of starting a sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInStep {
    /// A user is already signed in; go straight to the bookmark list.
    AlreadySignedIn,
    /// Send the user to this provider URL.
    Redirect(String),
}

/// Central application struct.
pub struct App {
    pub settings_engine: SettingsEngine,
    settings: AppSettings,
    auth: AuthService,
    local_store: Option<Arc<LocalStore>>,
    auth_session: Option<AuthSession>,
    pending_verifier: Option<Zeroizing<String>>,
    bookmarks: Option<BookmarkSession>,
}

impl App {
    /// Loads settings from `config_path` (or the platform default) and
    /// prepares the backend named by the effective settings.
    pub fn new(config_path: Option<String>) -> Result<Self, AppError> {
        let mut settings_engine = SettingsEngine::new(config_path);
        settings_engine.load()?;
        let settings = settings_engine.effective_settings();

        let local_store = match settings.backend.mode {
            BackendMode::Local => {
                let path = settings_engine.database_path();
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| crate::types::errors::StoreError::Database(e.to_string()))?;
                }
                tracing::info!(path = %path.display(), "using local store");
                Some(Arc::new(LocalStore::open(
                    &path,
                    settings.realtime.channel_capacity,
                )?))
            }
            BackendMode::Remote => {
                tracing::info!(url = %settings.backend.url, "using remote store");
                None
            }
        };

        Self::assemble(settings_engine, settings, local_store)
    }

    /// Builds an app around an existing local store, bypassing the configured mode.
    pub fn with_local_store(
        settings_engine: SettingsEngine,
        store: Arc<LocalStore>,
    ) -> Result<Self, AppError> {
        let mut settings = settings_engine.effective_settings();
        settings.backend.mode = BackendMode::Local;
        Self::assemble(settings_engine, settings, Some(store))
    }

    fn assemble(
        settings_engine: SettingsEngine,
        settings: AppSettings,
        local_store: Option<Arc<LocalStore>>,
    ) -> Result<Self, AppError> {
        let auth = AuthService::new(&settings.backend, &settings.auth)?;
        Ok(Self {
            settings_engine,
            settings,
            auth,
            local_store,
            auth_session: None,
            pending_verifier: None,
            bookmarks: None,
        })
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Which backend this app was started with. Fixed for the app's lifetime.
    pub fn backend_mode(&self) -> BackendMode {
        if self.local_store.is_some() {
            BackendMode::Local
        } else {
            BackendMode::Remote
        }
    }

    /// Re-reads effective settings after the settings engine changed.
    ///
    /// The backend, auth and storage sections are bound when the app starts
    /// and keep their running values. Returns `true` when the stored values
    /// for those sections differ and only take effect after a restart.
    pub fn reload_settings(&mut self) -> bool {
        let mut fresh = self.settings_engine.effective_settings();
        let restart_required = fresh.backend != self.settings.backend
            || fresh.auth != self.settings.auth
            || fresh.storage != self.settings.storage;
        fresh.backend = self.settings.backend.clone();
        fresh.auth = self.settings.auth.clone();
        fresh.storage = self.settings.storage.clone();
        self.settings = fresh;
        restart_required
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.auth_session.as_ref()
    }

    /// Starts an OAuth sign-in, unless a user is signed in with an unexpired session.
    pub fn begin_sign_in(&mut self, redirect_to: Option<&str>) -> Result<SignInStep, AppError> {
        if self
            .auth_session
            .as_ref()
            .is_some_and(|session| !session.is_expired(Utc::now()))
        {
            return Ok(SignInStep::AlreadySignedIn);
        }
        if self.backend_mode() != BackendMode::Remote {
            return Err(AppError::WrongMode("local"));
        }
        let request = self.auth.begin_sign_in(redirect_to)?;
        self.pending_verifier = Some(request.code_verifier);
        Ok(SignInStep::Redirect(request.authorize_url))
    }

    /// Finishes the OAuth sign-in with the callback URL (or bare code) and
    /// opens the user's bookmarks.
    pub fn complete_sign_in(&mut self, callback: &str) -> Result<&AuthSession, AppError> {
        let code = if callback.contains("://") {
            auth_service::code_from_callback(callback)?
        } else {
            callback.to_string()
        };
        let verifier = self.pending_verifier.take().ok_or(AppError::NoPendingSignIn)?;
        let session = self.auth.complete_sign_in(&code, &verifier)?;
        self.start_session(session)
    }

    /// Signs in as a local identity. Only available with the local store.
    pub fn sign_in_local(&mut self, user_id: &str, email: Option<&str>) -> Result<&AuthSession, AppError> {
        if self.local_store.is_none() {
            return Err(AppError::WrongMode("remote"));
        }
        if user_id.trim().is_empty() {
            return Err(AuthError::InvalidRequest("user id is required".to_string()).into());
        }
        let session = AuthSession {
            user_id: user_id.trim().to_string(),
            email: email.map(str::to_string),
            tokens: SessionTokens {
                access_token: String::new(),
                refresh_token: String::new(),
            },
            expires_at: Utc::now() + Duration::days(365),
        };
        self.start_session(session)
    }

    fn start_session(&mut self, session: AuthSession) -> Result<&AuthSession, AppError> {
        if let Some(previous) = self.bookmarks.take() {
            previous.close();
        }
        let store = self.store_for(&session)?;
        self.bookmarks = Some(BookmarkSession::open(store, &session.user_id)?);
        Ok(self.auth_session.insert(session))
    }

    fn store_for(&self, session: &AuthSession) -> Result<Arc<dyn RemoteStore>, AppError> {
        match &self.local_store {
            Some(store) => Ok(Arc::clone(store) as Arc<dyn RemoteStore>),
            None => Ok(Arc::new(RestStore::new(
                &self.settings.backend,
                &self.settings.realtime,
                &session.tokens.access_token,
            )?)),
        }
    }

    /// Closes the bookmark session and ends the sign-in.
    pub fn sign_out(&mut self) -> Result<(), AppError> {
        if let Some(bookmarks) = self.bookmarks.take() {
            bookmarks.close();
        }
        let Some(session) = self.auth_session.take() else {
            return Ok(());
        };
        if self.local_store.is_none() {
            self.auth.sign_out(&session)?;
        }
        Ok(())
    }

    /// The open bookmark session of the signed-in user.
    pub fn bookmarks(&mut self) -> Result<&mut BookmarkSession, AppError> {
        self.bookmarks
            .as_mut()
            .ok_or(AppError::Auth(AuthError::NotAuthenticated))
    }

    /// Shutdown: release the subscription.
    pub fn shutdown(&mut self) {
        if let Some(bookmarks) = self.bookmarks.take() {
            bookmarks.close();
        }
    }
}
