use thiserror::Error;

// === ValidationError ===

/// Errors raised by the bookmark form rules before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Title or URL was empty after trimming.
    #[error("URL and title are required")]
    MissingFields,
    /// The URL cannot be stored as given.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

// === StoreError ===

/// Errors reported by a remote store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("Store network error: {0}")]
    Network(String),
    /// The session is missing, expired or lacks access to the row.
    #[error("Store request unauthorized: {0}")]
    Unauthorized(String),
    /// The backend answered with a non-success status.
    #[error("Store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// Local database operation failed.
    #[error("Store database error: {0}")]
    Database(String),
    /// A response body could not be decoded.
    #[error("Store decode error: {0}")]
    Decode(String),
    /// The store does not provide this capability.
    #[error("Store does not support {0}")]
    Unsupported(&'static str),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

// === BookmarkError ===

/// Errors surfaced by user-initiated bookmark actions.
#[derive(Debug, Error)]
pub enum BookmarkError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// === AuthError ===

/// Errors related to OAuth sign-in and sign-out.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No user is signed in.
    #[error("Not signed in")]
    NotAuthenticated,
    /// The identity provider could not be reached.
    #[error("Auth network error: {0}")]
    Network(String),
    /// The identity provider rejected the request.
    #[error("Auth provider error: {0}")]
    Provider(String),
    /// The callback parameters or configured URLs are unusable.
    #[error("Invalid auth request: {0}")]
    InvalidRequest(String),
    /// Random generation for the PKCE verifier failed.
    #[error("Auth crypto error: {0}")]
    Crypto(String),
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

// === AppError ===

/// Errors surfaced by the application shell.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Bookmark(#[from] BookmarkError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// The operation is not available with the configured backend mode.
    #[error("Not available in {0} mode")]
    WrongMode(&'static str),
    /// `auth.complete` was called without a preceding `auth.begin`.
    #[error("No sign-in in progress")]
    NoPendingSignIn,
}
