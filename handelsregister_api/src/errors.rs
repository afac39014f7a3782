//! Error types for the registry portal client.

/// Errors that can occur when talking to the registry portal.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An HTTP request failed (network error, timeout, or unreadable body).
    #[error("Request failed")]
    RequestFailed,
    /// The portal returned a non-success status with a body snippet.
    #[error("Request failed with status {status}")]
    HttpStatus { status: u16, body: String },
    /// The welcome page answered without issuing a session cookie.
    #[error("No session token issued by {url}")]
    MissingSessionToken { url: String },
    /// A request was attempted before the session was initialized.
    #[error("Session has not been initialized")]
    SessionNotInitialized,
    /// A request URL could not be constructed from the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Rate limiting was configured with a request ceiling but no window.
    #[error("Request limit of {limit} requires a positive limit interval")]
    InvalidLimitInterval { limit: u32 },
}
