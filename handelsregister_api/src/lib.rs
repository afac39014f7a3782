//! HTTP plumbing for the German common register portal (handelsregister.de).
//!
//! The portal only serves human-oriented HTML. This crate owns the session
//! handshake, request pacing, and the request shapes of its search and
//! document endpoints; turning the returned pages into records is left to
//! `handelsregister_lib`.

mod client;
mod errors;
mod query;
pub mod session;
pub mod types;
mod user_agent;
pub use self::client::{Client, SESSION_COOKIE_NAME};
pub use self::errors::Error;
pub use self::query::{DocumentQuery, KeywordMatchMode, Query, SearchParameters};
pub use self::session::{RateLimitedSession, RequestLimits};
