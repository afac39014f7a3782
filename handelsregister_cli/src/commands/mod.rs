//! CLI subcommand implementations.

pub mod courts;
pub mod scrape;

use anyhow::{Context, Result};
use handelsregister_lib::{fetch_court_directory, Client, CourtDirectory, RateLimitedSession, RequestLimits};

/// Build a portal client from `--base-url`, `HANDELSREGISTER_BASE_URL`, or the production default.
pub fn build_client(base_url: Option<&str>) -> Result<Client> {
    let client = match base_url
        .map(|s| s.to_string())
        .or_else(|| std::env::var("HANDELSREGISTER_BASE_URL").ok())
    {
        Some(url) => Client::with_base_url(&url)?,
        None => Client::new()?,
    };
    Ok(client)
}

/// Open a portal session. Failure here is fatal for every subcommand.
pub async fn open_session(client: &Client, limits: RequestLimits) -> Result<RateLimitedSession> {
    tracing::info!("Starting session on {}", client.base_url());
    let mut session = RateLimitedSession::new(limits);
    session
        .initialize(client)
        .await
        .context("Failed to initialize session")?;
    tracing::info!(
        "Initialized session {}",
        session.identifier().unwrap_or_default()
    );
    Ok(session)
}

pub async fn load_courts(client: &Client, session: &RateLimitedSession) -> Result<CourtDirectory> {
    tracing::info!("Fetching registry court list");
    let courts = fetch_court_directory(client, session)
        .await
        .context("Failed to fetch registry court list")?;
    tracing::info!("Fetched information for {} registry courts", courts.len());
    Ok(courts)
}
