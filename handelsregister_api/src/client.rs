//! HTTP client for the registry portal's HTML endpoints.

use std::time::Duration;

use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE};
use reqwest::RequestBuilder;
use url::Url;

use crate::{
    query::{DocumentQuery, Query, SearchParameters},
    session::RateLimitedSession,
    user_agent::get_user_agent,
    Error,
};

const DEFAULT_BASE_URL: &str = "https://www.handelsregister.de";

const WELCOME_PATH: &str = "/rp_web/welcome.do";
const SEARCH_FORM_PATH: &str = "/rp_web/mask.do";
const SEARCH_PATH: &str = "/rp_web/search.do";
const DOCUMENT_PATH: &str = "/rp_web/document.do";

/// Cookie the portal uses to carry the session identity.
pub const SESSION_COOKIE_NAME: &str = "JSESSIONID";

const LANGUAGE_COOKIE: &str = "language=de";

/// HTTP client for the registry portal.
///
/// The portal has no machine API; every method returns the raw HTML of the
/// page it fetched. Every request except the session handshake is paced by
/// the session's throttle and carries the session cookie.
pub struct Client {
    /// Base URL for the portal. Defaults to `https://www.handelsregister.de`.
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    /// Creates a new client pointing at the production portal.
    pub fn new() -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(get_user_agent())
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                Error::RequestFailed
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_url(&self, path: &str) -> Result<Url, Error> {
        Url::parse(format!("{}{}", &self.base_url, path).as_str()).map_err(|e| {
            tracing::error!("Invalid URL constructed: {}", e);
            Error::InvalidUrl(e.to_string())
        })
    }

    /// Requests the entry page and returns the session token it issues.
    pub(crate) async fn request_session_token(&self) -> Result<String, Error> {
        let url = self.get_url(WELCOME_PATH)?;
        let resp = self
            .http
            .get(url.clone())
            .header(COOKIE, LANGUAGE_COOKIE)
            .header("accept", "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to open session: {}", e);
                Error::RequestFailed
            })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::error!("Session handshake failed with status {}", status);
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: String::new(),
            });
        }

        session_cookie(resp.headers()).ok_or_else(|| Error::MissingSessionToken {
            url: url.to_string(),
        })
    }

    /// Fetches the search form, which carries the registry court selection.
    pub async fn get_search_form(&self, session: &RateLimitedSession) -> Result<String, Error> {
        let mut url = self.get_url(SEARCH_FORM_PATH)?;
        url.query_pairs_mut().append_pair("Typ", "n");
        let request = self.http.get(url);
        self.send(session, request).await
    }

    /// Submits a search and returns the result listing.
    ///
    /// The session token travels both as cookie and embedded in the path.
    pub async fn search(
        &self,
        session: &RateLimitedSession,
        params: &SearchParameters,
    ) -> Result<String, Error> {
        let token = session.token()?;
        let url = self.get_url(&format!("{};jsessionid={}", SEARCH_PATH, token))?;
        let request = self.http.post(url).form(&params.to_form());
        self.send(session, request).await
    }

    /// Fetches one sub-resource (entity information or documents) of a
    /// search result row.
    pub async fn get_document(
        &self,
        session: &RateLimitedSession,
        query: &DocumentQuery,
    ) -> Result<String, Error> {
        let url = query.add_to_url(&self.get_url(DOCUMENT_PATH)?);
        let request = self.http.get(url);
        self.send(session, request).await
    }

    async fn send(
        &self,
        session: &RateLimitedSession,
        request: RequestBuilder,
    ) -> Result<String, Error> {
        let token = session.token()?;
        session.throttle().await;

        let resp = request
            .header(
                COOKIE,
                format!("{}={}; {}", SESSION_COOKIE_NAME, token, LANGUAGE_COOKIE),
            )
            .header("accept", "text/html,application/xhtml+xml")
            .header("accept-language", "de-DE,de;q=0.9")
            .header("cache-control", "no-cache")
            .header("pragma", "no-cache")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get resource: {}", e);
                Error::RequestFailed
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            tracing::error!("Failed to read response body: {}", e);
            Error::RequestFailed
        })?;

        if !status.is_success() {
            let snippet = truncate_body(&body);
            tracing::error!("Request failed with status {}: {}", status, snippet);
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: snippet,
            });
        }

        Ok(body)
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim() == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated]", &body[..end])
}
