//! Session identity and request pacing for the registry portal.
//!
//! The portal ties search results to a server-side session and throttles
//! clients that request too quickly. [`RateLimitedSession`] carries the
//! session token and paces every outbound request with an optional fixed
//! delay plus an optional request ceiling per time window.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{Client, Error};

/// Pacing configuration. A zero delay or a zero request limit disables the
/// corresponding behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestLimits {
    delay: Duration,
    request_limit: u32,
    limit_interval: Duration,
}

impl RequestLimits {
    /// Validates and builds limits. A positive request limit needs a
    /// positive interval to count requests in.
    pub fn new(
        delay: Duration,
        request_limit: u32,
        limit_interval: Duration,
    ) -> Result<Self, Error> {
        if request_limit > 0 && limit_interval.is_zero() {
            return Err(Error::InvalidLimitInterval {
                limit: request_limit,
            });
        }
        Ok(Self {
            delay,
            request_limit,
            limit_interval,
        })
    }

    /// No delay and no request ceiling.
    pub fn unlimited() -> Self {
        Self {
            delay: Duration::ZERO,
            request_limit: 0,
            limit_interval: Duration::ZERO,
        }
    }

    pub fn delay(&self) -> Option<Duration> {
        (!self.delay.is_zero()).then_some(self.delay)
    }

    /// The request ceiling and its window, if limiting is enabled.
    pub fn window(&self) -> Option<(u32, Duration)> {
        (self.request_limit > 0).then_some((self.request_limit, self.limit_interval))
    }
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[derive(Default)]
struct ThrottleState {
    last_request: Option<Instant>,
    window_start: Option<Instant>,
    window_requests: u32,
}

/// A portal session plus the pacing state shared by every request made
/// through it.
///
/// The throttle state sits behind a tokio Mutex that is held for the whole
/// of [`throttle`](Self::throttle), so callers sharing a session are
/// serialized through it.
pub struct RateLimitedSession {
    identifier: Option<String>,
    limits: RequestLimits,
    state: Mutex<ThrottleState>,
}

impl RateLimitedSession {
    /// Creates an uninitialized session with the given pacing.
    pub fn new(limits: RequestLimits) -> Self {
        Self {
            identifier: None,
            limits,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    /// Creates a session around a token obtained elsewhere.
    pub fn with_identifier(identifier: &str, limits: RequestLimits) -> Self {
        Self {
            identifier: Some(identifier.to_string()),
            ..Self::new(limits)
        }
    }

    /// Obtains a fresh session token from the portal's entry page.
    ///
    /// Fails when the portal is unreachable or issues no token. Nothing
    /// downstream can work without a session, so callers treat this as fatal.
    pub async fn initialize(&mut self, client: &Client) -> Result<(), Error> {
        self.throttle().await;
        let identifier = client.request_session_token().await?;
        tracing::debug!("Session token issued: {}", identifier);
        self.identifier = Some(identifier);
        Ok(())
    }

    pub fn invalidate(&mut self) {
        self.identifier = None;
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub(crate) fn token(&self) -> Result<&str, Error> {
        self.identifier().ok_or(Error::SessionNotInitialized)
    }

    pub fn limits(&self) -> &RequestLimits {
        &self.limits
    }

    /// Non-blocking check whether the next request would have to wait for
    /// the current window to elapse.
    ///
    /// Resets the window counter when the window has already elapsed. While
    /// another caller holds the throttle this reports `true`.
    pub fn is_limit_reached(&self) -> bool {
        let Some((limit, interval)) = self.limits.window() else {
            return false;
        };
        let Ok(mut state) = self.state.try_lock() else {
            return true;
        };
        match state.window_start {
            Some(start) if start.elapsed() < interval => state.window_requests >= limit,
            _ => {
                state.window_requests = 0;
                false
            }
        }
    }

    /// Requests counted in the current window. `None` if the throttle is
    /// currently held by another caller.
    pub fn window_requests(&self) -> Option<u32> {
        self.state.try_lock().ok().map(|s| s.window_requests)
    }

    /// Waits until the next request may be sent, then records it.
    ///
    /// Must be awaited exactly once before every outbound request. When
    /// the request ceiling is reached, sleeps until the window has fully
    /// elapsed and starts a new window counting this request. Afterwards
    /// enforces the fixed delay since the previous request.
    pub async fn throttle(&self) {
        let mut state = self.state.lock().await;

        if let Some((limit, interval)) = self.limits.window() {
            let now = Instant::now();
            match state.window_start {
                Some(start) if now.duration_since(start) < interval => {
                    if state.window_requests >= limit {
                        let wait = interval - now.duration_since(start);
                        tracing::info!(
                            "Request limit of {} per {}s reached, waiting {:.1}s",
                            limit,
                            interval.as_secs(),
                            wait.as_secs_f64()
                        );
                        sleep(wait).await;
                        state.window_start = Some(Instant::now());
                        state.window_requests = 1;
                    } else {
                        state.window_requests += 1;
                    }
                }
                _ => {
                    state.window_start = Some(now);
                    state.window_requests = 1;
                }
            }
        }

        if let Some(delay) = self.limits.delay() {
            if let Some(last) = state.last_request {
                let elapsed = last.elapsed();
                if elapsed < delay {
                    sleep(delay - elapsed).await;
                }
            }
            state.last_request = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limited(limit: u32, interval_secs: u64) -> RateLimitedSession {
        let limits =
            RequestLimits::new(Duration::ZERO, limit, Duration::from_secs(interval_secs)).unwrap();
        RateLimitedSession::with_identifier("token", limits)
    }

    #[test]
    fn limit_without_interval_is_rejected() {
        let result = RequestLimits::new(Duration::ZERO, 5, Duration::ZERO);
        assert!(matches!(
            result,
            Err(Error::InvalidLimitInterval { limit: 5 })
        ));
    }

    #[test]
    fn zero_values_disable_limiting() {
        let limits = RequestLimits::new(Duration::ZERO, 0, Duration::ZERO).unwrap();
        assert_eq!(limits.delay(), None);
        assert_eq!(limits.window(), None);
    }

    #[tokio::test]
    async fn unlimited_session_never_reports_limit() {
        let session = RateLimitedSession::with_identifier("token", RequestLimits::unlimited());
        for _ in 0..100 {
            session.throttle().await;
        }
        assert!(!session.is_limit_reached());
    }

    #[tokio::test]
    async fn third_request_in_window_blocks_until_window_elapses() {
        tokio::time::pause();

        let session = Arc::new(limited(2, 60));
        session.throttle().await;
        session.throttle().await;
        assert_eq!(session.window_requests(), Some(2));
        assert!(session.is_limit_reached());

        let session_clone = Arc::clone(&session);
        let handle = tokio::spawn(async move {
            session_clone.throttle().await;
        });

        tokio::time::advance(Duration::from_secs(59)).await;
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        handle.await.unwrap();

        assert_eq!(session.window_requests(), Some(1));
        assert!(!session.is_limit_reached());
    }

    #[tokio::test]
    async fn window_resets_after_interval() {
        tokio::time::pause();

        let session = limited(2, 5);
        session.throttle().await;
        session.throttle().await;
        assert!(session.is_limit_reached());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!session.is_limit_reached());
        assert_eq!(session.window_requests(), Some(0));

        let before = Instant::now();
        session.throttle().await;
        assert_eq!(Instant::now(), before);
        assert_eq!(session.window_requests(), Some(1));
    }

    #[tokio::test]
    async fn fixed_delay_spaces_consecutive_requests() {
        tokio::time::pause();

        let limits = RequestLimits::new(Duration::from_secs(10), 0, Duration::ZERO).unwrap();
        let session = RateLimitedSession::with_identifier("token", limits);

        let start = Instant::now();
        session.throttle().await;
        assert!(start.elapsed() < Duration::from_secs(1));

        session.throttle().await;
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn delay_counts_from_previous_request() {
        tokio::time::pause();

        let limits = RequestLimits::new(Duration::from_secs(10), 0, Duration::ZERO).unwrap();
        let session = RateLimitedSession::with_identifier("token", limits);
        session.throttle().await;

        tokio::time::advance(Duration::from_secs(7)).await;
        let before = Instant::now();
        session.throttle().await;
        let waited = before.elapsed();
        assert!(waited >= Duration::from_secs(3));
        assert!(waited < Duration::from_secs(4));
    }

    #[test]
    fn invalidate_clears_token() {
        let mut session = RateLimitedSession::with_identifier("abc", RequestLimits::unlimited());
        assert_eq!(session.identifier(), Some("abc"));
        session.invalidate();
        assert_eq!(session.identifier(), None);
        assert!(matches!(session.token(), Err(Error::SessionNotInitialized)));
    }
}
