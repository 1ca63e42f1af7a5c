//! Fixed-window rate limiting for the chat proxy
//!
//! Each client key gets `max_requests` per window. `X-Forwarded-For` only
//! identifies callers when the config trusts it. The table is swept of
//! expired windows whenever it grows past `max_entries`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use tracing::debug;

use expensewise_core::config::RateLimitConfig;

/// Key used when a request carries nothing to identify its client
pub const ANONYMOUS_KEY: &str = "anonymous";

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// In-memory fixed-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    max_entries: usize,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, max_entries: usize) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            max_entries: max_entries.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests, config.window(), config.max_entries)
    }

    /// Count a request for `key` now
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Count a request for `key` at `now`
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if windows.len() > self.max_entries {
            let before = windows.len();
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
            debug!(before, after = windows.len(), "Swept rate limit table");
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            let retry_after = self.window.saturating_sub(now.duration_since(entry.started));
            return RateDecision::Limited { retry_after };
        }

        entry.count += 1;
        RateDecision::Allowed {
            remaining: self.max_requests - entry.count,
        }
    }

    /// Number of tracked keys
    pub fn tracked(&self) -> usize {
        self.windows
            .lock()
            .map(|w| w.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

/// Identify the client: bearer token, else the first `x-forwarded-for` hop
/// when `trust_forwarded_for` is set, else the peer address, else
/// [`ANONYMOUS_KEY`]
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<std::net::SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if let Some(token) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return format!("token:{}", token);
    }

    // X-Forwarded-For format: "client, proxy1, proxy2" - take the first
    if let Some(client) = headers
        .get("x-forwarded-for")
        .filter(|_| trust_forwarded_for)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return format!("ip:{}", client);
    }

    match peer {
        Some(addr) => format!("ip:{}", addr.ip()),
        None => ANONYMOUS_KEY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn limiter() -> RateLimiter {
        RateLimiter::new(10, Duration::from_secs(60), 1000)
    }

    #[test]
    fn test_eleventh_request_is_limited() {
        let limiter = limiter();
        let start = Instant::now();
        for i in 0..10 {
            assert_eq!(
                limiter.check_at("token:a", start + Duration::from_secs(i)),
                RateDecision::Allowed {
                    remaining: 9 - i as u32
                }
            );
        }
        let decision = limiter.check_at("token:a", start + Duration::from_secs(20));
        assert_eq!(
            decision,
            RateDecision::Limited {
                retry_after: Duration::from_secs(40)
            }
        );

        // Other clients are unaffected
        assert!(matches!(
            limiter.check_at("token:b", start + Duration::from_secs(20)),
            RateDecision::Allowed { .. }
        ));
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = limiter();
        let start = Instant::now();
        for _ in 0..10 {
            limiter.check_at("k", start);
        }
        assert!(matches!(limiter.check_at("k", start), RateDecision::Limited { .. }));
        assert_eq!(
            limiter.check_at("k", start + Duration::from_secs(60)),
            RateDecision::Allowed { remaining: 9 }
        );
    }

    #[test]
    fn test_sweep_removes_expired_entries() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60), 3);
        let start = Instant::now();
        for key in ["a", "b", "c", "d"] {
            limiter.check_at(key, start);
        }
        assert_eq!(limiter.tracked(), 4);

        // Table is over capacity; everything from `start` has expired
        limiter.check_at("e", start + Duration::from_secs(61));
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_sweep_keeps_live_windows() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60), 2);
        let start = Instant::now();
        for key in ["a", "b", "c"] {
            limiter.check_at(key, start);
        }
        limiter.check_at("d", start + Duration::from_secs(30));
        assert_eq!(limiter.tracked(), 4);
    }

    #[test]
    fn test_client_key_precedence() {
        let peer: std::net::SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers, None, true), ANONYMOUS_KEY);
        assert_eq!(client_key(&headers, Some(peer), true), "ip:10.0.0.9");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_key(&headers, Some(peer), true), "ip:203.0.113.7");

        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(client_key(&headers, Some(peer), true), "token:abc");
    }

    #[test]
    fn test_forwarded_for_ignored_unless_trusted() {
        let peer: std::net::SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let limiter = RateLimiter::new(1, Duration::from_secs(60), 1000);
        let start = Instant::now();

        // Rotating the header does not give an untrusted caller a fresh window
        for (i, spoofed) in ["1.1.1.1", "2.2.2.2"].into_iter().enumerate() {
            let mut headers = HeaderMap::new();
            headers.insert("x-forwarded-for", HeaderValue::from_str(spoofed).unwrap());
            let key = client_key(&headers, Some(peer), false);
            assert_eq!(key, "ip:10.0.0.9");
            let decision = limiter.check_at(&key, start);
            if i == 0 {
                assert!(matches!(decision, RateDecision::Allowed { .. }));
            } else {
                assert!(matches!(decision, RateDecision::Limited { .. }));
            }
        }

        // Without a peer address the header is still not used
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        assert_eq!(client_key(&headers, None, false), ANONYMOUS_KEY);
    }
}
