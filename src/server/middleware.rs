//! Basic authentication middleware and per-IP rate limiting.

use std::net::{IpAddr, Ipv6Addr};
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{Quota, RateLimiter};
use lru::LruCache;
use tokio::sync::Mutex;

use super::types::{ErrorDetail, ServerConfig};

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

pub type IpRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Maximum number of per-IP rate limiter entries to keep in the LRU cache.
const MAX_RATE_LIMITER_ENTRIES: usize = 10_000;

/// Get or create a rate limiter for the given IP.
/// IPv6 addresses are masked to /64 to prevent per-address evasion.
pub async fn get_rate_limiter(
    config: &ServerConfig,
    rate_limiters: &Mutex<LruCache<IpAddr, Arc<IpRateLimiter>>>,
    ip: IpAddr,
) -> Option<Arc<IpRateLimiter>> {
    let rpm = NonZeroU32::new(config.rate_limit_rpm)?;

    // Aggregate IPv6 addresses to /64 prefix
    let key = match ip {
        IpAddr::V4(_) => ip,
        IpAddr::V6(v6) => {
            let seg = v6.segments();
            IpAddr::V6(Ipv6Addr::new(seg[0], seg[1], seg[2], seg[3], 0, 0, 0, 0))
        }
    };

    let mut limiters = rate_limiters.lock().await;

    if let Some(limiter) = limiters.get(&key) {
        return Some(Arc::clone(limiter));
    }

    let quota = Quota::per_minute(rpm);
    let limiter = Arc::new(RateLimiter::direct(quota));
    limiters.push(key, Arc::clone(&limiter));

    Some(limiter)
}

pub fn new_rate_limiter_cache() -> Mutex<LruCache<IpAddr, Arc<IpRateLimiter>>> {
    Mutex::new(LruCache::new(
        std::num::NonZeroUsize::new(MAX_RATE_LIMITER_ENTRIES).unwrap(),
    ))
}

// ---------------------------------------------------------------------------
// Basic auth middleware
// ---------------------------------------------------------------------------

/// Fixed rejection body for failed Basic authentication.
const BAD_CREDENTIALS_DETAIL: &str = "Incorrect username or password";

/// HTTP Basic authentication for the model-info route.
///
/// Decodes the `Authorization: Basic` header and checks the pair against the
/// server's [`CredentialStore`](super::types::CredentialStore). Missing,
/// malformed, or mismatched credentials all produce the same 401 with a
/// `WWW-Authenticate: Basic` challenge so the response does not leak which
/// part failed.
pub async fn basic_auth_middleware(
    axum::extract::State(state): axum::extract::State<Arc<super::ServerState>>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let authorized = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(decode_basic_credentials)
        .map(|(user, pass)| state.credentials.verify(&user, &pass))
        .unwrap_or(false);

    if !authorized {
        return unauthorized_response();
    }

    next.run(request).await
}

/// Decode a `Basic <base64(user:pass)>` header value into (user, pass).
/// The auth-scheme comparison is case-insensitive per RFC 7617.
fn decode_basic_credentials(header: &str) -> Option<(String, String)> {
    use base64::Engine;

    let (scheme, encoded) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn unauthorized_response() -> axum::response::Response {
    use axum::response::IntoResponse;

    (
        axum::http::StatusCode::UNAUTHORIZED,
        [(axum::http::header::WWW_AUTHENTICATE, "Basic")],
        axum::Json(ErrorDetail::new(BAD_CREDENTIALS_DETAIL)),
    )
        .into_response()
}
