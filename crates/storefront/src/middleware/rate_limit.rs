//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: sign-in and sign-up (~10/min)
//! - `verification_rate_limiter`: sending and confirming codes (~3/min)
//! - `cart_rate_limiter`: cart mutations (~100/min)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers that may carry the client address, most trusted first.
const CLIENT_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-real-ip", "fly-client-ip"];

/// Key extractor reading the client IP from proxy headers.
///
/// Falls back to the first entry of `X-Forwarded-For`, then to the peer
/// address when the server was started with connect info.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();
        let header_ip = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        };

        if let Some(ip) = CLIENT_IP_HEADERS.into_iter().find_map(header_ip) {
            return Ok(ip);
        }

        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(replenish_secs: u64, burst: u32) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(replenish_secs)
        .burst_size(burst)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

/// Sign-in and sign-up: one token every 6 seconds, burst of 5.
///
/// # Panics
///
/// Does not panic; both values are positive.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    limiter(6, 5).expect("rate limiter config with per_second(6) and burst_size(5) is valid")
}

/// Verification codes: one token every 20 seconds, burst of 3.
///
/// # Panics
///
/// Does not panic; both values are positive.
#[must_use]
pub fn verification_rate_limiter() -> RateLimiterLayer {
    limiter(20, 3).expect("rate limiter config with per_second(20) and burst_size(3) is valid")
}

/// Cart mutations: one token per second, burst of 50.
///
/// # Panics
///
/// Does not panic; both values are positive.
#[must_use]
pub fn cart_rate_limiter() -> RateLimiterLayer {
    limiter(1, 50).expect("rate limiter config with per_second(1) and burst_size(50) is valid")
}
