//! axum middleware applying the rate limiter to inbound requests.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, OriginalUri, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::limiter::RateLimiter;

/// Body of the rejection response.
pub const TOO_MANY_REQUESTS_BODY: &str = "429 - Too Many Requests";

/// Client key used when no address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Reject requests over their route's budget with `429 Too Many Requests`.
///
/// Install with `axum::middleware::from_fn_with_state(limiter, rate_limit)`.
/// The peer address comes from `ConnectInfo<SocketAddr>` when the server is
/// started with connect info.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.is_enabled() {
        return next.run(request).await;
    }

    let path = match request.extensions().get::<OriginalUri>() {
        Some(OriginalUri(uri)) => uri.path(),
        None => request.uri().path(),
    };
    let route = normalize_route(path);
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client = client_key(request.headers(), peer, limiter.trusts_proxy_headers());

    if !limiter.allow(&client, &route) {
        return (StatusCode::TOO_MANY_REQUESTS, TOO_MANY_REQUESTS_BODY).into_response();
    }

    next.run(request).await
}

/// Apparent client address for rate limiting.
///
/// With `trust_proxy_headers`, `X-Real-IP` wins, then the first entry of
/// `X-Forwarded-For`. Otherwise, or if neither is usable, the socket peer.
pub fn client_key(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        let forwarded = header_str(headers, X_REAL_IP).or_else(|| {
            header_str(headers, X_FORWARDED_FOR).and_then(|v| v.split(',').next())
        });
        if let Some(ip) = forwarded.map(str::trim).filter(|ip| !ip.is_empty()) {
            return ip.to_string();
        }
    }

    match peer {
        Some(ip) => ip.to_string(),
        None => UNKNOWN_CLIENT.to_string(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
}

/// Canonical form of a request path used as the route part of a key.
///
/// Always starts with `/`; trailing slashes are dropped except for the root.
pub fn normalize_route(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
