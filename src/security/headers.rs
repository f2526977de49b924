//! Header manipulation for forwarded requests.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Set X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//! - Replace any client-supplied identity header with the verified one
//!
//! # Design Decisions
//! - Existing X-Forwarded-* values from clients are overwritten, not appended
//! - Headers named in `Connection` are treated as hop-by-hop too

use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::security::jwt::AuthenticatedUser;

/// Identity header set for backends from the verified token.
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Headers meaningful only for a single transport-level connection.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Prepare request headers for a backend.
///
/// `Host` is dropped so the client sets it from the upstream URI.
pub fn prepare_upstream_headers(
    headers: &mut HeaderMap,
    client_ip: Option<IpAddr>,
    user: Option<&AuthenticatedUser>,
) {
    let original_host = headers.remove(header::HOST);
    strip_hop_by_hop(headers);

    headers.remove(&X_FORWARDED_FOR);
    if let Some(ip) = client_ip {
        headers.insert(X_FORWARDED_FOR, ip_header(ip));
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    match original_host {
        Some(host) => {
            headers.insert(X_FORWARDED_HOST, host);
        }
        None => {
            headers.remove(&X_FORWARDED_HOST);
        }
    }

    headers.remove(&X_USER_ID);
    if let Some(user) = user {
        if let Ok(value) = HeaderValue::from_str(&user.user_id) {
            headers.insert(X_USER_ID, value);
        }
    }
}

fn ip_header(ip: IpAddr) -> HeaderValue {
    // IP literals are always valid header text.
    HeaderValue::from_str(&ip.to_string()).unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_strips_standard_and_listed_hop_by_hop_headers() {
        let mut map = headers(&[
            ("connection", "keep-alive, x-trace-hop"),
            ("keep-alive", "timeout=5"),
            ("transfer-encoding", "chunked"),
            ("upgrade", "websocket"),
            ("x-trace-hop", "1"),
            ("content-type", "application/json"),
        ]);
        strip_hop_by_hop(&mut map);

        assert_eq!(map.len(), 1);
        assert_eq!(map[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_forwarded_headers_are_overwritten() {
        let mut map = headers(&[
            ("host", "gateway.farm.local"),
            ("x-forwarded-for", "6.6.6.6"),
            ("x-user-id", "admin"),
            ("authorization", "Bearer t"),
        ]);
        let user = AuthenticatedUser { user_id: "grower-9".into() };
        prepare_upstream_headers(&mut map, Some("10.1.2.3".parse().unwrap()), Some(&user));

        assert!(map.get(header::HOST).is_none());
        assert_eq!(map["x-forwarded-for"], "10.1.2.3");
        assert_eq!(map["x-forwarded-host"], "gateway.farm.local");
        assert_eq!(map["x-forwarded-proto"], "http");
        assert_eq!(map["x-user-id"], "grower-9");
        assert_eq!(map[header::AUTHORIZATION], "Bearer t");
    }

    #[test]
    fn test_spoofed_identity_is_removed_for_anonymous_requests() {
        let mut map = headers(&[("x-user-id", "admin")]);
        prepare_upstream_headers(&mut map, None, None);
        assert!(map.get("x-user-id").is_none());
        assert!(map.get("x-forwarded-for").is_none());
    }
}
