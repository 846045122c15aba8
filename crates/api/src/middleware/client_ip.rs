//! Client IP extraction.
//!
//! Refresh sessions are bound to the address they were issued to. The socket
//! peer is that address unless `TRUSTED_PROXY` names the proxy in front of the
//! API, in which case only that proxy's header is read.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::config::TrustedProxy;
use crate::error::AppError;
use crate::state::AppState;

/// The caller's IP address.
///
/// IPv4-mapped IPv6 addresses are normalized to IPv4 so a dual-stack
/// listener and a proxy header compare equal for the same client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Read the client address reported by `proxy`, if its header is present and valid.
///
/// For `x-forwarded-for` this is the last entry: earlier ones come from the
/// client and are not trusted.
#[must_use]
pub fn client_ip_from_headers(headers: &HeaderMap, proxy: TrustedProxy) -> Option<IpAddr> {
    match proxy {
        TrustedProxy::None => None,
        TrustedProxy::Cloudflare => header_ip(headers, "cf-connecting-ip"),
        TrustedProxy::Fly => header_ip(headers, "fly-client-ip"),
        TrustedProxy::Forwarded => headers
            .get_all("x-forwarded-for")
            .iter()
            .next_back()
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.rsplit(',').next())
            .and_then(|s| s.trim().parse().ok()),
    }
}

impl FromRef<AppState> for TrustedProxy {
    fn from_ref(state: &AppState) -> Self {
        state.config().trusted_proxy
    }
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
    TrustedProxy: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let proxy = TrustedProxy::from_ref(state);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let ip = client_ip_from_headers(&parts.headers, proxy)
            .or(peer)
            .ok_or_else(|| AppError::Internal("client address unavailable".to_string()))?;

        Ok(Self(ip.to_canonical()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use axum::http::{HeaderValue, Request};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    async fn resolve(
        peer: &str,
        pairs: &[(&'static str, &'static str)],
        proxy: TrustedProxy,
    ) -> IpAddr {
        let addr: SocketAddr = peer.parse().unwrap();
        let mut request = Request::builder().body(()).unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        let (mut parts, ()) = request.into_parts();
        parts.headers = headers(pairs);

        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &proxy)
            .await
            .unwrap();
        ip
    }

    #[tokio::test]
    async fn test_forged_headers_ignored_without_proxy() {
        let ip = resolve(
            "198.51.100.9:443",
            &[
                ("x-forwarded-for", "203.0.113.7"),
                ("cf-connecting-ip", "203.0.113.7"),
                ("x-real-ip", "203.0.113.7"),
                ("fly-client-ip", "203.0.113.7"),
            ],
            TrustedProxy::None,
        )
        .await;
        assert_eq!(ip, "198.51.100.9".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_trusted_proxy_header_used() {
        let ip = resolve(
            "10.0.0.2:443",
            &[
                ("cf-connecting-ip", "203.0.113.9"),
                ("fly-client-ip", "192.0.2.1"),
            ],
            TrustedProxy::Cloudflare,
        )
        .await;
        assert_eq!(ip, "203.0.113.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_forwarded_uses_proxy_appended_entry() {
        let map = headers(&[("x-forwarded-for", "203.0.113.7, 198.51.100.9")]);
        assert_eq!(
            client_ip_from_headers(&map, TrustedProxy::Forwarded),
            Some("198.51.100.9".parse().unwrap())
        );

        let split = headers(&[
            ("x-forwarded-for", "203.0.113.7"),
            ("x-forwarded-for", "198.51.100.10"),
        ]);
        assert_eq!(
            client_ip_from_headers(&split, TrustedProxy::Forwarded),
            Some("198.51.100.10".parse().unwrap())
        );
    }

    #[tokio::test]
    async fn test_missing_proxy_header_falls_back_to_peer() {
        let ip = resolve("10.0.0.2:443", &[("fly-client-ip", "garbage")], TrustedProxy::Fly).await;
        assert_eq!(ip, "10.0.0.2".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_connect_info_is_canonical() {
        let ip = resolve("[::ffff:192.0.2.4]:5000", &[], TrustedProxy::None).await;
        assert_eq!(ip, "192.0.2.4".parse::<IpAddr>().unwrap());
    }
}
