//! Client IP extraction utilities.

use std::net::{IpAddr, SocketAddr};

use axum::{extract::ConnectInfo, http::request::Parts};

/// Trait for types that provide access to HTTP headers and extensions.
/// Implemented for both `Parts` and `Request` to allow flexible IP extraction.
pub trait HasHeadersAndExtensions {
    fn headers(&self) -> &axum::http::HeaderMap;
    fn extensions(&self) -> &axum::http::Extensions;
}

impl HasHeadersAndExtensions for Parts {
    fn headers(&self) -> &axum::http::HeaderMap {
        &self.headers
    }
    fn extensions(&self) -> &axum::http::Extensions {
        &self.extensions
    }
}

impl<B> HasHeadersAndExtensions for axum::extract::Request<B> {
    fn headers(&self) -> &axum::http::HeaderMap {
        axum::extract::Request::headers(self)
    }
    fn extensions(&self) -> &axum::http::Extensions {
        axum::extract::Request::extensions(self)
    }
}

/// Header that a trusted reverse proxy sets to the real client address.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum IpExtractor {
    /// `X-Forwarded-For`, using the entry appended by the nearest proxy
    XForwardedFor,
    /// `X-Real-IP`
    XRealIp,
    /// `CF-Connecting-IP`
    CfConnectingIp,
}

impl IpExtractor {
    pub fn header_name(&self) -> &'static str {
        match self {
            IpExtractor::XForwardedFor => "x-forwarded-for",
            IpExtractor::XRealIp => "x-real-ip",
            IpExtractor::CfConnectingIp => "cf-connecting-ip",
        }
    }

    /// Parse the header value into a normalized IP address.
    pub fn extract(&self, value: &str) -> Result<String, &'static str> {
        let candidate = match self {
            // Earlier entries are client-controlled
            IpExtractor::XForwardedFor => value.rsplit(',').next().unwrap_or_default(),
            IpExtractor::XRealIp | IpExtractor::CfConnectingIp => value,
        };

        candidate
            .trim()
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| "IP header does not contain a valid address")
    }
}

/// Extract the client IP address from a request.
///
/// If `ip_extractor` is set, the IP is read from the configured header and a
/// missing or invalid header is an error. `ConnectInfo` is not consulted.
///
/// If `ip_extractor` is None, the peer address from `ConnectInfo` is used and
/// proxy headers are ignored.
pub fn extract_client_ip<T: HasHeadersAndExtensions>(
    source: &T,
    ip_extractor: Option<&IpExtractor>,
) -> Result<String, &'static str> {
    match ip_extractor {
        Some(extractor) => {
            let value = source
                .headers()
                .get(extractor.header_name())
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            extractor.extract(value)
        }
        None => source
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .ok_or("No client IP available"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Request;

    fn with_peer(builder: axum::http::request::Builder) -> Request {
        builder
            .extension(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))))
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_connect_info_without_extractor() {
        let request = with_peer(Request::builder());
        assert_eq!(extract_client_ip(&request, None).as_deref(), Ok("192.0.2.1"));
    }

    #[test]
    fn test_proxy_headers_ignored_without_extractor() {
        let request = with_peer(
            Request::builder()
                .header("x-forwarded-for", "203.0.113.7")
                .header("x-real-ip", "203.0.113.8"),
        );
        assert_eq!(extract_client_ip(&request, None).as_deref(), Ok("192.0.2.1"));
    }

    #[test]
    fn test_forwarded_for_uses_nearest_proxy_entry() {
        let request = with_peer(
            Request::builder().header("x-forwarded-for", "10.9.9.9, 203.0.113.7 "),
        );
        assert_eq!(
            extract_client_ip(&request, Some(&IpExtractor::XForwardedFor)).as_deref(),
            Ok("203.0.113.7")
        );
    }

    #[test]
    fn test_real_ip_header() {
        let request = with_peer(Request::builder().header("x-real-ip", " 2001:db8::1 "));
        assert_eq!(
            extract_client_ip(&request, Some(&IpExtractor::XRealIp)).as_deref(),
            Ok("2001:db8::1")
        );
    }

    #[test]
    fn test_extractor_does_not_fall_back() {
        // Missing header
        let request = with_peer(Request::builder());
        assert!(extract_client_ip(&request, Some(&IpExtractor::XForwardedFor)).is_err());

        // Not an address
        let request = with_peer(Request::builder().header("cf-connecting-ip", "not-an-ip"));
        assert!(extract_client_ip(&request, Some(&IpExtractor::CfConnectingIp)).is_err());
    }

    #[test]
    fn test_no_ip_available() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert!(extract_client_ip(&request, None).is_err());
    }
}
