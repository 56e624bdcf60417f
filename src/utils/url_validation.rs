//! Worker URL validation
//!
//! The inference worker is normally an internal service, so private and
//! loopback addresses are expected. Plain HTTP is accepted but logged when the
//! host is not on a private network.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use tracing::warn;
use url::{Host, Url};

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be http or https, got: {0}")]
    UnsupportedScheme(String),

    #[error("URL must have a host")]
    MissingHost,
}

/// Checks if an IPv4 address is loopback or on a private network
pub fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

/// Checks if an IPv6 address is loopback or unique/link local
pub fn is_private_ipv6(ip: &Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    let segments = ip.segments();
    // Link-local (fe80::/10) and unique local (fc00::/7)
    if segments[0] & 0xFFC0 == 0xFE80 || segments[0] & 0xFE00 == 0xFC00 {
        return true;
    }
    if let Some(ipv4) = ip.to_ipv4_mapped() {
        return is_private_ipv4(&ipv4);
    }
    false
}

pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => is_private_ipv4(ipv4),
        IpAddr::V6(ipv6) => is_private_ipv6(ipv6),
    }
}

fn is_internal_host(host: &Host<&str>) -> bool {
    match host {
        Host::Ipv4(ip) => is_private_ipv4(ip),
        Host::Ipv6(ip) => is_private_ipv6(ip),
        Host::Domain(domain) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost"
                || domain.ends_with(".local")
                || domain.ends_with(".internal")
                || !domain.contains('.')
        }
    }
}

/// Validates the inference worker base URL
///
/// The URL must be absolute, use `http` or `https`, and name a host.
pub fn validate_worker_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(UrlValidationError::UnsupportedScheme(scheme.to_string()));
    }

    let host = url.host().ok_or(UrlValidationError::MissingHost)?;
    if scheme == "http" && !is_internal_host(&host) {
        warn!(
            url = %url_str,
            "Worker URL uses plain HTTP on a public host; audio and text travel unencrypted"
        );
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_worker_urls() {
        assert!(validate_worker_url("http://127.0.0.1:8888").is_ok());
        assert!(validate_worker_url("http://tts-worker:8888/").is_ok());
        assert!(validate_worker_url("https://tts.example.com/api").is_ok());
    }

    #[test]
    fn test_rejects_unsupported_scheme() {
        let result = validate_worker_url("ftp://worker/");
        assert!(matches!(
            result,
            Err(UrlValidationError::UnsupportedScheme(s)) if s == "ftp"
        ));
    }

    #[test]
    fn test_rejects_relative_url() {
        assert!(matches!(
            validate_worker_url("/backends"),
            Err(UrlValidationError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_rejects_missing_host() {
        assert!(validate_worker_url("http://").is_err());
        assert!(matches!(
            validate_worker_url("unix:/var/run/worker.sock"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_private_ranges() {
        assert!(is_private_ip(&"10.1.2.3".parse().unwrap()));
        assert!(is_private_ip(&"192.168.0.10".parse().unwrap()));
        assert!(is_private_ip(&"::1".parse().unwrap()));
        assert!(is_private_ip(&"fd00::1".parse().unwrap()));
        assert!(!is_private_ip(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_ip(&"2606:4700::1111".parse().unwrap()));
    }

    #[test]
    fn test_internal_hosts() {
        assert!(is_internal_host(&Host::Domain("localhost")));
        assert!(is_internal_host(&Host::Domain("worker")));
        assert!(is_internal_host(&Host::Domain("tts.svc.internal")));
        assert!(!is_internal_host(&Host::Domain("tts.example.com")));
    }
}
