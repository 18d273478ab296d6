//! Outbound URL checks for page fetches.
//!
//! Every URL handed to a fetcher comes from either the user's query or a
//! search provider, so neither can be trusted to point at the public web.
//! The guard rejects non-HTTP schemes, internal host names and private or
//! link-local address ranges.

use ipnet::IpNet;
use std::collections::HashSet;
use std::net::IpAddr;

use crate::error::{SecurityError, SecurityResult};

const BLOCKED_HOSTS: &[&str] = &[
    "localhost",
    "127.0.0.1",
    "::1",
    "[::1]",
    "0.0.0.0",
    "metadata.google.internal",
    "metadata.gke.internal",
    "instance-data",
];

const BLOCKED_CIDRS: &[&str] = &[
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "169.254.0.0/16",
    "127.0.0.0/8",
    "0.0.0.0/8",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

/// Validates URLs before they are fetched.
#[derive(Debug, Clone)]
pub struct UrlGuard {
    blocked_hosts: HashSet<String>,
    blocked_cidrs: Vec<IpNet>,
    /// Hosts that skip every other check (test servers, internal mirrors)
    allowed_hosts: HashSet<String>,
}

impl Default for UrlGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlGuard {
    pub fn new() -> Self {
        Self {
            blocked_hosts: BLOCKED_HOSTS.iter().map(|h| h.to_string()).collect(),
            blocked_cidrs: BLOCKED_CIDRS.iter().filter_map(|c| c.parse().ok()).collect(),
            allowed_hosts: HashSet::new(),
        }
    }

    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.insert(host.into().to_lowercase());
        self
    }

    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.insert(host.into().to_lowercase());
        self
    }

    pub fn block_cidr(mut self, cidr: IpNet) -> Self {
        self.blocked_cidrs.push(cidr);
        self
    }

    /// Check scheme, host name and literal IP addresses.
    pub fn validate(&self, url: &str) -> SecurityResult<()> {
        let parsed = url::Url::parse(url)?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SecurityError::DisallowedScheme(parsed.scheme().to_string()));
        }

        let host = parsed
            .host_str()
            .ok_or(SecurityError::NoHost)?
            .to_lowercase();

        if self.allowed_hosts.contains(&host) {
            return Ok(());
        }
        if self.blocked_hosts.contains(&host) {
            return Err(SecurityError::BlockedHost(host));
        }

        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            self.check_ip(ip)?;
        }

        Ok(())
    }

    /// `validate`, then resolve the host and check every address it maps to.
    pub async fn validate_with_dns(&self, url: &str) -> SecurityResult<()> {
        self.validate(url)?;

        let parsed = url::Url::parse(url)?;
        let host = parsed.host_str().ok_or(SecurityError::NoHost)?;
        let bare = host.trim_start_matches('[').trim_end_matches(']');

        if self.allowed_hosts.contains(&host.to_lowercase()) || bare.parse::<IpAddr>().is_ok() {
            return Ok(());
        }

        let port = parsed.port_or_known_default().unwrap_or(443);
        let addrs = tokio::net::lookup_host((bare, port))
            .await
            .map_err(|e| SecurityError::DnsResolution(e.to_string()))?;

        for addr in addrs {
            self.check_ip(addr.ip()).map_err(|_| {
                SecurityError::BlockedCidr(format!("{host} resolved to blocked IP {}", addr.ip()))
            })?;
        }

        Ok(())
    }

    /// Convenience for filters.
    pub fn is_allowed(&self, url: &str) -> bool {
        self.validate(url).is_ok()
    }

    fn check_ip(&self, ip: IpAddr) -> SecurityResult<()> {
        match self.blocked_cidrs.iter().find(|cidr| cidr.contains(&ip)) {
            Some(_) => Err(SecurityError::BlockedCidr(ip.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_urls_pass() {
        let guard = UrlGuard::new();
        assert!(guard.validate("https://www.youtube.com/@mkbhd").is_ok());
        assert!(guard.validate("http://93.184.216.34/").is_ok());
    }

    #[test]
    fn test_scheme_rejected() {
        let guard = UrlGuard::new();
        assert!(matches!(
            guard.validate("file:///etc/passwd"),
            Err(SecurityError::DisallowedScheme(s)) if s == "file"
        ));
    }

    #[test]
    fn test_internal_hosts_rejected() {
        let guard = UrlGuard::new();
        assert!(matches!(
            guard.validate("http://LOCALHOST:8080/admin"),
            Err(SecurityError::BlockedHost(_))
        ));
        assert!(matches!(
            guard.validate("http://169.254.169.254/latest/meta-data"),
            Err(SecurityError::BlockedCidr(_))
        ));
        assert!(matches!(
            guard.validate("http://[fe80::1]/"),
            Err(SecurityError::BlockedCidr(_))
        ));
        assert!(!guard.is_allowed("http://10.1.2.3/"));
    }

    #[test]
    fn test_allow_host_overrides() {
        let guard = UrlGuard::new().allow_host("localhost");
        assert!(guard.validate("http://localhost:3000/").is_ok());
    }

    #[test]
    fn test_unparseable_url() {
        assert!(matches!(
            UrlGuard::new().validate("not a url"),
            Err(SecurityError::UrlParse(_))
        ));
    }

    #[tokio::test]
    async fn test_dns_check_skips_literal_ips() {
        let guard = UrlGuard::new();
        assert!(guard.validate_with_dns("http://93.184.216.34/").await.is_ok());
    }
}
