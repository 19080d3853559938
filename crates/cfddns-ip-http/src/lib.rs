// # HTTP IP Source
//
// This crate provides the external IP resolver for the DDNS updater.
//
// ## Architecture
//
// Sends a single GET to a plain-text IP-echo service (by default
// https://api.ipify.org) and parses the trimmed body as an IPv4 address.
//
// - One request per call, bounded by a timeout (5 seconds by default)
// - No cache: every pass sees a fresh answer
// - No retries: the engine's next pass is the retry

use cfddns_core::traits::IpSource;
use cfddns_core::{Error, Result};

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Default IP-echo endpoint
pub const DEFAULT_URL: &str = "https://api.ipify.org";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP-based IP source
#[derive(Debug, Clone)]
pub struct HttpIpSource {
    /// URL to fetch the IP from
    url: String,

    /// HTTP client (carries the timeout)
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create an IP source for `url` with the default timeout
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Create an IP source for `url` with a custom timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::config("IP source URL must not be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { url, client })
    }

    /// Endpoint queried by this source
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch current IP from the HTTP service
    async fn fetch_ip(&self) -> Result<Ipv4Addr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::network(format!("Request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::network(format!(
                "IP service {} returned HTTP {}",
                self.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read response: {}", e)))?;

        parse_ipv4(&body)
    }
}

/// Parse an IP-echo response body
fn parse_ipv4(body: &str) -> Result<Ipv4Addr> {
    let text = body.trim();
    match text.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => Ok(ip),
        Ok(IpAddr::V6(ip)) => Err(Error::parse(format!("Expected IPv4, got: {}", ip))),
        Err(_) => Err(Error::parse(format!(
            "Invalid IP address: {:?}",
            text.chars().take(64).collect::<String>()
        ))),
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        let ip = self.fetch_ip().await?;
        tracing::debug!("{} reported {}", self.url, ip);
        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
