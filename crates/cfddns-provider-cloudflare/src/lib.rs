// # Cloudflare DNS Record Client
//
// This crate provides the Cloudflare implementation of `DnsRecordClient`.
//
// ## Scope
//
// One client is bound to one zone and one credential. It performs single-shot
// requests only:
//
// - No retry logic (the next engine pass is the retry)
// - No caching (records are re-listed every pass)
// - No background tasks
//
// ## Security Requirements
//
// - Credentials NEVER appear in logs, errors or Debug output
// - Construction fails fast if a credential is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - Zone Details: GET `/zones/:zone_id`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=A&page=N&per_page=M`
// - Patch DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`

mod api;

use api::{ApiResponse, UpdateRecordRequest, Zone};
use async_trait::async_trait;
use cfddns_core::config::{Credentials, ZoneConfig};
use cfddns_core::traits::{DnsRecord, DnsRecordClient, DnsRecordClientFactory, RecordType};
use cfddns_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records requested per page when listing
const PER_PAGE: u32 = 100;

/// Cloudflare DNS record client for one zone
///
/// # Security
///
/// The Debug implementation does NOT expose the credential.
pub struct CloudflareClient {
    /// Zone this client is bound to
    zone_id: String,

    /// API token or legacy key pair
    /// ⚠️ NEVER log this value
    credentials: Credentials,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("zone_id", &self.zone_id)
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareClient {
    /// Create a client for the public Cloudflare API
    ///
    /// # Parameters
    ///
    /// - `zone_id`: Zone identifier
    /// - `credentials`: Token with Zone:Read and DNS:Edit, or legacy key pair
    pub fn new(zone_id: impl Into<String>, credentials: Credentials) -> Result<Self> {
        Self::with_options(zone_id, credentials, CLOUDFLARE_API_BASE, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a client with a custom base URL and timeout
    pub fn with_options(
        zone_id: impl Into<String>,
        credentials: Credentials,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let zone_id = zone_id.into();
        if zone_id.trim().is_empty() {
            return Err(Error::config("Cloudflare zone id is required"));
        }

        match &credentials {
            Credentials::ApiToken(token) if token.trim().is_empty() => {
                return Err(Error::config("Cloudflare API token is required"));
            }
            Credentials::GlobalKey { api_key, api_email }
                if api_key.trim().is_empty() || api_email.trim().is_empty() =>
            {
                return Err(Error::config("Cloudflare API key and email are required"));
            }
            _ => {}
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cfddns/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            zone_id,
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn zone_url(&self) -> String {
        format!("{}/zones/{}", self.base_url, self.zone_id)
    }

    /// Attach authentication headers
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Credentials::ApiToken(token) => request.bearer_auth(token),
            Credentials::GlobalKey { api_key, api_email } => request
                .header("X-Auth-Key", api_key)
                .header("X-Auth-Email", api_email),
        }
    }

    /// Send a request and decode the v4 envelope
    async fn send<T: DeserializeOwned>(
        &self,
        context: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiResponse<T>> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| Error::network(format!("{}: HTTP request failed: {}", context, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("{}: failed to read response: {}", context, e)))?;

        if !status.is_success() {
            return Err(api::status_error(context, status, &body));
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&body)
            .map_err(|e| Error::parse(format!("{}: failed to parse response: {}", context, e)))?;

        if !envelope.success {
            return Err(api::envelope_error(context, &envelope.errors));
        }

        Ok(envelope)
    }
}

#[async_trait]
impl DnsRecordClient for CloudflareClient {
    fn zone_id(&self) -> &str {
        &self.zone_id
    }

    async fn zone_name(&self) -> Result<String> {
        let context = format!("zone {} lookup", self.zone_id);
        let response: ApiResponse<Zone> = self
            .send(&context, self.client.get(self.zone_url()))
            .await?;

        let zone = response
            .result
            .ok_or_else(|| Error::parse(format!("{}: response has no result", context)))?;

        tracing::debug!("Zone {} is {}", self.zone_id, zone.name);
        Ok(zone.name)
    }

    async fn list(&self, record_type: RecordType) -> Result<Vec<DnsRecord>> {
        let context = format!("zone {} {} record listing", self.zone_id, record_type);
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}/dns_records?type={}&page={}&per_page={}",
                self.zone_url(),
                record_type,
                page,
                PER_PAGE
            );
            let response: ApiResponse<Vec<DnsRecord>> =
                self.send(&context, self.client.get(url)).await?;

            records.extend(response.result.unwrap_or_default());

            match response.result_info {
                Some(info) if info.page < info.total_pages => page = info.page + 1,
                _ => break,
            }
        }

        tracing::debug!(
            "Zone {}: listed {} {} record(s)",
            self.zone_id,
            records.len(),
            record_type
        );
        Ok(records)
    }

    async fn update(
        &self,
        record_id: &str,
        content: Ipv4Addr,
        ttl: u32,
        proxied: bool,
    ) -> Result<DnsRecord> {
        let context = format!("zone {} record {} update", self.zone_id, record_id);
        let payload = UpdateRecordRequest {
            content: content.to_string(),
            ttl,
            proxied,
            comment: update_comment(chrono::Local::now()),
        };

        let url = format!("{}/dns_records/{}", self.zone_url(), record_id);
        let response: ApiResponse<DnsRecord> = self
            .send(&context, self.client.patch(url).json(&payload))
            .await?;

        response
            .result
            .ok_or_else(|| Error::parse(format!("{}: response has no result", context)))
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Comment stamped on every updated record
fn update_comment<Tz>(now: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("Updated by cfddns on {}", now.format("%Y-%m-%d %H:%M:%S"))
}

/// Factory for creating one Cloudflare client per zone
#[derive(Debug, Clone)]
pub struct CloudflareFactory {
    base_url: String,
    timeout: Duration,
}

impl Default for CloudflareFactory {
    fn default() -> Self {
        Self {
            base_url: CLOUDFLARE_API_BASE.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl CloudflareFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point every client at a different API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl DnsRecordClientFactory for CloudflareFactory {
    fn create(&self, zone: &ZoneConfig) -> Result<Box<dyn DnsRecordClient>> {
        let client = CloudflareClient::with_options(
            zone.zone_id.clone(),
            zone.credentials.clone(),
            self.base_url.clone(),
            self.timeout,
        )?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cfddns_core::ErrorKind;
    use cfddns_core::config::SubdomainConfig;

    fn token() -> Credentials {
        Credentials::ApiToken("secret_token_12345".to_string())
    }

    #[test]
    fn test_factory_creation() {
        let zone = ZoneConfig::new("zone-1", "test_token", vec![SubdomainConfig::apex()]);
        let client = CloudflareFactory::new().create(&zone).unwrap();
        assert_eq!(client.zone_id(), "zone-1");
        assert_eq!(client.provider_name(), "cloudflare");
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let err = CloudflareClient::new("zone-1", Credentials::ApiToken(" ".into())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = CloudflareClient::new(
            "zone-1",
            Credentials::GlobalKey {
                api_key: "key".into(),
                api_email: "".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = CloudflareClient::new("", token()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_credentials_not_exposed_in_debug() {
        let client = CloudflareClient::new("zone-1", token()).unwrap();

        let debug_str = format!("{:?}", client);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("CloudflareClient"));
        assert!(debug_str.contains("zone-1"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client =
            CloudflareClient::with_options("z", token(), "http://localhost:1/", DEFAULT_HTTP_TIMEOUT)
                .unwrap();
        assert_eq!(client.zone_url(), "http://localhost:1/zones/z");
    }

    #[test]
    fn test_update_comment() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(update_comment(at), "Updated by cfddns on 2024-03-09 14:05:00");
    }
}
