// # DNS Record Client Trait
//
// Defines the request/response surface the reconciliation engine needs from
// a DNS provider: look up the zone's domain, list its A records, update one
// record.
//
// ## Implementations
//
// - Cloudflare: `cfddns-provider-cloudflare` crate
//
// ## Scope
//
// A client is bound to exactly one zone and one credential. The engine holds
// one client per configured zone.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// DNS record type handled by the updater
///
/// Only IPv4 host records are managed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    A,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DNS record as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider-assigned record identifier
    pub id: String,

    /// Record type as reported by the provider (e.g. "A")
    #[serde(rename = "type")]
    pub record_type: String,

    /// Fully-qualified record name
    pub name: String,

    /// Current record value
    pub content: String,

    /// TTL in seconds (1 means automatic)
    pub ttl: u32,

    /// Whether the record is proxied
    #[serde(default)]
    pub proxied: bool,
}

impl DnsRecord {
    /// Whether the record already points at `ip`
    ///
    /// Content that is not a valid IPv4 address never matches.
    pub fn points_to(&self, ip: Ipv4Addr) -> bool {
        self.content.trim().parse::<Ipv4Addr>().ok() == Some(ip)
    }

    /// Whether the record is of the given type
    pub fn is_type(&self, record_type: RecordType) -> bool {
        self.record_type.eq_ignore_ascii_case(record_type.as_str())
    }
}

/// Trait for DNS record clients
///
/// # Contract
///
/// - One HTTP request per logical operation (pagination aside).
/// - No retries, no backoff, no caching; the engine owns scheduling and the
///   provider is always the source of truth.
/// - Credentials never appear in logs, errors or `Debug` output.
///
/// # Errors
///
/// - `Error::Auth`: credential rejected
/// - `Error::NotFound`: zone (or record) does not exist
/// - `Error::Validation`: payload rejected by the provider
/// - `Error::Network`: transport failure, timeout, rate limit, 5xx
/// - `Error::Parse`: response body could not be decoded
#[async_trait]
pub trait DnsRecordClient: Send + Sync {
    /// Zone identifier this client is bound to
    fn zone_id(&self) -> &str;

    /// Look up the zone's bare domain name (e.g. "example.com")
    async fn zone_name(&self) -> Result<String, crate::Error>;

    /// List every record of `record_type` in the zone
    async fn list(&self, record_type: RecordType) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Point an existing record at `content`
    ///
    /// # Parameters
    ///
    /// - `record_id`: Provider-assigned record id (from [`DnsRecordClient::list`])
    /// - `content`: New IPv4 address
    /// - `ttl`: TTL to set (1 = automatic)
    /// - `proxied`: Proxied flag to set
    async fn update(
        &self,
        record_id: &str,
        content: Ipv4Addr,
        ttl: u32,
        proxied: bool,
    ) -> Result<DnsRecord, crate::Error>;

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing one client per configured zone
pub trait DnsRecordClientFactory: Send + Sync {
    /// Create a client bound to `zone`
    fn create(
        &self,
        zone: &crate::config::ZoneConfig,
    ) -> Result<Box<dyn DnsRecordClient>, crate::Error>;
}
