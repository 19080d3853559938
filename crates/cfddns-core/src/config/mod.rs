//! Configuration types for the DDNS updater
//!
//! A [`GlobalConfig`] is produced once at startup by the [`loader`] and is
//! immutable afterwards. Components receive the pieces they need through
//! their constructors; nothing reads configuration from ambient state.

pub mod env;
pub mod loader;

pub use loader::{
    CONFIG_FILE_CANDIDATES, ConfigFormat, load_config, load_config_with_env, parse_config,
    resolve_config_path,
};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Default record TTL in seconds
pub const DEFAULT_TTL: u32 = 300;

/// TTLs must be strictly greater than this
pub const MIN_TTL: u32 = 60;

/// Largest TTL Cloudflare accepts
pub const MAX_TTL: u32 = 86_400;

/// Cloudflare's "automatic" TTL sentinel, forced for proxied records
pub const AUTO_TTL: u32 = 1;

/// Default delay between reconciliation passes (in seconds)
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 900;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    /// TTL applied to updated records that are not proxied
    pub ttl: u32,

    /// Delay between the end of one pass and the start of the next
    pub check_interval_secs: u64,

    /// Zones to reconcile, in order
    pub cloudflare: Vec<ZoneConfig>,
}

impl GlobalConfig {
    /// Create a configuration with default TTL and interval
    pub fn new(zones: Vec<ZoneConfig>) -> Self {
        Self {
            ttl: DEFAULT_TTL,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            cloudflare: zones,
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the check interval
    pub fn with_check_interval_secs(mut self, secs: u64) -> Self {
        self.check_interval_secs = secs;
        self
    }

    /// The check interval as a [`Duration`]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Validate the configuration
    ///
    /// Error messages identify zones by position and id, never by
    /// credential.
    pub fn validate(&self) -> Result<()> {
        if self.ttl <= MIN_TTL || self.ttl > MAX_TTL {
            return Err(Error::config(format!(
                "ttl must be greater than {} and at most {} seconds, got {}",
                MIN_TTL, MAX_TTL, self.ttl
            )));
        }

        if self.check_interval_secs == 0 {
            return Err(Error::config("check_interval must be a positive number of seconds"));
        }

        if self.cloudflare.is_empty() {
            return Err(Error::config("'cloudflare' must list at least one zone"));
        }

        for (index, zone) in self.cloudflare.iter().enumerate() {
            let label = if zone.zone_id.trim().is_empty() {
                format!("zone #{}", index + 1)
            } else {
                format!("zone #{} ('{}')", index + 1, zone.zone_id)
            };
            zone.validate()
                .map_err(|e| Error::config(format!("{}: {}", label, message_of(e))))?;
        }

        Ok(())
    }
}

fn message_of(err: Error) -> String {
    match err {
        Error::Config(msg) => msg,
        other => other.to_string(),
    }
}

/// One Cloudflare zone and the subdomains managed inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneConfig {
    /// Opaque Cloudflare zone identifier
    pub zone_id: String,

    /// Credential used for every call against this zone
    pub credentials: Credentials,

    /// Subdomains to keep pointed at the external IP
    pub subdomains: Vec<SubdomainConfig>,
}

impl ZoneConfig {
    /// Create a zone authenticated with an API token
    pub fn new(
        zone_id: impl Into<String>,
        api_token: impl Into<String>,
        subdomains: Vec<SubdomainConfig>,
    ) -> Self {
        Self {
            zone_id: zone_id.into(),
            credentials: Credentials::ApiToken(api_token.into()),
            subdomains,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.zone_id.trim().is_empty() {
            return Err(Error::config("'zone_id' must not be empty"));
        }

        self.credentials.validate()?;

        if self.subdomains.is_empty() {
            return Err(Error::config("'subdomains' must list at least one entry"));
        }

        let mut seen = HashSet::new();
        for subdomain in &self.subdomains {
            let key = subdomain.label();
            if !seen.insert(key.clone()) {
                let shown = key.unwrap_or_else(|| "@".to_string());
                return Err(Error::config(format!(
                    "subdomain '{}' is listed more than once",
                    shown
                )));
            }
        }

        Ok(())
    }
}

/// Credential for the Cloudflare API
///
/// The Debug implementation never exposes secret values.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Scoped API token, sent as a bearer token
    ApiToken(String),

    /// Legacy global API key, sent with the account email
    GlobalKey { api_key: String, api_email: String },
}

impl Credentials {
    fn validate(&self) -> Result<()> {
        match self {
            Credentials::ApiToken(token) if token.trim().is_empty() => {
                Err(Error::config("'api_token' must not be empty"))
            }
            Credentials::GlobalKey { api_key, api_email }
                if api_key.trim().is_empty() || api_email.trim().is_empty() =>
            {
                Err(Error::config("'api_key' and 'api_email' must not be empty"))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ApiToken(_) => f.debug_tuple("ApiToken").field(&"<REDACTED>").finish(),
            Credentials::GlobalKey { api_email, .. } => f
                .debug_struct("GlobalKey")
                .field("api_key", &"<REDACTED>")
                .field("api_email", api_email)
                .finish(),
        }
    }
}

/// A subdomain inside a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubdomainConfig {
    /// Label relative to the zone; `"@"` or `""` is the apex
    pub name: String,

    /// Whether traffic is proxied through Cloudflare
    #[serde(default, deserialize_with = "loader::flag_value")]
    pub proxied: bool,
}

impl SubdomainConfig {
    /// Create an unproxied subdomain
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            proxied: false,
        }
    }

    /// Create the apex entry
    pub fn apex() -> Self {
        Self::new("@")
    }

    /// Set the proxied flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    /// Normalized label, or `None` for the apex
    pub fn label(&self) -> Option<String> {
        let name = self.name.trim().to_lowercase();
        if name.is_empty() || name == "@" {
            None
        } else {
            Some(name)
        }
    }

    /// Fully-qualified record name inside `domain`
    pub fn fqdn(&self, domain: &str) -> String {
        let domain = domain.trim().trim_end_matches('.').to_lowercase();
        match self.label() {
            None => domain,
            Some(label) => format!("{}.{}", label, domain),
        }
    }

    /// TTL to send when updating this subdomain's record
    pub fn effective_ttl(&self, configured_ttl: u32) -> u32 {
        if self.proxied { AUTO_TTL } else { configured_ttl }
    }
}
