//! Configuration file discovery and parsing
//!
//! The document is parsed into a generic tree, `${VAR}` references in string
//! values are substituted, and the result is deserialized into a strict
//! schema that rejects unknown keys. Numeric and boolean fields also accept
//! their string spelling, so `ttl: ${TTL}` loads like `ttl: 600`.
//! Credential overrides are applied last, followed by
//! [`GlobalConfig::validate`].

use super::env::{apply_credential_overrides, process_env, substitute_document};
use super::{Credentials, DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_TTL, GlobalConfig, SubdomainConfig, ZoneConfig};
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, de};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File names tried, in order, when no explicit path is given
pub const CONFIG_FILE_CANDIDATES: &[&str] = &["config.yaml", "config.yml", "config.json"];

/// Serialization format of a configuration document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension (`.json` is JSON, anything else YAML)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Find the configuration file to load
///
/// An explicit path must exist. Otherwise the first existing entry of
/// [`CONFIG_FILE_CANDIDATES`] inside `base_dir` is used.
pub fn resolve_config_path(explicit: Option<&Path>, base_dir: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    CONFIG_FILE_CANDIDATES
        .iter()
        .map(|name| base_dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| {
            Error::config(format!(
                "Configuration file not found in {}. Tried: {}",
                base_dir.display(),
                CONFIG_FILE_CANDIDATES.join(", ")
            ))
        })
}

/// Load and validate a configuration file using the process environment
pub fn load_config(path: &Path) -> Result<GlobalConfig> {
    load_config_with_env(path, process_env)
}

/// Load and validate a configuration file with an explicit variable lookup
pub fn load_config_with_env<F>(path: &Path, lookup: F) -> Result<GlobalConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let config = parse_config(&text, ConfigFormat::from_path(path), lookup)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse, substitute, override and validate a configuration document
pub fn parse_config<F>(text: &str, format: ConfigFormat, lookup: F) -> Result<GlobalConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut document: Value = match format {
        ConfigFormat::Json => serde_json::from_str(text)
            .map_err(|e| Error::config(format!("Invalid JSON: {}", e)))?,
        ConfigFormat::Yaml => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(text)
                .map_err(|e| Error::config(format!("Invalid YAML: {}", e)))?;
            serde_json::to_value(yaml)
                .map_err(|e| Error::config(format!("Unsupported YAML structure: {}", e)))?
        }
    };

    if document.is_null() {
        return Err(Error::config("Configuration document is empty"));
    }

    substitute_document(&mut document, &lookup)?;

    let raw: RawConfig = serde_json::from_value(document)
        .map_err(|e| Error::config(format!("Invalid configuration: {}", e)))?;

    let mut config = raw.into_config()?;

    if let Some(source) = apply_credential_overrides(&mut config.cloudflare, &lookup) {
        info!("Using credentials from {} for all zones", source);
    }

    config.validate()?;
    debug!(
        "Configuration valid: {} zone(s), ttl={}, interval={}s",
        config.cloudflare.len(),
        config.ttl,
        config.check_interval_secs
    );

    Ok(config)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    cloudflare: Option<Vec<RawZone>>,
    #[serde(default, deserialize_with = "integer_value")]
    ttl: Option<i64>,
    #[serde(default, deserialize_with = "integer_value")]
    check_interval: Option<i64>,
}

/// A scalar written either natively or as text
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar<T> {
    Native(T),
    Text(String),
}

fn integer_value<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar<i64>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Native(n)) => Ok(Some(n)),
        Some(Scalar::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected an integer, got \"{}\"", text))),
    }
}

/// `proxied` as a boolean or as `"true"`/`"false"` in any case
pub(super) fn flag_value<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Scalar::<bool>::deserialize(deserializer)? {
        Scalar::Native(flag) => Ok(flag),
        Scalar::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(de::Error::custom(format!("expected a boolean, got \"{}\"", text))),
        },
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawZone {
    zone_id: Option<String>,
    api_token: Option<String>,
    authentication: Option<RawAuthentication>,
    subdomains: Option<Vec<SubdomainConfig>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAuthentication {
    api_token: Option<String>,
    api_key: Option<String>,
    api_email: Option<String>,
}

impl RawConfig {
    fn into_config(self) -> Result<GlobalConfig> {
        let ttl = match self.ttl {
            None => DEFAULT_TTL,
            Some(ttl) => u32::try_from(ttl)
                .ok()
                .filter(|t| *t > 0)
                .ok_or_else(|| Error::config(format!("ttl must be a positive integer, got {}", ttl)))?,
        };

        let check_interval_secs = match self.check_interval {
            None => DEFAULT_CHECK_INTERVAL_SECS,
            Some(secs) => u64::try_from(secs).ok().filter(|s| *s > 0).ok_or_else(|| {
                Error::config(format!("check_interval must be a positive integer, got {}", secs))
            })?,
        };

        let zones = self
            .cloudflare
            .ok_or_else(|| Error::config("missing required key 'cloudflare'"))?
            .into_iter()
            .enumerate()
            .map(|(index, zone)| {
                zone.into_zone()
                    .map_err(|msg| Error::config(format!("zone #{}: {}", index + 1, msg)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(GlobalConfig {
            ttl,
            check_interval_secs,
            cloudflare: zones,
        })
    }
}

impl RawZone {
    fn into_zone(self) -> std::result::Result<ZoneConfig, String> {
        let zone_id = self
            .zone_id
            .ok_or_else(|| "missing required key 'zone_id'".to_string())?;

        let credentials = match (self.api_token, self.authentication) {
            (Some(token), None) => Credentials::ApiToken(token),
            (None, Some(auth)) => auth.into_credentials()?,
            (Some(_), Some(_)) => {
                return Err("set either 'api_token' or 'authentication', not both".to_string());
            }
            (None, None) => {
                return Err("missing required key 'api_token'".to_string());
            }
        };

        let subdomains = self
            .subdomains
            .ok_or_else(|| "missing required key 'subdomains'".to_string())?;

        Ok(ZoneConfig {
            zone_id,
            credentials,
            subdomains,
        })
    }
}

impl RawAuthentication {
    fn into_credentials(self) -> std::result::Result<Credentials, String> {
        match (self.api_token, self.api_key, self.api_email) {
            (Some(token), None, None) => Ok(Credentials::ApiToken(token)),
            (None, Some(api_key), Some(api_email)) => Ok(Credentials::GlobalKey { api_key, api_email }),
            _ => Err(
                "'authentication' needs either 'api_token' or both 'api_key' and 'api_email'"
                    .to_string(),
            ),
        }
    }
}
