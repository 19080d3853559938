//! Environment handling for configuration documents
//!
//! Two mechanisms are supported:
//!
//! - `${VAR_NAME}` references inside string values, replaced by the named
//!   variable. `$$` produces a literal `$`. Unresolved references fail
//!   loading.
//! - Credential overrides: `CF_DDNS_API_TOKEN`, or the pair
//!   `CF_DDNS_API_KEY` + `CF_DDNS_API_EMAIL`, replace the credential of
//!   every zone.
//!
//! Both take a lookup function instead of reading the process environment
//! directly so they can be exercised without mutating global state.

use super::{Credentials, ZoneConfig};
use crate::error::{Error, Result};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Variable that overrides every zone's API token
pub const API_TOKEN_OVERRIDE: &str = "CF_DDNS_API_TOKEN";

/// Variable that overrides every zone's global API key
pub const API_KEY_OVERRIDE: &str = "CF_DDNS_API_KEY";

/// Variable paired with [`API_KEY_OVERRIDE`]
pub const API_EMAIL_OVERRIDE: &str = "CF_DDNS_API_EMAIL";

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("reference pattern is valid")
});

/// Look up a variable in the process environment
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Substitute `${VAR}` references in a single string
///
/// Every missing variable is reported, not just the first.
pub fn substitute<F>(input: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = BTreeSet::new();
    let output = substitute_collecting(input, &lookup, &mut missing);

    if missing.is_empty() {
        Ok(output)
    } else {
        Err(unresolved(missing))
    }
}

/// Substitute references in every string value of a parsed document
///
/// Keys and non-string scalars are left untouched.
pub fn substitute_document<F>(document: &mut Value, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = BTreeSet::new();
    walk(document, &lookup, &mut missing);

    if missing.is_empty() {
        Ok(())
    } else {
        Err(unresolved(missing))
    }
}

fn walk<F>(value: &mut Value, lookup: &F, missing: &mut BTreeSet<String>)
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(s) => {
            if s.contains('$') {
                *s = substitute_collecting(s, lookup, missing);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, lookup, missing);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                walk(item, lookup, missing);
            }
        }
        _ => {}
    }
}

fn substitute_collecting<F>(input: &str, lookup: &F, missing: &mut BTreeSet<String>) -> String
where
    F: Fn(&str) -> Option<String>,
{
    REFERENCE
        .replace_all(input, |caps: &Captures| match caps.get(1) {
            None => "$".to_string(),
            Some(name) => match lookup(name.as_str()) {
                Some(value) => value,
                None => {
                    missing.insert(name.as_str().to_string());
                    String::new()
                }
            },
        })
        .into_owned()
}

fn unresolved(missing: BTreeSet<String>) -> Error {
    let names: Vec<String> = missing.into_iter().collect();
    Error::config(format!(
        "unresolved environment variable(s): {}",
        names.join(", ")
    ))
}

/// Apply credential overrides from the environment to every zone
///
/// Returns the name of the override that was applied, if any.
pub fn apply_credential_overrides<F>(zones: &mut [ZoneConfig], lookup: F) -> Option<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let credentials = if let Some(token) = non_empty(API_TOKEN_OVERRIDE) {
        (Credentials::ApiToken(token), API_TOKEN_OVERRIDE)
    } else if let (Some(api_key), Some(api_email)) =
        (non_empty(API_KEY_OVERRIDE), non_empty(API_EMAIL_OVERRIDE))
    {
        (Credentials::GlobalKey { api_key, api_email }, API_KEY_OVERRIDE)
    } else {
        return None;
    };

    for zone in zones.iter_mut() {
        zone.credentials = credentials.0.clone();
    }

    Some(credentials.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubdomainConfig;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_reference_is_replaced() {
        let out = substitute("Bearer ${CF_TOKEN}", env(&[("CF_TOKEN", "abc123")])).unwrap();
        assert_eq!(out, "Bearer abc123");
    }

    #[test]
    fn test_multiple_references() {
        let out = substitute("${A}-${B}-${A}", env(&[("A", "x"), ("B", "y")])).unwrap();
        assert_eq!(out, "x-y-x");
    }

    #[test]
    fn test_dollar_escape() {
        let out = substitute("cost: $$5 ${A}", env(&[("A", "ok")])).unwrap();
        assert_eq!(out, "cost: $5 ok");
    }

    #[test]
    fn test_unresolved_references_all_reported() {
        let err = substitute("${MISSING_ONE} ${PRESENT} ${MISSING_TWO}", env(&[("PRESENT", "1")]))
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, Error::Config(_)));
        assert!(msg.contains("MISSING_ONE"));
        assert!(msg.contains("MISSING_TWO"));
        assert!(!msg.contains("PRESENT"));
    }

    #[test]
    fn test_text_without_braces_is_untouched() {
        let out = substitute("$HOME and ${not valid}", env(&[])).unwrap();
        assert_eq!(out, "$HOME and ${not valid}");
    }

    #[test]
    fn test_document_walk_only_touches_strings() {
        let mut doc = serde_json::json!({
            "ttl": 300,
            "cloudflare": [{ "zone_id": "${ZONE}", "subdomains": [{ "name": "${SUB}" }] }]
        });

        substitute_document(&mut doc, env(&[("ZONE", "z-1"), ("SUB", "www")])).unwrap();

        assert_eq!(doc["ttl"], 300);
        assert_eq!(doc["cloudflare"][0]["zone_id"], "z-1");
        assert_eq!(doc["cloudflare"][0]["subdomains"][0]["name"], "www");
    }

    #[test]
    fn test_token_override_applies_to_every_zone() {
        let mut zones = vec![
            ZoneConfig::new("z1", "file-token-1", vec![SubdomainConfig::apex()]),
            ZoneConfig::new("z2", "file-token-2", vec![SubdomainConfig::apex()]),
        ];

        let applied = apply_credential_overrides(&mut zones, env(&[("CF_DDNS_API_TOKEN", "env")]));

        assert_eq!(applied, Some(API_TOKEN_OVERRIDE));
        for zone in &zones {
            assert_eq!(zone.credentials, Credentials::ApiToken("env".to_string()));
        }
    }

    #[test]
    fn test_key_override_requires_both_values() {
        let mut zones = vec![ZoneConfig::new("z1", "file", vec![SubdomainConfig::apex()])];

        let applied = apply_credential_overrides(&mut zones, env(&[("CF_DDNS_API_KEY", "k")]));
        assert_eq!(applied, None);
        assert_eq!(zones[0].credentials, Credentials::ApiToken("file".to_string()));

        let applied = apply_credential_overrides(
            &mut zones,
            env(&[("CF_DDNS_API_KEY", "k"), ("CF_DDNS_API_EMAIL", "a@b.c")]),
        );
        assert_eq!(applied, Some(API_KEY_OVERRIDE));
        assert_eq!(
            zones[0].credentials,
            Credentials::GlobalKey {
                api_key: "k".to_string(),
                api_email: "a@b.c".to_string()
            }
        );
    }
}
