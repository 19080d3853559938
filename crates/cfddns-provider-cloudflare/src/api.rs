//! Cloudflare API v4 wire types and error mapping
//!
//! Every v4 response uses the same envelope:
//!
//! ```json
//! { "success": true, "errors": [], "messages": [], "result": ..., "result_info": {...} }
//! ```

use cfddns_core::Error;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Error codes Cloudflare returns for unusable credentials
const AUTH_ERROR_CODES: &[i64] = &[9103, 9106, 9109, 10000];

/// Error codes Cloudflare returns for an unknown or malformed identifier
const NOT_FOUND_ERROR_CODES: &[i64] = &[7000, 7003];

/// Response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub success: bool,

    #[serde(default)]
    pub errors: Vec<ApiError>,

    pub result: Option<T>,

    pub result_info: Option<ResultInfo>,
}

/// One entry of the `errors` array
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiError {
    pub code: i64,
    pub message: String,
}

/// Pagination block of list responses
#[derive(Debug, Deserialize)]
pub(crate) struct ResultInfo {
    pub page: u32,
    pub total_pages: u32,
}

/// `GET /zones/{id}` result
#[derive(Debug, Deserialize)]
pub(crate) struct Zone {
    pub name: String,
}

/// `PATCH /zones/{id}/dns_records/{record_id}` body
#[derive(Debug, Serialize)]
pub(crate) struct UpdateRecordRequest {
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
    pub comment: String,
}

/// Render the `errors` array for an error message
fn describe(errors: &[ApiError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} ({})", e.message, e.code))
        .collect::<Vec<_>>()
        .join(", ")
}

fn has_code(errors: &[ApiError], codes: &[i64]) -> bool {
    errors.iter().any(|e| codes.contains(&e.code))
}

/// Map a non-2xx response to an error
///
/// `body` is parsed opportunistically for the `errors` array; an
/// unparseable body only loses detail.
pub(crate) fn status_error(context: &str, status: StatusCode, body: &str) -> Error {
    let errors = serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
        .map(|r| r.errors)
        .unwrap_or_default();

    let detail = if errors.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, describe(&errors))
    };
    let msg = format!("{}: {}", context, detail);

    match status.as_u16() {
        401 | 403 => Error::auth(msg),
        404 => Error::not_found(msg),
        429 => Error::network(format!("{} (rate limited)", msg)),
        500..=599 => Error::network(msg),
        _ if has_code(&errors, AUTH_ERROR_CODES) => Error::auth(msg),
        _ if has_code(&errors, NOT_FOUND_ERROR_CODES) => Error::not_found(msg),
        _ => Error::validation(msg),
    }
}

/// Map a 2xx response whose envelope reports `success: false`
pub(crate) fn envelope_error(context: &str, errors: &[ApiError]) -> Error {
    let msg = if errors.is_empty() {
        format!("{}: request was not successful", context)
    } else {
        format!("{}: {}", context, describe(errors))
    };

    if has_code(errors, AUTH_ERROR_CODES) {
        Error::auth(msg)
    } else if has_code(errors, NOT_FOUND_ERROR_CODES) {
        Error::not_found(msg)
    } else {
        Error::validation(msg)
    }
}
