// # IP Source Trait
//
// Defines the interface for resolving the host's public IPv4 address.
//
// ## Implementations
//
// - HTTP IP-echo service: `cfddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::IpSource;
//
// #[tokio::main]
// async fn main() -> cfddns_core::Result<()> {
//     let source = /* IpSource implementation */;
//     let ip = source.current().await?;
//     println!("external IP: {}", ip);
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for IP source implementations
///
/// The engine calls [`IpSource::current`] exactly once at the start of each
/// reconciliation pass and shares the result across every zone in that pass.
///
/// # Contract
///
/// - Every call performs a fresh lookup; results are not cached.
/// - Every call is bounded by a timeout.
/// - No retries. A failed lookup fails the pass and the next scheduled pass
///   is the retry.
///
/// # Errors
///
/// - `Error::Network`: transport failure, timeout, or non-2xx response
/// - `Error::Parse`: response is not a dotted-quad IPv4 address
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Resolve the current public IPv4 address
    async fn current(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Short name for logging
    fn source_name(&self) -> &'static str;
}
