//! Core traits for the DDNS updater
//!
//! This module defines the seams between the reconciliation loop and the
//! outside world.
//!
//! - [`IpSource`]: Resolve the host's current public IPv4 address
//! - [`DnsRecordClient`]: List and update A records in one zone

pub mod ip_source;
pub mod dns_client;

pub use ip_source::IpSource;
pub use dns_client::{DnsRecord, DnsRecordClient, DnsRecordClientFactory, RecordType};
