// # cfddns-core
//
// Core library for the Cloudflare dynamic DNS updater.
//
// ## Architecture Overview
//
// This library provides the core functionality for keeping A records in line
// with the host's public IPv4 address:
// - **IpSource**: Trait for resolving the current external IP
// - **DnsRecordClient**: Trait for listing and updating records in one zone
// - **reconcile**: Per-zone diff of configured subdomains against live records
// - **DdnsEngine**: Scheduler that runs a pass, sleeps, and repeats until shutdown
// - **config**: YAML/JSON loader with `${VAR}` substitution and strict validation
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from HTTP implementations
// 2. **Provider as Source of Truth**: Records are re-listed every pass, nothing is cached
// 3. **Failure Isolation**: One failing record or zone never stops the others
// 4. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod traits;

// Re-export core types for convenience
pub use config::{Credentials, GlobalConfig, SubdomainConfig, ZoneConfig};
pub use engine::{DdnsEngine, EngineEvent, EngineState};
pub use error::{Error, ErrorKind, Result};
pub use reconcile::{PassReport, RecordOutcome, SkipReason, ZoneReport};
pub use traits::{DnsRecord, DnsRecordClient, DnsRecordClientFactory, IpSource, RecordType};
