//! Reconciliation reports
//!
//! Reports describe what a pass did. They are consumed by logging and by
//! [`crate::engine::EngineEvent`] subscribers and have no effect on later
//! passes.

use crate::error::{Error, ErrorKind};
use std::fmt;
use std::net::Ipv4Addr;

/// Why a subdomain was not touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No existing A record with the target name; records are never created
    RecordNotFound,

    /// Shutdown was requested before the update was attempted
    ShutdownRequested,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::RecordNotFound => f.write_str("record not found"),
            SkipReason::ShutdownRequested => f.write_str("shutdown requested"),
        }
    }
}

/// Outcome for one configured subdomain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Record pointed elsewhere and was updated
    Updated {
        /// Content before the update
        previous: String,
        /// Content after the update
        current: Ipv4Addr,
    },

    /// Record already pointed at the external IP
    Unchanged,

    /// Record was not touched
    Skipped(SkipReason),

    /// Lookup or update failed
    Failed(Error),
}

impl RecordOutcome {
    /// Error kind, for failed outcomes
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            RecordOutcome::Failed(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Outcome for one subdomain, with the name it resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReport {
    /// Subdomain as written in the configuration
    pub subdomain: String,

    /// Fully-qualified target name, when the zone's domain was known
    pub fqdn: Option<String>,

    /// What happened
    pub outcome: RecordOutcome,
}

/// Tally of outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    fn add(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Updated { .. } => self.updated += 1,
            RecordOutcome::Unchanged => self.unchanged += 1,
            RecordOutcome::Skipped(_) => self.skipped += 1,
            RecordOutcome::Failed(_) => self.failed += 1,
        }
    }

    fn merge(&mut self, other: OutcomeCounts) {
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl fmt::Display for OutcomeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated, {} unchanged, {} skipped, {} failed",
            self.updated, self.unchanged, self.skipped, self.failed
        )
    }
}

/// Result of reconciling one zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneReport {
    /// Zone identifier
    pub zone_id: String,

    /// Zone domain, if the lookup succeeded
    pub domain: Option<String>,

    /// One entry per configured subdomain, in configuration order
    pub records: Vec<RecordReport>,
}

impl ZoneReport {
    /// Create an empty report
    pub fn new(zone_id: impl Into<String>) -> Self {
        Self {
            zone_id: zone_id.into(),
            domain: None,
            records: Vec::new(),
        }
    }

    /// Append an outcome
    pub fn push(&mut self, subdomain: &str, fqdn: Option<String>, outcome: RecordOutcome) {
        self.records.push(RecordReport {
            subdomain: subdomain.to_string(),
            fqdn,
            outcome,
        });
    }

    /// Outcome for a configured subdomain
    pub fn outcome(&self, subdomain: &str) -> Option<&RecordOutcome> {
        self.records
            .iter()
            .find(|r| r.subdomain == subdomain)
            .map(|r| &r.outcome)
    }

    /// Tally of outcomes
    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for record in &self.records {
            counts.add(&record.outcome);
        }
        counts
    }
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// External IP used for the pass, if resolution succeeded
    pub external_ip: Option<Ipv4Addr>,

    /// Pass-level failure (IP resolution)
    pub error: Option<Error>,

    /// Per-zone results, in configuration order
    pub zones: Vec<ZoneReport>,

    /// Whether shutdown cut the pass short
    pub interrupted: bool,
}

impl PassReport {
    /// Report for a pass whose IP resolution failed
    pub fn failed(error: Error) -> Self {
        Self {
            external_ip: None,
            error: Some(error),
            zones: Vec::new(),
            interrupted: false,
        }
    }

    /// Report for a pass that resolved `ip`
    pub fn resolved(ip: Ipv4Addr) -> Self {
        Self {
            external_ip: Some(ip),
            error: None,
            zones: Vec::new(),
            interrupted: false,
        }
    }

    /// Tally across all zones
    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for zone in &self.zones {
            counts.merge(zone.counts());
        }
        counts
    }

    /// Report for a zone
    pub fn zone(&self, zone_id: &str) -> Option<&ZoneReport> {
        self.zones.iter().find(|z| z.zone_id == zone_id)
    }
}
