//! Zone reconciliation
//!
//! Brings the A records of one zone in line with the external IP:
//!
//! 1. Look up the zone's domain name
//! 2. List the zone's A records
//! 3. Map every configured subdomain to its fully-qualified name
//! 4. Update each matching record whose content differs from the IP
//!
//! Records are never created. A subdomain without an existing record is
//! reported as skipped.
//!
//! Failures never escape this module: they become [`RecordOutcome::Failed`]
//! entries. Authentication and not-found errors end the zone early (every
//! remaining subdomain inherits the error); any other error only affects the
//! record that produced it.

pub mod report;

pub use report::{OutcomeCounts, PassReport, RecordOutcome, RecordReport, SkipReason, ZoneReport};

use crate::config::ZoneConfig;
use crate::error::Error;
use crate::traits::{DnsRecord, DnsRecordClient, RecordType};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Reconcile one zone against `current_ip`
///
/// # Parameters
///
/// - `zone`: Zone configuration (subdomains and proxied flags)
/// - `ttl`: Configured TTL for non-proxied records
/// - `current_ip`: External IP resolved for this pass
/// - `client`: Client bound to this zone
pub async fn reconcile(
    zone: &ZoneConfig,
    ttl: u32,
    current_ip: Ipv4Addr,
    client: &dyn DnsRecordClient,
) -> ZoneReport {
    let never = AtomicBool::new(false);
    reconcile_until(zone, ttl, current_ip, client, &never).await
}

/// Reconcile one zone, skipping the remaining subdomains once `stop` is set
///
/// `stop` is checked before each subdomain. A call already in flight when it
/// flips is allowed to complete.
pub async fn reconcile_until(
    zone: &ZoneConfig,
    ttl: u32,
    current_ip: Ipv4Addr,
    client: &dyn DnsRecordClient,
    stop: &AtomicBool,
) -> ZoneReport {
    let mut report = ZoneReport::new(&zone.zone_id);

    let domain = match client.zone_name().await {
        Ok(name) => normalize_domain(&name),
        Err(e) => {
            error!(
                "Zone {}: lookup failed ({}): {}",
                zone.zone_id,
                e.kind(),
                e
            );
            fail_all(&mut report, zone, None, &e);
            return report;
        }
    };
    report.domain = Some(domain.clone());

    if stop.load(Ordering::SeqCst) {
        debug!("Zone {} ({}): shutdown requested before listing", zone.zone_id, domain);
        for subdomain in &zone.subdomains {
            report.push(
                &subdomain.name,
                Some(subdomain.fqdn(&domain)),
                RecordOutcome::Skipped(SkipReason::ShutdownRequested),
            );
        }
        return report;
    }

    let records = match client.list(RecordType::A).await {
        Ok(records) => records,
        Err(e) => {
            error!(
                "Zone {} ({}): listing A records failed ({}): {}",
                zone.zone_id,
                domain,
                e.kind(),
                e
            );
            fail_all(&mut report, zone, Some(&domain), &e);
            return report;
        }
    };
    debug!("Zone {} ({}): {} A record(s)", zone.zone_id, domain, records.len());

    let by_name = index_records(&records);
    let mut zone_error: Option<Error> = None;

    for subdomain in &zone.subdomains {
        let fqdn = subdomain.fqdn(&domain);

        if let Some(e) = &zone_error {
            report.push(&subdomain.name, Some(fqdn), RecordOutcome::Failed(e.clone()));
            continue;
        }

        if stop.load(Ordering::SeqCst) {
            debug!("Zone {}: shutdown requested, not checking {}", zone.zone_id, fqdn);
            report.push(
                &subdomain.name,
                Some(fqdn),
                RecordOutcome::Skipped(SkipReason::ShutdownRequested),
            );
            continue;
        }

        let outcome = match by_name.get(fqdn.as_str()) {
            None => {
                warn!(
                    "Zone {}: skipping {} (record not found; records must exist before they can be updated)",
                    zone.zone_id, fqdn
                );
                RecordOutcome::Skipped(SkipReason::RecordNotFound)
            }
            Some(record) if record.points_to(current_ip) => {
                debug!("Zone {}: {} already points to {}", zone.zone_id, fqdn, current_ip);
                RecordOutcome::Unchanged
            }
            Some(record) => {
                let effective_ttl = subdomain.effective_ttl(ttl);
                match client
                    .update(&record.id, current_ip, effective_ttl, subdomain.proxied)
                    .await
                {
                    Ok(_) => {
                        info!(
                            "Zone {}: updated {} from {} to {}",
                            zone.zone_id, fqdn, record.content, current_ip
                        );
                        debug!(
                            "Zone {}: {} ttl={} proxied={}",
                            zone.zone_id, fqdn, effective_ttl, subdomain.proxied
                        );
                        RecordOutcome::Updated {
                            previous: record.content.clone(),
                            current: current_ip,
                        }
                    }
                    Err(e) => {
                        error!(
                            "Zone {}: failed to update {} ({}): {}",
                            zone.zone_id,
                            fqdn,
                            e.kind(),
                            e
                        );
                        if e.is_zone_fatal() {
                            zone_error = Some(e.clone());
                        }
                        RecordOutcome::Failed(e)
                    }
                }
            }
        };

        report.push(&subdomain.name, Some(fqdn), outcome);
    }

    report
}

/// Report for a zone that was never started because shutdown was requested
pub fn skipped_zone(zone: &ZoneConfig) -> ZoneReport {
    let mut report = ZoneReport::new(&zone.zone_id);
    for subdomain in &zone.subdomains {
        report.push(
            &subdomain.name,
            None,
            RecordOutcome::Skipped(SkipReason::ShutdownRequested),
        );
    }
    report
}

fn fail_all(report: &mut ZoneReport, zone: &ZoneConfig, domain: Option<&str>, error: &Error) {
    for subdomain in &zone.subdomains {
        let fqdn = domain.map(|d| subdomain.fqdn(d));
        report.push(&subdomain.name, fqdn, RecordOutcome::Failed(error.clone()));
    }
}

fn normalize_domain(name: &str) -> String {
    name.trim().trim_end_matches('.').to_lowercase()
}

/// Index A records by lowercased name; the first record for a name wins
fn index_records(records: &[DnsRecord]) -> HashMap<String, &DnsRecord> {
    let mut by_name: HashMap<String, &DnsRecord> = HashMap::new();

    for record in records.iter().filter(|r| r.is_type(RecordType::A)) {
        let name = normalize_domain(&record.name);
        if let Some(existing) = by_name.get(&name) {
            warn!(
                "Multiple A records named {}; managing {} and ignoring {}",
                name, existing.id, record.id
            );
            continue;
        }
        by_name.insert(name, record);
    }

    by_name
}
