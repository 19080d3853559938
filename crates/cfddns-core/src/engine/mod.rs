//! Core DDNS engine
//!
//! The DdnsEngine is responsible for:
//! - Resolving the external IP once per pass via IpSource
//! - Reconciling every configured zone through its DnsRecordClient
//! - Sleeping between passes until shutdown is requested
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  IpSource   │─── Ipv4Addr (once per pass) ───┐
//! └─────────────┘                                │
//!                                                ▼
//!                                       ┌──────────────┐
//!                                       │  DdnsEngine  │
//!                                       └──────────────┘
//!                                                │
//!                    ┌───────────────────────────┼──────────────────┐
//!                    │                           │                  │
//!                    ▼                           ▼                  ▼
//!           ┌─────────────────┐        ┌─────────────────┐  ┌─────────────┐
//!           │ DnsRecordClient │  ...   │ DnsRecordClient │  │   Events    │
//!           │ (zone 0)        │        │ (zone N)        │  │  (notify)   │
//!           └─────────────────┘        └─────────────────┘  └─────────────┘
//! ```
//!
//! ## State Machine
//!
//! ```text
//! ResolvingIp → Reconciling { zone_index } → Sleeping → Idle → ResolvingIp …
//!                                                         └──→ Stopped
//! ```
//!
//! A failed IP lookup skips straight to `Sleeping`. There is no backoff and
//! no in-pass retry: the next pass is the retry.

use crate::config::{GlobalConfig, ZoneConfig};
use crate::error::Result;
use crate::reconcile::{self, PassReport};
use crate::traits::{DnsRecordClient, DnsRecordClientFactory, IpSource};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Capacity of the engine event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Looking up the external IP
    ResolvingIp,

    /// Reconciling the zone at `zone_index` (configuration order)
    Reconciling { zone_index: usize },

    /// Waiting for the next pass
    Sleeping,

    /// Sleep elapsed, about to start a pass
    Idle,

    /// Run loop has exited
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::ResolvingIp => f.write_str("resolving-ip"),
            EngineState::Reconciling { zone_index } => write!(f, "reconciling(zone #{})", zone_index + 1),
            EngineState::Sleeping => f.write_str("sleeping"),
            EngineState::Idle => f.write_str("idle"),
            EngineState::Stopped => f.write_str("stopped"),
        }
    }
}

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Run loop started
    Started {
        zones_count: usize,
        interval_secs: u64,
    },

    /// State transition
    StateChanged {
        from: EngineState,
        to: EngineState,
    },

    /// A pass finished (successfully or not)
    PassCompleted {
        report: PassReport,
    },

    /// Run loop exited
    Stopped {
        reason: String,
    },
}

/// A configured zone together with the client bound to it
struct ManagedZone {
    config: ZoneConfig,
    client: Box<dyn DnsRecordClient>,
}

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Start with [`DdnsEngine::run()`] (OS signals) or
///    [`DdnsEngine::run_until()`] (caller-provided shutdown future)
/// 3. The loop exits after the first shutdown request
///
/// ## Shutdown
///
/// - During sleep: the sleep ends immediately.
/// - During a pass: the in-flight request completes, every remaining
///   subdomain is reported as skipped, and no new pass starts.
pub struct DdnsEngine {
    /// IP source, queried once per pass
    ip_source: Box<dyn IpSource>,

    /// Zones in configuration order
    zones: Vec<ManagedZone>,

    /// Configured TTL for non-proxied records
    ttl: u32,

    /// Delay between the end of one pass and the start of the next
    interval: Duration,

    /// Current state
    state: EngineState,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// The configuration is validated before any client is built, so an
    /// invalid configuration never reaches the network.
    ///
    /// # Parameters
    ///
    /// - `ip_source`: IP source implementation
    /// - `factory`: Builds one DNS record client per configured zone
    /// - `config`: Loaded configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        ip_source: Box<dyn IpSource>,
        factory: &dyn DnsRecordClientFactory,
        config: GlobalConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let interval = config.check_interval();
        let ttl = config.ttl;

        let zones = config
            .cloudflare
            .into_iter()
            .map(|zone| {
                let client = factory.create(&zone)?;
                debug!(
                    "Created {} client for zone {}",
                    client.provider_name(),
                    zone.zone_id
                );
                Ok(ManagedZone {
                    config: zone,
                    client,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let engine = Self {
            ip_source,
            zones,
            ttl,
            interval,
            state: EngineState::ResolvingIp,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Current state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Number of managed zones
    pub fn zones_count(&self) -> usize {
        self.zones.len()
    }

    /// Delay between passes
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until SIGINT or SIGTERM
    pub async fn run(&mut self) {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` completes
    ///
    /// `shutdown` is polled at most until it first completes.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let stop = AtomicBool::new(false);

        info!(
            "Engine started: {} zone(s), checking every {}s",
            self.zones.len(),
            self.interval.as_secs()
        );
        self.emit_event(EngineEvent::Started {
            zones_count: self.zones.len(),
            interval_secs: self.interval.as_secs(),
        });

        let reason = loop {
            {
                let pass = self.run_pass(&stop);
                tokio::pin!(pass);

                tokio::select! {
                    _ = &mut pass => {}
                    _ = &mut shutdown => {
                        info!("Shutdown requested, waiting for the in-flight request");
                        stop.store(true, Ordering::SeqCst);
                        pass.await;
                    }
                }
            }

            if stop.load(Ordering::SeqCst) {
                break "shutdown requested during pass";
            }

            self.transition(EngineState::Sleeping);
            debug!("Next pass in {}s", self.interval.as_secs());

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break "shutdown requested";
                }
            }

            self.transition(EngineState::Idle);
        };

        self.transition(EngineState::Stopped);
        info!("Engine stopped ({})", reason);
        self.emit_event(EngineEvent::Stopped {
            reason: reason.to_string(),
        });
    }

    /// Perform a single pass and return its report
    pub async fn run_once(&mut self) -> PassReport {
        let stop = AtomicBool::new(false);
        self.run_pass(&stop).await
    }

    /// One pass: resolve the IP, then reconcile each zone in order
    async fn run_pass(&mut self, stop: &AtomicBool) -> PassReport {
        self.transition(EngineState::ResolvingIp);

        let ip = match self.ip_source.current().await {
            Ok(ip) => ip,
            Err(e) => {
                error!(
                    "Failed to resolve external IP via {} ({}): {}",
                    self.ip_source.source_name(),
                    e.kind(),
                    e
                );
                let report = PassReport::failed(e);
                self.emit_event(EngineEvent::PassCompleted {
                    report: report.clone(),
                });
                return report;
            }
        };
        info!("External IP: {}", ip);

        let mut report = PassReport::resolved(ip);

        for zone_index in 0..self.zones.len() {
            if stop.load(Ordering::SeqCst) {
                report
                    .zones
                    .push(reconcile::skipped_zone(&self.zones[zone_index].config));
                continue;
            }

            self.transition(EngineState::Reconciling { zone_index });

            let zone = &self.zones[zone_index];
            let zone_report =
                reconcile::reconcile_until(&zone.config, self.ttl, ip, zone.client.as_ref(), stop)
                    .await;

            info!(
                "Zone {} ({}): {}",
                zone_report.zone_id,
                zone_report.domain.as_deref().unwrap_or("unknown domain"),
                zone_report.counts()
            );
            report.zones.push(zone_report);
        }

        report.interrupted = stop.load(Ordering::SeqCst);
        info!("Pass complete: {}", report.counts());

        self.emit_event(EngineEvent::PassCompleted {
            report: report.clone(),
        });
        report
    }

    fn transition(&mut self, to: EngineState) {
        if self.state == to {
            return;
        }
        let from = self.state;
        debug!("State: {} -> {}", from, to);
        self.state = to;
        self.emit_event(EngineEvent::StateChanged { from, to });
    }

    /// Emit an engine event
    ///
    /// A full channel drops the event.
    fn emit_event(&self, event: EngineEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event");
        }
    }
}

/// Resolve on SIGINT or (on Unix) SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    _ = terminate.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received SIGINT"),
        Err(e) => {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await
        }
    }
}
