//! Test doubles and common utilities for contract tests
//!
//! The doubles share their state through `Arc`s so a test can keep a handle
//! after the engine has taken ownership of the boxed trait object.

#![allow(dead_code)]

use cfddns_core::config::{GlobalConfig, SubdomainConfig, ZoneConfig};
use cfddns_core::error::{Error, Result};
use cfddns_core::traits::{DnsRecord, DnsRecordClient, DnsRecordClientFactory, IpSource, RecordType};
use cfddns_core::EngineEvent;
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// An IpSource that replays a script of results
///
/// Once the script runs out, the last entry is repeated.
#[derive(Clone)]
pub struct ScriptedIpSource {
    script: Arc<Mutex<VecDeque<Result<Ipv4Addr>>>>,
    last: Arc<Mutex<Option<Result<Ipv4Addr>>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedIpSource {
    pub fn new(script: Vec<Result<Ipv4Addr>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            last: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always resolve to `ip`
    pub fn fixed(ip: Ipv4Addr) -> Self {
        Self::new(vec![Ok(ip)])
    }

    /// Number of times current() was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpSource for ScriptedIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(result) = next {
            *last = Some(result);
        }
        last.clone()
            .unwrap_or_else(|| Err(Error::network("script is empty")))
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// An update() call observed by [`MockDnsClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCall {
    pub record_id: String,
    pub content: Ipv4Addr,
    pub ttl: u32,
    pub proxied: bool,
}

#[derive(Default)]
struct MockState {
    records: Vec<DnsRecord>,
    zone_name_error: Option<Error>,
    list_error: Option<Error>,
    update_errors: HashMap<String, Error>,
    update_delay: Option<Duration>,
    updates: Vec<UpdateCall>,
    zone_name_calls: usize,
    list_calls: usize,
}

/// An in-memory DnsRecordClient for one zone
#[derive(Clone)]
pub struct MockDnsClient {
    zone_id: String,
    domain: String,
    state: Arc<Mutex<MockState>>,
}

impl MockDnsClient {
    pub fn new(zone_id: &str, domain: &str) -> Self {
        Self {
            zone_id: zone_id.to_string(),
            domain: domain.to_string(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Add an A record
    pub fn with_a_record(self, id: &str, name: &str, content: &str) -> Self {
        self.state.lock().unwrap().records.push(DnsRecord {
            id: id.to_string(),
            record_type: "A".to_string(),
            name: name.to_string(),
            content: content.to_string(),
            ttl: 300,
            proxied: false,
        });
        self
    }

    /// Make zone_name() fail
    pub fn failing_zone_name(self, error: Error) -> Self {
        self.state.lock().unwrap().zone_name_error = Some(error);
        self
    }

    /// Make list() fail
    pub fn failing_list(self, error: Error) -> Self {
        self.state.lock().unwrap().list_error = Some(error);
        self
    }

    /// Make update() fail for one record
    pub fn failing_update(self, record_id: &str, error: Error) -> Self {
        self.state
            .lock()
            .unwrap()
            .update_errors
            .insert(record_id.to_string(), error);
        self
    }

    /// Delay every update() by `delay`
    pub fn with_update_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().update_delay = Some(delay);
        self
    }

    pub fn updates(&self) -> Vec<UpdateCall> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn zone_name_calls(&self) -> usize {
        self.state.lock().unwrap().zone_name_calls
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    /// Current content of a record
    pub fn content_of(&self, record_id: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|r| r.id == record_id)
            .map(|r| r.content.clone())
    }
}

#[async_trait::async_trait]
impl DnsRecordClient for MockDnsClient {
    fn zone_id(&self) -> &str {
        &self.zone_id
    }

    async fn zone_name(&self) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.zone_name_calls += 1;
        match &state.zone_name_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.domain.clone()),
        }
    }

    async fn list(&self, record_type: RecordType) -> Result<Vec<DnsRecord>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if let Some(e) = &state.list_error {
            return Err(e.clone());
        }
        Ok(state
            .records
            .iter()
            .filter(|r| r.is_type(record_type))
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        record_id: &str,
        content: Ipv4Addr,
        ttl: u32,
        proxied: bool,
    ) -> Result<DnsRecord> {
        let delay = self.state.lock().unwrap().update_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.updates.push(UpdateCall {
            record_id: record_id.to_string(),
            content,
            ttl,
            proxied,
        });

        if let Some(e) = state.update_errors.get(record_id) {
            return Err(e.clone());
        }

        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| Error::not_found(format!("record {}", record_id)))?;
        record.content = content.to_string();
        record.ttl = ttl;
        record.proxied = proxied;
        Ok(record.clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Hands out pre-built [`MockDnsClient`]s by zone id
#[derive(Default)]
pub struct MockFactory {
    clients: HashMap<String, MockDnsClient>,
    created: AtomicUsize,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: MockDnsClient) -> Self {
        self.clients.insert(client.zone_id.clone(), client);
        self
    }

    /// Number of clients created
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl DnsRecordClientFactory for MockFactory {
    fn create(&self, zone: &ZoneConfig) -> Result<Box<dyn DnsRecordClient>> {
        let client = self
            .clients
            .get(&zone.zone_id)
            .cloned()
            .ok_or_else(|| Error::config(format!("no mock client for zone {}", zone.zone_id)))?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(client))
    }
}

/// A zone with non-proxied subdomains
pub fn zone(zone_id: &str, subdomains: &[&str]) -> ZoneConfig {
    ZoneConfig::new(
        zone_id,
        "test-token",
        subdomains.iter().map(|s| SubdomainConfig::new(*s)).collect(),
    )
}

/// Configuration with the given zones, ttl 300 and a one hour interval
pub fn config(zones: Vec<ZoneConfig>) -> GlobalConfig {
    GlobalConfig::new(zones)
        .with_ttl(300)
        .with_check_interval_secs(3600)
}

/// Collect every event currently queued
pub fn drain(events: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
