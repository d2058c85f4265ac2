//! Test doubles and common utilities for engine contract tests
//!
//! This module provides minimal test doubles that record how the engine
//! drives its collaborators without touching the network.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_core::config::{ConfigSource, EngineConfig, KeyRing, ZoneConfig};
use ddns_core::error::{Error, Result};
use ddns_core::traits::{
    AddressSource, DiscoveredAddresses, RecordData, UpdateClient, UpdateOutcome, UpdateRequest,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An address source returning a fixed set, optionally after a delay
pub struct StaticAddressSource {
    interface: String,
    addresses: Vec<String>,
    delay: Option<Duration>,
    missing: bool,
    discover_call_count: Arc<AtomicUsize>,
}

impl StaticAddressSource {
    pub fn new(addresses: &[&str]) -> Self {
        Self {
            interface: "ppp0".to_string(),
            addresses: addresses.iter().map(|s| s.to_string()).collect(),
            delay: None,
            missing: false,
            discover_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep before answering, keeping the tick in flight
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Behave as if the interface does not exist
    pub fn missing(mut self) -> Self {
        self.missing = true;
        self
    }

    pub fn discover_call_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.discover_call_count)
    }
}

#[async_trait]
impl AddressSource for StaticAddressSource {
    async fn discover(&self) -> Result<DiscoveredAddresses> {
        self.discover_call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.missing {
            return Err(Error::interface_not_found(self.interface.clone()));
        }
        Ok(DiscoveredAddresses::classify(self.addresses.clone()))
    }

    fn interface(&self) -> &str {
        &self.interface
    }
}

/// A recorded update call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpdate {
    pub owner: String,
    pub address: String,
    pub nameserver: String,
    pub ttl: u32,
    pub timeout: Duration,
    pub signed_with: Option<String>,
}

/// An update client that records calls and fails on demand
#[derive(Clone, Default)]
pub struct MockUpdateClient {
    calls: Arc<Mutex<Vec<RecordedUpdate>>>,
    failing_owners: Arc<Mutex<HashSet<String>>>,
    /// Current value per owner, as a server applying replace semantics would hold it
    published: Arc<Mutex<std::collections::HashMap<String, String>>>,
}

impl MockUpdateClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every update of `owner` fail with a NOTAUTH status
    pub fn fail_owner(&self, owner: &str) {
        self.failing_owners.lock().unwrap().insert(owner.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedUpdate> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn published(&self, owner: &str) -> Option<String> {
        self.published.lock().unwrap().get(owner).cloned()
    }
}

#[async_trait]
impl UpdateClient for MockUpdateClient {
    async fn update(&self, request: &UpdateRequest, keys: &KeyRing) -> Result<UpdateOutcome> {
        let owner = request.owner();
        let address = match &request.data {
            RecordData::A(ip) => ip.to_string(),
            other => other.to_string(),
        };
        let signed_with = keys.select(&request.zone)?.map(|k| k.fqdn.clone());

        self.calls.lock().unwrap().push(RecordedUpdate {
            owner: owner.clone(),
            address: address.clone(),
            nameserver: request.nameserver.clone(),
            ttl: request.ttl,
            timeout: request.timeout,
            signed_with,
        });

        if self.failing_owners.lock().unwrap().contains(&owner) {
            return Err(Error::protocol_status(9));
        }

        self.published.lock().unwrap().insert(owner.clone(), address);
        Ok(UpdateOutcome {
            owner,
            record_type: request.data.record_type(),
        })
    }

    fn client_name(&self) -> &'static str {
        "mock"
    }
}

/// A config source serving in-memory zones and keys
#[derive(Clone, Default)]
pub struct StaticConfigSource {
    zones: Arc<Mutex<Vec<ZoneConfig>>>,
    keys: Arc<Mutex<KeyRing>>,
    broken: Arc<Mutex<bool>>,
    load_call_count: Arc<AtomicUsize>,
}

impl StaticConfigSource {
    pub fn new(zones: Vec<ZoneConfig>) -> Self {
        Self {
            zones: Arc::new(Mutex::new(zones)),
            ..Self::default()
        }
    }

    pub fn with_keys(self, keys: KeyRing) -> Self {
        *self.keys.lock().unwrap() = keys;
        self
    }

    /// Replace the zone list, as an operator editing the file would
    pub fn set_zones(&self, zones: Vec<ZoneConfig>) {
        *self.zones.lock().unwrap() = zones;
    }

    /// Make every load fail as if the file were malformed
    pub fn set_broken(&self, broken: bool) {
        *self.broken.lock().unwrap() = broken;
    }

    pub fn load_call_count(&self) -> usize {
        self.load_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn load_zones(&self) -> Result<Vec<ZoneConfig>> {
        self.load_call_count.fetch_add(1, Ordering::SeqCst);
        if *self.broken.lock().unwrap() {
            return Err(Error::config_load("zone config: mapping values are not allowed"));
        }
        Ok(self.zones.lock().unwrap().clone())
    }

    async fn load_keys(&self) -> Result<KeyRing> {
        Ok(self.keys.lock().unwrap().clone())
    }
}

/// A one-zone configuration with the given hostnames
pub fn zone(name: &str, nameserver: &str, hostnames: &[&str]) -> ZoneConfig {
    let mut zone = ZoneConfig::new(name, nameserver);
    for hostname in hostnames {
        zone = zone.with_hostname(*hostname);
    }
    zone
}

/// Engine configuration tuned for tests
pub fn test_config() -> EngineConfig {
    EngineConfig {
        interface: "ppp0".to_string(),
        interval_secs: 1,
        record_ttl: 60,
        exchange_timeout_secs: 2,
        event_channel_capacity: 100,
        ..EngineConfig::default()
    }
}

/// Drain all events currently buffered in the receiver
pub fn drain_events(
    rx: &mut tokio::sync::mpsc::Receiver<ddns_core::EngineEvent>,
) -> Vec<ddns_core::EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
