//! Configuration types for the DDNS system
//!
//! This module defines the zone and key configuration consumed by every
//! reconciliation tick, and the engine settings fixed at startup.
//!
//! ## Zone file
//!
//! ```yaml
//! domains:
//!   - zone: example.com.
//!     nameserver: ns1.example.com
//!     hostnames: [host1, host2]
//! ```
//!
//! ## Key file
//!
//! ```yaml
//! keys:
//!   - fqdn: ddns-key.example.com.
//!     key: c2VjcmV0LXNlY3JldC1zZWNyZXQ=
//!     algorithm: hmac-sha512
//! ```

use crate::error::{Error, Result};
use crate::name;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level layout of the zone configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZonesFile {
    /// Zones to keep updated
    #[serde(default)]
    pub domains: Vec<ZoneConfig>,
}

/// One authoritative zone and the names within it to keep updated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone apex (e.g. "example.com.")
    pub zone: String,

    /// Primary nameserver accepting updates; empty disables the zone
    #[serde(default)]
    pub nameserver: String,

    /// Hostnames relative to the zone
    #[serde(default)]
    pub hostnames: Vec<String>,
}

impl ZoneConfig {
    /// Create a new zone configuration
    pub fn new(zone: impl Into<String>, nameserver: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            nameserver: nameserver.into(),
            hostnames: Vec::new(),
        }
    }

    /// Add a hostname to the zone
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostnames.push(hostname.into());
        self
    }

    /// Whether a nameserver is configured for this zone
    pub fn has_nameserver(&self) -> bool {
        !self.nameserver.trim().is_empty()
    }
}

/// HMAC algorithm used to sign update transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TsigAlgorithm {
    /// HMAC-MD5 (RFC 2845)
    #[serde(rename = "hmac-md5", alias = "hmac-md5.sig-alg.reg.int.")]
    HmacMd5,
    /// HMAC-SHA256 (RFC 4635)
    #[serde(rename = "hmac-sha256", alias = "hmac-sha256.")]
    HmacSha256,
    /// HMAC-SHA512 (RFC 4635)
    #[default]
    #[serde(rename = "hmac-sha512", alias = "hmac-sha512.")]
    HmacSha512,
}

impl TsigAlgorithm {
    /// Parse an algorithm from its configuration or wire name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim_end_matches('.').to_ascii_lowercase().as_str() {
            "hmac-md5" | "hmac-md5.sig-alg.reg.int" => Some(Self::HmacMd5),
            "hmac-sha256" => Some(Self::HmacSha256),
            "hmac-sha512" => Some(Self::HmacSha512),
            _ => None,
        }
    }
}

impl fmt::Display for TsigAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HmacMd5 => "hmac-md5",
            Self::HmacSha256 => "hmac-sha256",
            Self::HmacSha512 => "hmac-sha512",
        };
        f.write_str(name)
    }
}

/// Top-level layout of the key configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeysFile {
    /// TSIG keys
    #[serde(default)]
    pub keys: Vec<TsigKeyEntry>,
}

/// A TSIG key: name plus base64-encoded HMAC secret
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TsigKeyEntry {
    /// Key name as configured on the server
    pub fqdn: String,

    /// Base64-encoded secret
    #[serde(rename = "key")]
    pub secret: String,

    /// Signing algorithm
    #[serde(default)]
    pub algorithm: TsigAlgorithm,
}

impl TsigKeyEntry {
    /// Create a key entry with the default algorithm
    pub fn new(fqdn: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            fqdn: fqdn.into(),
            secret: secret.into(),
            algorithm: TsigAlgorithm::default(),
        }
    }

    /// Set the signing algorithm
    pub fn with_algorithm(mut self, algorithm: TsigAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

// Secrets never reach the logs
impl fmt::Debug for TsigKeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsigKeyEntry")
            .field("fqdn", &self.fqdn)
            .field("secret", &"<REDACTED>")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Key name → key mapping built from a flat list
///
/// Duplicate names are not rejected; the last entry wins.
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    keys: BTreeMap<String, TsigKeyEntry>,
}

impl KeyRing {
    /// Create an empty key ring (updates go out unsigned)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a key ring from a list of entries
    pub fn from_entries(entries: impl IntoIterator<Item = TsigKeyEntry>) -> Self {
        let mut keys = BTreeMap::new();
        for entry in entries {
            keys.insert(name::canonical(&entry.fqdn), entry);
        }
        Self { keys }
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the ring holds no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Look up a key by name
    pub fn get(&self, key_name: &str) -> Option<&TsigKeyEntry> {
        self.keys.get(&name::canonical(key_name))
    }

    /// Key names, in canonical form
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Select the single key that signs updates for `zone`
    ///
    /// Lookup order: a key named exactly like the zone, then the most
    /// specific key named inside the zone, then the only key of the ring.
    /// An empty ring selects nothing. Anything else is ambiguous.
    pub fn select(&self, zone: &str) -> Result<Option<&TsigKeyEntry>> {
        if self.keys.is_empty() {
            return Ok(None);
        }

        let zone = name::canonical(zone);
        if let Some(entry) = self.keys.get(&zone) {
            return Ok(Some(entry));
        }

        let mut inside: Vec<(&String, &TsigKeyEntry)> = self
            .keys
            .iter()
            .filter(|(key_name, _)| name::is_within(key_name, &zone))
            .collect();
        inside.sort_by_key(|(key_name, _)| std::cmp::Reverse(key_name.len()));
        match inside.as_slice() {
            [(_, only)] => return Ok(Some(*only)),
            [(first, entry), (second, _), ..] if first.len() > second.len() => {
                return Ok(Some(*entry));
            }
            [] => {}
            _ => {
                return Err(Error::tsig(format!(
                    "multiple keys match zone {}, cannot pick one",
                    zone
                )));
            }
        }

        if self.keys.len() == 1 {
            return Ok(self.keys.values().next());
        }

        Err(Error::tsig(format!(
            "no key matches zone {} among {} configured keys",
            zone,
            self.keys.len()
        )))
    }
}

/// What a reconciliation tick does after a per-update error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log, continue with the remaining names, retry on the next tick
    #[default]
    Resilient,
    /// Abort the engine on the first load or update error
    FailFast,
}

/// How several discovered IPv4 addresses map onto one hostname
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressPolicy {
    /// One replace per address in discovery order; the last address wins
    #[default]
    Each,
    /// Only the first discovered address is published
    First,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interface whose addresses are published
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Seconds between reconciliation ticks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// TTL written into every published record
    #[serde(default = "default_record_ttl")]
    pub record_ttl: u32,

    /// Timeout for a single UDP exchange, in seconds
    #[serde(default = "default_exchange_timeout_secs")]
    pub exchange_timeout_secs: u64,

    /// Error handling mode
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Multi-address handling
    #[serde(default)]
    pub address_policy: AddressPolicy,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Create a configuration for `interface` with defaults
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.interface.trim().is_empty() {
            return Err(Error::config("Interface name cannot be empty"));
        }
        if self.interval_secs == 0 {
            return Err(Error::config("Tick interval must be > 0"));
        }
        if self.exchange_timeout_secs == 0 {
            return Err(Error::config("Exchange timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Tick period
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Per-exchange timeout
    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            interval_secs: default_interval_secs(),
            record_ttl: default_record_ttl(),
            exchange_timeout_secs: default_exchange_timeout_secs(),
            failure_policy: FailurePolicy::default(),
            address_policy: AddressPolicy::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interface() -> String {
    "ppp0".to_string()
}

fn default_interval_secs() -> u64 {
    60
}

fn default_record_ttl() -> u32 {
    60
}

fn default_exchange_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Source of zone and key configuration, consulted on every tick
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Load the zones to reconcile
    async fn load_zones(&self) -> Result<Vec<ZoneConfig>>;

    /// Load the TSIG key ring
    async fn load_keys(&self) -> Result<KeyRing>;
}

/// YAML files on disk
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    zones_path: PathBuf,
    keys_path: Option<PathBuf>,
}

impl FileConfigSource {
    /// Read zones from `zones_path`; without a key file updates are unsigned
    pub fn new(zones_path: impl Into<PathBuf>, keys_path: Option<PathBuf>) -> Self {
        Self {
            zones_path: zones_path.into(),
            keys_path,
        }
    }

    async fn read(path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::config_load(format!("{}: {}", path.display(), e)))
    }
}

/// Parse a zone file
pub fn parse_zones(content: &str) -> Result<Vec<ZoneConfig>> {
    let file: ZonesFile = serde_yaml::from_str(content)
        .map_err(|e| Error::config_load(format!("zone config: {}", e)))?;
    Ok(file.domains)
}

/// Parse a key file
pub fn parse_keys(content: &str) -> Result<KeyRing> {
    let file: KeysFile = serde_yaml::from_str(content)
        .map_err(|e| Error::config_load(format!("key config: {}", e)))?;
    Ok(KeyRing::from_entries(file.keys))
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn load_zones(&self) -> Result<Vec<ZoneConfig>> {
        tracing::debug!("Reading zone config from {}", self.zones_path.display());
        let content = Self::read(&self.zones_path).await?;
        parse_zones(&content)
    }

    async fn load_keys(&self) -> Result<KeyRing> {
        let Some(path) = &self.keys_path else {
            return Ok(KeyRing::new());
        };
        tracing::debug!("Reading key config from {}", path.display());
        let content = Self::read(path).await?;
        parse_keys(&content)
    }
}
