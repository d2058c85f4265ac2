// # Update Client Trait
//
// Defines the interface for replacing a record set on an authoritative server.
//
// ## Implementations
//
// - RFC 2136 over UDP with optional TSIG: `ddns-rfc2136` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::traits::{RecordData, UpdateClient, UpdateRequest};
// use ddns_core::config::KeyRing;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* UpdateClient implementation */;
//
//     let request = UpdateRequest::new(
//         "host1",
//         "example.com.",
//         RecordData::A("203.0.113.5".parse()?),
//         300,
//         "ns1.example.com:53",
//         std::time::Duration::from_secs(10),
//     );
//     client.update(&request, &KeyRing::new()).await?;
//
//     Ok(())
// }
// ```

use crate::config::KeyRing;
use crate::error::Error;
use async_trait::async_trait;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

/// Record types this system publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// Text record
    Txt,
}

impl RecordType {
    /// RR TYPE code on the wire
    pub fn code(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Txt => 16,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
            RecordType::Txt => f.write_str("TXT"),
        }
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a" => Ok(RecordType::A),
            "txt" => Ok(RecordType::Txt),
            other => Err(Error::invalid_input(format!("unknown type: {}", other))),
        }
    }
}

/// Record payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    /// IPv4 address
    A(Ipv4Addr),
    /// Text segments, kept verbatim and in order
    Txt(Vec<String>),
}

impl RecordData {
    /// Type of the record carrying this payload
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordData::A(_) => RecordType::A,
            RecordData::Txt(_) => RecordType::Txt,
        }
    }

    /// Parse a textual payload for `record_type`
    pub fn parse(record_type: RecordType, payload: &str) -> Result<Self, Error> {
        match record_type {
            RecordType::A => payload
                .trim()
                .parse()
                .map(RecordData::A)
                .map_err(|_| Error::invalid_input(format!("not an IPv4 address: {}", payload))),
            RecordType::Txt => Ok(RecordData::Txt(vec![payload.to_string()])),
        }
    }
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordData::A(ip) => write!(f, "{}", ip),
            RecordData::Txt(segments) => {
                let quoted: Vec<String> = segments.iter().map(|s| format!("{:?}", s)).collect();
                f.write_str(&quoted.join(" "))
            }
        }
    }
}

/// One replace operation: delete the owner's RRset of this type, insert the new value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Hostname relative to the zone
    pub hostname: String,
    /// Zone apex
    pub zone: String,
    /// New value
    pub data: RecordData,
    /// TTL of the inserted record
    pub ttl: u32,
    /// Server address, `host[:port]`
    pub nameserver: String,
    /// Bound on the single UDP exchange
    pub timeout: Duration,
}

impl UpdateRequest {
    /// Create a new update request
    pub fn new(
        hostname: impl Into<String>,
        zone: impl Into<String>,
        data: RecordData,
        ttl: u32,
        nameserver: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            zone: zone.into(),
            data,
            ttl,
            nameserver: nameserver.into(),
            timeout,
        }
    }

    /// Fully-qualified owner name
    pub fn owner(&self) -> String {
        crate::name::owner_name(&self.hostname, &self.zone)
    }
}

/// A transaction the server accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Owner name that now carries the record
    pub owner: String,
    /// Type of the replaced RRset
    pub record_type: RecordType,
}

/// Trait for update client implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Exchange exactly one message with the configured nameserver
/// - ✅ Sign the message with the key the ring selects
/// - ✅ Return success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Implement retry logic (the next tick is the retry)
/// - ❌ Keep state between calls
/// - ❌ Make scheduling decisions (owned by `DdnsEngine`)
///
/// A successful return means the server acknowledged the transaction with
/// NOERROR. Any other outcome is an error: [`Error::Transport`] when no
/// response arrived, [`Error::ProtocolStatus`] when the server refused.
#[async_trait]
pub trait UpdateClient: Send + Sync {
    /// Atomically replace the owner's RRset with `request.data`
    async fn update(&self, request: &UpdateRequest, keys: &KeyRing) -> Result<UpdateOutcome, Error>;

    /// Client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}
