//! Command-line arguments
//!
//! Every daemon flag can also come from a `DDNS_*` environment variable.

use clap::{Args, Parser, Subcommand, ValueEnum};
use ddns_core::config::{AddressPolicy, EngineConfig, FailurePolicy};
use ddns_core::traits::RecordType;
use std::path::PathBuf;
use tracing::Level;

/// Keep DNS names pointed at the addresses of a local interface
///
/// Without a subcommand, runs periodically: every interval it reads the
/// interface addresses, reloads the zone and key files, and replaces the A
/// record of every configured hostname.
#[derive(Parser, Debug)]
#[command(name = "ddnsd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Interface whose IPv4 addresses are published
    #[arg(long, env = "DDNS_IFACE", default_value = "ppp0")]
    pub iface: String,

    /// Zone configuration file
    #[arg(long, env = "DDNS_CONFIG", default_value = "domains.yaml", global = true)]
    pub config: PathBuf,

    /// TSIG key file; updates are unsigned without one
    #[arg(long, env = "DDNS_TSIG", global = true)]
    pub tsig: Option<PathBuf>,

    /// Seconds to wait for each server response
    #[arg(long, env = "DDNS_TIMEOUT", default_value_t = 10, global = true)]
    pub timeout: u64,

    /// Seconds between reconciliation ticks
    #[arg(long, env = "DDNS_INTERVAL", default_value_t = 60)]
    pub interval: u64,

    /// TTL of the published records
    #[arg(long, env = "DDNS_RECORD_TTL", default_value_t = 60)]
    pub record_ttl: u32,

    /// Exit on the first configuration or update error
    #[arg(long, env = "DDNS_FAIL_FAST")]
    pub fail_fast: bool,

    /// Which discovered addresses to publish
    #[arg(long, env = "DDNS_ADDRESS_POLICY", value_enum, default_value_t = AddressPolicyArg::Each)]
    pub address_policy: AddressPolicyArg,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, env = "DDNS_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: Level,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replace (or delete) one record and exit
    Update(UpdateArgs),
    /// Print the A records of every configured hostname and exit
    Query(QueryArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Ask this server instead of each zone's configured nameserver
    #[arg(long)]
    pub nameserver: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct UpdateArgs {
    /// Whole name, split into hostname and a two-label zone
    #[arg(long, conflicts_with_all = ["hostname", "zone"])]
    pub domain: Option<String>,

    /// Hostname relative to the zone
    #[arg(long)]
    pub hostname: Option<String>,

    /// Zone apex
    #[arg(long)]
    pub zone: Option<String>,

    /// Record type
    #[arg(long = "type", value_enum, ignore_case = true, default_value_t = RecordTypeArg::A)]
    pub record_type: RecordTypeArg,

    /// New record value
    #[arg(long)]
    pub payload: Option<String>,

    /// TTL of the new record
    #[arg(long, default_value_t = 300)]
    pub ttl: u32,

    /// Authoritative server, host[:port]
    #[arg(long)]
    pub nameserver: Option<String>,

    /// Remove the record set instead of replacing it
    #[arg(long)]
    pub delete: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPolicyArg {
    /// Every address in turn; the last one stays published
    Each,
    /// Only the first address
    First,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordTypeArg {
    /// IPv4 address
    #[default]
    A,
    /// Text, one segment per payload
    Txt,
}

impl From<RecordTypeArg> for RecordType {
    fn from(arg: RecordTypeArg) -> Self {
        match arg {
            RecordTypeArg::A => RecordType::A,
            RecordTypeArg::Txt => RecordType::Txt,
        }
    }
}

impl From<AddressPolicyArg> for AddressPolicy {
    fn from(arg: AddressPolicyArg) -> Self {
        match arg {
            AddressPolicyArg::Each => AddressPolicy::Each,
            AddressPolicyArg::First => AddressPolicy::First,
        }
    }
}

impl Cli {
    /// Engine settings for periodic mode
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            interface: self.iface.clone(),
            interval_secs: self.interval,
            record_ttl: self.record_ttl,
            exchange_timeout_secs: self.timeout,
            failure_policy: if self.fail_fast {
                FailurePolicy::FailFast
            } else {
                FailurePolicy::Resilient
            },
            address_policy: self.address_policy.into(),
            ..EngineConfig::default()
        }
    }
}
