// # ddns-rfc2136
//
// RFC 2136 dynamic update client for the DDNS system.
//
// ## Operations
//
// - `update`: replace an owner's A or TXT RRset with one record
// - `update_txt`: replace an owner's TXT RRset with one multi-segment record
// - `delete_only`: remove an owner's RRset of one type
// - `query`: read an owner's A records
//
// Messages are built and parsed with hickory-proto. Transactions are signed
// with TSIG (RFC 2845) when the key ring holds a key for the zone.
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::config::KeyRing;
// use ddns_rfc2136::Rfc2136Client;
// use std::time::Duration;
//
// let client = Rfc2136Client::new();
// let ips = client
//     .query("host1.example.com.", "ns1.example.com", Duration::from_secs(10))
//     .await?;
// ```

pub mod client;
pub mod signer;
pub mod transaction;

pub use client::{Rfc2136Client, resolve_nameserver};
pub use transaction::{ResourceRecordSet, TsigDescriptor, UpdateTransaction};
pub use signer::TsigKey;
