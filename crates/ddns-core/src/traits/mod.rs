//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces the engine is written against.
//!
//! - [`AddressSource`]: Discover the addresses bound to the published interface
//! - [`UpdateClient`]: Replace a record set on the authoritative server

pub mod address_source;
pub mod update_client;

pub use address_source::{AddressSource, DiscoveredAddresses};
pub use update_client::{RecordData, RecordType, UpdateClient, UpdateOutcome, UpdateRequest};
