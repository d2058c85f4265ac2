//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the workspace.
//!
//! Errors fall into two scopes:
//! - **Tick-fatal**: configuration could not be loaded or the interface is
//!   missing. Nothing in the current tick can be attempted safely.
//! - **Per-call**: transport failures, non-success response codes, TSIG and
//!   input problems. These only affect the hostname/address pair that
//!   triggered them.

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Zone or key configuration unreadable or malformed
    #[error("Configuration load error: {0}")]
    ConfigLoad(String),

    /// Engine configuration rejected by validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// The named network interface does not exist on this host
    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    /// Interface table could not be read
    #[error("Address discovery error: {0}")]
    AddressDiscovery(String),

    /// Timeout, unreachable server, refused connection
    #[error("Transport error ({nameserver}): {message}")]
    Transport {
        /// Nameserver the exchange was addressed to
        nameserver: String,
        /// Failure description
        message: String,
    },

    /// The server answered with a non-success response code
    #[error("Rcode: {rcode} ({name})")]
    ProtocolStatus {
        /// Response code from the reply header
        rcode: u16,
        /// Mnemonic for the code, e.g. `NOTAUTH`
        name: &'static str,
    },

    /// Key decoding, key selection or response signature failure
    #[error("TSIG error: {0}")]
    Tsig(String),

    /// Malformed DNS message on the wire
    #[error("Wire format error: {0}")]
    Wire(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a configuration load error
    pub fn config_load(msg: impl Into<String>) -> Self {
        Self::ConfigLoad(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an interface-not-found error
    pub fn interface_not_found(name: impl Into<String>) -> Self {
        Self::InterfaceNotFound(name.into())
    }

    /// Create an address discovery error
    pub fn address_discovery(msg: impl Into<String>) -> Self {
        Self::AddressDiscovery(msg.into())
    }

    /// Create a transport error
    pub fn transport(nameserver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            nameserver: nameserver.into(),
            message: message.into(),
        }
    }

    /// Create a protocol status error from a numeric response code
    pub fn protocol_status(rcode: u16) -> Self {
        Self::ProtocolStatus {
            rcode,
            name: rcode_name(rcode),
        }
    }

    /// Create a TSIG error
    pub fn tsig(msg: impl Into<String>) -> Self {
        Self::Tsig(msg.into())
    }

    /// Create a wire format error
    pub fn wire(msg: impl Into<String>) -> Self {
        Self::Wire(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error must abort the remainder of a reconciliation tick
    pub fn is_fatal_to_tick(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad(_)
                | Self::Config(_)
                | Self::InterfaceNotFound(_)
                | Self::AddressDiscovery(_)
        )
    }

    /// Numeric response code carried by a [`Error::ProtocolStatus`]
    pub fn rcode(&self) -> Option<u16> {
        match self {
            Self::ProtocolStatus { rcode, .. } => Some(*rcode),
            _ => None,
        }
    }
}

/// Mnemonic for a DNS response code (RFC 1035, RFC 2136, RFC 2845)
pub fn rcode_name(rcode: u16) -> &'static str {
    match rcode {
        0 => "NOERROR",
        1 => "FORMERR",
        2 => "SERVFAIL",
        3 => "NXDOMAIN",
        4 => "NOTIMP",
        5 => "REFUSED",
        6 => "YXDOMAIN",
        7 => "YXRRSET",
        8 => "NXRRSET",
        9 => "NOTAUTH",
        10 => "NOTZONE",
        16 => "BADSIG",
        17 => "BADKEY",
        18 => "BADTIME",
        _ => "UNKNOWN",
    }
}
