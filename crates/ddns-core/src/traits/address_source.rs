// # Address Source Trait
//
// Defines the interface for discovering the local addresses to publish.
//
// ## Implementations
//
// - Interface addresses over rtnetlink: `ddns-ip-iface` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::AddressSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* AddressSource implementation */;
//
//     let found = source.discover().await?;
//     println!("ipv4: {:?}, ipv6: {:?}", found.ipv4, found.ipv6);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Addresses bound to one interface, split by family
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredAddresses {
    /// IPv4 addresses in discovery order
    pub ipv4: Vec<String>,
    /// IPv6 addresses in discovery order
    pub ipv6: Vec<String>,
}

impl DiscoveredAddresses {
    /// Partition textual addresses by family
    ///
    /// The rule is syntactic: an address containing a colon is IPv6.
    /// No scope or subnet filtering is applied.
    pub fn classify<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut found = Self::default();
        for address in addresses {
            let address = address.into();
            if address.contains(':') {
                found.ipv6.push(address);
            } else {
                found.ipv4.push(address);
            }
        }
        found
    }

    /// Whether no address of either family was found
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }
}

/// Trait for address discovery implementations
///
/// # Trust Level: Semi-Trusted
///
/// Address sources perform platform I/O (interface tables, sockets) and
/// nothing else.
///
/// ## Forbidden Capabilities
/// - ❌ Perform DNS updates (use `UpdateClient`)
/// - ❌ Cache results across calls (configuration and addresses are
///   re-read on every tick)
/// - ❌ Decide which of several addresses gets published (owned by `DdnsEngine`)
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Enumerate the addresses currently bound to the interface
    ///
    /// # Returns
    ///
    /// - `Ok(DiscoveredAddresses)`: zero or more addresses per family
    /// - `Err(Error::InterfaceNotFound)`: no interface with that name exists
    async fn discover(&self) -> Result<DiscoveredAddresses, crate::Error>;

    /// Name of the interface this source reads
    fn interface(&self) -> &str;
}
