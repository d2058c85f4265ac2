//! Query mode: show what the authoritative servers currently publish
//!
//! Reads the zone file once and asks each zone's nameserver for the A records
//! of its hostnames. Zones without a nameserver are skipped unless one is
//! given on the command line.

use anyhow::{Context, Result};
use ddns_core::config::{ConfigSource, FileConfigSource, ZoneConfig};
use ddns_core::name;
use ddns_rfc2136::Rfc2136Client;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// One answered (or failed) lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub owner: String,
    pub nameserver: String,
    pub addresses: std::result::Result<Vec<String>, String>,
}

/// Query every configured hostname; individual failures are kept, not raised
pub async fn run(zones_path: &Path, nameserver: Option<&str>, timeout: Duration) -> Result<Vec<Lookup>> {
    let zones = FileConfigSource::new(zones_path, None)
        .load_zones()
        .await
        .with_context(|| format!("loading {}", zones_path.display()))?;
    Ok(query_zones(&zones, nameserver, timeout).await)
}

pub async fn query_zones(zones: &[ZoneConfig], nameserver: Option<&str>, timeout: Duration) -> Vec<Lookup> {
    let client = Rfc2136Client::new();
    let mut lookups = Vec::new();

    for zone in zones {
        let server = match nameserver {
            Some(server) => server,
            None if zone.has_nameserver() => zone.nameserver.as_str(),
            None => {
                warn!(zone = %zone.zone, "No nameserver configured, skipping zone");
                continue;
            }
        };

        for hostname in &zone.hostnames {
            let owner = name::owner_name(hostname, &zone.zone);
            let addresses = match client.query(&owner, server, timeout).await {
                Ok(addresses) => {
                    info!(owner = %owner, nameserver = %server, "A {}", addresses.join(" "));
                    Ok(addresses)
                }
                Err(e) => {
                    warn!(owner = %owner, nameserver = %server, error = %e, "Query failed");
                    Err(e.to_string())
                }
            };
            lookups.push(Lookup {
                owner,
                nameserver: server.to_string(),
                addresses,
            });
        }
    }
    lookups
}
