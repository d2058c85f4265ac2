//! One-shot mode: replace or delete a single record and exit
//!
//! Fields not given on the command line are asked for on stdin.

use crate::cli::UpdateArgs;
use anyhow::{Context, Result, bail};
use ddns_core::config::{KeyRing, parse_keys};
use ddns_core::traits::{RecordData, RecordType, UpdateRequest};
use ddns_rfc2136::Rfc2136Client;
use std::io::{BufRead, Write};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// A fully specified one-shot operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneShot {
    pub hostname: String,
    pub zone: String,
    pub record_type: RecordType,
    /// `None` when deleting
    pub data: Option<RecordData>,
    pub ttl: u32,
    pub nameserver: String,
}

impl OneShot {
    /// Complete `args`, prompting through `input`/`output` for what is missing
    pub fn resolve(args: UpdateArgs, input: &mut impl BufRead, output: &mut impl Write) -> Result<Self> {
        let record_type = RecordType::from(args.record_type);

        let (hostname, zone) = match &args.domain {
            Some(domain) => split_domain(domain)?,
            None => {
                let hostname = match args.hostname {
                    Some(hostname) if !hostname.trim().is_empty() => hostname,
                    _ => prompt("hostname", input, output)?,
                };
                let zone = match args.zone {
                    Some(zone) if !zone.trim().is_empty() => zone,
                    _ => prompt("zone", input, output)?,
                };
                (hostname, zone)
            }
        };

        let data = if args.delete {
            None
        } else {
            let payload = match args.payload {
                Some(payload) => payload,
                None => prompt("payload", input, output)?,
            };
            Some(RecordData::parse(record_type, &payload)?)
        };

        let nameserver = match args.nameserver {
            Some(nameserver) if !nameserver.trim().is_empty() => nameserver,
            _ => prompt("nameserver", input, output)?,
        };

        Ok(Self {
            hostname,
            zone,
            record_type,
            data,
            ttl: args.ttl,
            nameserver,
        })
    }
}

/// Split `host1.example.com` into (`host1`, `example.com`)
///
/// The zone is the last two labels; everything before them is the hostname.
pub fn split_domain(domain: &str) -> Result<(String, String)> {
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = domain.split('.').collect();
    let valid = labels.len() >= 3
        && labels.iter().all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });
    if !valid {
        bail!("invalid domain: {}", domain);
    }

    let split = labels.len() - 2;
    Ok((labels[..split].join("."), labels[split..].join(".")))
}

/// Ask for `name` and read one trimmed line
pub fn prompt(name: &str, input: &mut impl BufRead, output: &mut impl Write) -> Result<String> {
    write!(output, "{} ?\n> ", name)?;
    output.flush()?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .with_context(|| format!("reading {}", name))?;
    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("no value given for {}", name);
    }
    Ok(value)
}

/// Load the key ring, or an empty one without a key file
pub async fn load_keys(path: Option<&Path>) -> Result<KeyRing> {
    let Some(path) = path else {
        return Ok(KeyRing::new());
    };
    info!("Loading keys from {}", path.display());
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading key file {}", path.display()))?;
    Ok(parse_keys(&content)?)
}

/// Send the operation to its nameserver
pub async fn execute(oneshot: &OneShot, keys: &KeyRing, timeout: Duration) -> Result<()> {
    let client = Rfc2136Client::new();
    info!(
        hostname = %oneshot.hostname,
        zone = %oneshot.zone,
        record_type = %oneshot.record_type,
        ttl = oneshot.ttl,
        nameserver = %oneshot.nameserver,
        "One-shot update"
    );

    match &oneshot.data {
        Some(data) => {
            let request = UpdateRequest::new(
                oneshot.hostname.clone(),
                oneshot.zone.clone(),
                data.clone(),
                oneshot.ttl,
                oneshot.nameserver.clone(),
                timeout,
            );
            let outcome = client.update(&request, keys).await?;
            info!("{} updated to {}", outcome.owner, data);
        }
        None => {
            let outcome = client
                .delete_only(
                    &oneshot.hostname,
                    &oneshot.zone,
                    oneshot.record_type,
                    &oneshot.nameserver,
                    timeout,
                    keys,
                )
                .await?;
            info!("{} {} records deleted", outcome.owner, outcome.record_type);
        }
    }
    Ok(())
}
