// # RFC 2136 Update Client
//
// Sends UPDATE and query messages to an authoritative nameserver over UDP.
//
// ## Exchange
//
// Exactly one request datagram per operation, no retries. The wait for the
// matching response is bounded by the caller's timeout; datagrams carrying a
// different message ID are discarded inside that bound.
//
// ## Signing
//
// The key is picked from the key ring by zone (see `KeyRing::select`). When a
// signed response comes back its TSIG is verified against the request MAC.
// An unsigned response to a signed request is accepted with a warning, since
// servers answer unsigned when they reject the key itself.

use crate::signer::TsigKey;
use crate::transaction::{
    ResourceRecordSet, TsigDescriptor, UpdateTransaction, domain_name, wire_error,
};
use async_trait::async_trait;
use ddns_core::config::KeyRing;
use ddns_core::name;
use ddns_core::traits::{RecordData, RecordType, UpdateClient, UpdateOutcome, UpdateRequest};
use ddns_core::{Error, Result};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{self, DNSClass, RData};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Default DNS port
pub const DEFAULT_PORT: u16 = 53;

const MAX_DATAGRAM: usize = 65_535;

/// RFC 2136 dynamic update client
///
/// Stateless: every call resolves the nameserver, opens its own socket and
/// closes it when done.
#[derive(Debug, Clone, Default)]
pub struct Rfc2136Client;

impl Rfc2136Client {
    pub fn new() -> Self {
        Self
    }

    /// Replace the owner's RRset of the payload's type with the single new value
    pub async fn update(&self, request: &UpdateRequest, keys: &KeyRing) -> Result<UpdateOutcome> {
        let owner = request.owner();
        let tx = UpdateTransaction::replace(&request.zone, &owner, request.ttl, request.data.clone());
        let tx = sign_for_zone(tx, keys)?;

        info!(
            owner = %owner,
            value = %request.data,
            nameserver = %request.nameserver,
            "Updating {} record",
            request.data.record_type()
        );
        self.send_update(&tx, &request.nameserver, request.timeout)
            .await?;

        Ok(UpdateOutcome {
            owner,
            record_type: request.data.record_type(),
        })
    }

    /// Replace the owner's TXT RRset with one record holding `segments` in order
    #[allow(clippy::too_many_arguments)]
    pub async fn update_txt(
        &self,
        hostname: &str,
        zone: &str,
        segments: Vec<String>,
        ttl: u32,
        nameserver: &str,
        timeout: Duration,
        keys: &KeyRing,
    ) -> Result<UpdateOutcome> {
        let request = UpdateRequest::new(
            hostname,
            zone,
            RecordData::Txt(segments),
            ttl,
            nameserver,
            timeout,
        );
        self.update(&request, keys).await
    }

    /// Remove the owner's RRset of `record_type` without inserting anything
    pub async fn delete_only(
        &self,
        hostname: &str,
        zone: &str,
        record_type: RecordType,
        nameserver: &str,
        timeout: Duration,
        keys: &KeyRing,
    ) -> Result<UpdateOutcome> {
        let owner = name::owner_name(hostname, zone);
        let tx = UpdateTransaction::new(zone)
            .delete(ResourceRecordSet::delete_all(&owner, record_type));
        let tx = sign_for_zone(tx, keys)?;

        info!(owner = %owner, nameserver = %nameserver, "Deleting {} records", record_type);
        self.send_update(&tx, nameserver, timeout).await?;

        Ok(UpdateOutcome { owner, record_type })
    }

    /// Current IPv4 addresses of `fqdn`, in answer order
    ///
    /// A successful response without A answers yields an empty list.
    pub async fn query(&self, fqdn: &str, nameserver: &str, timeout: Duration) -> Result<Vec<String>> {
        let id = rand::random::<u16>();
        let mut request = Message::new();
        request
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(false);
        request.add_query(Query::query(domain_name(&name::fqdn(fqdn))?, rr::RecordType::A));
        let request = request.to_vec().map_err(wire_error)?;

        let response = exchange(&request, id, nameserver, timeout).await?;
        let message = Message::from_vec(&response).map_err(wire_error)?;
        check_status(&message)?;

        Ok(message
            .answers()
            .iter()
            .filter(|record| record.dns_class() == DNSClass::IN)
            .filter_map(|record| match record.data() {
                Some(RData::A(a)) => Some(a.0.to_string()),
                _ => None,
            })
            .collect())
    }

    async fn send_update(
        &self,
        tx: &UpdateTransaction,
        nameserver: &str,
        timeout: Duration,
    ) -> Result<()> {
        let id = rand::random::<u16>();
        let encoded = tx.encode(id)?;
        debug!(
            id,
            zone = %tx.zone(),
            deletions = tx.deletions().len(),
            insertions = tx.insertions().len(),
            signed = encoded.mac.is_some(),
            "Sending UPDATE"
        );

        let response = exchange(&encoded.bytes, id, nameserver, timeout).await?;
        let message = Message::from_vec(&response).map_err(wire_error)?;

        if let Err(err) = check_status(&message) {
            for record in message.signature() {
                warn!(key = %record.name(), tsig = %record, "Rejected response carries a TSIG");
            }
            return Err(err);
        }

        if let (Some(signature), Some(request_mac)) = (tx.signature(), encoded.mac.as_deref()) {
            verify_response(&signature.key, &response, &message, request_mac)?;
        }
        Ok(())
    }
}

#[async_trait]
impl UpdateClient for Rfc2136Client {
    async fn update(&self, request: &UpdateRequest, keys: &KeyRing) -> Result<UpdateOutcome> {
        Rfc2136Client::update(self, request, keys).await
    }

    fn client_name(&self) -> &'static str {
        "rfc2136"
    }
}

fn sign_for_zone(tx: UpdateTransaction, keys: &KeyRing) -> Result<UpdateTransaction> {
    match keys.select(tx.zone())? {
        Some(entry) => {
            let key = TsigKey::from_entry(entry)?;
            let now = chrono::Utc::now().timestamp().max(0) as u64;
            debug!(key = %key.name(), zone = %tx.zone(), "Signing transaction");
            Ok(tx.signed(TsigDescriptor::new(key, now)))
        }
        None => {
            debug!(zone = %tx.zone(), "No key configured, sending unsigned");
            Ok(tx)
        }
    }
}

fn verify_response(key: &TsigKey, response: &[u8], message: &Message, request_mac: &[u8]) -> Result<()> {
    if message.signature().is_empty() {
        warn!(key = %key.name(), "Response to a signed update carries no TSIG");
        return Ok(());
    }
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    key.verify(response, Some(request_mac), now)?;
    debug!(key = %key.name(), "Response signature verified");
    Ok(())
}

/// Map a non-success response code to a protocol status error
fn check_status(message: &Message) -> Result<()> {
    if message.message_type() != MessageType::Response {
        return Err(Error::wire("reply is not a response"));
    }
    match u16::from(message.response_code()) {
        0 => Ok(()),
        rcode => Err(Error::protocol_status(rcode)),
    }
}

/// Resolve `ip`, `ip:port`, `host` or `host:port`; the port defaults to 53
pub async fn resolve_nameserver(nameserver: &str) -> Result<SocketAddr> {
    let target = nameserver.trim();
    if target.is_empty() {
        return Err(Error::invalid_input("empty nameserver"));
    }
    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = target.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    let host_port = match target.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => target.to_string(),
        _ => format!("{}:{}", target, DEFAULT_PORT),
    };
    tokio::net::lookup_host(&host_port)
        .await
        .map_err(|e| Error::transport(nameserver, format!("cannot resolve: {}", e)))?
        .next()
        .ok_or_else(|| Error::transport(nameserver, "resolved to no addresses"))
}

/// Send `request` once and wait for the response carrying `id`
async fn exchange(request: &[u8], id: u16, nameserver: &str, timeout: Duration) -> Result<Vec<u8>> {
    let addr = resolve_nameserver(nameserver).await?;
    let bind: SocketAddr = if addr.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let io_err = |e: std::io::Error| Error::transport(nameserver, e.to_string());

    let socket = UdpSocket::bind(bind).await.map_err(io_err)?;
    socket.connect(addr).await.map_err(io_err)?;

    let exchange = async {
        socket.send(request).await?;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let len = socket.recv(&mut buf).await?;
            if len >= 2 && u16::from_be_bytes([buf[0], buf[1]]) == id {
                buf.truncate(len);
                return Ok::<_, std::io::Error>(buf);
            }
            debug!(%addr, "Discarding datagram with unexpected message ID");
        }
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result.map_err(io_err),
        Err(_) => Err(Error::transport(
            nameserver,
            format!("no response within {:?}", timeout),
        )),
    }
}
