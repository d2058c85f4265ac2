//! A scripted authoritative server for exchange tests
//!
//! Listens on a loopback UDP port, applies UPDATE messages to an in-memory
//! zone and answers A queries from it. Behaviour switches let tests make it
//! demand signatures, stay silent, refuse, or spoil its own response MAC.
//!
//! Signatures are checked with hickory's own digest and HMAC routines, never
//! with the client's `TsigKey`.

#![allow(dead_code)]

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use ddns_core::config::{KeyRing, TsigAlgorithm, TsigKeyEntry};
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode, UpdateMessage};
use hickory_proto::rr::dnssec::rdata::tsig::{
    TSIG, TsigAlgorithm as WireAlgorithm, make_tsig_record, message_tbs, signed_bitmessage_to_buf,
};
use hickory_proto::rr::dnssec::rdata::DNSSECRData;
use hickory_proto::rr::dnssec::tsig::TSigner;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use hmac::{Hmac, Mac};
use md5::Md5;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub const ZONE: &str = "example.com.";
pub const KEY_NAME: &str = "ddns-key.example.com.";
/// base64 of "0123456789abcdef0123456789abcdef"
pub const KEY_SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

pub const TIMEOUT: Duration = Duration::from_secs(2);

type RrsetKey = (String, u16);
type Zone = Mutex<BTreeMap<RrsetKey, Vec<(u32, RData)>>>;

/// The server's copy of a shared TSIG key
#[derive(Clone)]
pub struct ServerKey {
    name: Name,
    algorithm: WireAlgorithm,
    secret: Vec<u8>,
}

impl ServerKey {
    pub fn new(name: &str, algorithm: WireAlgorithm, secret_b64: &str) -> Self {
        Self {
            name: Name::from_ascii(name).expect("key name"),
            algorithm,
            secret: BASE64.decode(secret_b64).expect("base64 secret"),
        }
    }

    fn mac(&self, data: &[u8]) -> Vec<u8> {
        match self.algorithm {
            WireAlgorithm::HmacMd5 => {
                let mut mac = Hmac::<Md5>::new_from_slice(&self.secret).expect("hmac key");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            ref sha2 => TSigner::new(self.secret.clone(), sha2.clone(), self.name.clone(), 300)
                .expect("supported algorithm")
                .sign(data)
                .expect("mac"),
        }
    }

    /// Request MAC when the request is signed by this key within its fudge
    fn verify_request(&self, request: &[u8]) -> Option<Vec<u8>> {
        let (tbv, record) = signed_bitmessage_to_buf(None, request, true).ok()?;
        let Some(RData::DNSSEC(DNSSECRData::TSIG(tsig))) = record.data() else {
            return None;
        };
        if record.name() != &self.name || tsig.algorithm().to_name() != self.algorithm.to_name() {
            return None;
        }
        if self.mac(&tbv) != tsig.mac() || now().abs_diff(tsig.time()) > u64::from(tsig.fudge()) {
            return None;
        }
        Some(tsig.mac().to_vec())
    }

    fn sign_response(&self, response: &mut Message, request_mac: &[u8], corrupt: bool) {
        let pre_tsig = TSIG::new(
            self.algorithm.clone(),
            now(),
            300,
            Vec::new(),
            response.id(),
            0,
            Vec::new(),
        );
        let tbs = message_tbs(Some(request_mac), &*response, &pre_tsig, &self.name).expect("tbs");
        let mut mac = self.mac(&tbs);
        if corrupt {
            let last = mac.len() - 1;
            mac[last] ^= 0x01;
        }
        response.add_tsig(make_tsig_record(self.name.clone(), pre_tsig.set_mac(mac)));
    }
}

#[derive(Default)]
struct Behaviour {
    required_key: Mutex<Option<ServerKey>>,
    silent: AtomicBool,
    forced_rcode: AtomicU16,
    corrupt_response_mac: AtomicBool,
    send_decoy: AtomicBool,
}

/// In-memory authoritative server for [`ZONE`]
pub struct FakeAuthority {
    addr: SocketAddr,
    records: Arc<Zone>,
    received: Arc<Mutex<Vec<Message>>>,
    behaviour: Arc<Behaviour>,
    handle: JoinHandle<()>,
}

impl FakeAuthority {
    pub async fn start() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind loopback");
        let addr = socket.local_addr().expect("local addr");
        let records = Arc::new(Mutex::new(BTreeMap::new()));
        let received = Arc::new(Mutex::new(Vec::new()));
        let behaviour = Arc::new(Behaviour::default());

        let handle = tokio::spawn(serve(
            socket,
            Arc::clone(&records),
            Arc::clone(&received),
            Arc::clone(&behaviour),
        ));

        Self {
            addr,
            records,
            received,
            behaviour,
            handle,
        }
    }

    /// `ip:port` form accepted by the client
    pub fn nameserver(&self) -> String {
        self.addr.to_string()
    }

    /// Reject unsigned or badly signed updates with NOTAUTH
    pub fn require_key(&self, key: ServerKey) {
        *self.behaviour.required_key.lock().unwrap() = Some(key);
    }

    /// Never answer
    pub fn go_silent(&self) {
        self.behaviour.silent.store(true, Ordering::SeqCst);
    }

    /// Answer every request with this response code
    pub fn force_rcode(&self, rcode: u16) {
        self.behaviour.forced_rcode.store(rcode, Ordering::SeqCst);
    }

    /// Sign responses with a MAC that does not verify
    pub fn corrupt_response_mac(&self) {
        self.behaviour.corrupt_response_mac.store(true, Ordering::SeqCst);
    }

    /// Send a datagram with the wrong message ID before each real response
    pub fn send_decoy(&self) {
        self.behaviour.send_decoy.store(true, Ordering::SeqCst);
    }

    /// Put a record in the zone directly
    pub fn seed_a(&self, owner: &str, ip: &str) {
        let ip: std::net::Ipv4Addr = ip.parse().expect("valid IPv4");
        self.records
            .lock()
            .unwrap()
            .entry((owner.to_ascii_lowercase(), u16::from(RecordType::A)))
            .or_default()
            .push((3600, RData::A(ip.into())));
    }

    /// A records currently held for `owner`
    pub fn a_records(&self, owner: &str) -> Vec<String> {
        self.rrset(owner, RecordType::A)
            .into_iter()
            .filter_map(|(_, rdata)| match rdata {
                RData::A(a) => Some(a.0.to_string()),
                _ => None,
            })
            .collect()
    }

    /// (ttl, rdata) pairs currently held for `owner` and `rtype`
    pub fn rrset(&self, owner: &str, rtype: RecordType) -> Vec<(u32, RData)> {
        self.records
            .lock()
            .unwrap()
            .get(&(owner.to_ascii_lowercase(), u16::from(rtype)))
            .cloned()
            .unwrap_or_default()
    }

    /// Every request the server has decoded, in arrival order
    pub fn received(&self) -> Vec<Message> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for FakeAuthority {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(
    socket: UdpSocket,
    records: Arc<Zone>,
    received: Arc<Mutex<Vec<Message>>>,
    behaviour: Arc<Behaviour>,
) {
    let mut buf = vec![0u8; 65_535];
    loop {
        let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
            return;
        };
        let request = buf[..len].to_vec();
        let Ok(message) = Message::from_vec(&request) else {
            continue;
        };
        received.lock().unwrap().push(message.clone());

        if behaviour.silent.load(Ordering::SeqCst) {
            continue;
        }

        let response = respond(&request, &message, &records, &behaviour)
            .to_vec()
            .expect("encode response");
        if behaviour.send_decoy.load(Ordering::SeqCst) {
            let mut decoy = response.clone();
            decoy[0] ^= 0xff;
            let _ = socket.send_to(&decoy, peer).await;
        }
        let _ = socket.send_to(&response, peer).await;
    }
}

fn respond(request: &[u8], message: &Message, records: &Zone, behaviour: &Behaviour) -> Message {
    let forced = behaviour.forced_rcode.load(Ordering::SeqCst);
    if forced != 0 {
        return reply(message, forced, Vec::new());
    }

    if message.op_code() != OpCode::Update {
        return answer_query(message, records);
    }

    let key = behaviour.required_key.lock().unwrap().clone();
    let request_mac = match &key {
        None => None,
        Some(key) => match key.verify_request(request) {
            Some(mac) => Some(mac),
            None => return reply(message, 9, Vec::new()),
        },
    };

    let zone = Name::from_ascii(ZONE).expect("zone name");
    let zone_ok = message.queries().first().is_some_and(|q| q.name() == &zone);
    if !zone_ok {
        return reply(message, 10, Vec::new());
    }

    apply(message, records);

    let mut response = reply(message, 0, Vec::new());
    if let (Some(key), Some(mac)) = (key, request_mac) {
        let corrupt = behaviour.corrupt_response_mac.load(Ordering::SeqCst);
        key.sign_response(&mut response, &mac, corrupt);
    }
    response
}

fn apply(message: &Message, records: &Zone) {
    let mut records = records.lock().unwrap();
    for record in message.updates() {
        let key = (
            record.name().to_ascii().to_ascii_lowercase(),
            u16::from(record.record_type()),
        );
        match (record.dns_class(), record.data()) {
            (DNSClass::ANY, None) => {
                records.remove(&key);
            }
            (DNSClass::IN, Some(rdata)) => {
                let rrset = records.entry(key).or_default();
                rrset.retain(|(_, held)| held != rdata);
                rrset.push((record.ttl(), rdata.clone()));
            }
            _ => {}
        }
    }
}

fn answer_query(message: &Message, records: &Zone) -> Message {
    let Some(question) = message.queries().first() else {
        return reply(message, 1, Vec::new());
    };
    let zone = Name::from_ascii(ZONE).expect("zone name");
    if !zone.zone_of(question.name()) {
        return reply(message, 5, Vec::new());
    }
    let answers = records
        .lock()
        .unwrap()
        .get(&(
            question.name().to_ascii().to_ascii_lowercase(),
            u16::from(question.query_type()),
        ))
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|(ttl, rdata)| Record::from_rdata(question.name().clone(), ttl, rdata))
        .collect();
    reply(message, 0, answers)
}

/// Build a response echoing the question section
fn reply(request: &Message, rcode: u16, answers: Vec<Record>) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_authoritative(true)
        .set_response_code(ResponseCode::from_low(rcode as u8));
    response.add_queries(request.queries().to_vec());
    response.add_answers(answers);
    response
}

fn now() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

/// The key the server and client share
pub fn shared_key_entry() -> TsigKeyEntry {
    TsigKeyEntry::new(KEY_NAME, KEY_SECRET).with_algorithm(TsigAlgorithm::HmacSha512)
}

/// The server's side of [`shared_key_entry`]
pub fn server_key() -> ServerKey {
    ServerKey::new(KEY_NAME, WireAlgorithm::HmacSha512, KEY_SECRET)
}

pub fn key_ring() -> KeyRing {
    KeyRing::from_entries([shared_key_entry()])
}

/// Whether a decoded request carries a TSIG record
pub fn is_signed(message: &Message) -> bool {
    message
        .signature()
        .last()
        .is_some_and(|r| r.record_type() == RecordType::TSIG)
}

/// Text segments of a TXT record
pub fn txt_segments(rdata: &RData) -> Vec<String> {
    match rdata {
        RData::TXT(txt) => txt
            .txt_data()
            .iter()
            .map(|segment| String::from_utf8_lossy(segment).into_owned())
            .collect(),
        other => panic!("expected TXT data, got {:?}", other),
    }
}
