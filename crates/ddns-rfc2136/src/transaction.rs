//! Update transactions (RFC 2136 §2)
//!
//! A transaction names its zone, lists RRset deletions and record insertions,
//! and is optionally signed. Encoding always places every deletion before any
//! insertion so a replace never leaves the owner with both values.

use crate::signer::{DEFAULT_FUDGE, TsigKey};
use ddns_core::name;
use ddns_core::traits::{RecordData, RecordType};
use ddns_core::{Error, Result};
use hickory_proto::error::ProtoError;
use hickory_proto::op::{Message, MessageType, OpCode, Query, UpdateMessage};
use hickory_proto::rr::rdata::{A, TXT};
use hickory_proto::rr::{self, DNSClass, Name, RData, Record};

/// Longest TXT character-string (RFC 1035 §3.3)
pub const MAX_TXT_SEGMENT: usize = 255;

/// Class of an update-section record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass {
    /// Add to an RRset
    In,
    /// Delete a whole RRset
    Any,
}

impl RecordClass {
    pub fn dns_class(self) -> DNSClass {
        match self {
            Self::In => DNSClass::IN,
            Self::Any => DNSClass::ANY,
        }
    }
}

/// One entry in the update section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecordSet {
    pub owner: String,
    pub record_type: RecordType,
    pub class: RecordClass,
    pub ttl: u32,
    /// Empty for deletions
    pub data: Option<RecordData>,
}

impl ResourceRecordSet {
    /// Delete every record of `record_type` at `owner`
    pub fn delete_all(owner: &str, record_type: RecordType) -> Self {
        Self {
            owner: name::fqdn(owner),
            record_type,
            class: RecordClass::Any,
            ttl: 0,
            data: None,
        }
    }

    /// Add one record at `owner`
    pub fn insert(owner: &str, ttl: u32, data: RecordData) -> Self {
        Self {
            owner: name::fqdn(owner),
            record_type: data.record_type(),
            class: RecordClass::In,
            ttl,
            data: Some(data),
        }
    }

    pub fn is_deletion(&self) -> bool {
        self.class == RecordClass::Any
    }

    /// Update-section record; deletions carry no RDATA
    pub fn to_record(&self) -> Result<Record> {
        let owner = domain_name(&self.owner)?;
        let mut record = match &self.data {
            None => Record::with(owner, rr::RecordType::from(self.record_type.code()), self.ttl),
            Some(RecordData::A(ip)) => Record::from_rdata(owner, self.ttl, RData::A(A(*ip))),
            Some(RecordData::Txt(segments)) => {
                validate_txt(segments)?;
                Record::from_rdata(owner, self.ttl, RData::TXT(TXT::new(segments.clone())))
            }
        };
        record.set_dns_class(self.class.dns_class());
        Ok(record)
    }
}

/// A TXT record needs at least one segment, each a valid character-string
pub fn validate_txt(segments: &[String]) -> Result<()> {
    if segments.is_empty() {
        return Err(Error::invalid_input("TXT record needs at least one segment"));
    }
    if let Some(long) = segments.iter().find(|s| s.len() > MAX_TXT_SEGMENT) {
        return Err(Error::invalid_input(format!(
            "TXT segment of {} bytes exceeds {}",
            long.len(),
            MAX_TXT_SEGMENT
        )));
    }
    Ok(())
}

/// Parse a domain name, rejecting empty or overlong labels
pub fn domain_name(name: &str) -> Result<Name> {
    Name::from_ascii(name).map_err(|e| Error::invalid_input(format!("invalid name {:?}: {}", name, e)))
}

pub(crate) fn wire_error(err: ProtoError) -> Error {
    Error::wire(err.to_string())
}

/// How a transaction gets signed
#[derive(Debug, Clone)]
pub struct TsigDescriptor {
    pub key: TsigKey,
    pub fudge: u16,
    /// Seconds since the epoch
    pub time_signed: u64,
}

impl TsigDescriptor {
    pub fn new(key: TsigKey, time_signed: u64) -> Self {
        Self {
            key,
            fudge: DEFAULT_FUDGE,
            time_signed,
        }
    }
}

/// Wire bytes of a transaction, plus the request MAC when signed
#[derive(Debug, Clone)]
pub struct EncodedTransaction {
    pub bytes: Vec<u8>,
    pub mac: Option<Vec<u8>>,
}

/// An RFC 2136 UPDATE ready for encoding
#[derive(Debug, Clone)]
pub struct UpdateTransaction {
    zone: String,
    deletions: Vec<ResourceRecordSet>,
    insertions: Vec<ResourceRecordSet>,
    signature: Option<TsigDescriptor>,
}

impl UpdateTransaction {
    pub fn new(zone: &str) -> Self {
        Self {
            zone: name::fqdn(zone),
            deletions: Vec::new(),
            insertions: Vec::new(),
            signature: None,
        }
    }

    /// Replace the `record_type` RRset at `owner` with a single record
    pub fn replace(zone: &str, owner: &str, ttl: u32, data: RecordData) -> Self {
        let record_type = data.record_type();
        Self::new(zone)
            .delete(ResourceRecordSet::delete_all(owner, record_type))
            .insert(ResourceRecordSet::insert(owner, ttl, data))
    }

    pub fn delete(mut self, rrset: ResourceRecordSet) -> Self {
        self.deletions.push(rrset);
        self
    }

    pub fn insert(mut self, rrset: ResourceRecordSet) -> Self {
        self.insertions.push(rrset);
        self
    }

    pub fn signed(mut self, signature: TsigDescriptor) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn deletions(&self) -> &[ResourceRecordSet] {
        &self.deletions
    }

    pub fn insertions(&self) -> &[ResourceRecordSet] {
        &self.insertions
    }

    pub fn signature(&self) -> Option<&TsigDescriptor> {
        self.signature.as_ref()
    }

    /// Unsigned message form
    pub fn to_message(&self, id: u16) -> Result<Message> {
        let zone = domain_name(&self.zone)?;
        let mut updates = Vec::with_capacity(self.deletions.len() + self.insertions.len());
        for rrset in self.deletions.iter().chain(&self.insertions) {
            let record = rrset.to_record()?;
            if !zone.zone_of(record.name()) {
                return Err(Error::invalid_input(format!(
                    "{} is outside zone {}",
                    rrset.owner, self.zone
                )));
            }
            updates.push(record);
        }

        let mut zone_query = Query::new();
        zone_query
            .set_name(zone)
            .set_query_class(DNSClass::IN)
            .set_query_type(rr::RecordType::SOA);

        let mut message = Message::new();
        message
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Update)
            .set_recursion_desired(false);
        message.add_zone(zone_query);
        message.add_updates(updates);
        Ok(message)
    }

    /// Encode and, when a signature is attached, sign
    pub fn encode(&self, id: u16) -> Result<EncodedTransaction> {
        let mut message = self.to_message(id)?;
        let mac = match &self.signature {
            None => None,
            Some(sig) => Some(sig.key.sign(&mut message, None, sig.time_signed, sig.fudge)?),
        };
        let bytes = message.to_vec().map_err(wire_error)?;
        Ok(EncodedTransaction { bytes, mac })
    }
}
