//! TSIG transaction signatures (RFC 2845)
//!
//! hickory-proto lays out the digest input and carries the TSIG record.
//! SHA-2 MACs are computed by its `TSigner`; HMAC-MD5, which hickory knows by
//! name only, goes through the `hmac` crate over the same digest input.
//! Responses are verified against the MAC of the request they answer.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use ddns_core::config::{TsigAlgorithm, TsigKeyEntry};
use ddns_core::{Error, Result};
use hickory_proto::op::Message;
use hickory_proto::rr::dnssec::rdata::DNSSECRData;
use hickory_proto::rr::dnssec::rdata::tsig::{
    self, TSIG, TsigAlgorithm as WireAlgorithm, make_tsig_record, message_tbs,
};
use hickory_proto::rr::dnssec::tsig::TSigner;
use hickory_proto::rr::{Name, RData};
use hmac::{Hmac, Mac};
use md5::Md5;
use std::fmt;
use tracing::debug;

/// Default allowed clock skew in seconds
pub const DEFAULT_FUDGE: u16 = 300;

/// hickory's name for a configured algorithm
pub fn wire_algorithm(algorithm: TsigAlgorithm) -> WireAlgorithm {
    match algorithm {
        TsigAlgorithm::HmacMd5 => WireAlgorithm::HmacMd5,
        TsigAlgorithm::HmacSha256 => WireAlgorithm::HmacSha256,
        TsigAlgorithm::HmacSha512 => WireAlgorithm::HmacSha512,
    }
}

#[derive(Clone)]
enum MacEngine {
    Signer(TSigner),
    HmacMd5(Vec<u8>),
}

impl MacEngine {
    fn new(name: &Name, algorithm: TsigAlgorithm, secret: Vec<u8>) -> Result<Self> {
        match algorithm {
            TsigAlgorithm::HmacMd5 => Ok(Self::HmacMd5(secret)),
            sha2 => TSigner::new(secret, wire_algorithm(sha2), name.clone(), DEFAULT_FUDGE)
                .map(Self::Signer)
                .map_err(|e| Error::tsig(format!("key {}: {}", name, e))),
        }
    }

    fn sign(&self, tbs: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Signer(signer) => signer.sign(tbs).map_err(|e| Error::tsig(e.to_string())),
            Self::HmacMd5(secret) => {
                let mut mac = hmac_md5(secret)?;
                mac.update(tbs);
                Ok(mac.finalize().into_bytes().to_vec())
            }
        }
    }

    /// Constant-time comparison against a received MAC
    fn verify(&self, tbv: &[u8], tag: &[u8]) -> Result<()> {
        let outcome = match self {
            Self::Signer(signer) => signer.verify(tbv, tag).is_ok(),
            Self::HmacMd5(secret) => {
                let mut mac = hmac_md5(secret)?;
                mac.update(tbv);
                mac.verify_slice(tag).is_ok()
            }
        };
        if outcome {
            Ok(())
        } else {
            Err(Error::tsig("MAC mismatch"))
        }
    }
}

fn hmac_md5(secret: &[u8]) -> Result<Hmac<Md5>> {
    Hmac::<Md5>::new_from_slice(secret).map_err(|_| Error::tsig("unusable key length"))
}

/// A TSIG key with its decoded secret
#[derive(Clone)]
pub struct TsigKey {
    name: Name,
    algorithm: TsigAlgorithm,
    engine: MacEngine,
}

impl TsigKey {
    pub fn new(name: &str, algorithm: TsigAlgorithm, secret: Vec<u8>) -> Result<Self> {
        let name = Name::from_ascii(ddns_core::name::canonical(name))
            .map_err(|e| Error::tsig(format!("invalid key name {}: {}", name, e)))?;
        let engine = MacEngine::new(&name, algorithm, secret)?;
        Ok(Self {
            name,
            algorithm,
            engine,
        })
    }

    /// Decode the base64 secret of a configured key
    pub fn from_entry(entry: &TsigKeyEntry) -> Result<Self> {
        let secret = BASE64
            .decode(entry.secret.trim())
            .map_err(|e| Error::tsig(format!("key {}: invalid base64 secret: {}", entry.fqdn, e)))?;
        Self::new(&entry.fqdn, entry.algorithm, secret)
    }

    /// Canonical key name
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn algorithm(&self) -> TsigAlgorithm {
        self.algorithm
    }

    /// Attach a TSIG record to `message` and return its MAC
    ///
    /// `message` must not be signed yet. `prior_mac` is the request MAC when
    /// signing a response.
    pub fn sign(
        &self,
        message: &mut Message,
        prior_mac: Option<&[u8]>,
        time_signed: u64,
        fudge: u16,
    ) -> Result<Vec<u8>> {
        if !message.signature().is_empty() {
            return Err(Error::tsig("message is already signed"));
        }
        let pre_tsig = TSIG::new(
            wire_algorithm(self.algorithm),
            time_signed,
            fudge,
            Vec::new(),
            message.id(),
            0,
            Vec::new(),
        );
        let tbs = message_tbs(prior_mac, &*message, &pre_tsig, &self.name)
            .map_err(|e| Error::wire(e.to_string()))?;
        let mac = self.engine.sign(&tbs)?;
        message.add_tsig(make_tsig_record(self.name.clone(), pre_tsig.set_mac(mac.clone())));

        debug!(key = %self.name, algorithm = %self.algorithm, "Signed message");
        Ok(mac)
    }

    /// Verify the TSIG record closing the encoded `message`
    ///
    /// Returns the received MAC. The record must be named after this key,
    /// use the same algorithm, carry a valid MAC and a signing time within
    /// its fudge of `now`.
    pub fn verify(&self, message: &[u8], prior_mac: Option<&[u8]>, now: u64) -> Result<Vec<u8>> {
        let (tbv, record) = tsig::signed_bitmessage_to_buf(prior_mac, message, true)
            .map_err(|e| Error::tsig(e.to_string()))?;
        let rdata = match record.data() {
            Some(RData::DNSSEC(DNSSECRData::TSIG(rdata))) => rdata,
            _ => return Err(Error::tsig("message carries no TSIG record")),
        };

        if record.name() != &self.name {
            return Err(Error::tsig(format!(
                "signed with key {}, expected {}",
                record.name(),
                self.name
            )));
        }
        // Compared as names: servers send the MD5 name in lower case
        if rdata.algorithm().to_name() != wire_algorithm(self.algorithm).to_name() {
            return Err(Error::tsig(format!(
                "signed with algorithm {}, expected {}",
                rdata.algorithm(),
                self.algorithm
            )));
        }

        self.engine.verify(&tbv, rdata.mac())?;

        let skew = now.abs_diff(rdata.time());
        if skew > u64::from(rdata.fudge()) {
            return Err(Error::tsig(format!(
                "signing time off by {} seconds (fudge {})",
                skew,
                rdata.fudge()
            )));
        }
        Ok(rdata.mac().to_vec())
    }
}

// Secrets never reach the logs
impl fmt::Debug for TsigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsigKey")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}
