//! Decoding of DNS response messages.
//!
//! Messages are parsed with [`hickory_proto`]; only the SRV and PTR answers of
//! class IN are extracted from them.

use crate::record::ServiceTarget;
use hickory_proto::{
    op::Message,
    rr::{DNSClass, Name, RData, Record},
    ProtoError,
};
use std::time::{Duration, Instant};

/// Error encountered while decoding a response.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("malformed DNS message: {0}")]
pub struct DecodeError(String);

impl From<ProtoError> for DecodeError {
    fn from(err: ProtoError) -> Self {
        Self(err.to_string())
    }
}

/// Answers of class IN, in the order they appear.
fn answers(msg: &[u8]) -> Result<impl Iterator<Item = Record>, DecodeError> {
    let mut message = Message::from_vec(msg)?;
    Ok(message
        .take_answers()
        .into_iter()
        .filter(|record| record.dns_class() == DNSClass::IN))
}

/// Extracts the SRV/IN answers of a response, in the order they appear.
///
/// Each target expires `ttl` seconds after `received_at`.
pub fn decode_srv(msg: &[u8], received_at: Instant) -> Result<Vec<ServiceTarget>, DecodeError> {
    Ok(answers(msg)?
        .filter_map(|record| match record.data() {
            RData::SRV(srv) => Some(ServiceTarget {
                hostname: presentation(srv.target()),
                port: srv.port(),
                priority: srv.priority(),
                weight: srv.weight(),
                expires_at: received_at + Duration::from_secs(u64::from(record.ttl())),
            }),
            _ => None,
        })
        .collect())
}

/// Extracts the name of the first PTR/IN answer of a response.
pub fn decode_ptr(msg: &[u8]) -> Result<Option<String>, DecodeError> {
    Ok(answers(msg)?.find_map(|record| match record.data() {
        RData::PTR(ptr) => Some(presentation(&ptr.0)),
        _ => None,
    }))
}

/// Presentation form of `name` without the trailing dot. The root name is
/// `"."`.
pub(crate) fn presentation(name: &Name) -> String {
    if name.is_root() {
        return String::from(".");
    }
    let ascii = name.to_ascii();
    match ascii.strip_suffix('.') {
        Some(relative) => relative.to_owned(),
        None => ascii,
    }
}
