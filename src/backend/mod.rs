//! Resolution backends.
//!
//! A [`Backend`] runs the blocking resolver [`Primitives`] for submitted
//! requests away from the caller's thread and completes them. The
//! [`WorkerPool`] is the default backend.

use crate::{
    address::ascii_form,
    cancel::CancelToken,
    request::{Dispatch, QueryOutcome, Request},
    srv, Error, Query, ResolvedAddress, TargetSet,
};
use hickory_proto::rr::RecordType;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Instant,
};

pub mod delivery;
pub mod pool;
pub mod system;

pub use delivery::DeliveryThread;
pub use pool::WorkerPool;
pub use system::SystemPrimitives;

/// Failures reported by resolver primitives, modeled after `h_errno`.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolverError {
    /// Authoritative answer that the name does not exist.
    #[error("unknown host")]
    HostNotFound,
    /// Transient failure, such as a server that did not answer.
    #[error("hostname lookup failure")]
    TryAgain,
    /// Non-recoverable server failure.
    #[error("unknown server error")]
    NoRecovery,
    /// The name exists but has no record of the requested type.
    #[error("no address associated with name")]
    NoData,
    /// Local I/O or protocol failure.
    #[error("resolver i/o: {0}")]
    Io(String),
}

impl ResolverError {
    /// Translates the failure of `query` into the crate-wide taxonomy.
    pub fn into_error(self, query: &Query) -> Error {
        match self {
            Self::HostNotFound | Self::NoData => {
                Error::NotFound(format!("error resolving {}: {}", query, self))
            }
            Self::TryAgain => Error::TemporaryFailure(format!("error resolving {}: {}", query, self)),
            Self::NoRecovery | Self::Io(_) => {
                Error::Internal(format!("error resolving {}: {}", query, self))
            }
        }
    }
}

/// Blocking resolver calls executed by a backend.
pub trait Primitives: Send + Sync {
    /// Forward lookup of an ASCII hostname, returning addresses with `port`.
    fn lookup_host(&self, hostname: &str, port: u16) -> Result<Vec<SocketAddr>, ResolverError>;

    /// Reverse lookup, returning the ASCII hostname of `addr`.
    fn lookup_addr(&self, addr: IpAddr) -> Result<String, ResolverError>;

    /// Raw DNS query, returning the undecoded response message.
    fn query(&self, name: &str, record_type: RecordType) -> Result<Vec<u8>, ResolverError>;
}

impl<P: Primitives + ?Sized> Primitives for Arc<P> {
    fn lookup_host(&self, hostname: &str, port: u16) -> Result<Vec<SocketAddr>, ResolverError> {
        (**self).lookup_host(hostname, port)
    }

    fn lookup_addr(&self, addr: IpAddr) -> Result<String, ResolverError> {
        (**self).lookup_addr(addr)
    }

    fn query(&self, name: &str, record_type: RecordType) -> Result<Vec<u8>, ResolverError> {
        (**self).query(name, record_type)
    }
}

/// Executes submitted requests and completes them exactly once.
pub trait Backend: Send + Sync {
    /// Queues `request` for resolution. If `cancel` is given, cancelling it
    /// cancels the request.
    fn submit(&self, request: Arc<Request>, cancel: Option<&CancelToken>);

    /// Gets the context completion callbacks run on.
    fn dispatcher(&self) -> Arc<dyn Dispatch>;
}

/// Runs the primitive `query` calls for, producing the outcome to complete its
/// request with.
pub fn resolve(query: &Query, primitives: &dyn Primitives) -> Result<QueryOutcome, Error> {
    match query {
        Query::Name(name) => {
            let ascii = ascii_form(&name.hostname)
                .ok_or_else(|| Error::NotFound(format!("invalid hostname: {}", name.hostname)))?;
            let addrs = primitives
                .lookup_host(&ascii, name.port)
                .map_err(|e| e.into_error(query))?;
            if addrs.is_empty() {
                return Err(ResolverError::NoData.into_error(query));
            }
            Ok(QueryOutcome::Address(ResolvedAddress::from_hostname(
                &name.hostname,
                name.port,
                addrs,
            )))
        }
        Query::Address(addr) => {
            let hostname = primitives
                .lookup_addr(addr.ip())
                .map_err(|e| e.into_error(query))?;
            Ok(QueryOutcome::Address(ResolvedAddress::from_ascii(
                hostname,
                addr.port(),
                vec![*addr],
            )))
        }
        Query::Service(service) => {
            let response = primitives
                .query(service.srv_name(), RecordType::SRV)
                .map_err(|e| e.into_error(query))?;
            let malformed =
                |e: srv::DecodeError| Error::internal(format!("error parsing SRV response for {}: {}", query, e));
            let targets = if service.is_ordered() {
                srv::target_set(&response, Instant::now(), rand::rng()).map_err(malformed)?
            } else {
                let targets = srv::decode_srv(&response, Instant::now()).map_err(malformed)?;
                Some(targets).filter(|t| !t.is_empty()).map(TargetSet::new)
            };
            let targets = targets.ok_or_else(|| ResolverError::NoData.into_error(query))?;
            Ok(QueryOutcome::Targets(targets))
        }
    }
}
