//! [`Resolve`] backed by [`hickory_resolver`].

use super::Resolve;
use crate::{address::ascii_form, srv::presentation, Error, ResolvedAddress, ServiceTarget, SrvRecord};
use async_trait::async_trait;
use hickory_resolver::{
    name_server::ConnectionProvider,
    proto::{op::ResponseCode, rr::rdata::SRV, ProtoErrorKind},
    Name, ResolveError, ResolveErrorKind, Resolver,
};
use std::net::{IpAddr, SocketAddr};

#[async_trait]
impl<P> Resolve for Resolver<P>
where
    P: ConnectionProvider,
{
    async fn lookup_name(&self, hostname: &str, port: u16) -> Result<ResolvedAddress, Error> {
        if let Ok(ip) = hostname.parse::<IpAddr>() {
            return Ok(ResolvedAddress::literal(SocketAddr::new(ip, port)));
        }
        let ascii = ascii_form(hostname)
            .ok_or_else(|| Error::NotFound(format!("invalid hostname: {}", hostname)))?;
        let lookup = self
            .lookup_ip(ascii.as_str())
            .await
            .map_err(|e| translate(hostname, e))?;
        let addrs: Vec<_> = lookup.iter().map(|ip| SocketAddr::new(ip, port)).collect();
        Ok(ResolvedAddress::from_hostname(hostname, port, addrs))
    }

    async fn lookup_address(&self, addr: SocketAddr) -> Result<ResolvedAddress, Error> {
        let lookup = self
            .reverse_lookup(addr.ip())
            .await
            .map_err(|e| translate(addr.ip(), e))?;
        let name = lookup.iter().next().ok_or_else(|| {
            Error::NotFound(format!("error resolving {}: no PTR record", addr.ip()))
        })?;
        Ok(ResolvedAddress::from_ascii(
            presentation(&name.0),
            addr.port(),
            vec![addr],
        ))
    }

    async fn lookup_service_unordered(&self, srv_name: &str) -> Result<Vec<ServiceTarget>, Error> {
        let lookup = self
            .srv_lookup(srv_name)
            .await
            .map_err(|e| translate(srv_name, e))?;
        let expires_at = lookup.as_lookup().valid_until();
        Ok(lookup
            .iter()
            .map(|srv| ServiceTarget {
                hostname: presentation(srv.target()),
                port: srv.port(),
                priority: srv.priority(),
                weight: srv.weight(),
                expires_at,
            })
            .collect())
    }
}

impl SrvRecord for SRV {
    type Target = Name;

    fn target(&self) -> &Self::Target {
        self.target()
    }

    fn port(&self) -> u16 {
        self.port()
    }

    fn priority(&self) -> u16 {
        self.priority()
    }

    fn weight(&self) -> u16 {
        self.weight()
    }
}

fn translate(what: impl std::fmt::Display, error: ResolveError) -> Error {
    let message = format!("error resolving {}: {}", what, error);
    let proto = match error.kind() {
        ResolveErrorKind::Proto(proto) => proto,
        _ => return Error::Internal(message),
    };
    match proto.kind() {
        // Negative answers of every kind, SERVFAIL included, are reported this way
        ProtoErrorKind::NoRecordsFound { response_code, .. } => match *response_code {
            ResponseCode::NXDomain | ResponseCode::NoError => Error::NotFound(message),
            ResponseCode::ServFail | ResponseCode::Refused => Error::TemporaryFailure(message),
            _ => Error::Internal(message),
        },
        _ => Error::TemporaryFailure(message),
    }
}
