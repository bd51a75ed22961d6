//! Lookup queries.

use std::{fmt, net::SocketAddr};

/// A single resolution to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Query {
    /// Forward lookup of a hostname.
    Name(NameQuery),
    /// Reverse lookup of an address.
    Address(SocketAddr),
    /// SRV lookup of a service.
    Service(ServiceQuery),
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(query) => write!(f, "{}:{}", query.hostname, query.port),
            Self::Address(addr) => write!(f, "{}", addr.ip()),
            Self::Service(query) => f.write_str(query.srv_name()),
        }
    }
}

/// Forward lookup of a hostname, for a given port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameQuery {
    /// Hostname to resolve, either Unicode or ASCII-compatible.
    pub hostname: String,
    /// Port copied into every resolved socket address.
    pub port: u16,
}

impl NameQuery {
    /// Creates a forward query.
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }
}

/// SRV lookup of `_service._protocol.domain`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceQuery {
    srv_name: String,
    ordered: bool,
}

impl ServiceQuery {
    /// Creates a service query from its parts.
    ///
    /// ```
    /// use resolv_pool::ServiceQuery;
    /// let query = ServiceQuery::new("ldap", "tcp", "example.com");
    /// assert_eq!(query.srv_name(), "_ldap._tcp.example.com");
    /// ```
    pub fn new(service: &str, protocol: &str, domain: &str) -> Self {
        Self {
            srv_name: format!("_{}._{}.{}", service, protocol, domain),
            ordered: true,
        }
    }

    /// Creates a service query from an already formed SRV name such as
    /// `_http._tcp.example.com`.
    pub fn from_name(srv_name: impl ToString) -> Self {
        Self {
            srv_name: srv_name.to_string(),
            ordered: true,
        }
    }

    /// Asks for the targets as they appear in the response, with no RFC 2782
    /// ordering and no special meaning given to a `"."` target.
    pub fn unordered(self) -> Self {
        Self {
            ordered: false,
            ..self
        }
    }

    /// Returns `true` unless [`unordered`](Self::unordered) was requested.
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Gets the name queried for SRV records.
    pub fn srv_name(&self) -> &str {
        &self.srv_name
    }
}
