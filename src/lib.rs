#![deny(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

/*!
Hostname, address and service resolution on a pool of worker threads.

# Introduction

Operating system resolver calls such as `getaddrinfo` block the calling
thread until an answer arrives, which may take seconds. `resolv-pool` runs
those calls on a small pool of reusable worker threads and hands the results
back as futures, blocking waits or callbacks, so that lookups can be started
from any context and cancelled at any time.

Three kinds of lookups are supported:

- forward lookups of a hostname to socket addresses
  ([`Resolver::lookup_name`]),
- reverse lookups of an address to its hostname
  ([`Resolver::lookup_address`]),
- service lookups through SRV records ([`Resolver::lookup_service`]).

SRV Records, as defined in [RFC 2782](https://tools.ietf.org/html/rfc2782),
are DNS records of the form

`_Service._Proto.Name TTL Class SRV Priority Weight Port Target`

For instance, a DNS server might respond with the following SRV records for
`_ldap._tcp.example.com`:

```text
_ldap._tcp.example.com. 60 IN SRV 1 100 389 ldap1.example.com.
_ldap._tcp.example.com. 60 IN SRV 2 50  389 ldap2.example.com.
_ldap._tcp.example.com. 60 IN SRV 2 50  389 ldap3.example.com.
```

A client wanting to communicate with this service would first try
`ldap1.example.com:389` (the record with the lowest priority), then the other
two in a random order weighted by their weight. [`Resolver::lookup_service`]
returns the targets in exactly that order:

```no_run
# async fn lookup() -> Result<(), resolv_pool::Error> {
use resolv_pool::{CancelToken, Resolver};
use std::time::Duration;

let resolver = Resolver::new();
let cancel = CancelToken::with_timeout(Duration::from_secs(10));
let targets = resolver
    .lookup_service_async("ldap", "tcp", "example.com", Some(&cancel))
    .await?;
for target in &targets {
    let addresses = resolver.lookup_name_async(&target.hostname, target.port, None).await?;
    // Connect to one of `addresses`
}
# Ok(())
# }
```

# Backends

Lookups are executed by a [`Backend`](backend::Backend). The default one is a
[`WorkerPool`](backend::WorkerPool) running the
[`SystemPrimitives`](backend::SystemPrimitives): the system's `getaddrinfo`
for forward lookups and DNS queries sent to the configured nameservers for
reverse and service lookups. Both the backend and the primitives can be
replaced.

The [`Resolve`] trait abstracts over asynchronous resolvers. Besides
[`Resolver`], it is implemented by [`hickory_resolver::Resolver`] when the
`hickory` feature is enabled.
*/

mod address;
pub use address::ResolvedAddress;

mod cancel;
pub use cancel::{CancelToken, ObserverId};

mod config;
pub use config::PoolConfig;

mod error;
pub use error::{Error, ErrorKind};

mod query;
pub use query::{NameQuery, Query, ServiceQuery};

mod record;
pub use record::{ServiceTarget, SrvRecord, TargetSet};

mod request;
pub use request::{Callback, Dispatch, FromOutcome, Lookup, QueryOutcome, Request, Task};

pub mod backend;
pub mod srv;

pub mod resolver;
pub use resolver::{default_resolver, set_default_resolver, Resolve, Resolver};
