//! Resolver facade.

use crate::{
    backend::{Backend, WorkerPool},
    cancel::CancelToken,
    config::PoolConfig,
    request::{FromOutcome, Lookup, QueryOutcome, Request},
    srv::order_srv_records,
    Error, NameQuery, Query, ResolvedAddress, ServiceQuery, ServiceTarget, TargetSet,
};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::{
    fmt,
    net::{IpAddr, SocketAddr},
    sync::{Arc, OnceLock},
};

#[cfg(feature = "hickory")]
mod hickory;

/// Represents the ability to resolve names, addresses and services.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Resolves `hostname` to the socket addresses it has for `port`.
    async fn lookup_name(&self, hostname: &str, port: u16) -> Result<ResolvedAddress, Error>;

    /// Resolves the hostname of `addr`.
    async fn lookup_address(&self, addr: SocketAddr) -> Result<ResolvedAddress, Error>;

    /// Gets the targets of a SRV name without sorting by priority or
    /// shuffling based on weight.
    async fn lookup_service_unordered(&self, srv_name: &str) -> Result<Vec<ServiceTarget>, Error>;

    /// Gets the targets of a SRV name, sorted by priority and shuffled based
    /// on weight per RFC 2782.
    async fn lookup_service(&self, srv_name: &str) -> Result<TargetSet, Error> {
        let mut targets = self.lookup_service_unordered(srv_name).await?;
        if let [only] = targets.as_slice() {
            if only.hostname == "." {
                return Ok(TargetSet::default());
            }
        }
        order_srv_records(&mut targets, rand::rng());
        Ok(TargetSet::new(targets))
    }
}

/// Resolves names, addresses and services on a [`Backend`].
///
/// Cloning a `Resolver` is cheap and shares the backend.
///
/// ```no_run
/// # fn lookup() -> Result<(), resolv_pool::Error> {
/// use resolv_pool::Resolver;
/// let resolver = Resolver::new();
/// for target in resolver.lookup_service("ldap", "tcp", "example.com")? {
///     println!("{}:{}", target.hostname, target.port);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Resolver {
    backend: Arc<dyn Backend>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Creates a resolver running the system primitives on a [`WorkerPool`]
    /// with the default configuration.
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Creates a resolver running the system primitives on a [`WorkerPool`]
    /// configured by `config`.
    pub fn with_config(config: PoolConfig) -> Self {
        Self::with_backend(Arc::new(WorkerPool::with_system_primitives(config)))
    }

    /// Creates a resolver submitting its requests to `backend`.
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Gets the backend requests are submitted to.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Resolves `hostname`, blocking until done.
    ///
    /// A literal IPv4 or IPv6 address is returned as is, with no hostname,
    /// without doing any lookup.
    pub fn lookup_name(&self, hostname: &str, port: u16) -> Result<ResolvedAddress, Error> {
        self.lookup_name_async(hostname, port, None).wait()
    }

    /// Starts resolving `hostname`. Cancelling `cancel` cancels the lookup.
    pub fn lookup_name_async(
        &self,
        hostname: &str,
        port: u16,
        cancel: Option<&CancelToken>,
    ) -> Lookup<ResolvedAddress> {
        let query = Query::Name(NameQuery::new(hostname, port));
        match hostname.parse::<IpAddr>() {
            Ok(ip) => {
                let resolved = ResolvedAddress::literal(SocketAddr::new(ip, port));
                Lookup::new(Request::completed(
                    query,
                    Ok(QueryOutcome::Address(resolved)),
                    self.backend.dispatcher(),
                ))
            }
            Err(_) => self.submit(query, cancel),
        }
    }

    /// Resolves the hostname of `addr`, blocking until done.
    pub fn lookup_address(&self, addr: SocketAddr) -> Result<ResolvedAddress, Error> {
        self.lookup_address_async(addr, None).wait()
    }

    /// Starts resolving the hostname of `addr`. Cancelling `cancel` cancels
    /// the lookup.
    pub fn lookup_address_async(
        &self,
        addr: SocketAddr,
        cancel: Option<&CancelToken>,
    ) -> Lookup<ResolvedAddress> {
        self.submit(Query::Address(addr), cancel)
    }

    /// Resolves the targets of `_service._protocol.domain` in the order they
    /// should be tried, blocking until done.
    pub fn lookup_service(
        &self,
        service: &str,
        protocol: &str,
        domain: &str,
    ) -> Result<TargetSet, Error> {
        self.lookup_service_async(service, protocol, domain, None)
            .wait()
    }

    /// Starts resolving the targets of `_service._protocol.domain`.
    /// Cancelling `cancel` cancels the lookup.
    pub fn lookup_service_async(
        &self,
        service: &str,
        protocol: &str,
        domain: &str,
        cancel: Option<&CancelToken>,
    ) -> Lookup<TargetSet> {
        self.submit(
            Query::Service(ServiceQuery::new(service, protocol, domain)),
            cancel,
        )
    }

    fn submit<T: FromOutcome>(&self, query: Query, cancel: Option<&CancelToken>) -> Lookup<T> {
        let request = Request::new(query, self.backend.dispatcher());
        self.backend.submit(request.clone(), cancel);
        Lookup::new(request)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

#[async_trait]
impl Resolve for Resolver {
    async fn lookup_name(&self, hostname: &str, port: u16) -> Result<ResolvedAddress, Error> {
        self.lookup_name_async(hostname, port, None).await
    }

    async fn lookup_address(&self, addr: SocketAddr) -> Result<ResolvedAddress, Error> {
        self.lookup_address_async(addr, None).await
    }

    async fn lookup_service_unordered(&self, srv_name: &str) -> Result<Vec<ServiceTarget>, Error> {
        let query = ServiceQuery::from_name(srv_name).unordered();
        let targets: TargetSet = self.submit(Query::Service(query), None).await?;
        Ok(targets.into_iter().collect())
    }

    async fn lookup_service(&self, srv_name: &str) -> Result<TargetSet, Error> {
        self.submit(Query::Service(ServiceQuery::from_name(srv_name)), None)
            .await
    }
}

static DEFAULT_RESOLVER: OnceLock<ArcSwap<Resolver>> = OnceLock::new();

fn default_slot() -> &'static ArcSwap<Resolver> {
    DEFAULT_RESOLVER.get_or_init(|| ArcSwap::from_pointee(Resolver::new()))
}

/// Gets the process-wide resolver, creating it on first use.
pub fn default_resolver() -> Arc<Resolver> {
    default_slot().load_full()
}

/// Replaces the process-wide resolver, returning the previous one.
///
/// Lookups already started on the previous resolver are unaffected.
pub fn set_default_resolver(resolver: Resolver) -> Arc<Resolver> {
    default_slot().swap(Arc::new(resolver))
}
