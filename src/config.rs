//! Resolver configuration.

use std::{net::SocketAddr, time::Duration};

/// Configuration of the worker pool and of the system resolver primitives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub(crate) max_workers: usize,
    pub(crate) idle_timeout: Duration,
    pub(crate) nameservers: Vec<SocketAddr>,
    pub(crate) timeout: Duration,
    pub(crate) attempts: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            idle_timeout: Duration::from_secs(15),
            nameservers: Vec::new(),
            timeout: Duration::from_secs(5),
            attempts: 2,
        }
    }
}

impl PoolConfig {
    /// Sets the maximum number of worker threads. At least one worker is
    /// always allowed.
    pub fn max_workers(self, max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            ..self
        }
    }

    /// Sets how long an idle worker waits for work before exiting.
    pub fn idle_timeout(self, idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            ..self
        }
    }

    /// Sets the nameservers raw queries are sent to. When empty, the system
    /// configuration (`/etc/resolv.conf`) is used.
    pub fn nameservers(self, nameservers: impl IntoIterator<Item = SocketAddr>) -> Self {
        Self {
            nameservers: nameservers.into_iter().collect(),
            ..self
        }
    }

    /// Sets how long to wait for each nameserver to answer.
    pub fn timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Sets how many times every nameserver is tried before giving up.
    pub fn attempts(self, attempts: usize) -> Self {
        Self {
            attempts: attempts.max(1),
            ..self
        }
    }

    /// Gets the maximum number of worker threads.
    pub fn get_max_workers(&self) -> usize {
        self.max_workers
    }

    /// Gets the configured nameservers.
    pub fn get_nameservers(&self) -> &[SocketAddr] {
        &self.nameservers
    }
}
