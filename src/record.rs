//! SRV records.

use http::uri::{PathAndQuery, Scheme, Uri};
use std::{convert::TryInto, fmt::Display, time::Instant};

/// Representation of types that contain the fields of a SRV record.
pub trait SrvRecord {
    /// Type representing the SRV record's target. Must implement `Display` so
    /// it can be used to create a `Uri`.
    type Target: Display + ?Sized;

    /// Gets a SRV record's target.
    fn target(&self) -> &Self::Target;

    /// Gets a SRV record's port.
    fn port(&self) -> u16;

    /// Gets a SRV record's priority.
    fn priority(&self) -> u16;

    /// Gets a SRV record's weight.
    fn weight(&self) -> u16;

    /// Parses a SRV record into a URI with a given scheme (e.g. https) and
    /// `path_and_query` (used as a suffix in the URI).
    ///
    /// ```
    /// # fn srv_record_parse() -> Result<(), http::Error> {
    /// use resolv_pool::{ServiceTarget, SrvRecord};
    /// use std::time::Instant;
    /// let target = ServiceTarget {
    ///     hostname: String::from("ldap1.example.com"),
    ///     port: 636,
    ///     priority: 1,
    ///     weight: 100,
    ///     expires_at: Instant::now(),
    /// };
    /// assert_eq!(
    ///     &target.parse("https", "/")?.to_string(),
    ///     "https://ldap1.example.com:636/"
    /// );
    /// # Ok(())
    /// # }
    /// # srv_record_parse().unwrap();
    /// ```
    fn parse(
        &self,
        scheme: impl TryInto<Scheme, Error = impl Into<http::Error>>,
        path_and_query: impl TryInto<PathAndQuery, Error = impl Into<http::Error>>,
    ) -> Result<Uri, http::Error> {
        let scheme: Scheme = scheme.try_into().map_err(Into::into)?;
        let path_and_query: PathAndQuery = path_and_query.try_into().map_err(Into::into)?;
        Uri::builder()
            .scheme(scheme)
            .path_and_query(path_and_query)
            .authority(format!("{}:{}", self.target(), self.port()).as_str())
            .build()
    }
}

/// A host and port offering a service, as found in one SRV record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceTarget {
    /// Host offering the service.
    pub hostname: String,
    /// Port the service listens on.
    pub port: u16,
    /// Lower values are tried first.
    pub priority: u16,
    /// Relative likelihood of being tried first among same-priority targets.
    pub weight: u16,
    /// Time after which the record should no longer be used.
    pub expires_at: Instant,
}

impl SrvRecord for ServiceTarget {
    type Target = str;

    fn target(&self) -> &Self::Target {
        &self.hostname
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn priority(&self) -> u16 {
        self.priority
    }

    fn weight(&self) -> u16 {
        self.weight
    }
}

/// Targets of a service in the order they should be tried.
///
/// An empty set is a valid answer: it means the service is explicitly not
/// offered by the domain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetSet {
    targets: Vec<ServiceTarget>,
}

impl TargetSet {
    /// Wraps already ordered targets.
    pub fn new(targets: Vec<ServiceTarget>) -> Self {
        Self { targets }
    }

    /// Gets the targets in order.
    pub fn targets(&self) -> &[ServiceTarget] {
        &self.targets
    }

    /// Returns `true` if the service is not offered.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Gets the number of targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Iterates over the targets in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ServiceTarget> {
        self.targets.iter()
    }

    /// Earliest expiry among the targets, `None` for an empty set.
    pub fn expires_at(&self) -> Option<Instant> {
        self.targets.iter().map(|target| target.expires_at).min()
    }
}

impl IntoIterator for TargetSet {
    type Item = ServiceTarget;
    type IntoIter = std::vec::IntoIter<ServiceTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.into_iter()
    }
}

impl<'a> IntoIterator for &'a TargetSet {
    type Item = &'a ServiceTarget;
    type IntoIter = std::slice::Iter<'a, ServiceTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}
