//! Results of forward and reverse lookups.

use hickory_proto::rr::Name;
use std::{
    fmt,
    net::{IpAddr, SocketAddr},
    sync::OnceLock,
};

/// Hostname and ordered socket addresses produced by a lookup.
///
/// A hostname is kept in two forms: the Unicode *display* form and the
/// ASCII-compatible encoding (ACE, e.g. `xn--bcher-kva.example`). Only one of
/// them is known when the result is built; the other is derived on first
/// access and cached.
///
/// Socket addresses must be tried in the order they are listed.
#[derive(Clone)]
pub struct ResolvedAddress {
    hostname: Option<Hostname>,
    port: u16,
    sockaddrs: Vec<SocketAddr>,
}

#[derive(Clone)]
struct Hostname {
    display: OnceLock<String>,
    ascii: OnceLock<String>,
}

impl Hostname {
    fn from_display(display: String) -> Self {
        Self {
            display: OnceLock::from(display),
            ascii: OnceLock::new(),
        }
    }

    fn from_ascii(ascii: String) -> Self {
        Self {
            display: OnceLock::new(),
            ascii: OnceLock::from(ascii),
        }
    }

    fn display(&self) -> &str {
        self.display.get_or_init(|| match self.ascii.get() {
            Some(ascii) => display_form(ascii),
            None => String::new(),
        })
    }

    fn ascii(&self) -> &str {
        self.ascii.get_or_init(|| match self.display.get() {
            Some(display) => ascii_form(display).unwrap_or_else(|| display.clone()),
            None => String::new(),
        })
    }
}

impl ResolvedAddress {
    /// Result for a literal IP address: one socket address and no hostname.
    pub fn literal(addr: SocketAddr) -> Self {
        Self {
            hostname: None,
            port: addr.port(),
            sockaddrs: vec![addr],
        }
    }

    /// Result whose authoritative hostname is the Unicode display form.
    pub fn from_display(display: impl Into<String>, port: u16, sockaddrs: Vec<SocketAddr>) -> Self {
        Self {
            hostname: Some(Hostname::from_display(display.into())),
            port,
            sockaddrs,
        }
    }

    /// Result whose authoritative hostname is the ASCII-compatible form.
    pub fn from_ascii(ascii: impl Into<String>, port: u16, sockaddrs: Vec<SocketAddr>) -> Self {
        Self {
            hostname: Some(Hostname::from_ascii(ascii.into())),
            port,
            sockaddrs,
        }
    }

    /// Result for a hostname given by a caller, picking the authoritative form
    /// from whether it is pure ASCII.
    pub fn from_hostname(hostname: &str, port: u16, sockaddrs: Vec<SocketAddr>) -> Self {
        if hostname.is_ascii() {
            Self::from_ascii(hostname, port, sockaddrs)
        } else {
            Self::from_display(hostname, port, sockaddrs)
        }
    }

    /// Gets the hostname in display (Unicode) form.
    ///
    /// The ASCII-compatible form is returned instead when it does not survive
    /// an ASCII to Unicode to ASCII round-trip or decodes to control characters.
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_ref().map(Hostname::display)
    }

    /// Gets the hostname in ASCII-compatible form.
    pub fn ascii_hostname(&self) -> Option<&str> {
        self.hostname.as_ref().map(Hostname::ascii)
    }

    /// Gets the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Gets the socket addresses in the order they should be tried.
    pub fn sockaddrs(&self) -> &[SocketAddr] {
        &self.sockaddrs
    }

    /// Iterates over the IP addresses, in order.
    pub fn ips(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.sockaddrs.iter().map(SocketAddr::ip)
    }

    /// Consumes the result, returning the socket addresses.
    pub fn into_sockaddrs(self) -> Vec<SocketAddr> {
        self.sockaddrs
    }
}

impl fmt::Debug for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedAddress")
            .field("hostname", &self.hostname())
            .field("port", &self.port)
            .field("sockaddrs", &self.sockaddrs)
            .finish()
    }
}

impl PartialEq for ResolvedAddress {
    fn eq(&self, other: &Self) -> bool {
        self.port == other.port
            && self.sockaddrs == other.sockaddrs
            && self.ascii_hostname() == other.ascii_hostname()
    }
}

impl Eq for ResolvedAddress {}

impl IntoIterator for ResolvedAddress {
    type Item = SocketAddr;
    type IntoIter = std::vec::IntoIter<SocketAddr>;

    fn into_iter(self) -> Self::IntoIter {
        self.sockaddrs.into_iter()
    }
}

/// Converts a hostname to its ASCII-compatible encoding, or `None` if it is not
/// a valid (internationalized) domain name.
pub(crate) fn ascii_form(hostname: &str) -> Option<String> {
    if hostname.is_ascii() {
        return Some(hostname.to_owned());
    }
    Name::from_utf8(hostname).ok().map(|name| name.to_ascii())
}

/// Converts an ASCII-compatible hostname to the form shown to users.
fn display_form(ascii: &str) -> String {
    let display = match Name::from_ascii(ascii) {
        Ok(name) => name.to_utf8(),
        Err(_) => return ascii.to_owned(),
    };
    let round_trips = Name::from_utf8(&display)
        .map(|name| name.to_ascii().eq_ignore_ascii_case(ascii))
        .unwrap_or(false);
    if round_trips && !display.chars().any(char::is_control) {
        display
    } else {
        ascii.to_owned()
    }
}
