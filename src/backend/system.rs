//! Resolver primitives backed by the operating system.

use super::{Primitives, ResolverError};
use crate::{config::PoolConfig, srv::decode_ptr};
use hickory_proto::{
    op::{Header, Message, MessageType, OpCode, Query as DnsQuery, ResponseCode},
    rr::{Name, RecordType},
    serialize::binary::{BinDecodable, BinEncodable},
};
use rand::Rng;
use std::{
    io::{self, Read, Write},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket},
    sync::OnceLock,
    time::{Duration, Instant},
};

/// Largest message a UDP response can carry.
const MAX_UDP_MESSAGE: usize = 65535;

/// Blocking primitives: `getaddrinfo` for forward lookups, and DNS messages
/// exchanged with the nameservers for raw queries and reverse lookups.
///
/// Raw queries go over UDP and are retried over TCP when the answer is
/// truncated. Each nameserver is tried in turn, `attempts` times over, waiting
/// `timeout` for each answer.
#[derive(Debug)]
pub struct SystemPrimitives {
    config: PoolConfig,
    system_nameservers: OnceLock<Result<Vec<SocketAddr>, String>>,
}

impl SystemPrimitives {
    /// Creates primitives using the nameservers of `config`, or the system
    /// configuration if it lists none.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            system_nameservers: OnceLock::new(),
        }
    }

    fn nameservers(&self) -> Result<&[SocketAddr], ResolverError> {
        if !self.config.nameservers.is_empty() {
            return Ok(&self.config.nameservers);
        }
        self.system_nameservers
            .get_or_init(read_system_nameservers)
            .as_deref()
            .map_err(|e| ResolverError::Io(e.clone()))
    }

    fn exchange(&self, nameserver: SocketAddr, request: &[u8], id: u16) -> io::Result<Vec<u8>> {
        let response = exchange_udp(nameserver, request, id, self.config.timeout)?;
        match Header::from_bytes(&response) {
            Ok(header) if header.truncated() => {
                #[cfg(feature = "log")]
                tracing::trace!(%nameserver, "truncated answer, retrying over tcp");
                exchange_tcp(nameserver, request, id, self.config.timeout)
            }
            _ => Ok(response),
        }
    }
}

impl Default for SystemPrimitives {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl Primitives for SystemPrimitives {
    fn lookup_host(&self, hostname: &str, port: u16) -> Result<Vec<SocketAddr>, ResolverError> {
        (hostname, port)
            .to_socket_addrs()
            .map(|addrs| addrs.collect())
            .map_err(classify_gai_error)
    }

    fn lookup_addr(&self, addr: IpAddr) -> Result<String, ResolverError> {
        let name = Name::from(addr).to_ascii();
        let response = self.query(&name, RecordType::PTR)?;
        match decode_ptr(&response) {
            Ok(Some(hostname)) => Ok(hostname),
            Ok(None) => Err(ResolverError::NoData),
            Err(e) => Err(ResolverError::Io(format!("malformed PTR answer: {}", e))),
        }
    }

    fn query(&self, name: &str, record_type: RecordType) -> Result<Vec<u8>, ResolverError> {
        let qname = if name.is_ascii() {
            Name::from_ascii(name)
        } else {
            Name::from_utf8(name)
        }
        .map_err(|_| ResolverError::HostNotFound)?;

        let id: u16 = rand::rng().random();
        let mut message = Message::new();
        message
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(DnsQuery::query(qname, record_type));
        let request = message
            .to_bytes()
            .map_err(|e| ResolverError::Io(e.to_string()))?;

        let nameservers = self.nameservers()?;
        let mut last_error = ResolverError::TryAgain;
        for _attempt in 0..self.config.attempts {
            for &nameserver in nameservers {
                #[cfg(feature = "log")]
                tracing::trace!(%nameserver, name, attempt = _attempt, "sending query");
                let response = match self.exchange(nameserver, &request, id) {
                    Ok(response) => response,
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                    Err(e) => {
                        last_error = ResolverError::Io(e.to_string());
                        continue;
                    }
                };
                match check_response(response) {
                    // Another server may still answer
                    Err(e @ ResolverError::TryAgain) | Err(e @ ResolverError::NoRecovery) => {
                        last_error = e
                    }
                    result => return result,
                }
            }
        }
        Err(last_error)
    }
}

/// Reads the nameservers from the system resolver configuration.
fn read_system_nameservers() -> Result<Vec<SocketAddr>, String> {
    let (config, _) = hickory_resolver::system_conf::read_system_conf()
        .map_err(|e| format!("reading system resolver configuration: {}", e))?;
    let mut nameservers: Vec<SocketAddr> = config
        .name_servers()
        .iter()
        .map(|ns| ns.socket_addr)
        .collect();
    // Each server is listed once per protocol
    nameservers.dedup();
    if nameservers.is_empty() {
        return Err("no nameservers configured".into());
    }
    Ok(nameservers)
}

/// Maps the response code of an answer the way `res_query` sets `h_errno`.
fn check_response(response: Vec<u8>) -> Result<Vec<u8>, ResolverError> {
    let header = Header::from_bytes(&response)
        .map_err(|e| ResolverError::Io(format!("malformed answer: {}", e)))?;
    match header.response_code() {
        ResponseCode::NoError if header.answer_count() == 0 => Err(ResolverError::NoData),
        ResponseCode::NoError => Ok(response),
        ResponseCode::NXDomain => Err(ResolverError::HostNotFound),
        ResponseCode::ServFail => Err(ResolverError::TryAgain),
        _ => Err(ResolverError::NoRecovery),
    }
}

fn exchange_udp(
    nameserver: SocketAddr,
    request: &[u8],
    id: u16,
    timeout: Duration,
) -> io::Result<Vec<u8>> {
    let local: SocketAddr = match nameserver {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local)?;
    socket.connect(nameserver)?;
    socket.send(request)?;

    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; MAX_UDP_MESSAGE];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        socket.set_read_timeout(Some(remaining))?;
        let len = match socket.recv(&mut buf) {
            Ok(len) => len,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Err(io::ErrorKind::TimedOut.into())
            }
            Err(e) => return Err(e),
        };
        if is_answer_to(&buf[..len], id) {
            buf.truncate(len);
            return Ok(buf);
        }
        // Stray datagram: keep waiting for ours
    }
}

fn exchange_tcp(
    nameserver: SocketAddr,
    request: &[u8],
    id: u16,
    timeout: Duration,
) -> io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect_timeout(&nameserver, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let len = u16::try_from(request.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "query too large"))?;
    let mut framed = Vec::with_capacity(request.len() + 2);
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(request);
    stream.write_all(&framed)?;

    let mut len = [0u8; 2];
    stream.read_exact(&mut len)?;
    let mut response = vec![0u8; u16::from_be_bytes(len) as usize];
    stream.read_exact(&mut response)?;
    if !is_answer_to(&response, id) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "answer does not match query",
        ));
    }
    Ok(response)
}

/// Returns `true` if `msg` is a response carrying the query's `id`.
fn is_answer_to(msg: &[u8], id: u16) -> bool {
    match Header::from_bytes(msg) {
        Ok(header) => header.id() == id && header.message_type() == MessageType::Response,
        Err(_) => false,
    }
}

/// Sorts `getaddrinfo` failures.
///
/// std reports `EAI_*` codes only through the `gai_strerror` text, so they are
/// told apart by matching the English messages of glibc, musl and the BSDs.
/// Messages in another wording end up as [`ResolverError::Io`]. `EAI_SYSTEM`
/// failures carry an OS error and are classified by it first.
fn classify_gai_error(err: io::Error) -> ResolverError {
    if err.raw_os_error().is_some() {
        return match err.kind() {
            io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                ResolverError::TryAgain
            }
            _ => ResolverError::Io(err.to_string()),
        };
    }
    match err.kind() {
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            return ResolverError::TryAgain
        }
        io::ErrorKind::InvalidInput => return ResolverError::HostNotFound,
        _ => {}
    }
    let msg = err.to_string().to_lowercase();
    if msg.contains("temporary failure") || msg.contains("try again") {
        ResolverError::TryAgain
    } else if msg.contains("no address associated") {
        ResolverError::NoData
    } else if msg.contains("not known") || msg.contains("not found") || msg.contains("no such host") {
        ResolverError::HostNotFound
    } else {
        ResolverError::Io(err.to_string())
    }
}
