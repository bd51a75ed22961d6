//! Minimal mock DNS server answering SRV and PTR queries.

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hickory_proto::{
    op::{Message, MessageType, OpCode, ResponseCode},
    rr::{
        rdata::{PTR, SRV},
        Name, RData, Record, RecordType,
    },
    serialize::binary::{BinDecodable, BinEncodable},
};

use crate::harness::Zone;

/// A minimal DNS server listening on UDP and TCP on the same loopback port.
pub struct DnsServer {
    zone: Zone,
    shutdown_handle: ShutdownHandle,
    udp_queries: Arc<AtomicUsize>,
}

impl DnsServer {
    /// Start the server in background threads.
    pub fn spawn(zone: Zone) -> io::Result<DnsServerHandle> {
        let (udp, tcp) = Self::bind()?;
        let addr = udp.local_addr()?;
        udp.set_read_timeout(Some(Duration::from_millis(50)))?;
        tcp.set_nonblocking(true)?;

        let shutdown_handle = ShutdownHandle(Arc::new(AtomicBool::new(false)));
        let udp_queries = Arc::new(AtomicUsize::new(0));
        let this = Arc::new(Self {
            zone,
            shutdown_handle: shutdown_handle.clone(),
            udp_queries: udp_queries.clone(),
        });
        let udp_thread = {
            let this = this.clone();
            thread::spawn(move || this.serve_udp(udp))
        };
        let tcp_thread = thread::spawn(move || this.serve_tcp(tcp));
        println!("mock DNS server started on {addr}");

        Ok(DnsServerHandle {
            addr,
            shutdown_handle,
            udp_queries,
            join_handles: vec![udp_thread, tcp_thread],
        })
    }

    /// Binds a UDP socket on an ephemeral port and a TCP listener on the same
    /// port, retrying if the port is taken for TCP.
    fn bind() -> io::Result<(UdpSocket, TcpListener)> {
        let mut last_error = None;
        for _ in 0..16 {
            let udp = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))?;
            match TcpListener::bind(udp.local_addr()?) {
                Ok(tcp) => return Ok((udp, tcp)),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| io::ErrorKind::AddrInUse.into()))
    }

    fn serve_udp(&self, socket: UdpSocket) -> io::Result<()> {
        let mut buf = [0u8; 512];
        while !self.shutdown_handle.is_shutdown() {
            let (len, src) = match socket.recv_from(&mut buf) {
                Ok(result) => result,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.udp_queries.fetch_add(1, Ordering::SeqCst);

            if let Ok(response) = self.handle_query(&buf[..len], true) {
                let _ = socket.send_to(&response, src);
            }
        }
        Ok(())
    }

    fn serve_tcp(&self, listener: TcpListener) -> io::Result<()> {
        while !self.shutdown_handle.is_shutdown() {
            match listener.accept() {
                Ok((stream, _)) => {
                    let _ = self.handle_stream(stream);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn handle_stream(&self, mut stream: TcpStream) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(Duration::from_secs(1)))?;
        let mut len = [0u8; 2];
        stream.read_exact(&mut len)?;
        let mut query = vec![0u8; u16::from_be_bytes(len) as usize];
        stream.read_exact(&mut query)?;

        let response = self
            .handle_query(&query, false)
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidData))?;
        stream.write_all(&(response.len() as u16).to_be_bytes())?;
        stream.write_all(&response)
    }

    fn handle_query(&self, query_bytes: &[u8], udp: bool) -> Result<Vec<u8>, ()> {
        let query = Message::from_bytes(query_bytes).map_err(|_| ())?;

        let mut response = Message::new();
        response.set_id(query.id());
        response.set_message_type(MessageType::Response);
        response.set_op_code(OpCode::Query);
        response.set_authoritative(true);
        response.set_recursion_desired(query.recursion_desired());
        response.set_recursion_available(false);

        let mut known = false;
        for question in query.queries() {
            response.add_query(question.clone());
            let qname = normalize_name(&question.name().to_string());
            if self.zone.servfail.iter().any(|name| normalize_name(name) == qname) {
                response.set_response_code(ResponseCode::ServFail);
                return response.to_bytes().map_err(|_| ());
            }
            if udp && self.zone.truncate_udp.iter().any(|name| normalize_name(name) == qname) {
                response.set_truncated(true);
                return response.to_bytes().map_err(|_| ());
            }

            let answers: Vec<Record> = match question.query_type() {
                RecordType::SRV => self
                    .zone
                    .srv
                    .iter()
                    .filter(|srv| normalize_name(srv.name) == qname)
                    .filter_map(|srv| create_srv_record(srv, question.name().clone()).ok())
                    .collect(),
                RecordType::PTR => self
                    .zone
                    .ptr
                    .iter()
                    .filter(|ptr| normalize_name(&reverse_name(ptr.ip).to_string()) == qname)
                    .filter_map(|ptr| create_ptr_record(ptr, question.name().clone()).ok())
                    .collect(),
                _ => Vec::new(),
            };
            known |= self.zone.exists(&qname);
            response.add_answers(answers);
        }

        if response.answers().is_empty() && !known {
            response.set_response_code(ResponseCode::NXDomain);
        }

        response.to_bytes().map_err(|_| ())
    }
}

/// Normalize a DNS name for comparison (lowercase, no trailing dot).
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase().trim_end_matches('.').to_string()
}

/// The `in-addr.arpa` or `ip6.arpa` name of an address.
pub fn reverse_name(ip: &str) -> Name {
    let ip: IpAddr = ip.parse().expect("invalid mock PTR address");
    Name::from(ip)
}

fn create_srv_record(srv: &super::MockSrv, name: Name) -> Result<Record, ()> {
    let target = Name::from_utf8(srv.target).map_err(|_| ())?;
    let srv_rdata = SRV::new(srv.priority, srv.weight, srv.port, target);
    Ok(Record::from_rdata(name, srv.ttl, RData::SRV(srv_rdata)))
}

fn create_ptr_record(ptr: &super::MockPtr, name: Name) -> Result<Record, ()> {
    let target = Name::from_utf8(ptr.target).map_err(|_| ())?;
    Ok(Record::from_rdata(name, ptr.ttl, RData::PTR(PTR(target))))
}

/// Handle for the mock DNS server that shuts it down when dropped.
pub struct DnsServerHandle {
    addr: SocketAddr,
    shutdown_handle: ShutdownHandle,
    udp_queries: Arc<AtomicUsize>,
    join_handles: Vec<JoinHandle<io::Result<()>>>,
}

impl DnsServerHandle {
    /// Address the server listens on, for both UDP and TCP.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of UDP datagrams received so far.
    pub fn udp_queries(&self) -> usize {
        self.udp_queries.load(Ordering::SeqCst)
    }
}

impl Drop for DnsServerHandle {
    fn drop(&mut self) {
        self.shutdown_handle.shutdown();
        for handle in self.join_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Handle for shutting down a running mock DNS server.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    /// Signal the server to shut down.
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` if a shutdown has been requested.
    fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
