use hickory_resolver::{
    config::{NameServerConfigGroup, ResolverConfig},
    name_server::TokioConnectionProvider,
    Resolver,
};
use resolv_pool::{ErrorKind, Resolve};

use crate::harness::{dns_server::DnsServerHandle, MockPtr, MockSrv, Zone};

static RECORDS: &[MockSrv] = &[
    MockSrv::new("_ldap._tcp.example.com", 1, 0, 389, "b.example.com", 60),
    MockSrv::new("_ldap._tcp.example.com", 0, 0, 389, "a.example.com", 60),
    MockSrv::new("_xmpp._tcp.example.com", 0, 0, 0, ".", 60),
];

static PTR_RECORDS: &[MockPtr] = &[MockPtr::new("192.0.2.10", "ldap.example.com", 60)];

fn hickory_for(server: &DnsServerHandle) -> Resolver<TokioConnectionProvider> {
    let addr = server.addr();
    let config = ResolverConfig::from_parts(
        None,
        vec![],
        NameServerConfigGroup::from_ips_clear(&[addr.ip()], addr.port(), true),
    );
    Resolver::builder_with_config(config, TokioConnectionProvider::default()).build()
}

fn zone() -> Zone {
    Zone {
        srv: RECORDS,
        ptr: PTR_RECORDS,
        ..Default::default()
    }
}

#[tokio::test]
async fn hickory_orders_targets() {
    let server = zone().serve();
    let resolver = hickory_for(&server);

    let targets = resolver
        .lookup_service("_ldap._tcp.example.com.")
        .await
        .unwrap();
    let hosts: Vec<_> = targets.iter().map(|t| t.hostname.as_str()).collect();
    assert_eq!(hosts, ["a.example.com", "b.example.com"]);

    let unordered = resolver
        .lookup_service_unordered("_ldap._tcp.example.com.")
        .await
        .unwrap();
    assert_eq!(unordered.len(), 2);
}

#[tokio::test]
async fn hickory_root_target_is_empty() {
    let server = zone().serve();
    let targets = hickory_for(&server)
        .lookup_service("_xmpp._tcp.example.com.")
        .await
        .unwrap();
    assert!(targets.is_empty());
}

#[tokio::test]
async fn hickory_reverse_lookup() {
    let server = zone().serve();
    let resolved = hickory_for(&server)
        .lookup_address("192.0.2.10:389".parse().unwrap())
        .await
        .unwrap();
    assert_eq!(resolved.hostname(), Some("ldap.example.com"));
}

#[tokio::test]
async fn hickory_missing_service_is_not_found() {
    let server = zone().serve();
    let err = hickory_for(&server)
        .lookup_service("_kerberos._udp.example.com.")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn hickory_server_failure_is_temporary() {
    let server = Zone {
        servfail: &["_ldap._tcp.example.com"],
        ..zone()
    }
    .serve();
    let err = hickory_for(&server)
        .lookup_service("_ldap._tcp.example.com.")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TemporaryFailure, "{}", err);
}
