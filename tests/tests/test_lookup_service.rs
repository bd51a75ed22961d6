use std::time::{Duration, Instant};

use resolv_pool::{ErrorKind, Resolve, SrvRecord};

use crate::harness::{resolver_for, MockSrv, Zone};

const LDAP: &str = "_ldap._tcp.example.com";

static LDAP_RECORDS: &[MockSrv] = &[
    MockSrv::new(LDAP, 10, 0, 389, "c.example.com", 600),
    MockSrv::new(LDAP, 0, 100, 389, "b.example.com", 300),
    MockSrv::new(LDAP, 0, 0, 389, "a.example.com", 300),
];

#[test]
fn targets_are_ordered() {
    let server = Zone {
        srv: LDAP_RECORDS,
        ..Default::default()
    }
    .serve();
    let resolver = resolver_for(&server);

    let before = Instant::now();
    let targets = resolver.lookup_service("ldap", "tcp", "example.com").unwrap();
    let hosts: Vec<_> = targets.iter().map(|t| t.hostname.as_str()).collect();
    assert_eq!(hosts, ["a.example.com", "b.example.com", "c.example.com"]);
    assert!(targets.iter().all(|t| t.port == 389));

    let expires_at = targets.expires_at().unwrap();
    assert!(expires_at >= before + Duration::from_secs(300));
    assert!(expires_at <= Instant::now() + Duration::from_secs(300));

    let uri = targets.targets()[0].parse("ldap", "/").unwrap();
    assert_eq!(uri.to_string(), "ldap://a.example.com:389/");
}

#[tokio::test]
async fn targets_can_be_awaited() {
    let server = Zone {
        srv: LDAP_RECORDS,
        ..Default::default()
    }
    .serve();
    let resolver = resolver_for(&server);

    let targets = resolver
        .lookup_service_async("ldap", "tcp", "example.com", None)
        .await
        .unwrap();
    assert_eq!(targets.len(), 3);
    assert_eq!(targets.targets()[2].hostname, "c.example.com");
}

#[tokio::test]
async fn concurrent_lookups_share_the_pool() {
    let server = Zone {
        srv: LDAP_RECORDS,
        ..Default::default()
    }
    .serve();
    let resolver = resolver_for(&server);

    let lookups = (0..16).map(|_| resolver.lookup_service_async("ldap", "tcp", "example.com", None));
    let results = futures::future::join_all(lookups).await;
    assert!(results.iter().all(|result| matches!(result, Ok(targets) if targets.len() == 3)));
    assert_eq!(server.udp_queries(), 16);
}

#[test]
fn root_target_means_no_service() {
    static RECORDS: &[MockSrv] = &[MockSrv::new("_xmpp._tcp.example.com", 0, 0, 0, ".", 60)];
    let server = Zone {
        srv: RECORDS,
        ..Default::default()
    }
    .serve();

    let targets = resolver_for(&server)
        .lookup_service("xmpp", "tcp", "example.com")
        .unwrap();
    assert!(targets.is_empty());
    assert_eq!(targets.expires_at(), None);
}

#[tokio::test]
async fn unordered_targets_keep_response_order() {
    static RECORDS: &[MockSrv] = &[
        MockSrv::new(LDAP, 10, 0, 389, "c.example.com", 600),
        MockSrv::new(LDAP, 0, 100, 389, "b.example.com", 300),
        MockSrv::new("_xmpp._tcp.example.com", 0, 0, 0, ".", 60),
    ];
    let server = Zone {
        srv: RECORDS,
        ..Default::default()
    }
    .serve();
    let resolver = resolver_for(&server);

    let targets = resolver.lookup_service_unordered(LDAP).await.unwrap();
    let hosts: Vec<_> = targets.iter().map(|t| t.hostname.as_str()).collect();
    assert_eq!(hosts, ["c.example.com", "b.example.com"]);

    let root = resolver
        .lookup_service_unordered("_xmpp._tcp.example.com")
        .await
        .unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].hostname, ".");
}

#[test]
fn unknown_service_is_not_found() {
    let server = Zone {
        srv: LDAP_RECORDS,
        ..Default::default()
    }
    .serve();

    let err = resolver_for(&server)
        .lookup_service("kerberos", "udp", "example.com")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("_kerberos._udp.example.com"), "{}", err);
}

#[test]
fn server_failure_is_temporary() {
    let server = Zone {
        servfail: &[LDAP],
        ..Default::default()
    }
    .serve();

    let err = resolver_for(&server)
        .lookup_service("ldap", "tcp", "example.com")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TemporaryFailure);
}

#[test]
fn truncated_answer_is_retried_over_tcp() {
    let server = Zone {
        srv: LDAP_RECORDS,
        truncate_udp: &[LDAP],
        ..Default::default()
    }
    .serve();

    let targets = resolver_for(&server)
        .lookup_service("ldap", "tcp", "example.com")
        .unwrap();
    assert_eq!(targets.len(), 3);
    assert_eq!(server.udp_queries(), 1);
}
