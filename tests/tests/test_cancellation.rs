use std::net::UdpSocket;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use resolv_pool::{CancelToken, Error, PoolConfig, Resolver};

/// Resolver whose only nameserver never answers.
fn silent_resolver() -> (UdpSocket, Resolver) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let resolver = Resolver::with_config(
        PoolConfig::default()
            .nameservers([socket.local_addr().unwrap()])
            .timeout(Duration::from_secs(5))
            .attempts(1),
    );
    (socket, resolver)
}

#[test]
fn timeout_token_cancels_pending_lookup() {
    let (_socket, resolver) = silent_resolver();
    let token = CancelToken::with_timeout(Duration::from_millis(100));

    let started = Instant::now();
    let result = resolver
        .lookup_service_async("ldap", "tcp", "example.com", Some(&token))
        .wait();
    assert_eq!(result, Err(Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn cancelled_lookup_notifies_callback_once() {
    let (_socket, resolver) = silent_resolver();
    let token = CancelToken::new();
    let (tx, rx) = mpsc::channel();
    resolver
        .lookup_address_async("192.0.2.1:0".parse().unwrap(), Some(&token))
        .on_complete(move |result| tx.send(result.map(|_| ())).unwrap());

    assert!(token.cancel());
    assert!(!token.cancel());
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        Err(Error::Cancelled)
    );
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[tokio::test]
async fn cancel_handle_wakes_future() {
    let (_socket, resolver) = silent_resolver();
    let lookup = resolver.lookup_service_async("ldap", "tcp", "example.com", None);
    assert!(!lookup.is_completed());
    assert!(lookup.cancel());
    assert!(lookup.is_completed());
    assert_eq!(lookup.await, Err(Error::Cancelled));
}

#[tokio::test]
async fn cancelling_from_another_task() {
    let (_socket, resolver) = silent_resolver();
    let token = CancelToken::new();
    let lookup = resolver.lookup_service_async("ldap", "tcp", "example.com", Some(&token));

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel()
    });
    assert_eq!(lookup.await, Err(Error::Cancelled));
    assert!(canceller.await.unwrap());
}
