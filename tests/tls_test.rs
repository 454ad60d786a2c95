//! TLS Transport Tests
//!
//! Covers:
//! - Verified handshake against an explicitly trusted root
//! - Untrusted certificates and hostname mismatches fail the connect
//! - Read loops over TLS

use boring::asn1::Asn1Time;
use boring::bn::BigNum;
use boring::hash::MessageDigest;
use boring::pkey::{PKey, Private};
use boring::rsa::Rsa;
use boring::ssl::{SslAcceptor, SslMethod};
use boring::x509::extension::SubjectAlternativeName;
use boring::x509::{X509NameBuilder, X509};
use std::io::Write;
use tokio_tungstenite::tungstenite;
use wsnet::base::neterror::NetError;
use wsnet::socket::connectjob::ConnectJob;
use wsnet::socket::endpoint::Endpoint;
use wsnet::socket::reader::{read_until, ReadOptions};
use wsnet::socket::tls::TlsConfig;
use wsnet::ws::{Reply, WebSocket, WebSocketBuilder};

/// Self-signed certificate valid for `localhost` only.
fn self_signed() -> (X509, PKey<Private>) {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "localhost").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(1).unwrap())
        .unwrap();
    let san = SubjectAlternativeName::new()
        .dns("localhost")
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(san).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (builder.build(), key)
}

fn acceptor(cert: &X509, key: &PKey<Private>) -> SslAcceptor {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_private_key(key).unwrap();
    acceptor.set_certificate(cert).unwrap();
    acceptor.build()
}

/// Blocking TLS WebSocket echo server for one connection.
fn spawn_tls_echo_server(cert: &X509, key: &PKey<Private>) -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let acceptor = acceptor(cert, key);

    std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let Ok(tls) = acceptor.accept(stream) else {
            return;
        };
        let Ok(mut ws) = tungstenite::accept(tls) else {
            return;
        };
        while let Ok(msg) = ws.read() {
            if msg.is_text() && ws.send(msg).is_err() {
                break;
            }
        }
    });

    port
}

#[tokio::test]
async fn test_trusted_root_echo() {
    let (cert, key) = self_signed();
    let port = spawn_tls_echo_server(&cert, &key);

    let mut ws = WebSocketBuilder::new()
        .url(&format!("wss://localhost:{}/", port))
        .unwrap()
        .tls_config(TlsConfig::default().add_root_certificate(cert))
        .connect()
        .await
        .unwrap();

    assert!(ws.socket().is_secure());
    assert!(ws.socket().tls_version().is_some());

    match ws.round_trip("Hello, server!").await.unwrap() {
        Reply::Message(frame) => assert_eq!(frame.as_text(), Some("Hello, server!")),
        other => panic!("unexpected reply: {:?}", other),
    }
    ws.close();
}

#[tokio::test]
async fn test_untrusted_certificate_fails_connect() {
    let (cert, key) = self_signed();
    let port = spawn_tls_echo_server(&cert, &key);

    let err = WebSocket::connect(&format!("wss://localhost:{}/", port))
        .await
        .unwrap_err();

    assert!(err.is_connect_error());
    match err {
        NetError::SslHandshakeFailed { host, .. } => assert_eq!(host, "localhost"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_hostname_mismatch_fails_connect() {
    let (cert, key) = self_signed();
    let port = spawn_tls_echo_server(&cert, &key);

    // Trusted root, but the certificate does not name 127.0.0.1
    let err = WebSocketBuilder::new()
        .url(&format!("wss://127.0.0.1:{}/", port))
        .unwrap()
        .tls_config(TlsConfig::default().add_root_certificate(cert))
        .connect()
        .await
        .unwrap_err();

    assert!(matches!(err, NetError::SslHandshakeFailed { .. }));
}

#[tokio::test]
async fn test_read_until_over_tls() {
    let (cert, key) = self_signed();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let acceptor = acceptor(&cert, &key);

    std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut tls = acceptor.accept(stream).unwrap();
        tls.write_all(b"first line\r\n").unwrap();
        tls.flush().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        tls.write_all(b"\r\nafter").unwrap();
        let _ = tls.shutdown();
    });

    let endpoint = Endpoint::new("localhost", port, true);
    let tls = TlsConfig::default().add_root_certificate(cert);
    let mut socket = ConnectJob::connect(&endpoint, &tls).await.unwrap();

    let acc = read_until(&mut socket, &ReadOptions::default(), |buf| {
        buf.windows(4).any(|w| w == b"\r\n\r\n")
    })
    .await
    .unwrap();
    assert!(!acc.closed);
    assert!(acc.data.starts_with(b"first line\r\n\r\n"));

    // close_notify ends the stream cleanly
    let rest = read_until(&mut socket, &ReadOptions::default(), |_| false)
        .await
        .unwrap();
    assert!(rest.closed);
}
