//! Tor transport tests against an in-process fake daemon.

use super::*;
use crate::adapters::line_io::read_line;
use crate::domain::cancel::cancel_pair;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

const SERVICE_ID: &str = "vww6ybal4bd7szmgncyruucpgfkqahzddi37ktceo3ah7ngmcopnpyyd";

// =============================================================================
// FAKE CONTROL PORT
// =============================================================================

#[derive(Clone, Copy)]
struct FakeTor {
    password: Option<&'static str>,
    publishes: bool,
}

/// Serve one control connection, reporting each command received.
async fn spawn_control(fake: FakeTor) -> (u16, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        while let Ok(line) = read_line(&mut stream).await {
            let _ = tx.send(line.clone());
            let reply = control_reply(&fake, &line);
            if stream.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    (port, rx)
}

fn control_reply(fake: &FakeTor, line: &str) -> String {
    if let Some(rest) = line.strip_prefix("AUTHENTICATE") {
        let expected = fake
            .password
            .map(|p| format!(" \"{p}\""))
            .unwrap_or_default();
        return if rest == expected {
            "250 OK\r\n".to_string()
        } else {
            "515 Authentication failed: Password did not match\r\n".to_string()
        };
    }
    if line == "GETINFO version" {
        return "250-version=0.4.8.9\r\n250 OK\r\n".to_string();
    }
    if line.starts_with("SETEVENTS") {
        return "250 OK\r\n".to_string();
    }
    if line.starts_with("ADD_ONION") {
        let mut reply = format!("250-ServiceID={SERVICE_ID}\r\n");
        if line.starts_with("ADD_ONION NEW:") {
            reply.push_str("250-PrivateKey=ED25519-V3:c2VjcmV0LWtleQ==\r\n");
        }
        reply.push_str("250 OK\r\n");
        // An unrelated event before the one we wait for.
        reply.push_str(&format!("650 HS_DESC UPLOAD {SERVICE_ID} UNKNOWN $hsdir1\r\n"));
        if fake.publishes {
            reply.push_str(&format!("650 HS_DESC UPLOADED {SERVICE_ID} UNKNOWN $hsdir1\r\n"));
        }
        return reply;
    }
    if line.starts_with("DEL_ONION") {
        return "250 OK\r\n".to_string();
    }
    "510 Unrecognized command\r\n".to_string()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut commands = Vec::new();
    while let Ok(command) = rx.try_recv() {
        commands.push(command);
    }
    commands
}

// =============================================================================
// FAKE SOCKS PROXY
// =============================================================================

/// Accept one SOCKS5 CONNECT, reply with `reply_code`, then echo.
async fn spawn_socks(reply_code: u8) -> (u16, mpsc::UnboundedReceiver<(String, u16)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut greeting = [0u8; 3];
        stream.read_exact(&mut greeting).await.unwrap();
        assert_eq!(greeting, [5, 1, 0]);
        stream.write_all(&[5, 0]).await.unwrap();

        let mut head = [0u8; 5];
        stream.read_exact(&mut head).await.unwrap();
        assert_eq!(&head[..4], &[5, 1, 0, 3]);
        let mut host = vec![0u8; head[4] as usize];
        stream.read_exact(&mut host).await.unwrap();
        let port = stream.read_u16().await.unwrap();
        let _ = tx.send((String::from_utf8(host).unwrap(), port));

        stream
            .write_all(&[5, reply_code, 0, 1, 0, 0, 0, 0, 0, 0])
            .await
            .unwrap();
        if reply_code != 0 {
            return;
        }

        let mut buf = [0u8; 64];
        while let Ok(n) = stream.read(&mut buf).await {
            if n == 0 || stream.write_all(&buf[..n]).await.is_err() {
                break;
            }
        }
    });

    (port, rx)
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_initialize_authenticates_and_subscribes() {
    let (control_port, mut commands) = spawn_control(FakeTor {
        password: Some("hunter2"),
        publishes: true,
    })
    .await;
    let mut config = TorConfig::for_testing(control_port, 1);
    config.control_password = Some("hunter2".to_string());
    let transport = TorTransport::new(config);

    assert!(transport.initialize().await.unwrap());
    assert!(transport.initialize().await.unwrap());
    assert_eq!(transport.state(), TransportState::Initialized);

    let sent = drain(&mut commands);
    assert_eq!(
        sent,
        vec![
            "AUTHENTICATE \"hunter2\"".to_string(),
            "GETINFO version".to_string(),
            "SETEVENTS HS_DESC".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_failed_authentication_resets_state() {
    let (control_port, _commands) = spawn_control(FakeTor {
        password: Some("right"),
        publishes: true,
    })
    .await;
    let mut config = TorConfig::for_testing(control_port, 1);
    config.control_password = Some("wrong".to_string());
    let transport = TorTransport::new(config);

    let result = transport.initialize().await;
    assert!(matches!(result, Err(TransportError::Protocol { .. })));
    assert_eq!(transport.state(), TransportState::New);
}

#[tokio::test]
async fn test_uninitialized_transport_refuses_work() {
    let transport = TorTransport::new(TorConfig::for_testing(1, 1));
    assert!(matches!(
        transport.get_server_socket(8000, "default").await,
        Err(TransportError::NotInitialized(TransportType::Tor))
    ));
}

// =============================================================================
// HIDDEN SERVICES
// =============================================================================

#[tokio::test]
async fn test_publish_returns_onion_address_after_upload() {
    let (control_port, mut commands) = spawn_control(FakeTor {
        password: None,
        publishes: true,
    })
    .await;
    let transport = TorTransport::new(TorConfig::for_testing(control_port, 1));
    transport.initialize().await.unwrap();
    drain(&mut commands);

    assert_eq!(transport.get_server_address("default"), None);
    let server = transport.get_server_socket(8000, "default").await.unwrap();

    assert_eq!(server.address.host(), format!("{SERVICE_ID}.onion"));
    assert_eq!(server.address.port(), 8000);
    assert!(server.address.is_tor());
    assert_eq!(transport.get_server_address("default"), Some(server.address.clone()));

    let local = server.listener.local_addr().unwrap();
    let sent = drain(&mut commands);
    assert_eq!(
        sent,
        vec![format!("ADD_ONION NEW:ED25519-V3 Port=8000,{local}")]
    );
}

#[tokio::test]
async fn test_stored_key_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let (control_port, mut commands) = spawn_control(FakeTor {
        password: None,
        publishes: true,
    })
    .await;
    let mut config = TorConfig::for_testing(control_port, 1);
    config.key_dir = Some(dir.path().to_path_buf());
    let transport = TorTransport::new(config);
    transport
        .keys
        .store("default", "ED25519-V3:c3RvcmVk")
        .await
        .unwrap();
    transport.initialize().await.unwrap();
    drain(&mut commands);

    transport.get_server_socket(8000, "default").await.unwrap();
    let sent = drain(&mut commands);
    assert!(sent[0].starts_with("ADD_ONION ED25519-V3:c3RvcmVk Port=8000,"));
}

#[tokio::test]
async fn test_generated_key_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let (control_port, _commands) = spawn_control(FakeTor {
        password: None,
        publishes: true,
    })
    .await;
    let mut config = TorConfig::for_testing(control_port, 1);
    config.key_dir = Some(dir.path().to_path_buf());
    let transport = TorTransport::new(config);
    transport.initialize().await.unwrap();

    transport.get_server_socket(8000, "default").await.unwrap();
    let on_disk = std::fs::read_to_string(dir.path().join("default.tor")).unwrap();
    assert_eq!(on_disk, "ED25519-V3:c2VjcmV0LWtleQ==");
}

#[tokio::test]
async fn test_publish_timeout_removes_service() {
    let (control_port, mut commands) = spawn_control(FakeTor {
        password: None,
        publishes: false,
    })
    .await;
    let mut config = TorConfig::for_testing(control_port, 1);
    config.publish_timeout = Duration::from_millis(100);
    let transport = TorTransport::new(config);
    transport.initialize().await.unwrap();
    drain(&mut commands);

    let result = transport.get_server_socket(8000, "default").await;
    assert!(matches!(result, Err(TransportError::Timeout { .. })));
    assert_eq!(transport.get_server_address("default"), None);

    let sent = drain(&mut commands);
    assert_eq!(sent.last().unwrap(), &format!("DEL_ONION {SERVICE_ID}"));
}

#[tokio::test]
async fn test_shutdown_deletes_published_services() {
    let (control_port, mut commands) = spawn_control(FakeTor {
        password: None,
        publishes: true,
    })
    .await;
    let transport = TorTransport::new(TorConfig::for_testing(control_port, 1));
    transport.initialize().await.unwrap();
    transport.get_server_socket(8000, "default").await.unwrap();
    drain(&mut commands);

    transport.shutdown().await.unwrap();
    // Give the fake a moment to record the command.
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(drain(&mut commands), vec![format!("DEL_ONION {SERVICE_ID}")]);
    assert_eq!(transport.state(), TransportState::Terminated);
    assert_eq!(transport.get_server_address("default"), None);
}

// =============================================================================
// OUTBOUND
// =============================================================================

#[tokio::test]
async fn test_connect_sends_unresolved_hostname() {
    let (control_port, _commands) = spawn_control(FakeTor {
        password: None,
        publishes: true,
    })
    .await;
    let (socks_port, mut targets) = spawn_socks(0).await;
    let transport = TorTransport::new(TorConfig::for_testing(control_port, socks_port));
    transport.initialize().await.unwrap();

    let target = Address::new(format!("{SERVICE_ID}.onion"), 9999);
    let mut stream = transport
        .get_socket(&target, &CancelToken::never())
        .await
        .unwrap();

    stream.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    stream.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"ping");

    let (host, port) = targets.recv().await.unwrap();
    assert_eq!(host, format!("{SERVICE_ID}.onion"));
    assert_eq!(port, 9999);
}

#[tokio::test]
async fn test_socks_refusal_is_protocol_error() {
    let (control_port, _commands) = spawn_control(FakeTor {
        password: None,
        publishes: true,
    })
    .await;
    let (socks_port, _targets) = spawn_socks(0xF0).await;
    let transport = TorTransport::new(TorConfig::for_testing(control_port, socks_port));
    transport.initialize().await.unwrap();

    let target = Address::new(format!("{SERVICE_ID}.onion"), 9999);
    let err = transport
        .get_socket(&target, &CancelToken::never())
        .await
        .unwrap_err();
    match err {
        TransportError::Protocol { reason, .. } => assert!(reason.contains("descriptor")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_cancelled_connect() {
    let (control_port, _commands) = spawn_control(FakeTor {
        password: None,
        publishes: true,
    })
    .await;
    let transport = Arc::new(TorTransport::new(TorConfig::for_testing(control_port, 1)));
    transport.initialize().await.unwrap();

    let (handle, token) = cancel_pair();
    handle.cancel();
    let target = Address::new(format!("{SERVICE_ID}.onion"), 9999);
    let result = transport.get_socket(&target, &token).await;
    assert!(matches!(result, Err(TransportError::Cancelled { .. })));
}

#[tokio::test]
async fn test_i2p_address_is_unsupported() {
    let (control_port, _commands) = spawn_control(FakeTor {
        password: None,
        publishes: true,
    })
    .await;
    let transport = TorTransport::new(TorConfig::for_testing(control_port, 1));
    transport.initialize().await.unwrap();

    let result = transport
        .get_socket(&Address::new("peer.i2p", 0), &CancelToken::never())
        .await;
    assert!(matches!(result, Err(TransportError::UnsupportedAddress { .. })));
}
