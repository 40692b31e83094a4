//! Full client lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every `SmmsClient`
//! operation over real HTTP through the default `UreqTransport`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use smms_core::{ApiError, ClientConfig, SmmsClient, UreqTransport};

const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR\x00\x00\x00\x20\x00\x00\x00\x10";

fn start_mock_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(&format!("http://{addr}"))
}

fn transport() -> Arc<UreqTransport> {
    Arc::new(UreqTransport::with_timeout(Duration::from_secs(10)))
}

fn login(addr: SocketAddr) -> SmmsClient {
    SmmsClient::login_with(
        config(addr),
        transport(),
        mock_server::DEMO_USERNAME,
        mock_server::DEMO_PASSWORD,
    )
    .expect("demo account should log in")
}

#[test]
fn invalid_credentials_are_rejected() {
    let addr = start_mock_server();

    let result = SmmsClient::login_with(config(addr), transport(), "Y*R#*HFVD", "HFUI&*#*+?VD");
    let err = result.unwrap_err();
    match &err {
        ApiError::Remote(remote) => {
            assert_eq!(remote.status, 200);
            assert!(remote.url.ends_with("/api/v2/token"));
            assert_eq!(remote.message, "Username or password incorrect.");
            assert!(!remote.request_id.is_empty());
        }
        other => panic!("expected Remote, got {other:?}"),
    }
}

#[test]
fn client_lifecycle() {
    let addr = start_mock_server();

    // Step 1: log in and read the profile.
    let client = login(addr);
    assert!(!client.token().is_empty());
    let profile = client.profile().unwrap();
    assert_eq!(profile.username, mock_server::DEMO_USERNAME);
    assert_eq!(profile.group_expire, None);

    // Step 2: history starts empty.
    assert!(client.history().unwrap().is_empty());

    // Step 3: upload.
    let record = client.upload("test.jpg", PNG_HEADER).unwrap();
    assert_eq!(record.filename, "test.jpg");
    assert_eq!(record.size, PNG_HEADER.len() as u64);
    assert_eq!((record.width, record.height), (32, 16));
    assert!(!record.hash.is_empty());
    assert_eq!(client.buffer_pool().idle(), 1);

    // Step 4: both history listings contain it.
    let history = client.history().unwrap();
    assert!(history.iter().any(|i| i.filename == "test.jpg"));
    let uploads = client.upload_history().unwrap();
    assert!(uploads.iter().any(|i| i.hash == record.hash));

    // Step 5: delete by the returned hash.
    client.delete(&record.hash).unwrap();
    assert!(client.history().unwrap().is_empty());

    // Step 6: an unknown hash is a remote error.
    let err = client.delete("invalid-hash-value").unwrap_err();
    assert!(matches!(err, ApiError::Remote(_)), "got {err:?}");

    // Step 7: clearing twice succeeds both times.
    client.upload("again.png", PNG_HEADER).unwrap();
    client.clear().unwrap();
    client.clear().unwrap();
    assert!(client.upload_history().unwrap().is_empty());
}

#[test]
fn persisted_token_reuses_session() {
    let addr = start_mock_server();
    let token = login(addr).token().to_string();

    let client = SmmsClient::with_transport(config(addr), transport(), token);
    let profile = client.profile().unwrap();
    assert_eq!(profile.username, mock_server::DEMO_USERNAME);
}

#[test]
fn unknown_token_is_unauthorized() {
    let addr = start_mock_server();
    let client = SmmsClient::with_transport(config(addr), transport(), "stale-token");

    let err = client.history().unwrap_err();
    match err {
        ApiError::Remote(remote) => {
            assert_eq!(remote.status, 401);
            assert_eq!(remote.code, "unauthorized");
        }
        other => panic!("expected Remote, got {other:?}"),
    }
}

#[test]
fn unreachable_host_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let client = SmmsClient::with_transport(config(addr), transport(), "t");

    let err = client.clear().unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "got {err:?}");
}

#[test]
fn concurrent_uploads_share_one_client() {
    let addr = start_mock_server();
    let client = login(addr);

    std::thread::scope(|s| {
        for i in 0..4 {
            let client = &client;
            s.spawn(move || {
                let name = format!("thread-{i}.png");
                let record = client.upload(&name, PNG_HEADER).unwrap();
                assert_eq!(record.filename, name);
            });
        }
    });

    let uploads = client.upload_history().unwrap();
    assert_eq!(uploads.len(), 4);
    assert!(client.buffer_pool().idle() >= 1);
    client.clear().unwrap();
}
