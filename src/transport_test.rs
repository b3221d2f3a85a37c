use super::*;
use tokio_tungstenite::tungstenite::error::UrlError;

#[test]
fn url_errors_are_creation_failures() {
    let error = classify_connect_error(WsError::Url(UrlError::NoHostName));
    assert!(matches!(error, TransportError::Invalid(_)));
    assert!(error.is_creation_failure());
}

#[test]
fn io_errors_are_handshake_failures() {
    let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
    let error = classify_connect_error(WsError::Io(io));
    assert!(matches!(error, TransportError::Handshake(_)));
    assert!(!error.is_creation_failure());
}

#[test]
fn send_errors_are_not_creation_failures() {
    assert!(!TransportError::Send("closed".to_owned()).is_creation_failure());
}

#[tokio::test]
async fn unsupported_scheme_fails_before_dialing() {
    let Err(error) = WsConnector.open("ftp://example.com/pm2/api-worker?type=both").await else {
        panic!("ftp scheme should not connect");
    };
    assert!(error.is_creation_failure(), "unexpected error: {error}");
}

#[tokio::test]
async fn refused_connection_is_a_handshake_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let Err(error) = WsConnector.open(&format!("ws://{addr}/pm2/api-worker?type=both")).await else {
        panic!("nothing is listening");
    };
    assert!(matches!(error, TransportError::Handshake(_)), "unexpected error: {error}");
}

/// Accept TCP connections and hang up on each without speaking TLS.
async fn tls_rejecting_listener() -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });
    addr
}

#[tokio::test]
async fn failed_tls_handshake_is_a_handshake_failure() {
    let addr = tls_rejecting_listener().await;

    let Err(error) = WsConnector.open(&format!("wss://{addr}/pm2/api-worker?type=both")).await else {
        panic!("server never completes TLS");
    };
    assert!(matches!(error, TransportError::Handshake(_)), "unexpected error: {error}");
    assert!(CryptoProvider::get_default().is_some());
}
