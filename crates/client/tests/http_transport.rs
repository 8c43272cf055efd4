//! Integration test: boots an in-process HTTP server that plays the
//! service, points a real [`PubSubClient`] (reqwest transport) at it, and
//! checks what actually goes over the wire.
//!
//! - every request is `GET /{op}/{segments...}` with percent-encoded segments
//! - `V: 3.1`, `User-Agent` and `Accept-Encoding: gzip` headers are sent
//! - non-2xx statuses surface as transport errors
//! - a long-poll response reaches the callback

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use parking_lot::Mutex;
use ps_client::{
    ClientEvent, HttpRequest, HttpTransport, Operation, PubSubClient, Transport,
};
use ps_domain::config::ClientConfig;
use ps_domain::error::Error;
use serde_json::json;
use tokio::net::TcpListener;

/// One request as the server saw it.
#[derive(Debug, Clone)]
struct Seen {
    path: String,
    version: Option<String>,
    user_agent: Option<String>,
    accept_encoding: Option<String>,
}

type Log = Arc<Mutex<Vec<Seen>>>;

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn service(State(log): State<Log>, uri: Uri, headers: HeaderMap) -> impl IntoResponse {
    let path = uri.path().to_owned();
    log.lock().push(Seen {
        path: path.clone(),
        version: header(&headers, "v"),
        user_agent: header(&headers, "user-agent"),
        accept_encoding: header(&headers, "accept-encoding"),
    });

    if path.starts_with("/time/") {
        (StatusCode::OK, "[15000000000000000]".to_owned())
    } else if path.starts_with("/publish/") {
        (StatusCode::OK, r#"[1,"Sent","15000000000000001"]"#.to_owned())
    } else if path.starts_with("/history/") {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_owned())
    } else if path.starts_with("/subscribe/") && path.ends_with("/0") {
        (StatusCode::OK, r#"[["hi"],"3"]"#.to_owned())
    } else if path.starts_with("/subscribe/") {
        // Hold the long-poll open.
        tokio::time::sleep(Duration::from_secs(30)).await;
        (StatusCode::OK, r#"[[],"3"]"#.to_owned())
    } else {
        (StatusCode::NOT_FOUND, String::new())
    }
}

async fn start_service() -> (SocketAddr, Log) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: Log = Arc::default();
    let app = Router::new().fallback(service).with_state(log.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, log)
}

fn client_for(addr: SocketAddr) -> (PubSubClient, tokio::sync::mpsc::UnboundedReceiver<ClientEvent>) {
    let (callback, events) = ps_client::event_channel();
    let client = PubSubClient::builder()
        .origin(addr.to_string())
        .publish_key("pub")
        .subscribe_key("sub")
        .callback(callback)
        .build()
        .unwrap();
    (client, events)
}

#[tokio::test]
async fn time_request_carries_protocol_headers() {
    let (addr, log) = start_service().await;
    let (client, _events) = client_for(addr);

    assert_eq!(client.time().await, 15_000_000_000_000_000);

    let seen = log.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/time/0");
    assert_eq!(seen[0].version.as_deref(), Some("3.1"));
    assert!(seen[0]
        .user_agent
        .as_deref()
        .is_some_and(|ua| ua.starts_with("ps-client/")));
    assert!(seen[0]
        .accept_encoding
        .as_deref()
        .is_some_and(|ae| ae.contains("gzip")));
}

#[tokio::test]
async fn publish_path_is_percent_encoded() {
    let (addr, log) = start_service().await;
    let (client, _events) = client_for(addr);

    let result = client.publish("my channel", json!({"a": 1})).await;
    assert!(result.is_success());
    assert_eq!(result.timetoken.as_deref(), Some("15000000000000001"));

    let seen = log.lock().clone();
    assert_eq!(
        seen[0].path,
        "/publish/pub/sub/0/my%20channel/0/%7B%22a%22%3A1%7D"
    );
}

#[tokio::test]
async fn server_error_status_is_a_transport_error() {
    let (addr, _log) = start_service().await;
    let cfg = ClientConfig::default();
    let transport = HttpTransport::new(&cfg).unwrap();

    let request = HttpRequest {
        operation: Operation::History,
        channel: Some("ch1".into()),
        url: format!("http://{addr}/history/sub/ch1/0/10"),
        headers: Vec::new(),
        timeout: Some(Duration::from_secs(5)),
    };
    match transport.perform_request(&request).await {
        Err(Error::Http(msg)) => assert!(msg.contains("500"), "{msg}"),
        other => panic!("expected HTTP error, got {other:?}"),
    }

    let (client, mut events) = client_for(addr);
    assert!(client.history("ch1", 10).await.is_err());
    assert!(matches!(
        events.recv().await,
        Some(ClientEvent::Error { .. })
    ));
}

#[tokio::test]
async fn long_poll_message_reaches_callback() {
    let (addr, log) = start_service().await;
    let (client, mut events) = client_for(addr);

    client.subscribe("ch1").unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap();
    assert_eq!(first, Some(ClientEvent::Connected { channel: "ch1".into() }));
    let second = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap();
    assert_eq!(
        second,
        Some(ClientEvent::Message {
            channel: "ch1".into(),
            message: json!("hi"),
        })
    );

    // The follow-up poll carries the new cursor and stays open.
    for _ in 0..200 {
        if log.lock().iter().any(|s| s.path == "/subscribe/sub/ch1/0/3") {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("follow-up poll never arrived");
}
