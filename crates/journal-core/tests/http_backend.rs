mod common;

use common::{key, PlainProvider};
use journal_core::entry::ChainBuilder;
use journal_core::transport::{Auth, Transport, TransportConfig};
use journal_core::{JournalClient, JournalError, Url};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn read_request(stream: &mut impl Read) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find(&buf, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serve a single canned response and hand back the raw request.
fn serve_once(status_line: &str, extra_headers: &str, body: String) -> (Url, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{extra_headers}\r\n{body}",
        body.len()
    );
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request(&mut stream);
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        request
    });
    (Url::parse(&format!("http://{addr}/")).unwrap(), handle)
}

fn transport(auth: Option<Auth>) -> Transport {
    Transport::new(&TransportConfig {
        timeout: Duration::from_secs(5),
        auth,
        ..TransportConfig::default()
    })
    .unwrap()
}

#[test]
fn fetch_over_http() {
    let key = key();
    let mut builder = ChainBuilder::new(&PlainProvider, &key, None);
    builder.push(b"hello").unwrap();
    builder.push(b"world").unwrap();
    let entries = builder.finish();
    let body = serde_json::to_string(&entries).unwrap();

    let (base, server) = serve_once("200 OK", "", body);
    let client = JournalClient::new(
        transport(Some(Auth::Token("secret-token".into()))),
        Arc::new(PlainProvider),
        &base,
        "abc",
    )
    .unwrap();

    let fetched = client.fetch_entries(&key, None).unwrap();
    assert_eq!(fetched, entries);

    let request = server.join().unwrap();
    assert!(request.starts_with("GET /api/v1/journal/abc/ HTTP/1.1"));
    assert!(request
        .to_ascii_lowercase()
        .contains("authorization: token secret-token"));
    assert!(request.to_ascii_lowercase().contains("user-agent: journal-core/"));
}

#[test]
fn push_over_http() {
    let key = key();
    let mut builder = ChainBuilder::new(&PlainProvider, &key, Some("00ff"));
    builder.push(b"next").unwrap();
    let entries = builder.finish();

    let (base, server) = serve_once("200 OK", "", "{}".to_string());
    let client =
        JournalClient::new(transport(None), Arc::new(PlainProvider), &base, "abc").unwrap();
    client.push_entries(&entries, Some("00ff")).unwrap();

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /api/v1/journal/abc/?last=00ff HTTP/1.1"));
    assert!(request
        .to_ascii_lowercase()
        .contains("content-type: application/json; charset=utf-8"));
    let body = request.split("\r\n\r\n").nth(1).unwrap();
    let sent: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(sent[0]["uid"], entries[0].uid());
}

#[test]
fn service_unavailable_over_http() {
    let (base, server) = serve_once(
        "503 Service Unavailable",
        "Retry-After: 120\r\n",
        String::new(),
    );
    let client =
        JournalClient::new(transport(None), Arc::new(PlainProvider), &base, "abc").unwrap();
    let err = client.fetch_entries(&key(), None).unwrap_err();
    assert!(matches!(err, JournalError::ServiceUnavailable { retry_after: 120 }));
    server.join().unwrap();
}

#[test]
fn connection_refused_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base = Url::parse(&format!("http://{addr}/")).unwrap();
    let client =
        JournalClient::new(transport(None), Arc::new(PlainProvider), &base, "abc").unwrap();
    let err = client.fetch_entries(&key(), None).unwrap_err();
    assert!(matches!(err, JournalError::Network(_)));
    assert!(err.is_transient());
}
