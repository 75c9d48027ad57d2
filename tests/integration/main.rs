//! PEP client integration harness.
//!
//! Everything runs in-process: the scenario tests exercise the codec on
//! byte buffers, and the client tests speak real HTTP to a mock daemon
//! bound to a loopback port. The mock unmarshals the query with the same
//! codec before answering, so each round trip crosses the full wire
//! contract in both directions.

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use pep_core::model::{
    Attribute, AttributeAssignment, Decision, FulfillOn, Obligation, Request, Response,
    ResponseResult, Status, StatusCode,
};
use pep_core::profile;

mod client;
mod scenarios;

// ── Scenario fixtures ─────────────────────────────────────────────────────────

/// The canonical submit query: one subject (X.500 DN), one resource, one
/// action.
pub fn submit_request() -> Request {
    profile::RequestBuilder::new()
        .subject_dn("CN=Alice,O=Example,C=CH")
        .resource("urn:example:cluster")
        .action("submit")
        .build()
}

/// Permit with a uidgid obligation mapping the user to 1001/2001.
pub fn permit_uidgid_response() -> Response {
    let mut obligation = Obligation::new(profile::OBLIGATION_UIDGID, FulfillOn::Permit);
    obligation
        .assignments
        .push(AttributeAssignment::single(profile::ASSIGNMENT_POSIX_UID, "1001"));
    obligation
        .assignments
        .push(AttributeAssignment::single(profile::ASSIGNMENT_POSIX_GID, "2001"));
    Response {
        request: None,
        results: vec![ResponseResult {
            decision: Decision::Permit,
            resource_id: None,
            status: Some(Status {
                message: "ok".to_string(),
                code: Some(StatusCode::new(profile::STATUS_OK)),
            }),
            obligations: vec![obligation],
        }],
    }
}

/// An attribute list's values, for order assertions.
pub fn attribute_values<'a>(attributes: &'a [Attribute], id: &str) -> Option<&'a [String]> {
    attributes.iter().find(|a| a.id == id).map(|a| a.values.as_slice())
}

// ── Mock daemon ───────────────────────────────────────────────────────────────

/// Serve one authorization round on a loopback port: read the POSTed query,
/// unmarshal it, answer with `response` (echoing the query back in it).
/// Returns the join handle and the endpoint URL.
pub async fn spawn_mock_pepd(response: Response) -> Result<(JoinHandle<()>, String)> {
    spawn_mock(MockBehavior::Answer(response)).await
}

/// Serve one round, but answer with the given HTTP status and no body.
pub async fn spawn_mock_error(status: u16) -> Result<(JoinHandle<()>, String)> {
    spawn_mock(MockBehavior::Error(status)).await
}

enum MockBehavior {
    Answer(Response),
    Error(u16),
}

async fn spawn_mock(behavior: MockBehavior) -> Result<(JoinHandle<()>, String)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            serve_once(&mut socket, &behavior).await.expect("mock daemon failed");
        }
    });
    Ok((handle, format!("http://{addr}/authz")))
}

async fn serve_once(socket: &mut TcpStream, behavior: &MockBehavior) -> Result<()> {
    let body = read_post_body(socket).await?;
    let request = pep_core::unmarshal_request(&body).context("mock failed to unmarshal query")?;

    let (status_line, reply) = match behavior {
        MockBehavior::Answer(response) => {
            let mut response = response.clone();
            response.request = Some(request);
            ("HTTP/1.1 200 OK", pep_core::marshal_response(&response)?)
        }
        MockBehavior::Error(code) => {
            let line: &'static str = match *code {
                500 => "HTTP/1.1 500 Internal Server Error",
                _ => "HTTP/1.1 400 Bad Request",
            };
            (line, Vec::new())
        }
    };

    let head = format!(
        "{status_line}\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.len()
    );
    socket.write_all(head.as_bytes()).await?;
    socket.write_all(&reply).await?;
    socket.flush().await?;
    Ok(())
}

async fn read_post_body(socket: &mut TcpStream) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let header_end = loop {
        let mut chunk = [0u8; 4096];
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            bail!("peer closed before headers were complete");
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let headers = std::str::from_utf8(&buf[..header_end]).context("non-UTF-8 headers")?;
    let content_length: usize = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .context("missing content-length")?;

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let mut chunk = [0u8; 4096];
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            bail!("peer closed mid-body");
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);
    Ok(body)
}
