//! # Raw HTTP request/response head handling.
//!
//! Because the stream is read off the raw socket (bypassing any buffered
//! HTTP client), the request line and the response head are handled here by
//! hand: just enough HTTP/1.1 to issue one GET and classify one response.
//! Redirects, caching and content negotiation are deliberately absent.
//!
//! Bytes read past the head terminator belong to the body and are returned
//! in [`ResponseHead::remainder`] so the decoder can be seeded with them.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time;
use url::Url;

use crate::error::StreamError;

/// Parsed response head plus any body bytes that arrived with it.
pub(crate) struct ResponseHead {
    /// HTTP status code.
    pub status: u16,
    /// Whether the body uses chunked-transfer framing.
    pub chunked: bool,
    /// Body bytes read past the head terminator, unmodified.
    pub remainder: BytesMut,
}

/// Splits a subscription URL into a connectable host/port pair.
///
/// Only `http` URLs are accepted; anything else is a fatal
/// [`StreamError::Unreachable`].
pub(crate) fn endpoint(url: &Url) -> Result<(String, u16), StreamError> {
    if url.scheme() != "http" {
        return Err(StreamError::Unreachable(format!(
            "unsupported scheme {:?} in {url}",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| StreamError::Unreachable(format!("no host in {url}")))?;
    Ok((host.to_owned(), url.port_or_known_default().unwrap_or(80)))
}

/// Formats the GET request for the subscription endpoint.
pub(crate) fn format_request(url: &Url, auth: &str, agent: &str) -> String {
    let mut target = url.path().to_owned();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    let host = match url.port() {
        Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
        None => url.host_str().unwrap_or_default().to_owned(),
    };
    format!(
        "GET {target} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Auth: {auth}\r\n\
         User-Agent: {agent}\r\n\
         Connection: close\r\n\
         \r\n"
    )
}

/// Reads and parses the response head, bounded by `limit`.
///
/// Failing to receive a head at all (timeout, close, I/O error) means the
/// request never produced a response and is fatal; a head that arrives but
/// cannot be parsed is a protocol error (linear-backoff bucket).
pub(crate) async fn read_head<S: AsyncRead + Unpin>(
    sock: &mut S,
    limit: Duration,
) -> Result<ResponseHead, StreamError> {
    match time::timeout(limit, read_head_inner(sock)).await {
        Ok(res) => res,
        Err(_elapsed) => Err(StreamError::Unreachable(
            "timed out waiting for response head".into(),
        )),
    }
}

async fn read_head_inner<S: AsyncRead + Unpin>(
    sock: &mut S,
) -> Result<ResponseHead, StreamError> {
    let mut buf = BytesMut::with_capacity(1024);
    let end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = sock
            .read_buf(&mut buf)
            .await
            .map_err(|e| StreamError::Unreachable(format!("reading response head: {e}")))?;
        if n == 0 {
            return Err(StreamError::Unreachable(
                "connection closed before response head".into(),
            ));
        }
    };

    let remainder = buf.split_off(end + 4);
    let head = std::str::from_utf8(&buf[..end])
        .map_err(|_| StreamError::Protocol("response head is not ASCII".into()))?;
    let mut lines = head.lines();

    let status_line = lines
        .next()
        .ok_or_else(|| StreamError::Protocol("empty response head".into()))?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| StreamError::Protocol(format!("bad status line {status_line:?}")))?;

    let chunked = lines.any(|line| {
        line.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("transfer-encoding")
                && value.to_ascii_lowercase().contains("chunked")
        })
    });

    Ok(ResponseHead {
        status,
        chunked,
        remainder,
    })
}
