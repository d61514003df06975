use crate::http::request::{Method, Request};
use bytes::Bytes;
use std::collections::HashMap;

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// No `\r\n\r\n` or `\n\n` header terminator in the buffer
    Incomplete,
    /// Request line lacks a method, URI or version, or headers are not UTF-8
    InvalidRequest,
}

/// Parses one HTTP/1.0 request out of `buf`.
///
/// The buffer is never modified. Everything before the header terminator is
/// the header block; everything from the terminator on (terminator included)
/// becomes the body.
///
/// Header lines are split on *every* colon and only the first two non-empty
/// pieces are kept, so `Host: example.com:8080` yields the value
/// `example.com`: a value containing a colon is cut at that colon. A line
/// with no value yields an empty one.
pub fn parse_http_request(buf: &[u8]) -> Result<Request, ParseError> {
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let header_bytes = &buf[..headers_end];
    let body = Bytes::copy_from_slice(&buf[headers_end..]);

    let headers_str = std::str::from_utf8(header_bytes)
        .map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str
        .split(['\r', '\n'])
        .filter(|line| !line.is_empty());

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let uri = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    let mut headers = HashMap::new();
    for line in lines {
        let (key, value) = split_header_line(line);
        headers.insert(key.to_string(), value.to_string());
    }

    Ok(Request {
        method: Method::from_token(method_str),
        uri: uri.to_string(),
        version: version.to_string(),
        headers,
        body,
    })
}

/// Finds where the header block ends.
///
/// `\r\n\r\n` anywhere in the buffer wins over an earlier `\n\n`.
pub fn find_headers_end(buf: &[u8]) -> Option<usize> {
    find(buf, b"\r\n\r\n").or_else(|| find(buf, b"\n\n"))
}

fn find(buf: &[u8], needle: &[u8]) -> Option<usize> {
    buf.windows(needle.len())
        .position(|w| w == needle)
}

fn split_header_line(line: &str) -> (&str, &str) {
    let mut pieces = line.split(':').filter(|p| !p.is_empty());
    let key = pieces.next().unwrap_or_default();
    let value = pieces.next().unwrap_or_default();
    (key.trim(), value.trim())
}
