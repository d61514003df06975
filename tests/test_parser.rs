use staticd::http::parser::{ParseError, parse_http_request};
use staticd::http::request::Method;

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET / HTTP/1.0\r\nHost: example.com\r\n\r\n";
    let parsed = parse_http_request(req).unwrap();

    assert_eq!(parsed.method, Method::GET);
    assert_eq!(parsed.uri, "/");
    assert_eq!(parsed.version, "HTTP/1.0");
    assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
}

#[test]
fn test_parse_head_request() {
    let parsed = parse_http_request(b"HEAD /index.html HTTP/1.0\r\n\r\n").unwrap();

    assert_eq!(parsed.method, Method::HEAD);
    assert_eq!(parsed.uri, "/index.html");
    assert!(parsed.headers.is_empty());
}

#[test]
fn test_parse_unknown_method_is_preserved() {
    let parsed = parse_http_request(b"BREW /pot HTTP/1.0\r\n\r\n").unwrap();

    assert_eq!(parsed.method, Method::Unsupported("BREW".to_string()));
    assert_eq!(parsed.method.as_str(), "BREW");
}

#[test]
fn test_parse_without_terminator_fails() {
    let inputs: [&[u8]; 5] = [
        b"",
        b"GET / HTTP/1.0",
        b"GET / HTTP/1.0\r\nHost: example.com\r\n",
        b"GET / HTTP/1.0\r\n\r",
        b"\x00\x01\x02garbage",
    ];

    for input in inputs {
        assert_eq!(parse_http_request(input).unwrap_err(), ParseError::Incomplete);
    }
}

#[test]
fn test_parse_bare_lf_terminator() {
    let parsed = parse_http_request(b"GET /a.txt HTTP/1.0\nAccept: */*\n\n").unwrap();

    assert_eq!(parsed.uri, "/a.txt");
    assert_eq!(parsed.header("Accept"), Some("*/*"));
    assert_eq!(&parsed.body[..], b"\n\n");
}

#[test]
fn test_parse_body_keeps_terminator() {
    let parsed = parse_http_request(b"GET / HTTP/1.0\r\nContent-Length: 5\r\n\r\nhello").unwrap();

    assert_eq!(&parsed.body[..], b"\r\n\r\nhello");
}

#[test]
fn test_parse_header_value_truncated_at_second_colon() {
    let req = b"GET / HTTP/1.0\r\nHost: example.com:8080\r\nReferer: http://x/y\r\n\r\n";
    let parsed = parse_http_request(req).unwrap();

    assert_eq!(parsed.header("Host"), Some("example.com"));
    assert_eq!(parsed.header("Referer"), Some("http"));
}

#[test]
fn test_parse_duplicate_header_last_wins() {
    let req = b"GET / HTTP/1.0\r\nX-Tag: one\r\nX-Tag: two\r\n\r\n";
    let parsed = parse_http_request(req).unwrap();

    assert_eq!(parsed.headers.len(), 1);
    assert_eq!(parsed.header("X-Tag"), Some("two"));
}

#[test]
fn test_parse_incomplete_request_line_is_invalid() {
    assert_eq!(
        parse_http_request(b"GET /\r\n\r\n").unwrap_err(),
        ParseError::InvalidRequest
    );
    assert_eq!(
        parse_http_request(b"\r\n\r\n").unwrap_err(),
        ParseError::InvalidRequest
    );
}

#[test]
fn test_parse_non_utf8_header_is_invalid() {
    assert_eq!(
        parse_http_request(b"GET /\xff HTTP/1.0\r\n\r\n").unwrap_err(),
        ParseError::InvalidRequest
    );
}

#[test]
fn test_parse_leaves_buffer_untouched() {
    let req = b"GET / HTTP/1.0\r\nA: b:c\r\n\r\n".to_vec();
    let copy = req.clone();

    let _ = parse_http_request(&req).unwrap();
    let again = parse_http_request(&req).unwrap();

    assert_eq!(req, copy);
    assert_eq!(again.header("A"), Some("b"));
}
