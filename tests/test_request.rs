use bytes::Bytes;
use staticd::http::request::{Method, Request};
use std::collections::HashMap;

fn request(method: Method, headers: HashMap<String, String>) -> Request {
    Request {
        method,
        uri: "/".to_string(),
        version: "HTTP/1.0".to_string(),
        headers,
        body: Bytes::new(),
    }
}

#[test]
fn test_request_header_retrieval() {
    let mut headers = HashMap::new();
    headers.insert("Host".to_string(), "example.com".to_string());
    headers.insert("User-Agent".to_string(), "curl".to_string());

    let req = request(Method::GET, headers);

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("User-Agent"), Some("curl"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_header_lookup_is_exact() {
    let mut headers = HashMap::new();
    headers.insert("Host".to_string(), "example.com".to_string());

    let req = request(Method::GET, headers);

    assert_eq!(req.header("host"), None);
}

#[test]
fn test_method_is_head() {
    assert!(request(Method::HEAD, HashMap::new()).method.is_head());
    assert!(!request(Method::GET, HashMap::new()).method.is_head());
    assert!(!Method::Unsupported("HEAD ".into()).is_head());
}

#[test]
fn test_method_from_token() {
    let methods = vec![
        ("GET", Method::GET),
        ("HEAD", Method::HEAD),
        ("POST", Method::Unsupported("POST".to_string())),
        ("head", Method::Unsupported("head".to_string())),
    ];

    for (token, expected) in methods {
        assert_eq!(Method::from_token(token), expected);
        assert_eq!(Method::from_token(token).as_str(), token);
    }
}
