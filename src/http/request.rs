use bytes::Bytes;
use std::collections::HashMap;

/// HTTP request methods.
///
/// Only GET and HEAD are served distinctly. Any other token is kept verbatim
/// as `Unsupported` rather than rejected, and is answered like a GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// Any other method token
    Unsupported(String),
}

/// Represents a parsed HTTP request from a client.
///
/// `body` holds the raw bytes from the header terminator onward, terminator
/// included. Nothing interprets it.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// The request URI exactly as sent (e.g. "/index.html")
    pub uri: String,
    /// Protocol version token (typically "HTTP/1.0")
    pub version: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl Method {
    /// Maps a request-line method token to a `Method`.
    ///
    /// Matching is case-sensitive.
    ///
    /// ```
    /// # use staticd::http::request::Method;
    /// assert_eq!(Method::from_token("GET"), Method::GET);
    /// assert_eq!(Method::from_token("get"), Method::Unsupported("get".into()));
    /// ```
    pub fn from_token(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            "HEAD" => Method::HEAD,
            other => Method::Unsupported(other.to_string()),
        }
    }

    /// HEAD responses carry headers only.
    pub fn is_head(&self) -> bool {
        *self == Method::HEAD
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::Unsupported(token) => token,
        }
    }
}

impl Request {
    /// Retrieves a header value by its exact name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(key)
            .map(|v| v.as_str())
    }
}
