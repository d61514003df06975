use crate::config::StaticFilesConfig;
use crate::http::request::{Method, Request};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Value of the `Server` header on every response.
pub const SERVER_NAME: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// HTTP status codes the server produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use staticd::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the reason phrase sent on the status line.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// The outcome of a request, ready to be written by `ResponseWriter`.
///
/// The body is never held in memory; `path` names the file to stream.
#[derive(Debug)]
pub struct Response {
    /// Method of the request being answered, `None` if it failed to parse
    pub method: Option<Method>,
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    /// File to stream as the body
    pub path: Option<PathBuf>,
}

/// Builder for constructing responses in a fluent style.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .method(Method::GET)
///     .path("/srv/www/index.html")
///     .build();
/// ```
pub struct ResponseBuilder {
    method: Option<Method>,
    status: StatusCode,
    headers: HashMap<String, String>,
    path: Option<PathBuf>,
}

impl ResponseBuilder {
    /// Creates a builder pre-filled with the `Server` and `Date` headers.
    pub fn new(status: StatusCode) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Server".to_string(), SERVER_NAME.to_string());
        headers.insert("Date".to_string(), http_date(Utc::now()));

        Self {
            method: None,
            status,
            headers,
            path: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn build(self) -> Response {
        Response {
            method: self.method,
            status: self.status,
            headers: self.headers,
            path: self.path,
        }
    }
}

impl Response {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    /// Whether a body follows the header block.
    pub fn has_body(&self) -> bool {
        !self.method.as_ref().is_some_and(Method::is_head)
            && self.status != StatusCode::InternalServerError
            && self.path.is_some()
    }
}

/// Formats a timestamp as an RFC 1123 date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Where a request URI landed on disk.
#[derive(Debug, PartialEq, Eq)]
enum Resolution {
    Found(PathBuf),
    NotFound(PathBuf),
    Missing,
}

/// Maps a parsed request (or a parse failure) to a response.
///
/// `/` is served as the index page. A URI that names no regular file under
/// the root falls back to the not-found page with 404; if that page is gone
/// too the answer is a bare 500 without `Content-Length`.
pub fn build_response(static_files: &StaticFilesConfig, request: Option<&Request>) -> Response {
    let Some(request) = request else {
        return ResponseBuilder::new(StatusCode::BadRequest).build();
    };

    let builder = ResponseBuilder::new(StatusCode::Ok).method(request.method.clone());

    let (builder, path) = match resolve(static_files, &request.uri) {
        Resolution::Found(path) => (builder, path),
        Resolution::NotFound(path) => (builder.status(StatusCode::NotFound), path),
        Resolution::Missing => {
            return builder.status(StatusCode::InternalServerError).build();
        }
    };

    match std::fs::metadata(&path) {
        Ok(meta) => builder
            .header("Content-Length", meta.len().to_string())
            .path(path)
            .build(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to stat resolved file");
            builder.status(StatusCode::InternalServerError).build()
        }
    }
}

fn resolve(static_files: &StaticFilesConfig, uri: &str) -> Resolution {
    let uri = if uri == "/" {
        static_files.index_page.as_str()
    } else {
        uri
    };

    if let Some(path) = join_under_root(&static_files.root_dir, uri) {
        if path.is_file() {
            return Resolution::Found(path);
        }
    }

    match join_under_root(&static_files.root_dir, &static_files.not_found_page) {
        Some(path) if path.is_file() => Resolution::NotFound(path),
        _ => Resolution::Missing,
    }
}

/// Joins a URI-ish relative name onto the root, refusing `..` segments.
fn join_under_root(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    Some(root.join(relative))
}
