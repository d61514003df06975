//! HTTP/1.0 codec.
//!
//! Turns the bytes of one client connection into a static-file response.
//!
//! - **`parser`**: pure parsing of a request buffer into a `Request`
//! - **`request`**: request representation
//! - **`response`**: status codes, the `Response` type and path resolution
//! - **`writer`**: serializes a response and streams the file body
//! - **`connection`**: read / process / write state machine for one exchange
//!
//! ```text
//!   Reading ──► Processing ──► Writing ──► Closed
//!      │                                     ▲
//!      └──────── peer sent nothing ──────────┘
//! ```
//!
//! There are no persistent connections: each connection carries exactly one
//! request.

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;

use std::net::TcpStream;

use crate::config::{ServerConfig, StaticFilesConfig};
use connection::Connection;

/// Serves one request on an accepted client connection.
///
/// Applies the configured read timeout, runs the exchange and returns once
/// the response is flushed. The stream is closed when it is dropped.
pub fn handle_client(
    server: &ServerConfig,
    static_files: &StaticFilesConfig,
    stream: TcpStream,
) -> anyhow::Result<()> {
    stream.set_read_timeout(server.read_timeout())?;
    let mut conn = Connection::new(stream, static_files, server.max_request_bytes);
    conn.run()
}
