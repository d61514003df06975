//! staticd - static file HTTP/1.0 server
//!
//! Each accepted connection is handed to one worker from a fixed-size pool,
//! either forked processes or threads, which serves a single file and closes
//! the connection.

pub mod config;
pub mod http;
pub mod pool;
pub mod server;
