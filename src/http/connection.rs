use bytes::BytesMut;
use std::io::{ErrorKind, Read, Write};

use crate::config::StaticFilesConfig;
use crate::http::parser::{find_headers_end, parse_http_request};
use crate::http::request::Request;
use crate::http::response::{Response, build_response};
use crate::http::writer::ResponseWriter;

/// Drives a single HTTP/1.0 exchange on a blocking stream.
///
/// One request, one response, then the connection is done; the caller closes
/// it by dropping the stream.
pub struct Connection<'a, S> {
    stream: S,
    static_files: &'a StaticFilesConfig,
    buffer: BytesMut,
    max_request_bytes: usize,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    /// `None` when the bytes read did not form a request
    Processing(Option<Request>),
    Writing(Response),
    Closed,
}

impl<'a, S: Read + Write> Connection<'a, S> {
    pub fn new(stream: S, static_files: &'a StaticFilesConfig, max_request_bytes: usize) -> Self {
        Self {
            stream,
            static_files,
            buffer: BytesMut::with_capacity(max_request_bytes.min(4096)),
            max_request_bytes,
            state: ConnectionState::Reading,
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match &mut self.state {
                ConnectionState::Reading => {
                    self.read_request()?;
                    self.state = if self.buffer.is_empty() {
                        // Peer went away without sending anything
                        ConnectionState::Closed
                    } else {
                        ConnectionState::Processing(parse_http_request(&self.buffer).ok())
                    };
                }

                ConnectionState::Processing(req) => {
                    let response = build_response(self.static_files, req.as_ref());
                    tracing::debug!(
                        method = req.as_ref().map(|r| r.method.as_str()),
                        uri = req.as_ref().map(|r| r.uri.as_str()),
                        status = response.status.as_u16(),
                        "Built response"
                    );
                    self.state = ConnectionState::Writing(response);
                }

                ConnectionState::Writing(response) => {
                    let sent = ResponseWriter::new(response).write_to(&mut self.stream)?;
                    tracing::debug!(status = response.status.as_u16(), body_bytes = sent, "Response sent");
                    self.state = ConnectionState::Closed;
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Reads until the header terminator shows up, the peer stops sending,
    /// or the request size cap is reached.
    ///
    /// Once some bytes have arrived, a failed read (the read timeout firing,
    /// a reset) ends the input and whatever was buffered gets answered. Only
    /// a read failing on an empty buffer is an error.
    fn read_request(&mut self) -> anyhow::Result<()> {
        let mut temp = [0u8; 1024];
        while find_headers_end(&self.buffer).is_none() && self.buffer.len() < self.max_request_bytes {
            let want = temp.len().min(self.max_request_bytes - self.buffer.len());
            let n = match self.stream.read(&mut temp[..want]) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if !self.buffer.is_empty() => {
                    tracing::debug!(
                        error = %e,
                        buffered = self.buffer.len(),
                        "Read stopped before the header terminator"
                    );
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            if n == 0 {
                break;
            }

            self.buffer.extend_from_slice(&temp[..n]);
        }
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
