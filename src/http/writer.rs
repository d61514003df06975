use std::fs::File;
use std::io::{self, Read, Write};

use crate::http::response::Response;

const HTTP_VERSION: &str = "HTTP/1.0";

/// Size of each read from the served file while streaming the body.
pub const BODY_CHUNK: usize = 256;

fn serialize_head(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in &resp.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Writes a response onto a connection: status line, headers, blank line,
/// then the resolved file in `BODY_CHUNK` sized pieces.
pub struct ResponseWriter<'a> {
    response: &'a Response,
}

impl<'a> ResponseWriter<'a> {
    pub fn new(response: &'a Response) -> Self {
        Self { response }
    }

    /// Returns the number of body bytes written.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<u64> {
        out.write_all(&serialize_head(self.response))?;

        let mut sent = 0;
        if self.response.has_body() {
            if let Some(path) = &self.response.path {
                let mut file = File::open(path)?;
                let mut chunk = [0u8; BODY_CHUNK];
                loop {
                    let n = file.read(&mut chunk)?;
                    if n == 0 {
                        break;
                    }
                    out.write_all(&chunk[..n])?;
                    sent += n as u64;
                }
            }
        }

        out.flush()?;
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::{ResponseBuilder, StatusCode};

    #[test]
    fn bad_request_has_status_line_and_blank_line_only() {
        let resp = ResponseBuilder::new(StatusCode::BadRequest).build();
        let mut out = Vec::new();

        let sent = ResponseWriter::new(&resp).write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(sent, 0);
        assert!(text.starts_with("HTTP/1.0 400 Bad Request\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
