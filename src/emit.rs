//! Response emission.
//!
//! The negotiated [`Response`] leaves the kernel through an [`Emitter`]. The
//! console transport writes it to a stream; the HTTP transport hands it to
//! hyper. Both consume the same value the same way.

use std::io::Write;

use bytes::Bytes;
use http_body_util::Full;

use crate::error::Result;
use crate::response::Response;

/// Delivers one response to wherever the request came from.
pub trait Emitter {
    fn emit(&mut self, response: Response) -> Result<()>;
}

/// Writes an HTTP/1.1-style rendition of the response:
///
/// ```text
/// HTTP/1.1 404 Not Found
/// content-type: application/json
///
/// {"status":"fail","data":{},"message":"Not Found"}
/// ```
pub struct ConsoleEmitter<W> {
    out: W,
}

impl<W: Write> ConsoleEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Emitter for ConsoleEmitter<W> {
    fn emit(&mut self, response: Response) -> Result<()> {
        writeln!(self.out, "HTTP/1.1 {} {}", response.status(), response.reason())?;
        for (name, value) in response.headers() {
            writeln!(self.out, "{name}: {value}")?;
        }
        writeln!(self.out)?;
        self.out.write_all(response.body())?;
        if !response.body().is_empty() {
            writeln!(self.out)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Holds the converted response until the hyper service returns it.
#[derive(Default)]
pub struct HttpEmitter {
    response: Option<http::Response<Full<Bytes>>>,
}

impl HttpEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The emitted response, if [`emit`](Emitter::emit) ran.
    pub fn take(&mut self) -> Option<http::Response<Full<Bytes>>> {
        self.response.take()
    }
}

impl Emitter for HttpEmitter {
    fn emit(&mut self, response: Response) -> Result<()> {
        self.response = Some(response.into_http());
        Ok(())
    }
}
