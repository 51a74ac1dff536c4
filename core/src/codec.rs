//! Incremental HTTP/1 response decoding.
//!
//! # Design
//! A `ResponseDecoder` is fed the same `BytesMut` every time more bytes land
//! in it. The head is parsed by `httparse` once it is complete; the body is
//! then taken by length, by chunks, or up to the peer's close. Chunked bodies
//! are decoded as they arrive and the decoder remembers where it stopped, so
//! no byte is looked at twice.
//!
//! A dechunked response no longer says `Transfer-Encoding: chunked`; it
//! declares a `Content-Length` matching the body instead, so rendering it
//! gives a well-formed message.

use std::fmt;
use std::io;

use bytes::{Buf, Bytes, BytesMut};

use crate::http::{HttpResponse, Version};

/// Maximum number of response headers.
pub const MAX_HEADERS: usize = 64;

/// Maximum size of the status line plus header block.
pub const HEADER_LIMIT: usize = 8 * 1024;

/// Maximum size of a decoded body.
pub const BODY_LIMIT: usize = 8 * 1024 * 1024;

/// Reasons a response could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The status line or headers are not valid HTTP/1.
    Malformed(String),

    /// The header block exceeds `HEADER_LIMIT`.
    HeaderTooLarge,

    /// The body exceeds `BODY_LIMIT`.
    BodyTooLarge,

    /// `Content-Length` is not a number, or several disagree.
    BadContentLength,

    /// A chunk size line or chunk terminator is invalid.
    BadChunk,

    /// The peer closed the connection in the middle of a message.
    PartialMessage,

    /// The peer closed the connection before sending anything.
    EndOfStream,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Malformed(msg) => write!(f, "malformed response: {msg}"),
            ParseError::HeaderTooLarge => write!(f, "header limit exceeded"),
            ParseError::BodyTooLarge => write!(f, "body limit exceeded"),
            ParseError::BadContentLength => write!(f, "bad Content-Length"),
            ParseError::BadChunk => write!(f, "bad chunk"),
            ParseError::PartialMessage => write!(f, "partial message"),
            ParseError::EndOfStream => write!(f, "end of stream"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for io::Error {
    fn from(err: ParseError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

/// How the end of the body is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Empty,
    Length(usize),
    Chunked,
    UntilClose,
}

impl Framing {
    fn of(status: u16, headers: &[(String, String)]) -> Result<Self, ParseError> {
        if (100..200).contains(&status) || status == 204 || status == 304 {
            return Ok(Framing::Empty);
        }

        let chunked = headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("transfer-encoding"))
            .filter_map(|(_, value)| value.rsplit(',').next())
            .last()
            .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
        if chunked {
            return Ok(Framing::Chunked);
        }

        let mut length = None;
        for (_, value) in headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        {
            let n: usize = value
                .trim()
                .parse()
                .map_err(|_| ParseError::BadContentLength)?;
            match length {
                Some(prev) if prev != n => return Err(ParseError::BadContentLength),
                _ => length = Some(n),
            }
        }
        Ok(length.map_or(Framing::UntilClose, Framing::Length))
    }
}

/// Progress through a chunked body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Chunk {
    /// Expecting a chunk-size line.
    #[default]
    Size,
    /// Inside chunk data, with this many bytes still to come.
    Data(usize),
    /// Expecting the CRLF that closes a chunk.
    DataEnd,
    /// After the last chunk, expecting trailer lines up to an empty one.
    Trailers,
}

/// Status line and headers of the response being decoded.
#[derive(Debug)]
struct Head {
    version: Version,
    status: u16,
    reason: String,
    headers: Vec<(String, String)>,
    framing: Framing,
}

/// Decodes one response from a read buffer that grows between calls.
///
/// Bytes are consumed from the buffer as soon as they are understood: the
/// head once it is complete, chunk framing and data as they arrive. Body
/// bytes are examined once however the response is split across reads.
#[derive(Debug, Default)]
pub struct ResponseDecoder {
    head: Option<Head>,
    body: BytesMut,
    chunk: Chunk,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances decoding with whatever `buf` holds now.
    ///
    /// Returns `Ok(None)` when more bytes are needed. `eof` tells the decoder
    /// the peer has closed: a body without explicit framing ends there, and
    /// anything still incomplete becomes an error. Bytes following the
    /// message are left in `buf`.
    pub fn decode(
        &mut self,
        buf: &mut BytesMut,
        eof: bool,
    ) -> Result<Option<HttpResponse>, ParseError> {
        let framing = match self.head.as_ref().map(|head| head.framing) {
            Some(framing) => framing,
            None => match parse_head(buf)? {
                Some(head) => {
                    let framing = head.framing;
                    self.head = Some(head);
                    framing
                }
                None => return incomplete(buf, eof),
            },
        };

        let complete = match framing {
            Framing::Empty => true,
            Framing::Length(n) => {
                let complete = buf.len() >= n;
                if complete {
                    self.body = buf.split_to(n);
                }
                complete
            }
            Framing::Chunked => self.decode_chunks(buf)?,
            Framing::UntilClose => {
                if buf.len() > BODY_LIMIT {
                    return Err(ParseError::BodyTooLarge);
                }
                if eof {
                    self.body = buf.split();
                }
                eof
            }
        };
        if !complete {
            return if eof {
                Err(ParseError::PartialMessage)
            } else {
                Ok(None)
            };
        }

        let body = self.body.split().freeze();
        self.chunk = Chunk::Size;
        Ok(self.head.take().map(|mut head| {
            if head.framing == Framing::Chunked {
                unchunk(&mut head.headers, body.len());
            }
            HttpResponse {
                version: head.version,
                status: head.status,
                reason: head.reason,
                headers: head.headers,
                body,
            }
        }))
    }

    /// Consumes chunk framing and data from `buf`. Returns `true` once the
    /// terminating chunk and trailers have been consumed.
    fn decode_chunks(&mut self, buf: &mut BytesMut) -> Result<bool, ParseError> {
        loop {
            match self.chunk {
                Chunk::Size => match httparse::parse_chunk_size(buf) {
                    Ok(httparse::Status::Complete((used, 0))) => {
                        buf.advance(used);
                        self.chunk = Chunk::Trailers;
                    }
                    Ok(httparse::Status::Complete((used, size))) => {
                        let size = usize::try_from(size)
                            .ok()
                            .filter(|&size| self.body.len().saturating_add(size) <= BODY_LIMIT)
                            .ok_or(ParseError::BodyTooLarge)?;
                        buf.advance(used);
                        self.chunk = Chunk::Data(size);
                    }
                    Ok(httparse::Status::Partial) => return line_pending(buf),
                    Err(_) => return Err(ParseError::BadChunk),
                },
                Chunk::Data(remaining) => {
                    if buf.is_empty() {
                        return Ok(false);
                    }
                    let take = remaining.min(buf.len());
                    self.body.extend_from_slice(&buf.split_to(take));
                    self.chunk = match remaining - take {
                        0 => Chunk::DataEnd,
                        left => Chunk::Data(left),
                    };
                }
                Chunk::DataEnd => {
                    if buf.len() < 2 {
                        return Ok(false);
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(ParseError::BadChunk);
                    }
                    buf.advance(2);
                    self.chunk = Chunk::Size;
                }
                Chunk::Trailers => match find_crlf(buf) {
                    Some(0) => {
                        buf.advance(2);
                        return Ok(true);
                    }
                    Some(len) => buf.advance(len + 2),
                    None => return line_pending(buf),
                },
            }
        }
    }
}

/// Parses and consumes the status line and headers, or returns `None` if
/// they are not complete yet.
fn parse_head(buf: &mut BytesMut) -> Result<Option<Head>, ParseError> {
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Response::new(&mut slots);
    let head_len = match parsed.parse(buf) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => {
            if buf.len() > HEADER_LIMIT {
                return Err(ParseError::HeaderTooLarge);
            }
            return Ok(None);
        }
        Err(err) => return Err(ParseError::Malformed(err.to_string())),
    };
    if head_len > HEADER_LIMIT {
        return Err(ParseError::HeaderTooLarge);
    }

    let version = Version::from_minor(parsed.version.unwrap_or(1));
    let status = parsed.code.unwrap_or_default();
    let reason = parsed.reason.unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = parsed
        .headers
        .iter()
        .map(|h| {
            (
                h.name.to_string(),
                String::from_utf8_lossy(h.value).into_owned(),
            )
        })
        .collect();

    let framing = Framing::of(status, &headers)?;
    if let Framing::Length(n) = framing {
        if n > BODY_LIMIT {
            return Err(ParseError::BodyTooLarge);
        }
    }
    buf.advance(head_len);
    Ok(Some(Head {
        version,
        status,
        reason,
        headers,
        framing,
    }))
}

fn incomplete(buf: &BytesMut, eof: bool) -> Result<Option<HttpResponse>, ParseError> {
    match (eof, buf.is_empty()) {
        (false, _) => Ok(None),
        (true, true) => Err(ParseError::EndOfStream),
        (true, false) => Err(ParseError::PartialMessage),
    }
}

/// A chunk-size or trailer line has not ended yet.
fn line_pending(buf: &BytesMut) -> Result<bool, ParseError> {
    if buf.len() > HEADER_LIMIT {
        return Err(ParseError::BadChunk);
    }
    Ok(false)
}

/// Rewrites the headers of a dechunked message so they describe the body as
/// it is now held: `chunked` leaves `Transfer-Encoding` and the length is
/// declared instead.
fn unchunk(headers: &mut Vec<(String, String)>, len: usize) {
    headers.retain_mut(|(name, value)| {
        if name.eq_ignore_ascii_case("content-length") {
            return false;
        }
        if !name.eq_ignore_ascii_case("transfer-encoding") {
            return true;
        }
        let kept = value
            .split(',')
            .map(str::trim)
            .filter(|coding| !coding.is_empty() && !coding.eq_ignore_ascii_case("chunked"))
            .collect::<Vec<_>>()
            .join(", ");
        if kept.is_empty() {
            return false;
        }
        *value = kept;
        true
    });
    headers.push(("Content-Length".to_string(), len.to_string()));
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}
