//! HTTP message types exchanged by a session.
//!
//! # Design
//! Requests and responses are plain data. `HttpRequest::encode` produces the
//! exact bytes written to the channel, and `HttpResponse` values come out of
//! `codec::ResponseDecoder`. Neither type touches the network, so the session
//! state machine stays the only place where I/O happens.

use std::fmt;
use std::io::{self, Write};

use bytes::Bytes;

use crate::params::{SessionParams, USER_AGENT};

/// HTTP method for a request. A session only ever issues `GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
        }
    }
}

/// Protocol version declared on the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    /// Selects the version from the optional command-line argument.
    ///
    /// Only the literal `"1.0"` selects HTTP/1.0; any other text, or no
    /// argument at all, selects HTTP/1.1.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some("1.0") => Version::Http10,
            _ => Version::Http11,
        }
    }

    pub(crate) fn from_minor(minor: u8) -> Self {
        if minor == 0 {
            Version::Http10
        } else {
            Version::Http11
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The request a session sends.
///
/// Built once from the session parameters by `HttpRequest::get` and never
/// modified after it has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub target: String,
    pub version: Version,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Builds the GET request for `params` with its `Host` and `User-Agent`
    /// headers.
    pub fn get(params: &SessionParams) -> Self {
        HttpRequest {
            method: HttpMethod::Get,
            target: params.target.clone(),
            version: params.version,
            headers: vec![
                ("Host".to_string(), params.host.clone()),
                ("User-Agent".to_string(), USER_AGENT.to_string()),
            ],
        }
    }

    /// Returns the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Serializes the request: request line, headers in insertion order and
    /// the blank line. There is no body.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!(
            "{} {} {}\r\n",
            self.method.as_str(),
            self.target,
            self.version
        );
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.into_bytes()
    }
}

/// A complete response as received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub version: Version,
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    /// Body with the chunked coding removed. The headers of a dechunked
    /// response carry a matching `Content-Length`.
    pub body: Bytes,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Writes the status line, headers and raw body bytes to `out`.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{} {} {}\r\n", self.version, self.status, self.reason)?;
        for (name, value) in &self.headers {
            write!(out, "{name}: {value}\r\n")?;
        }
        out.write_all(b"\r\n")?;
        out.write_all(&self.body)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
