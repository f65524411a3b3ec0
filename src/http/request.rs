//! Request line parsing.
//!
//! Only the request line is interpreted: `GET <uri>[ HTTP/<major>.<minor>]`.
//! The URI is matched against the RFC 1945 `Request-URI` grammar (relative or
//! absolute path, optional params and query), so anything the grammar does not
//! allow simply ends the URI.

use std::borrow::Cow;

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// Version recorded for a request line that carries no version token.
pub const SIMPLE_VERSION: &str = "HTTP/0.9";

/// Building blocks of the RFC 1945 URI grammar, byte-oriented.
pub(crate) mod grammar {
    pub const ALPHANUM: &str = "A-Za-z0-9";
    pub const SAFE: &str = r"$_.\-";
    pub const EXTRA: &str = r"!*'(),";
    pub const RESERVED: &str = r";/@?:&=+";
    pub const UNSAFE: &str = r##"[:cntrl:][:space:]#%<>""##;

    pub fn national() -> String {
        format!("[^{RESERVED}{EXTRA}{UNSAFE}{ALPHANUM}{SAFE}]")
    }

    pub fn uchar() -> String {
        format!(
            "(?:[{ALPHANUM}{EXTRA}{SAFE}]|{}|%[0-9A-Fa-f]{{2}})",
            national()
        )
    }

    pub fn pchar() -> String {
        format!("(?:[@+=&:]|{})", uchar())
    }

    /// `fsegment *( "/" segment )`
    pub fn path() -> String {
        let pchar = pchar();
        format!("(?:{pchar}+(?:/{pchar}*)*)")
    }

    pub fn relative_uri() -> String {
        let pchar = pchar();
        let param = format!("(?:{pchar}|/)*");
        let params = format!("{param}(?:;{param})*");
        let query = format!("(?:{}|[{RESERVED}])*", uchar());
        let rel_path = format!("(?:{}?(?:;{params})?(?:\\?{query})?)", path());
        format!("(?:/{rel_path}|{rel_path})")
    }
}

static URI: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!("(?-u)^[[:space:]]({})", grammar::relative_uri());
    Regex::new(&pattern).expect("URI grammar is a valid regex")
});

static VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)HTTP/[0-9]+\.[0-9]+").expect("version pattern is valid"));

/// HTTP request methods understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
}

impl Method {
    /// Recognises a method token at the very start of a request line.
    ///
    /// # Example
    ///
    /// ```
    /// # use beacon::http::request::Method;
    /// assert_eq!(Method::from_prefix(b"GET /"), Some((Method::GET, 3)));
    /// assert_eq!(Method::from_prefix(b"POST /"), None);
    /// ```
    pub fn from_prefix(line: &[u8]) -> Option<(Self, usize)> {
        if line.starts_with(b"GET") {
            Some((Method::GET, 3))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
        }
    }
}

/// A parsed request line. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Raw URI bytes exactly as sent, escapes untouched.
    pub uri: Bytes,
    /// `HTTP/0.9` for a simple request, otherwise the version token verbatim.
    pub version: String,
}

/// Why a request line was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    UnsupportedMethod,
    MissingUri,
}

impl Request {
    /// Parses one request line (delimiter already stripped).
    pub fn parse_line(line: &[u8]) -> Result<Request, ParseError> {
        let (method, consumed) = Method::from_prefix(line).ok_or(ParseError::UnsupportedMethod)?;
        let rest = &line[consumed..];

        let captures = URI.captures(rest).ok_or(ParseError::MissingUri)?;
        let uri = captures.get(1).ok_or(ParseError::MissingUri)?;
        if uri.is_empty() {
            return Err(ParseError::MissingUri);
        }

        let after_uri = &rest[uri.end()..];
        let version = match VERSION.find(after_uri) {
            Some(m) => String::from_utf8_lossy(m.as_bytes()).into_owned(),
            None => SIMPLE_VERSION.to_string(),
        };

        Ok(Request {
            method,
            uri: Bytes::copy_from_slice(uri.as_bytes()),
            version,
        })
    }

    /// The URI for log output; invalid UTF-8 is replaced.
    pub fn uri_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.uri)
    }

    /// True for the legacy version-less form, answered with raw bytes only.
    pub fn is_simple(&self) -> bool {
        self.version == SIMPLE_VERSION
    }
}
