//! HTTP/1.1 request parsing on top of [`httparse`].

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};

/// Largest request body the parser accepts (8 MiB).
pub const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid Content-Length header: {value:?}")]
    InvalidContentLength { value: String },

    #[error("request body exceeds maximum allowed size of {max_bytes} bytes")]
    BodyTooLarge { max_bytes: usize },
}

/// A parsed HTTP/1.1 request.
///
/// [`Request::parse`] only needs the head to be complete; the returned offset
/// plus [`content_length`](Request::content_length) tells the caller how many
/// bytes the whole message spans. The body holds at most `Content-Length` bytes
/// of whatever followed the head in the buffer.
///
/// # Examples
///
/// ```
/// use promptcache::http::request::Request;
///
/// let raw = b"POST /requests HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}";
/// let (request, offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "POST");
/// assert_eq!(request.path(), "/requests");
/// assert_eq!(&request.body()[..], b"{}");
/// assert_eq!(offset + request.content_length(), raw.len());
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    content_length: usize,
    body: Bytes,
}

impl Request {
    const MAX_HEADERS: usize = 64;

    /// Parses a request head (and as much of the body as is present) from `buf`.
    ///
    /// Returns the request and the byte offset at which the body starts.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: the head has not fully arrived yet.
    /// - [`RequestError::Parse`]: the head is malformed.
    /// - [`RequestError::MissingField`]: method, path, or version is absent.
    /// - [`RequestError::InvalidContentLength`]: `Content-Length` is not a number.
    /// - [`RequestError::BodyTooLarge`]: `Content-Length` exceeds [`MAX_BODY_SIZE`].
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = match raw_req.method {
            Some(m) => m.parse().unwrap_or_else(|never| match never {}),
            None => return Err(RequestError::MissingField { field: "method" }),
        };

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;
        // Routing ignores the query string.
        let path = raw_path
            .split_once('?')
            .map_or(raw_path, |(path, _)| path)
            .to_owned();

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        // Fields with non-UTF-8 values are dropped.
        let header_map: Headers = raw_req
            .headers
            .iter()
            .filter_map(|h| Some((h.name, std::str::from_utf8(h.value).ok()?)))
            .collect();

        let content_length = match header_map.get("content-length") {
            Some(value) => {
                value
                    .trim()
                    .parse()
                    .map_err(|_| RequestError::InvalidContentLength {
                        value: value.to_owned(),
                    })?
            }
            None => 0,
        };
        if content_length > MAX_BODY_SIZE {
            return Err(RequestError::BodyTooLarge {
                max_bytes: MAX_BODY_SIZE,
            });
        }

        let available = &buf[body_offset..];
        let body = Bytes::copy_from_slice(&available[..available.len().min(content_length)]);

        Ok((
            Self {
                method,
                path,
                version,
                headers: header_map,
                content_length,
                body,
            },
            body_offset,
        ))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Declared body length; `0` when no `Content-Length` header was sent.
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Whether the connection should stay open after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive; HTTP/1.0 only with an explicit
    /// `Connection: keep-alive`.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }
}
