//! HTTP/1.1 response builder and wire serialization.

use std::fmt::Write as _;

use bytes::{BufMut, BytesMut};
use serde::Serialize;

use super::{Headers, StatusCode};

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use promptcache::http::{Response, StatusCode};
///
/// let body = serde_json::json!({"detail": "Request not found"});
/// let response = Response::json(StatusCode::NotFound, &body);
/// assert_eq!(response.header_value("content-type"), Some("application/json"));
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// Builds a response whose body is `value` serialized as JSON.
    ///
    /// Serialization failure yields a plain `500` instead.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status)
                .header("Content-Type", "application/json")
                .body_bytes(body),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response body");
                Self::new(StatusCode::InternalServerError).body("Internal server error")
            }
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets a header in place, replacing any existing value. Used by middleware
    /// that decorates a response it did not build.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Chooses between `Connection: keep-alive` and `Connection: close`.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body_ref(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response in HTTP/1.1 wire format.
    ///
    /// A non-empty body without a content type is sent as UTF-8 text.
    /// `Content-Length` and `Connection` are always written by this method,
    /// overriding any caller-set values.
    pub fn into_bytes(self) -> BytesMut {
        let Self {
            status,
            mut headers,
            body,
            keep_alive,
        } = self;

        if !body.is_empty() && !headers.contains("content-type") {
            headers.append("Content-Type", "text/plain; charset=utf-8");
        }
        headers.set("Content-Length", body.len().to_string());
        headers.set("Connection", if keep_alive { "keep-alive" } else { "close" });

        let mut buf = BytesMut::with_capacity(64 + headers.len() * 48 + body.len());
        // Writing into a BytesMut cannot fail.
        let _ = write!(buf, "HTTP/1.1 {status}\r\n");
        for (name, value) in headers.iter() {
            let _ = write!(buf, "{name}: {value}\r\n");
        }
        buf.put_slice(b"\r\n");
        buf.put_slice(&body);
        buf
    }
}
