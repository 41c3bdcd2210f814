//! HTTP/1.1 protocol types: [`Method`], [`StatusCode`], [`Headers`],
//! [`Request`], and [`Response`].

use std::fmt;
use std::str::FromStr;

pub mod headers;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use request::Request;
pub use response::Response;

/// Status codes emitted by the relay and its HTTP layer.
///
/// # Examples
///
/// ```
/// use promptcache::http::StatusCode;
///
/// assert_eq!(StatusCode::UnprocessableEntity.as_u16(), 422);
/// assert_eq!(StatusCode::NotFound.to_string(), "404 Not Found");
/// assert!(StatusCode::InternalServerError.is_server_error());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    UnprocessableEntity,
    InternalServerError,
}

impl StatusCode {
    const fn parts(self) -> (u16, &'static str) {
        match self {
            Self::Ok => (200, "OK"),
            Self::BadRequest => (400, "Bad Request"),
            Self::NotFound => (404, "Not Found"),
            Self::MethodNotAllowed => (405, "Method Not Allowed"),
            Self::PayloadTooLarge => (413, "Payload Too Large"),
            Self::UnprocessableEntity => (422, "Unprocessable Entity"),
            Self::InternalServerError => (500, "Internal Server Error"),
        }
    }

    pub const fn as_u16(self) -> u16 {
        self.parts().0
    }

    pub const fn canonical_reason(self) -> &'static str {
        self.parts().1
    }

    /// `true` for 5xx codes. These are the failures worth an `error` log line.
    pub const fn is_server_error(self) -> bool {
        self.as_u16() >= 500
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (code, reason) = self.parts();
        write!(f, "{code} {reason}")
    }
}

/// Request method. Routes only register `GET` and `POST`; anything else is
/// carried through so the router can answer 404 or 405.
///
/// ```
/// use promptcache::http::Method;
///
/// assert_eq!("POST".parse::<Method>(), Ok(Method::Post));
/// assert_eq!("PURGE".parse::<Method>(), Ok(Method::Other("PURGE".into())));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Method names are case-sensitive (RFC 9110 §9.1).
impl FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            other => Self::Other(other.to_owned()),
        })
    }
}
