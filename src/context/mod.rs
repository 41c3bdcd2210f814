//! Per-request context handed to route handlers and middleware.
//!
//! A [`Context`] bundles the parsed [`Request`], the path parameters captured by
//! the router, and a shared handle to the application state `S`. The state is
//! created once at startup and reference-counted into every request, so handlers
//! reach long-lived services through it instead of through globals.

use std::collections::HashMap;
use std::sync::Arc;

use crate::Request;

/// Named path segments captured from a `:param` route pattern.
#[derive(Default, Debug, Clone)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Everything a handler needs for one request.
pub struct Context<S> {
    request: Request,
    params: PathParams,
    state: Arc<S>,
}

impl<S> Context<S> {
    pub fn new(request: Request, state: Arc<S>) -> Self {
        Self::with_params(request, PathParams::new(), state)
    }

    pub fn with_params(request: Request, params: PathParams, state: Arc<S>) -> Self {
        Self {
            request,
            params,
            state,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Shared application state.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Deserializes the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct Body {
        text: String,
    }

    fn request(raw: &[u8]) -> Request {
        Request::parse(raw).unwrap().0
    }

    #[test]
    fn json_body_deserializes() {
        let ctx = Context::new(
            request(b"POST / HTTP/1.1\r\nContent-Length: 15\r\n\r\n{\"text\":\"hey\"}\n"),
            Arc::new(()),
        );
        let body: Body = ctx.json().unwrap();
        assert_eq!(body.text, "hey");
    }

    #[test]
    fn json_rejects_garbage() {
        let ctx = Context::new(
            request(b"POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\nnot"),
            Arc::new(()),
        );
        assert!(ctx.json::<Body>().is_err());
    }

    #[test]
    fn state_is_shared() {
        let state = Arc::new(41_u32);
        let ctx = Context::new(request(b"GET / HTTP/1.1\r\n\r\n"), Arc::clone(&state));
        assert_eq!(*ctx.state() + 1, 42);
        assert_eq!(Arc::strong_count(&state), 2);
    }

    #[test]
    fn params_lookup() {
        let mut params = PathParams::new();
        params.insert("id".into(), "7".into());
        let ctx = Context::with_params(request(b"GET /r/7 HTTP/1.1\r\n\r\n"), params, Arc::new(()));
        assert_eq!(ctx.params().get("id"), Some("7"));
        assert_eq!(ctx.params().get("other"), None);
    }
}
