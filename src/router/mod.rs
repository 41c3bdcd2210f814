//! Request routing: map methods and URL patterns to handler functions.
//!
//! Two pattern styles are supported:
//!
//! | Pattern          | Example match    | Captured params |
//! |------------------|------------------|-----------------|
//! | `/requests`      | `/requests`      | *(none)*        |
//! | `/requests/:id`  | `/requests/42`   | `id → "42"`     |
//!
//! Trailing slashes are normalized on both patterns and incoming paths. Routes are
//! matched in registration order and the first match wins. A path that matches
//! some route under a different method yields `405`; an unknown path yields `404`.
//!
//! The matched handler runs at the end of the router's middleware chain (see
//! [`crate::middleware`]), so middleware also sees requests that end in 404/405.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Context, PathParams};
use crate::middleware::{Middleware, MiddlewareHandler, Next, from_middleware};
use crate::{Method, Request, Response, StatusCode};

/// Boxed response future shared by handlers and middleware.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Type-erased async handler over application state `S`.
pub type Handler<S> = Arc<dyn Fn(Context<S>) -> BoxFuture + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context<S>) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this through the blanket impl, so the
/// router methods accept plain `async` closures and `async fn`s.
pub trait IntoHandler<S>: Send + Sync + 'static {
    fn call(&self, ctx: Context<S>) -> BoxFuture;
}

impl<S, T, F> IntoHandler<S> for T
where
    T: Fn(Context<S>) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context<S>) -> BoxFuture {
        Box::pin((self)(ctx))
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

// Compiled form of a route pattern string.
#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

impl Pattern {
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s.strip_prefix(':') {
                    Some(name) => Segment::Parameter(name.to_string()),
                    None => Segment::Static(s.to_string()),
                })
                .collect();
            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_string())
    }

    fn matches(&self, path: &str) -> Option<PathParams> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(PathParams::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut params = PathParams::new();
                for (seg, path_seg) in segments.iter().zip(path_segments) {
                    match seg {
                        Segment::Static(s) if s != path_seg => return None,
                        Segment::Static(_) => {}
                        Segment::Parameter(name) => {
                            params.insert(name.clone(), path_seg.to_string());
                        }
                    }
                }
                Some(params)
            }
        }
    }
}

struct Route<S> {
    method: Method,
    pattern: Pattern,
    handler: Handler<S>,
}

/// HTTP router over application state `S`.
///
/// The state is wrapped in an [`Arc`] once and handed to every request through
/// its [`Context`].
///
/// # Examples
///
/// ```rust,no_run
/// use promptcache::{Response, Router, StatusCode};
/// use promptcache::context::Context;
///
/// let mut router = Router::new(());
/// router.get("/", |_ctx: Context<()>| async { Response::new(StatusCode::Ok) });
/// router.get("/requests/:id", |ctx: Context<()>| async move {
///     let id = ctx.params().get("id").unwrap_or_default().to_owned();
///     Response::new(StatusCode::Ok).body(id)
/// });
/// ```
pub struct Router<S> {
    routes: Vec<Route<S>>,
    middleware: Vec<MiddlewareHandler<S>>,
    state: Arc<S>,
}

impl<S: Send + Sync + 'static> Router<S> {
    /// Creates an empty router owning `state`.
    pub fn new(state: S) -> Self {
        Self::with_shared_state(Arc::new(state))
    }

    /// Creates an empty router over state that is already shared.
    pub fn with_shared_state(state: Arc<S>) -> Self {
        Self {
            routes: Vec::new(),
            middleware: Vec::new(),
            state,
        }
    }

    /// The state handed to every handler through [`Context::state`].
    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    /// Registers a `GET` route. `path` may contain `:name` segments.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler<S>) {
        self.add_route(Method::Get, path, handler);
    }

    /// Registers a `POST` route.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler<S>) {
        self.add_route(Method::Post, path, handler);
    }

    /// Appends a middleware layer. Layers run in the order they are added,
    /// outermost first.
    pub fn layer<M>(&mut self, middleware: M)
    where
        M: Middleware<S> + 'static,
    {
        self.middleware.push(from_middleware(Arc::new(middleware)));
    }

    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler<S>) {
        let handler: Handler<S> = Arc::new(move |ctx: Context<S>| handler.call(ctx));
        self.routes.push(Route {
            method,
            pattern: Pattern::parse(path),
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    // Picks the endpoint for a request: the first route matching both method and
    // path, else a 405 or 404 responder.
    fn resolve(&self, method: &Method, path: &str) -> (Handler<S>, PathParams) {
        let mut path_matched = false;
        for route in &self.routes {
            if let Some(params) = route.pattern.matches(path) {
                if &route.method == method {
                    return (Arc::clone(&route.handler), params);
                }
                path_matched = true;
            }
        }

        let status = if path_matched {
            StatusCode::MethodNotAllowed
        } else {
            StatusCode::NotFound
        };
        let fallback: Handler<S> = Arc::new(move |_ctx: Context<S>| -> BoxFuture {
            Box::pin(async move {
                Response::json(
                    status,
                    &serde_json::json!({ "detail": status.canonical_reason() }),
                )
            })
        });
        (fallback, PathParams::new())
    }

    /// Runs `request` through the middleware chain and the matching handler.
    pub async fn route(&self, request: Request) -> Response {
        let (endpoint, params) = self.resolve(request.method(), request.path());
        let ctx = Context::with_params(request, params, Arc::clone(&self.state));

        Next::new(self.middleware.clone(), endpoint).run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    #[test]
    fn pattern_parse_exact_strips_trailing_slash() {
        assert!(matches!(Pattern::parse("/requests/"), Pattern::Exact(s) if s == "/requests"));
        assert!(matches!(Pattern::parse("/"), Pattern::Exact(s) if s == "/"));
    }

    #[test]
    fn pattern_parse_parameterized() {
        match Pattern::parse("/requests/:id") {
            Pattern::Parameterized { segments } => {
                assert_eq!(segments.len(), 2);
                assert!(matches!(&segments[0], Segment::Static(s) if s == "requests"));
                assert!(matches!(&segments[1], Segment::Parameter(s) if s == "id"));
            }
            other => panic!("expected Parameterized, got {other:?}"),
        }
    }

    #[test]
    fn pattern_exact_matching() {
        let pat = Pattern::parse("/requests");
        assert!(pat.matches("/requests").is_some());
        assert!(pat.matches("/requests/").is_some());
        assert!(pat.matches("/other").is_none());
    }

    #[test]
    fn pattern_param_extracts_value() {
        let pat = Pattern::parse("/requests/:id");
        let params = pat.matches("/requests/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert!(pat.matches("/requests").is_none());
        assert!(pat.matches("/requests/42/extra").is_none());
        assert!(pat.matches("/answers/42").is_none());
    }

    #[tokio::test]
    async fn empty_router_returns_404() {
        let router = Router::new(());
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn wrong_method_returns_405() {
        let mut router = Router::new(());
        router.post("/requests", |_ctx: Context<()>| async {
            Response::new(StatusCode::Ok)
        });
        let res = router.route(make_request("GET", "/requests")).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let mut router = Router::new(());
        router.get("/path", |_ctx: Context<()>| async { Response::new(StatusCode::Ok) });
        router.get("/path", |_ctx: Context<()>| async {
            Response::new(StatusCode::BadRequest)
        });
        let res = router.route(make_request("GET", "/path")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn handler_sees_params_and_state() {
        let mut router = Router::new(String::from("state"));
        router.get("/requests/:id", |ctx: Context<String>| async move {
            let body = format!("{}:{}", ctx.state(), ctx.params().get("id").unwrap_or(""));
            Response::new(StatusCode::Ok).body(body)
        });
        let res = router.route(make_request("GET", "/requests/9")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.body_ref(), b"state:9");
    }
}
