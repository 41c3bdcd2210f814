//! Middleware pipeline: composable logic wrapped around route handlers.
//!
//! Each layer receives the request [`Context`] and a [`Next`] cursor. It may pass
//! the request on with [`Next::run`], answer it directly, or decorate the
//! response coming back. The router's matched handler sits at the end of the
//! chain.
//!
//! Built-in layers:
//!
//! - [`RequestId`]: tags every request with an id, echoed as `X-Request-Id`
//!   and recorded on a tracing span so handler logs carry it.
//! - [`AccessLog`]: one `info` line per request with method, path, status,
//!   and elapsed time.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::Instrument;

use crate::context::Context;
use crate::router::{BoxFuture, Handler};
use crate::util::generate_unique_id;

/// Header used to carry the request id in both directions.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Type-erased, reference-counted middleware function.
pub type MiddlewareHandler<S> =
    Arc<dyn Fn(Context<S>, Next<S>) -> BoxFuture + Send + Sync + 'static>;

/// Wraps a [`Middleware`] implementation as a [`MiddlewareHandler`].
pub fn from_middleware<S, M>(middleware: Arc<M>) -> MiddlewareHandler<S>
where
    S: 'static,
    M: Middleware<S> + 'static,
{
    Arc::new(move |ctx: Context<S>, next: Next<S>| middleware.handle(ctx, next))
}

/// Cursor into the remaining middleware chain for a single request.
///
/// Consumed by [`run`](Self::run), so each layer can forward at most once.
pub struct Next<S> {
    middlewares: Vec<MiddlewareHandler<S>>,
    index: usize,
    endpoint: Handler<S>,
}

impl<S> Next<S> {
    /// Positions a cursor at the start of `middlewares`, ending in `endpoint`.
    pub fn new(middlewares: Vec<MiddlewareHandler<S>>, endpoint: Handler<S>) -> Self {
        Self {
            middlewares,
            index: 0,
            endpoint,
        }
    }

    /// Invokes the next layer, or the endpoint once every layer has run.
    pub async fn run(mut self, ctx: Context<S>) -> crate::Response {
        match self.middlewares.get(self.index).cloned() {
            Some(handler) => {
                self.index += 1;
                handler(ctx, self).await
            }
            None => (self.endpoint)(ctx).await,
        }
    }
}

/// The trait implemented by every middleware layer.
///
/// Implementations are shared across Tokio tasks, so they must be `Send + Sync`
/// and return a `Send` future. Do not hold locks across the `next.run` await.
pub trait Middleware<S>: Send + Sync {
    fn handle(&self, ctx: Context<S>, next: Next<S>) -> BoxFuture;
}

/// Assigns a request id and runs the rest of the chain inside a span carrying it.
///
/// An incoming `X-Request-Id` is reused; otherwise a fresh id from
/// [`generate_unique_id`] is minted. The id is always echoed on the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestId;

impl<S: Send + Sync + 'static> Middleware<S> for RequestId {
    fn handle(&self, ctx: Context<S>, next: Next<S>) -> BoxFuture {
        let request_id = ctx
            .request()
            .headers()
            .get(REQUEST_ID_HEADER)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(generate_unique_id);

        let span = tracing::info_span!("request", request_id = %request_id);
        Box::pin(
            async move {
                let mut response = next.run(ctx).await;
                response.set_header(REQUEST_ID_HEADER, request_id);
                response
            }
            .instrument(span),
        )
    }
}

/// Emits one structured `info` event per request once the downstream layers finish.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

impl<S: Send + Sync + 'static> Middleware<S> for AccessLog {
    fn handle(&self, ctx: Context<S>, next: Next<S>) -> BoxFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().clone();
            let path = ctx.request().path().to_owned();

            let response = next.run(ctx).await;

            tracing::info!(
                method = %method,
                path = %path,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request served"
            );
            response
        })
    }
}
