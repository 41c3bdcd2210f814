//! The `/requests` API: cache-fronted prompt generation with persistence.
//!
//! ## Flow for `POST /requests`
//!
//! 1. Validate the prompt text.
//! 2. Look it up in the [`ResponseCache`]. A hit returns the cached record; no
//!    upstream call is made and nothing new is stored.
//! 3. On a miss, call the [`Generator`], persist the pair through the
//!    [`RequestStore`], then cache the stored record under the prompt text.
//!
//! The cache lock is only taken inside `get` and `put`; it is never held while
//! the generator or the store is awaited. Two concurrent misses for the same
//! text both go upstream and both store a record; the later `put` wins.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::cache::{CacheConfig, ResponseCache};
use crate::context::Context;
use crate::database::{RequestStore, StoreError, StoredRequest};
use crate::llm::{Generator, LlmError};
use crate::middleware::{AccessLog, RequestId};
use crate::util::{InputError, format_timestamp, validate_input};
use crate::{Response, Router, StatusCode};

/// Body of `POST /requests`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub text: String,
}

/// Error body for every non-2xx answer.
#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

/// Everything a handler can fail with, mapped onto an HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("OpenAI API request failed: {0}")]
    Upstream(#[from] LlmError),

    #[error("Internal server error: {0}")]
    Store(#[from] StoreError),

    #[error("Request not found")]
    NotFound,

    #[error("{0}")]
    InvalidInput(#[from] InputError),

    #[error("{0}")]
    Unprocessable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Upstream(_) | Self::Store(_) => StatusCode::InternalServerError,
            Self::NotFound => StatusCode::NotFound,
            Self::InvalidInput(_) => StatusCode::BadRequest,
            Self::Unprocessable(_) => StatusCode::UnprocessableEntity,
        }
    }
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }
        Response::json(
            status,
            &ErrorBody {
                detail: err.to_string(),
            },
        )
    }
}

/// Long-lived service state, built once at startup and shared by every request.
pub struct AppState {
    cache: ResponseCache<StoredRequest>,
    store: Arc<dyn RequestStore>,
    generator: Arc<dyn Generator>,
}

impl AppState {
    pub fn new(
        cache_config: CacheConfig,
        store: Arc<dyn RequestStore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            cache: ResponseCache::new(cache_config),
            store,
            generator,
        }
    }

    pub fn cache(&self) -> &ResponseCache<StoredRequest> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn RequestStore> {
        &self.store
    }

    /// Answers a prompt from the cache, or generates, stores, and caches it.
    ///
    /// # Errors
    ///
    /// - [`ApiError::InvalidInput`]: the prompt failed validation.
    /// - [`ApiError::Upstream`]: the generator failed; nothing was stored or cached.
    /// - [`ApiError::Store`]: the record could not be persisted; nothing was cached.
    pub async fn create_request(&self, text: &str) -> Result<StoredRequest, ApiError> {
        let text = validate_input(text)?;

        if let Some(cached) = self.cache.get(text) {
            debug!(id = cached.id, "answered from cache");
            return Ok(cached);
        }

        let response = self.generator.generate(text).await?;
        let record = self.store.create(text, &response).await?;
        self.cache.put(text, record.clone());

        debug!(
            at = %format_timestamp(Utc::now()),
            id = record.id,
            request = %record.text,
            response = %record.response,
            "generated response"
        );
        Ok(record)
    }

    /// Reads a stored record. The cache is not consulted.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown id, [`ApiError::Store`] if the
    /// store fails.
    pub async fn get_request(&self, id: i64) -> Result<StoredRequest, ApiError> {
        self.store.get(id).await?.ok_or(ApiError::NotFound)
    }
}

async fn health(_ctx: Context<AppState>) -> Response {
    Response::json(StatusCode::Ok, &serde_json::json!({ "status": "ok" }))
}

async fn create_request(ctx: Context<AppState>) -> Response {
    let body: CreateRequest = match ctx.json() {
        Ok(body) => body,
        Err(e) => return ApiError::Unprocessable(format!("invalid request body: {e}")).into(),
    };

    match ctx.state().create_request(&body.text).await {
        Ok(record) => Response::json(StatusCode::Ok, &record),
        Err(e) => e.into(),
    }
}

async fn get_request(ctx: Context<AppState>) -> Response {
    let raw_id = ctx.params().get("id").unwrap_or_default();
    let id: i64 = match raw_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return ApiError::Unprocessable(format!("invalid request id: {raw_id:?}")).into();
        }
    };

    match ctx.state().get_request(id).await {
        Ok(record) => Response::json(StatusCode::Ok, &record),
        Err(e) => e.into(),
    }
}

/// Builds the service router with request-id and access-log middleware.
///
/// | Route                 | Handler                       |
/// |-----------------------|-------------------------------|
/// | `GET /`               | health check                  |
/// | `POST /requests`      | [`AppState::create_request`]  |
/// | `GET /requests/:id`   | [`AppState::get_request`]     |
pub fn router(state: Arc<AppState>) -> Router<AppState> {
    let mut router = Router::with_shared_state(state);
    router.layer(RequestId);
    router.layer(AccessLog);

    router.get("/", health);
    router.post("/requests", create_request);
    router.get("/requests/:id", get_request);

    let config = router.state().cache().config();
    info!(
        routes = router.len(),
        cache_ttl_secs = config.ttl.as_secs(),
        cache_max_size = config.max_size,
        "service router ready"
    );
    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for Echo {
        async fn generate(&self, text: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("echo: {text}"))
        }
    }

    fn state() -> (AppState, Arc<Echo>, Arc<MemoryStore>) {
        let generator = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(CacheConfig::default(), store.clone(), generator.clone());
        (state, generator, store)
    }

    #[tokio::test]
    async fn repeated_prompt_hits_cache() {
        let (state, generator, store) = state();
        let first = state.create_request("Hello, world!").await.unwrap();
        let second = state.create_request("Hello, world!").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.response, "echo: Hello, world!");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn different_prompts_miss() {
        let (state, generator, store) = state();
        state.create_request("a").await.unwrap();
        state.create_request("A").await.unwrap();
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn too_long_input_is_rejected_before_upstream() {
        let (state, generator, _) = state();
        let err = state.create_request(&"x".repeat(1001)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BadRequest);
        assert_eq!(err.to_string(), "Input too long.");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let (state, _, _) = state();
        let err = state.get_request(999).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
        assert_eq!(err.status(), StatusCode::NotFound);
    }

    #[test]
    fn error_statuses_and_messages() {
        let upstream = ApiError::from(LlmError::Api {
            status: 401,
            message: "bad key".into(),
        });
        assert_eq!(upstream.status(), StatusCode::InternalServerError);
        assert_eq!(
            upstream.to_string(),
            "OpenAI API request failed: API returned 401: bad key"
        );

        let store = ApiError::from(StoreError::Unavailable("disk full".into()));
        assert_eq!(store.status(), StatusCode::InternalServerError);
        assert_eq!(
            store.to_string(),
            "Internal server error: store unavailable: disk full"
        );

        let response: Response = ApiError::NotFound.into();
        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(response.body_ref(), br#"{"detail":"Request not found"}"#);
    }
}
