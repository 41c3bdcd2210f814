//! # promptcache
//!
//! A small HTTP service that relays text prompts to an OpenAI-compatible API,
//! records every prompt/response pair, and keeps an in-process
//! [`ResponseCache`](cache::ResponseCache) so repeated prompts are answered
//! without another upstream call.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use promptcache::cache::CacheConfig;
//! use promptcache::database::MemoryStore;
//! use promptcache::llm::{OpenAiClient, OpenAiConfig};
//! use promptcache::server::Server;
//! use promptcache::service::{self, AppState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = OpenAiClient::new(OpenAiConfig::new("sk-..."))?;
//!     let state = AppState::new(
//!         CacheConfig::default(),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(generator),
//!     );
//!     let router = Arc::new(service::router(Arc::new(state)));
//!
//!     let server = Server::bind("127.0.0.1:8000").await?;
//!     server
//!         .run(move |req| {
//!             let router = Arc::clone(&router);
//!             async move { router.route(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod database;
pub mod http;
pub mod llm;
pub mod middleware;
pub mod router;
pub mod server;
pub mod service;
pub mod util;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
