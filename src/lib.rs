//! Hydrogen - a minimal middleware-chain HTTP framework
//!
//! Hydrogen routes each request through one ordered chain of middleware:
//! - generic handlers that decide whether to continue with `next`
//! - route handlers bound to a method and a `/users/{id}` style pattern
//! - a built-in CORS negotiator owned by the application
//!
//! ```rust,ignore
//! use hydrogen::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> hydrogen::Result<()> {
//!     let mut app = App::new();
//!     app.cors(CorsPolicy::new().allow_origin("https://example.com"));
//!     app.get("/", |_req, res| Box::pin(async move {
//!         res.text("hello");
//!         Ok(())
//!     }))?;
//!     app.serve(Some("127.0.0.1:8000")).await
//! }
//! ```

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routing;

// CLI support for command-line argument parsing
pub mod cli;

// Re-export main types for public API
pub use app::App;
pub use config::AppConfig;
pub use error::{Error, Result};
pub use http::{Listening, Request, Response, Shutdown};
pub use middleware::{EndHandler, Handler, Middleware, Next};
pub use routing::Matcher;

pub mod prelude {
    pub use crate::app::App;
    pub use crate::config::AppConfig;
    pub use crate::error::{Error, Result};
    pub use crate::http::{Body, BodyData, Query, QueryValue, Request, Response};
    pub use crate::middleware::builtin::{
        CorsMiddleware, CorsPolicy, JsonParser, LoggingMiddleware, OriginRule, ServeStatic,
        UrlencodedParser,
    };
    pub use crate::middleware::{BoxFuture, EndHandler, Handler, Next};
    pub use async_trait::async_trait;
    pub use hyper::{Method, StatusCode};
}
