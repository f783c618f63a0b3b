//! Hydrogen middleware system
//!
//! The application owns one ordered [`MiddlewareChain`]. Each entry is either a
//! generic [`Handler`] or a [`PathHandler`] bound to a method and a compiled route
//! pattern. Requests walk the chain in registration order; see [`chain`] for the
//! walk itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use hydrogen::prelude::*;
//!
//! let mut app = App::new();
//! app.use_middleware(LoggingMiddleware::new());
//! app.get("/users/{id}", |req, res| Box::pin(async move {
//!     let id = req.param("id").unwrap_or_default().to_string();
//!     res.json(&serde_json::json!({ "id": id }))
//! }))?;
//! ```

pub mod builtin;
pub mod chain;
pub mod traits;

pub use chain::{execute, Next};
pub use traits::{BoxFuture, EndFn, EndHandler, Handler, HandlerFn};

use crate::error::Result;
use crate::routing::{Matcher, Params};
use hyper::Method;
use std::sync::Arc;

/// A terminal handler bound to a method and a compiled route pattern
#[derive(Clone)]
pub struct PathHandler {
    method: Method,
    matcher: Matcher,
    handler: Arc<dyn EndHandler>,
}

impl PathHandler {
    /// Compile `pattern` and bind it to `handler`
    pub fn new<H: EndHandler>(method: Method, pattern: &str, handler: H) -> Result<Self> {
        Ok(Self {
            method,
            matcher: Matcher::compile(pattern)?,
            handler: Arc::new(handler),
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn handler(&self) -> &Arc<dyn EndHandler> {
        &self.handler
    }

    /// Params for `path` if both the method and the pattern match
    pub fn matches(&self, method: &Method, path: &str) -> Option<Params> {
        if self.method != *method {
            return None;
        }
        self.matcher.matches(path)
    }
}

impl std::fmt::Debug for PathHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathHandler")
            .field("method", &self.method)
            .field("pattern", &self.pattern())
            .finish()
    }
}

/// One entry of the middleware chain
#[derive(Clone)]
pub enum Middleware {
    Handler(Arc<dyn Handler>),
    Path(PathHandler),
}

impl Middleware {
    pub fn handler<H: Handler>(handler: H) -> Self {
        Self::Handler(Arc::new(handler))
    }

    pub fn is_path_handler(&self) -> bool {
        matches!(self, Middleware::Path(_))
    }

    pub fn as_path_handler(&self) -> Option<&PathHandler> {
        match self {
            Middleware::Path(route) => Some(route),
            Middleware::Handler(_) => None,
        }
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Middleware::Handler(handler) => write!(f, "Handler({})", handler.name()),
            Middleware::Path(route) => write!(f, "Path({} {})", route.method(), route.pattern()),
        }
    }
}

impl From<PathHandler> for Middleware {
    fn from(route: PathHandler) -> Self {
        Middleware::Path(route)
    }
}

/// Ordered, append-only list of middleware
#[derive(Debug, Clone, Default)]
pub struct MiddlewareChain {
    entries: Vec<Middleware>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Middleware) {
        log::debug!("Registered middleware #{}: {:?}", self.entries.len(), middleware);
        self.entries.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of route entries in the chain
    pub fn route_count(&self) -> usize {
        self.entries.iter().filter(|m| m.is_path_handler()).count()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Middleware> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Middleware] {
        &self.entries
    }
}
