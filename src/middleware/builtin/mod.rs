//! Built-in middleware implementations
//!
//! Ordinary [`Handler`](crate::middleware::Handler)s with no special standing in
//! the executor. Register them with `App::use_middleware` like any other.

pub mod cors;
pub mod logging;
pub mod parser;
pub mod static_files;

pub use cors::{is_allowed, negotiate, CorsMiddleware, CorsPolicy, OriginRule};
pub use logging::LoggingMiddleware;
pub use parser::{JsonParser, UrlencodedParser};
pub use static_files::ServeStatic;
