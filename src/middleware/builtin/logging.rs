//! Request logging middleware for Hydrogen
//!
//! Logs each request after the downstream chain has completed, so the final
//! status is known. The log level follows the status class: 5xx at `error`,
//! 4xx at `warn`, everything else at `info`. Use `RUST_LOG=warn` to keep only
//! failing requests.

use crate::error::Result;
use crate::http::{Request, Response};
use crate::middleware::{Handler, Next};
use async_trait::async_trait;
use log::Level;
use std::time::{Duration, Instant};

/// HTTP request logging middleware
///
/// # Example
///
/// ```rust,ignore
/// use hydrogen::middleware::builtin::LoggingMiddleware;
///
/// app.use_middleware(LoggingMiddleware::new().with_emoji());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    emoji: bool,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix lines with 🚀, or 🐛 for server errors
    pub fn with_emoji(mut self) -> Self {
        self.emoji = true;
        self
    }

    fn line(&self, req: &Request, res: &Response, elapsed: Duration) -> String {
        let status = res.status().as_u16();
        let prefix = match (self.emoji, status >= 500) {
            (false, _) => "",
            (true, false) => "🚀 ",
            (true, true) => "🐛 ",
        };
        let mut line = format!(
            "{}[{}] {} - {} ({:.2}ms)",
            prefix,
            req.method,
            req.uri(),
            status,
            elapsed.as_secs_f64() * 1000.0
        );
        if let Some(error) = req.error.as_deref().filter(|_| status >= 400) {
            line.push_str(" - ");
            line.push_str(error);
        }
        line
    }
}

/// Log level for a response status
pub fn level_for(status: u16) -> Level {
    match status {
        500..=u16::MAX => Level::Error,
        400..=499 => Level::Warn,
        _ => Level::Info,
    }
}

#[async_trait]
impl Handler for LoggingMiddleware {
    async fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<()> {
        let start = Instant::now();
        let result = next.run(req, res).await;
        let elapsed = start.elapsed();

        match &result {
            Err(e) => log::error!(
                "[{}] {} failed after {:.2}ms: {} ({})",
                req.method,
                req.uri(),
                elapsed.as_secs_f64() * 1000.0,
                e,
                e.error_code()
            ),
            Ok(()) => {
                let level = level_for(res.status().as_u16());
                if log::log_enabled!(level) {
                    log::log!(level, "{}", self.line(req, res, elapsed));
                }
            }
        }

        result
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}
