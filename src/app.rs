use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::http::server::{self, install_signal_handler, Listening, Shutdown};
use crate::http::{Request, Response};
use crate::middleware::builtin::{CorsMiddleware, CorsPolicy, ServeStatic};
use crate::middleware::{
    execute, BoxFuture, EndFn, EndHandler, Handler, HandlerFn, Middleware, MiddlewareChain, Next,
    PathHandler,
};
use futures::FutureExt;
use hyper::header::{HeaderValue, CONNECTION, CONTENT_TYPE};
use hyper::{Method, StatusCode};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Methods a route can be registered for
pub const ROUTE_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

/// A Hydrogen application: one middleware chain, one CORS policy
///
/// Registration happens before [`App::listen`]; the chain is frozen once the app
/// is moved into the server.
pub struct App {
    middleware: MiddlewareChain,
    cors: Arc<CorsPolicy>,
    config: Arc<AppConfig>,
    shutdown: Shutdown,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Build an app from configuration
    ///
    /// Registers CORS and static file middleware when their sections are enabled.
    pub fn with_config(config: AppConfig) -> Self {
        let mut app = Self {
            middleware: MiddlewareChain::new(),
            cors: Arc::new(CorsPolicy::default()),
            config: Arc::new(config),
            shutdown: Shutdown::new(),
        };

        let config = Arc::clone(&app.config);
        if config.cors.enabled {
            match config.cors.to_policy() {
                Ok(policy) => {
                    app.cors(policy);
                }
                Err(e) => log::error!("Ignoring [cors] section: {}", e),
            }
        }

        if config.static_files.enabled {
            log::debug!(
                "Configured static files: {} -> {}",
                config.static_files.url_prefix,
                config.static_files.directory
            );
            app.use_middleware(
                ServeStatic::new(&config.static_files.directory)
                    .prefix(&config.static_files.url_prefix),
            );
        }

        app
    }

    pub fn from_file(config_path: &str) -> Result<Self> {
        let config = AppConfig::from_file(config_path)?;
        Ok(Self::with_config(config))
    }

    pub fn from_env() -> Result<Self> {
        let config = AppConfig::from_env()?;
        Ok(Self::with_config(config))
    }

    /// Create an app from command-line flags
    ///
    /// `--config` selects a TOML file (environment overrides still apply);
    /// without it configuration comes from the environment. `--host` and
    /// `--port` override whatever was loaded.
    pub fn with_args() -> Result<Self> {
        let args = CliArgs::parse()?;
        if args.is_help() {
            CliArgs::print_help();
            std::process::exit(0);
        }

        let mut config = if let Some(config_path) = args.config_path() {
            log::info!("Loading configuration from CLI: {}", config_path.display());
            AppConfig::from_file(config_path)?
        } else {
            AppConfig::from_env()?
        };

        if let Some(host) = args.host {
            config.server.host = host;
        }
        if let Some(port) = args.port {
            config.server.port = port;
        }
        config.validate()?;

        Ok(Self::with_config(config))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cors_policy(&self) -> &Arc<CorsPolicy> {
        &self.cors
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Append a generic middleware
    pub fn use_middleware<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.middleware.push(Middleware::handler(handler));
        self
    }

    /// Append a closure middleware
    pub fn use_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response, Next<'a>) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.use_middleware(HandlerFn::new(f))
    }

    /// Set the application CORS policy and append the CORS middleware
    pub fn cors(&mut self, policy: CorsPolicy) -> &mut Self {
        policy.validate();
        self.cors = Arc::new(policy.clone());
        self.use_middleware(CorsMiddleware::with_policy(policy))
    }

    /// Register a terminal handler for `method` and `pattern`
    pub fn route<H: EndHandler>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<&mut Self> {
        if !ROUTE_METHODS.contains(&method) {
            return Err(Error::config(format!(
                "Routes cannot be registered for {} {}",
                method, pattern
            )));
        }
        let route = PathHandler::new(method, pattern, handler)?;
        self.middleware.push(route.into());
        Ok(self)
    }

    pub fn get<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self>
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::GET, pattern, EndFn::new(f))
    }

    pub fn post<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self>
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::POST, pattern, EndFn::new(f))
    }

    pub fn put<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self>
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::PUT, pattern, EndFn::new(f))
    }

    pub fn patch<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self>
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::PATCH, pattern, EndFn::new(f))
    }

    pub fn delete<F>(&mut self, pattern: &str, f: F) -> Result<&mut Self>
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::DELETE, pattern, EndFn::new(f))
    }

    /// Run one request through the chain and produce the wire response
    ///
    /// Response resources are released on every path, after the body has been
    /// drained.
    pub async fn handle(&self, mut req: Request) -> hyper::Response<hyper::Body> {
        if self.shutdown.is_requested() {
            log::debug!("Rejecting {} {} during shutdown", req.method, req.uri());
            let mut response = plain(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable");
            response
                .headers_mut()
                .insert(CONNECTION, HeaderValue::from_static("close"));
            return response;
        }

        let mut res = Response::new();
        self.dispatch(&mut req, &mut res).await;

        let response = match res.finalize().await {
            Ok(response) => response,
            Err(e) => {
                log::error!(
                    "Failed to finalize response for {} {}: {}",
                    req.method,
                    req.uri(),
                    e
                );
                plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };
        res.release();
        response
    }

    pub(crate) async fn handle_hyper(
        &self,
        req: hyper::Request<hyper::Body>,
    ) -> hyper::Response<hyper::Body> {
        self.handle(Request::from_hyper(req)).await
    }

    /// Walk the chain, turning errors and panics into a 500
    async fn dispatch(&self, req: &mut Request, res: &mut Response) {
        let walk = AssertUnwindSafe(execute(self.middleware.as_slice(), &self.cors, req, res))
            .catch_unwind()
            .await;

        let failure = match walk {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("{} ({})", e, e.error_code()),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                format!("panic: {}", message)
            }
        };

        log::error!("Request {} {} failed: {}", req.method, req.uri(), failure);
        res.fail();
    }

    /// Bind `addr` and start serving in a background task
    ///
    /// `addr` may be a host name; the first resolved address is used.
    pub async fn listen(self, addr: &str) -> Result<Listening> {
        let socket_addr = tokio::net::lookup_host(addr)
            .await?
            .next()
            .ok_or_else(|| Error::config(format!("Address '{}' did not resolve", addr)))?;

        log::debug!(
            "Starting with {} middleware ({} routes)",
            self.middleware.len(),
            self.middleware.route_count()
        );
        server::spawn(Arc::new(self), socket_addr)
    }

    /// Listen and run until SIGTERM or SIGINT, then drain and return
    ///
    /// Uses the configured `server.host`/`server.port` when `addr` is `None`.
    pub async fn serve(self, addr: Option<&str>) -> Result<()> {
        let addr = addr
            .map(str::to_string)
            .unwrap_or_else(|| self.config.server_address());

        install_signal_handler(self.shutdown.clone());
        let listening = self.listen(&addr).await?;
        listening.wait().await?;

        log::info!("Graceful shutdown complete");
        Ok(())
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("middleware", &self.middleware)
            .field("cors", &self.cors)
            .finish()
    }
}

fn plain(status: StatusCode, body: &'static str) -> hyper::Response<hyper::Body> {
    let mut response = hyper::Response::new(hyper::Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    async fn body(response: hyper::Response<hyper::Body>) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_with_config_registers_enabled_sections() {
        let app = App::new();
        assert!(app.middleware().is_empty());

        let mut config = AppConfig::default();
        config.cors.enabled = true;
        config.cors.origin = crate::config::OriginSetting::One("https://x.com".into());
        config.static_files.enabled = true;

        let app = App::with_config(config);
        assert_eq!(app.middleware().len(), 2);
        assert!(matches!(
            &app.cors_policy().origin,
            crate::middleware::builtin::OriginRule::Exact(o) if o == "https://x.com"
        ));
    }

    #[test]
    fn test_route_registration_errors() {
        let mut app = App::new();
        let err = app
            .get("/a/{id}/{id}", |_req, _res| Box::pin(async { Ok(()) }))
            .unwrap_err();
        assert_eq!(err.error_code(), "E_INVALID_PATTERN");

        struct Nothing;

        #[async_trait::async_trait]
        impl EndHandler for Nothing {
            async fn end(&self, _req: &mut Request, _res: &mut Response) -> Result<()> {
                Ok(())
            }
        }

        assert!(app.route(Method::OPTIONS, "/", Nothing).is_err());
        assert!(app.route(Method::HEAD, "/", Nothing).is_err());
        assert!(app.middleware().is_empty());
    }

    #[tokio::test]
    async fn test_handle_route_and_fallback() {
        let mut app = App::new();
        app.get("/hello/{name}", |req, res| {
            Box::pin(async move {
                let name = req.param("name").unwrap_or("world").to_string();
                res.text(format!("hello {}", name));
                Ok(())
            })
        })
        .unwrap();

        let response = app.handle(Request::new(Method::GET, "/hello/ada")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, "hello ada");

        let response = app.handle(Request::new(Method::GET, "/bye")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(response).await, "Not Found");
    }

    fn explode() -> Result<()> {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_errors_become_500() {
        let mut app = App::new();
        app.get("/err", |_req, _res| {
            Box::pin(async { Err(Error::handler("database unreachable")) })
        })
        .unwrap()
        .get("/panic", |_req, _res| Box::pin(async { explode() }))
        .unwrap();

        for target in ["/err", "/panic"] {
            let response = app.handle(Request::new(Method::GET, target)).await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", target);
            assert_eq!(body(response).await, "Internal Server Error");
        }
    }

    #[tokio::test]
    async fn test_explicit_status_survives_error() {
        let mut app = App::new();
        app.get("/teapot", |_req, res| {
            Box::pin(async move {
                res.set_status(StatusCode::IM_A_TEAPOT);
                Err(Error::handler("after status"))
            })
        })
        .unwrap();

        let response = app.handle(Request::new(Method::GET, "/teapot")).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn test_shutdown_returns_503() {
        let mut app = App::new();
        app.get("/", |_req, res| {
            Box::pin(async move {
                res.text("up");
                Ok(())
            })
        })
        .unwrap();

        app.shutdown().request();
        let response = app.handle(Request::new(Method::GET, "/")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()["connection"], "close");
    }

    #[tokio::test]
    async fn test_use_fn_wraps_downstream() {
        let mut app = App::new();
        app.use_fn(|req, res, next| {
            Box::pin(async move {
                res.set_header("X-Powered-By", "hydrogen")?;
                next.run(req, res).await
            })
        });

        let response = app.handle(Request::new(Method::GET, "/")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-powered-by"], "hydrogen");
    }
}
