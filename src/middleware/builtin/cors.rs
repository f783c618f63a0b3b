//! CORS (Cross-Origin Resource Sharing) middleware for Hydrogen
//!
//! [`negotiate`] is a pure function from a policy and a request to the ordered
//! list of headers to emit. [`CorsMiddleware`] applies that list and either
//! continues the chain or answers a preflight on its own.

use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::middleware::{Handler, Next};
use async_trait::async_trait;
use hyper::header::{
    HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS, CONTENT_LENGTH, ORIGIN, VARY,
};
use hyper::{Method, StatusCode};
use regex::Regex;
use std::sync::Arc;

/// Which origins a policy accepts
#[derive(Clone)]
pub enum OriginRule {
    /// Every origin, answered with `*`
    Any,
    /// A single configured origin, always emitted as configured
    Exact(String),
    /// Origins allowed by exact membership
    List(Vec<String>),
    /// Origins matching a regular expression
    Pattern(Regex),
    /// Origins accepted by a caller-supplied function
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
    /// Every origin, answered by echoing the request's own origin
    Mirror,
}

impl OriginRule {
    /// Compile a regular expression rule
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(OriginRule::Pattern)
            .map_err(|e| Error::config(format!("Invalid CORS origin pattern '{}': {}", pattern, e)))
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        OriginRule::Predicate(Arc::new(f))
    }

    /// `*` means any origin, anything else is an exact origin
    pub fn from_origin(origin: &str) -> Self {
        if origin == "*" {
            OriginRule::Any
        } else {
            OriginRule::Exact(origin.to_string())
        }
    }
}

impl std::fmt::Debug for OriginRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginRule::Any => write!(f, "Any"),
            OriginRule::Exact(origin) => write!(f, "Exact({:?})", origin),
            OriginRule::List(origins) => write!(f, "List({:?})", origins),
            OriginRule::Pattern(regex) => write!(f, "Pattern({:?})", regex.as_str()),
            OriginRule::Predicate(_) => write!(f, "Predicate"),
            OriginRule::Mirror => write!(f, "Mirror"),
        }
    }
}

/// Whether `origin` is accepted by `rule`
pub fn is_allowed(origin: &str, rule: &OriginRule) -> bool {
    match rule {
        OriginRule::Any | OriginRule::Mirror => true,
        OriginRule::Exact(allowed) => origin == allowed,
        OriginRule::List(allowed) => allowed.iter().any(|o| o == origin),
        OriginRule::Pattern(regex) => regex.is_match(origin),
        OriginRule::Predicate(accept) => accept(origin),
    }
}

/// CORS policy owned by the application
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    pub origin: OriginRule,
    pub methods: Vec<String>,
    /// Explicit allow-list; `None` echoes `Access-Control-Request-Headers`
    pub allowed_headers: Option<Vec<String>>,
    pub exposed_headers: Vec<String>,
    pub credentials: bool,
    pub max_age: Option<u64>,
    /// Hand preflight requests on to the rest of the chain instead of answering them
    pub preflight_continue: bool,
    pub success_status: StatusCode,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            origin: OriginRule::Any,
            methods: ["GET", "POST", "PUT", "PATCH", "DELETE"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: None,
            exposed_headers: Vec::new(),
            credentials: false,
            max_age: None,
            preflight_continue: true,
            success_status: StatusCode::NO_CONTENT,
        }
    }
}

impl CorsPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin(mut self, rule: OriginRule) -> Self {
        self.origin = rule;
        self
    }

    /// Builder method to set a single allowed origin (`*` for any)
    pub fn allow_origin(self, origin: &str) -> Self {
        self.origin(OriginRule::from_origin(origin))
    }

    /// Builder method to set multiple allowed origins
    pub fn allow_origins(self, origins: Vec<String>) -> Self {
        self.origin(OriginRule::List(origins))
    }

    pub fn allow_methods(mut self, methods: Vec<&str>) -> Self {
        self.methods = methods.into_iter().map(|m| m.to_uppercase()).collect();
        self
    }

    pub fn allow_headers(mut self, headers: Vec<String>) -> Self {
        self.allowed_headers = Some(headers);
        self
    }

    pub fn expose_headers(mut self, headers: Vec<String>) -> Self {
        self.exposed_headers = headers;
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.credentials = allow;
        self
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn preflight_continue(mut self, enabled: bool) -> Self {
        self.preflight_continue = enabled;
        self
    }

    pub fn success_status(mut self, status: StatusCode) -> Self {
        self.success_status = status;
        self
    }

    /// Log configurations browsers will refuse
    pub fn validate(&self) {
        if self.credentials && matches!(self.origin, OriginRule::Any) {
            log::warn!(
                "CORS Security Warning: Access-Control-Allow-Credentials: true cannot be used with \
                Access-Control-Allow-Origin: *. Browsers will reject credentialed responses; \
                specify explicit origins."
            );
        }
        if self.methods.is_empty() {
            log::warn!("CORS policy allows no methods; preflight requests will fail");
        }
    }
}

/// Headers to emit for `req` under `policy`, in emission order
///
/// A preflight (`OPTIONS`) gets origin, credentials, methods, allowed headers,
/// max-age and exposed headers. Any other request gets origin, credentials and
/// exposed headers. `Vary` entries are meant to be appended, the rest set.
pub fn negotiate(policy: &CorsPolicy, req: &Request) -> Vec<(HeaderName, HeaderValue)> {
    let mut headers = Vec::new();
    let preflight = req.method == Method::OPTIONS;

    push_origin(policy, req.header(ORIGIN.as_str()), &mut headers);

    if policy.credentials {
        headers.push((
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        ));
    }

    if preflight {
        push_joined(ACCESS_CONTROL_ALLOW_METHODS, &policy.methods, &mut headers);

        match &policy.allowed_headers {
            Some(allowed) if !allowed.is_empty() => {
                push_joined(ACCESS_CONTROL_ALLOW_HEADERS, allowed, &mut headers);
            }
            _ => {
                headers.push((
                    VARY,
                    HeaderValue::from_static("Access-Control-Request-Headers"),
                ));
                if let Some(requested) = req.headers.get(ACCESS_CONTROL_REQUEST_HEADERS) {
                    if !requested.is_empty() {
                        headers.push((ACCESS_CONTROL_ALLOW_HEADERS, requested.clone()));
                    }
                }
            }
        }

        if let Some(max_age) = policy.max_age {
            headers.push((ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age)));
        }
    }

    push_joined(ACCESS_CONTROL_EXPOSE_HEADERS, &policy.exposed_headers, &mut headers);

    headers
}

fn push_origin(
    policy: &CorsPolicy,
    request_origin: Option<&str>,
    headers: &mut Vec<(HeaderName, HeaderValue)>,
) {
    let value = match &policy.origin {
        OriginRule::Any => {
            headers.push((ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")));
            return;
        }
        OriginRule::Exact(origin) => Some(origin.as_str()),
        rule => request_origin.filter(|origin| is_allowed(origin, rule)),
    };

    match value.map(HeaderValue::from_str) {
        Some(Ok(value)) => headers.push((ACCESS_CONTROL_ALLOW_ORIGIN, value)),
        Some(Err(_)) => log::warn!("CORS origin is not a valid header value; omitting it"),
        None => {}
    }
    headers.push((VARY, HeaderValue::from_static("Origin")));
}

fn push_joined(name: HeaderName, values: &[String], headers: &mut Vec<(HeaderName, HeaderValue)>) {
    if values.is_empty() {
        return;
    }
    match HeaderValue::from_str(&values.join(",")) {
        Ok(value) => headers.push((name, value)),
        Err(_) => log::warn!("Skipping invalid {} value", name),
    }
}

/// Applies a CORS policy to every request that reaches it
///
/// A middleware built with [`CorsMiddleware::with_policy`] always uses that
/// policy. One built with [`CorsMiddleware::new`] uses the application policy
/// attached by the executor, or the default policy when none is attached.
#[derive(Debug, Clone, Default)]
pub struct CorsMiddleware {
    policy: Option<Arc<CorsPolicy>>,
}

impl CorsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: CorsPolicy) -> Self {
        Self {
            policy: Some(Arc::new(policy)),
        }
    }

    fn policy_for(&self, req: &Request) -> Arc<CorsPolicy> {
        match (&self.policy, &req.extra.cors) {
            (Some(own), _) => Arc::clone(own),
            (None, Some(attached)) => Arc::clone(attached),
            (None, None) => Arc::new(CorsPolicy::default()),
        }
    }
}

#[async_trait]
impl Handler for CorsMiddleware {
    async fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<()> {
        let policy = self.policy_for(req);

        for (name, value) in negotiate(&policy, req) {
            if name == VARY {
                res.headers_mut().append(name, value);
            } else {
                res.headers_mut().insert(name, value);
            }
        }

        if req.method != Method::OPTIONS || policy.preflight_continue {
            return next.run(req, res).await;
        }

        log::debug!("Answering CORS preflight for {}", req.path());
        res.set_status(policy.success_status);
        res.headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        res.finish();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cors"
    }
}
