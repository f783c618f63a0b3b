use crate::error::Result;
use crate::middleware::builtin::cors::CorsPolicy;
use crate::routing::Params;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request as HyperRequest, Uri};
use indexmap::map::Entry;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::form_urlencoded;

/// A query or form value: a single string, or every value of a repeated key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Multiple(Vec<String>),
}

impl QueryValue {
    /// Get as a single value (returns first element if array)
    pub fn as_str(&self) -> &str {
        match self {
            QueryValue::Single(s) => s,
            QueryValue::Multiple(v) => v.first().map(|s| s.as_str()).unwrap_or(""),
        }
    }

    /// Get as array (wraps single value in array if needed)
    pub fn as_array(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(s) => vec![s.as_str()],
            QueryValue::Multiple(v) => v.iter().map(|s| s.as_str()).collect(),
        }
    }

    /// Check if this is an array value
    pub fn is_array(&self) -> bool {
        matches!(self, QueryValue::Multiple(_))
    }

    /// Add another occurrence; the second one promotes a single value to a list
    pub fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(first) => {
                *self = QueryValue::Multiple(vec![std::mem::take(first), value]);
            }
            QueryValue::Multiple(values) => values.push(value),
        }
    }
}

/// Parsed query string or url-encoded form, in first-seen key order
pub type Query = IndexMap<String, QueryValue>;

/// Decode `a=1&b=2&a=3` style input, coalescing repeated keys
pub fn parse_pairs(input: &[u8]) -> Query {
    let mut query = Query::new();
    for (key, value) in form_urlencoded::parse(input) {
        match query.entry(key.into_owned()) {
            Entry::Occupied(mut entry) => entry.get_mut().push(value.into_owned()),
            Entry::Vacant(entry) => {
                entry.insert(QueryValue::Single(value.into_owned()));
            }
        }
    }
    query
}

/// Body decoded by one of the parser middleware
#[derive(Debug, Clone, PartialEq)]
pub enum BodyData {
    Json(serde_json::Value),
    Form(Query),
}

/// Per-request metadata written by the chain executor
#[derive(Debug, Clone, Default)]
pub struct Extra {
    /// Pattern of the route that handled the request, `None` until one matches
    pub matched_pattern: Option<String>,
    /// CORS policy in effect for this request
    pub cors: Option<Arc<CorsPolicy>>,
}

enum RequestBody {
    Pending(Body),
    Buffered(Bytes),
}

/// Inbound request as seen by middleware
pub struct Request {
    pub method: Method,
    pub headers: HeaderMap,
    pub params: Params,
    pub extra: Extra,
    /// Decoded body, set by parser middleware
    pub data: Option<BodyData>,
    /// Error message recorded by middleware that rejected the request
    pub error: Option<String>,
    uri: String,
    path: String,
    search: String,
    query: OnceCell<Query>,
    body: RequestBody,
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Method::GET, "/")
    }
}

impl Request {
    /// Build a request from a method and request target (`/path?query`)
    pub fn new(method: Method, target: &str) -> Self {
        let (path, search) = split_target(target);
        Self {
            method,
            headers: HeaderMap::new(),
            params: Params::new(),
            extra: Extra::default(),
            data: None,
            error: None,
            uri: target.to_string(),
            path,
            search,
            query: OnceCell::new(),
            body: RequestBody::Buffered(Bytes::new()),
        }
    }

    /// Wrap a request parsed by hyper; the body is read lazily
    pub fn from_hyper(req: HyperRequest<Body>) -> Self {
        let (parts, body) = req.into_parts();
        let mut request = Self::new(parts.method, &parts.uri.to_string());
        request.headers = parts.headers;
        request.body = RequestBody::Pending(body);
        request
    }

    /// Add a header, ignoring names or values that are not valid HTTP
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => log::warn!("Ignoring invalid header {}: {}", name, value),
        }
        self
    }

    /// Replace the body with in-memory bytes
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Buffered(body.into());
        self
    }

    /// Raw request target as received
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Request path without the query string
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string without the leading `?`
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Parsed query, computed on first access
    pub fn query(&self) -> &Query {
        self.query.get_or_init(|| parse_pairs(self.search.as_bytes()))
    }

    /// First value of a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query().get(key).map(QueryValue::as_str)
    }

    /// Header value as a string, if present and visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Media type of the body, without parameters such as `charset`
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::trim)
    }

    /// Captured path parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Pattern of the route that matched, if any
    pub fn matched_pattern(&self) -> Option<&str> {
        self.extra.matched_pattern.as_deref()
    }

    /// Read the full body
    ///
    /// The first call drains the transport stream; later calls return the
    /// buffered bytes. A failed read leaves the body empty.
    pub async fn body(&mut self) -> Result<Bytes> {
        let bytes = match std::mem::replace(&mut self.body, RequestBody::Buffered(Bytes::new())) {
            RequestBody::Pending(body) => hyper::body::to_bytes(body).await?,
            RequestBody::Buffered(bytes) => bytes,
        };
        self.body = RequestBody::Buffered(bytes.clone());
        Ok(bytes)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("params", &self.params)
            .field("matched_pattern", &self.extra.matched_pattern)
            .finish()
    }
}

fn split_target(target: &str) -> (String, String) {
    if let Ok(uri) = target.parse::<Uri>() {
        let path = if uri.path().is_empty() { "/" } else { uri.path() };
        return (path.to_string(), uri.query().unwrap_or("").to_string());
    }

    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target.to_string(), String::new()),
    }
}
