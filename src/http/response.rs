use crate::error::{Error, Result};
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::StatusCode;
use serde::Serialize;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Reader used for streamed bodies
pub type BodyStream = Box<dyn AsyncRead + Send + Unpin>;

/// Something the response holds that must be released once it is finalized
///
/// `release` consumes the resource, so it can run at most once.
pub trait Resource: Send {
    fn release(self: Box<Self>);
}

impl<F> Resource for F
where
    F: FnOnce() + Send,
{
    fn release(self: Box<Self>) {
        (*self)()
    }
}

/// Response body: nothing, bytes in memory, or a byte stream
#[derive(Default)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Bytes),
    Stream(BodyStream),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// In-memory bytes, if the body is not a stream
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Empty => Some(&[] as &[u8]),
            Body::Bytes(bytes) => Some(bytes.as_ref()),
            Body::Stream(_) => None,
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => write!(f, "Empty"),
            Body::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Body::Stream(_) => write!(f, "Stream"),
        }
    }
}

/// Response accumulated by the middleware chain
///
/// Starts as `200 OK` with no body. Any explicit status or body write marks the
/// response as handled, which is what the executor's not-found check looks at.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
    resources: Vec<Box<dyn Resource>>,
    status_set: bool,
    handled: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Body::Empty,
            resources: Vec::new(),
            status_set: false,
            handled: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
        self.status_set = true;
        self.handled = true;
    }

    /// Whether a status was set explicitly rather than left at the default
    pub fn status_was_set(&self) -> bool {
        self.status_set
    }

    /// Whether anything in the chain produced this response
    pub fn is_handled(&self) -> bool {
        self.handled
    }

    /// Mark the response as complete without writing a body
    pub fn finish(&mut self) {
        self.handled = true;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Set a header, replacing any existing values
    pub fn set_header<K, V>(&mut self, name: K, value: V) -> Result<()>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<hyper::http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<hyper::http::Error>,
    {
        let (name, value) = header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Add a header value, keeping existing values for the same name
    pub fn append_header<K, V>(&mut self, name: K, value: V) -> Result<()>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<hyper::http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<hyper::http::Error>,
    {
        let (name, value) = header_pair(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn set_body(&mut self, body: Body) {
        self.body = body;
        self.handled = true;
    }

    /// Set the status with no body (Total.js-style `empty`)
    pub fn empty(&mut self, status: StatusCode) {
        self.set_status(status);
        self.set_body(Body::Empty);
    }

    pub fn bytes(&mut self, content_type: &str, data: impl Into<Bytes>) -> Result<()> {
        self.set_header(CONTENT_TYPE, content_type)?;
        self.set_body(Body::Bytes(data.into()));
        Ok(())
    }

    /// Plain text body; keeps a content type that was already set
    pub fn text(&mut self, content: impl Into<String>) {
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
        }
        self.set_body(Body::Bytes(Bytes::from(content.into())));
    }

    pub fn json<T: Serialize>(&mut self, data: &T) -> Result<()> {
        let json = serde_json::to_vec(data)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.set_body(Body::Bytes(Bytes::from(json)));
        Ok(())
    }

    /// Stream a body from any async reader
    pub fn stream(
        &mut self,
        content_type: &str,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Result<()> {
        self.set_header(CONTENT_TYPE, content_type)?;
        self.set_body(Body::Stream(Box::new(reader)));
        Ok(())
    }

    /// Serve a file from disk as a stream
    ///
    /// Fails with [`Error::Io`] if the path is missing or is not a regular file.
    /// The open handle is owned by the body and closed by [`Response::release`].
    pub async fn file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            )));
        }

        let file = tokio::fs::File::open(path).await?;
        log::debug!("Opened {} for response body", path.display());
        self.stream(content_type_for(path), file)
    }

    /// Serve a text file after passing its contents through `transform`
    pub async fn file_transformed<F>(&mut self, path: impl AsRef<Path>, transform: F) -> Result<()>
    where
        F: FnOnce(String) -> String,
    {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path).await?;
        self.bytes(content_type_for(path), transform(source))
    }

    /// 404 with a short text body
    pub fn not_found(&mut self) {
        self.set_status(StatusCode::NOT_FOUND);
        self.text("Not Found");
    }

    /// Turn the response into a generic 500 unless a status was already chosen
    ///
    /// Error detail never reaches the client body.
    pub fn fail(&mut self) {
        if self.status_set {
            self.handled = true;
            return;
        }
        self.headers.remove(CONTENT_TYPE);
        self.headers.remove(CONTENT_LENGTH);
        self.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        self.text("Internal Server Error");
    }

    /// Register a resource to release when the response is finalized
    pub fn register_resource(&mut self, resource: impl Resource + 'static) {
        self.resources.push(Box::new(resource));
    }

    /// Number of resources still awaiting release
    pub fn pending_resources(&self) -> usize {
        self.resources.len()
    }

    /// Release every registered resource and any streamed body
    ///
    /// Safe to call repeatedly; each resource is released exactly once.
    pub fn release(&mut self) {
        if matches!(self.body, Body::Stream(_)) {
            self.body = Body::Empty;
        }

        let resources = std::mem::take(&mut self.resources);
        if !resources.is_empty() {
            log::debug!("Releasing {} response resource(s)", resources.len());
        }
        for resource in resources {
            resource.release();
        }
    }

    /// Drain the body and produce the hyper response handed to the transport
    ///
    /// Resources are not released here; the caller releases after the bytes have
    /// been handed over, on both the success and failure paths.
    pub async fn finalize(&mut self) -> Result<hyper::Response<hyper::Body>> {
        let bytes = match std::mem::take(&mut self.body) {
            Body::Empty => Bytes::new(),
            Body::Bytes(bytes) => bytes,
            Body::Stream(mut reader) => {
                let mut buffer = Vec::new();
                reader.read_to_end(&mut buffer).await.map_err(Error::Io)?;
                Bytes::from(buffer)
            }
        };

        let mut response = hyper::Response::new(hyper::Body::from(bytes));
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        Ok(response)
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("resources", &self.resources.len())
            .field("handled", &self.handled)
            .finish()
    }
}

fn header_pair<K, V>(name: K, value: V) -> Result<(HeaderName, HeaderValue)>
where
    HeaderName: TryFrom<K>,
    <HeaderName as TryFrom<K>>::Error: Into<hyper::http::Error>,
    HeaderValue: TryFrom<V>,
    <HeaderValue as TryFrom<V>>::Error: Into<hyper::http::Error>,
{
    let name = HeaderName::try_from(name).map_err(|e| Error::HttpBuild(e.into()))?;
    let value = HeaderValue::try_from(value).map_err(|e| Error::HttpBuild(e.into()))?;
    Ok((name, value))
}

/// Guess content type from file extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
