//! Static file middleware
//!
//! Maps the request path onto a directory and streams the file it names. Paths
//! that cannot be served (traversal attempts, missing files, directories) fall
//! through to the rest of the chain.

use crate::error::Result;
use crate::http::{Request, Response};
use crate::middleware::{Handler, Next};
use async_trait::async_trait;
use hyper::Method;
use std::path::{Component, Path, PathBuf};

/// Serves files from a directory
///
/// ```rust,ignore
/// app.use_middleware(ServeStatic::new("public").prefix("/assets"));
/// ```
#[derive(Debug, Clone)]
pub struct ServeStatic {
    root: PathBuf,
    prefix: String,
    index: String,
}

impl ServeStatic {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: "/".to_string(),
            index: "index.html".to_string(),
        }
    }

    /// Only serve request paths under `prefix`, stripped before the lookup
    pub fn prefix(mut self, prefix: &str) -> Self {
        let trimmed = prefix.trim_end_matches('/');
        self.prefix = if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        };
        self
    }

    /// File served for the prefix root (default `index.html`)
    pub fn index(mut self, file: &str) -> Self {
        self.index = file.to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File on disk for a request path, if it is under the prefix and safe
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = strip_prefix(path, &self.prefix)?.trim_start_matches('/');
        let relative = if relative.is_empty() {
            self.index.as_str()
        } else {
            relative
        };
        sanitize_and_join(&self.root, relative)
    }
}

fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix == "/" {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Join `candidate` onto `base`, rejecting parent dirs and absolute paths
pub fn sanitize_and_join(base: &Path, candidate: &str) -> Option<PathBuf> {
    if candidate.is_empty() {
        return None;
    }

    let mut clean = PathBuf::new();
    for component in Path::new(candidate).components() {
        match component {
            Component::Normal(segment) => clean.push(segment),
            Component::CurDir => continue,
            _ => return None,
        }
    }

    Some(base.join(clean))
}

#[async_trait]
impl Handler for ServeStatic {
    async fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<()> {
        if req.method != Method::GET && req.method != Method::HEAD {
            return next.run(req, res).await;
        }

        let Some(path) = self.resolve(req.path()) else {
            return next.run(req, res).await;
        };

        match res.file(&path).await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::debug!("Static file {} not served: {}", path.display(), e);
                next.run(req, res).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::builtin::cors::CorsPolicy;
    use crate::middleware::{execute, Middleware};
    use hyper::StatusCode;
    use std::sync::Arc;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/app.css"), "body{}").unwrap();
        dir
    }

    async fn get(serve: ServeStatic, target: &str) -> Response {
        let chain = vec![Middleware::handler(serve)];
        let policy = Arc::new(CorsPolicy::default());
        let mut req = Request::new(Method::GET, target);
        let mut res = Response::new();
        execute(&chain, &policy, &mut req, &mut res).await.unwrap();
        res
    }

    async fn body_of(mut res: Response) -> Vec<u8> {
        let hyper_res = res.finalize().await.unwrap();
        hyper::body::to_bytes(hyper_res.into_body()).await.unwrap().to_vec()
    }

    #[test]
    fn test_sanitize_and_join() {
        let base = Path::new("/srv/www");
        assert_eq!(
            sanitize_and_join(base, "css/./app.css"),
            Some(PathBuf::from("/srv/www/css/app.css"))
        );
        assert_eq!(sanitize_and_join(base, "../etc/passwd"), None);
        assert_eq!(sanitize_and_join(base, "/etc/passwd"), None);
        assert_eq!(sanitize_and_join(base, ""), None);
    }

    #[test]
    fn test_resolve_with_prefix() {
        let serve = ServeStatic::new("/srv").prefix("/assets/");
        assert_eq!(serve.resolve("/assets/a.js"), Some(PathBuf::from("/srv/a.js")));
        assert_eq!(serve.resolve("/assets"), Some(PathBuf::from("/srv/index.html")));
        assert_eq!(serve.resolve("/assetsx/a.js"), None);
        assert_eq!(serve.resolve("/other/a.js"), None);
    }

    #[tokio::test]
    async fn test_serves_index_for_root() {
        let dir = site();
        let res = get(ServeStatic::new(dir.path()), "/").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.header("content-type"), Some("text/html"));
        assert_eq!(body_of(res).await, b"<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_serves_nested_file() {
        let dir = site();
        let res = get(ServeStatic::new(dir.path()), "/css/app.css?v=3").await;
        assert_eq!(res.header("content-type"), Some("text/css"));
        assert_eq!(body_of(res).await, b"body{}");
    }

    #[tokio::test]
    async fn test_falls_through() {
        let dir = site();
        for target in ["/missing.txt", "/css", "/../secret"] {
            let res = get(ServeStatic::new(dir.path()), target).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{}", target);
        }
    }
}
