//! Handler traits for the middleware chain
//!
//! A [`Handler`] sits anywhere in the chain and decides whether to continue by
//! running the [`Next`] it is given. An [`EndHandler`] is the terminal function of
//! a route; once it runs the chain does not continue.

use crate::error::Result;
use crate::http::{Request, Response};
use crate::middleware::chain::Next;
use async_trait::async_trait;

/// Boxed future returned by closure handlers
pub type BoxFuture<'a, T> = futures::future::BoxFuture<'a, T>;

/// Generic middleware invoked with the rest of the chain
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Process a request
    ///
    /// Call `next.run(req, res).await` to hand the request downstream; it
    /// returns once the whole remaining chain has completed.
    async fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<()>;

    /// Optional: Get the name of this middleware for debugging
    fn name(&self) -> &'static str {
        "unnamed"
    }
}

/// Terminal handler bound to a route
#[async_trait]
pub trait EndHandler: Send + Sync + 'static {
    async fn end(&self, req: &mut Request, res: &mut Response) -> Result<()>;
}

/// [`Handler`] built from a closure
///
/// ```rust,ignore
/// app.use_fn(|req, res, next| Box::pin(async move {
///     res.set_header("X-Powered-By", "hydrogen")?;
///     next.run(req, res).await
/// }));
/// ```
pub struct HandlerFn<F>(F);

impl<F> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, Next<'a>) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, Next<'a>) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    async fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<()> {
        (self.0)(req, res, next).await
    }

    fn name(&self) -> &'static str {
        "fn"
    }
}

/// [`EndHandler`] built from a closure
pub struct EndFn<F>(F);

impl<F> EndFn<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> EndHandler for EndFn<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    async fn end(&self, req: &mut Request, res: &mut Response) -> Result<()> {
        (self.0)(req, res).await
    }
}
