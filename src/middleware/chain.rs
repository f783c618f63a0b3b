//! Chain walk with `next` continuations
//!
//! A [`Next`] is the rest of the chain: a borrowed slice plus the index of the
//! first entry still to run. It is consumed by [`Next::run`], so a handler can
//! continue the chain at most once. Routes that do not match are skipped in a
//! loop rather than by nesting another continuation, so long route tables do not
//! grow the stack.

use crate::error::Result;
use crate::http::{Request, Response};
use crate::middleware::builtin::cors::CorsPolicy;
use crate::middleware::Middleware;
use std::sync::Arc;

/// Continuation over the remaining middleware
pub struct Next<'a> {
    chain: &'a [Middleware],
    index: usize,
    policy: &'a Arc<CorsPolicy>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Middleware], policy: &'a Arc<CorsPolicy>) -> Self {
        Self {
            chain,
            index: 0,
            policy,
        }
    }

    /// Entries not yet visited
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.index)
    }

    /// Application CORS policy
    pub fn policy(&self) -> &Arc<CorsPolicy> {
        self.policy
    }

    /// Run the rest of the chain
    ///
    /// Resolves once downstream middleware, including any terminal handler, has
    /// completed. Running off the end of the chain with nothing handled turns the
    /// response into a 404, so upstream middleware sees the final status.
    pub async fn run(self, req: &mut Request, res: &mut Response) -> Result<()> {
        let chain = self.chain;
        let mut index = self.index;

        while let Some(entry) = chain.get(index) {
            index += 1;
            match entry {
                Middleware::Handler(handler) => {
                    let next = Next {
                        chain,
                        index,
                        policy: self.policy,
                    };
                    return handler.handle(req, res, next).await;
                }
                Middleware::Path(route) => {
                    let Some(params) = route.matches(&req.method, req.path()) else {
                        continue;
                    };

                    log::debug!("{} {} matched route {}", req.method, req.path(), route.pattern());
                    req.params = params;
                    req.extra.matched_pattern = Some(route.pattern().to_string());
                    res.finish();
                    return route.handler().end(req, res).await;
                }
            }
        }

        if !res.is_handled() {
            log::debug!("No middleware handled {} {}", req.method, req.path());
            res.not_found();
        }
        Ok(())
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// Walk `chain` for one request
///
/// Attaches `policy` to the request before the walk. If nothing handled the
/// response by the time the walk unwinds (including when a middleware stopped
/// without answering), the response becomes a 404. Errors
/// from middleware are returned as-is; turning them into a 500 belongs to the
/// caller.
pub async fn execute(
    chain: &[Middleware],
    policy: &Arc<CorsPolicy>,
    req: &mut Request,
    res: &mut Response,
) -> Result<()> {
    req.extra.cors = Some(Arc::clone(policy));

    Next::new(chain, policy).run(req, res).await?;

    if !res.is_handled() {
        log::debug!("{} {} stopped without a response", req.method, req.path());
        res.not_found();
    }
    Ok(())
}
