//! Guard boundary: an ordered list of boolean predicates evaluated before
//! the wrapped content, short-circuiting with the failing predicate's
//! configured error.

use crate::endpoint::Endpoint;
use crate::error::ApiError;
use crate::request::RequestContext;
use crate::routing::{Middleware, RouteAccumulator};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type GuardFuture = Pin<Box<dyn Future<Output = Result<bool, ApiError>> + Send>>;
type GuardFn = Arc<dyn Fn(&RequestContext) -> GuardFuture + Send + Sync>;

/// One predicate plus the error it rejects with.
#[derive(Clone)]
pub struct Guard {
    check: GuardFn,
    error: ApiError,
}

impl Guard {
    /// Synchronous predicate.
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        Guard {
            check: Arc::new(move |ctx| {
                let pass = check(ctx);
                Box::pin(async move { Ok(pass) })
            }),
            error: default_error(),
        }
    }

    /// Asynchronous predicate. The context is cloned into the future, so
    /// the predicate owns everything it inspects.
    pub fn asynchronous<F, Fut>(check: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, ApiError>> + Send + 'static,
    {
        Guard {
            check: Arc::new(move |ctx| Box::pin(check(ctx.clone()))),
            error: default_error(),
        }
    }

    /// Replace the default bad-request rejection.
    pub fn or_error(mut self, error: ApiError) -> Self {
        self.error = error;
        self
    }
}

fn default_error() -> ApiError {
    ApiError::BadRequest("request rejected by guard".into())
}

/// Group whose content only runs when every guard passes, in declared order.
pub struct GuardGroup {
    guards: Vec<Guard>,
    content: Vec<Box<dyn Endpoint>>,
}

impl GuardGroup {
    pub fn new(guards: Vec<Guard>) -> Self {
        GuardGroup {
            guards,
            content: Vec::new(),
        }
    }

    pub fn mount(mut self, node: impl Endpoint) -> Self {
        self.content.push(Box::new(node));
        self
    }
}

impl Endpoint for GuardGroup {
    fn register(self: Box<Self>, routes: &mut RouteAccumulator) {
        routes.push_middleware(Arc::new(GuardMiddleware {
            guards: self.guards,
        }));
        for child in self.content {
            child.register(routes);
        }
        routes.pop_middleware(1);
    }
}

struct GuardMiddleware {
    guards: Vec<Guard>,
}

#[async_trait]
impl Middleware for GuardMiddleware {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError> {
        for guard in &self.guards {
            match (guard.check)(ctx).await {
                Ok(true) => {}
                Ok(false) => return Err(guard.error.clone()),
                Err(e) => {
                    tracing::debug!(error = %e, "guard predicate raised");
                    return Err(guard.error.clone());
                }
            }
        }
        Ok(())
    }
}
