//! The handler capability.
//!
//! The engine depends only on this trait. How the callable was obtained
//! — a hand-written type, a closure, something loaded by outer tooling —
//! is none of the core's business.

use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::context::CallContext;

/// One delivery attempt: invoked with the fixed payload and a fresh
/// per-call context.
///
/// May return normally, fail, or not return within the run's deadline.
/// A failure is scoped to the call; it never aborts the run.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn invoke(&self, payload: &Value, ctx: CallContext) -> Result<()>;
}

/// Wrap an async closure as a [`Handler`].
///
/// The payload is cloned per call so the closure's future can be
/// `'static` (it may outlive the call when it times out).
///
/// ```ignore
/// let handler = handler_fn(|payload, ctx| async move {
///     ctx.effect("charge")?;
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> impl Handler
where
    F: Fn(Value, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    FnHandler(f)
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Value, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn invoke(&self, payload: &Value, ctx: CallContext) -> Result<()> {
        (self.0)(payload.clone(), ctx).await
    }
}
