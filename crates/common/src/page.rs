//! The browser capability checks depend on

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PageError;

/// A loaded page that can evaluate expressions against its document.
///
/// Implementations must return the expression's JSON-serialisable result,
/// awaiting it first if it is a promise. The harness never calls this
/// directly; checks close over a handle and call it from `evaluate`.
#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn evaluate(&self, expression: &str) -> Result<Value, PageError>;
}

#[async_trait]
impl<T: PageHandle + ?Sized> PageHandle for std::sync::Arc<T> {
    async fn evaluate(&self, expression: &str) -> Result<Value, PageError> {
        (**self).evaluate(expression).await
    }
}
