#![deny(unsafe_code)]

//! Switchyard core engines.
//!
//! Two independent halves:
//!
//! - [`context`] indexes a project, scores files against a query and packs the
//!   best ones into a token budget.
//! - [`llm`] classifies the query, picks one provider and model from the
//!   registry and dispatches a single generation call.
//!
//! The CLI wires them together: the context payload is rendered in front of
//! the query before it is routed.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future — the standard return type for async
/// trait methods that require dynamic dispatch (`dyn Trait`).
///
/// Native `async fn` in traits produces opaque return types that are **not**
/// object-safe. [`llm::LlmProvider`] is consumed as `Arc<dyn LlmProvider>`, so
/// its async methods return this alias instead.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// File indexing, relevance scoring and context assembly.
pub mod context;
/// Provider adapters, registry, task analysis and routing.
pub mod llm;

pub use context::{ContextEngine, ContextError, ContextPayload};
pub use llm::{ModelRouter, ProviderRegistry, RouteError, RouteRequest};
