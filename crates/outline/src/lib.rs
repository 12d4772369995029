//! Document outlines: symbol trees built from pluggable providers, with
//! memoized, cancellable computation per document.
//!
//! The model layer ([`OutlineModel`], [`OutlineGroup`], [`OutlineElement`])
//! turns raw [`DocumentSymbol`](lsp_types::DocumentSymbol)s from any number
//! of [`DocumentSymbolProvider`]s into one coherent tree: one group per
//! provider, collision-free sibling ids, and diagnostic markers correlated
//! to the deepest enclosing element.
//!
//! [`OutlineModelService`] memoizes the build per document. Concurrent
//! requests for an unchanged document share one in-flight computation,
//! stale entries are invalidated by version or provider-set drift, the
//! whole cache is LRU-bounded, and a build whose last consumer walks away
//! is cancelled cooperatively.

/// Re-export of the [`lsp_types`] dependency of this crate.
pub use lsp_types;
/// Re-export of the collections this crate stores its trees and caches in.
pub use outline_collections as collections;

mod debounce;
mod document;
mod error;
mod model;
mod provider;
mod registry;
mod service;

pub use debounce::{DebounceInformation, FeatureDebounce};
pub use document::SymbolDocument;
pub use error::OutlineError;
pub use model::{
	MarkerSummary, ModelChildren, OutlineElement, OutlineGroup, OutlineMarker, OutlineModel,
};
pub use provider::{DocumentSymbolProvider, ProviderError, ProviderResult};
pub use registry::{ProviderRegistration, RegisteredProvider, SymbolProviderRegistry};
pub use service::OutlineModelService;
