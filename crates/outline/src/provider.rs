//! The pluggable document symbol provider seam.

use async_trait::async_trait;
use lsp_types::DocumentSymbol;
use tokio_util::sync::CancellationToken;

use crate::document::SymbolDocument;

/// Error a provider may fail with; recovered at the build boundary.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Result of one provider invocation.
pub type ProviderResult = Result<Vec<DocumentSymbol>, ProviderError>;

/// Computes the symbol tree for a document.
///
/// Providers run concurrently during a build and should return early once
/// `token` fires. A failure is contained to the provider's own group; it
/// never fails the outline as a whole.
#[async_trait]
pub trait DocumentSymbolProvider: Send + Sync {
	/// Human-readable provider name, used as the group label.
	fn label(&self) -> &str;

	/// Providers with higher priority come first in the outline.
	fn priority(&self) -> i32 {
		0
	}

	/// Whether this provider applies to `document`.
	fn supports(&self, document: &dyn SymbolDocument) -> bool {
		let _ = document;
		true
	}

	/// Produces the document's symbols, possibly nested.
	async fn provide_symbols(
		&self,
		document: &dyn SymbolDocument,
		token: &CancellationToken,
	) -> ProviderResult;
}
