//! Document identity as seen by the outline engine.

use lsp_types::Uri;

/// The minimal document surface the outline engine needs: a stable
/// identity plus a version that advances on every content change.
///
/// The engine never reads document content itself; providers do.
pub trait SymbolDocument: Send + Sync {
	/// Stable document identity; the cache key.
	fn uri(&self) -> &Uri;

	/// Content version. Any change invalidates cached outlines.
	fn version(&self) -> i32;
}
