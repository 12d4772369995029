//! End-to-end outline builds against a live provider registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use outline::lsp_types::{DocumentSymbol, Position, Range, SymbolKind, Uri};
use outline::{
	DocumentSymbolProvider, ModelChildren, OutlineError, OutlineModel, ProviderResult,
	SymbolDocument, SymbolProviderRegistry,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

struct TestDocument {
	uri: Uri,
}

impl TestDocument {
	fn new(uri: &str) -> Arc<Self> {
		Arc::new(Self {
			uri: uri.parse().unwrap(),
		})
	}
}

impl SymbolDocument for TestDocument {
	fn uri(&self) -> &Uri {
		&self.uri
	}

	fn version(&self) -> i32 {
		1
	}
}

fn range(start_line: u32, end_line: u32) -> Range {
	Range {
		start: Position {
			line: start_line,
			character: 0,
		},
		end: Position {
			line: end_line,
			character: 0,
		},
	}
}

#[allow(deprecated)]
fn symbol(name: &str, at: Range) -> DocumentSymbol {
	DocumentSymbol {
		name: name.to_owned(),
		detail: None,
		kind: SymbolKind::FUNCTION,
		tags: None,
		deprecated: None,
		range: at,
		selection_range: at,
		children: None,
	}
}

/// Returns fixed symbols; the first call can be gated on a barrier, racing
/// it against cancellation.
struct GatedProvider {
	label: &'static str,
	symbols: Vec<DocumentSymbol>,
	calls: AtomicUsize,
	entered: Arc<Notify>,
	gate: Option<Arc<Notify>>,
}

impl GatedProvider {
	fn new(label: &'static str, symbols: Vec<DocumentSymbol>, gate: Option<Arc<Notify>>) -> Arc<Self> {
		Arc::new(Self {
			label,
			symbols,
			calls: AtomicUsize::new(0),
			entered: Arc::new(Notify::new()),
			gate,
		})
	}

	fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl DocumentSymbolProvider for GatedProvider {
	fn label(&self) -> &str {
		self.label
	}

	async fn provide_symbols(
		&self,
		_document: &dyn SymbolDocument,
		token: &CancellationToken,
	) -> ProviderResult {
		let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
		self.entered.notify_one();
		if call == 1
			&& let Some(gate) = &self.gate
		{
			tokio::select! {
				_ = token.cancelled() => return Err("cancelled".into()),
				_ = gate.notified() => {}
			}
		}
		Ok(self.symbols.clone())
	}
}

struct FailingProvider;

#[async_trait]
impl DocumentSymbolProvider for FailingProvider {
	fn label(&self) -> &str {
		"broken"
	}

	async fn provide_symbols(
		&self,
		_document: &dyn SymbolDocument,
		_token: &CancellationToken,
	) -> ProviderResult {
		Err("symbol request failed".into())
	}
}

#[tokio::test]
async fn no_providers_build_an_empty_outline() {
	let registry = Arc::new(SymbolProviderRegistry::new());
	let document: Arc<dyn SymbolDocument> = TestDocument::new("file:///a.rs");
	let model = OutlineModel::create(registry, document, CancellationToken::new())
		.await
		.unwrap();
	assert!(model.is_empty());
}

#[tokio::test]
async fn provider_failure_only_empties_its_own_group() {
	let registry = Arc::new(SymbolProviderRegistry::new());
	let _broken = registry.register(Arc::new(FailingProvider));
	let working = GatedProvider::new("working", vec![symbol("f", range(0, 3))], None);
	let _working = registry.register(working.clone());
	let document: Arc<dyn SymbolDocument> = TestDocument::new("file:///a.rs");

	let model = OutlineModel::create(registry, document, CancellationToken::new())
		.await
		.unwrap();
	// The failing provider's group was dropped as empty, leaving a single
	// group that gets flattened.
	match model.children() {
		ModelChildren::Elements(children) => assert_eq!(children.len(), 1),
		ModelChildren::Groups(_) => panic!("expected the surviving group to be flattened"),
	}
	assert_eq!(model.flat_symbols().len(), 1);
}

#[tokio::test]
async fn all_empty_providers_build_an_empty_outline() {
	let registry = Arc::new(SymbolProviderRegistry::new());
	let empty = GatedProvider::new("empty", Vec::new(), None);
	let _registration = registry.register(empty);
	let document: Arc<dyn SymbolDocument> = TestDocument::new("file:///a.rs");

	let model = OutlineModel::create(registry, document, CancellationToken::new())
		.await
		.unwrap();
	assert!(model.is_empty());
}

#[tokio::test]
async fn registry_change_mid_build_restarts_against_the_new_set() {
	let registry = Arc::new(SymbolProviderRegistry::new());
	let gate = Arc::new(Notify::new());
	let first = GatedProvider::new("first", vec![symbol("a", range(0, 3))], Some(gate));
	let _first = registry.register(first.clone());
	let document: Arc<dyn SymbolDocument> = TestDocument::new("file:///a.rs");
	let token = CancellationToken::new();

	let handle = tokio::spawn(OutlineModel::create(
		Arc::clone(&registry),
		Arc::clone(&document),
		token.clone(),
	));
	first.entered.notified().await;

	// Registering a second provider invalidates the in-flight snapshot;
	// the gated first call is cancelled and both providers run again.
	let second = GatedProvider::new("second", vec![symbol("b", range(5, 8))], None);
	let _second = registry.register(second.clone());

	let model = handle.await.unwrap().unwrap();
	assert_eq!(first.calls(), 2);
	assert_eq!(second.calls(), 1);
	match model.children() {
		ModelChildren::Groups(groups) => assert_eq!(groups.len(), 2),
		ModelChildren::Elements(_) => panic!("expected one group per provider"),
	}
}

#[tokio::test]
async fn cancelled_build_returns_no_tree() {
	let registry = Arc::new(SymbolProviderRegistry::new());
	let gate = Arc::new(Notify::new());
	let provider = GatedProvider::new("slow", vec![symbol("a", range(0, 3))], Some(gate));
	let _registration = registry.register(provider.clone());
	let document: Arc<dyn SymbolDocument> = TestDocument::new("file:///a.rs");
	let token = CancellationToken::new();

	let handle = tokio::spawn(OutlineModel::create(
		Arc::clone(&registry),
		Arc::clone(&document),
		token.clone(),
	));
	provider.entered.notified().await;
	token.cancel();

	assert!(matches!(
		handle.await.unwrap(),
		Err(OutlineError::Cancelled)
	));
	assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn groups_follow_provider_priority_order() {
	let registry = Arc::new(SymbolProviderRegistry::new());

	struct Prioritised {
		label: &'static str,
		priority: i32,
	}

	#[async_trait]
	impl DocumentSymbolProvider for Prioritised {
		fn label(&self) -> &str {
			self.label
		}

		fn priority(&self) -> i32 {
			self.priority
		}

		async fn provide_symbols(
			&self,
			_document: &dyn SymbolDocument,
			_token: &CancellationToken,
		) -> ProviderResult {
			Ok(vec![symbol(self.label, range(0, 3))])
		}
	}

	let _low = registry.register(Arc::new(Prioritised {
		label: "low",
		priority: 0,
	}));
	let _high = registry.register(Arc::new(Prioritised {
		label: "high",
		priority: 5,
	}));
	let document: Arc<dyn SymbolDocument> = TestDocument::new("file:///a.rs");

	let model = OutlineModel::create(registry, document, CancellationToken::new())
		.await
		.unwrap();
	match model.children() {
		ModelChildren::Groups(groups) => {
			let labels: Vec<&str> = groups.values().map(|group| group.label()).collect();
			assert_eq!(labels, vec!["high", "low"]);
			let orders: Vec<usize> = groups.values().map(|group| group.order()).collect();
			assert_eq!(orders, vec![0, 1]);
		}
		ModelChildren::Elements(_) => panic!("expected one group per provider"),
	}
}
