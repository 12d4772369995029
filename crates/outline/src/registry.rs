//! Registry of document symbol providers.
//!
//! Providers come and go at runtime (language servers attach and detach);
//! the registry keeps them ordered by priority and notifies subscribers on
//! every change so in-flight outline builds can restart against the new
//! provider set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use crate::document::SymbolDocument;
use crate::provider::DocumentSymbolProvider;

/// A provider plus its registration identity.
#[derive(Clone)]
pub struct RegisteredProvider {
	id: u64,
	provider: Arc<dyn DocumentSymbolProvider>,
}

impl RegisteredProvider {
	/// Registration id; unique within the registry and stable for the
	/// lifetime of the registration.
	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn provider(&self) -> &Arc<dyn DocumentSymbolProvider> {
		&self.provider
	}
}

/// Registry of [`DocumentSymbolProvider`]s, ordered by priority.
///
/// Thread-safe; shared across tasks via `Arc`. Registration hands back a
/// guard that unregisters on drop, so a provider can never outlive its
/// owner by accident.
pub struct SymbolProviderRegistry {
	providers: RwLock<Vec<RegisteredProvider>>,
	changes: watch::Sender<()>,
	next_id: AtomicU64,
}

impl Default for SymbolProviderRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl SymbolProviderRegistry {
	pub fn new() -> Self {
		let (changes, _) = watch::channel(());
		Self {
			providers: RwLock::new(Vec::new()),
			changes,
			next_id: AtomicU64::new(0),
		}
	}

	/// Registers a provider. Dropping the returned guard unregisters it.
	pub fn register(
		self: &Arc<Self>,
		provider: Arc<dyn DocumentSymbolProvider>,
	) -> ProviderRegistration {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		debug!(id, label = provider.label(), "registering document symbol provider");
		self.providers.write().push(RegisteredProvider { id, provider });
		self.changes.send_replace(());
		ProviderRegistration {
			registry: Arc::downgrade(self),
			id,
		}
	}

	fn unregister(&self, id: u64) {
		let removed = {
			let mut providers = self.providers.write();
			let before = providers.len();
			providers.retain(|entry| entry.id != id);
			providers.len() != before
		};
		if removed {
			debug!(id, "unregistered document symbol provider");
			self.changes.send_replace(());
		}
	}

	/// Providers that support `document`, highest priority first; ties keep
	/// registration order.
	pub fn ordered(&self, document: &dyn SymbolDocument) -> Vec<RegisteredProvider> {
		let mut ordered: Vec<RegisteredProvider> = self
			.providers
			.read()
			.iter()
			.filter(|entry| entry.provider.supports(document))
			.cloned()
			.collect();
		ordered.sort_by_key(|entry| (std::cmp::Reverse(entry.provider.priority()), entry.id));
		ordered
	}

	/// Identity of the ordered provider set for `document`.
	///
	/// Two equal signatures mean the same providers in the same order; the
	/// cache uses this to detect provider-set drift.
	pub fn signature(&self, document: &dyn SymbolDocument) -> Vec<u64> {
		self.ordered(document).iter().map(RegisteredProvider::id).collect()
	}

	/// Change notifications. The value carries no information; only the
	/// change edge matters.
	pub fn subscribe(&self) -> watch::Receiver<()> {
		self.changes.subscribe()
	}
}

/// Guard for one provider registration; unregisters on drop.
#[must_use = "dropping the registration unregisters the provider"]
pub struct ProviderRegistration {
	registry: Weak<SymbolProviderRegistry>,
	id: u64,
}

impl Drop for ProviderRegistration {
	fn drop(&mut self) {
		if let Some(registry) = self.registry.upgrade() {
			registry.unregister(self.id);
		}
	}
}
