//! Memoized, shared, cancellable outline computation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use outline_collections::LruCache;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::debounce::DebounceInformation;
use crate::document::SymbolDocument;
use crate::error::OutlineError;
use crate::model::OutlineModel;
use crate::registry::SymbolProviderRegistry;

const REQUEST_CACHE_LIMIT: usize = 10;
const REQUEST_CACHE_RATIO: f64 = 0.7;

type OutlineResult = Result<Arc<OutlineModel>, OutlineError>;
type SharedRequest = Shared<BoxFuture<'static, OutlineResult>>;
type RequestCache = Mutex<LruCache<String, Arc<RequestEntry>>>;

/// One memoized outline computation.
struct RequestEntry {
	/// Distinguishes this entry from a later one under the same key, so a
	/// stale failure never evicts a replacement.
	id: u64,
	version: i32,
	signature: Vec<u64>,
	/// Callers currently awaiting the computation.
	consumers: AtomicUsize,
	/// Cancels the underlying build once the last consumer gives up.
	source: CancellationToken,
	/// The build itself; the resolved state is read through
	/// [`Shared::peek`], so in-flight and resolved are one field.
	request: SharedRequest,
}

/// Computes and caches [`OutlineModel`]s per document.
///
/// At most one build is in flight per document; concurrent callers join
/// it. Entries are invalidated by version or provider-set drift and the
/// cache as a whole is LRU-bounded.
pub struct OutlineModelService {
	registry: Arc<SymbolProviderRegistry>,
	debounce: Arc<dyn DebounceInformation>,
	requests: Arc<RequestCache>,
	next_request_id: AtomicU64,
}

impl OutlineModelService {
	pub fn new(
		registry: Arc<SymbolProviderRegistry>,
		debounce: Arc<dyn DebounceInformation>,
	) -> Self {
		Self {
			registry,
			debounce,
			requests: Arc::new(Mutex::new(LruCache::with_ratio(
				REQUEST_CACHE_LIMIT,
				REQUEST_CACHE_RATIO,
			))),
			next_request_id: AtomicU64::new(0),
		}
	}

	/// The registry this service builds from.
	pub fn registry(&self) -> &Arc<SymbolProviderRegistry> {
		&self.registry
	}

	/// Recommended delay before asking for `document`'s outline again,
	/// derived from observed build durations.
	pub fn debounce_value(&self, document: &dyn SymbolDocument) -> Duration {
		self.debounce.get(document)
	}

	/// The cached, resolved model for `document`, if any. Never computes
	/// and does not refresh the entry's cache position.
	pub fn peek(&self, document: &dyn SymbolDocument) -> Option<Arc<OutlineModel>> {
		let requests = self.requests.lock();
		let entry = requests.peek(document.uri().as_str())?;
		match entry.request.peek() {
			Some(Ok(model)) => Some(Arc::clone(model)),
			_ => None,
		}
	}

	/// Returns the outline for `document`, computing it at most once per
	/// (version, provider set).
	///
	/// Concurrent calls for the same unchanged document join one build.
	/// Cancelling `token` abandons only this caller; when the last awaiting
	/// caller cancels, the build's own cancellation source fires and the
	/// entry is dropped, so nothing keeps computing for nobody.
	pub async fn get_or_create(
		&self,
		document: &Arc<dyn SymbolDocument>,
		token: &CancellationToken,
	) -> OutlineResult {
		let key = document.uri().as_str().to_owned();
		let version = document.version();
		let signature = self.registry.signature(document.as_ref());

		// Entries are installed before anything is awaited, so callers
		// racing on the same key observe and join this one.
		let entry = {
			let mut requests = self.requests.lock();
			let reusable = requests
				.get(&key)
				.filter(|entry| entry.version == version && entry.signature == signature)
				.map(Arc::clone);
			match reusable {
				Some(entry) => entry,
				None => {
					let entry = self.new_request(document, &key, version, signature);
					requests.insert(key.clone(), Arc::clone(&entry));
					entry
				}
			}
		};

		if let Some(resolved) = entry.request.peek() {
			return resolved.clone();
		}

		entry.consumers.fetch_add(1, Ordering::SeqCst);
		let request = entry.request.clone();
		tokio::select! {
			result = request => result,
			_ = token.cancelled() => {
				if entry.consumers.fetch_sub(1, Ordering::SeqCst) == 1 {
					// Nobody is left waiting; the computation is pure waste.
					entry.source.cancel();
					Self::evict(&self.requests, &key, entry.id);
				}
				Err(OutlineError::Cancelled)
			}
		}
	}

	fn new_request(
		&self,
		document: &Arc<dyn SymbolDocument>,
		key: &str,
		version: i32,
		signature: Vec<u64>,
	) -> Arc<RequestEntry> {
		let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
		let source = CancellationToken::new();

		let registry = Arc::clone(&self.registry);
		let debounce = Arc::clone(&self.debounce);
		// Weak: the entry ends up inside the cache it would otherwise keep
		// alive through this future.
		let requests = Arc::downgrade(&self.requests);
		let document = Arc::clone(document);
		let build_token = source.clone();
		let key = key.to_owned();

		let request = async move {
			let started = Instant::now();
			match OutlineModel::create(registry, Arc::clone(&document), build_token).await {
				Ok(model) => {
					debounce.update(document.as_ref(), started.elapsed());
					Ok(Arc::new(model))
				}
				Err(error) => {
					// Self-heal: the next call gets a clean retry.
					if let Some(requests) = requests.upgrade() {
						Self::evict(&requests, &key, id);
					}
					Err(error)
				}
			}
		}
		.boxed()
		.shared();

		Arc::new(RequestEntry {
			id,
			version,
			signature,
			consumers: AtomicUsize::new(0),
			source,
			request,
		})
	}

	/// Removes the entry under `key` if it is still the one identified by
	/// `id`.
	fn evict(requests: &RequestCache, key: &str, id: u64) {
		let mut requests = requests.lock();
		if requests.peek(key).is_some_and(|entry| entry.id == id) {
			requests.remove(key);
			debug!(key, "evicted outline request");
		}
	}
}
