//! Size-bounded cache with least-recently-used eviction.

use std::borrow::Borrow;
use std::hash::Hash;

use crate::linked_map::{Iter, LinkedMap, Touch};

/// Cache that evicts the least recently touched entries once a limit is
/// exceeded.
///
/// The backing [`LinkedMap`] keeps the least recently used entry at the
/// front; inserts and hits move entries to the back. When an insert pushes
/// the size past `limit`, the front is trimmed down to
/// `round(limit * ratio)` entries in one pass, so a burst of inserts does
/// not trim on every single one.
pub struct LruCache<K, V> {
	map: LinkedMap<K, V>,
	limit: usize,
	ratio: f64,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
	/// A cache that trims back to exactly `limit` entries.
	pub fn new(limit: usize) -> Self {
		Self::with_ratio(limit, 1.0)
	}

	/// A cache that trims down to `round(limit * ratio)` entries once
	/// `limit` is exceeded. `ratio` is clamped to `0.0..=1.0`.
	pub fn with_ratio(limit: usize, ratio: f64) -> Self {
		Self {
			map: LinkedMap::new(),
			limit,
			ratio: ratio.clamp(0.0, 1.0),
		}
	}

	pub fn limit(&self) -> usize {
		self.limit
	}

	/// Changes the limit and re-evaluates the bound immediately.
	pub fn set_limit(&mut self, limit: usize) {
		self.limit = limit;
		self.check_trim();
	}

	pub fn ratio(&self) -> f64 {
		self.ratio
	}

	/// Changes the trim ratio and re-evaluates the bound immediately.
	pub fn set_ratio(&mut self, ratio: f64) {
		self.ratio = ratio.clamp(0.0, 1.0);
		self.check_trim();
	}

	pub fn len(&self) -> usize {
		self.map.len()
	}

	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}

	pub fn contains_key<Q>(&self, key: &Q) -> bool
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.map.contains_key(key)
	}

	/// Looks up `key` and marks the entry as most recently used.
	pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.map.get(key, Touch::ToBack)
	}

	/// Mutable lookup; marks the entry as most recently used.
	pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.map.get_mut(key, Touch::ToBack)
	}

	/// Looks up `key` without refreshing its position.
	pub fn peek<Q>(&self, key: &Q) -> Option<&V>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.map.peek(key)
	}

	/// Inserts `key` as the most recently used entry, then trims if the
	/// cache is over its limit. Returns the replaced value.
	pub fn insert(&mut self, key: K, value: V) -> Option<V> {
		let old = self.map.set(key, value, Touch::ToBack);
		self.check_trim();
		old
	}

	pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.map.remove(key)
	}

	pub fn clear(&mut self) {
		self.map.clear();
	}

	/// Entries from least to most recently used.
	pub fn iter(&self) -> Iter<'_, K, V> {
		self.map.iter()
	}

	pub fn keys(&self) -> impl Iterator<Item = &K> {
		self.map.keys()
	}

	pub fn values(&self) -> impl Iterator<Item = &V> {
		self.map.values()
	}

	fn check_trim(&mut self) {
		if self.map.len() > self.limit {
			let target = (self.limit as f64 * self.ratio).round() as usize;
			self.map.trim_front(target);
		}
	}
}

impl<K, V> std::fmt::Debug for LruCache<K, V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LruCache")
			.field("len", &self.map.len())
			.field("limit", &self.limit)
			.field("ratio", &self.ratio)
			.finish()
	}
}
