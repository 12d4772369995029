//! Debounce interval feedback derived from observed build durations.
//!
//! Outline builds are expensive; callers delay re-requesting one after an
//! edit. Rather than a fixed delay, the service reports every observed
//! build duration here and asks back for a recommendation the next time.

use std::time::Duration;

use outline_collections::LruCache;
use parking_lot::Mutex;

use crate::document::SymbolDocument;

/// Observes computation latency and recommends a debounce delay.
pub trait DebounceInformation: Send + Sync {
	/// Records one observed computation duration for `document`.
	fn update(&self, document: &dyn SymbolDocument, elapsed: Duration);

	/// Recommended delay before recomputing `document`.
	fn get(&self, document: &dyn SymbolDocument) -> Duration;
}

const AVERAGE_WINDOW: usize = 6;
const TRACKED_DOCUMENTS: usize = 50;
const TRACKED_RATIO: f64 = 0.7;

/// Mean over the most recent [`AVERAGE_WINDOW`] samples.
#[derive(Debug, Clone)]
struct SlidingWindowAverage {
	samples: Vec<f64>,
	at: usize,
	sum: f64,
}

impl SlidingWindowAverage {
	fn new() -> Self {
		Self {
			samples: Vec::with_capacity(AVERAGE_WINDOW),
			at: 0,
			sum: 0.0,
		}
	}

	fn update(&mut self, value: f64) {
		if self.samples.len() < AVERAGE_WINDOW {
			self.samples.push(value);
		} else {
			self.sum -= self.samples[self.at];
			self.samples[self.at] = value;
		}
		self.at = (self.at + 1) % AVERAGE_WINDOW;
		self.sum += value;
	}

	fn value(&self) -> f64 {
		self.sum / self.samples.len() as f64
	}
}

/// Per-document debounce recommendation backed by a sliding average of
/// observed durations, bounded to the most recently active documents.
///
/// The recommendation is one and a half times the average build duration,
/// clamped to `min..=max`; a document with no samples yet gets `min`.
pub struct FeatureDebounce {
	min: Duration,
	max: Duration,
	averages: Mutex<LruCache<String, SlidingWindowAverage>>,
}

impl FeatureDebounce {
	pub fn new(min: Duration, max: Duration) -> Self {
		Self {
			min,
			max,
			averages: Mutex::new(LruCache::with_ratio(TRACKED_DOCUMENTS, TRACKED_RATIO)),
		}
	}
}

impl DebounceInformation for FeatureDebounce {
	fn update(&self, document: &dyn SymbolDocument, elapsed: Duration) {
		let key = document.uri().as_str();
		let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
		let mut averages = self.averages.lock();
		match averages.get_mut(key) {
			Some(average) => average.update(elapsed_ms),
			None => {
				let mut average = SlidingWindowAverage::new();
				average.update(elapsed_ms);
				averages.insert(key.to_owned(), average);
			}
		}
	}

	fn get(&self, document: &dyn SymbolDocument) -> Duration {
		let mut averages = self.averages.lock();
		match averages.get(document.uri().as_str()) {
			Some(average) => {
				let suggested = Duration::from_secs_f64(average.value() * 1.5 / 1000.0);
				suggested.clamp(self.min, self.max)
			}
			None => self.min,
		}
	}
}
