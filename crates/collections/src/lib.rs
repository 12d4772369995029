//! Order-aware collections for outline bookkeeping.
//!
//! [`LinkedMap`] is a hash map threaded with a doubly linked list: lookups
//! stay O(1) while entries keep an explicit oldest-to-newest order that can
//! be repositioned on access ([`Touch`]) and trimmed from either end.
//! [`LruCache`] bounds a [`LinkedMap`] with least-recently-used eviction.

mod linked_map;
mod lru;

pub use linked_map::{Cursor, Iter, LinkedMap, MutatedDuringIteration, Touch};
pub use lru::LruCache;
