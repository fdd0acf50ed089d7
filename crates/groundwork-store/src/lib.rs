//! Retrieval seam: query sanitation, the full-text/vector index traits,
//! hybrid rank fusion, and the generic TTL+LRU cache.
//!
//! The actual graph/vector data stores live outside this crate and are
//! reached only through [`FulltextIndex`] and [`VectorIndex`].

mod error;
pub use error::StoreError;

mod sanitize;
pub use sanitize::sanitize;

mod adapter;
pub use adapter::{FulltextIndex, SearchRow, VectorIndex};

mod hybrid;
pub use hybrid::{DEFAULT_ALPHA, merge};

mod cache;
pub use cache::TtlLruCache;

mod memory;
pub use memory::{MemoryDoc, MemoryIndex};
