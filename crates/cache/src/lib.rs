//! Run cache port.
//!
//! The cache mirrors live run status for fast reads and owns the
//! admission accounting: the process-wide running counter and the queue
//! of runs waiting for a slot. Counter and queue operations must be
//! atomic with respect to concurrent triggers and terminations — the
//! in-memory implementation serializes them through one lock; a
//! networked backend would use a compare-and-set or server-side script.
//!
//! Terminal statuses are kept with a short TTL so late subscribers can
//! still observe completion, then evicted; the durable record remains
//! in the repository.

pub mod error;
pub mod memory;
mod port;

pub use error::CacheError;
pub use memory::InMemoryRunCache;
pub use port::RunCache;
