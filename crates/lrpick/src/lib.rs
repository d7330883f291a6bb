//! Public API facade for lrpick.
//!
//! A weighted online random selector over a dynamic set of strings, biased
//! towards the least recently selected. Intended for human-facing
//! randomization (media shuffling and the like) where variety matters more
//! than strict rotation, keys come and go at any time, and every
//! per-key operation must stay `O(log n)`.
//!
//! Start with [`Picker`] for a thread-safe in-memory picker,
//! [`UnsyncPicker`] to skip the lock on a single thread, or
//! [`PersistentPicker`] to keep recency state in a RocksDB directory
//! across process restarts. [`Selector`] is the underlying engine for
//! anyone building another persistence layer.

pub use lrpick_core::{
    CycleRandom, DEFAULT_BIAS, DefaultRandom, NewKeyPlacement, Picker, RandomSource, Selector,
    UnsyncPicker,
};
pub use lrpick_error::{PickError, Result};
pub use lrpick_persist::PersistentPicker;
