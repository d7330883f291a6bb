//! Recency-biased random selection over a dynamic set of strings.
//!
//! The engine keeps every key in an order-indexed tree together with the
//! generation it was last picked at. A selection draws a random in-order
//! position and a random generation threshold biased towards the oldest
//! keys, then takes the first key at or after that position whose
//! generation does not exceed the threshold. All of it is `O(log n)`.
//!
//! Three front doors:
//! - [`Picker`]: mutex-guarded, safe to share across threads.
//! - [`UnsyncPicker`]: no locking, single-threaded callers only.
//! - [`Selector`]: the raw engine, exposing assigned generations; this is
//!   what persistence layers build on.

mod picker;
mod rng;
mod selector;

pub use picker::{Picker, UnsyncPicker};
pub use rng::{CycleRandom, DefaultRandom, RandomSource};
pub use selector::{DEFAULT_BIAS, NewKeyPlacement, Selector};
