//! Picker front-ends over the selection engine.
//!
//! Both wrappers expose the same surface and keep the engine's internal
//! generation bookkeeping out of the return types. [`Picker`] serializes
//! access behind one mutex; [`UnsyncPicker`] leaves synchronization to the
//! caller.

use lrpick_error::{PickError, Result};
use parking_lot::Mutex;

use crate::rng::{DefaultRandom, RandomSource};
use crate::selector::{NewKeyPlacement, Selector};

/// A thread-safe picker.
///
/// Every method takes one exclusive lock for its whole duration, so calls
/// from multiple threads are totally ordered. Wrap it in an `Arc` to share.
#[derive(Debug)]
pub struct Picker<R: RandomSource = DefaultRandom> {
    inner: Mutex<Selector<R>>,
}

impl Picker<DefaultRandom> {
    /// A picker with the default bias and an OS-seeded random source.
    #[must_use]
    pub fn new() -> Self {
        Self::from_selector(Selector::new())
    }
}

impl Default for Picker<DefaultRandom> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RandomSource> Picker<R> {
    /// Wraps an already-configured selection engine.
    pub fn from_selector(selector: Selector<R>) -> Self {
        Self {
            inner: Mutex::new(selector),
        }
    }

    /// Inserts a key; returns whether it was new.
    pub fn add(&self, key: impl Into<String>) -> Result<bool> {
        self.inner.lock().add(key).map(|(inserted, _)| inserted)
    }

    /// Inserts many keys; returns which of them were new.
    pub fn add_all<S: AsRef<str>>(&self, keys: &[S]) -> Result<Vec<bool>> {
        self.inner.lock().add_all(keys).map(|(inserted, _)| inserted)
    }

    /// Restores a key with a known generation.
    pub fn load(&self, key: impl Into<String>, generation: i64) -> Result<bool> {
        self.inner.lock().load(key, generation)
    }

    /// Restores many keys at one shared generation.
    pub fn load_all<S: AsRef<str>>(&self, keys: &[S], generation: i64) -> Result<Vec<bool>> {
        self.inner.lock().load_all(keys, generation)
    }

    /// Restores parallel key/generation lists.
    pub fn load_db<S: AsRef<str>>(&self, keys: &[S], generations: &[i64]) -> Result<Vec<bool>> {
        self.inner.lock().load_db(keys, generations)
    }

    /// Removes a key; returns whether it was present.
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.inner.lock().remove(key)
    }

    /// Removes many keys; returns which of them were present.
    pub fn remove_all<S: AsRef<str>>(&self, keys: &[S]) -> Result<Vec<bool>> {
        self.inner.lock().remove_all(keys)
    }

    /// Picks one key, favouring the least recently picked.
    pub fn next(&self) -> Result<String> {
        self.inner.lock().next().map(|(key, _)| key)
    }

    /// Picks `n` keys, not necessarily distinct.
    pub fn next_n(&self, n: usize) -> Result<Vec<String>> {
        self.inner.lock().next_n(n).map(|(keys, _)| keys)
    }

    /// Picks `n` distinct keys.
    pub fn unique_n(&self, n: usize) -> Result<Vec<String>> {
        self.inner.lock().unique_n(n).map(|(keys, _)| keys)
    }

    /// Picks `n` distinct keys when enough are live, otherwise falls back
    /// to [`next_n`](Self::next_n).
    pub fn try_unique_n(&self, n: usize) -> Result<Vec<String>> {
        let mut inner = self.inner.lock();
        match inner.unique_n(n) {
            Err(PickError::InsufficientUnique { .. }) => inner.next_n(n),
            other => other,
        }
        .map(|(keys, _)| keys)
    }

    /// Whether the key is currently present.
    pub fn contains(&self, key: &str) -> Result<bool> {
        self.inner.lock().contains(key)
    }

    /// Sets the recency bias. See [`Selector::set_bias`].
    pub fn set_bias(&self, bias: f64) -> Result<()> {
        self.inner.lock().set_bias(bias)
    }

    /// The current bias.
    pub fn bias(&self) -> Result<f64> {
        self.inner.lock().bias()
    }

    /// Sets the placement of never-seen keys.
    pub fn set_new_key_placement(&self, placement: NewKeyPlacement) -> Result<()> {
        self.inner.lock().set_new_key_placement(placement)
    }

    /// Number of live keys.
    pub fn size(&self) -> Result<usize> {
        self.inner.lock().size()
    }

    /// All live keys in ascending order.
    pub fn values(&self) -> Result<Vec<String>> {
        self.inner.lock().values()
    }

    /// Closes the picker; all later calls fail with [`PickError::Closed`].
    pub fn close(&self) {
        self.inner.lock().close();
    }
}

/// A picker with no locking.
///
/// Only sound from a single thread. If the engine is shared across threads
/// regardless, the damage is detected (not prevented) and surfaces as
/// [`PickError::Corrupt`].
#[derive(Debug)]
pub struct UnsyncPicker<R: RandomSource = DefaultRandom> {
    inner: Selector<R>,
}

impl UnsyncPicker<DefaultRandom> {
    #[must_use]
    pub fn new() -> Self {
        Self::from_selector(Selector::new())
    }
}

impl Default for UnsyncPicker<DefaultRandom> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RandomSource> UnsyncPicker<R> {
    /// Wraps an already-configured selection engine.
    pub fn from_selector(selector: Selector<R>) -> Self {
        Self { inner: selector }
    }

    pub fn add(&mut self, key: impl Into<String>) -> Result<bool> {
        self.inner.add(key).map(|(inserted, _)| inserted)
    }

    pub fn add_all<S: AsRef<str>>(&mut self, keys: &[S]) -> Result<Vec<bool>> {
        self.inner.add_all(keys).map(|(inserted, _)| inserted)
    }

    pub fn load(&mut self, key: impl Into<String>, generation: i64) -> Result<bool> {
        self.inner.load(key, generation)
    }

    pub fn load_all<S: AsRef<str>>(&mut self, keys: &[S], generation: i64) -> Result<Vec<bool>> {
        self.inner.load_all(keys, generation)
    }

    pub fn load_db<S: AsRef<str>>(&mut self, keys: &[S], generations: &[i64]) -> Result<Vec<bool>> {
        self.inner.load_db(keys, generations)
    }

    pub fn remove(&mut self, key: &str) -> Result<bool> {
        self.inner.remove(key)
    }

    pub fn remove_all<S: AsRef<str>>(&mut self, keys: &[S]) -> Result<Vec<bool>> {
        self.inner.remove_all(keys)
    }

    pub fn next(&mut self) -> Result<String> {
        self.inner.next().map(|(key, _)| key)
    }

    pub fn next_n(&mut self, n: usize) -> Result<Vec<String>> {
        self.inner.next_n(n).map(|(keys, _)| keys)
    }

    pub fn unique_n(&mut self, n: usize) -> Result<Vec<String>> {
        self.inner.unique_n(n).map(|(keys, _)| keys)
    }

    /// Picks `n` distinct keys when enough are live, otherwise falls back
    /// to [`next_n`](Self::next_n).
    pub fn try_unique_n(&mut self, n: usize) -> Result<Vec<String>> {
        match self.inner.unique_n(n) {
            Err(PickError::InsufficientUnique { .. }) => self.inner.next_n(n),
            other => other,
        }
        .map(|(keys, _)| keys)
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        self.inner.contains(key)
    }

    pub fn set_bias(&mut self, bias: f64) -> Result<()> {
        self.inner.set_bias(bias)
    }

    pub fn bias(&self) -> Result<f64> {
        self.inner.bias()
    }

    pub fn set_new_key_placement(&mut self, placement: NewKeyPlacement) -> Result<()> {
        self.inner.set_new_key_placement(placement)
    }

    pub fn size(&self) -> Result<usize> {
        self.inner.size()
    }

    pub fn values(&self) -> Result<Vec<String>> {
        self.inner.values()
    }

    pub fn close(&mut self) {
        self.inner.close();
    }
}
