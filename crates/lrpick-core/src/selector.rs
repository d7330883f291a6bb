use lrpick_error::{PickError, Result};
use lrpick_tree::{GenTree, NodeId};

use crate::rng::{DefaultRandom, RandomSource};

/// The default selection bias.
pub const DEFAULT_BIAS: f64 = 2.0;

/// How `add`/`add_all` position keys the selector has never seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewKeyPlacement {
    /// Treat new keys as least recently picked: they share the generation
    /// of the oldest live key and are strong candidates immediately.
    #[default]
    LeastRecent,
    /// Give new keys a uniformly random generation between the current
    /// minimum and maximum, so a bulk import neither dominates nor starves
    /// the next few selections.
    Random,
}

/// The selection engine: an ordered index of `(key, generation)` pairs with
/// weighted, recency-biased random selection.
///
/// Every selection assigns the chosen keys a fresh generation one past the
/// current maximum, so how long ago a key was picked is readable straight
/// from the index. The `bias` parameter steers the random generation
/// threshold towards older keys; see [`set_bias`](Self::set_bias).
///
/// The selector itself performs no locking. [`Picker`](crate::Picker) adds
/// a mutex; [`UnsyncPicker`](crate::UnsyncPicker) documents going without.
/// If a selector is shared without synchronization anyway, operations can
/// return [`PickError::Corrupt`] when they notice the damage.
#[derive(Debug)]
pub struct Selector<R: RandomSource = DefaultRandom> {
    tree: GenTree,
    rng: R,
    bias: f64,
    placement: NewKeyPlacement,
    closed: bool,
}

impl Selector<DefaultRandom> {
    /// Creates an empty selector with the default bias and an OS-seeded
    /// random source.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(DefaultRandom::new())
    }
}

impl Default for Selector<DefaultRandom> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RandomSource> Selector<R> {
    /// Creates an empty selector drawing randomness from `rng`.
    pub fn with_rng(rng: R) -> Self {
        Self {
            tree: GenTree::new(),
            rng,
            bias: DEFAULT_BIAS,
            placement: NewKeyPlacement::default(),
            closed: false,
        }
    }

    /// Inserts a key, placing it according to the configured
    /// [`NewKeyPlacement`]. Returns whether the key was new and the
    /// generation it was assigned.
    pub fn add(&mut self, key: impl Into<String>) -> Result<(bool, i64)> {
        self.ensure_open()?;
        let generation = self.placement_generation();
        Ok((self.tree.insert(key.into(), generation), generation))
    }

    /// Inserts many keys. The placement generation is computed once from
    /// the state before the call and shared by every new key.
    pub fn add_all<S: AsRef<str>>(&mut self, keys: &[S]) -> Result<(Vec<bool>, i64)> {
        self.ensure_open()?;
        let generation = self.placement_generation();
        let inserted = keys
            .iter()
            .map(|key| self.tree.insert(key.as_ref().to_owned(), generation))
            .collect();
        Ok((inserted, generation))
    }

    /// Inserts a key with a caller-supplied generation. Used to restore
    /// state from storage; no placement logic runs.
    pub fn load(&mut self, key: impl Into<String>, generation: i64) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.tree.insert(key.into(), generation))
    }

    /// Bulk [`load`](Self::load) with one shared generation.
    pub fn load_all<S: AsRef<str>>(&mut self, keys: &[S], generation: i64) -> Result<Vec<bool>> {
        self.ensure_open()?;
        Ok(keys
            .iter()
            .map(|key| self.tree.insert(key.as_ref().to_owned(), generation))
            .collect())
    }

    /// Bulk [`load`](Self::load) from parallel key/generation lists, as
    /// read back from a store.
    pub fn load_db<S: AsRef<str>>(&mut self, keys: &[S], generations: &[i64]) -> Result<Vec<bool>> {
        self.ensure_open()?;
        if keys.len() != generations.len() {
            return Err(PickError::LengthMismatch {
                keys: keys.len(),
                generations: generations.len(),
            });
        }
        Ok(keys
            .iter()
            .zip(generations)
            .map(|(key, generation)| self.tree.insert(key.as_ref().to_owned(), *generation))
            .collect())
    }

    /// Removes a key, returning whether it was present. Removing an absent
    /// key is not an error.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.tree.delete(key))
    }

    /// Bulk [`remove`](Self::remove).
    pub fn remove_all<S: AsRef<str>>(&mut self, keys: &[S]) -> Result<Vec<bool>> {
        self.ensure_open()?;
        Ok(keys.iter().map(|key| self.tree.delete(key.as_ref())).collect())
    }

    /// Picks one key, favouring the least recently picked, and returns it
    /// with the generation it was just stamped with.
    pub fn next(&mut self) -> Result<(String, i64)> {
        self.ensure_open()?;
        if self.tree.is_empty() {
            return Err(PickError::Empty);
        }
        let generation = self.next_generation()?;

        let id = self.find_candidate()?;
        let key = self.tree.key_of(id).to_owned();
        self.tree.set_generation(id, generation);
        Ok((key, generation))
    }

    /// Picks `n` keys, not necessarily distinct. Every pick is stamped with
    /// the same new generation, so repeats within one call stay as likely
    /// as the first occurrence; as `n` approaches the number of live keys
    /// this converges on an unweighted shuffle.
    pub fn next_n(&mut self, n: usize) -> Result<(Vec<String>, i64)> {
        self.ensure_open()?;
        if self.tree.is_empty() {
            return Err(PickError::Empty);
        }
        let generation = self.next_generation()?;

        let mut picks = Vec::with_capacity(n);
        for _ in 0..n {
            let id = self.find_candidate()?;
            picks.push(self.tree.key_of(id).to_owned());
            self.tree.set_generation(id, generation);
        }
        Ok((picks, generation))
    }

    /// Picks `n` distinct keys. Each pick is deleted from the index before
    /// the following draw, which guarantees uniqueness without a seen-set;
    /// all picked keys are re-inserted with the shared new generation once
    /// the batch completes.
    ///
    /// Fails with [`PickError::InsufficientUnique`] when `n` exceeds the
    /// number of live keys.
    pub fn unique_n(&mut self, n: usize) -> Result<(Vec<String>, i64)> {
        self.ensure_open()?;
        if self.tree.is_empty() {
            return Err(PickError::Empty);
        }
        if n > self.tree.len() {
            return Err(PickError::InsufficientUnique {
                requested: n,
                available: self.tree.len(),
            });
        }
        let generation = self.next_generation()?;

        let mut picks = Vec::with_capacity(n);
        for _ in 0..n {
            // No rollback on a corrupt error here: the tree is already
            // presumed damaged and the picker unusable.
            let id = self.find_candidate()?;
            let key = self.tree.key_of(id).to_owned();
            self.tree.delete(&key);
            picks.push(key);
        }
        for key in &picks {
            self.tree.insert(key.clone(), generation);
        }
        Ok((picks, generation))
    }

    /// Whether the key is currently present.
    pub fn contains(&self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.tree.find(key).is_some())
    }

    /// Sets how strongly selection favours older keys.
    ///
    /// `0` ignores recency entirely, the default `2` squares the draw
    /// towards older keys, and `+∞` picks exclusively among the oldest.
    /// Negative values (including `-∞`) and NaN are rejected.
    pub fn set_bias(&mut self, bias: f64) -> Result<()> {
        self.ensure_open()?;
        if bias.is_nan() {
            return Err(PickError::Nan);
        }
        if bias < 0.0 {
            return Err(PickError::Negative);
        }
        self.bias = bias;
        Ok(())
    }

    /// The current bias.
    pub fn bias(&self) -> Result<f64> {
        self.ensure_open()?;
        Ok(self.bias)
    }

    /// Sets the placement for keys the selector has never seen.
    pub fn set_new_key_placement(&mut self, placement: NewKeyPlacement) -> Result<()> {
        self.ensure_open()?;
        self.placement = placement;
        Ok(())
    }

    /// Number of live keys.
    pub fn size(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.tree.len())
    }

    /// All live keys in ascending order. The only non-logarithmic read.
    pub fn values(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.tree.values())
    }

    /// The minimum generation of the live index, 0 when empty or closed.
    ///
    /// This is the watermark persistent layers record so that keys added by
    /// a future process line up with the oldest key that was live here.
    #[must_use]
    pub fn min_generation(&self) -> i64 {
        self.tree.generations().0
    }

    /// Closes the selector and releases the index. Every later call fails
    /// with [`PickError::Closed`]; closing again is a no-op.
    pub fn close(&mut self) {
        self.closed = true;
        self.tree.clear();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(PickError::Closed);
        }
        Ok(())
    }

    fn find_candidate(&mut self) -> Result<NodeId> {
        let index = self.rng.index(self.tree.len());
        let threshold = self.random_weighted_generation();
        self.tree.find_next(index, threshold)
    }

    /// The generation for keys entering through `add`/`add_all`.
    fn placement_generation(&mut self) -> i64 {
        if self.tree.is_empty() {
            return 0;
        }
        let (min, max) = self.tree.generations();
        match self.placement {
            NewKeyPlacement::LeastRecent => min,
            NewKeyPlacement::Random => {
                if min == max {
                    return min;
                }
                let span = max - min;
                let offset = ((span.saturating_add(1)) as f64 * self.rng.unit()).floor() as i64;
                min + offset.min(span)
            }
        }
    }

    /// The generation stamped onto the next selection, one past the
    /// current maximum. Detected overflow happens before any mutation.
    fn next_generation(&self) -> Result<i64> {
        let (_, max) = self.tree.generations();
        match max.checked_add(1) {
            Some(generation) if generation != i64::MAX => Ok(generation),
            _ => Err(PickError::Overflow),
        }
    }

    /// A random generation threshold in `[min, max]`, pushed towards `min`
    /// by the bias.
    ///
    /// The draw is `min + ⌊(span + 1) · u^bias⌋` for `u ∈ [0, 1)`; the
    /// `+1`/floor combination makes every generation in the range
    /// reachable. The clamp to `span` is unreachable for real random
    /// sources but keeps rounding pathologies inside the range.
    fn random_weighted_generation(&mut self) -> i64 {
        if self.tree.len() == 1 {
            return self.tree.generations().0;
        }

        let (min, max) = self.tree.generations();
        let span = max - min;
        let biased = self.rng.unit().powf(self.bias);
        let offset = ((span.saturating_add(1)) as f64 * biased).floor() as i64;
        min + offset.min(span)
    }
}
