use std::path::Path;

use lrpick_core::{DefaultRandom, RandomSource, Selector};
use lrpick_error::{PickError, Result};
use parking_lot::Mutex;
use rocksdb::{DB, DBCompressionType, Direction, ErrorKind, IteratorMode, Options, WriteBatch};

use crate::codec::{
    ITEM_PREFIX, PROP_BIAS, PROP_MIN_GEN, decode_bias, decode_varint, encode_bias, encode_varint,
    item_key, item_key_to_string,
};

struct Inner<R: RandomSource> {
    selector: Selector<R>,
    /// The persisted watermark: the minimum generation of the live tree as
    /// last written to the store. Keys unknown to the store enter at this
    /// generation so they line up with the oldest live key, even across
    /// process restarts.
    min_gen: i64,
}

/// A picker that mirrors every mutation into a RocksDB database.
///
/// Each item's latest generation is stored under `"s:" + key`, alongside
/// the bias and the minimum-generation watermark under `"p:"` properties.
/// A later process opening the same directory resumes selection with the
/// recency state the previous one left behind.
///
/// Writes are synchronous and happen while holding the picker's own lock;
/// simple and correct rather than throughput-optimal. `add_all` and
/// [`load_db`](Self::load_db) are much cheaper than repeated `add` calls.
///
/// Call [`close`](Self::close) to flush the store; dropping without it
/// leaves the final flush to RocksDB.
pub struct PersistentPicker<R: RandomSource = DefaultRandom> {
    db: DB,
    inner: Mutex<Inner<R>>,
}

impl PersistentPicker<DefaultRandom> {
    /// Opens (creating if missing) the database in `dir` and reads back the
    /// persisted bias and watermark.
    ///
    /// A corrupted database gets one repair attempt before the error is
    /// returned. Items are not loaded; call [`load_db`](Self::load_db) for
    /// bulk restoration or let `add`/`add_all` pull keys in on demand.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_rng(dir, DefaultRandom::new())
    }
}

impl<R: RandomSource> PersistentPicker<R> {
    /// [`open`](PersistentPicker::open) with a caller-supplied random
    /// source.
    pub fn open_with_rng(dir: impl AsRef<Path>, rng: R) -> Result<Self> {
        let dir = dir.as_ref();
        let mut options = Options::default();
        options.create_if_missing(true);
        options.set_compression_type(DBCompressionType::Lz4);
        options.set_max_open_files(100);
        options.set_compaction_readahead_size(2 * 1024 * 1024);
        options.set_keep_log_file_num(10);

        let db = match DB::open(&options, dir) {
            Ok(db) => db,
            Err(err) if err.kind() == ErrorKind::Corruption => {
                tracing::warn!(dir = %dir.display(), %err, "store corrupt, attempting repair");
                DB::repair(&options, dir)?;
                DB::open(&options, dir)?
            }
            Err(err) => return Err(err.into()),
        };

        let mut selector = Selector::with_rng(rng);
        let mut min_gen = 0;
        if let Some(raw) = db.get(PROP_MIN_GEN)? {
            if let Some(watermark) = decode_varint(&raw) {
                min_gen = watermark;
            }
        }
        if let Some(raw) = db.get(PROP_BIAS)? {
            if let Some(bias) = decode_bias(&raw) {
                selector.set_bias(bias)?;
            }
        }
        tracing::debug!(dir = %dir.display(), min_gen, "opened persistent picker");

        Ok(Self {
            db,
            inner: Mutex::new(Inner { selector, min_gen }),
        })
    }

    /// Inserts a key. A key the store already knows re-enters with its
    /// stored generation; a brand-new key enters at the watermark and is
    /// written back immediately.
    pub fn add(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.selector.contains(key)? {
            return Ok(());
        }

        if let Some(raw) = self.db.get(item_key(key))? {
            if let Some(generation) = decode_varint(&raw) {
                inner.selector.load(key, generation)?;
                return self.check_min_gen(&mut inner);
            }
            tracing::warn!(key, "undecodable stored generation, treating as new");
        }

        let generation = inner.min_gen;
        self.load_and_put(&mut inner, key, generation)
    }

    /// Bulk [`add`](Self::add). Keys found in the store are loaded first
    /// (they can lower the live minimum), the watermark is reconciled, and
    /// only then do the missing keys enter at the watermark, written back
    /// in one batch.
    pub fn add_all<S: AsRef<str>>(&self, keys: &[S]) -> Result<()> {
        let mut inner = self.inner.lock();

        let mut missing = Vec::new();
        for key in keys {
            let key = key.as_ref();
            if inner.selector.contains(key)? {
                continue;
            }
            match self.db.get(item_key(key))? {
                Some(raw) => match decode_varint(&raw) {
                    Some(generation) => {
                        inner.selector.load(key, generation)?;
                    }
                    None => {
                        tracing::warn!(key, "undecodable stored generation, treating as new");
                        missing.push(key);
                    }
                },
                None => missing.push(key),
            }
        }

        self.check_min_gen(&mut inner)?;

        if !missing.is_empty() {
            let generation = inner.min_gen;
            let value = encode_varint(generation);
            let mut batch = WriteBatch::default();
            for key in missing {
                if inner.selector.load(key, generation)? {
                    batch.put(item_key(key), &value);
                }
            }
            if !batch.is_empty() {
                self.db.write(batch)?;
            }
        }
        Ok(())
    }

    /// Removes a key from the picker and, if it was live, from the store.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.selector.remove(key)? {
            self.db.delete(item_key(key))?;
            self.check_min_gen(&mut inner)?;
        }
        Ok(())
    }

    /// Bulk [`remove`](Self::remove).
    pub fn remove_all<S: AsRef<str>>(&self, keys: &[S]) -> Result<()> {
        let mut inner = self.inner.lock();
        let removed = inner.selector.remove_all(keys)?;
        for (key, removed) in keys.iter().zip(removed) {
            if removed {
                self.db.delete(item_key(key.as_ref()))?;
            }
        }
        self.check_min_gen(&mut inner)
    }

    /// Removes a key from the picker while leaving the store untouched. A
    /// later [`add`](Self::add) or [`load_db`](Self::load_db) restores the
    /// key with the generation it has now.
    pub fn soft_remove(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.selector.remove(key)?;
        self.check_min_gen(&mut inner)
    }

    /// Bulk [`soft_remove`](Self::soft_remove).
    pub fn soft_remove_all<S: AsRef<str>>(&self, keys: &[S]) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.selector.remove_all(keys)?;
        self.check_min_gen(&mut inner)
    }

    /// Picks one key and records its new generation.
    pub fn next(&self) -> Result<String> {
        let mut inner = self.inner.lock();
        let (key, generation) = inner.selector.next()?;
        self.db.put(item_key(&key), encode_varint(generation))?;
        self.check_min_gen(&mut inner)?;
        Ok(key)
    }

    /// Picks `n` keys, not necessarily distinct, recording the shared new
    /// generation in one batch.
    pub fn next_n(&self, n: usize) -> Result<Vec<String>> {
        let mut inner = self.inner.lock();
        let (keys, generation) = inner.selector.next_n(n)?;
        self.put_generations(&keys, generation)?;
        self.check_min_gen(&mut inner)?;
        Ok(keys)
    }

    /// Picks `n` distinct keys, recording the shared new generation in one
    /// batch.
    pub fn unique_n(&self, n: usize) -> Result<Vec<String>> {
        let mut inner = self.inner.lock();
        let (keys, generation) = inner.selector.unique_n(n)?;
        self.put_generations(&keys, generation)?;
        self.check_min_gen(&mut inner)?;
        Ok(keys)
    }

    /// Picks `n` distinct keys when enough are live, otherwise `n` keys
    /// ignoring uniqueness.
    pub fn try_unique_n(&self, n: usize) -> Result<Vec<String>> {
        let mut inner = self.inner.lock();
        let (keys, generation) = match inner.selector.unique_n(n) {
            Err(PickError::InsufficientUnique { .. }) => inner.selector.next_n(n)?,
            other => other?,
        };
        self.put_generations(&keys, generation)?;
        self.check_min_gen(&mut inner)?;
        Ok(keys)
    }

    /// Sets and persists the recency bias.
    pub fn set_bias(&self, bias: f64) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.selector.set_bias(bias)?;
        self.db.put(PROP_BIAS, encode_bias(bias))?;
        Ok(())
    }

    /// The current bias.
    pub fn bias(&self) -> Result<f64> {
        self.inner.lock().selector.bias()
    }

    /// Whether the key is currently live in the picker.
    pub fn contains(&self, key: &str) -> Result<bool> {
        self.inner.lock().selector.contains(key)
    }

    /// Number of live keys. Keys that only exist in the store don't count.
    pub fn size(&self) -> Result<usize> {
        self.inner.lock().selector.size()
    }

    /// All live keys in ascending order.
    pub fn values(&self) -> Result<Vec<String>> {
        self.inner.lock().selector.values()
    }

    /// The persisted minimum-generation watermark.
    pub fn persisted_min_generation(&self) -> i64 {
        self.inner.lock().min_gen
    }

    /// Loads every stored item into the picker. Substantially more
    /// efficient than adding keys one at a time.
    pub fn load_db(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        for entry in self.db.iterator(IteratorMode::From(ITEM_PREFIX, Direction::Forward)) {
            let (raw_key, raw_value) = entry?;
            if !raw_key.starts_with(ITEM_PREFIX) {
                break;
            }
            let key = item_key_to_string(&raw_key);
            // An unreadable generation has no recovery; the key enters at
            // the watermark and the store is fixed up on its next write.
            let generation = match decode_varint(&raw_value) {
                Some(generation) => generation,
                None => {
                    tracing::warn!(key = %key, "undecodable stored generation, using watermark");
                    inner.min_gen
                }
            };
            inner.selector.load(key, generation)?;
        }

        self.check_min_gen(&mut inner)
    }

    /// Deletes every stored item that is not currently live, including
    /// items removed with [`soft_remove`](Self::soft_remove). Both the
    /// store scan and `values()` are sorted, so one merge pass suffices.
    pub fn clean_db(&self) -> Result<()> {
        let inner = self.inner.lock();
        let live = inner.selector.values()?;

        let mut cursor = 0;
        let mut batch = WriteBatch::default();
        for entry in self.db.iterator(IteratorMode::From(ITEM_PREFIX, Direction::Forward)) {
            let (raw_key, _) = entry?;
            if !raw_key.starts_with(ITEM_PREFIX) {
                break;
            }
            let key = item_key_to_string(&raw_key);
            while cursor < live.len() && key > live[cursor] {
                cursor += 1;
            }
            if cursor == live.len() || live[cursor] != key {
                batch.delete(&raw_key);
            }
        }

        if !batch.is_empty() {
            tracing::debug!(deleted = batch.len(), "clean_db removing stale items");
            self.db.write(batch)?;
        }
        Ok(())
    }

    /// Every stored item with its generation, in key order. Reads only the
    /// store; the live tree is not consulted or modified.
    pub fn dump_db(&self) -> Result<Vec<(String, i64)>> {
        let inner = self.inner.lock();
        let mut out = Vec::new();
        for entry in self.db.iterator(IteratorMode::From(ITEM_PREFIX, Direction::Forward)) {
            let (raw_key, raw_value) = entry?;
            if !raw_key.starts_with(ITEM_PREFIX) {
                break;
            }
            let generation = decode_varint(&raw_value).unwrap_or(inner.min_gen);
            out.push((item_key_to_string(&raw_key), generation));
        }
        Ok(out)
    }

    /// Flushes the store and consumes the picker.
    pub fn close(self) -> Result<()> {
        self.db.flush()?;
        self.db.cancel_all_background_work(true);
        Ok(())
    }

    /// Inserts a never-stored key at `generation`, writing it through only
    /// if the selector actually took it. Does not reconcile the watermark;
    /// entering at the watermark cannot move the minimum.
    fn load_and_put(&self, inner: &mut Inner<R>, key: &str, generation: i64) -> Result<()> {
        if inner.selector.load(key, generation)? {
            self.db.put(item_key(key), encode_varint(generation))?;
        }
        Ok(())
    }

    /// One batched write of the shared generation for every picked key.
    fn put_generations(&self, keys: &[String], generation: i64) -> Result<()> {
        let value = encode_varint(generation);
        let mut batch = WriteBatch::default();
        for key in keys {
            batch.put(item_key(key), &value);
        }
        if !batch.is_empty() {
            self.db.write(batch)?;
        }
        Ok(())
    }

    /// Rewrites the stored watermark when the live minimum moved. Loads can
    /// lower it and selections can raise it, so every mutating entry point
    /// reconciles on its way out.
    fn check_min_gen(&self, inner: &mut Inner<R>) -> Result<()> {
        let live = inner.selector.min_generation();
        if live != inner.min_gen {
            inner.min_gen = live;
            self.db.put(PROP_MIN_GEN, encode_varint(live))?;
        }
        Ok(())
    }
}
