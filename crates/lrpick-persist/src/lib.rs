//! Persistence for the picker, backed by RocksDB.
//!
//! [`PersistentPicker`] mirrors every mutation of the in-memory selection
//! engine into an embedded store so a later process can resume with the
//! same recency state. The store layout is flat and headerless:
//!
//! - `"s:" + key` → the item's last generation, as a zigzag LEB128 varint
//! - `"p:mingen"` → the minimum-generation watermark, same varint encoding
//! - `"p:bias"` → the bias, 8-byte little-endian IEEE-754
//!
//! Unknown `"p:"` keys are ignored and undecodable `"s:"` values are
//! treated as missing, so newer layouts stay readable by this code.

mod codec;
mod picker;

pub use picker::PersistentPicker;
