//! End-to-end tests against a real store in a temporary directory.
//!
//! All of them drive the picker with the leftmost-oldest deterministic
//! random source, so every selection is predictable: the lowest-generation
//! key wins, ties broken by key order.

use lrpick_core::CycleRandom;
use lrpick_persist::PersistentPicker;
use tempfile::TempDir;

fn open(dir: &TempDir) -> PersistentPicker<CycleRandom> {
    PersistentPicker::open_with_rng(dir.path(), CycleRandom::leftmost_oldest())
        .expect("open should succeed")
}

fn stored_keys(picker: &PersistentPicker<CycleRandom>) -> Vec<String> {
    picker
        .dump_db()
        .unwrap()
        .into_iter()
        .map(|(key, _)| key)
        .collect()
}

#[test]
fn add_and_remove_write_through() {
    let dir = TempDir::new().unwrap();
    let picker = open(&dir);

    picker.add("a").unwrap();
    assert_eq!(stored_keys(&picker), vec!["a"]);

    picker.add_all(&["b", "c"]).unwrap();
    assert_eq!(stored_keys(&picker), vec!["a", "b", "c"]);

    picker.remove("c").unwrap();
    assert_eq!(stored_keys(&picker), vec!["a", "b"]);

    // Removing an absent key leaves the store alone.
    picker.remove("zzz").unwrap();
    assert_eq!(stored_keys(&picker), vec!["a", "b"]);

    picker.remove_all(&["b", "a"]).unwrap();
    assert!(stored_keys(&picker).is_empty());

    picker.close().unwrap();
}

#[test]
fn selections_write_generations() {
    let dir = TempDir::new().unwrap();
    let picker = open(&dir);

    picker.add("a").unwrap();
    picker.add("b").unwrap();
    assert_eq!(picker.dump_db().unwrap(), vec![("a".to_owned(), 0), ("b".to_owned(), 0)]);

    assert_eq!(picker.next().unwrap(), "a");
    assert_eq!(picker.dump_db().unwrap(), vec![("a".to_owned(), 1), ("b".to_owned(), 0)]);

    assert_eq!(picker.next_n(1).unwrap(), vec!["b"]);
    assert_eq!(picker.dump_db().unwrap(), vec![("a".to_owned(), 1), ("b".to_owned(), 2)]);

    assert_eq!(picker.unique_n(2).unwrap(), vec!["a", "b"]);
    assert_eq!(picker.dump_db().unwrap(), vec![("a".to_owned(), 3), ("b".to_owned(), 3)]);

    assert_eq!(picker.try_unique_n(2).unwrap(), vec!["a", "b"]);
    assert_eq!(picker.dump_db().unwrap(), vec![("a".to_owned(), 4), ("b".to_owned(), 4)]);

    // One key short of unique: falls back to next_n semantics.
    assert_eq!(picker.try_unique_n(3).unwrap(), vec!["a", "b", "a"]);
    assert_eq!(picker.dump_db().unwrap(), vec![("a".to_owned(), 5), ("b".to_owned(), 5)]);

    picker.close().unwrap();
}

#[test]
fn add_reads_stored_generations() {
    let dir = TempDir::new().unwrap();

    let picker = open(&dir);
    picker.add_all(&["a", "b", "c"]).unwrap();
    assert_eq!(picker.next_n(3).unwrap(), vec!["a", "b", "c"]);
    assert_eq!(picker.next().unwrap(), "a");
    picker.close().unwrap();

    // "a" was selected most recently, so a fresh session that adds both
    // keys back prefers "b".
    let picker = open(&dir);
    picker.add("a").unwrap();
    picker.add("b").unwrap();
    assert_eq!(picker.next().unwrap(), "b");
    picker.close().unwrap();

    // The brand-new "d" enters at the watermark, tying the oldest stored
    // key ("c") rather than undercutting it.
    let picker = open(&dir);
    picker.add_all(&["d", "a", "b", "c"]).unwrap();
    assert_eq!(picker.next().unwrap(), "c");
    picker.close().unwrap();

    // Keys added before the stored ones still enter at the persisted
    // watermark; without it e/f/g would all undercut "d".
    let picker = open(&dir);
    picker.add("e").unwrap();
    picker.add_all(&["f", "g"]).unwrap();
    picker.add_all(&["d", "a", "b", "c"]).unwrap();
    assert_eq!(picker.next_n(4).unwrap(), vec!["d", "e", "f", "g"]);
    picker.close().unwrap();
}

#[test]
fn bias_persists_across_sessions() {
    let dir = TempDir::new().unwrap();

    let picker = open(&dir);
    picker.add_all(&["a", "b"]).unwrap();
    assert_eq!(picker.next().unwrap(), "a");
    picker.set_bias(0.0).unwrap();
    // Bias 0 ignores recency; the stubbed draw selects by position alone.
    assert_eq!(picker.next().unwrap(), "a");
    picker.close().unwrap();

    let picker = open(&dir);
    assert_eq!(picker.bias().unwrap(), 0.0);
    picker.add_all(&["a", "b"]).unwrap();
    assert_eq!(picker.next().unwrap(), "a");
    picker.set_bias(2.0).unwrap();
    assert_eq!(picker.next().unwrap(), "b");
    picker.close().unwrap();

    let picker = open(&dir);
    assert_eq!(picker.bias().unwrap(), 2.0);
    picker.add_all(&["a", "b"]).unwrap();
    assert_eq!(picker.next().unwrap(), "a");
    picker.close().unwrap();
}

#[test]
fn load_db_restores_everything() {
    let dir = TempDir::new().unwrap();

    let picker = open(&dir);
    picker.load_db().unwrap();
    assert_eq!(picker.size().unwrap(), 0);

    picker.add_all(&["a", "b", "c"]).unwrap();
    assert_eq!(picker.next().unwrap(), "a");
    picker.close().unwrap();

    let picker = open(&dir);
    assert!(picker.values().unwrap().is_empty());
    picker.load_db().unwrap();
    assert_eq!(picker.values().unwrap(), vec!["a", "b", "c"]);
    // "a" carries its stored selection, so "b" is up next.
    assert_eq!(picker.next().unwrap(), "b");
    picker.close().unwrap();
}

#[test]
fn soft_remove_keeps_the_store() {
    let dir = TempDir::new().unwrap();
    let picker = open(&dir);

    picker.add_all(&["a", "b", "c", "d"]).unwrap();
    assert_eq!(picker.next_n(2).unwrap(), vec!["a", "b"]);

    picker.soft_remove("a").unwrap();
    assert_eq!(picker.values().unwrap(), vec!["b", "c", "d"]);
    assert!(stored_keys(&picker).contains(&"a".to_owned()));

    picker.soft_remove_all(&["a", "b", "c"]).unwrap();
    assert_eq!(picker.values().unwrap(), vec!["d"]);

    picker.load_db().unwrap();
    assert_eq!(picker.values().unwrap(), vec!["a", "b", "c", "d"]);

    // a and b still carry their pre-soft-remove selections.
    assert_eq!(picker.next_n(2).unwrap(), vec!["c", "d"]);
    picker.close().unwrap();
}

#[test]
fn clean_db_drops_stale_items() {
    let dir = TempDir::new().unwrap();

    let picker = open(&dir);
    picker.set_bias(6.0).unwrap();
    picker.add_all(&["a", "b", "c", "d"]).unwrap();
    assert_eq!(picker.next_n(4).unwrap(), vec!["a", "b", "c", "d"]);
    let watermark = picker.persisted_min_generation();

    picker.soft_remove_all(&["a", "c"]).unwrap();
    picker.clean_db().unwrap();
    picker.close().unwrap();

    let picker = open(&dir);
    assert_eq!(picker.persisted_min_generation(), watermark);
    assert_eq!(picker.bias().unwrap(), 6.0);

    picker.load_db().unwrap();
    assert_eq!(picker.values().unwrap(), vec!["b", "d"]);
    picker.close().unwrap();
}

#[test]
fn undecodable_stored_values_are_replaced() {
    let dir = TempDir::new().unwrap();

    // Plant one valid entry and two that no varint decoder will accept.
    {
        let mut options = rocksdb::Options::default();
        options.create_if_missing(true);
        let db = rocksdb::DB::open(&options, dir.path()).unwrap();
        db.put(b"s:x", [0xff]).unwrap();
        db.put(b"s:y", [0x0e]).unwrap();
        db.put(b"s:z", [0x80, 0x80]).unwrap();
    }

    let picker = open(&dir);
    picker.add("y").unwrap();
    assert_eq!(picker.persisted_min_generation(), 7);

    // "x" had garbage: it re-enters at the watermark and the store entry
    // is rewritten to something decodable.
    picker.add("x").unwrap();
    assert_eq!(
        picker.dump_db().unwrap(),
        vec![
            ("x".to_owned(), 7),
            ("y".to_owned(), 7),
            ("z".to_owned(), picker.persisted_min_generation())
        ]
    );

    // load_db falls back to the watermark for the remaining garbage.
    picker.load_db().unwrap();
    assert_eq!(picker.values().unwrap(), vec!["x", "y", "z"]);
    picker.close().unwrap();
}

#[test]
fn dump_db_reads_the_store_not_the_tree() {
    let dir = TempDir::new().unwrap();
    let picker = open(&dir);

    picker.add_all(&["b", "a"]).unwrap();
    picker.soft_remove("a").unwrap();

    // Softly removed keys stay visible in the dump, in key order.
    assert_eq!(
        picker.dump_db().unwrap(),
        vec![("a".to_owned(), 0), ("b".to_owned(), 0)]
    );
    picker.close().unwrap();
}

#[test]
fn unknown_property_keys_are_ignored() {
    let dir = TempDir::new().unwrap();

    {
        let mut options = rocksdb::Options::default();
        options.create_if_missing(true);
        let db = rocksdb::DB::open(&options, dir.path()).unwrap();
        db.put(b"p:future-setting", b"whatever").unwrap();
    }

    let picker = open(&dir);
    picker.add("a").unwrap();
    assert_eq!(picker.next().unwrap(), "a");
    picker.close().unwrap();
}
