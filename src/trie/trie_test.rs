use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::Arc,
};

use super::{PersistentSet, PersistentTrie, node::hash_of};

/// Key whose hash only depends on `bucket`, so distinct keys can share a full
/// hash.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Colliding {
    bucket: u8,
    id: u32,
}

impl Hash for Colliding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bucket.hash(state);
    }
}

fn colliding(bucket: u8, id: u32) -> Colliding {
    Colliding { bucket, id }
}

fn build(range: std::ops::Range<i64>) -> PersistentTrie<i64, i64> {
    range.map(|n| (n, n * 10)).collect()
}

fn assert_valid<K, V>(trie: &PersistentTrie<K, V>) {
    if let Err(problem) = trie.root().check_invariants(true) {
        panic!("trie invariant violated: {problem}");
    }
    assert_eq!(trie.root().count(), trie.len());
}

#[test]
fn empty_trie_has_no_entries() {
    let trie: PersistentTrie<String, i64> = PersistentTrie::empty();
    assert!(trie.is_empty());
    assert_eq!(trie.len(), 0);
    assert_eq!(trie.get("missing"), None);
    assert_eq!(trie.iter().count(), 0);
    assert_valid(&trie);
}

#[test]
fn insert_leaves_original_untouched() {
    let base: PersistentTrie<String, i64> = PersistentTrie::empty().insert("a".to_string(), 1);
    let next = base.insert("b".to_string(), 2);
    let replaced = next.insert("a".to_string(), 3);

    assert_eq!(base.len(), 1);
    assert_eq!(base.get("b"), None);
    assert_eq!(next.get("a"), Some(&1));
    assert_eq!(next.get("b"), Some(&2));
    assert_eq!(replaced.get("a"), Some(&3));
    assert_eq!(replaced.len(), 2);
}

#[test]
fn inserting_equal_value_returns_same_structure() {
    let trie = build(0..100);
    let again = trie.insert(42, 420);
    assert!(again.ptr_eq(&trie));
    assert_eq!(again.len(), 100);
}

#[test]
fn removing_absent_key_returns_same_structure() {
    let trie = build(0..100);
    let again = trie.remove(&1000);
    assert!(again.ptr_eq(&trie));
}

#[test]
fn lookups_agree_with_hash_map() {
    let trie = build(0..5000);
    let reference: HashMap<i64, i64> = (0..5000).map(|n| (n, n * 10)).collect();

    assert_eq!(trie.len(), reference.len());
    for (key, value) in &reference {
        assert_eq!(trie.get(key), Some(value));
    }
    assert!(!trie.contains_key(&5000));
    assert_valid(&trie);
}

#[test]
fn remove_everything_returns_to_empty() {
    let full = build(0..2000);
    let mut trie = full.clone();
    for n in 0..2000 {
        trie = trie.remove(&n);
        if n % 250 == 0 {
            assert_valid(&trie);
        }
    }
    assert!(trie.is_empty());
    assert!(trie.root().is_empty());
    assert_eq!(full.len(), 2000);
    assert_eq!(full.get(&1999), Some(&19990));
}

#[test]
fn update_shares_unrelated_subtrees() {
    let trie = build(0..1000);
    let updated = trie.insert(7, -1);

    let before = trie.root().children();
    let after = updated.root().children();
    assert_eq!(before.len(), after.len());

    let shared = before
        .iter()
        .zip(after)
        .filter(|(old, new)| Arc::ptr_eq(old, new))
        .count();
    assert_eq!(shared, before.len() - 1);
}

#[test]
fn equality_ignores_insertion_order() {
    let forward = build(0..300);
    let backward: PersistentTrie<i64, i64> = (0..300).rev().map(|n| (n, n * 10)).collect();

    assert!(!forward.ptr_eq(&backward));
    assert_eq!(forward, backward);
    assert_eq!(hash_of(&forward), hash_of(&backward));

    let different = backward.insert(3, 0);
    assert_ne!(forward, different);
}

#[test]
fn iteration_is_restartable_and_exact() {
    let trie = build(0..640);
    let first: Vec<_> = trie.iter().map(|(k, v)| (*k, *v)).collect();
    let second: Vec<_> = trie.iter().map(|(k, v)| (*k, *v)).collect();

    assert_eq!(first, second);
    assert_eq!(trie.iter().len(), 640);
    assert_eq!(trie.keys().count(), 640);
    assert_eq!(trie.values().copied().sum::<i64>(), (0..640).sum::<i64>() * 10);
}

#[test]
fn colliding_keys_live_side_by_side() {
    let trie: PersistentTrie<Colliding, &str> = PersistentTrie::empty()
        .insert(colliding(1, 1), "one")
        .insert(colliding(1, 2), "two")
        .insert(colliding(1, 3), "three")
        .insert(colliding(2, 4), "four");

    assert_eq!(trie.len(), 4);
    assert_eq!(trie.get(&colliding(1, 2)), Some(&"two"));
    assert_eq!(trie.get(&colliding(1, 9)), None);
    assert_valid(&trie);

    let trimmed = trie.remove(&colliding(1, 1)).remove(&colliding(1, 3));
    assert_eq!(trimmed.len(), 2);
    assert_eq!(trimmed.get(&colliding(1, 2)), Some(&"two"));
    assert_valid(&trimmed);

    let same = trimmed.insert(colliding(1, 2), "two");
    assert!(same.ptr_eq(&trimmed));

    let gone = trimmed.remove(&colliding(1, 2)).remove(&colliding(2, 4));
    assert!(gone.is_empty());
}

#[test]
fn merge_with_combines_existing_values() {
    let base: PersistentTrie<&str, i64> = [("a", 1), ("b", 2)].into_iter().collect();
    let merged = base.merge_with([("b", 10), ("c", 3), ("c", 4)], |old, new| old + new);

    assert_eq!(merged.get("a"), Some(&1));
    assert_eq!(merged.get("b"), Some(&12));
    assert_eq!(merged.get("c"), Some(&7));
    assert_eq!(base.get("b"), Some(&2));
}

#[test]
fn select_and_remove_many_keys() {
    let trie = build(0..10);
    let picked = trie.select_keys(&[1, 3, 99]);
    assert_eq!(picked.len(), 2);
    assert_eq!(picked.get(&3), Some(&30));

    let rest = trie.remove_all(&[0, 1, 2, 99]);
    assert_eq!(rest.len(), 7);
    assert!(!rest.contains_key(&2));
}

#[test]
fn debug_renders_as_map() {
    let trie: PersistentTrie<&str, i64> = PersistentTrie::empty().insert("only", 1);
    assert_eq!(format!("{trie:?}"), r#"{"only": 1}"#);
}

#[test]
fn set_union_and_membership() {
    let left: PersistentSet<&str> = ["a", "b"].into_iter().collect();
    let right: PersistentSet<&str> = ["b", "c"].into_iter().collect();
    let both = left.union(&right);

    assert_eq!(both.len(), 3);
    assert!(both.contains("c"));
    assert!(!left.contains("c"));
    assert_eq!(both, ["c", "b", "a"].into_iter().collect::<PersistentSet<_>>());
    assert_eq!(both.remove(&"a").len(), 2);
}
