//! Persistent hash array mapped trie.
//!
//! [`PersistentTrie`] is an immutable map with structural sharing: every
//! update returns a new trie that shares all untouched subtrees with the old
//! one, which stays valid and unchanged. [`PersistentSet`] is the key-only
//! variant. Both are the substrate for module namespaces and the runtime's
//! struct values.
//!
//! Layout: keys are hashed once to 64 bits (SipHash with fixed keys) and the
//! hash is stored next to the entry. Each level consumes 5 bits of the hash to
//! pick one of 32 slots in a bitmap-compressed branch. Keys whose full hashes
//! are equal share a collision node that is scanned linearly.
//!
//! Iteration order is hash-bucket order. It is stable for one trie value but
//! unrelated to insertion order.

use std::{
    borrow::Borrow,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

mod iter;
mod node;
mod set;

pub use iter::{Iter, Keys, Values};
pub use set::PersistentSet;

use node::{Inserted, Node, Removed, hash_of};

pub struct PersistentTrie<K, V> {
    root: Arc<Node<K, V>>,
    size: usize,
}

impl<K, V> Clone for PersistentTrie<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            size: self.size,
        }
    }
}

impl<K, V> PersistentTrie<K, V> {
    pub fn empty() -> Self {
        Self {
            root: Arc::new(Node::Empty),
            size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Lazy traversal of the entries. Restartable: each call starts over and
    /// yields the same order for the same trie value.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.root, self.size)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values(self.iter())
    }

    /// True when both tries are the same physical structure.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> &Arc<Node<K, V>> {
        &self.root
    }
}

impl<K: Hash + Eq, V> PersistentTrie<K, V> {
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.root.get(hash_of(key), key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<K, V> PersistentTrie<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
{
    /// Returns a trie mapping `key` to `value`. When the key already maps to
    /// an equal value the result shares the same root as `self`.
    pub fn insert(&self, key: K, value: V) -> Self {
        let hash = hash_of(&key);
        match Node::insert(&self.root, 0, hash, key, value) {
            Inserted::Unchanged => self.clone(),
            Inserted::Replaced(root) => Self {
                root,
                size: self.size,
            },
            Inserted::Added(root) => Self {
                root,
                size: self.size + 1,
            },
        }
    }

    /// Returns a trie without `key`; the same trie when the key is absent.
    pub fn remove(&self, key: &K) -> Self {
        let hash = hash_of(key);
        match Node::remove(&self.root, 0, hash, key) {
            Removed::NotFound => self.clone(),
            Removed::Removed(root) => Self {
                root,
                size: self.size - 1,
            },
        }
    }

    pub fn remove_all<'a, I>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        keys.into_iter().fold(self.clone(), |trie, key| trie.remove(key))
    }

    /// A trie holding only the entries of `self` whose keys are listed.
    pub fn select_keys<'a, I>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        keys.into_iter().fold(Self::empty(), |trie, key| match self.get(key) {
            Some(value) => trie.insert(key.clone(), value.clone()),
            None => trie,
        })
    }

    /// Adds `entries` to this trie. A key that is already present (in `self`
    /// or earlier in `entries`) is combined as `remap(existing, incoming)`.
    pub fn merge_with<I, F>(&self, entries: I, mut remap: F) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        F: FnMut(&V, V) -> V,
    {
        entries.into_iter().fold(self.clone(), |trie, (key, value)| {
            let value = match trie.get(&key) {
                Some(existing) => remap(existing, value),
                None => value,
            };
            trie.insert(key, value)
        })
    }
}

impl<K, V> Default for PersistentTrie<K, V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K, V> FromIterator<(K, V)> for PersistentTrie<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |trie, (key, value)| trie.insert(key, value))
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentTrie<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Equality is by content: tries built in different orders compare equal
/// when they hold the same entries.
impl<K, V> PartialEq for PersistentTrie<K, V>
where
    K: Hash + Eq,
    V: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.size == other.size
            && self
                .iter()
                .all(|(key, value)| other.root.get(hash_of(key), key) == Some(value))
    }
}

impl<K: Hash + Eq, V: Eq> Eq for PersistentTrie<K, V> {}

/// Order-independent: combines per-entry hashes with a commutative sum.
impl<K: Hash, V: Hash> Hash for PersistentTrie<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let combined = self
            .iter()
            .map(|entry| hash_of(&entry))
            .fold(0u64, u64::wrapping_add);
        self.size.hash(state);
        combined.hash(state);
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentTrie<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod trie_test;
