use std::{
    borrow::Borrow,
    fmt,
    hash::{Hash, Hasher},
};

use super::{Keys, PersistentTrie};

/// Key-only persistent trie.
#[derive(Clone)]
pub struct PersistentSet<K> {
    trie: PersistentTrie<K, ()>,
}

impl<K> PersistentSet<K> {
    pub fn empty() -> Self {
        Self {
            trie: PersistentTrie::empty(),
        }
    }

    pub fn len(&self) -> usize {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    pub fn iter(&self) -> Keys<'_, K, ()> {
        self.trie.keys()
    }
}

impl<K: Hash + Eq> PersistentSet<K> {
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.trie.contains_key(key)
    }
}

impl<K: Hash + Eq + Clone> PersistentSet<K> {
    pub fn insert(&self, key: K) -> Self {
        Self {
            trie: self.trie.insert(key, ()),
        }
    }

    pub fn remove(&self, key: &K) -> Self {
        Self {
            trie: self.trie.remove(key),
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        if self.len() < other.len() {
            return other.union(self);
        }
        other.iter().fold(self.clone(), |set, key| set.insert(key.clone()))
    }
}

impl<K> Default for PersistentSet<K> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K: Hash + Eq + Clone> FromIterator<K> for PersistentSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |set, key| set.insert(key))
    }
}

impl<'a, K> IntoIterator for &'a PersistentSet<K> {
    type Item = &'a K;
    type IntoIter = Keys<'a, K, ()>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Hash + Eq> PartialEq for PersistentSet<K> {
    fn eq(&self, other: &Self) -> bool {
        self.trie == other.trie
    }
}

impl<K: Hash + Eq> Eq for PersistentSet<K> {}

impl<K: Hash> Hash for PersistentSet<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.trie.hash(state);
    }
}

impl<K: fmt::Debug> fmt::Debug for PersistentSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
