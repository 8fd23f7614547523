use std::{
    borrow::Borrow,
    hash::{DefaultHasher, Hash, Hasher},
    sync::Arc,
};

/// Bits consumed per trie level.
pub(crate) const BITS_PER_LEVEL: u32 = 5;
const SLOT_MASK: u64 = 0x1F;
/// Shifts at or beyond this have consumed the whole 64-bit hash.
const HASH_BITS: u32 = 64;

/// Hashes a key with SipHash under fixed keys, so the value is stable for the
/// life of the process and identical across tries.
pub(crate) fn hash_of<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Extract the 5-bit slot index at a given shift from the hash.
fn slot_at(hash: u64, shift: u32) -> u32 {
    ((hash >> shift) & SLOT_MASK) as u32
}

/// Count the number of set bits below a given position in the bitmap.
fn compressed_index(bitmap: u32, slot: u32) -> usize {
    (bitmap & ((1u32 << slot) - 1)).count_ones() as usize
}

/// A trie node. Never mutated once built; updates copy the path from the root
/// to the changed entry and share everything else.
#[derive(Debug)]
pub(crate) enum Node<K, V> {
    Empty,
    Leaf {
        hash: u64,
        key: K,
        value: V,
    },
    /// Entries whose full 64-bit hashes are equal.
    Collision {
        hash: u64,
        entries: Vec<(K, V)>,
    },
    /// `children.len() == bitmap.count_ones()`, ordered by slot.
    Branch {
        bitmap: u32,
        children: Vec<Arc<Node<K, V>>>,
    },
}

/// Outcome of an insert below some node.
pub(crate) enum Inserted<K, V> {
    /// Key already mapped to an equal value.
    Unchanged,
    /// Existing key, new value.
    Replaced(Arc<Node<K, V>>),
    /// New key.
    Added(Arc<Node<K, V>>),
}

/// Outcome of a removal below some node.
pub(crate) enum Removed<K, V> {
    NotFound,
    /// The replacement node, which may be `Node::Empty`.
    Removed(Arc<Node<K, V>>),
}

impl<K, V> Node<K, V> {
    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }

    /// Leaves and collision nodes carry their full hash and may sit at any
    /// depth; a branch holding only one of them can be replaced by it.
    fn is_collapsible(&self) -> bool {
        matches!(self, Node::Leaf { .. } | Node::Collision { .. })
    }

    pub(crate) fn count(&self) -> usize {
        match self {
            Node::Empty => 0,
            Node::Leaf { .. } => 1,
            Node::Collision { entries, .. } => entries.len(),
            Node::Branch { children, .. } => children.iter().map(|child| child.count()).sum(),
        }
    }

    #[cfg(test)]
    pub(crate) fn children(&self) -> &[Arc<Node<K, V>>] {
        match self {
            Node::Branch { children, .. } => children,
            _ => &[],
        }
    }

    /// Checks the structural invariants of this subtree. Test support only.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self, is_root: bool) -> Result<(), String> {
        match self {
            Node::Empty if is_root => Ok(()),
            Node::Empty => Err("empty node below the root".to_string()),
            Node::Leaf { .. } => Ok(()),
            Node::Collision { entries, .. } if entries.len() < 2 => {
                Err(format!("collision node with {} entries", entries.len()))
            }
            Node::Collision { .. } => Ok(()),
            Node::Branch { bitmap, children } => {
                if bitmap.count_ones() as usize != children.len() {
                    return Err(format!(
                        "bitmap {:032b} does not match {} children",
                        bitmap,
                        children.len()
                    ));
                }
                if children.len() == 1 && children[0].is_collapsible() {
                    return Err("single-entry branch was not collapsed".to_string());
                }
                for child in children {
                    child.check_invariants(false)?;
                }
                Ok(())
            }
        }
    }
}

impl<K, V> Node<K, V> {
    pub(crate) fn get<Q>(&self, hash: u64, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut node = self;
        let mut shift = 0u32;

        loop {
            match node {
                Node::Empty => return None,
                Node::Leaf {
                    hash: leaf_hash,
                    key: leaf_key,
                    value,
                } => {
                    return (*leaf_hash == hash && leaf_key.borrow() == key).then_some(value);
                }
                Node::Collision {
                    hash: col_hash,
                    entries,
                } => {
                    if *col_hash != hash {
                        return None;
                    }
                    return entries
                        .iter()
                        .find(|(k, _)| k.borrow() == key)
                        .map(|(_, v)| v);
                }
                Node::Branch { bitmap, children } => {
                    if shift >= HASH_BITS {
                        return None;
                    }
                    let slot = slot_at(hash, shift);
                    let bit = 1u32 << slot;
                    if bitmap & bit == 0 {
                        return None;
                    }
                    node = &children[compressed_index(*bitmap, slot)];
                    shift += BITS_PER_LEVEL;
                }
            }
        }
    }
}

impl<K: Eq + Clone, V: Clone + PartialEq> Node<K, V> {
    /// Inserts below `this`, which sits at `shift`. Only the nodes on the path
    /// to the entry are copied.
    pub(crate) fn insert(
        this: &Arc<Self>,
        shift: u32,
        hash: u64,
        key: K,
        value: V,
    ) -> Inserted<K, V> {
        match this.as_ref() {
            Node::Empty => Inserted::Added(Arc::new(Node::Leaf { hash, key, value })),
            Node::Leaf {
                hash: leaf_hash,
                key: leaf_key,
                value: leaf_value,
            } => {
                if *leaf_hash == hash && *leaf_key == key {
                    if *leaf_value == value {
                        return Inserted::Unchanged;
                    }
                    return Inserted::Replaced(Arc::new(Node::Leaf { hash, key, value }));
                }
                if *leaf_hash == hash {
                    let entries = vec![(leaf_key.clone(), leaf_value.clone()), (key, value)];
                    return Inserted::Added(Arc::new(Node::Collision { hash, entries }));
                }
                let leaf = Arc::new(Node::Leaf { hash, key, value });
                Inserted::Added(Self::join(shift, Arc::clone(this), *leaf_hash, leaf, hash))
            }
            Node::Collision {
                hash: col_hash,
                entries,
            } => {
                if *col_hash != hash {
                    let leaf = Arc::new(Node::Leaf { hash, key, value });
                    return Inserted::Added(Self::join(
                        shift,
                        Arc::clone(this),
                        *col_hash,
                        leaf,
                        hash,
                    ));
                }
                let mut entries = entries.clone();
                match entries.iter().position(|(k, _)| *k == key) {
                    Some(pos) if entries[pos].1 == value => Inserted::Unchanged,
                    Some(pos) => {
                        entries[pos] = (key, value);
                        Inserted::Replaced(Arc::new(Node::Collision { hash, entries }))
                    }
                    None => {
                        entries.push((key, value));
                        Inserted::Added(Arc::new(Node::Collision { hash, entries }))
                    }
                }
            }
            Node::Branch { bitmap, children } => {
                let slot = slot_at(hash, shift);
                let bit = 1u32 << slot;
                let idx = compressed_index(*bitmap, slot);

                if bitmap & bit == 0 {
                    let mut new_children = Vec::with_capacity(children.len() + 1);
                    new_children.extend_from_slice(&children[..idx]);
                    new_children.push(Arc::new(Node::Leaf { hash, key, value }));
                    new_children.extend_from_slice(&children[idx..]);
                    return Inserted::Added(Arc::new(Node::Branch {
                        bitmap: bitmap | bit,
                        children: new_children,
                    }));
                }

                let rebuild = |child: Arc<Node<K, V>>| {
                    let mut new_children = children.clone();
                    new_children[idx] = child;
                    Arc::new(Node::Branch {
                        bitmap: *bitmap,
                        children: new_children,
                    })
                };

                match Self::insert(&children[idx], shift + BITS_PER_LEVEL, hash, key, value) {
                    Inserted::Unchanged => Inserted::Unchanged,
                    Inserted::Replaced(child) => Inserted::Replaced(rebuild(child)),
                    Inserted::Added(child) => Inserted::Added(rebuild(child)),
                }
            }
        }
    }

    /// Builds the smallest subtree at `shift` holding two nodes whose hashes
    /// differ.
    fn join(shift: u32, a: Arc<Self>, a_hash: u64, b: Arc<Self>, b_hash: u64) -> Arc<Self> {
        debug_assert_ne!(a_hash, b_hash);
        let a_slot = slot_at(a_hash, shift);
        let b_slot = slot_at(b_hash, shift);

        if a_slot == b_slot {
            let child = Self::join(shift + BITS_PER_LEVEL, a, a_hash, b, b_hash);
            return Arc::new(Node::Branch {
                bitmap: 1u32 << a_slot,
                children: vec![child],
            });
        }

        let children = if a_slot < b_slot { vec![a, b] } else { vec![b, a] };
        Arc::new(Node::Branch {
            bitmap: (1u32 << a_slot) | (1u32 << b_slot),
            children,
        })
    }

    pub(crate) fn remove(this: &Arc<Self>, shift: u32, hash: u64, key: &K) -> Removed<K, V> {
        match this.as_ref() {
            Node::Empty => Removed::NotFound,
            Node::Leaf {
                hash: leaf_hash,
                key: leaf_key,
                ..
            } => {
                if *leaf_hash == hash && leaf_key == key {
                    Removed::Removed(Arc::new(Node::Empty))
                } else {
                    Removed::NotFound
                }
            }
            Node::Collision {
                hash: col_hash,
                entries,
            } => {
                if *col_hash != hash {
                    return Removed::NotFound;
                }
                let Some(pos) = entries.iter().position(|(k, _)| k == key) else {
                    return Removed::NotFound;
                };
                let mut entries = entries.clone();
                entries.remove(pos);
                if entries.len() == 1 {
                    let (key, value) = entries.remove(0);
                    // Convert back to leaf
                    return Removed::Removed(Arc::new(Node::Leaf { hash, key, value }));
                }
                Removed::Removed(Arc::new(Node::Collision { hash, entries }))
            }
            Node::Branch { bitmap, children } => {
                let slot = slot_at(hash, shift);
                let bit = 1u32 << slot;
                if bitmap & bit == 0 {
                    return Removed::NotFound;
                }
                let idx = compressed_index(*bitmap, slot);

                let new_child =
                    match Self::remove(&children[idx], shift + BITS_PER_LEVEL, hash, key) {
                        Removed::NotFound => return Removed::NotFound,
                        Removed::Removed(child) => child,
                    };

                if new_child.is_empty() {
                    let new_bitmap = bitmap & !bit;
                    let mut new_children = children.clone();
                    new_children.remove(idx);

                    return Removed::Removed(match new_children.len() {
                        0 => Arc::new(Node::Empty),
                        1 if new_children[0].is_collapsible() => new_children.remove(0),
                        _ => Arc::new(Node::Branch {
                            bitmap: new_bitmap,
                            children: new_children,
                        }),
                    });
                }

                if children.len() == 1 && new_child.is_collapsible() {
                    // Pull the lone entry up instead of keeping a chain of
                    // single-child branches.
                    return Removed::Removed(new_child);
                }

                let mut new_children = children.clone();
                new_children[idx] = new_child;
                Removed::Removed(Arc::new(Node::Branch {
                    bitmap: *bitmap,
                    children: new_children,
                }))
            }
        }
    }
}
