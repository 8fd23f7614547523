use std::{slice, sync::Arc};

use super::node::Node;

/// Depth-first traversal over a trie, one slice iterator per open branch.
pub struct Iter<'a, K, V> {
    stack: Vec<slice::Iter<'a, Arc<Node<K, V>>>>,
    collision: slice::Iter<'a, (K, V)>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(super) fn new(root: &'a Arc<Node<K, V>>, size: usize) -> Self {
        Self {
            stack: vec![slice::from_ref(root).iter()],
            collision: Default::default(),
            remaining: size,
        }
    }
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
            collision: self.collision.clone(),
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((key, value)) = self.collision.next() {
                self.remaining -= 1;
                return Some((key, value));
            }

            let top = self.stack.last_mut()?;
            let Some(node) = top.next() else {
                self.stack.pop();
                continue;
            };

            match node.as_ref() {
                Node::Empty => {}
                Node::Leaf { key, value, .. } => {
                    self.remaining -= 1;
                    return Some((key, value));
                }
                Node::Collision { entries, .. } => self.collision = entries.iter(),
                Node::Branch { children, .. } => self.stack.push(children.iter()),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

pub struct Keys<'a, K, V>(pub(super) Iter<'a, K, V>);

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

pub struct Values<'a, K, V>(pub(super) Iter<'a, K, V>);

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}
