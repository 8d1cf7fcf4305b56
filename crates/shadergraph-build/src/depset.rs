//! Immutable, structurally shared sets for transitive metadata
//!
//! A [`DepSet`] is either empty, a leaf holding a list of items, or a merge
//! node holding direct items plus references to child sets. Merging never
//! copies the children's items; it only stores `Arc` handles, so building a
//! set per graph node costs O(children) no matter how large the transitive
//! closure is. Items are deduplicated only when a set is flattened.

use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Traversal order used by [`DepSet::flatten`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    /// Children left to right, then the direct items
    #[default]
    Postorder,
    /// Direct items, then children left to right
    Preorder,
}

struct Node<T> {
    order: Order,
    direct: Vec<T>,
    children: Vec<DepSet<T>>,
}

// Deep chains would otherwise drop recursively, one stack frame per level.
impl<T> Drop for Node<T> {
    fn drop(&mut self) {
        let mut stack: Vec<Arc<Node<T>>> = self.children.drain(..).filter_map(|c| c.node).collect();
        while let Some(node) = stack.pop() {
            if let Ok(mut node) = Arc::try_unwrap(node) {
                stack.extend(node.children.drain(..).filter_map(|c| c.node));
            }
        }
    }
}

/// Immutable deduplicating set with structural sharing
pub struct DepSet<T> {
    node: Option<Arc<Node<T>>>,
}

impl<T> DepSet<T> {
    /// The empty set
    pub fn empty() -> Self {
        Self { node: None }
    }

    /// A set of direct items only
    pub fn leaf(items: impl IntoIterator<Item = T>) -> Self {
        Self::merge(items, Vec::new())
    }

    /// A set of direct items plus child sets, flattened in postorder
    pub fn merge(items: impl IntoIterator<Item = T>, children: impl IntoIterator<Item = DepSet<T>>) -> Self {
        Self::merge_ordered(Order::Postorder, items, children)
    }

    /// A set of direct items plus child sets with an explicit traversal order
    ///
    /// The order of the set being flattened applies to the whole traversal,
    /// including children built with a different order.
    pub fn merge_ordered(
        order: Order,
        items: impl IntoIterator<Item = T>,
        children: impl IntoIterator<Item = DepSet<T>>,
    ) -> Self {
        let direct: Vec<T> = items.into_iter().collect();
        let mut children: Vec<DepSet<T>> = children.into_iter().filter(|c| !c.is_empty()).collect();

        if direct.is_empty() {
            match children.len() {
                0 => return Self::empty(),
                1 if children[0].order() == order => return children.remove(0),
                _ => {}
            }
        }

        Self {
            node: Some(Arc::new(Node {
                order,
                direct,
                children,
            })),
        }
    }

    /// Whether the set holds no items
    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    /// Traversal order of this set
    pub fn order(&self) -> Order {
        self.node.as_ref().map(|n| n.order).unwrap_or_default()
    }

    /// Whether both handles point at the same shared node
    pub fn shares_root(&self, other: &DepSet<T>) -> bool {
        match (&self.node, &other.node) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> DepSet<T>
where
    T: Eq + Hash + Clone,
{
    /// Enumerate every reachable item once
    ///
    /// A subtree reachable along several paths is expanded once per call. The
    /// result is the same for repeated calls on the same value.
    pub fn flatten(&self) -> Vec<T> {
        let Some(root) = self.node.as_deref() else {
            return Vec::new();
        };

        let mut seen_items: HashSet<&T> = HashSet::new();
        let mut seen_nodes: HashSet<*const Node<T>> = HashSet::new();
        let mut out = Vec::new();

        match root.order {
            Order::Preorder => {
                let mut stack = vec![root];
                while let Some(node) = stack.pop() {
                    if !seen_nodes.insert(node as *const Node<T>) {
                        continue;
                    }
                    emit(&node.direct, &mut seen_items, &mut out);
                    for child in node.children.iter().rev() {
                        if let Some(child) = child.node.as_deref() {
                            stack.push(child);
                        }
                    }
                }
            }
            Order::Postorder => {
                let mut stack = vec![(root, false)];
                while let Some((node, expanded)) = stack.pop() {
                    if expanded {
                        emit(&node.direct, &mut seen_items, &mut out);
                        continue;
                    }
                    if !seen_nodes.insert(node as *const Node<T>) {
                        continue;
                    }
                    stack.push((node, true));
                    for child in node.children.iter().rev() {
                        if let Some(child) = child.node.as_deref() {
                            stack.push((child, false));
                        }
                    }
                }
            }
        }

        out
    }
}

fn emit<'a, T>(items: &'a [T], seen: &mut HashSet<&'a T>, out: &mut Vec<T>)
where
    T: Eq + Hash + Clone,
{
    for item in items {
        if seen.insert(item) {
            out.push(item.clone());
        }
    }
}

impl<T> Clone for DepSet<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T> Default for DepSet<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> FromIterator<T> for DepSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::leaf(iter)
    }
}

impl<T> fmt::Debug for DepSet<T>
where
    T: fmt::Debug + Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.flatten()).finish()
    }
}

impl<T> Serialize for DepSet<T>
where
    T: Serialize + Eq + Hash + Clone,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.flatten())
    }
}
