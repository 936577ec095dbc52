//! Node storage for the search tree.
//!
//! The search algorithm is transparent over the layout of its nodes; a
//! layout only has to implement [`TreeStore`]. Three layouts are provided:
//!
//! - [`DynamicTree`] — one heap allocation per node, children held as owning
//!   pointers. Node addresses are stable across growth, which makes this the
//!   only layout usable by the parallel driver.
//! - [`ArrayTree`] — all nodes in one contiguous arena, each node carrying a
//!   fixed-width array of child indices. Valid only for problems with a
//!   static branching bound.
//! - [`ListTree`] — contiguous arena with first-child / next-sibling links;
//!   denser than the fixed-width array when most nodes stay sparse.
//!
//! All layouts share the atomic [`NodeStats`](crate::node::NodeStats) block,
//! so statistics reads never lock regardless of layout. The arena layouts
//! use `RefCell` for growth and are deliberately `!Sync`: handing one to the
//! parallel driver is a compile error, not a data race.

mod array;
mod dynamic;
mod list;

pub use array::ArrayTree;
pub use dynamic::{DynNode, DynamicTree};
pub use list::ListTree;

use smallvec::SmallVec;

/// Index of a node inside an arena layout. `NodeId(0)` is always the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Snapshot of a node's children, in insertion order.
pub type ChildVec<R> = SmallVec<[R; 8]>;

/// Storage contract required by the search.
///
/// Children are append-only and keep insertion order; the order is
/// observable through selection, Dirichlet noise indexing and the result
/// writer. `add_child` attaches a node with `N = 0`, `W = 0`, `P = 0`.
pub trait TreeStore<A: Copy>: Send {
    /// Stable handle to a node. Cheap to clone.
    type Ref: Clone + Send;

    /// Create a tree holding only the artificial root.
    fn new(sentinel: A) -> Self;

    fn root(&self) -> Self::Ref;

    /// Append a fresh child. Concurrent callers must hold the parent's
    /// expansion lock; readers may observe a transiently shorter child
    /// list but never a torn node.
    fn add_child(&self, parent: &Self::Ref, action: A) -> Self::Ref;

    /// Children of `node` at this instant, insertion order.
    fn children(&self, node: &Self::Ref) -> ChildVec<Self::Ref>;

    fn child_count(&self, node: &Self::Ref) -> usize;

    fn action(&self, node: &Self::Ref) -> A;

    fn visits(&self, node: &Self::Ref) -> u32;

    fn value_sum(&self, node: &Self::Ref) -> f64;

    fn prior(&self, node: &Self::Ref) -> f64;

    /// Write-once prior assignment, done during the parent's expansion.
    fn set_prior(&self, node: &Self::Ref, prior: f64);

    /// One backup step on this node: `N += 1`, `W += value`.
    fn record_visit(&self, node: &Self::Ref, value: f64);

    /// Publish a freshly expanded leaf: `W += value`, then `N = 1`.
    fn publish_expansion(&self, node: &Self::Ref, value: f64);

    /// Run `f` inside the node's first-expansion critical section. The
    /// single-threaded layouts run `f` directly.
    fn with_expansion_lock<R>(&self, node: &Self::Ref, f: impl FnOnce() -> R) -> R;

    /// Stable identifier for the result writer.
    fn node_id(&self, node: &Self::Ref) -> u64;

    /// Total number of nodes currently in the tree.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise_store<T: TreeStore<u8>>() {
        let tree = T::new(255);
        assert_eq!(tree.len(), 1);

        let root = tree.root();
        assert_eq!(tree.child_count(&root), 0);
        assert_eq!(tree.visits(&root), 0);
        assert!(tree.value_sum(&root).abs() < 1e-12);

        // Insertion order must be preserved.
        for action in [3u8, 1, 4] {
            tree.add_child(&root, action);
        }
        let children = tree.children(&root);
        assert_eq!(children.len(), 3);
        assert_eq!(tree.child_count(&root), 3);
        let actions: Vec<u8> = children.iter().map(|c| tree.action(c)).collect();
        assert_eq!(actions, vec![3, 1, 4]);

        // Fresh children start zeroed.
        for child in &children {
            assert_eq!(tree.visits(child), 0);
            assert!(tree.prior(child).abs() < 1e-12);
        }

        tree.set_prior(&children[0], 0.9);
        assert!((tree.prior(&children[0]) - 0.9).abs() < 1e-12);

        tree.record_visit(&children[1], -0.5);
        tree.record_visit(&children[1], -0.5);
        assert_eq!(tree.visits(&children[1]), 2);
        assert!((tree.value_sum(&children[1]) + 1.0).abs() < 1e-12);

        tree.publish_expansion(&children[2], 0.25);
        assert_eq!(tree.visits(&children[2]), 1);

        // Grandchildren hang off the right parent.
        let grandchild = tree.add_child(&children[0], 7);
        assert_eq!(tree.child_count(&children[0]), 1);
        assert_eq!(tree.action(&grandchild), 7);
        assert_eq!(tree.len(), 5);

        // Identifiers are pairwise distinct.
        let mut ids: Vec<u64> = children.iter().map(|c| tree.node_id(c)).collect();
        ids.push(tree.node_id(&root));
        ids.push(tree.node_id(&grandchild));
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn dynamic_tree_contract() {
        exercise_store::<DynamicTree<u8>>();
    }

    #[test]
    fn array_tree_contract() {
        exercise_store::<ArrayTree<u8, 8>>();
    }

    #[test]
    fn list_tree_contract() {
        exercise_store::<ListTree<u8>>();
    }
}
