//! Owned-pointer layout: one allocation per node, stable addresses.
//!
//! This is the layout the parallel driver requires. Children are appended
//! under the node's child lock, and the separate expansion lock serializes
//! the first-expansion critical section, so concurrent iterations can read
//! the tree while one of them grows it.

use std::sync::{Arc, Mutex};

use super::{ChildVec, TreeStore};
use crate::node::NodeStats;

#[derive(Debug)]
pub struct DynNode<A> {
    action: A,
    stats: NodeStats,
    expansion: Mutex<()>,
    children: Mutex<Vec<Arc<DynNode<A>>>>,
}

impl<A> DynNode<A> {
    fn new(action: A) -> Self {
        Self {
            action,
            stats: NodeStats::new(),
            expansion: Mutex::new(()),
            children: Mutex::new(Vec::new()),
        }
    }
}

/// Tree of individually heap-allocated nodes.
#[derive(Debug)]
pub struct DynamicTree<A> {
    root: Arc<DynNode<A>>,
    node_count: std::sync::atomic::AtomicUsize,
}

impl<A> DynamicTree<A> {
    fn lock_children<'a>(
        node: &'a DynNode<A>,
    ) -> std::sync::MutexGuard<'a, Vec<Arc<DynNode<A>>>> {
        node.children.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<A: Copy + Send + Sync> TreeStore<A> for DynamicTree<A> {
    type Ref = Arc<DynNode<A>>;

    fn new(sentinel: A) -> Self {
        Self {
            root: Arc::new(DynNode::new(sentinel)),
            node_count: std::sync::atomic::AtomicUsize::new(1),
        }
    }

    fn root(&self) -> Self::Ref {
        Arc::clone(&self.root)
    }

    fn add_child(&self, parent: &Self::Ref, action: A) -> Self::Ref {
        let child = Arc::new(DynNode::new(action));
        Self::lock_children(parent).push(Arc::clone(&child));
        self.node_count
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        child
    }

    fn children(&self, node: &Self::Ref) -> ChildVec<Self::Ref> {
        Self::lock_children(node).iter().map(Arc::clone).collect()
    }

    fn child_count(&self, node: &Self::Ref) -> usize {
        Self::lock_children(node).len()
    }

    fn action(&self, node: &Self::Ref) -> A {
        node.action
    }

    fn visits(&self, node: &Self::Ref) -> u32 {
        node.stats.visits()
    }

    fn value_sum(&self, node: &Self::Ref) -> f64 {
        node.stats.value_sum()
    }

    fn prior(&self, node: &Self::Ref) -> f64 {
        node.stats.prior()
    }

    fn set_prior(&self, node: &Self::Ref, prior: f64) {
        node.stats.set_prior(prior);
    }

    fn record_visit(&self, node: &Self::Ref, value: f64) {
        node.stats.record_visit(value);
    }

    fn publish_expansion(&self, node: &Self::Ref, value: f64) {
        node.stats.publish_expansion(value);
    }

    fn with_expansion_lock<R>(&self, node: &Self::Ref, f: impl FnOnce() -> R) -> R {
        let guard = node
            .expansion
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = f();
        drop(guard);
        result
    }

    fn node_id(&self, node: &Self::Ref) -> u64 {
        Arc::as_ptr(node) as usize as u64
    }

    fn len(&self) -> usize {
        self.node_count.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn references_stay_valid_across_growth() {
        let tree = DynamicTree::<u8>::new(0);
        let root = tree.root();
        let first = tree.add_child(&root, 1);
        let first_id = tree.node_id(&first);

        for action in 2..100u8 {
            tree.add_child(&root, action);
        }

        assert_eq!(tree.node_id(&first), first_id);
        assert_eq!(tree.action(&first), 1);
        assert_eq!(tree.child_count(&root), 99);
    }

    #[test]
    fn concurrent_appends_under_expansion_lock() {
        let tree = std::sync::Arc::new(DynamicTree::<u8>::new(0));
        let root = tree.root();

        let handles: Vec<_> = (0..4u8)
            .map(|worker| {
                let tree = std::sync::Arc::clone(&tree);
                let root = root.clone();
                thread::spawn(move || {
                    for i in 0..50u8 {
                        tree.with_expansion_lock(&root, || {
                            tree.add_child(&root, worker * 50 + i);
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tree.child_count(&root), 200);
        assert_eq!(tree.len(), 201);
    }
}
