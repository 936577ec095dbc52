//! Contiguous arena with first-child / next-sibling links.
//!
//! Each node stores the index of its first child; each child stores the
//! index of the next sibling, `0` meaning none. Appending walks the sibling
//! chain, so it is denser than the fixed-width array for sparse nodes at
//! the cost of O(branching) insertion. Single-threaded, like [`ArrayTree`].
//!
//! [`ArrayTree`]: super::ArrayTree

use std::cell::RefCell;

use super::{ChildVec, NodeId, TreeStore};
use crate::node::NodeStats;

#[derive(Debug)]
struct ListNode<A> {
    action: A,
    stats: NodeStats,
    first_child: u32,
    next_sibling: u32,
}

impl<A> ListNode<A> {
    fn new(action: A) -> Self {
        Self {
            action,
            stats: NodeStats::new(),
            first_child: 0,
            next_sibling: 0,
        }
    }
}

/// Arena tree with linked-list children.
#[derive(Debug)]
pub struct ListTree<A> {
    nodes: RefCell<Vec<ListNode<A>>>,
}

impl<A: Copy + Send> TreeStore<A> for ListTree<A> {
    type Ref = NodeId;

    fn new(sentinel: A) -> Self {
        Self {
            nodes: RefCell::new(vec![ListNode::new(sentinel)]),
        }
    }

    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn add_child(&self, parent: &NodeId, action: A) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let child_idx = nodes.len() as u32;

        let head = nodes[parent.0 as usize].first_child;
        if head == 0 {
            nodes[parent.0 as usize].first_child = child_idx;
        } else {
            let mut tail = head;
            while nodes[tail as usize].next_sibling != 0 {
                tail = nodes[tail as usize].next_sibling;
            }
            nodes[tail as usize].next_sibling = child_idx;
        }

        nodes.push(ListNode::new(action));
        NodeId(child_idx)
    }

    fn children(&self, node: &NodeId) -> ChildVec<NodeId> {
        let nodes = self.nodes.borrow();
        let mut out = ChildVec::new();
        let mut current = nodes[node.0 as usize].first_child;
        while current != 0 {
            out.push(NodeId(current));
            current = nodes[current as usize].next_sibling;
        }
        out
    }

    fn child_count(&self, node: &NodeId) -> usize {
        let nodes = self.nodes.borrow();
        let mut count = 0;
        let mut current = nodes[node.0 as usize].first_child;
        while current != 0 {
            count += 1;
            current = nodes[current as usize].next_sibling;
        }
        count
    }

    fn action(&self, node: &NodeId) -> A {
        self.nodes.borrow()[node.0 as usize].action
    }

    fn visits(&self, node: &NodeId) -> u32 {
        self.nodes.borrow()[node.0 as usize].stats.visits()
    }

    fn value_sum(&self, node: &NodeId) -> f64 {
        self.nodes.borrow()[node.0 as usize].stats.value_sum()
    }

    fn prior(&self, node: &NodeId) -> f64 {
        self.nodes.borrow()[node.0 as usize].stats.prior()
    }

    fn set_prior(&self, node: &NodeId, prior: f64) {
        self.nodes.borrow()[node.0 as usize].stats.set_prior(prior);
    }

    fn record_visit(&self, node: &NodeId, value: f64) {
        self.nodes.borrow()[node.0 as usize].stats.record_visit(value);
    }

    fn publish_expansion(&self, node: &NodeId, value: f64) {
        self.nodes.borrow()[node.0 as usize]
            .stats
            .publish_expansion(value);
    }

    fn with_expansion_lock<R>(&self, _node: &NodeId, f: impl FnOnce() -> R) -> R {
        f()
    }

    fn node_id(&self, node: &NodeId) -> u64 {
        u64::from(node.0)
    }

    fn len(&self) -> usize {
        self.nodes.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_chain_preserves_insertion_order() {
        let tree = ListTree::<u8>::new(0);
        let root = tree.root();

        for action in [5u8, 9, 2, 7] {
            tree.add_child(&root, action);
        }

        let actions: Vec<u8> = tree
            .children(&root)
            .iter()
            .map(|c| tree.action(c))
            .collect();
        assert_eq!(actions, vec![5, 9, 2, 7]);
    }

    #[test]
    fn deep_chains_link_correctly() {
        let tree = ListTree::<u8>::new(0);
        let mut node = tree.root();
        for depth in 1..=10u8 {
            node = tree.add_child(&node, depth);
        }
        assert_eq!(tree.len(), 11);
        assert_eq!(tree.action(&node), 10);
        assert_eq!(tree.child_count(&node), 0);
    }
}
