//! Contiguous arena with fixed-width child index arrays.
//!
//! Nodes live in one growable vector; each node stores up to `MAX` child
//! indices, with `0` marking an empty slot (index 0 is the root, which can
//! never be a child). Only valid when the problem declares a static
//! branching bound. Single-threaded: growth goes through a `RefCell`,
//! which keeps this layout out of the parallel driver by construction.

use std::cell::RefCell;

use super::{ChildVec, NodeId, TreeStore};
use crate::node::NodeStats;

#[derive(Debug)]
struct ArrayNode<A, const MAX: usize> {
    action: A,
    stats: NodeStats,
    children: [u32; MAX],
}

impl<A, const MAX: usize> ArrayNode<A, MAX> {
    fn new(action: A) -> Self {
        Self {
            action,
            stats: NodeStats::new(),
            children: [0; MAX],
        }
    }
}

/// Arena tree with fixed fan-out `MAX`.
#[derive(Debug)]
pub struct ArrayTree<A, const MAX: usize> {
    nodes: RefCell<Vec<ArrayNode<A, MAX>>>,
}

impl<A: Copy + Send, const MAX: usize> TreeStore<A> for ArrayTree<A, MAX> {
    type Ref = NodeId;

    fn new(sentinel: A) -> Self {
        Self {
            nodes: RefCell::new(vec![ArrayNode::new(sentinel)]),
        }
    }

    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn add_child(&self, parent: &NodeId, action: A) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let child_idx = nodes.len() as u32;

        let parent_node = &mut nodes[parent.0 as usize];
        let slot = parent_node
            .children
            .iter()
            .position(|&c| c == 0)
            .unwrap_or_else(|| panic!("fan-out bound {} exceeded", MAX));
        parent_node.children[slot] = child_idx;

        nodes.push(ArrayNode::new(action));
        NodeId(child_idx)
    }

    fn children(&self, node: &NodeId) -> ChildVec<NodeId> {
        let nodes = self.nodes.borrow();
        nodes[node.0 as usize]
            .children
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| NodeId(c))
            .collect()
    }

    fn child_count(&self, node: &NodeId) -> usize {
        let nodes = self.nodes.borrow();
        nodes[node.0 as usize]
            .children
            .iter()
            .take_while(|&&c| c != 0)
            .count()
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
