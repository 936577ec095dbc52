//! Per-node search statistics.
//!
//! Every storage layout shares the same statistics block so that readers
//! never need a lock: the visit count and accumulated value are atomics,
//! and the prior is published once at expansion before any other thread
//! can reach the child.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Atomic `f64` built on bit-cast compare-and-swap.
///
/// Accumulation is lock-free; contended adds retry. Statistics tolerate the
/// relaxed interleaving this produces across iterations.
#[derive(Debug, Default)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    #[inline]
    pub fn fetch_add(&self, value: f64) -> f64 {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self
                .bits
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return f64::from_bits(current),
                Err(observed) => current = observed,
            }
        }
    }
}

/// Visit count `N`, accumulated value `W` and prior `P` of one node.
#[derive(Debug, Default)]
pub struct NodeStats {
    n: AtomicU32,
    w: AtomicF64,
    p: AtomicF64,
}

impl NodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn visits(&self) -> u32 {
        self.n.load(Ordering::Acquire)
    }

    #[inline]
    pub fn value_sum(&self) -> f64 {
        self.w.load()
    }

    #[inline]
    pub fn prior(&self) -> f64 {
        self.p.load()
    }

    /// Written exactly once, under the parent's expansion lock, before the
    /// child becomes reachable by other iterations.
    #[inline]
    pub fn set_prior(&self, prior: f64) {
        self.p.store(prior);
    }

    /// One backup step: `W += value`, then `N += 1`.
    #[inline]
    pub fn record_visit(&self, value: f64) {
        self.w.fetch_add(value);
        self.n.fetch_add(1, Ordering::AcqRel);
    }

    /// Publish a freshly expanded node: store the expansion value and set
    /// `N = 1` last, so any reader that observes the visit also observes
    /// the children and their priors.
    #[inline]
    pub fn publish_expansion(&self, value: f64) {
        self.w.fetch_add(value);
        self.n.store(1, Ordering::Release);
    }

    /// Mean value `Q = W / N`; zero while unvisited.
    #[inline]
    pub fn mean_value(&self) -> f64 {
        let n = self.visits();
        if n == 0 {
            0.0
        } else {
            self.value_sum() / f64::from(n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn atomic_f64_accumulates() {
        let value = AtomicF64::new(1.5);
        value.fetch_add(2.25);
        value.fetch_add(-0.75);
        assert!((value.load() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn atomic_f64_concurrent_adds_do_not_lose_updates() {
        let value = Arc::new(AtomicF64::new(0.0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let value = Arc::clone(&value);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        value.fetch_add(0.5);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!((value.load() - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn fresh_stats_are_zero() {
        let stats = NodeStats::new();
        assert_eq!(stats.visits(), 0);
        assert!(stats.value_sum().abs() < 1e-12);
        assert!(stats.prior().abs() < 1e-12);
        assert!(stats.mean_value().abs() < 1e-12);
    }

    #[test]
    fn record_visit_updates_counters() {
        let stats = NodeStats::new();
        stats.record_visit(0.5);
        stats.record_visit(1.5);
        assert_eq!(stats.visits(), 2);
        assert!((stats.value_sum() - 2.0).abs() < 1e-12);
        assert!((stats.mean_value() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn publish_expansion_sets_single_visit() {
        let stats = NodeStats::new();
        stats.publish_expansion(0.25);
        assert_eq!(stats.visits(), 1);
        assert!((stats.value_sum() - 0.25).abs() < 1e-12);
    }
}
