//! The search engine: catchup, selection, expansion, rollout, backup.
//!
//! One [`Mcts`] instance owns one tree for the lifetime of a game. Each
//! decision walks the externally supplied action history down to the
//! current sub-root (catchup), runs a single-threaded warm iteration so
//! the sub-root is expanded, then fans the remaining iterations out over
//! a worker pool. Statistics accumulated for earlier decisions stay in
//! the tree and are reused when the game revisits the same lines.
//!
//! Values flow with a single sign convention: always from the searching
//! player's perspective, produced by the problem. The engine never
//! negates per tree level.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use eval_client::{ClientError, SampleSink};
use problem_core::{Problem, ProblemError};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Gamma};
use rayon::prelude::*;
use smallvec::{smallvec, SmallVec};
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::SearchConfig;
use crate::rollout::{rollout, BatchRollout};
use crate::selector;
use crate::store::{DynamicTree, TreeStore};

/// Errors that abort a decision.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("problem evaluation failed: {0}")]
    Problem(#[from] ProblemError),

    #[error("sample sink failed: {0}")]
    Sink(#[from] ClientError),

    #[error("no legal actions at the sub-root")]
    NoLegalActions,

    #[error("worker pool unavailable: {0}")]
    ThreadPool(String),
}

/// Outcome of the first-expansion critical section.
enum Expansion {
    /// This iteration expanded the node; carries the expansion value.
    Fresh(f64),
    /// Another iteration expanded the node first; continue selecting.
    Raced,
}

/// Monte Carlo tree search over a problem `P` with storage layout `T`.
pub struct Mcts<P: Problem, T: TreeStore<P::Action>> {
    tree: T,
    config: SearchConfig,
    seed: u64,
    decisions: u64,
    sink: Option<SampleSink>,
    accel: Option<Box<dyn BatchRollout<P>>>,
    _problem: PhantomData<P>,
}

impl<P: Problem, T: TreeStore<P::Action>> Mcts<P, T> {
    /// Create an engine with a fresh tree rooted at the sentinel action.
    pub fn new(config: SearchConfig, seed: u64) -> Self {
        Self {
            tree: T::new(P::Action::default()),
            config,
            seed,
            decisions: 0,
            sink: None,
            accel: None,
            _problem: PhantomData,
        }
    }

    /// Attach the self-play sample sink used by the stochastic selector.
    pub fn with_sink(mut self, sink: SampleSink) -> Self {
        if !sink.is_disabled() {
            self.sink = Some(sink);
        }
        self
    }

    /// Attach a batch-rollout accelerator.
    pub fn with_batch_rollout(mut self, accel: Box<dyn BatchRollout<P>>) -> Self {
        self.accel = Some(accel);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The underlying tree, for the result writer and diagnostics.
    pub fn tree(&self) -> &T {
        &self.tree
    }

    /// Decide the next action for `player` on `state`, spending at most
    /// `iterations` search iterations. `history` is the full list of
    /// actions that produced `state` from the initial position.
    ///
    /// Runs every iteration on the calling thread; the fan-out variant
    /// lives on the owned-pointer layout (see `execute_parallel`).
    pub fn execute(
        &mut self,
        player: usize,
        deterministic: bool,
        state: &P,
        iterations: u32,
        history: &[P::Action],
    ) -> Result<P::Action, SearchError> {
        let mut rng = self.decision_rng();
        let subroot = self.catchup(history);

        // Warm iteration: guarantees the sub-root is expanded.
        self.run_iteration(&subroot, state, player, &mut rng)?;

        if let Some(action) = self.sole_action(&subroot, deterministic) {
            return Ok(action);
        }

        for _ in 1..iterations {
            self.run_iteration(&subroot, state, player, &mut rng)?;
        }

        self.decide(&subroot, deterministic, state, player, history.len(), &mut rng)
    }

    /// Walk the tree along `history` from the permanent root, attaching
    /// missing nodes, and return the node for the current state.
    fn catchup(&self, history: &[P::Action]) -> T::Ref {
        let mut node = self.tree.root();
        for action in history {
            let existing = self
                .tree
                .children(&node)
                .into_iter()
                .find(|child| self.tree.action(child) == *action);
            node = match existing {
                Some(child) => child,
                None => self.tree.add_child(&node, *action),
            };
        }
        node
    }

    /// Fresh RNG for one decision, derived from the engine seed so that
    /// single-threaded runs with a fixed seed replay exactly.
    fn decision_rng(&mut self) -> ChaCha20Rng {
        let rng = ChaCha20Rng::seed_from_u64(self.seed.wrapping_add(self.decisions));
        self.decisions += 1;
        rng
    }

    /// Early exit: with a single legal continuation and a deterministic
    /// selector there is nothing to search.
    fn sole_action(&self, subroot: &T::Ref, deterministic: bool) -> Option<P::Action> {
        if deterministic && self.tree.child_count(subroot) == 1 {
            let children = self.tree.children(subroot);
            return Some(self.tree.action(&children[0]));
        }
        None
    }

    /// One complete iteration: selection, expansion, optional rollout,
    /// backup. The state is cloned so the caller's snapshot stays intact.
    fn run_iteration(
        &self,
        subroot: &T::Ref,
        root_state: &P,
        player: usize,
        rng: &mut ChaCha20Rng,
    ) -> Result<(), SearchError> {
        let mut state = root_state.clone();
        let mut visited: SmallVec<[T::Ref; 32]> = smallvec![subroot.clone()];
        let mut node = subroot.clone();

        // Root noise is resampled every iteration and applied only at the
        // sub-root's selection step.
        let root_children = self.tree.child_count(subroot);
        let noise = if root_children > 0 {
            Some(dirichlet_noise(root_children, P::DIRICHLET_ALPHA, rng))
        } else {
            None
        };
        let mut at_subroot = true;

        loop {
            if state.is_finished() {
                let value = state.value(player);
                self.backprop(&visited, value);
                return Ok(());
            }

            if self.tree.visits(&node) == 0 {
                match self.expand(&node, &state, player)? {
                    Expansion::Fresh(value) => {
                        if self.config.rollout_iter == 0 {
                            // Priors path: the expansion publishes the
                            // leaf's own visit, ancestors get the value.
                            self.tree.publish_expansion(&node, value);
                            self.backprop(&visited[..visited.len() - 1], value);
                        } else {
                            self.rollout_and_backup(&state, player, &visited, rng);
                        }
                        return Ok(());
                    }
                    Expansion::Raced => {}
                }
            }

            let noise_slice = if at_subroot { noise.as_deref() } else { None };
            let Some(best) = self.select_child(&node, noise_slice) else {
                // Expanded non-terminal node without children: the problem
                // broke the legal-actions contract.
                return Err(SearchError::NoLegalActions);
            };
            state.apply(self.tree.action(&best));
            visited.push(best.clone());
            node = best;
            at_subroot = false;
        }
    }

    /// First-visit expansion: attach one child per legal action, priors
    /// assigned in the problem's action order.
    fn expand(&self, node: &T::Ref, state: &P, player: usize) -> Result<Expansion, SearchError> {
        self.tree.with_expansion_lock(node, || {
            if self.tree.child_count(node) != 0 {
                return Ok(Expansion::Raced);
            }
            let actions = state.legal_actions(state.current_player());
            let (priors, value) = state.wp(player, &actions)?;
            debug_assert_eq!(priors.len(), actions.len());
            for (action, prior) in actions.iter().zip(priors.iter()) {
                let child = self.tree.add_child(node, *action);
                self.tree.set_prior(&child, *prior);
            }
            Ok(Expansion::Fresh(value))
        })
    }

    /// PUCT over the children of a fully expanded node. Ties go to the
    /// first child in insertion order.
    fn select_child(&self, node: &T::Ref, noise: Option<&[f64]>) -> Option<T::Ref> {
        let sqrt_parent = f64::from(self.tree.visits(node).max(1)).sqrt();
        let ratio = if noise.is_some() {
            self.config.root_noise_ratio
        } else {
            1.0
        };

        let mut best: Option<T::Ref> = None;
        let mut best_score = f64::NEG_INFINITY;
        for (i, child) in self.tree.children(node).into_iter().enumerate() {
            let mixed = noise.map_or(0.0, |d| d[i % d.len()]);
            let p = ratio * self.tree.prior(&child) + (1.0 - ratio) * mixed;
            let n = f64::from(self.tree.visits(&child)) + f64::EPSILON;
            let q = self.tree.value_sum(&child) / n;
            let u = p * sqrt_parent / (1.0 + n);
            let score = q + P::UCT_C * u;
            if score > best_score {
                best_score = score;
                best = Some(child);
            }
        }
        best
    }

    /// Estimate the expanded leaf by playout and back the results up the
    /// visited path, leaf included. A batch accelerator, when present and
    /// free, stands in for the whole block of CPU rollouts.
    fn rollout_and_backup(
        &self,
        state: &P,
        player: usize,
        visited: &[T::Ref],
        rng: &mut ChaCha20Rng,
    ) {
        let iters = self.config.rollout_iter;
        if let Some(accel) = &self.accel {
            if let Some(sum) = accel.try_rollout(state, iters) {
                // One backup per replaced rollout keeps the visit counts
                // identical to the CPU path under concurrent updates.
                let mean = sum / f64::from(iters);
                for _ in 0..iters {
                    self.backprop(visited, mean);
                }
                return;
            }
        }
        for _ in 0..iters {
            let mut playout = state.clone();
            let value = rollout(&mut playout, player, self.config.max_rollout_depth, rng);
            self.backprop(visited, value);
        }
    }

    fn backprop(&self, visited: &[T::Ref], value: f64) {
        for node in visited {
            self.tree.record_visit(node, value);
        }
        trace!(depth = visited.len(), value, "backup complete");
    }

    /// Pick the action to play from the sub-root's children and, in
    /// stochastic mode, emit the self-play training sample.
    fn decide(
        &self,
        subroot: &T::Ref,
        deterministic: bool,
        state: &P,
        player: usize,
        history_len: usize,
        rng: &mut ChaCha20Rng,
    ) -> Result<P::Action, SearchError> {
        let children = self.tree.children(subroot);
        if children.is_empty() {
            return Err(SearchError::NoLegalActions);
        }
        let visits: Vec<u32> = children.iter().map(|c| self.tree.visits(c)).collect();

        let picked = if deterministic {
            let best = selector::argmax_visits(&visits).ok_or(SearchError::NoLegalActions)?;
            self.log_children(&children, None);
            self.tree.action(&children[best])
        } else {
            let tau = selector::temperature(&self.config, history_len);
            let mut pi = selector::visit_distribution(&visits, tau);
            if pi.iter().sum::<f64>() == 0.0 {
                // Nothing visited yet; sample uniformly.
                pi = vec![1.0 / visits.len() as f64; visits.len()];
            }

            let best = selector::sample_index(&pi, rng).ok_or(SearchError::NoLegalActions)?;
            self.log_children(&children, Some(&pi));

            if let Some(sink) = &self.sink {
                let pairs: Vec<(P::Action, f64)> = children
                    .iter()
                    .zip(pi.iter())
                    .map(|(child, &p)| (self.tree.action(child), p))
                    .collect();
                let state_tensor = state.state_tensor(player);
                let policy_tensor = state.policy_tensor(player, &pairs);
                sink.store_sample(&state_tensor, &policy_tensor)?;
            }

            self.tree.action(&children[best])
        };
        Ok(picked)
    }

    fn log_children(&self, children: &[T::Ref], pi: Option<&[f64]>) {
        for (i, child) in children.iter().enumerate() {
            let n = self.tree.visits(child);
            let w = self.tree.value_sum(child);
            let q = if n == 0 { 0.0 } else { w / f64::from(n) };
            debug!(
                action = %P::action_to_string(&self.tree.action(child)),
                pi = pi.map(|p| p[i]),
                n,
                w,
                q,
                "candidate action"
            );
        }
    }
}

impl<P: Problem> Mcts<P, DynamicTree<P::Action>> {
    /// `execute` with parallel fan-out: after the warm iteration, the
    /// remaining iterations run on a worker pool in dynamic chunks. Only
    /// the owned-pointer layout supports this; the arena layouts are not
    /// `Sync` and stay single-threaded by construction.
    pub fn execute_parallel(
        &mut self,
        player: usize,
        deterministic: bool,
        state: &P,
        iterations: u32,
        history: &[P::Action],
    ) -> Result<P::Action, SearchError> {
        let threads = self.config.num_threads.max(1);
        if threads == 1 {
            return self.execute(player, deterministic, state, iterations, history);
        }

        let mut rng = self.decision_rng();
        let worker_seed = self.seed.wrapping_add(self.decisions);
        let subroot = self.catchup(history);

        self.run_iteration(&subroot, state, player, &mut rng)?;

        if let Some(action) = self.sole_action(&subroot, deterministic) {
            return Ok(action);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| SearchError::ThreadPool(e.to_string()))?;

        // A failed iteration is not backed up; the first error stops the
        // fan-out at the next loop head and fails the whole decision.
        let abort = AtomicBool::new(false);
        let first_error: Mutex<Option<SearchError>> = Mutex::new(None);
        let engine = &*self;
        let subroot_ref = &subroot;

        pool.install(|| {
            (1..iterations)
                .into_par_iter()
                .with_min_len(engine.config.chunk_min)
                .for_each_init(
                    || {
                        let thread = rayon::current_thread_index().unwrap_or(0) as u64;
                        ChaCha20Rng::seed_from_u64(worker_seed.wrapping_add(thread))
                    },
                    |task_rng, _| {
                        if abort.load(Ordering::Relaxed) {
                            return;
                        }
                        if let Err(err) =
                            engine.run_iteration(subroot_ref, state, player, task_rng)
                        {
                            abort.store(true, Ordering::Relaxed);
                            let mut slot = first_error
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner());
                            slot.get_or_insert(err);
                        }
                    },
                );
        });

        if let Some(err) = first_error
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
        {
            return Err(err);
        }

        self.decide(&subroot, deterministic, state, player, history.len(), &mut rng)
    }
}

/// Dirichlet(alpha) noise vector of length `k`, built from normalized
/// Gamma variates.
fn dirichlet_noise(k: usize, alpha: f64, rng: &mut ChaCha20Rng) -> Vec<f64> {
    let Ok(gamma) = Gamma::new(alpha, 1.0) else {
        return vec![1.0 / k as f64; k];
    };
    let mut noise: Vec<f64> = (0..k).map(|_| gamma.sample(rng)).collect();
    let sum: f64 = noise.iter().sum();
    if sum > 0.0 {
        for n in &mut noise {
            *n /= sum;
        }
    }
    noise
}
