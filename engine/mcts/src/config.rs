//! Search configuration.
//!
//! Exploration constants that depend on the problem (`UCT_C`,
//! `DIRICHLET_ALPHA`) live on the [`Problem`](problem_core::Problem) trait;
//! this struct holds the knobs that belong to the engine itself.

/// Configuration for one search engine instance.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// CPU rollouts per iteration. `0` means the problem is priors-backed
    /// and the expansion value is used directly, with no rollout phase.
    pub rollout_iter: u32,

    /// Depth cap for a single rollout before falling back to the problem's
    /// scalar value.
    pub max_rollout_depth: u32,

    /// Worker threads for the parallel fan-out. `1` keeps every iteration
    /// on the calling thread.
    pub num_threads: usize,

    /// Minimum iterations handed to a worker at once; smooths long-tail
    /// iterations without starving the pool.
    pub chunk_min: usize,

    /// Share of the root prior kept when mixing in Dirichlet noise.
    pub root_noise_ratio: f64,

    /// Half-move count after which the stochastic selector anneals.
    pub temp_threshold: usize,

    /// Temperature used after `temp_threshold`; near-deterministic.
    pub temp_late: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rollout_iter: 0,
            max_rollout_depth: 64,
            num_threads: 1,
            chunk_min: 6,
            root_noise_ratio: 0.75,
            temp_threshold: 30,
            temp_late: 0.05,
        }
    }
}

impl SearchConfig {
    /// Fast settings for unit tests.
    pub fn for_testing() -> Self {
        Self {
            rollout_iter: 1,
            max_rollout_depth: 32,
            ..Self::default()
        }
    }

    pub fn with_rollout_iter(mut self, iter: u32) -> Self {
        self.rollout_iter = iter;
        self
    }

    pub fn with_max_rollout_depth(mut self, depth: u32) -> Self {
        self.max_rollout_depth = depth;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    pub fn with_temp_threshold(mut self, threshold: usize) -> Self {
        self.temp_threshold = threshold;
        self
    }
}
