//! Monte Carlo Tree Search engine, generic over a decision problem.
//!
//! The engine owns a search tree across the decisions of one game and is
//! polymorphic over two seams:
//!
//! - the [`Problem`](problem_core::Problem) contract supplies the rules:
//!   move generation, state transition, terminality and scoring;
//! - the [`TreeStore`] contract supplies the node storage layout.
//!
//! Each decision runs four phases per iteration:
//!
//! 1. **Catchup**: walk the externally supplied action history from the
//!    permanent root to the current sub-root, attaching missing nodes.
//! 2. **Selection + expansion**: descend by the PUCT rule (Dirichlet noise
//!    mixed into the priors at the sub-root only); the first visit of a
//!    leaf queries the problem for legal actions, priors and a value.
//! 3. **Rollout**: for problems without a priors service, estimate the
//!    leaf with random playouts, or hand the whole batch to an optional
//!    accelerator.
//! 4. **Backpropagation**: add the value to every node on the visited
//!    path with atomic counter updates.
//!
//! After the single-threaded warm iteration, the remaining iterations can
//! fan out over a worker pool; per-node atomics and the append-only child
//! lists are the only coordination between tasks.
//!
//! ```rust,ignore
//! use mcts::{Mcts, SearchConfig, DynamicTree};
//!
//! let config = SearchConfig::default().with_threads(8);
//! let mut engine: Mcts<MyProblem, DynamicTree<MyAction>> = Mcts::new(config, seed);
//! let action = engine.execute_parallel(player, true, &state, 1600, &history)?;
//! ```

pub mod config;
pub mod node;
pub mod rollout;
pub mod search;
pub mod selector;
pub mod store;
pub mod writer;

pub use config::SearchConfig;
pub use node::{AtomicF64, NodeStats};
pub use rollout::BatchRollout;
pub use search::{Mcts, SearchError};
pub use store::{ArrayTree, DynamicTree, ListTree, NodeId, TreeStore};
pub use writer::{filter_first_level, write_results, RESULT_HEADER};
