//! Core contract between decision problems and the tree search engine
//!
//! A `Problem` is a self-contained snapshot of a sequential decision process:
//! a board position, a partially built route, a trick in progress. The search
//! engine is polymorphic over this trait and never learns anything about the
//! rules beyond what the trait exposes. State snapshots must be cheap enough
//! to clone once per search iteration.

use std::fmt::Debug;

use smallvec::SmallVec;
use thiserror::Error;

/// Inline capacity covers typical branching factors without heap traffic.
pub type ActionVec<A> = SmallVec<[A; 16]>;

/// Failures surfaced by [`Problem::wp`] when a priors/value service is
/// involved. The engine treats these as transient: the iteration that hit
/// the failure is abandoned and the error is reported to the caller.
#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("priors service transport failure: {0}")]
    Transport(String),

    #[error("malformed service reply: expected {expected} values, got {got}")]
    MalformedReply { expected: usize, got: usize },
}

/// A sequential decision problem the engine can search.
///
/// Implementations carry the full rules: move generation, state transition,
/// terminality and scoring. The engine deep-copies the state before every
/// iteration, so `Clone` should be as cheap as the domain allows.
///
/// # Sign convention
///
/// Every value returned by [`wp`](Problem::wp) and [`value`](Problem::value)
/// is from the perspective of the `searcher` argument: higher is better for
/// the player that initiated the search. The engine never negates values per
/// tree level; the problem is the sole source of sign.
pub trait Problem: Clone + Send + Sync {
    /// Action labels stored on tree edges. `Default` yields the sentinel
    /// action carried by the artificial root; it is never compared against
    /// real actions.
    type Action: Copy + PartialEq + Eq + Default + Debug + Send + Sync;

    /// Exploration constant in the selection formula.
    const UCT_C: f64;

    /// Concentration of the Dirichlet noise mixed into root priors.
    /// A good default is the inverse of the typical branching factor.
    const DIRICHLET_ALPHA: f64;

    /// Static upper bound on the number of distinct actions.
    const MAX_ACTIONS: usize;

    /// Static upper bound on the branching factor of a single state.
    /// Storage layouts with fixed fan-out rely on this.
    const MAX_CHILDREN: usize;

    /// Terminal state check.
    fn is_finished(&self) -> bool;

    /// The player to move in this state.
    fn current_player(&self) -> usize;

    /// The player that was to move at step `time` of the game. Used by the
    /// result writer to tag opponent decisions along the history.
    fn player_at(&self, time: usize) -> usize;

    /// All rule-respecting next actions for `for_player`. The returned order
    /// is load-bearing: it defines child insertion order in the search tree.
    fn legal_actions(&self, for_player: usize) -> ActionVec<Self::Action>;

    /// Advance the state by one action.
    fn apply(&mut self, action: Self::Action);

    /// Prior probabilities over `actions` plus a scalar value for this
    /// state, both for `searcher`. Priors must sum to 1 when a learned
    /// policy backs them. Problems without a priors service return a flat
    /// `P[i] = 1` vector and fall back to [`value`](Problem::value).
    fn wp(
        &self,
        searcher: usize,
        actions: &[Self::Action],
    ) -> Result<(Vec<f64>, f64), ProblemError> {
        Ok((vec![1.0; actions.len()], self.value(searcher)))
    }

    /// Scalar value of this state for `searcher`, in the same range as the
    /// value returned by [`wp`](Problem::wp). Used at rollout terminals and
    /// depth caps.
    fn value(&self, searcher: usize) -> f64;

    /// Feature tensor of this state for `searcher`, fed to the priors
    /// service and emitted with self-play samples.
    fn state_tensor(&self, _searcher: usize) -> Vec<f32> {
        Vec::new()
    }

    /// Project a visit distribution over actions onto the fixed-size policy
    /// tensor used as a training target.
    fn policy_tensor(&self, _searcher: usize, _pi: &[(Self::Action, f64)]) -> Vec<f32> {
        Vec::new()
    }

    /// Printable form of an action, used by the result writer and logs.
    fn action_to_string(action: &Self::Action) -> String;

    /// Inverse of [`action_to_string`](Problem::action_to_string) on the set
    /// of legal action strings. Drives human input in the front-end.
    fn action_from_string(_s: &str) -> Option<Self::Action> {
        None
    }
}
