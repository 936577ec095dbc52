//! Rollout phase: CPU playouts and the batch-accelerator capability.

use problem_core::Problem;
use rand::Rng;
use rand_chacha::ChaCha20Rng;

/// Capability contract for a vector accelerator that can stand in for a
/// batch of CPU rollouts.
///
/// `try_rollout` must attempt a non-blocking acquire of the device: on
/// contention it returns `None` and the caller falls back to CPU playouts.
/// On success the returned value is the *sum* over `iterations` rollouts
/// from `state`, with the usual sign convention.
pub trait BatchRollout<P: Problem>: Send + Sync {
    fn try_rollout(&self, state: &P, iterations: u32) -> Option<f64>;
}

/// Play uniformly random legal actions until the state terminates or the
/// depth cap is hit, then score it for `searcher`.
///
/// The state is advanced in place; callers hand in a clone.
pub fn rollout<P: Problem>(
    state: &mut P,
    searcher: usize,
    max_depth: u32,
    rng: &mut ChaCha20Rng,
) -> f64 {
    let mut depth = 0;
    while !state.is_finished() && depth < max_depth {
        let actions = state.legal_actions(state.current_player());
        if actions.is_empty() {
            break;
        }
        let pick = actions[rng.gen_range(0..actions.len())];
        state.apply(pick);
        depth += 1;
    }
    state.value(searcher)
}
