//! Single-agent routing adapter: visit every stop once, minimize length.
//!
//! One searching agent, no priors service, values from the tour length:
//! the engine's rollout path and the UCB1 degeneration of the selection
//! rule carry the whole search. Values are normalized into [0, 1] with a
//! linear map between a lower and an upper length bound, so shorter tours
//! score higher.

use std::sync::Arc;

use problem_core::{ActionVec, Problem};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Upper bound on instance size; the visited set is one machine word.
pub const MAX_STOPS: usize = 64;

/// A stop index. The tour always starts at stop 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Stop(pub u16);

/// Route construction state over a shared weight matrix.
#[derive(Debug, Clone)]
pub struct Route {
    weights: Arc<Vec<f64>>,
    stops: usize,
    lower_bound: f64,
    upper_bound: f64,
    visited: u64,
    tour_len: f64,
    position: u16,
    visited_count: usize,
    tour: Vec<Stop>,
}

impl Route {
    /// Build an instance from a row-major `stops x stops` weight matrix.
    ///
    /// # Panics
    ///
    /// Panics when the matrix shape does not match `stops` or the
    /// instance exceeds [`MAX_STOPS`].
    pub fn new(stops: usize, weights: Vec<f64>, lower_bound: f64, upper_bound: f64) -> Self {
        assert!(stops >= 2 && stops <= MAX_STOPS, "instance size {} unsupported", stops);
        assert_eq!(weights.len(), stops * stops, "weight matrix shape mismatch");
        Self {
            weights: Arc::new(weights),
            stops,
            lower_bound,
            upper_bound,
            visited: 1, // stop 0 is the start
            tour_len: 0.0,
            position: 0,
            visited_count: 1,
            tour: vec![Stop(0)],
        }
    }

    /// Random Euclidean instance on the unit square. The upper bound is
    /// the nearest-neighbour tour doubled, which every sensible tour
    /// beats.
    pub fn random(stops: usize, seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let points: Vec<(f64, f64)> = (0..stops).map(|_| (rng.gen(), rng.gen())).collect();
        let mut weights = vec![0.0; stops * stops];
        for (i, a) in points.iter().enumerate() {
            for (j, b) in points.iter().enumerate() {
                weights[i * stops + j] = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
            }
        }

        let greedy = greedy_tour_length(stops, &weights);
        Self::new(stops, weights, 0.0, greedy * 2.0)
    }

    pub fn tour(&self) -> &[Stop] {
        &self.tour
    }

    pub fn tour_length(&self) -> f64 {
        self.tour_len
    }

    fn weight(&self, from: u16, to: u16) -> f64 {
        self.weights[from as usize * self.stops + to as usize]
    }
}

fn greedy_tour_length(stops: usize, weights: &[f64]) -> f64 {
    let mut visited = vec![false; stops];
    visited[0] = true;
    let mut current = 0usize;
    let mut total = 0.0;
    for _ in 1..stops {
        let (next, w) = (0..stops)
            .filter(|&j| !visited[j])
            .map(|j| (j, weights[current * stops + j]))
            .fold((usize::MAX, f64::INFINITY), |best, cand| {
                if cand.1 < best.1 {
                    cand
                } else {
                    best
                }
            });
        visited[next] = true;
        total += w;
        current = next;
    }
    total
}

impl Problem for Route {
    type Action = Stop;

    const UCT_C: f64 = 1.4;
    const DIRICHLET_ALPHA: f64 = 1.0 / 63.0;
    const MAX_ACTIONS: usize = MAX_STOPS;
    const MAX_CHILDREN: usize = MAX_STOPS;

    fn is_finished(&self) -> bool {
        self.visited_count == self.stops
    }

    fn current_player(&self) -> usize {
        0
    }

    fn player_at(&self, _time: usize) -> usize {
        0
    }

    fn legal_actions(&self, _for_player: usize) -> ActionVec<Stop> {
        (1..self.stops as u16)
            .filter(|&i| self.visited & (1 << i) == 0)
            .map(Stop)
            .collect()
    }

    fn apply(&mut self, action: Stop) {
        self.tour_len += self.weight(self.position, action.0);
        self.visited |= 1 << action.0;
        self.position = action.0;
        self.visited_count += 1;
        self.tour.push(action);
    }

    fn value(&self, _searcher: usize) -> f64 {
        let span = self.upper_bound - self.lower_bound;
        ((self.upper_bound - self.tour_len) / span).clamp(0.0, 1.0)
    }

    fn action_to_string(action: &Stop) -> String {
        format!("S{}", action.0)
    }

    fn action_from_string(s: &str) -> Option<Stop> {
        let rest = s.trim().strip_prefix(['S', 's'])?;
        let stop: u16 = rest.parse().ok()?;
        ((stop as usize) < MAX_STOPS).then_some(Stop(stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_instance() -> Route {
        // Four stops on a unit square, corners in order 0-1-2-3.
        let weights = vec![
            0.0, 1.0, std::f64::consts::SQRT_2, 1.0, //
            1.0, 0.0, 1.0, std::f64::consts::SQRT_2, //
            std::f64::consts::SQRT_2, 1.0, 0.0, 1.0, //
            1.0, std::f64::consts::SQRT_2, 1.0, 0.0,
        ];
        Route::new(4, weights, 0.0, 6.0)
    }

    #[test]
    fn tour_visits_every_stop_once() {
        let mut route = square_instance();
        assert!(!route.is_finished());
        assert_eq!(route.legal_actions(0).len(), 3);

        route.apply(Stop(1));
        route.apply(Stop(2));
        assert_eq!(route.legal_actions(0).len(), 1);

        route.apply(Stop(3));
        assert!(route.is_finished());
        assert!(route.legal_actions(0).is_empty());
        assert!((route.tour_length() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn shorter_tours_score_higher() {
        let mut best = square_instance();
        for stop in [1, 2, 3] {
            best.apply(Stop(stop));
        }

        let mut detour = square_instance();
        for stop in [2, 1, 3] {
            detour.apply(Stop(stop));
        }

        assert!(best.value(0) > detour.value(0));
        assert!(best.value(0) <= 1.0);
        assert!(detour.value(0) >= 0.0);
    }

    #[test]
    fn single_agent_everywhere() {
        let route = square_instance();
        assert_eq!(route.current_player(), 0);
        assert_eq!(route.player_at(17), 0);
    }

    #[test]
    fn random_instances_are_reproducible() {
        let a = Route::random(12, 7);
        let b = Route::random(12, 7);
        assert_eq!(a.stops, b.stops);
        assert_eq!(a.weights, b.weights);
        assert!(a.upper_bound > 0.0);
    }

    #[test]
    fn action_strings_round_trip() {
        for stop in [1u16, 5, 63] {
            let s = Route::action_to_string(&Stop(stop));
            assert_eq!(Route::action_from_string(&s), Some(Stop(stop)));
        }
        assert_eq!(Route::action_from_string("S64"), None);
        assert_eq!(Route::action_from_string("7"), None);
    }

    #[test]
    fn flat_priors_without_a_service() {
        let route = square_instance();
        let actions = route.legal_actions(0);
        let (priors, value) = route.wp(0, &actions).unwrap();
        assert_eq!(priors.len(), 3);
        assert!(priors.iter().all(|&p| (p - 1.0).abs() < 1e-12));
        assert!((value - 1.0).abs() < 1e-12);
    }
}
