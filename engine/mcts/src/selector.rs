//! Action decision policies applied to the sub-root after search.
//!
//! Two modes: deterministic argmax over visit counts, and stochastic
//! sampling from the temperature-scaled visit distribution. Visit counts
//! rather than mean values drive both; in the limit `N` tracks policy
//! quality more robustly than `Q` against noisy sample estimates.

use rand::Rng;
use rand_chacha::ChaCha20Rng;

use crate::config::SearchConfig;

/// Temperature schedule: 1.0 for the opening, a near-deterministic value
/// once `history_len` passes the configured threshold.
pub fn temperature(config: &SearchConfig, history_len: usize) -> f64 {
    if history_len >= config.temp_threshold {
        config.temp_late
    } else {
        1.0
    }
}

/// Index of the highest visit count; ties go to the first entry.
pub fn argmax_visits(visits: &[u32]) -> Option<usize> {
    if visits.is_empty() {
        return None;
    }
    let mut best = 0;
    for (i, &n) in visits.iter().enumerate().skip(1) {
        if n > visits[best] {
            best = i;
        }
    }
    Some(best)
}

/// Normalized `N^(1/tau)` distribution over the children.
pub fn visit_distribution(visits: &[u32], tau: f64) -> Vec<f64> {
    let mut pi: Vec<f64> = visits
        .iter()
        .map(|&n| f64::from(n).powf(1.0 / tau))
        .collect();
    let sum: f64 = pi.iter().sum();
    if sum > 0.0 {
        for p in &mut pi {
            *p /= sum;
        }
    }
    pi
}

/// Sample an index from a normalized distribution.
pub fn sample_index(pi: &[f64], rng: &mut ChaCha20Rng) -> Option<usize> {
    if pi.is_empty() {
        return None;
    }
    let draw: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (i, &p) in pi.iter().enumerate() {
        cumulative += p;
        if draw < cumulative {
            return Some(i);
        }
    }
    // Rounding can leave the cumulative sum a hair under the draw; fall
    // back to the last entry with mass.
    pi.iter().rposition(|&p| p > 0.0)
}
