//! Driver configuration from command-line flags.

use anyhow::{anyhow, Result};
use clap::Parser;
use mcts::SearchConfig;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "selfplay")]
#[command(about = "Tree-search game driver")]
#[command(
    long_about = "Plays a full game with tree-search deciders, optionally backed by a
priors/value service per player and a self-play sample sink. Set a
player's iteration budget to 0 to read that player's moves from stdin."
)]
pub struct Config {
    /// Problem to play: connect4 or route
    #[arg(long, default_value = "connect4")]
    pub problem: String,

    /// Deterministic action selection (false samples by visit count)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub deterministic: bool,

    /// Base RNG seed; derived per player. Random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Search iterations per decision for player 0 (0 = human input)
    #[arg(long, default_value_t = 1600)]
    pub iterations_p0: u32,

    /// Search iterations per decision for player 1 (0 = human input)
    #[arg(long, default_value_t = 1600)]
    pub iterations_p1: u32,

    /// CPU rollouts per iteration; 0 uses the expansion value directly
    /// and requires a priors endpoint
    #[arg(long, default_value_t = 1)]
    pub rollout_iter: u32,

    /// Depth cap for a single rollout
    #[arg(long, default_value_t = 64)]
    pub max_rollout_depth: u32,

    /// Worker threads per decision
    #[arg(long, default_value_t = 1)]
    pub threads: usize,

    /// Priors endpoint for player 0 ("0" disables)
    #[arg(long, default_value = "0")]
    pub port_p0: String,

    /// Priors endpoint for player 1 ("0" disables)
    #[arg(long, default_value = "0")]
    pub port_p1: String,

    /// Sample sink endpoint ("0" disables)
    #[arg(long, default_value = "0")]
    pub port_sink: String,

    /// Dump the search tree to CSV after the game
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub write_tree: bool,

    /// Directory for result files
    #[arg(long, default_value = ".")]
    pub work_dir: String,

    /// Half-moves before the stochastic selector anneals
    #[arg(long, default_value_t = 30)]
    pub temp_threshold: usize,

    /// Stops in a generated routing instance
    #[arg(long, default_value_t = 12)]
    pub route_stops: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        match self.problem.as_str() {
            "connect4" | "route" => {}
            other => return Err(anyhow!("unknown problem '{}'", other)),
        }

        if self.threads == 0 {
            return Err(anyhow!("threads must be at least 1"));
        }

        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }

        if self.problem == "connect4"
            && self.rollout_iter == 0
            && (self.port_p0 == "0" || self.port_p1 == "0")
        {
            return Err(anyhow!(
                "rollout_iter 0 uses expansion values only and needs a priors endpoint per player"
            ));
        }

        if self.problem == "route" && !(2..=problems_route::MAX_STOPS).contains(&self.route_stops)
        {
            return Err(anyhow!(
                "route_stops must be between 2 and {}",
                problems_route::MAX_STOPS
            ));
        }

        Ok(())
    }

    /// Base seed, drawn once when not fixed on the command line.
    pub fn seed_value(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig::default()
            .with_rollout_iter(self.rollout_iter)
            .with_max_rollout_depth(self.max_rollout_depth)
            .with_threads(self.threads)
            .with_temp_threshold(self.temp_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            problem: "connect4".into(),
            deterministic: true,
            seed: Some(1),
            iterations_p0: 100,
            iterations_p1: 100,
            rollout_iter: 1,
            max_rollout_depth: 64,
            threads: 1,
            port_p0: "0".into(),
            port_p1: "0".into(),
            port_sink: "0".into(),
            write_tree: false,
            work_dir: ".".into(),
            temp_threshold: 30,
            route_stops: 12,
            log_level: "info".into(),
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_problem() {
        let mut cfg = base_config();
        cfg.problem = "chess".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("unknown problem"));
    }

    #[test]
    fn validate_rejects_zero_threads() {
        let mut cfg = base_config();
        cfg.threads = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_log_level() {
        let mut cfg = base_config();
        cfg.log_level = "loud".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("invalid log level"));
    }

    #[test]
    fn validate_requires_priors_for_expansion_only_search() {
        let mut cfg = base_config();
        cfg.rollout_iter = 0;
        assert!(cfg.validate().is_err());

        cfg.port_p0 = "127.0.0.1:5555".into();
        cfg.port_p1 = "127.0.0.1:5556".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_bounds_route_size() {
        let mut cfg = base_config();
        cfg.problem = "route".into();
        cfg.route_stops = 1;
        assert!(cfg.validate().is_err());
        cfg.route_stops = 65;
        assert!(cfg.validate().is_err());
        cfg.route_stops = 16;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn search_config_carries_flags() {
        let mut cfg = base_config();
        cfg.rollout_iter = 5;
        cfg.threads = 4;
        let search = cfg.search_config();
        assert_eq!(search.rollout_iter, 5);
        assert_eq!(search.num_threads, 4);
    }

    #[test]
    fn fixed_seed_is_stable() {
        let cfg = base_config();
        assert_eq!(cfg.seed_value(), 1);
        assert_eq!(cfg.seed_value(), 1);
    }
}
