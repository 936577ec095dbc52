//! Game driver for the tree-search engine.
//!
//! Plays a full game of the chosen problem, one search engine per player,
//! optionally backed by a priors/value service and a self-play sample
//! sink. Exit code 0 on success, 1 on invalid input.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

mod config;
mod game;

use crate::config::Config;

fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

fn main() {
    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(err) => {
            // Help and version requests are not errors.
            if err.use_stderr() {
                eprintln!("{}", err);
                std::process::exit(1);
            }
            err.exit();
        }
    };

    if let Err(err) = config.validate() {
        eprintln!("invalid configuration: {:#}", err);
        std::process::exit(1);
    }

    init_tracing(&config.log_level);

    if let Err(err) = run(&config) {
        error!(error = %format!("{:#}", err), "game failed");
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<()> {
    info!(
        problem = %config.problem,
        iterations_p0 = config.iterations_p0,
        iterations_p1 = config.iterations_p1,
        rollout_iter = config.rollout_iter,
        threads = config.threads,
        "driver starting"
    );

    match config.problem.as_str() {
        "connect4" => game::run_connect4(config),
        "route" => game::run_route(config),
        other => anyhow::bail!("unknown problem '{}'", other),
    }
}
