//! Game loops: drive one full game with a search engine per player.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use eval_client::SampleSink;
use mcts::{DynamicTree, Mcts, TreeStore};
use problem_core::Problem;
use problems_connect4::Connect4;
use problems_route::Route;
use tracing::info;

use crate::config::Config;

/// Play one game to the end. One engine (and one tree) per searching
/// player; players with a zero iteration budget read their moves from
/// stdin. Returns the final state and the played history.
fn run_game<P, F>(
    mut state: P,
    config: &Config,
    seed: u64,
    iterations: &[u32],
    on_move: F,
) -> Result<(P, Vec<P::Action>)>
where
    P: Problem,
    F: Fn(&P),
{
    let mut engines: Vec<Mcts<P, DynamicTree<P::Action>>> = (0..iterations.len())
        .map(|player| {
            Mcts::new(config.search_config(), seed.wrapping_add(player as u64))
                .with_sink(SampleSink::new(config.port_sink.clone()))
        })
        .collect();

    let mut history: Vec<P::Action> = Vec::new();
    while !state.is_finished() {
        let player = state.current_player();
        let started = Instant::now();
        let action = if iterations[player] == 0 {
            prompt_action(&state, player)?
        } else {
            engines[player].execute_parallel(
                player,
                config.deterministic,
                &state,
                iterations[player],
                &history,
            )?
        };

        info!(
            time = history.len(),
            player,
            action = %P::action_to_string(&action),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "move played"
        );

        state.apply(action);
        history.push(action);
        on_move(&state);
    }

    if config.write_tree {
        for (player, engine) in engines.iter().enumerate() {
            if iterations[player] == 0 {
                continue;
            }
            write_tree_files(
                engine.tree(),
                &state,
                player,
                config,
                seed,
                iterations[player],
                &history,
            )?;
        }
    }

    Ok((state, history))
}

/// Read a move from stdin until it parses and is legal.
fn prompt_action<P: Problem>(state: &P, player: usize) -> Result<P::Action> {
    let legal = state.legal_actions(player);
    let stdin = io::stdin();
    loop {
        print!("Player{}: ", player);
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            anyhow::bail!("stdin closed while waiting for player {}", player);
        }
        match P::action_from_string(line.trim()) {
            Some(action) if legal.contains(&action) => return Ok(action),
            _ => println!("invalid move: {}", line.trim()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn write_tree_files<P, T>(
    tree: &T,
    state: &P,
    player: usize,
    config: &Config,
    seed: u64,
    iterations: u32,
    history: &[P::Action],
) -> Result<()>
where
    P: Problem,
    T: TreeStore<P::Action>,
{
    let max_iter = f64::from(iterations * config.rollout_iter.max(1));
    let mut buffer = Vec::new();
    mcts::write_results(tree, state, player, max_iter, history, &mut buffer)?;
    let text = String::from_utf8(buffer).context("result rows are not utf-8")?;

    let dir = PathBuf::from(&config.work_dir);
    let full = dir.join(format!("seed_{}_player_{}.csv", seed, player));
    fs::write(&full, &text).with_context(|| format!("writing {}", full.display()))?;

    let filtered = dir.join(format!("seed_{}_player_{}_filtered.csv", seed, player));
    fs::write(&filtered, mcts::filter_first_level(&text))
        .with_context(|| format!("writing {}", filtered.display()))?;

    info!(player, path = %full.display(), "search tree written");
    Ok(())
}

pub fn run_connect4(config: &Config) -> Result<()> {
    let seed = config.seed_value();
    info!(
        seed,
        port_p0 = %config.port_p0,
        port_p1 = %config.port_p1,
        deterministic = config.deterministic,
        "starting connect4"
    );

    let state = Connect4::new(config.port_p0.clone(), config.port_p1.clone());
    let iterations = [config.iterations_p0, config.iterations_p1];
    let (state, history) = run_game(state, config, seed, &iterations, |s: &Connect4| {
        println!("{}", s.board_description());
    })?;

    info!(half_moves = history.len(), "game over");
    println!("{}", state.end_of_game_string());
    Ok(())
}

pub fn run_route(config: &Config) -> Result<()> {
    let seed = config.seed_value();
    info!(seed, stops = config.route_stops, "starting route");

    let state = Route::random(config.route_stops, seed);
    let iterations = [config.iterations_p0];
    let (state, history) = run_game(state, config, seed, &iterations, |_: &Route| {})?;

    let tour: Vec<String> = state.tour().iter().map(Route::action_to_string).collect();
    info!(
        stops = history.len() + 1,
        length = state.tour_length(),
        tour = %tour.join(" "),
        "route complete"
    );
    Ok(())
}
