//! Flat CSV dump of the search tree for offline analysis.
//!
//! The writer walks the game history from the permanent root. At every
//! step the child matching the historical action becomes a *selected* row;
//! its siblings are dumped recursively as *branch* rows with increasing
//! branch depth. A second pass keeps only depth-zero rows for compact
//! viewing.

use std::io::{self, Write};

use problem_core::Problem;

use crate::store::TreeStore;

/// Header of the result file. Semicolon separated, one row per node.
pub const RESULT_HEADER: &str = "Branch;ID;ParentID;Time;Actions;Opponent;Select;Visit;Win";

/// Write the tree rows along `history` into `out`.
///
/// `max_iter` is the iteration budget of one decision (policy iterations
/// times rollouts); `Visit` is each node's share of it. `Win` is the mean
/// value `W / N`.
pub fn write_results<P, T, W>(
    tree: &T,
    state: &P,
    searcher: usize,
    max_iter: f64,
    history: &[P::Action],
    out: &mut W,
) -> io::Result<()>
where
    P: Problem,
    T: TreeStore<P::Action>,
    W: Write,
{
    writeln!(out, "{}", RESULT_HEADER)?;
    writeln!(out, "0;0;0;0;ROOT;0;0;0;0")?;

    let mut parent = tree.root();
    for (time, action) in history.iter().enumerate() {
        let opponent = usize::from(state.player_at(time) != searcher);

        let mut selected = None;
        for next in tree.children(&parent) {
            if tree.action(&next) == *action {
                write_row::<P, T, W>(tree, 0, &parent, &next, time, max_iter, opponent, true, out)?;
                selected = Some(next);
            } else {
                write_branch::<P, T, W>(tree, 0, &parent, &next, time, max_iter, opponent, out)?;
            }
        }

        match selected {
            Some(child) => parent = child,
            // The tree was never caught up past this point.
            None => break,
        }
    }
    Ok(())
}

fn write_branch<P, T, W>(
    tree: &T,
    branch: u32,
    parent: &T::Ref,
    next: &T::Ref,
    time: usize,
    max_iter: f64,
    opponent: usize,
    out: &mut W,
) -> io::Result<()>
where
    P: Problem,
    T: TreeStore<P::Action>,
    W: Write,
{
    write_row::<P, T, W>(tree, branch, parent, next, time, max_iter, opponent, false, out)?;
    for child in tree.children(next) {
        write_branch::<P, T, W>(tree, branch + 1, next, &child, time, max_iter, opponent, out)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_row<P, T, W>(
    tree: &T,
    branch: u32,
    parent: &T::Ref,
    node: &T::Ref,
    time: usize,
    max_iter: f64,
    opponent: usize,
    selected: bool,
    out: &mut W,
) -> io::Result<()>
where
    P: Problem,
    T: TreeStore<P::Action>,
    W: Write,
{
    let visits = tree.visits(node);
    let win = if visits == 0 {
        0.0
    } else {
        tree.value_sum(node) / f64::from(visits)
    };
    writeln!(
        out,
        "{};{};{};{};{};{};{};{};{}",
        branch,
        tree.node_id(node),
        tree.node_id(parent),
        time,
        P::action_to_string(&tree.action(node)),
        opponent,
        u8::from(selected),
        f64::from(visits) / max_iter,
        win,
    )
}

/// Keep the header and the rows whose branch depth is zero: the selected
/// line of play plus its immediate alternatives.
pub fn filter_first_level(results: &str) -> String {
    let mut out = String::new();
    for (i, line) in results.lines().enumerate() {
        if i == 0 || line.starts_with("0;") {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ArrayTree;
    use problems_tictactoe::{Cell, TicTacToe};

    fn sample_tree() -> ArrayTree<Cell, 9> {
        let tree = ArrayTree::<Cell, 9>::new(Cell::default());
        let root = tree.root();

        // Played line: cell 4. Alternative: cell 0 with one reply below it.
        let picked = tree.add_child(&root, Cell(4));
        let branch = tree.add_child(&root, Cell(0));
        let reply = tree.add_child(&branch, Cell(1));

        for _ in 0..8 {
            tree.record_visit(&picked, 0.5);
        }
        tree.record_visit(&branch, -1.0);
        tree.record_visit(&reply, -1.0);
        tree
    }

    #[test]
    fn rows_tag_selection_and_branches() {
        let tree = sample_tree();
        let state = TicTacToe::new();
        let mut out = Vec::new();

        write_results(&tree, &state, 0, 10.0, &[Cell(4)], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], RESULT_HEADER);
        assert_eq!(lines[1], "0;0;0;0;ROOT;0;0;0;0");
        // Selected node: id 1, parent 0, 8 of 10 visits, mean 0.5.
        assert_eq!(lines[2], "0;1;0;0;4;0;1;0.8;0.5");
        // First-level branch and its reply one level deeper.
        assert_eq!(lines[3], "0;2;0;0;0;0;0;0.1;-1");
        assert_eq!(lines[4], "1;3;2;0;1;0;0;0.1;-1");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn opponent_turns_are_tagged() {
        let tree = sample_tree();
        let state = TicTacToe::new();
        let mut out = Vec::new();

        // Searching as player 1: the first half-move belongs to player 0.
        write_results(&tree, &state, 1, 10.0, &[Cell(4)], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let selected = text.lines().nth(2).unwrap();
        let fields: Vec<&str> = selected.split(';').collect();
        assert_eq!(fields[5], "1");
    }

    #[test]
    fn filter_keeps_first_level_rows() {
        let tree = sample_tree();
        let state = TicTacToe::new();
        let mut out = Vec::new();
        write_results(&tree, &state, 0, 10.0, &[Cell(4)], &mut out).unwrap();

        let filtered = filter_first_level(&String::from_utf8(out).unwrap());
        let lines: Vec<&str> = filtered.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().skip(1).all(|l| l.starts_with("0;")));
    }

    #[test]
    fn history_beyond_tree_stops_cleanly() {
        let tree = sample_tree();
        let state = TicTacToe::new();
        let mut out = Vec::new();

        // Second historical action was never attached to the tree.
        write_results(&tree, &state, 0, 10.0, &[Cell(4), Cell(8)], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 5);
    }
}
