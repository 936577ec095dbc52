//! Tic-tac-toe adapter for the search engine.
//!
//! Small enough to search exhaustively, which makes it the reference
//! problem for engine tests and benches. Player 0 is X and moves first;
//! values are signed from the searching player's perspective.

use problem_core::{ActionVec, Problem};

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Board cell index 0..9, row-major from the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Cell(pub u8);

/// Game state. Cells hold 0 for empty, otherwise player + 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicTacToe {
    board: [u8; 9],
    time: usize,
    winner: Option<usize>,
}

impl TicTacToe {
    pub fn new() -> Self {
        Self {
            board: [0; 9],
            time: 0,
            winner: None,
        }
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    fn board_full(&self) -> bool {
        self.board.iter().all(|&c| c != 0)
    }
}

impl Default for TicTacToe {
    fn default() -> Self {
        Self::new()
    }
}

impl Problem for TicTacToe {
    type Action = Cell;

    const UCT_C: f64 = 1.0;
    const DIRICHLET_ALPHA: f64 = 0.3;
    const MAX_ACTIONS: usize = 9;
    const MAX_CHILDREN: usize = 9;

    fn is_finished(&self) -> bool {
        self.winner.is_some() || self.board_full()
    }

    fn current_player(&self) -> usize {
        self.time % 2
    }

    fn player_at(&self, time: usize) -> usize {
        time % 2
    }

    fn legal_actions(&self, _for_player: usize) -> ActionVec<Cell> {
        if self.winner.is_some() {
            return ActionVec::new();
        }
        self.board
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == 0)
            .map(|(i, _)| Cell(i as u8))
            .collect()
    }

    fn apply(&mut self, action: Cell) {
        let mark = self.current_player() as u8 + 1;
        self.board[action.0 as usize] = mark;
        self.time += 1;

        for line in &LINES {
            if line.iter().all(|&i| self.board[i] == mark) {
                self.winner = Some(usize::from(mark) - 1);
                return;
            }
        }
    }

    fn value(&self, searcher: usize) -> f64 {
        match self.winner {
            Some(winner) if winner == searcher => 1.0,
            Some(_) => -1.0,
            None => 0.0,
        }
    }

    fn state_tensor(&self, searcher: usize) -> Vec<f32> {
        // Three planes: searcher's marks, opponent's marks, side to move.
        let mut tensor = vec![0.0; 27];
        let own = searcher as u8 + 1;
        for (i, &c) in self.board.iter().enumerate() {
            if c == own {
                tensor[i] = 1.0;
            } else if c != 0 {
                tensor[9 + i] = 1.0;
            }
        }
        let to_move = self.current_player() as f32;
        for slot in tensor.iter_mut().skip(18) {
            *slot = to_move;
        }
        tensor
    }

    fn policy_tensor(&self, _searcher: usize, pi: &[(Cell, f64)]) -> Vec<f32> {
        let mut tensor = vec![0.0; 9];
        for (cell, p) in pi {
            tensor[cell.0 as usize] = *p as f32;
        }
        tensor
    }

    fn action_to_string(action: &Cell) -> String {
        action.0.to_string()
    }

    fn action_from_string(s: &str) -> Option<Cell> {
        let cell: u8 = s.trim().parse().ok()?;
        (cell < 9).then_some(Cell(cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_board_has_nine_moves() {
        let state = TicTacToe::new();
        assert!(!state.is_finished());
        assert_eq!(state.current_player(), 0);
        let actions = state.legal_actions(0);
        assert_eq!(actions.len(), 9);
        assert_eq!(actions[0], Cell(0));
        assert_eq!(actions[8], Cell(8));
    }

    #[test]
    fn row_win_finishes_the_game() {
        let mut state = TicTacToe::new();
        for cell in [0u8, 3, 1, 4, 2] {
            state.apply(Cell(cell));
        }
        assert!(state.is_finished());
        assert_eq!(state.winner(), Some(0));
        assert!((state.value(0) - 1.0).abs() < 1e-12);
        assert!((state.value(1) + 1.0).abs() < 1e-12);
        assert!(state.legal_actions(1).is_empty());
    }

    #[test]
    fn full_board_without_winner_is_a_draw() {
        let mut state = TicTacToe::new();
        for cell in [0u8, 1, 2, 4, 3, 5, 7, 6, 8] {
            state.apply(Cell(cell));
        }
        assert!(state.is_finished());
        assert_eq!(state.winner(), None);
        assert!(state.value(0).abs() < 1e-12);
    }

    #[test]
    fn players_alternate() {
        let mut state = TicTacToe::new();
        assert_eq!(state.current_player(), 0);
        state.apply(Cell(4));
        assert_eq!(state.current_player(), 1);
        assert_eq!(state.player_at(0), 0);
        assert_eq!(state.player_at(1), 1);
    }

    #[test]
    fn action_strings_round_trip() {
        for i in 0..9u8 {
            let s = TicTacToe::action_to_string(&Cell(i));
            assert_eq!(TicTacToe::action_from_string(&s), Some(Cell(i)));
        }
        assert_eq!(TicTacToe::action_from_string("9"), None);
        assert_eq!(TicTacToe::action_from_string("x"), None);
    }

    #[test]
    fn tensors_have_fixed_shapes() {
        let mut state = TicTacToe::new();
        state.apply(Cell(4));
        let tensor = state.state_tensor(0);
        assert_eq!(tensor.len(), 27);
        assert!((tensor[4] - 1.0).abs() < 1e-6);

        let policy = state.policy_tensor(0, &[(Cell(2), 0.7), (Cell(5), 0.3)]);
        assert_eq!(policy.len(), 9);
        assert!((policy[2] - 0.7).abs() < 1e-6);
        assert!((policy[5] - 0.3).abs() < 1e-6);
    }
}
