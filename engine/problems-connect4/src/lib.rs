//! Connect-4 adapter for the search engine.
//!
//! Two players drop discs into a 7-column, 6-row grid; four in a line
//! wins. Player 0 (white) moves first. Actions carry both the column and
//! the landing row so that the policy tensor can address the exact cell.
//!
//! Priors come from a per-player [`PriorsClient`]: the state tensor is a
//! four-frame history of both players' discs plus a colour plane, and the
//! service answers one logit per cell plus a scalar value. With the
//! endpoint disabled the adapter degrades to flat priors and its own
//! terminal scoring, which the engine covers with rollouts.

use eval_client::{softmax_over_legal, PriorsClient};
use problem_core::{ActionVec, Problem, ProblemError};

pub const COLS: usize = 7;
pub const ROWS: usize = 6;
pub const BOARD_SIZE: usize = COLS * ROWS; // 42

/// History frames encoded into the state tensor.
const FRAMES: usize = 4;

/// Floats in the state tensor: both players' frame stacks plus colour.
pub const STATE_TENSOR_LEN: usize = 2 * FRAMES * BOARD_SIZE + BOARD_SIZE;

const EMPTY: u8 = 2;

/// A disc drop: column and the row it lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Disc {
    pub x: u8,
    pub y: u8,
}

/// Game state, including the board history the state tensor needs.
#[derive(Debug, Clone)]
pub struct Connect4 {
    board: [u8; BOARD_SIZE],
    time: usize,
    finished: [bool; 2],
    frames: Vec<[u8; BOARD_SIZE]>,
    priors: [PriorsClient; 2],
}

fn cell(y: usize, x: usize) -> usize {
    y * COLS + x
}

impl Connect4 {
    pub fn new(port_white: impl Into<String>, port_black: impl Into<String>) -> Self {
        Self {
            board: [EMPTY; BOARD_SIZE],
            time: 0,
            finished: [false, false],
            frames: Vec::new(),
            priors: [
                PriorsClient::new(port_white),
                PriorsClient::new(port_black),
            ],
        }
    }

    /// Both players without a priors service.
    pub fn offline() -> Self {
        Self::new(eval_client::DISABLED_ENDPOINT, eval_client::DISABLED_ENDPOINT)
    }

    pub fn end_of_game_string(&self) -> String {
        match self.finished {
            [true, true] => "Even!".to_string(),
            [true, false] => "White Wins!".to_string(),
            [false, true] => "Black Wins!".to_string(),
            [false, false] => "Ongoing".to_string(),
        }
    }

    /// Text rendering of the grid, top row first.
    pub fn board_description(&self) -> String {
        let figures = ['O', 'X', ' '];
        let mut out = String::new();
        for y in (0..ROWS).rev() {
            for x in 0..COLS {
                out.push_str("| ");
                out.push(figures[self.board[cell(y, x)] as usize]);
                out.push(' ');
            }
            out.push_str("|\n");
        }
        out
    }

    fn mark_win_lines(&mut self, player: u8) {
        const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (-1, 1)];
        for y in 0..ROWS as isize {
            for x in 0..COLS as isize {
                if self.board[cell(y as usize, x as usize)] != player {
                    continue;
                }
                for (dx, dy) in DIRECTIONS {
                    let mut count = 1;
                    let (mut cx, mut cy) = (x + dx, y + dy);
                    while cx >= 0
                        && cx < COLS as isize
                        && cy >= 0
                        && cy < ROWS as isize
                        && self.board[cell(cy as usize, cx as usize)] == player
                    {
                        count += 1;
                        cx += dx;
                        cy += dy;
                    }
                    if count >= 4 {
                        self.finished[player as usize] = true;
                        return;
                    }
                }
            }
        }
    }
}

impl Problem for Connect4 {
    type Action = Disc;

    const UCT_C: f64 = 1.0;
    const DIRICHLET_ALPHA: f64 = 1.0 / 7.0;
    const MAX_ACTIONS: usize = BOARD_SIZE;
    const MAX_CHILDREN: usize = COLS;

    fn is_finished(&self) -> bool {
        self.finished[0] || self.finished[1]
    }

    fn current_player(&self) -> usize {
        self.time % 2
    }

    fn player_at(&self, time: usize) -> usize {
        time % 2
    }

    fn legal_actions(&self, _for_player: usize) -> ActionVec<Disc> {
        let mut actions = ActionVec::new();
        if self.is_finished() {
            return actions;
        }
        for x in 0..COLS {
            for y in 0..ROWS {
                if self.board[cell(y, x)] == EMPTY {
                    actions.push(Disc {
                        x: x as u8,
                        y: y as u8,
                    });
                    break;
                }
            }
        }
        actions
    }

    fn apply(&mut self, action: Disc) {
        let player = self.current_player() as u8;
        self.frames.push(self.board);
        self.board[cell(action.y as usize, action.x as usize)] = player;

        self.mark_win_lines(player);

        let board_full = self.board.iter().all(|&c| c != EMPTY);
        if board_full && !self.finished[0] && !self.finished[1] {
            self.finished = [true, true]; // even
        }
        self.time += 1;
    }

    fn wp(&self, searcher: usize, actions: &[Disc]) -> Result<(Vec<f64>, f64), ProblemError> {
        let client = &self.priors[searcher];
        if client.is_disabled() {
            return Ok((vec![1.0; actions.len()], self.value(searcher)));
        }

        let tensor = self.state_tensor(searcher);
        let (logits, value) = client
            .infer(&tensor, BOARD_SIZE)
            .map_err(|e| ProblemError::Transport(e.to_string()))?;

        let indices: Vec<usize> = actions
            .iter()
            .map(|a| cell(a.y as usize, a.x as usize))
            .collect();
        Ok((softmax_over_legal(&logits, &indices), f64::from(value)))
    }

    fn value(&self, searcher: usize) -> f64 {
        match self.finished {
            [true, true] => 0.0,
            [true, false] => {
                if searcher == 0 {
                    1.0
                } else {
                    -1.0
                }
            }
            [false, true] => {
                if searcher == 1 {
                    1.0
                } else {
                    -1.0
                }
            }
            [false, false] => 0.0,
        }
    }

    fn state_tensor(&self, searcher: usize) -> Vec<f32> {
        let mut tensor = vec![0.0; STATE_TENSOR_LEN];
        let own = searcher as u8;
        let opponent = (searcher as u8 + 1) % 2;

        let mut frame = 0;
        let mut board = &self.board;
        while frame < FRAMES {
            for i in 0..BOARD_SIZE {
                if board[i] == own {
                    tensor[frame * BOARD_SIZE + i] = 1.0;
                }
                if board[i] == opponent {
                    tensor[(FRAMES + frame) * BOARD_SIZE + i] = 1.0;
                }
            }
            frame += 1;
            if frame > self.frames.len() {
                break;
            }
            if frame < FRAMES && frame <= self.frames.len() {
                board = &self.frames[self.frames.len() - frame];
            }
        }

        let colour = self.current_player() as f32;
        for slot in tensor.iter_mut().skip(2 * FRAMES * BOARD_SIZE) {
            *slot = colour;
        }
        tensor
    }

    fn policy_tensor(&self, _searcher: usize, pi: &[(Disc, f64)]) -> Vec<f32> {
        let mut tensor = vec![0.0; BOARD_SIZE];
        for (action, p) in pi {
            tensor[cell(action.y as usize, action.x as usize)] = *p as f32;
        }
        tensor
    }

    fn action_to_string(action: &Disc) -> String {
        format!("X{}Y{}", action.x + 1, action.y + 1)
    }

    fn action_from_string(s: &str) -> Option<Disc> {
        let s = s.trim().to_ascii_uppercase();
        let bytes = s.as_bytes();
        if bytes.len() != 4 || bytes[0] != b'X' || bytes[2] != b'Y' {
            return None;
        }
        let x = bytes[1].checked_sub(b'1')?;
        let y = bytes[3].checked_sub(b'1')?;
        ((x as usize) < COLS && (y as usize) < ROWS).then_some(Disc { x, y })
    }
}
