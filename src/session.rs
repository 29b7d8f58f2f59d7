//! Mutable game state for a front end: the current grid, running score and
//! the in-memory high score. The engine stays pure; this is the one place a
//! grid gets replaced after each accepted move.

use log::{debug, info};
use rand::Rng;

use crate::engine::{self, Direction, Grid};

/// What happened when a direction was played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub moved: bool,
    pub score_gained: u64,
    pub game_over: bool,
}

impl Outcome {
    /// True only for the move that turned the grid terminal. Later
    /// directions on a finished game report `game_over` without it.
    #[inline]
    pub fn ended(&self) -> bool {
        self.moved && self.game_over
    }
}

/// A single player's game: grid, score, high score and the RNG that feeds
/// tile spawns.
pub struct Session<R: Rng> {
    grid: Grid,
    score: u64,
    high_score: u64,
    moves: u64,
    rng: R,
}

impl<R: Rng> Session<R> {
    /// Start a fresh game seeded with two random tiles.
    pub fn new(mut rng: R) -> Self {
        let grid = engine::new_game(&mut rng);
        Session { grid, score: 0, high_score: 0, moves: 0, rng }
    }

    /// Resume from a known grid (score starts at zero).
    pub fn from_grid(grid: Grid, rng: R) -> Self {
        Session { grid, score: 0, high_score: 0, moves: 0, rng }
    }

    /// Throw away the current game and deal a new one. The high score survives.
    pub fn restart(&mut self) {
        self.grid = engine::new_game(&mut self.rng);
        self.score = 0;
        self.moves = 0;
        debug!("restart: high score {}", self.high_score);
    }

    /// Play one direction. A slide that changes nothing is not a move: no
    /// tile spawns and the counters stay put.
    pub fn play(&mut self, direction: Direction) -> Outcome {
        if self.grid.is_terminal() {
            return Outcome { moved: false, score_gained: 0, game_over: true };
        }
        let result = self.grid.make_move(direction, &mut self.rng);
        if !result.moved {
            debug!("{direction}: no change");
            return Outcome { moved: false, score_gained: 0, game_over: false };
        }

        self.grid = result.grid;
        self.score += result.score_gained;
        self.high_score = self.high_score.max(self.score);
        self.moves += 1;
        debug!("{direction}: +{} (score {})", result.score_gained, self.score);

        let game_over = self.grid.is_terminal();
        if game_over {
            info!(
                "game over after {} moves: score {}, highest tile {}",
                self.moves,
                self.score,
                self.grid.highest_tile()
            );
        }
        Outcome { moved: true, score_gained: result.score_gained, game_over }
    }

    #[inline]
    pub fn grid(&self) -> Grid {
        self.grid
    }

    #[inline]
    pub fn score(&self) -> u64 {
        self.score
    }

    #[inline]
    pub fn high_score(&self) -> u64 {
        self.high_score
    }

    /// Accepted moves since the last (re)start.
    #[inline]
    pub fn moves(&self) -> u64 {
        self.moves
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.grid.is_terminal()
    }
}
