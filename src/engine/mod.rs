//! Engine module: the 4x4 grid, slide/merge, tile spawning and
//! game-over detection. Everything here is a pure function over
//! [`Grid`] values; the only randomness comes from the caller's RNG.
//!
//! - `Grid` is the value type with ergonomic methods.
//! - Free functions mirror the methods when convenient (e.g., `slide`).

mod grid;
mod ops;

pub use grid::{Direction, Grid, GridError, MoveResult, MAX_EXPONENT, MAX_TILE, SIZE};

pub use ops::{
    apply_move, has_legal_move, insert_random_tile, is_terminal, make_move, merge_line, new_game,
    slide, with_random_tile,
};
