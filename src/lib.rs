//! grid-2048: a 2048 game engine
//!
//! This crate provides:
//! - A value-type `Grid` with ergonomic methods (`slide`, `make_move`, `is_terminal`, ...)
//! - A `Session` that tracks score and the in-memory high score across restarts
//! - A binary trace format for recorded games (`trace` module)
//! - TOML configuration for the `grid-2048` binary (`config` module)
//!
//! Quick start:
//! ```
//! use grid_2048::engine::{self as GameEngine, Direction, Grid};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic start with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let g0 = GameEngine::new_game(&mut rng);
//! let r = g0.make_move(Direction::Left, &mut rng);
//! if r.moved {
//!     assert_eq!(r.grid.count_empty(), g0.slide(Direction::Left).grid.count_empty() - 1);
//! }
//! assert!(!GameEngine::is_terminal(r.grid));
//! ```
//!
//! Note: there are also free functions mirroring the `Grid` methods
//! (e.g., `engine::slide`, `engine::make_move`) that use thread-local RNG where relevant.
//! Prefer the RNG-taking variants when you need determinism.
//!
//! Full loop
//! ```
//! use grid_2048::engine::Direction;
//! use grid_2048::session::Session;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut game = Session::new(StdRng::seed_from_u64(123));
//! let mut turn = 0;
//! while !game.is_over() && turn < 8 {
//!     game.play(Direction::ALL[turn % 4]);
//!     turn += 1;
//! }
//! assert!(game.high_score() >= game.score());
//! ```
//!
pub mod config;
pub mod engine;
pub mod session;
pub mod trace;
