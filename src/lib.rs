//! cover-2048: the 2048 puzzle behind the calculator cover screen.
//!
//! This crate provides:
//! - A dimension-generic `Grid` with pure move/merge/spawn functions (`engine`)
//! - A session state machine with score, best score and win/game-over states (`session`)
//! - Best-score persistence (`store`), key/swipe input mapping (`input`) and TOML config (`config`)
//! - A checksummed binary trace format for played games (`trace`)
//! - A greedy one-ply policy for automatic play (`policy`)
//!
//! Quick start:
//! ```
//! use cover_2048::engine::{self, Direction};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic board initialization with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let g0 = engine::initialize(4, &mut rng);
//! assert_eq!(g0.tile_count(), 2);
//! let out = engine::apply_move(&g0, Direction::Left);
//! let g1 = if out.moved { engine::spawn_random_tile(&out.grid, &mut rng) } else { g0 };
//! assert!(g1.tile_count() >= 2);
//! ```
//!
//! Full loop with a session and the greedy policy
//! ```
//! use cover_2048::policy::Greedy;
//! use cover_2048::session::{GameSession, SessionConfig, Status};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut session = GameSession::new(SessionConfig::default(), 0, StdRng::seed_from_u64(123));
//! let mut policy = Greedy::new();
//! let mut moves = 0u32;
//! while session.status() == Status::Playing && moves < 8 {
//!     match policy.best_move(session.grid()) {
//!         Some(dir) => { session.play(dir); moves += 1; }
//!         None => break,
//!     }
//! }
//! assert!(session.score() <= session.best_score());
//! ```
//!
pub mod config;
pub mod engine;
pub mod input;
pub mod policy;
pub mod session;
pub mod store;
pub mod trace;
#[cfg(feature = "wasm")]
pub mod wasm;
