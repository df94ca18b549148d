//! Session state machine over the grid engine.
//!
//! A [`GameSession`] owns the grid, the running score, the best score and the
//! RNG used for spawns. Every transition takes `&mut self`, so two moves can
//! never be applied to the same session at once. Persisting the best score is
//! left to the caller (see [`crate::store`]).
//!
//! ```
//! use cover_2048::engine::Direction;
//! use cover_2048::session::{GameSession, SessionConfig, Status};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut session = GameSession::new(SessionConfig::default(), 0, StdRng::seed_from_u64(7));
//! assert_eq!(session.grid().tile_count(), 2);
//! let turn = session.play(Direction::Left);
//! assert!(turn.status == Status::Playing || turn.status == Status::GameOver);
//! ```

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::{self, Direction, Grid, GridError, Score, Tile, DEFAULT_SIZE, DEFAULT_TARGET};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Playing,
    Won,
    GameOver,
}

/// Board size and winning tile for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub size: usize,
    pub target: Tile,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { size: DEFAULT_SIZE, target: DEFAULT_TARGET }
    }
}

/// What one `play` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    pub moved: bool,
    pub score_delta: Score,
    pub status: Status,
}

/// Serializable view of a session for renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub grid: Grid,
    pub score: Score,
    pub best_score: Score,
    pub status: Status,
    pub won: bool,
    pub game_over: bool,
    pub keep_playing: bool,
    pub moves: u32,
}

pub struct GameSession<R: Rng> {
    config: SessionConfig,
    grid: Grid,
    score: Score,
    best_score: Score,
    status: Status,
    keep_playing: bool,
    moves: u32,
    rng: R,
}

impl<R: Rng> GameSession<R> {
    /// Start a fresh game. `best_score` is whatever the caller loaded from storage.
    pub fn new(config: SessionConfig, best_score: Score, mut rng: R) -> Self {
        let grid = engine::initialize(config.size, &mut rng);
        let mut session = Self {
            config,
            grid,
            score: 0,
            best_score,
            status: Status::Playing,
            keep_playing: false,
            moves: 0,
            rng,
        };
        session.status = session.evaluate();
        info!("new game: size={} target={} best={}", config.size, config.target, best_score);
        session
    }

    /// Rebuild a session from persisted state. The grid must match `config.size`.
    pub fn resume(
        config: SessionConfig,
        grid: Grid,
        score: Score,
        best_score: Score,
        keep_playing: bool,
        moves: u32,
        rng: R,
    ) -> Result<Self, GridError> {
        if grid.size() != config.size {
            return Err(GridError::CellCount {
                size: config.size,
                expected: config.size * config.size,
                len: grid.cells().len(),
            });
        }
        let mut session = Self {
            config,
            grid,
            score,
            best_score: best_score.max(score),
            status: Status::Playing,
            keep_playing,
            moves,
            rng,
        };
        session.status = session.evaluate();
        Ok(session)
    }

    /// Apply one move request.
    ///
    /// Ignored while the game is over, or while won and not yet continued.
    pub fn play(&mut self, direction: Direction) -> Turn {
        if !self.accepts_moves() {
            debug!("ignoring {} in state {:?}", direction, self.status);
            return Turn { moved: false, score_delta: 0, status: self.status };
        }
        let outcome = engine::apply_move(&self.grid, direction);
        if !outcome.moved {
            debug!("{} did not change the grid", direction);
            return Turn { moved: false, score_delta: 0, status: self.status };
        }
        self.grid = engine::spawn_random_tile(&outcome.grid, &mut self.rng);
        self.score += outcome.score_delta;
        self.best_score = self.best_score.max(self.score);
        self.moves += 1;
        self.status = self.evaluate();
        debug!("{} scored {} (score={}, status={:?})", direction, outcome.score_delta, self.score, self.status);
        match self.status {
            Status::Won => info!("reached {} after {} moves, score {}", self.config.target, self.moves, self.score),
            Status::GameOver => info!("game over after {} moves, score {}", self.moves, self.score),
            Status::Playing => {}
        }
        Turn { moved: true, score_delta: outcome.score_delta, status: self.status }
    }

    /// Dismiss the win and continue. Win checks stay off for the rest of this game.
    /// Returns `false` when the session was not in the `Won` state.
    pub fn keep_playing(&mut self) -> bool {
        if self.status != Status::Won {
            return false;
        }
        self.keep_playing = true;
        self.status = self.evaluate();
        true
    }

    /// Throw away the current board and start over. The best score survives.
    pub fn new_game(&mut self) {
        self.grid = engine::initialize(self.config.size, &mut self.rng);
        self.score = 0;
        self.keep_playing = false;
        self.moves = 0;
        self.status = self.evaluate();
        info!("new game: size={} target={} best={}", self.config.size, self.config.target, self.best_score);
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn score(&self) -> Score {
        self.score
    }

    #[inline]
    pub fn best_score(&self) -> Score {
        self.best_score
    }

    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }

    #[inline]
    pub fn is_keep_playing(&self) -> bool {
        self.keep_playing
    }

    #[inline]
    pub fn moves(&self) -> u32 {
        self.moves
    }

    #[inline]
    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            grid: self.grid.clone(),
            score: self.score,
            best_score: self.best_score,
            status: self.status,
            won: self.status == Status::Won,
            game_over: self.status == Status::GameOver,
            keep_playing: self.keep_playing,
            moves: self.moves,
        }
    }

    fn accepts_moves(&self) -> bool {
        match self.status {
            Status::Playing => true,
            Status::Won => self.keep_playing,
            Status::GameOver => false,
        }
    }

    // Win takes precedence over game over; `keep_playing` re-evaluates.
    fn evaluate(&self) -> Status {
        if !self.keep_playing && engine::has_reached_target(&self.grid, self.config.target) {
            Status::Won
        } else if !engine::has_any_legal_move(&self.grid) {
            Status::GameOver
        } else {
            Status::Playing
        }
    }
}
