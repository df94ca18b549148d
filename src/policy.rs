//! One-ply move chooser used for automatic play and benchmarks.
//!
//! Ranks every direction that changes the grid by the score it earns, then by
//! how many cells it leaves empty. Deterministic; randomness only enters
//! through the spawns a session applies afterwards.
//!
//! ```
//! use cover_2048::engine::{Direction, Grid};
//! use cover_2048::policy::Greedy;
//! let g = Grid::from_rows(vec![vec![2, 2], vec![0, 0]]).unwrap();
//! assert_eq!(Greedy::new().best_move(&g), Some(Direction::Left));
//! ```

use crate::engine::{apply_move, Direction, Grid};

#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyStats {
    /// Directions evaluated by the last call.
    pub evaluated: u32,
    /// Calls that found no moving direction.
    pub stuck: u64,
}

#[derive(Debug, Default)]
pub struct Greedy {
    stats: PolicyStats,
}

impl Greedy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Best moving direction, or `None` when no direction changes the grid.
    /// Ties go to the earlier entry of [`Direction::ALL`].
    pub fn best_move(&mut self, grid: &Grid) -> Option<Direction> {
        let mut best: Option<(Direction, (u64, usize))> = None;
        self.stats.evaluated = 0;
        for dir in Direction::ALL {
            let outcome = apply_move(grid, dir);
            self.stats.evaluated += 1;
            if !outcome.moved {
                continue;
            }
            let key = (outcome.score_delta, outcome.grid.count_empty());
            if best.map_or(true, |(_, k)| key > k) {
                best = Some((dir, key));
            }
        }
        if best.is_none() {
            self.stats.stuck += 1;
        }
        best.map(|(dir, _)| dir)
    }

    #[inline]
    pub fn last_stats(&self) -> PolicyStats {
        self.stats
    }
}
