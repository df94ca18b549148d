//! Keyboard tokens and swipe gestures to move directions.

use crate::engine::Direction;

/// Minimum travel, in pixels, along the dominant axis for a swipe to count.
pub const SWIPE_THRESHOLD_PX: f64 = 30.0;

/// Map a key token (DOM `KeyboardEvent.key` names, WASD, vi keys, or the
/// direction words) to a direction.
///
/// ```
/// use cover_2048::engine::Direction;
/// use cover_2048::input::direction_for_key;
/// assert_eq!(direction_for_key("ArrowUp"), Some(Direction::Up));
/// assert_eq!(direction_for_key("D"), Some(Direction::Right));
/// assert_eq!(direction_for_key("Enter"), None);
/// ```
pub fn direction_for_key(key: &str) -> Option<Direction> {
    match key {
        "ArrowUp" | "Up" => return Some(Direction::Up),
        "ArrowDown" | "Down" => return Some(Direction::Down),
        "ArrowLeft" | "Left" => return Some(Direction::Left),
        "ArrowRight" | "Right" => return Some(Direction::Right),
        _ => {}
    }
    match key.to_ascii_lowercase().as_str() {
        "w" | "k" | "up" => Some(Direction::Up),
        "s" | "j" | "down" => Some(Direction::Down),
        "a" | "h" | "left" => Some(Direction::Left),
        "d" | "l" | "right" => Some(Direction::Right),
        _ => None,
    }
}

/// Resolve a swipe from its displacement in screen coordinates (positive `dy`
/// points down). The larger axis decides; travel under `threshold` on that
/// axis is not a swipe.
pub fn direction_for_swipe(dx: f64, dy: f64, threshold: f64) -> Option<Direction> {
    if !dx.is_finite() || !dy.is_finite() {
        return None;
    }
    let (ax, ay) = (dx.abs(), dy.abs());
    if ax.max(ay) < threshold || ax == ay {
        return None;
    }
    if ax > ay {
        Some(if dx > 0.0 { Direction::Right } else { Direction::Left })
    } else {
        Some(if dy > 0.0 { Direction::Down } else { Direction::Up })
    }
}

/// Tracks one touch from start to end.
#[derive(Debug, Clone, Copy)]
pub struct SwipeTracker {
    threshold: f64,
    start: Option<(f64, f64)>,
}

impl Default for SwipeTracker {
    fn default() -> Self {
        Self::new(SWIPE_THRESHOLD_PX)
    }
}

impl SwipeTracker {
    pub fn new(threshold: f64) -> Self {
        Self { threshold, start: None }
    }

    pub fn begin(&mut self, x: f64, y: f64) {
        self.start = Some((x, y));
    }

    /// Finish the touch; `None` if no touch was started or it was too short.
    pub fn end(&mut self, x: f64, y: f64) -> Option<Direction> {
        let (sx, sy) = self.start.take()?;
        direction_for_swipe(x - sx, y - sy, self.threshold)
    }

    pub fn cancel(&mut self) {
        self.start = None;
    }
}
