//! Binary trace of a played game.
//!
//! Layout (little-endian): magic `C2T1`, version, endianness flag, grid size
//! (u8), steps (u32), start time (u64 unix seconds), elapsed seconds (f32),
//! final score (u64), highest tile (u32), label length (u16), label bytes,
//! `steps + 1` grids of `size * size` tile exponents (0 = empty), `steps`
//! direction codes, then a CRC32C of everything before it.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::engine::{self, Direction, Grid, Score, Tile};

const MAGIC: &[u8; 4] = b"C2T1";
const VERSION: u8 = 1;
const ENDIAN_LE: u8 = 0;
const HEADER_LEN: usize = 4 + 1 + 1 + 1 + 4 + 8 + 4 + 8 + 4 + 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub steps: u32,
    pub start_unix_s: u64,
    pub elapsed_s: f32,
    pub final_score: Score,
    pub highest_tile: Tile,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub meta: Meta,
    pub size: usize,
    pub states: Vec<Grid>,      // length = steps + 1
    pub moves: Vec<Direction>,  // length = steps
}

impl Run {
    pub fn final_grid(&self) -> Option<&Grid> {
        self.states.last()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid magic or version")]
    MagicOrVersion,
    #[error("unsupported endianness")]
    Endianness,
    #[error("file too short or malformed")]
    Malformed,
    #[error("checksum mismatch")]
    Checksum,
    #[error("inconsistent run: {0}")]
    Inconsistent(String),
}

#[inline]
fn read_u16_le(bytes: &[u8]) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(..2)?.try_into().ok()?))
}

#[inline]
fn read_u32_le(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(..4)?.try_into().ok()?))
}

#[inline]
fn read_u64_le(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_le_bytes(bytes.get(..8)?.try_into().ok()?))
}

#[inline]
fn read_f32_le(bytes: &[u8]) -> Option<f32> {
    read_u32_le(bytes).map(f32::from_bits)
}

#[inline]
fn tile_exponent(tile: Tile) -> u8 {
    if tile == 0 { 0 } else { tile.trailing_zeros() as u8 }
}

pub fn encode_run(meta: &Meta, states: &[Grid], moves: &[Direction]) -> Result<Vec<u8>, TraceError> {
    if states.len() != meta.steps as usize + 1 || moves.len() != meta.steps as usize {
        return Err(TraceError::Inconsistent(format!(
            "{} steps but {} states and {} moves",
            meta.steps,
            states.len(),
            moves.len()
        )));
    }
    let size = states[0].size();
    if states.iter().any(|g| g.size() != size) {
        return Err(TraceError::Inconsistent("grids of different sizes".into()));
    }
    let size_byte: u8 = size
        .try_into()
        .map_err(|_| TraceError::Inconsistent(format!("grid size {} does not fit in a byte", size)))?;
    let label_bytes = meta.label.as_deref().map(str::as_bytes).unwrap_or(&[]);
    let label_len: u16 = label_bytes
        .len()
        .try_into()
        .map_err(|_| TraceError::Inconsistent("label too long".into()))?;

    let cells = size * size;
    let mut buf = Vec::with_capacity(HEADER_LEN + label_bytes.len() + states.len() * cells + moves.len() + 4);

    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.push(ENDIAN_LE);
    buf.push(size_byte);
    buf.extend_from_slice(&meta.steps.to_le_bytes());
    buf.extend_from_slice(&meta.start_unix_s.to_le_bytes());
    buf.extend_from_slice(&meta.elapsed_s.to_bits().to_le_bytes());
    buf.extend_from_slice(&meta.final_score.to_le_bytes());
    buf.extend_from_slice(&meta.highest_tile.to_le_bytes());
    buf.extend_from_slice(&label_len.to_le_bytes());
    buf.extend_from_slice(label_bytes);

    for grid in states {
        buf.extend(grid.cells().iter().map(|&t| tile_exponent(t)));
    }
    buf.extend(moves.iter().map(|d| d.code()));

    let checksum = crc32c::crc32c(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

pub fn write_run_to_path<P: AsRef<Path>>(path: P, run: &Run) -> Result<(), TraceError> {
    let data = encode_run(&run.meta, &run.states, &run.moves)?;
    let mut f = fs::File::create(path)?;
    f.write_all(&data)?;
    Ok(())
}

pub fn parse_run_bytes(bytes: &[u8]) -> Result<Run, TraceError> {
    if bytes.len() < HEADER_LEN + 4 {
        return Err(TraceError::Malformed);
    }

    // Checksum first so field reads below only see intact data.
    let (content, trailer) = bytes.split_at(bytes.len() - 4);
    let file_crc = read_u32_le(trailer).ok_or(TraceError::Malformed)?;
    if file_crc != crc32c::crc32c(content) {
        return Err(TraceError::Checksum);
    }

    if &content[..4] != MAGIC || content[4] != VERSION {
        return Err(TraceError::MagicOrVersion);
    }
    if content[5] != ENDIAN_LE {
        return Err(TraceError::Endianness);
    }

    let size = content[6] as usize;
    let mut off = 7;
    let steps = read_u32_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 4;
    let start_unix_s = read_u64_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 8;
    let elapsed_s = read_f32_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 4;
    let final_score = read_u64_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 8;
    let highest_tile = read_u32_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 4;
    let label_len = read_u16_le(&content[off..]).ok_or(TraceError::Malformed)? as usize; off += 2;

    let label_bytes = content.get(off..off + label_len).ok_or(TraceError::Malformed)?;
    off += label_len;
    let label = if label_len > 0 {
        Some(String::from_utf8(label_bytes.to_vec()).map_err(|_| TraceError::Malformed)?)
    } else {
        None
    };

    let cells = size * size;
    let states_count = steps as usize + 1;
    let states_len = states_count.checked_mul(cells).ok_or(TraceError::Malformed)?;
    let moves_len = steps as usize;
    if content.len() != off + states_len + moves_len {
        return Err(TraceError::Malformed);
    }

    let mut states = Vec::with_capacity(states_count);
    for i in 0..states_count {
        let raw = &content[off + i * cells..off + (i + 1) * cells];
        let mut tiles = Vec::with_capacity(cells);
        for &e in raw {
            tiles.push(match e {
                0 => 0,
                1..=31 => (1 as Tile) << e,
                _ => return Err(TraceError::Malformed),
            });
        }
        states.push(Grid::from_cells(size, tiles).map_err(|_| TraceError::Malformed)?);
    }
    off += states_len;

    let moves = content[off..off + moves_len]
        .iter()
        .map(|&c| Direction::from_code(c).ok_or(TraceError::Malformed))
        .collect::<Result<Vec<_>, _>>()?;

    let meta = Meta { steps, start_unix_s, elapsed_s, final_score, highest_tile, label };
    Ok(Run { meta, size, states, moves })
}

pub fn parse_run_file<P: AsRef<Path>>(path: P) -> Result<Run, TraceError> {
    let data = fs::read(path)?;
    parse_run_bytes(&data)
}

/// Check that every recorded step is the recorded move followed by exactly
/// one new 2 or 4 in a cell the move left empty.
pub fn verify_run(run: &Run) -> Result<(), TraceError> {
    if run.states.len() != run.moves.len() + 1 {
        return Err(TraceError::Inconsistent("state/move count mismatch".into()));
    }
    for (i, (&dir, pair)) in run.moves.iter().zip(run.states.windows(2)).enumerate() {
        let (before, after) = (&pair[0], &pair[1]);
        let outcome = engine::apply_move(before, dir);
        if !outcome.moved {
            return Err(TraceError::Inconsistent(format!("step {}: {} does not move the grid", i, dir)));
        }
        if after.size() != outcome.grid.size() {
            return Err(TraceError::Inconsistent(format!("step {}: grid size changed", i)));
        }
        let mut spawned = 0;
        for (&shifted, &next) in outcome.grid.cells().iter().zip(after.cells()) {
            if shifted == next {
                continue;
            }
            if shifted != 0 || !(next == 2 || next == 4) {
                return Err(TraceError::Inconsistent(format!("step {}: grid does not follow {}", i, dir)));
            }
            spawned += 1;
        }
        if spawned != 1 {
            return Err(TraceError::Inconsistent(format!("step {}: expected one new tile, found {}", i, spawned)));
        }
    }
    Ok(())
}

/// Collects grids and moves while a game is played.
#[derive(Debug)]
pub struct RunRecorder {
    started: Instant,
    start_unix_s: u64,
    label: Option<String>,
    states: Vec<Grid>,
    moves: Vec<Direction>,
}

impl RunRecorder {
    pub fn new(initial: &Grid, label: Option<String>) -> Self {
        Self {
            started: Instant::now(),
            start_unix_s: now_unix_seconds(),
            label,
            states: vec![initial.clone()],
            moves: Vec::new(),
        }
    }

    /// Record a move that changed the grid, with the grid after the spawn.
    pub fn record(&mut self, direction: Direction, after: &Grid) {
        self.moves.push(direction);
        self.states.push(after.clone());
    }

    pub fn steps(&self) -> usize {
        self.moves.len()
    }

    pub fn finish(self, final_score: Score) -> Run {
        let highest_tile = self.states.iter().map(Grid::highest_tile).max().unwrap_or(0);
        let size = self.states[0].size();
        let meta = Meta {
            steps: self.moves.len() as u32,
            start_unix_s: self.start_unix_s,
            elapsed_s: self.started.elapsed().as_secs_f32(),
            final_score,
            highest_tile,
            label: self.label,
        };
        Run { meta, size, states: self.states, moves: self.moves }
    }
}

pub fn now_unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn grid(rows: &[&[Tile]]) -> Grid {
        Grid::from_rows(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
    }

    fn small_run() -> Run {
        let s0 = grid(&[&[2, 0, 0], &[0, 0, 0], &[0, 0, 2]]);
        let s1 = grid(&[&[2, 0, 0], &[0, 0, 0], &[2, 0, 2]]);
        let s2 = grid(&[&[2, 0, 0], &[0, 0, 0], &[4, 2, 0]]);
        let meta = Meta {
            steps: 2,
            start_unix_s: 1_700_000_000,
            elapsed_s: 1.5,
            final_score: 4,
            highest_tile: 4,
            label: Some("greedy".to_string()),
        };
        Run { meta, size: 3, states: vec![s0, s1, s2], moves: vec![Direction::Down, Direction::Left] }
    }

    #[test]
    fn file_round_trip() {
        let run = small_run();
        let tmp = NamedTempFile::new().unwrap();
        write_run_to_path(tmp.path(), &run).unwrap();
        let back = parse_run_file(tmp.path()).unwrap();
        assert_eq!(back, run);
    }

    #[test]
    fn checksum_mismatch() {
        let run = small_run();
        let mut bytes = encode_run(&run.meta, &run.states, &run.moves).unwrap();
        bytes[HEADER_LEN + 1] ^= 0xFF;
        assert!(matches!(parse_run_bytes(&bytes), Err(TraceError::Checksum)));
    }

    #[test]
    fn truncated_is_rejected() {
        let run = small_run();
        let mut bytes = encode_run(&run.meta, &run.states, &run.moves).unwrap();
        bytes.truncate(bytes.len() - 5);
        assert!(parse_run_bytes(&bytes).is_err());
        assert!(matches!(parse_run_bytes(&bytes[..10]), Err(TraceError::Malformed)));
    }

    #[test]
    fn largest_tiles_round_trip() {
        let big = engine::MAX_TILE / 2;
        let s0 = grid(&[&[big, big], &[big, big]]);
        let s1 = grid(&[&[engine::MAX_TILE, 2], &[engine::MAX_TILE, 0]]);
        let mut rec = RunRecorder::new(&s0, None);
        rec.record(Direction::Left, &s1);
        let run = rec.finish(2 * engine::MAX_TILE as Score);
        let bytes = encode_run(&run.meta, &run.states, &run.moves).unwrap();
        let back = parse_run_bytes(&bytes).unwrap();
        assert_eq!(back.states, run.states);
        verify_run(&back).unwrap();
    }

    #[test]
    fn non_utf8_label_is_rejected() {
        let run = small_run();
        let mut bytes = encode_run(&run.meta, &run.states, &run.moves).unwrap();
        bytes[HEADER_LEN] = 0xFF;
        let body = bytes.len() - 4;
        let crc = crc32c::crc32c(&bytes[..body]);
        bytes[body..].copy_from_slice(&crc.to_le_bytes());
        assert!(matches!(parse_run_bytes(&bytes), Err(TraceError::Malformed)));
    }

    #[test]
    fn encode_checks_lengths() {
        let mut run = small_run();
        run.meta.steps = 3;
        assert!(matches!(encode_run(&run.meta, &run.states, &run.moves), Err(TraceError::Inconsistent(_))));
    }

    #[test]
    fn verify_accepts_legal_run() {
        verify_run(&small_run()).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_step() {
        let mut run = small_run();
        run.states[2] = grid(&[&[4, 0, 0], &[0, 0, 0], &[4, 8, 0]]);
        assert!(matches!(verify_run(&run), Err(TraceError::Inconsistent(_))));
        let mut run = small_run();
        run.moves[0] = Direction::Up;
        assert!(verify_run(&run).is_err());
    }

    #[test]
    fn recorder_collects_steps() {
        let s0 = grid(&[&[2, 0], &[0, 0]]);
        let mut rec = RunRecorder::new(&s0, None);
        let s1 = grid(&[&[0, 2], &[2, 0]]);
        rec.record(Direction::Right, &s1);
        assert_eq!(rec.steps(), 1);
        let run = rec.finish(0);
        assert_eq!(run.meta.steps, 1);
        assert_eq!(run.meta.highest_tile, 2);
        assert_eq!(run.size, 2);
        verify_run(&run).unwrap();
    }
}
