//! Binary record of a single played game.
//!
//! Layout (little-endian):
//! magic `G2T1` | version u8 | endian u8 | steps u32 | start_unix_s u64 |
//! elapsed_s f32 | final_score u64 | highest_tile u32 | seed_flag u8 | seed u64 |
//! label_len u16 | label bytes | states: (steps + 1) x 16 exponent bytes |
//! moves: steps direction codes | CRC32C of everything before it.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::engine::{self, Direction, Grid, SIZE};

const MAGIC: &[u8; 4] = b"G2T1";
const VERSION: u8 = 1;
const ENDIAN_LE: u8 = 0; // 0 = little-endian

// 4 magic + 1 version + 1 endian + 4 steps + 8 start + 4 elapsed + 8 score + 4 tile + 1 seed flag + 8 seed + 2 label_len
const HEADER_LEN: usize = 4 + 1 + 1 + 4 + 8 + 4 + 8 + 4 + 1 + 8 + 2;
const STATE_LEN: usize = SIZE * SIZE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub steps: u32,
    pub start_unix_s: u64,
    pub elapsed_s: f32,
    pub final_score: u64,
    pub highest_tile: u32,
    /// RNG seed the game was dealt from, when known.
    pub seed: Option<u64>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub meta: Meta,
    pub states: Vec<Grid>,     // length = steps + 1
    pub moves: Vec<Direction>, // length = steps
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
    #[error("invalid grid in state {0}")]
    InvalidGrid(usize),
    #[error("expected {expected} states for {steps} moves, got {states}")]
    LengthMismatch { steps: usize, states: usize, expected: usize },
    #[error("label longer than {} bytes", u16::MAX)]
    LabelTooLong,
    #[error("step {step}: {reason}")]
    Replay { step: usize, reason: String },
}

impl Run {
    /// Replay every recorded move through the engine.
    ///
    /// Each step must be a slide that changes the grid, followed by exactly
    /// one new 2 or 4 tile in a cell the slide left empty. The summed merge
    /// score and the final highest tile must match the header. Returns the
    /// replayed score.
    pub fn verify(&self) -> Result<u64, TraceError> {
        let expected = self.moves.len() + 1;
        if self.states.len() != expected {
            return Err(TraceError::LengthMismatch {
                steps: self.moves.len(),
                states: self.states.len(),
                expected,
            });
        }

        let mut score = 0u64;
        for (step, (&dir, pair)) in self.moves.iter().zip(self.states.windows(2)).enumerate() {
            let (before, after) = (pair[0], pair[1]);
            let slid = engine::slide(before, dir);
            if !slid.moved {
                return Err(replay_err(step, format!("{dir} does not change the grid")));
            }
            check_spawn(step, slid.grid, after)?;
            score += slid.score_gained;
        }

        if score != self.meta.final_score {
            return Err(replay_err(
                self.moves.len(),
                format!("replayed score {score} != recorded {}", self.meta.final_score),
            ));
        }
        let last_tile = self.states.last().map(|g| g.highest_tile()).unwrap_or(0);
        if last_tile != self.meta.highest_tile {
            return Err(replay_err(
                self.moves.len(),
                format!("highest tile {last_tile} != recorded {}", self.meta.highest_tile),
            ));
        }
        Ok(score)
    }
}

fn replay_err(step: usize, reason: String) -> TraceError {
    warn!("trace replay failed at step {step}: {reason}");
    TraceError::Replay { step, reason }
}

fn check_spawn(step: usize, slid: Grid, after: Grid) -> Result<(), TraceError> {
    let mut spawned = 0;
    for r in 0..SIZE {
        for c in 0..SIZE {
            let (was, now) = (slid.tile(r, c), after.tile(r, c));
            if was == now {
                continue;
            }
            if was != 0 || !matches!(now, 2 | 4) {
                return Err(replay_err(step, format!("cell ({r}, {c}) went from {was} to {now}")));
            }
            spawned += 1;
        }
    }
    if spawned != 1 {
        return Err(replay_err(step, format!("{spawned} tiles spawned, expected 1")));
    }
    Ok(())
}

/// Accumulates the states and moves of a game as it is played.
#[derive(Debug, Clone)]
pub struct Recorder {
    states: Vec<Grid>,
    moves: Vec<Direction>,
    score: u64,
    seed: Option<u64>,
    start_unix_s: u64,
    started: Instant,
}

impl Recorder {
    pub fn new(initial: Grid, seed: Option<u64>) -> Self {
        let mut states = Vec::with_capacity(1024);
        states.push(initial);
        Recorder {
            states,
            moves: Vec::with_capacity(1024),
            score: 0,
            seed,
            start_unix_s: now_unix_seconds(),
            started: Instant::now(),
        }
    }

    /// Record an accepted move and the grid it produced (after the spawn).
    pub fn record(&mut self, direction: Direction, score_gained: u64, next: Grid) {
        self.moves.push(direction);
        self.states.push(next);
        self.score += score_gained;
    }

    pub fn steps(&self) -> usize {
        self.moves.len()
    }

    pub fn finish(self, label: Option<String>) -> Run {
        let highest_tile = self.states.last().map(|g| g.highest_tile()).unwrap_or(0);
        let meta = Meta {
            steps: self.moves.len() as u32,
            start_unix_s: self.start_unix_s,
            elapsed_s: self.started.elapsed().as_secs_f32(),
            final_score: self.score,
            highest_tile,
            seed: self.seed,
            label,
        };
        Run { meta, states: self.states, moves: self.moves }
    }
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

pub fn encode_run(run: &Run) -> Result<Vec<u8>, TraceError> {
    let Run { meta, states, moves } = run;
    if states.len() != moves.len() + 1 || meta.steps as usize != moves.len() {
        return Err(TraceError::LengthMismatch {
            steps: meta.steps as usize,
            states: states.len(),
            expected: moves.len() + 1,
        });
    }

    let label_bytes = meta.label.as_deref().map(str::as_bytes).unwrap_or(&[]);
    let label_len: u16 = label_bytes.len().try_into().map_err(|_| TraceError::LabelTooLong)?;

    let payload_len = label_bytes.len() + states.len() * STATE_LEN + moves.len();
    let mut buf = Vec::with_capacity(HEADER_LEN + payload_len + 4);

    // Header
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.push(ENDIAN_LE);
    buf.extend_from_slice(&meta.steps.to_le_bytes());
    buf.extend_from_slice(&meta.start_unix_s.to_le_bytes());
    buf.extend_from_slice(&meta.elapsed_s.to_bits().to_le_bytes());
    buf.extend_from_slice(&meta.final_score.to_le_bytes());
    buf.extend_from_slice(&meta.highest_tile.to_le_bytes());
    buf.push(meta.seed.is_some() as u8);
    buf.extend_from_slice(&meta.seed.unwrap_or(0).to_le_bytes());
    buf.extend_from_slice(&label_len.to_le_bytes());

    // Variable metadata
    buf.extend_from_slice(label_bytes);

    // Payload: states as exponent bytes, then move codes
    for g in states {
        buf.extend_from_slice(&g.to_exponents());
    }
    buf.extend(moves.iter().map(|d| d.code()));

    // Trailer: CRC32C of all preceding bytes
    let checksum = crc32c::crc32c(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

pub fn write_run_to_path<P: AsRef<Path>>(path: P, run: &Run) -> Result<(), TraceError> {
    let data = encode_run(run)?;
    let mut f = fs::File::create(path)?;
    f.write_all(&data)?;
    Ok(())
}

pub fn parse_run_bytes(bytes: &[u8]) -> Result<Run, TraceError> {
    if bytes.len() < HEADER_LEN + STATE_LEN + 4 {
        return Err(TraceError::Malformed);
    }

    // Validate checksum first to avoid panics while reading fields
    let (content, trailer) = bytes.split_at(bytes.len() - 4);
    let file_crc = read_u32_le(trailer).ok_or(TraceError::Malformed)?;
    if file_crc != crc32c::crc32c(content) {
        return Err(TraceError::Checksum);
    }

    // Fixed header
    if &content[..4] != MAGIC || content[4] != VERSION {
        return Err(TraceError::MagicOrVersion);
    }
    if content[5] != ENDIAN_LE {
        return Err(TraceError::Endianness);
    }

    let mut off = 6;
    let steps = read_u32_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 4;
    let start_unix_s = read_u64_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 8;
    let elapsed_s = read_f32_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 4;
    let final_score = read_u64_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 8;
    let highest_tile = read_u32_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 4;
    let seed_flag = content[off]; off += 1;
    let seed_raw = read_u64_le(&content[off..]).ok_or(TraceError::Malformed)?; off += 8;
    let label_len = read_u16_le(&content[off..]).ok_or(TraceError::Malformed)? as usize; off += 2;

    let seed = match seed_flag {
        0 => None,
        1 => Some(seed_raw),
        _ => return Err(TraceError::Malformed),
    };

    let label_bytes = content.get(off..off + label_len).ok_or(TraceError::Malformed)?;
    off += label_len;
    let label = match label_len {
        0 => None,
        _ => Some(std::str::from_utf8(label_bytes).map_err(|_| TraceError::Malformed)?.to_string()),
    };

    let states_count = steps as usize + 1;
    let states_bytes_len = states_count.checked_mul(STATE_LEN).ok_or(TraceError::Malformed)?;
    let moves_len = steps as usize;
    if content.len() != off + states_bytes_len + moves_len {
        return Err(TraceError::Malformed);
    }

    let mut states = Vec::with_capacity(states_count);
    for (i, chunk) in content[off..off + states_bytes_len].chunks_exact(STATE_LEN).enumerate() {
        let exps: &[u8; STATE_LEN] = chunk.try_into().map_err(|_| TraceError::Malformed)?;
        states.push(Grid::from_exponents(exps).map_err(|_| TraceError::InvalidGrid(i))?);
    }
    off += states_bytes_len;

    let moves = content[off..off + moves_len]
        .iter()
        .map(|&c| Direction::from_code(c).ok_or(TraceError::Malformed))
        .collect::<Result<Vec<_>, _>>()?;

    let meta = Meta { steps, start_unix_s, elapsed_s, final_score, highest_tile, seed, label };
    Ok(Run { meta, states, moves })
}

pub fn parse_run_file<P: AsRef<Path>>(path: P) -> Result<Run, TraceError> {
    let data = fs::read(path)?;
    parse_run_bytes(&data)
}

pub fn now_unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
