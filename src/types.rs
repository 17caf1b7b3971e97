use crate::board::Move;

pub type Score = i32;

/// Mate at the root; mate-in-N scores count down from here by ply.
pub const CHECKMATE: Score = 32_767;
/// Any score with magnitude above this encodes a mate distance.
pub const MATE_BOUND: Score = 30_000;
pub const MAX_PLY: usize = 128;
pub const DEFAULT_DEPTH: u8 = 7;
pub const DEFAULT_HASH_MB: usize = 64;

// Move-ordering tiers. The search relies on one inequality only: any score
// >= COUNTER marks a move as "important" when deciding reductions. Quiet
// moves score below COUNTER, SEE-losing captures below zero.
pub const HASH: Score = 1_000_000;
pub const GOOD_CAPTURE: Score = 100_000;
pub const KILLER1: Score = 90_000;
pub const KILLER2: Score = 80_000;
pub const COUNTER: Score = 70_000;
pub const BAD_CAPTURE: Score = -100_000;

pub struct EngineConfig {
    pub hash_mb: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hash_mb: DEFAULT_HASH_MB,
        }
    }
}

pub struct SearchResult {
    pub best_move: Option<Move>,
    pub score: Score,
    pub depth: u8,
    pub seldepth: usize,
    pub nodes: u64,
}
