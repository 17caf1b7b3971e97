mod attacks;
mod bitboard;
#[allow(clippy::module_inception)]
mod board;
mod magic;
mod movegen;
mod mv;
mod piece;
mod square;
mod zobrist;

pub use attacks::{bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks};
pub use bitboard::{BitBoard, EMPTY};
pub use board::{Board, BoardStatus};
pub use movegen::{MoveList, legal_moves, noisy_moves, perft};
pub use mv::Move;
pub use piece::{Color, Piece};
#[allow(unused_imports)]
pub use square::{ALL_SQUARES, File, Rank, Square};

/// Build attack tables and Zobrist keys. Lookups also self-initialize, but
/// doing it up front keeps the first search's timing honest.
pub fn init() {
    attacks::init_attacks();
    zobrist::init_zobrist();
}
