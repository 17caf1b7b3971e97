use crate::board::{
    BitBoard, Board, Color, Move, Piece, Square, bishop_attacks, king_attacks, knight_attacks,
    pawn_attacks, rook_attacks,
};
use crate::types::Score;

/// Material values used by SEE and delta pruning. The king value makes any
/// line that loses the king unacceptable in the exchange fold.
pub const STATIC_MATERIAL_VALUE: [Score; 6] = [100, 320, 330, 500, 900, 20_000];

#[inline]
fn value(piece: Piece) -> Score {
    STATIC_MATERIAL_VALUE[piece.to_index()]
}

/// Static exchange evaluation: the material balance on the destination
/// square after both sides run their best capture sequence. Works for quiet
/// moves too (victim value 0), which the search's SEE pruning relies on.
pub fn see(board: &Board, mv: Move) -> Score {
    let src = mv.source();
    let dst = mv.dest();

    let Some(attacker) = board.piece_on(src) else { return 0 };

    let mut gain = [0 as Score; 32];
    let mut d = 0usize;

    // the swap starts with whatever the move wins outright
    gain[0] = if mv.is_en_passant() {
        value(Piece::Pawn)
    } else {
        board.piece_on(dst).map_or(0, value)
    };

    let mut attacker_value = value(attacker);
    if let Some(promo) = mv.promotion() {
        gain[0] += value(promo) - value(Piece::Pawn);
        attacker_value = value(promo);
    }

    let mut occupied = board.combined() ^ BitBoard::from_square(src);
    if mv.is_en_passant() {
        let victim_sq = match board.side_to_move() {
            Color::White => Square::new(dst.to_index() as u8 - 8),
            Color::Black => Square::new(dst.to_index() as u8 + 8),
        };
        occupied ^= BitBoard::from_square(victim_sq);
    }

    let mut side = !board.side_to_move();

    // swap list: each side keeps throwing its least valuable attacker at the
    // square; removing attackers from `occupied` uncovers x-rays
    while d + 1 < gain.len() {
        let Some((sq, piece)) = least_valuable_attacker(board, dst, side, occupied) else {
            break;
        };
        d += 1;
        gain[d] = attacker_value - gain[d - 1]; // speculative recapture
        occupied ^= BitBoard::from_square(sq);
        attacker_value = value(piece);
        side = !side;
    }

    // negamax fold with the option to stand pat at every step
    while d > 0 {
        gain[d - 1] = -Score::max(-gain[d - 1], gain[d]);
        d -= 1;
    }
    gain[0]
}

/// Cheapest piece of `side` attacking `target` through the given occupancy.
fn least_valuable_attacker(
    board: &Board,
    target: Square,
    side: Color,
    occupied: BitBoard,
) -> Option<(Square, Piece)> {
    for piece in Piece::ALL {
        let candidates = board.pieces(piece) & board.color_combined(side) & occupied;
        if candidates.is_empty() {
            continue;
        }
        let attackers = candidates
            & match piece {
                // side's pawns attacking `target` sit on the squares a pawn
                // of the opposite color on `target` would attack
                Piece::Pawn => pawn_attacks(!side, target),
                Piece::Knight => knight_attacks(target),
                Piece::Bishop => bishop_attacks(target, occupied),
                Piece::Rook => rook_attacks(target, occupied),
                Piece::Queen => {
                    bishop_attacks(target, occupied) | rook_attacks(target, occupied)
                }
                Piece::King => king_attacks(target),
            };
        if !attackers.is_empty() {
            return Some((attackers.lsb(), piece));
        }
    }
    None
}
