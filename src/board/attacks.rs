use std::sync::LazyLock;

use super::bitboard::BitBoard;
use super::magic::{BISHOP_BITS, MagicEntry, ROOK_BITS, Rng, find_magic};
use super::piece::Color;
use super::square::Square;

/// Every precomputed attack table, built once behind a `LazyLock`.
struct AttackTables {
    knight: [BitBoard; 64],
    king: [BitBoard; 64],
    pawn: [[BitBoard; 64]; 2],
    bishop_entries: [MagicEntry; 64],
    rook_entries: [MagicEntry; 64],
    bishop_table: Vec<BitBoard>,
    rook_table: Vec<BitBoard>,
}

static TABLES: LazyLock<AttackTables> = LazyLock::new(build_tables);

/// Force table construction. Lookups also initialize lazily on first use.
pub fn init_attacks() {
    LazyLock::force(&TABLES);
}

#[inline]
pub fn knight_attacks(sq: Square) -> BitBoard {
    TABLES.knight[sq.to_index()]
}

#[inline]
pub fn king_attacks(sq: Square) -> BitBoard {
    TABLES.king[sq.to_index()]
}

/// Squares a pawn of `color` on `sq` attacks.
#[inline]
pub fn pawn_attacks(color: Color, sq: Square) -> BitBoard {
    TABLES.pawn[color.to_index()][sq.to_index()]
}

#[inline]
pub fn bishop_attacks(sq: Square, occupied: BitBoard) -> BitBoard {
    let t = &*TABLES;
    let entry = &t.bishop_entries[sq.to_index()];
    t.bishop_table[magic_index(entry, occupied)]
}

#[inline]
pub fn rook_attacks(sq: Square, occupied: BitBoard) -> BitBoard {
    let t = &*TABLES;
    let entry = &t.rook_entries[sq.to_index()];
    t.rook_table[magic_index(entry, occupied)]
}

#[inline]
#[allow(dead_code)] // used in tests
pub fn queen_attacks(sq: Square, occupied: BitBoard) -> BitBoard {
    bishop_attacks(sq, occupied) | rook_attacks(sq, occupied)
}

#[inline]
fn magic_index(entry: &MagicEntry, occupied: BitBoard) -> usize {
    let blockers = occupied & entry.mask;
    let hash = blockers.0.wrapping_mul(entry.magic);
    entry.offset as usize + (hash >> entry.shift) as usize
}

// --- construction ---

fn build_tables() -> AttackTables {
    let mut knight = [BitBoard(0); 64];
    let mut king = [BitBoard(0); 64];
    let mut pawn = [[BitBoard(0); 64]; 2];

    const KNIGHT_OFFSETS: [(i8, i8); 8] = [
        (-2, -1), (-2, 1), (-1, -2), (-1, 2),
        (1, -2), (1, 2), (2, -1), (2, 1),
    ];
    const KING_OFFSETS: [(i8, i8); 8] = [
        (-1, -1), (-1, 0), (-1, 1),
        (0, -1),           (0, 1),
        (1, -1),  (1, 0),  (1, 1),
    ];

    for sq in 0..64usize {
        let r = (sq >> 3) as i8;
        let f = (sq & 7) as i8;

        knight[sq] = BitBoard(leaper(r, f, &KNIGHT_OFFSETS));
        king[sq] = BitBoard(leaper(r, f, &KING_OFFSETS));
        pawn[0][sq] = BitBoard(leaper(r, f, &[(1, -1), (1, 1)]));
        pawn[1][sq] = BitBoard(leaper(r, f, &[(-1, -1), (-1, 1)]));
    }

    // Sliders: find a magic per square, then fill the shared tables for
    // every occupancy subset of the relevance mask.
    let mut rng = Rng(0x9E37_79B9_7F4A_7C15);

    let bishop_total: usize = BISHOP_BITS.iter().map(|&b| 1usize << b).sum();
    let rook_total: usize = ROOK_BITS.iter().map(|&b| 1usize << b).sum();
    let mut bishop_table = vec![BitBoard(0); bishop_total];
    let mut rook_table = vec![BitBoard(0); rook_total];
    let mut bishop_entries = [MagicEntry::default(); 64];
    let mut rook_entries = [MagicEntry::default(); 64];

    let mut offset = 0u32;
    for sq in 0..64 {
        let mask = slider_mask(sq, BISHOP_DIRS, false);
        let bits = BISHOP_BITS[sq];
        let magic = find_magic(mask, bits, &|occ| slider_rays(sq, occ, BISHOP_DIRS), &mut rng);
        bishop_entries[sq] = MagicEntry { mask: BitBoard(mask), magic, shift: 64 - bits, offset };
        fill_slot_table(&mut bishop_table, &bishop_entries[sq], |occ| {
            slider_rays(sq, occ, BISHOP_DIRS)
        });
        offset += 1u32 << bits;
    }

    offset = 0;
    for sq in 0..64 {
        let mask = slider_mask(sq, ROOK_DIRS, true);
        let bits = ROOK_BITS[sq];
        let magic = find_magic(mask, bits, &|occ| slider_rays(sq, occ, ROOK_DIRS), &mut rng);
        rook_entries[sq] = MagicEntry { mask: BitBoard(mask), magic, shift: 64 - bits, offset };
        fill_slot_table(&mut rook_table, &rook_entries[sq], |occ| {
            slider_rays(sq, occ, ROOK_DIRS)
        });
        offset += 1u32 << bits;
    }

    AttackTables { knight, king, pawn, bishop_entries, rook_entries, bishop_table, rook_table }
}

fn leaper(r: i8, f: i8, offsets: &[(i8, i8)]) -> u64 {
    let mut bb = 0u64;
    for &(dr, df) in offsets {
        let (nr, nf) = (r + dr, f + df);
        if (0..8).contains(&nr) && (0..8).contains(&nf) {
            bb |= 1u64 << (nr * 8 + nf);
        }
    }
    bb
}

const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_DIRS: [(i8, i8); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// Relevant occupancy mask: ray squares excluding the board edge, since a
/// blocker on the edge never shortens the attack set.
fn slider_mask(sq: usize, dirs: [(i8, i8); 4], orthogonal: bool) -> u64 {
    let mut mask = 0u64;
    let r = (sq / 8) as i8;
    let f = (sq % 8) as i8;

    for (dr, df) in dirs {
        let mut nr = r + dr;
        let mut nf = f + df;
        loop {
            let on_edge = if orthogonal {
                (dr != 0 && !(1..7).contains(&nr)) || (df != 0 && !(1..7).contains(&nf))
            } else {
                !(1..7).contains(&nr) || !(1..7).contains(&nf)
            };
            if !(0..8).contains(&nr) || !(0..8).contains(&nf) || on_edge {
                break;
            }
            mask |= 1u64 << (nr * 8 + nf);
            nr += dr;
            nf += df;
        }
    }
    mask
}

/// Reference ray tracer used during init only.
fn slider_rays(sq: usize, occupied: u64, dirs: [(i8, i8); 4]) -> u64 {
    let mut attacks = 0u64;
    let r = (sq / 8) as i8;
    let f = (sq % 8) as i8;

    for (dr, df) in dirs {
        let mut nr = r + dr;
        let mut nf = f + df;
        while (0..8).contains(&nr) && (0..8).contains(&nf) {
            let bit = 1u64 << (nr * 8 + nf);
            attacks |= bit;
            if occupied & bit != 0 {
                break;
            }
            nr += dr;
            nf += df;
        }
    }
    attacks
}

/// Fill every occupancy subset of `entry.mask` (Carry-Rippler enumeration).
fn fill_slot_table(table: &mut [BitBoard], entry: &MagicEntry, rays: impl Fn(u64) -> u64) {
    let mask = entry.mask.0;
    let mut occ = 0u64;
    loop {
        let idx =
            entry.offset as usize + ((occ.wrapping_mul(entry.magic)) >> entry.shift) as usize;
        table[idx] = BitBoard(rays(occ));
        occ = occ.wrapping_sub(mask) & mask;
        if occ == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::square::{File, Rank};

    fn sq(r: usize, f: usize) -> Square {
        Square::make_square(Rank::from_index(r), File::from_index(f))
    }

    #[test]
    fn test_knight_attacks() {
        assert_eq!(knight_attacks(sq(0, 0)).popcnt(), 2); // a1: b3, c2
        assert_eq!(knight_attacks(sq(3, 3)).popcnt(), 8); // d4
    }

    #[test]
    fn test_king_attacks() {
        assert_eq!(king_attacks(sq(0, 0)).popcnt(), 3);
        assert_eq!(king_attacks(sq(3, 3)).popcnt(), 8);
    }

    #[test]
    fn test_pawn_attacks() {
        assert_eq!(pawn_attacks(Color::White, sq(1, 4)).popcnt(), 2); // e2: d3, f3
        assert_eq!(pawn_attacks(Color::White, sq(1, 0)).popcnt(), 1); // a2: b3
        assert_eq!(pawn_attacks(Color::Black, sq(6, 4)).popcnt(), 2); // e7: d6, f6
    }

    #[test]
    fn test_sliders_empty_board() {
        for r in 0..8 {
            for f in 0..8 {
                assert_eq!(rook_attacks(sq(r, f), BitBoard(0)).popcnt(), 14);
            }
        }
        assert_eq!(bishop_attacks(sq(3, 3), BitBoard(0)).popcnt(), 13);
    }

    #[test]
    fn test_rook_blockers() {
        // rook a1, blockers a4 and d1: a2 a3 a4 + b1 c1 d1
        let blockers = BitBoard::from_square(sq(3, 0)) | BitBoard::from_square(sq(0, 3));
        assert_eq!(rook_attacks(sq(0, 0), blockers).popcnt(), 6);
    }

    #[test]
    fn test_bishop_blockers() {
        // bishop d4, blocker f6: NE stops at f6
        let blockers = BitBoard::from_square(sq(5, 5));
        assert_eq!(bishop_attacks(sq(3, 3), blockers).popcnt(), 11);
    }

    #[test]
    fn test_queen_union() {
        let occ = BitBoard(0x0000_0010_0800_0000);
        let s = sq(4, 4);
        assert_eq!(queen_attacks(s, occ), bishop_attacks(s, occ) | rook_attacks(s, occ));
    }

    #[test]
    fn test_magic_matches_rays() {
        // every occupancy subset on a couple of squares agrees with the
        // reference tracer
        for sq_idx in [0usize, 28, 63] {
            let mask = slider_mask(sq_idx, ROOK_DIRS, true);
            let mut occ = 0u64;
            loop {
                assert_eq!(
                    rook_attacks(Square::from_index(sq_idx), BitBoard(occ)).0,
                    slider_rays(sq_idx, occ, ROOK_DIRS)
                );
                occ = occ.wrapping_sub(mask) & mask;
                if occ == 0 {
                    break;
                }
            }
        }
    }
}
