use std::sync::LazyLock;

use super::magic::Rng;

struct ZobristKeys {
    /// [piece_type][color][square]
    piece: [[[u64; 64]; 2]; 6],
    /// XORed in when it's black's turn
    side: u64,
    /// one key per castling-rights mask (4 bits -> 16 values)
    castling: [u64; 16],
    /// en passant file, active only when a capture is possible
    ep: [u64; 8],
}

static KEYS: LazyLock<ZobristKeys> = LazyLock::new(|| {
    // fixed seed: reproducible hashes across runs
    let mut rng = Rng(0x3243_F6A8_885A_308D);

    let mut piece = [[[0u64; 64]; 2]; 6];
    for piece_keys in &mut piece {
        for color_keys in piece_keys {
            for key in color_keys {
                *key = rng.next();
            }
        }
    }

    let side = rng.next();

    let mut castling = [0u64; 16];
    for key in &mut castling {
        *key = rng.next();
    }

    let mut ep = [0u64; 8];
    for key in &mut ep {
        *key = rng.next();
    }

    ZobristKeys { piece, side, castling, ep }
});

pub fn init_zobrist() {
    LazyLock::force(&KEYS);
}

#[inline]
pub fn piece_key(piece: usize, color: usize, sq: usize) -> u64 {
    KEYS.piece[piece][color][sq]
}

#[inline]
pub fn side_key() -> u64 {
    KEYS.side
}

#[inline]
pub fn castling_key(rights: u8) -> u64 {
    KEYS.castling[rights as usize & 0xF]
}

#[inline]
pub fn ep_key(file: usize) -> u64 {
    KEYS.ep[file]
}
