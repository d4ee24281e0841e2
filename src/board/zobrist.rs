use lazy_static::lazy_static;
use strum::IntoEnumIterator;

use crate::board::board::Board;
use crate::moves::magics::Rng;
use crate::types::pieces::{Color, PieceKind};

/// Keys for the incremental board hashes. Castling is keyed by the whole
/// rights mask, en passant by file only.
pub struct ZobristKeys {
    pub pieces: [[[u64; 64]; 6]; 2],
    pub side: u64,
    pub castling: [u64; 16],
    pub en_passant: [u64; 8],
}

lazy_static! {
    pub static ref ZOBRIST: ZobristKeys = ZobristKeys::new();
}

impl ZobristKeys {
    fn new() -> ZobristKeys {
        let mut rng = Rng::default();
        let mut pieces = [[[0; 64]; 6]; 2];
        pieces.iter_mut().flatten().flatten().for_each(|k| *k = rng.next_u64());
        let side = rng.next_u64();
        let mut castling = [0; 16];
        castling.iter_mut().for_each(|k| *k = rng.next_u64());
        let mut en_passant = [0; 8];
        en_passant.iter_mut().for_each(|k| *k = rng.next_u64());
        ZobristKeys { pieces, side, castling, en_passant }
    }
}

impl Board {
    /// Rebuilds the full hash from scratch. `make_move` maintains it
    /// incrementally; this is the reference the tests compare against.
    pub fn compute_hash(&self) -> u64 {
        let mut hash = 0;
        for color in Color::iter() {
            for kind in PieceKind::iter() {
                for sq in self.piece_bb(color, kind) {
                    hash ^= ZOBRIST.pieces[color.idx()][kind.idx()][sq.0 as usize];
                }
            }
        }
        if let Some(ep) = self.ep_square {
            hash ^= ZOBRIST.en_passant[ep.file() as usize];
        }
        hash ^= ZOBRIST.castling[self.castle_rights as usize];
        if self.stm == Color::Black {
            hash ^= ZOBRIST.side;
        }
        hash
    }

    /// Reference computation of the pawn-king hash that keys the pawn
    /// structure cache.
    pub fn compute_pawn_king_hash(&self) -> u64 {
        let mut hash = 0;
        for color in Color::iter() {
            for kind in [PieceKind::Pawn, PieceKind::King] {
                for sq in self.piece_bb(color, kind) {
                    hash ^= ZOBRIST.pieces[color.idx()][kind.idx()][sq.0 as usize];
                }
            }
        }
        hash
    }
}

#[cfg(test)]
mod zobrist_tests {
    use crate::board::fen::{parse_fen, STARTPOS};

    #[test]
    fn transpositions_share_a_hash() {
        let start = parse_fen(STARTPOS).unwrap();
        let same = parse_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap();
        let other = parse_fen("4r3/4k3/8/4K3/8/8/8/8 w - - 0 1").unwrap();
        assert_eq!(start.compute_hash(), same.compute_hash());
        assert_ne!(start.compute_hash(), other.compute_hash());
    }

    #[test]
    fn side_to_move_is_hashed() {
        let white = parse_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let black = parse_fen("4k3/8/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        assert_ne!(white.compute_hash(), black.compute_hash());
        // Pawn-king structure does not care whose turn it is
        assert_eq!(white.compute_pawn_king_hash(), black.compute_pawn_king_hash());
    }
}
