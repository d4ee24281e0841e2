use std::fmt;

use crate::board::fen::{parse_fen, STARTPOS};
use crate::board::zobrist::ZOBRIST;
use crate::moves::attacks::{king_attacks, knight_attacks, pawn_attacks};
use crate::moves::chess_move::{Move, MoveKind};
use crate::moves::magics::{bishop_attacks, queen_attacks, rook_attacks};
use crate::types::bitboard::Bitboard;
use crate::types::pieces::{Color, Piece, PieceKind, NUM_PIECE_KINDS};
use crate::types::square::{Direction, Square};

pub const WHITE_KINGSIDE: u8 = 1;
pub const WHITE_QUEENSIDE: u8 = 2;
pub const BLACK_KINGSIDE: u8 = 4;
pub const BLACK_QUEENSIDE: u8 = 8;

/// Rights that survive a move touching each square; king and rook home
/// squares knock out the relevant bits.
#[rustfmt::skip]
const CASTLE_MASKS: [u8; 64] = [
    13, 15, 15, 15, 12, 15, 15, 14,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
     7, 15, 15, 15,  3, 15, 15, 11,
];

/// Copy-make board state. `make_move` mutates in place and reports whether
/// the move was legal; search keeps the parent alive and hands each child a
/// copy, so an abort can never leave a half-made position behind.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Board {
    kinds: [Bitboard; NUM_PIECE_KINDS],
    colors: [Bitboard; 2],
    mailbox: [Piece; 64],
    pub stm: Color,
    pub castle_rights: u8,
    pub ep_square: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
    pub hash: u64,
    pub pawn_king_hash: u64,
    checkers: Bitboard,
}

impl Default for Board {
    fn default() -> Board {
        parse_fen(STARTPOS).expect("start position parses")
    }
}

impl Board {
    pub const fn empty() -> Board {
        Board {
            kinds: [Bitboard::EMPTY; NUM_PIECE_KINDS],
            colors: [Bitboard::EMPTY; 2],
            mailbox: [Piece::None; 64],
            stm: Color::White,
            castle_rights: 0,
            ep_square: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            hash: 0,
            pawn_king_hash: 0,
            checkers: Bitboard::EMPTY,
        }
    }

    pub fn kind_bb(&self, kind: PieceKind) -> Bitboard {
        self.kinds[kind]
    }

    pub fn color_bb(&self, color: Color) -> Bitboard {
        self.colors[color]
    }

    pub fn piece_bb(&self, color: Color, kind: PieceKind) -> Bitboard {
        self.kinds[kind] & self.colors[color]
    }

    pub fn occupied(&self) -> Bitboard {
        self.colors[Color::White] | self.colors[Color::Black]
    }

    pub fn piece_at(&self, sq: Square) -> Piece {
        self.mailbox[sq.0 as usize]
    }

    pub fn king_square(&self, color: Color) -> Square {
        self.piece_bb(color, PieceKind::King).lsb()
    }

    pub fn diag_sliders(&self) -> Bitboard {
        self.kinds[PieceKind::Bishop] | self.kinds[PieceKind::Queen]
    }

    pub fn ortho_sliders(&self) -> Bitboard {
        self.kinds[PieceKind::Rook] | self.kinds[PieceKind::Queen]
    }

    /// Pieces of either side attacking `sq` through the given occupancy.
    pub fn attackers_to(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.attackers_for(Color::White, sq, occupied) | self.attackers_for(Color::Black, sq, occupied)
    }

    pub fn attackers_for(&self, attacker: Color, sq: Square, occupied: Bitboard) -> Bitboard {
        let attacks = pawn_attacks(sq, !attacker) & self.kinds[PieceKind::Pawn]
            | knight_attacks(sq) & self.kinds[PieceKind::Knight]
            | bishop_attacks(sq, occupied) & self.diag_sliders()
            | rook_attacks(sq, occupied) & self.ortho_sliders()
            | king_attacks(sq) & self.kinds[PieceKind::King];
        attacks & self.colors[attacker]
    }

    pub fn square_attacked(&self, attacker: Color, sq: Square) -> bool {
        self.attackers_for(attacker, sq, self.occupied()).any()
    }

    /// Checkers of the side to move, kept current by `make_move`.
    pub const fn checkers(&self) -> Bitboard {
        self.checkers
    }

    pub const fn in_check(&self) -> bool {
        self.checkers.any()
    }

    pub fn has_non_pawn_material(&self, side: Color) -> bool {
        (self.colors[side] & !(self.kinds[PieceKind::King] | self.kinds[PieceKind::Pawn])).any()
    }

    /// Capture / promotion / en passant, the moves quiescence looks at.
    pub fn is_tactical(&self, m: Move) -> bool {
        self.piece_at(m.to()) != Piece::None || m.promotion().is_some() || m.is_en_passant()
    }

    fn is_material_draw(&self) -> bool {
        if self.kinds[PieceKind::Pawn].any()
            || self.kinds[PieceKind::Rook].any()
            || self.kinds[PieceKind::Queen].any()
        {
            return false;
        }
        let minors = self.kinds[PieceKind::Knight] | self.kinds[PieceKind::Bishop];
        match minors.count() {
            0 | 1 => true,
            // Two knights cannot force mate; opposite minors cannot either
            2 => {
                self.kinds[PieceKind::Bishop].is_empty()
                    || (self.piece_bb(Color::White, PieceKind::Bishop).count() == 1
                        && self.piece_bb(Color::Black, PieceKind::Bishop).count() == 1)
            }
            _ => false,
        }
    }

    /// Fifty-move rule or dead material. Repetitions are tracked by the
    /// searching thread, which owns the hash history.
    pub fn is_draw(&self) -> bool {
        self.halfmove_clock >= 100 || self.is_material_draw()
    }

    pub(crate) fn place_piece(&mut self, piece: Piece, sq: Square) {
        let kind = piece.kind();
        let color = piece.color();
        self.mailbox[sq.0 as usize] = piece;
        self.kinds[kind] ^= sq.bitboard();
        self.colors[color] ^= sq.bitboard();
        let key = ZOBRIST.pieces[color.idx()][kind.idx()][sq.0 as usize];
        self.hash ^= key;
        if kind == PieceKind::Pawn || kind == PieceKind::King {
            self.pawn_king_hash ^= key;
        }
    }

    pub(crate) fn remove_piece(&mut self, sq: Square) {
        let piece = self.mailbox[sq.0 as usize];
        debug_assert!(piece != Piece::None);
        let kind = piece.kind();
        let color = piece.color();
        self.mailbox[sq.0 as usize] = Piece::None;
        self.kinds[kind] ^= sq.bitboard();
        self.colors[color] ^= sq.bitboard();
        let key = ZOBRIST.pieces[color.idx()][kind.idx()][sq.0 as usize];
        self.hash ^= key;
        if kind == PieceKind::Pawn || kind == PieceKind::King {
            self.pawn_king_hash ^= key;
        }
    }

    fn set_ep_square(&mut self, ep: Option<Square>) {
        if let Some(old) = self.ep_square {
            self.hash ^= ZOBRIST.en_passant[old.file() as usize];
        }
        self.ep_square = ep;
        if let Some(new) = self.ep_square {
            self.hash ^= ZOBRIST.en_passant[new.file() as usize];
        }
    }

    pub(crate) fn refresh_checkers(&mut self) {
        self.checkers = self.attackers_for(!self.stm, self.king_square(self.stm), self.occupied());
    }

    /// Applies a pseudo-legal move. Returns false if it leaves the mover's
    /// king in check; the board is a discarded copy in that case, so no
    /// cleanup happens here.
    #[must_use]
    pub fn make_move(&mut self, m: Move) -> bool {
        let from = m.from();
        let to = m.to();
        let us = self.stm;
        let piece = self.piece_at(from);
        debug_assert!(piece != Piece::None && piece.color() == us);

        let captured = if m.is_en_passant() { Piece::new(PieceKind::Pawn, !us) } else { self.piece_at(to) };

        if captured != Piece::None && !m.is_en_passant() {
            self.remove_piece(to);
        }
        self.remove_piece(from);
        match m.promotion() {
            Some(promo) => self.place_piece(Piece::new(promo, us), to),
            None => self.place_piece(piece, to),
        }

        let down = match us {
            Color::White => Direction::South,
            Color::Black => Direction::North,
        };

        if m.is_castle() {
            let (rook_from, rook_to) = castle_rook_squares(to);
            self.remove_piece(rook_from);
            self.place_piece(Piece::new(PieceKind::Rook, us), rook_to);
        } else if m.is_en_passant() {
            self.remove_piece(to.shift(down));
        }

        if self.square_attacked(!us, self.king_square(us)) {
            return false;
        }

        let double_push = piece.kind() == PieceKind::Pawn && from.0.abs_diff(to.0) == 16;
        self.set_ep_square(if double_push { Some(to.shift(down)) } else { None });

        if captured != Piece::None || piece.kind() == PieceKind::Pawn {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }

        self.hash ^= ZOBRIST.castling[self.castle_rights as usize];
        self.castle_rights &= CASTLE_MASKS[from.0 as usize] & CASTLE_MASKS[to.0 as usize];
        self.hash ^= ZOBRIST.castling[self.castle_rights as usize];

        if us == Color::Black {
            self.fullmove_number += 1;
        }
        self.stm = !us;
        self.hash ^= ZOBRIST.side;

        self.refresh_checkers();
        true
    }

    /// Passes the turn. Callers guarantee the side to move is not in check.
    pub fn make_null_move(&mut self) {
        debug_assert!(!self.in_check());
        self.set_ep_square(None);
        self.halfmove_clock += 1;
        self.stm = !self.stm;
        self.hash ^= ZOBRIST.side;
        self.refresh_checkers();
    }

    /// Whether `m` makes structural sense on this board. Moves fished out of
    /// the transposition table or the killer slots may come from another
    /// position entirely (or from a torn entry), so they are vetted here
    /// before the picker hands them to the search.
    pub fn is_pseudo_legal(&self, m: Move) -> bool {
        if !m.is_some() {
            return false;
        }
        let from = m.from();
        let to = m.to();
        let piece = self.piece_at(from);
        if piece == Piece::None || piece.color() != self.stm {
            return false;
        }
        let captured = self.piece_at(to);
        if captured != Piece::None && captured.color() == self.stm {
            return false;
        }

        let up = match self.stm {
            Color::White => Direction::North,
            Color::Black => Direction::South,
        };
        let promo_rank = match self.stm {
            Color::White => 7,
            Color::Black => 0,
        };

        match m.kind() {
            MoveKind::Castle => self.castle_is_pseudo_legal(from, to),
            MoveKind::EnPassant => {
                piece.kind() == PieceKind::Pawn
                    && Some(to) == self.ep_square
                    && pawn_attacks(from, self.stm).contains(to)
            }
            MoveKind::Promotion => {
                if piece.kind() != PieceKind::Pawn || to.rank() != promo_rank {
                    return false;
                }
                if captured != Piece::None {
                    pawn_attacks(from, self.stm).contains(to)
                } else {
                    from.checked_shift(up) == Some(to)
                }
            }
            MoveKind::Normal => {
                if piece.kind() == PieceKind::Pawn {
                    if to.rank() == promo_rank {
                        return false;
                    }
                    if captured != Piece::None {
                        return pawn_attacks(from, self.stm).contains(to);
                    }
                    let single = from.shift(up);
                    if to == single {
                        return true;
                    }
                    let start_rank = match self.stm {
                        Color::White => 1,
                        Color::Black => 6,
                    };
                    from.rank() == start_rank
                        && to == single.shift(up)
                        && self.piece_at(single) == Piece::None
                } else {
                    let attacks = match piece.kind() {
                        PieceKind::Knight => knight_attacks(from),
                        PieceKind::Bishop => bishop_attacks(from, self.occupied()),
                        PieceKind::Rook => rook_attacks(from, self.occupied()),
                        PieceKind::Queen => queen_attacks(from, self.occupied()),
                        PieceKind::King => king_attacks(from),
                        PieceKind::Pawn => unreachable!(),
                    };
                    attacks.contains(to)
                }
            }
        }
    }

    fn castle_is_pseudo_legal(&self, from: Square, to: Square) -> bool {
        if self.in_check() {
            return false;
        }
        let (king_from, right, rook_from, empty, safe): (u8, u8, u8, &[u8], &[u8]) = match to.0 {
            6 => (4, WHITE_KINGSIDE, 7, &[5, 6], &[4, 5, 6]),
            2 => (4, WHITE_QUEENSIDE, 0, &[1, 2, 3], &[2, 3, 4]),
            62 => (60, BLACK_KINGSIDE, 63, &[61, 62], &[60, 61, 62]),
            58 => (60, BLACK_QUEENSIDE, 56, &[57, 58, 59], &[58, 59, 60]),
            _ => return false,
        };
        from.0 == king_from
            && self.piece_at(from).kind() == PieceKind::King
            && self.castle_rights & right != 0
            && self.piece_bb(self.stm, PieceKind::Rook).contains(Square(rook_from))
            && empty.iter().all(|&sq| self.piece_at(Square(sq)) == Piece::None)
            && safe.iter().all(|&sq| !self.square_attacked(!self.stm, Square(sq)))
    }
}

pub const fn castle_rook_squares(king_to: Square) -> (Square, Square) {
    match king_to.0 {
        6 => (Square(7), Square(5)),
        2 => (Square(0), Square(3)),
        62 => (Square(63), Square(61)),
        58 => (Square(56), Square(59)),
        _ => panic!("not a castle destination"),
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8).rev() {
            write!(f, "{} |", rank + 1)?;
            for file in 0..8 {
                let piece = self.piece_at(Square(rank * 8 + file));
                let glyph = if piece == Piece::None { '.' } else { piece.glyph() };
                write!(f, " {glyph}")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "   ----------------")?;
        writeln!(f, "    a b c d e f g h")
    }
}

#[cfg(test)]
mod board_tests {
    use super::*;

    #[test]
    fn make_move_updates_hash_incrementally() {
        let mut board = Board::default();
        let e4 = Move::new(Square(12), Square(28), MoveKind::Normal);
        assert!(board.make_move(e4));
        assert_eq!(board.hash, board.compute_hash());
        assert_eq!(board.pawn_king_hash, board.compute_pawn_king_hash());
        assert_eq!(board.ep_square, Some(Square(20)));
        assert_eq!(board.stm, Color::Black);
    }

    #[test]
    fn pinned_piece_moves_fail_make_move() {
        // Bishop e2 is pinned against the king by the rook on e8
        let board = parse_fen("4r3/4k3/8/8/8/8/4B3/4K3 w - - 0 1").unwrap();
        let m = Move::new(Square(12), Square(21), MoveKind::Normal);
        assert!(board.is_pseudo_legal(m));
        let mut child = board;
        assert!(!child.make_move(m));
    }

    #[test]
    fn en_passant_removes_the_captured_pawn() {
        let mut board = parse_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let ep = Move::new(Square(36), Square(43), MoveKind::EnPassant);
        assert!(board.is_pseudo_legal(ep));
        assert!(board.make_move(ep));
        assert_eq!(board.piece_at(Square(35)), Piece::None);
        assert_eq!(board.piece_at(Square(43)).kind(), PieceKind::Pawn);
        assert_eq!(board.hash, board.compute_hash());
    }

    #[test]
    fn castling_moves_both_pieces() {
        let mut board = parse_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let castle = Move::new(Square(4), Square(6), MoveKind::Castle);
        assert!(board.is_pseudo_legal(castle));
        assert!(board.make_move(castle));
        assert_eq!(board.piece_at(Square(6)).kind(), PieceKind::King);
        assert_eq!(board.piece_at(Square(5)).kind(), PieceKind::Rook);
        assert_eq!(board.castle_rights & (WHITE_KINGSIDE | WHITE_QUEENSIDE), 0);
        assert_eq!(board.hash, board.compute_hash());
    }

    #[test]
    fn castle_through_attack_is_rejected() {
        let board = parse_fen("4k3/8/8/8/8/8/5r2/R3K2R w KQ - 0 1").unwrap();
        let castle = Move::new(Square(4), Square(6), MoveKind::Castle);
        assert!(!board.is_pseudo_legal(castle));
    }

    #[test]
    fn checkers_track_the_side_to_move() {
        let board = parse_fen("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1").unwrap();
        assert!(board.in_check());
        assert_eq!(board.checkers(), Square(12).bitboard());
    }

    #[test]
    fn material_draws() {
        assert!(parse_fen("8/8/4k3/8/8/4K3/8/8 w - - 0 1").unwrap().is_draw());
        assert!(parse_fen("8/8/4k3/8/8/4KN2/8/8 w - - 0 1").unwrap().is_draw());
        assert!(!parse_fen("8/8/4k3/8/8/4KP2/8/8 w - - 0 1").unwrap().is_draw());
        assert!(!parse_fen("8/8/4k3/8/8/4KR2/8/8 w - - 0 1").unwrap().is_draw());
    }

    #[test]
    fn null_move_flips_side_and_clears_ep() {
        let mut board = parse_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let hash = board.hash;
        board.make_null_move();
        assert_eq!(board.stm, Color::Black);
        assert_eq!(board.ep_square, None);
        assert_ne!(board.hash, hash);
        assert_eq!(board.hash, board.compute_hash());
    }
}
