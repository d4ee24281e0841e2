use crate::board::board::Board;
use crate::moves::attacks::{king_attacks, knight_attacks, pawn_attacks, RANKS};
use crate::moves::chess_move::{Move, MoveKind};
use crate::moves::magics::{bishop_attacks, queen_attacks, rook_attacks};
use crate::moves::movelist::MoveList;
use crate::types::pieces::{Color, PieceKind};
use crate::types::square::{Direction, Square};

#[derive(Clone, Copy, Eq, PartialEq)]
pub enum GenKind {
    /// Captures, promotions and en passant.
    Noisy,
    /// Everything else, castling included.
    Quiet,
    All,
}

impl Board {
    /// Generates pseudo-legal moves; `make_move` filters the ones that leave
    /// the king hanging.
    pub fn generate(&self, kind: GenKind) -> MoveList {
        let mut list = MoveList::default();
        self.pawn_moves(kind, &mut list);
        for piece in [PieceKind::Knight, PieceKind::Bishop, PieceKind::Rook, PieceKind::Queen, PieceKind::King] {
            self.piece_moves(piece, kind, &mut list);
        }
        if kind != GenKind::Noisy {
            self.castle_moves(&mut list);
        }
        list
    }

    fn piece_moves(&self, kind: PieceKind, gen: GenKind, list: &mut MoveList) {
        let allowed = match gen {
            GenKind::Noisy => self.color_bb(!self.stm),
            GenKind::Quiet => !self.occupied(),
            GenKind::All => !self.color_bb(self.stm),
        };
        for from in self.piece_bb(self.stm, kind) {
            let attacks = match kind {
                PieceKind::Knight => knight_attacks(from),
                PieceKind::Bishop => bishop_attacks(from, self.occupied()),
                PieceKind::Rook => rook_attacks(from, self.occupied()),
                PieceKind::Queen => queen_attacks(from, self.occupied()),
                PieceKind::King => king_attacks(from),
                PieceKind::Pawn => unreachable!("pawns are generated by shifts"),
            };
            for to in attacks & allowed {
                list.push(Move::new(from, to, MoveKind::Normal));
            }
        }
    }

    fn pawn_moves(&self, gen: GenKind, list: &mut MoveList) {
        let us = self.stm;
        let pawns = self.piece_bb(us, PieceKind::Pawn);
        let empty = !self.occupied();
        let enemies = self.color_bb(!us);

        let (up, promo_rank, double_rank) = match us {
            Color::White => (Direction::North, RANKS[7], RANKS[2]),
            Color::Black => (Direction::South, RANKS[0], RANKS[5]),
        };
        let capture_dirs = match us {
            Color::White => [Direction::NorthWest, Direction::NorthEast],
            Color::Black => [Direction::SouthEast, Direction::SouthWest],
        };

        if gen != GenKind::Noisy {
            let single = pawns.shift(up) & empty & !promo_rank;
            for to in single {
                list.push(Move::new(to.shift(up.opposite()), to, MoveKind::Normal));
            }
            let double = (single & double_rank).shift(up) & empty;
            for to in double {
                list.push(Move::new(to.shift(up.opposite()).shift(up.opposite()), to, MoveKind::Normal));
            }
        }

        if gen != GenKind::Quiet {
            for dir in capture_dirs {
                let targets = pawns.shift(dir) & enemies;
                for to in targets & !promo_rank {
                    list.push(Move::new(to.shift(dir.opposite()), to, MoveKind::Normal));
                }
                for to in targets & promo_rank {
                    push_promotions(to.shift(dir.opposite()), to, list);
                }
            }

            for to in pawns.shift(up) & empty & promo_rank {
                push_promotions(to.shift(up.opposite()), to, list);
            }

            if let Some(ep) = self.ep_square {
                for from in pawn_attacks(ep, !us) & pawns {
                    list.push(Move::new(from, ep, MoveKind::EnPassant));
                }
            }
        }
    }

    fn castle_moves(&self, list: &mut MoveList) {
        let (king_from, destinations) = match self.stm {
            Color::White => (Square(4), [Square(6), Square(2)]),
            Color::Black => (Square(60), [Square(62), Square(58)]),
        };
        for to in destinations {
            let m = Move::new(king_from, to, MoveKind::Castle);
            if self.is_pseudo_legal(m) {
                list.push(m);
            }
        }
    }

    /// Counts strictly legal moves; handy for the mate/stalemate tests.
    pub fn legal_move_count(&self) -> usize {
        self.generate(GenKind::All)
            .iter()
            .filter(|&m| {
                let mut child = *self;
                child.make_move(m)
            })
            .count()
    }
}

fn push_promotions(from: Square, to: Square, list: &mut MoveList) {
    // Queen first so even an unscored list tries the useful one early
    for promo in [PieceKind::Queen, PieceKind::Knight, PieceKind::Rook, PieceKind::Bishop] {
        list.push(Move::new_promotion(from, to, promo));
    }
}

#[cfg(test)]
mod generate_tests {
    use super::*;
    use crate::board::fen::{parse_fen, STARTPOS};

    #[test]
    fn twenty_moves_from_the_start() {
        let board = parse_fen(STARTPOS).unwrap();
        assert_eq!(board.generate(GenKind::All).len(), 20);
        assert_eq!(board.generate(GenKind::Noisy).len(), 0);
        assert_eq!(board.legal_move_count(), 20);
    }

    #[test]
    fn split_generation_matches_full_generation() {
        let board =
            parse_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap();
        let noisy = board.generate(GenKind::Noisy).len();
        let quiet = board.generate(GenKind::Quiet).len();
        let all = board.generate(GenKind::All).len();
        assert_eq!(noisy + quiet, all);
    }

    #[test]
    fn promotions_generate_all_four_pieces() {
        let board = parse_fen("4k3/1P6/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let noisy = board.generate(GenKind::Noisy);
        assert_eq!(noisy.iter().filter(|m| m.promotion().is_some()).count(), 4);
    }

    #[test]
    fn en_passant_is_noisy() {
        let board = parse_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let noisy = board.generate(GenKind::Noisy);
        assert!(noisy.iter().any(|m| m.is_en_passant()));
    }

    #[test]
    fn stalemate_has_no_legal_moves() {
        let board = parse_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(board.legal_move_count(), 0);
        assert!(!board.in_check());
    }

    #[test]
    fn mate_has_no_legal_moves_and_check() {
        let board = parse_fen("R3k3/8/4K3/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(board.legal_move_count(), 0);
        assert!(board.in_check());
    }
}
