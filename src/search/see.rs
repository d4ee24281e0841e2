use strum::IntoEnumIterator;

use crate::board::board::Board;
use crate::moves::attacks::RANKS;
use crate::moves::chess_move::Move;
use crate::moves::magics::{bishop_attacks, rook_attacks};
use crate::search::params::SEE_PIECE_VALUES;
use crate::types::pieces::{Color, Piece, PieceKind};

/// Material swing `m` promises before any recapture: the victim's value,
/// plus the upgrade for promotions, plus the pawn for en passant.
pub fn move_estimated_value(board: &Board, m: Move) -> i32 {
    let mut value = match board.piece_at(m.to()) {
        Piece::None => 0,
        victim => SEE_PIECE_VALUES[victim.kind()],
    };
    if let Some(promo) = m.promotion() {
        value += SEE_PIECE_VALUES[promo] - SEE_PIECE_VALUES[PieceKind::Pawn];
    } else if m.is_en_passant() {
        value = SEE_PIECE_VALUES[PieceKind::Pawn];
    }
    value
}

/// Upper bound on what any single tactic in this position could gain: the
/// best enemy piece on the board, plus the promotion upgrade if a friendly
/// pawn stands one step from the last rank.
pub fn best_tactical_move_value(board: &Board) -> i32 {
    let them = !board.stm;
    let mut value = SEE_PIECE_VALUES[PieceKind::Pawn];
    for kind in [PieceKind::Queen, PieceKind::Rook, PieceKind::Bishop, PieceKind::Knight] {
        if board.piece_bb(them, kind).any() {
            value = SEE_PIECE_VALUES[kind];
            break;
        }
    }
    let seventh = match board.stm {
        Color::White => RANKS[6],
        Color::Black => RANKS[1],
    };
    if (board.piece_bb(board.stm, PieceKind::Pawn) & seventh).any() {
        value += SEE_PIECE_VALUES[PieceKind::Queen] - SEE_PIECE_VALUES[PieceKind::Pawn];
    }
    value
}

/// Swap-off evaluation: true when the capture sequence starting with `m`
/// nets at least `threshold` with both sides always recapturing with their
/// cheapest attacker.
pub fn static_exchange_eval(board: &Board, m: Move, threshold: i32) -> bool {
    let from = m.from();
    let to = m.to();

    // The piece that will sit on `to` after the move resolves
    let mut next_victim = match m.promotion() {
        Some(promo) => promo,
        None => board.piece_at(from).kind(),
    };

    // Worst case: we capture and take nothing further
    let mut balance = move_estimated_value(board, m) - threshold;
    if balance < 0 {
        return false;
    }

    // Best case for the opponent: our mover is immediately lost
    balance -= SEE_PIECE_VALUES[next_victim];
    if balance >= 0 {
        return true;
    }

    let diag_sliders = board.diag_sliders();
    let ortho_sliders = board.ortho_sliders();

    let mut occupied = (board.occupied() ^ from.bitboard()) | to.bitboard();
    if m.is_en_passant() {
        if let Some(ep) = board.ep_square {
            occupied ^= ep.bitboard();
        }
    }

    let mut attackers = board.attackers_to(to, occupied) & occupied;
    let mut color = !board.stm;

    loop {
        let my_attackers = attackers & board.color_bb(color);
        if my_attackers.is_empty() {
            break;
        }

        // Cheapest attacker recaptures
        for kind in PieceKind::iter() {
            next_victim = kind;
            if (my_attackers & board.kind_bb(kind)).any() {
                break;
            }
        }
        occupied ^= (my_attackers & board.kind_bb(next_victim)).lsb().bitboard();

        // A vacated square can reveal a slider behind the captor
        if matches!(next_victim, PieceKind::Pawn | PieceKind::Bishop | PieceKind::Queen) {
            attackers |= bishop_attacks(to, occupied) & diag_sliders;
        }
        if matches!(next_victim, PieceKind::Rook | PieceKind::Queen) {
            attackers |= rook_attacks(to, occupied) & ortho_sliders;
        }
        attackers &= occupied;

        color = !color;
        balance = -balance - 1 - SEE_PIECE_VALUES[next_victim];

        if balance >= 0 {
            // A king "recapture" into remaining enemy attackers is illegal,
            // so the side that tried it is actually the loser
            if next_victim == PieceKind::King && (attackers & board.color_bb(color)).any() {
                color = !color;
            }
            break;
        }
    }

    // The side left without a viable recapture loses the exchange
    board.stm != color
}
