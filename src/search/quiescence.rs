use crate::board::board::Board;
use crate::eval::evaluate;
use crate::moves::chess_move::Move;
use crate::moves::picker::MovePicker;
use crate::search::params::{MAX_PLY, QFUTILITY_MARGIN, QSEE_MARGIN};
use crate::search::see::best_tactical_move_value;
use crate::search::thread::ThreadData;
use crate::search::PVariation;
use crate::transposition::Bound;

/// Tactical-only search run below the main horizon. Recurses on captures
/// and promotions until the position quiets down, with the static eval as a
/// stand-pat floor. Makes no PV/non-PV distinction and never writes the
/// transposition table.
pub fn qsearch(td: &mut ThreadData, board: &Board, pv: &mut PVariation, mut alpha: i32, beta: i32) -> i32 {
    pv.clear();

    td.nodes.increment();
    td.seldepth = td.seldepth.max(td.ply);

    if td.should_stop() {
        return 0;
    }

    if board.is_draw() || td.is_repetition(board) {
        return 0;
    }

    if td.ply >= MAX_PLY {
        return evaluate(board, &mut td.pawn_cache);
    }

    // Same cutoff rules as the main search, minus the depth requirement
    let entry = td.shared.tt.probe(board.hash, td.ply);
    if let Some(e) = entry {
        if e.bound == Bound::Exact
            || (e.bound.lower() && e.value >= beta)
            || (e.bound.upper() && e.value <= alpha)
        {
            return e.value;
        }
    }

    // Stand pat: doing nothing is always an option when not forced
    let eval = match entry {
        Some(e) => e.eval,
        None => evaluate(board, &mut td.pawn_cache),
    };
    let mut best = eval;
    alpha = alpha.max(eval);
    if alpha >= beta {
        return eval;
    }

    // Delta pruning: not even the juiciest tactic on the board could lift
    // the stand pat back to alpha
    if best_tactical_move_value(board) < alpha - eval - QFUTILITY_MARGIN {
        return eval;
    }

    // Only captures that stand to gain enough are worth trying
    let threshold = QSEE_MARGIN.max(alpha - eval - QFUTILITY_MARGIN);
    let mut mp = MovePicker::new_noisy(threshold);
    let mut lpv = PVariation::default();

    loop {
        let m = mp.next(board, &td.history, &td.stack, td.ply, true);
        if m == Move::NONE {
            break;
        }

        let mut child = *board;
        if !child.make_move(m) {
            continue;
        }
        let ply = td.ply;
        td.stack[ply].played = m;
        td.stack[ply].moved = board.piece_at(m.from());
        td.ply += 1;
        td.hash_history.push(child.hash);

        let value = -qsearch(td, &child, &mut lpv, -beta, -alpha);

        td.hash_history.pop();
        td.ply -= 1;

        if td.stopped {
            return 0;
        }

        if value > best {
            best = value;
            if value > alpha {
                alpha = value;
                pv.load(m, &lpv);
            }
            if alpha >= beta {
                break;
            }
        }
    }

    best
}

#[cfg(test)]
mod qsearch_tests {
    use std::sync::atomic::{AtomicBool, AtomicU64};

    use super::*;
    use crate::board::fen::parse_fen;
    use crate::eval::pawns::PawnKingCache;
    use crate::search::history::HistoryTable;
    use crate::search::params::MATE;
    use crate::search::thread::{LimitKind, Limits, SearchShared};
    use crate::transposition::TranspositionTable;

    fn run(fen: &str, alpha: i32, beta: i32) -> i32 {
        let tt = TranspositionTable::new(1);
        let nodes = AtomicU64::new(0);
        let abort = AtomicBool::new(false);
        let pondering = AtomicBool::new(false);
        let limits = Limits { kind: LimitKind::Infinite };
        let board = parse_fen(fen).unwrap();
        let mut td = ThreadData::new(
            0,
            SearchShared { tt: &tt, abort: &abort, pondering: &pondering, limits: &limits },
            &nodes,
            vec![board.hash],
            HistoryTable::default(),
            PawnKingCache::default(),
        );
        let mut pv = PVariation::default();
        qsearch(&mut td, &board, &mut pv, alpha, beta)
    }

    #[test]
    fn quiet_position_returns_the_stand_pat() {
        // No tactics: score is the static eval, clearly material-flavored
        let value = run("4k3/8/8/8/8/8/8/R3K3 w - - 0 1", -MATE, MATE);
        assert!(value > 300);
    }

    #[test]
    fn wins_the_hanging_piece() {
        // Rook takes an undefended queen and keeps the rook
        let value = run("4k3/8/8/3q4/8/8/8/3RK3 w - - 0 1", -MATE, MATE);
        assert!(value > 400);
    }

    #[test]
    fn declines_a_losing_recapture_chain() {
        // The only capture loses the queen for a pawn; stand pat instead
        let quiet = run("4k3/2p5/3p4/8/3Q4/8/8/4K3 w - - 0 1", -MATE, MATE);
        let no_capture = run("4k3/2p5/3p4/8/8/3Q4/8/4K3 w - - 0 1", -MATE, MATE);
        // Both sit on roughly the same material; neither loses the queen
        assert!((quiet - no_capture).abs() < 200);
        assert!(quiet > 500);
    }

    #[test]
    fn respects_a_fail_high_window() {
        // Stand pat alone beats beta in a won position
        let value = run("4k3/8/8/3q4/8/8/8/3RK3 w - - 0 1", 10, 11);
        assert!(value >= 11);
    }
}
