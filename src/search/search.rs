use crate::board::board::Board;
use crate::eval::evaluate;
use crate::moves::chess_move::Move;
use crate::moves::picker::{MovePicker, Stage};
use crate::search::lmr_reduction;
use crate::search::params::*;
use crate::search::quiescence::qsearch;
use crate::search::see::{best_tactical_move_value, static_exchange_eval};
use crate::search::thread::ThreadData;
use crate::search::PVariation;
use crate::syzygy::{self, TbResult};
use crate::transposition::{Bound, TtEntry};
use crate::types::pieces::Piece;

/// Alpha-beta negamax. `PV_NODE` tracks whether the window is wider than a
/// null window; the root is always a PV node. Returns a fail-soft score,
/// or garbage once `td.stopped` is set — callers discard the iteration.
pub fn search<const PV_NODE: bool>(
    td: &mut ThreadData,
    board: &Board,
    pv: &mut PVariation,
    mut alpha: i32,
    beta: i32,
    mut depth: i32,
) -> i32 {
    let root = td.ply == 0;
    let in_check = board.in_check();
    pv.clear();

    debug_assert!(alpha < beta);
    debug_assert!(PV_NODE || alpha == beta - 1);

    // Quiet positions at the horizon resolve tactics in quiescence
    if depth <= 0 && !in_check {
        return qsearch(td, board, pv, alpha, beta);
    }
    depth = depth.max(0);

    td.nodes.increment();
    if !root {
        td.seldepth = td.seldepth.max(td.ply);
    }

    if td.should_stop() {
        return 0;
    }

    let ply = td.ply;

    if !root {
        // Draws score zero no matter whose move it is
        if board.is_draw() || td.is_repetition(board) {
            return 0;
        }

        if ply >= MAX_PLY {
            return evaluate(board, &mut td.pawn_cache);
        }

        // Mate distance pruning: even a forced mate from here cannot beat
        // a shorter one already found above us
        let r_alpha = alpha.max(-MATE + ply);
        let r_beta = beta.min(MATE - ply - 1);
        if r_alpha >= r_beta {
            return r_alpha;
        }
    }

    let entry = td.shared.tt.probe(board.hash, ply);
    if let Some(e) = entry {
        if e.depth >= depth
            && (depth == 0 || !PV_NODE)
            && (e.bound == Bound::Exact
                || (e.bound.lower() && e.value >= beta)
                || (e.bound.upper() && e.value <= alpha))
        {
            return e.value;
        }
    }

    if !root {
        match syzygy::probe_wdl(board, depth, ply) {
            TbResult::Failed => {}
            result => {
                td.tbhits += 1;
                let (value, bound) = match result {
                    TbResult::Loss => (-MATE + MAX_PLY + ply + 1, Bound::Upper),
                    TbResult::Win => (MATE - MAX_PLY - ply - 1, Bound::Lower),
                    _ => (0, Bound::Exact),
                };
                let cuts = bound == Bound::Exact
                    || (bound == Bound::Lower && value >= beta)
                    || (bound == Bound::Upper && value <= alpha);
                if cuts {
                    td.shared.tt.store(board.hash, Move::NONE, value, value, MAX_PLY - 1, bound, ply);
                    return value;
                }
            }
        }
    }

    let eval = match entry {
        Some(e) => e.eval,
        None => evaluate(board, &mut td.pawn_cache),
    };
    td.stack[ply].static_eval = eval;

    let futility_margin = eval + FUTILITY_MARGIN * depth;
    let see_margin = [SEE_NOISY_MARGIN * depth * depth, SEE_QUIET_MARGIN * depth];
    let improving = ply >= 2 && eval > td.stack[ply - 2].static_eval;
    td.stack[ply + 1].killers = [Move::NONE; 2];

    // Razoring: a hopeless static eval at the frontier drops straight into
    // quiescence
    if !PV_NODE && !in_check && depth <= RAZOR_DEPTH && eval + RAZOR_MARGIN < alpha {
        return qsearch(td, board, pv, alpha, beta);
    }

    // Reverse futility: comfortably over beta with depth nearly spent
    if !PV_NODE && !in_check && depth <= BETA_PRUNING_DEPTH && eval - BETA_MARGIN * depth > beta {
        return eval;
    }

    // Null move pruning: hand over the move; if a reduced search still
    // clears beta, a real move surely would. Requires real material and no
    // consecutive nulls, and the TT must not suggest a fail-low.
    if !PV_NODE
        && !in_check
        && depth >= NULL_MOVE_PRUNING_DEPTH
        && eval >= beta
        && board.has_non_pawn_material(board.stm)
        && td.stack.played(ply - 1) != Move::NULL
        && td.stack.played(ply - 2) != Move::NULL
        && entry.map_or(true, |e| e.bound != Bound::Upper || e.value >= beta)
    {
        let r = 4 + depth / 6 + ((eval - beta) / 200).min(3);

        let mut child = *board;
        child.make_null_move();
        td.stack[ply].played = Move::NULL;
        td.stack[ply].moved = Piece::None;
        td.ply += 1;
        td.hash_history.push(child.hash);

        let mut lpv = PVariation::default();
        let value = -search::<false>(td, &child, &mut lpv, -beta, -beta + 1, depth - r);

        td.hash_history.pop();
        td.ply -= 1;

        if td.stopped {
            return 0;
        }
        if value >= beta {
            return beta;
        }
    }

    // Probcut: when even a quick tactic would sail over a raised beta, try
    // the good captures at reduced depth and trust a confirming result
    if !PV_NODE
        && depth >= PROBCUT_DEPTH
        && beta.abs() < MATE_IN_MAX
        && eval + best_tactical_move_value(board) >= beta + PROBCUT_MARGIN
    {
        let r_beta = (beta + PROBCUT_MARGIN).min(MATE - MAX_PLY - 1);
        let mut mp = MovePicker::new_noisy(r_beta - eval);
        loop {
            let m = mp.next(board, &td.history, &td.stack, ply, true);
            if m == Move::NONE {
                break;
            }
            let mut child = *board;
            if !child.make_move(m) {
                continue;
            }
            td.stack[ply].played = m;
            td.stack[ply].moved = board.piece_at(m.from());
            td.ply += 1;
            td.hash_history.push(child.hash);

            let mut lpv = PVariation::default();
            let value = -search::<false>(td, &child, &mut lpv, -r_beta, -r_beta + 1, depth - 4);

            td.hash_history.pop();
            td.ply -= 1;

            if td.stopped {
                return 0;
            }
            if value >= r_beta {
                return value;
            }
        }
    }

    let tt_move = entry.map_or(Move::NONE, |e| e.m);
    let killers = td.stack[ply].killers;
    let counter = td.history.counter_move(&td.stack, ply);
    let mut mp = MovePicker::new(tt_move, killers, counter);

    let old_alpha = alpha;
    let mut best = -MATE;
    let mut best_move = Move::NONE;
    let mut played = 0;
    let mut skip_quiets = false;
    let mut quiets_tried: Vec<Move> = Vec::new();

    loop {
        let m = mp.next(board, &td.history, &td.stack, ply, skip_quiets);
        if m == Move::NONE {
            break;
        }

        let is_quiet = !board.is_tactical(m);
        let (hist, cm_hist, fm_hist) = if is_quiet {
            quiets_tried.push(m);
            td.history.quiet_histories(board, &td.stack, ply, m)
        } else {
            (0, 0, 0)
        };

        // Quiet-move pruning, suspended while we are still getting mated
        if is_quiet && best > MATED_IN_MAX {
            let imp = improving as usize;

            if futility_margin <= alpha
                && depth <= FUTILITY_PRUNING_DEPTH
                && hist + cm_hist + fm_hist < FUTILITY_PRUNING_HISTORY_LIMIT[imp]
            {
                skip_quiets = true;
            }

            if depth <= LATE_MOVE_PRUNING_DEPTH
                && quiets_tried.len() as i32 >= LATE_MOVE_PRUNING_COUNTS[imp][depth as usize]
            {
                skip_quiets = true;
            }

            if depth <= COUNTER_MOVE_PRUNING_DEPTH[imp] && cm_hist < COUNTER_MOVE_HISTORY_LIMIT[imp] {
                continue;
            }
            if depth <= FOLLOW_UP_MOVE_PRUNING_DEPTH[imp] && fm_hist < FOLLOW_UP_MOVE_HISTORY_LIMIT[imp] {
                continue;
            }
        }

        // Weed out moves that lose material once the picker is past the
        // winning captures
        if best > MATED_IN_MAX
            && depth <= SEE_PRUNING_DEPTH
            && mp.stage > Stage::GoodNoisy
            && !static_exchange_eval(board, m, see_margin[is_quiet as usize])
        {
            continue;
        }

        let mut child = *board;
        if !child.make_move(m) {
            continue;
        }
        played += 1;

        // Late move reductions for quiets picked well down the list
        let r = if is_quiet && depth > 2 && played > 1 {
            let mut r = lmr_reduction(depth, played);
            r += i32::from(!PV_NODE);
            r += i32::from(!improving);
            r -= i32::from(m == mp.killer1 || m == mp.killer2 || m == mp.counter);
            r -= ((hist + cm_hist + fm_hist) / 5000).clamp(-2, 2);
            r.clamp(1, depth - 1)
        } else {
            1
        };

        // A TT move whose stored bound proves real depth may be the only
        // good move here; verify and extend it
        let singular = !root
            && depth >= 8
            && m == tt_move
            && entry.map_or(false, |e| e.depth >= depth - 2 && e.bound.lower());

        let extend = in_check
            || (is_quiet
                && quiets_tried.len() <= 4
                && cm_hist >= CONT_EXTENSION_LIMIT
                && fm_hist >= CONT_EXTENSION_LIMIT)
            || (singular && move_is_singular(td, board, &entry.expect("singular implies a tt entry"), depth));
        if td.stopped {
            return 0;
        }

        let new_depth = depth + i32::from(!root && extend);

        td.stack[ply].played = m;
        td.stack[ply].moved = board.piece_at(m.from());
        td.ply += 1;
        td.hash_history.push(child.hash);

        // Principal variation search: reduced null window first, then a
        // full-depth null window, and only a PV re-search when the move
        // genuinely raises alpha
        let mut lpv = PVariation::default();
        let mut value = 0;

        if r != 1 {
            value = -search::<false>(td, &child, &mut lpv, -alpha - 1, -alpha, new_depth - r);
        }
        if (r != 1 && value > alpha) || (r == 1 && !(PV_NODE && played == 1)) {
            value = -search::<false>(td, &child, &mut lpv, -alpha - 1, -alpha, new_depth - 1);
        }
        if PV_NODE && (played == 1 || value > alpha) {
            value = -search::<true>(td, &child, &mut lpv, -beta, -alpha, new_depth - 1);
        }

        td.hash_history.pop();
        td.ply -= 1;

        if td.stopped {
            return 0;
        }

        if value > best {
            best = value;
            best_move = m;
            if value > alpha {
                alpha = value;
                if PV_NODE {
                    pv.load(m, &lpv);
                }
                if alpha >= beta {
                    break;
                }
            }
        }
    }

    // No legal move: mate if attacked, stalemate otherwise
    if played == 0 {
        return if in_check { -MATE + ply } else { 0 };
    }

    // A quiet cutoff feeds the killer, counter and history tables
    if best >= beta && !board.is_tactical(best_move) {
        let killers = &mut td.stack[ply].killers;
        if killers[0] != best_move {
            killers[1] = killers[0];
            killers[0] = best_move;
        }
        td.history.update_quiets(board, &td.stack, ply, depth * depth, best_move, &quiets_tried);
    }

    let bound = if best >= beta {
        Bound::Lower
    } else if best > old_alpha {
        Bound::Exact
    } else {
        Bound::Upper
    };
    td.shared.tt.store(board.hash, best_move, best, eval, depth, bound, ply);

    best
}

/// Verifies that the TT move stands alone: every alternative is searched
/// with a null window just below the TT score at half depth, and if none
/// gets close the TT move is singular. Runs on the position *before* the
/// TT move; the caller's board is never touched.
fn move_is_singular(td: &mut ThreadData, board: &Board, entry: &TtEntry, depth: i32) -> bool {
    let r_beta = (entry.value - depth).max(-MATE);
    let probe_depth = (depth / 2 - 1).max(0);
    let ply = td.ply;

    let mut mp = MovePicker::new(Move::NONE, [Move::NONE; 2], Move::NONE);
    loop {
        let m = mp.next(board, &td.history, &td.stack, ply, false);
        if m == Move::NONE {
            break;
        }
        if m == entry.m {
            continue;
        }

        let mut child = *board;
        if !child.make_move(m) {
            continue;
        }
        td.stack[ply].played = m;
        td.stack[ply].moved = board.piece_at(m.from());
        td.ply += 1;
        td.hash_history.push(child.hash);

        let mut lpv = PVariation::default();
        let value = -search::<false>(td, &child, &mut lpv, -r_beta - 1, -r_beta, probe_depth);

        td.hash_history.pop();
        td.ply -= 1;

        if td.stopped {
            return false;
        }
        // Some other move reaches the same neighborhood: not singular
        if value > r_beta {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod search_tests {
    use std::sync::atomic::{AtomicBool, AtomicU64};

    use super::*;
    use crate::board::fen::parse_fen;
    use crate::eval::pawns::PawnKingCache;
    use crate::search::history::HistoryTable;
    use crate::search::thread::{LimitKind, Limits, SearchShared};
    use crate::search::{init_reductions, SearchStack};
    use crate::transposition::TranspositionTable;

    struct Harness {
        tt: TranspositionTable,
        nodes: AtomicU64,
        abort: AtomicBool,
        pondering: AtomicBool,
        limits: Limits,
    }

    impl Harness {
        fn new() -> Harness {
            init_reductions();
            Harness {
                tt: TranspositionTable::new(1),
                nodes: AtomicU64::new(0),
                abort: AtomicBool::new(false),
                pondering: AtomicBool::new(false),
                limits: Limits { kind: LimitKind::Infinite },
            }
        }

        fn thread(&self, board: &Board) -> ThreadData<'_> {
            ThreadData::new(
                0,
                SearchShared {
                    tt: &self.tt,
                    abort: &self.abort,
                    pondering: &self.pondering,
                    limits: &self.limits,
                },
                &self.nodes,
                vec![board.hash],
                HistoryTable::default(),
                PawnKingCache::default(),
            )
        }
    }

    fn run(fen: &str, depth: i32) -> (i32, PVariation) {
        let harness = Harness::new();
        let board = parse_fen(fen).unwrap();
        let mut td = harness.thread(&board);
        td.depth = depth;
        let mut pv = PVariation::default();
        let value = search::<true>(&mut td, &board, &mut pv, -MATE, MATE, depth);
        (value, pv)
    }

    #[test]
    fn finds_mate_in_one() {
        let (value, pv) = run("6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1", 3);
        assert_eq!(value, MATE - 1);
        assert_eq!(pv.best().to_uci(), "a1a8");
    }

    #[test]
    fn sees_a_mate_in_two() {
        // Two rooks roll the ladder: Rb7+ then Ra8#
        let (value, _) = run("6k1/8/8/8/8/8/RR6/4K3 w - - 0 1", 6);
        assert_eq!(value, MATE - 3);
    }

    #[test]
    fn stalemate_scores_zero_with_empty_pv() {
        let (value, pv) = run("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", 5);
        assert_eq!(value, 0);
        assert_eq!(pv.best(), Move::NONE);
    }

    #[test]
    fn hanging_queen_gets_captured() {
        // Black queen en prise to the rook
        let (value, pv) = run("4k3/8/8/3q4/8/8/8/3RK3 w - - 0 1", 5);
        assert!(value > 400);
        assert_eq!(pv.best().to_uci(), "d1d5");
    }

    #[test]
    fn mated_side_reports_negative_mate_distance() {
        // Black to move, already mated next move whatever happens
        let (value, _) = run("R5k1/5ppp/8/8/8/8/8/1R2K3 b - - 0 1", 6);
        assert!(value <= -MATE + 10, "value {value} should be a mated score");
    }

    #[test]
    fn search_respects_the_stop_flag() {
        let harness = Harness::new();
        let board = parse_fen("r1bqkbnr/pppppppp/2n5/8/8/5N2/PPPPPPPP/RNBQKB1R w KQkq - 0 1").unwrap();
        let mut td = harness.thread(&board);
        td.depth = 9;
        td.stopped = true;
        let mut pv = PVariation::default();
        let value = search::<true>(&mut td, &board, &mut pv, -MATE, MATE, 9);
        assert_eq!(value, 0);
        assert_eq!(td.ply, 0);
    }

    #[test]
    fn draw_by_repetition_is_seen_inside_the_tree() {
        let board = parse_fen("4k3/8/8/8/8/8/8/4K2R w - - 0 1").unwrap();
        let harness = Harness::new();
        let mut td = harness.thread(&board);
        // Fake a history where the current position already occurred
        td.hash_history = vec![board.hash, 1, board.hash];
        // halfmove_clock is 0 in the FEN, so bump it so the scan looks back
        let mut b2 = board;
        b2.halfmove_clock = 8;
        assert!(td.is_repetition(&b2));
    }

    #[test]
    fn tt_cutoffs_respect_stored_depth() {
        let harness = Harness::new();
        let board = parse_fen("4k3/8/8/3q4/8/8/8/3RK3 w - - 0 1").unwrap();

        // Plant a deep exact entry, then search shallow with a null window:
        // the stored value must come straight back
        harness.tt.store(board.hash, Move::NONE, 777, 50, 30, Bound::Exact, 0);
        let mut td = harness.thread(&board);
        td.depth = 2;
        let mut pv = PVariation::default();
        let value = search::<false>(&mut td, &board, &mut pv, 700, 701, 2);
        assert_eq!(value, 777);
    }

    #[test]
    fn quiet_cutoff_installs_a_killer() {
        let harness = Harness::new();
        // A quiet-ish middlegame position
        let board = parse_fen("r1bqkb1r/pppp1ppp/2n2n2/4p3/4P3/2N2N2/PPPP1PPP/R1BQKB1R w KQkq - 4 4").unwrap();
        let mut td = harness.thread(&board);
        td.depth = 5;
        let mut pv = PVariation::default();
        let _ = search::<true>(&mut td, &board, &mut pv, -MATE, MATE, 5);
        // Somewhere in the tree a quiet cutoff must have stored a killer
        let any_killer = (0..10).any(|ply| td.stack[ply].killers[0] != Move::NONE);
        assert!(any_killer);
    }
}
