use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crate::board::board::Board;
use crate::eval::pawns::PawnKingCache;
use crate::moves::chess_move::Move;
use crate::search::history::HistoryTable;
use crate::search::params::{
    MATE, MAX_PLY, SKIP_DEPTHS, SKIP_SIZE, SMP_CYCLES, WINDOW_DEPTH, WINDOW_SIZE, WINDOW_TIMER_MS,
};
use crate::search::search::search;
use crate::search::time::TimeManager;
use crate::search::{init_reductions, PVariation, SearchStack};
use crate::syzygy;
use crate::transposition::TranspositionTable;
use crate::uci::{uci_report, ReportBound};

/// What the current `go` is bounded by.
#[derive(Clone, Copy, Debug)]
pub enum LimitKind {
    /// We manage our own clock from the remaining time and increment.
    Clock { time_ms: u64, inc_ms: u64, moves_to_go: Option<u32> },
    /// Exact time per move.
    MoveTime(u64),
    Depth(i32),
    Nodes(u64),
    Infinite,
}

#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub kind: LimitKind,
}

/// Results of the deepening loop, written only by the main worker. One slot
/// per completed depth; `depth` marks the deepest finished iteration, and
/// the answer to `go` is always read from that slot.
pub struct SearchInfo {
    pub depth: usize,
    pub values: [i32; MAX_PLY as usize],
    pub best_moves: [Move; MAX_PLY as usize],
    pub ponder_moves: [Move; MAX_PLY as usize],
}

impl Default for SearchInfo {
    fn default() -> Self {
        SearchInfo {
            depth: 0,
            values: [0; MAX_PLY as usize],
            best_moves: [Move::NONE; MAX_PLY as usize],
            ponder_moves: [Move::NONE; MAX_PLY as usize],
        }
    }
}

/// Node counter that batches into a pool-wide atomic so node limits and NPS
/// reports see every worker without per-node contention.
pub struct NodeCounter<'a> {
    global: &'a AtomicU64,
    local: u64,
    batch: u64,
}

const FLUSH_EVERY: u64 = 1024;

impl<'a> NodeCounter<'a> {
    pub fn new(global: &'a AtomicU64) -> Self {
        NodeCounter { global, local: 0, batch: 0 }
    }

    pub fn increment(&mut self) {
        self.batch += 1;
        if self.batch >= FLUSH_EVERY {
            self.local += self.batch;
            self.global.fetch_add(self.batch, Ordering::Relaxed);
            self.batch = 0;
        }
    }

    /// True right after a flush; expensive stop checks hide behind this.
    pub fn at_boundary(&self) -> bool {
        self.batch == 0
    }

    pub fn global_count(&self) -> u64 {
        self.global.load(Ordering::Relaxed) + self.batch
    }
}

/// Flags and the transposition table every worker shares. Everything else
/// in the search is thread-local.
#[derive(Clone, Copy)]
pub struct SearchShared<'a> {
    pub tt: &'a TranspositionTable,
    pub abort: &'a AtomicBool,
    pub pondering: &'a AtomicBool,
    pub limits: &'a Limits,
}

/// Per-worker search state. Worker 0 is the main thread: it owns the clock,
/// reports to the GUI, and decides when everyone stops.
pub struct ThreadData<'a> {
    pub index: usize,
    /// Depth of the iteration currently being searched.
    pub depth: i32,
    pub seldepth: i32,
    pub ply: i32,
    /// Result of the last completed iteration.
    pub value: i32,
    /// Set once this worker has observed an abort; everything unwinds.
    pub stopped: bool,
    pub tbhits: u64,
    pub nodes: NodeCounter<'a>,
    pub stack: SearchStack,
    pub history: HistoryTable,
    pub pawn_cache: PawnKingCache,
    pub hash_history: Vec<u64>,
    pub time_manager: Option<TimeManager>,
    pub shared: SearchShared<'a>,
}

impl<'a> ThreadData<'a> {
    pub fn new(
        index: usize,
        shared: SearchShared<'a>,
        global_nodes: &'a AtomicU64,
        hash_history: Vec<u64>,
        history: HistoryTable,
        pawn_cache: PawnKingCache,
    ) -> Self {
        ThreadData {
            index,
            depth: 0,
            seldepth: 0,
            ply: 0,
            value: 0,
            stopped: false,
            tbhits: 0,
            nodes: NodeCounter::new(global_nodes),
            stack: SearchStack::default(),
            history,
            pawn_cache,
            hash_history,
            time_manager: None,
            shared,
        }
    }

    pub fn main_thread(&self) -> bool {
        self.index == 0
    }

    /// Twofold repetition against the game-plus-search history, scanning no
    /// further back than the last irreversible move.
    pub fn is_repetition(&self, board: &Board) -> bool {
        self.hash_history
            .iter()
            .rev()
            .skip(1)
            .take(board.halfmove_clock as usize)
            .any(|&hash| hash == board.hash)
    }

    /// Early-termination predicate, evaluated at every search entry.
    /// Pondering suppresses everything; helpers only honor the node limit.
    fn terminate_search_early(&self) -> bool {
        if self.shared.pondering.load(Ordering::Acquire) {
            return false;
        }
        if let LimitKind::Nodes(limit) = self.shared.limits.kind {
            if self.nodes.global_count() >= limit {
                return true;
            }
        }
        if !self.main_thread() {
            return false;
        }
        match (&self.time_manager, self.shared.limits.kind) {
            (Some(tm), LimitKind::MoveTime(ms)) => tm.elapsed() >= ms,
            (Some(tm), LimitKind::Clock { .. }) => tm.out_of_time(),
            _ => false,
        }
    }

    /// Cooperative abort check at every search and quiescence entry. Depth
    /// one always runs to completion so a move is available.
    pub fn should_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        if self.depth > 1 && self.shared.abort.load(Ordering::Acquire) {
            self.stopped = true;
        } else if self.depth > 1 && self.nodes.at_boundary() && self.terminate_search_early() {
            self.stopped = true;
        }
        self.stopped
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.time_manager.as_ref().map_or(0, TimeManager::elapsed)
    }
}

/// Per-worker deepening loop. Helpers skip depths on a fixed rotation so
/// the pool explores different horizons against the same shared table.
pub fn iterative_deepening(td: &mut ThreadData, board: &Board, mut info: Option<&mut SearchInfo>) {
    for depth in 1..MAX_PLY {
        if td.index > 0 {
            let cycle = (td.index - 1) % SMP_CYCLES;
            if ((depth + SKIP_DEPTHS[cycle]) / SKIP_SIZE[cycle]) % 2 == 1 {
                continue;
            }
        }

        td.depth = depth;
        td.seldepth = 0;
        let last_value = td.value;
        let mut pv = PVariation::default();
        let value = aspiration_window(td, board, &mut pv, depth, last_value, info.as_deref_mut());

        // An aborted iteration is discarded wholesale
        if td.stopped {
            break;
        }
        td.value = value;

        if let Some(info) = info.as_deref_mut() {
            info.depth = depth as usize;
            info.values[depth as usize] = value;
            info.best_moves[depth as usize] = pv.best();
            info.ponder_moves[depth as usize] = pv.ponder().unwrap_or(Move::NONE);

            uci_report(td, value, ReportBound::Exact, &pv);

            if let Some(tm) = td.time_manager.as_mut() {
                tm.update(pv.best());
            }

            let pondering = td.shared.pondering.load(Ordering::Acquire);
            let done = match td.shared.limits.kind {
                LimitKind::Depth(limit) => depth >= limit,
                LimitKind::Nodes(limit) => td.nodes.global_count() >= limit,
                LimitKind::MoveTime(ms) => !pondering && td.elapsed_ms() >= ms,
                LimitKind::Clock { .. } => {
                    let tm = td.time_manager.as_ref().expect("main thread owns the clock");
                    !pondering && (tm.should_stop_iterating() || tm.out_of_time())
                }
                LimitKind::Infinite => false,
            };
            if done {
                break;
            }
        } else if td.shared.abort.load(Ordering::Acquire) {
            break;
        }
    }
}

/// Re-search loop around a window centered on the previous iteration.
fn aspiration_window(
    td: &mut ThreadData,
    board: &Board,
    pv: &mut PVariation,
    depth: i32,
    last_value: i32,
    mut info: Option<&mut SearchInfo>,
) -> i32 {
    let mut alpha = -MATE;
    let mut beta = MATE;
    let mut delta = WINDOW_SIZE;

    if depth >= WINDOW_DEPTH {
        alpha = (last_value - delta).max(-MATE);
        beta = (last_value + delta).min(MATE);
    }

    loop {
        td.ply = 0;
        let value = search::<true>(td, board, pv, alpha, beta, depth.max(1));
        if td.stopped {
            return value;
        }

        // Strictly inside the window means the score is exact. A window
        // edge already clamped at the mate bound cannot fail any further,
        // so results on it are exact too (a mated root scores -MATE).
        if (value > alpha || alpha == -MATE) && (value < beta || beta == MATE) {
            return value;
        }

        // Keep the GUI in the loop during long re-search storms
        if info.as_deref_mut().is_some() && td.elapsed_ms() as u128 >= WINDOW_TIMER_MS {
            let bound = if value <= alpha { ReportBound::Upper } else { ReportBound::Lower };
            uci_report(td, value, bound, pv);
        }

        if value <= alpha {
            beta = (alpha + beta) / 2;
            alpha = (alpha - delta).max(-MATE);
        } else {
            beta = (beta + delta).min(MATE);
        }
        delta += delta / 2;
    }
}

/// Lazy SMP pool: one main worker plus helpers, sharing only the table and
/// the two flags. Histories persist across searches per worker slot.
pub struct ThreadPool {
    pub tt: TranspositionTable,
    abort: Arc<AtomicBool>,
    pondering: Arc<AtomicBool>,
    nodes: AtomicU64,
    nthreads: usize,
    heuristics: Vec<(HistoryTable, PawnKingCache)>,
}

impl ThreadPool {
    pub fn new(tt_megabytes: usize) -> ThreadPool {
        init_reductions();
        ThreadPool {
            tt: TranspositionTable::new(tt_megabytes),
            abort: Arc::new(AtomicBool::new(false)),
            pondering: Arc::new(AtomicBool::new(false)),
            nodes: AtomicU64::new(0),
            nthreads: 1,
            heuristics: vec![Default::default()],
        }
    }

    /// Handles the UCI front end keeps while a search is in flight, so
    /// `stop` and `ponderhit` need no borrow of the pool itself.
    pub fn control_handles(&self) -> (Arc<AtomicBool>, Arc<AtomicBool>) {
        (Arc::clone(&self.abort), Arc::clone(&self.pondering))
    }

    pub fn set_threads(&mut self, n: usize) {
        self.nthreads = n.max(1);
        self.heuristics.resize_with(self.nthreads, Default::default);
    }

    pub fn set_hash(&mut self, megabytes: usize) {
        self.tt = TranspositionTable::new(megabytes.max(1));
    }

    pub fn new_game(&mut self) {
        self.tt.clear();
        for slot in &mut self.heuristics {
            *slot = Default::default();
        }
    }

    /// Request a cooperative stop; observed at the next search entries.
    pub fn stop(&self) {
        self.abort.store(true, Ordering::Release);
    }

    pub fn node_count(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    /// Runs a full search and returns (best, ponder). Blocks until the main
    /// worker decides to stop; helpers are signalled and joined before
    /// returning.
    pub fn search(&mut self, board: &Board, limits: &Limits, game_history: &[u64], ponder: bool) -> (Move, Option<Move>) {
        self.abort.store(false, Ordering::Release);
        self.pondering.store(ponder, Ordering::Release);
        self.nodes.store(0, Ordering::Relaxed);
        self.tt.increment_generation();

        // A tablebase root hit answers instantly, with nothing to ponder
        if let Some(best) = syzygy::probe_dtz(board) {
            return (best, None);
        }

        let mut info = SearchInfo::default();
        let abort: &AtomicBool = &self.abort;
        let pondering: &AtomicBool = &self.pondering;
        let shared = SearchShared { tt: &self.tt, abort, pondering, limits };
        let nodes = &self.nodes;

        let (main_slot, helper_slots) = self.heuristics.split_at_mut(1);

        thread::scope(|scope| {
            for (offset, slot) in helper_slots.iter_mut().enumerate() {
                let history = std::mem::take(&mut slot.0);
                let pawn_cache = std::mem::take(&mut slot.1);
                scope.spawn(move || {
                    let mut td = ThreadData::new(
                        offset + 1,
                        shared,
                        nodes,
                        game_history.to_vec(),
                        history,
                        pawn_cache,
                    );
                    iterative_deepening(&mut td, board, None);
                    *slot = (td.history, td.pawn_cache);
                });
            }

            let mut td = ThreadData::new(
                0,
                shared,
                nodes,
                game_history.to_vec(),
                std::mem::take(&mut main_slot[0].0),
                std::mem::take(&mut main_slot[0].1),
            );
            td.time_manager = Some(TimeManager::new(limits));
            iterative_deepening(&mut td, board, Some(&mut info));

            // Main is done: release the helpers, the scope joins them
            abort.store(true, Ordering::Release);
            main_slot[0] = (td.history, td.pawn_cache);
        });

        let best = info.best_moves[info.depth];
        let ponder_move = info.ponder_moves[info.depth];
        (best, if ponder_move.is_some() { Some(ponder_move) } else { None })
    }
}

#[cfg(test)]
mod thread_tests {
    use super::*;
    use crate::board::fen::{parse_fen, STARTPOS};
    use crate::moves::chess_move::MoveKind;

    fn quick_limits(depth: i32) -> Limits {
        Limits { kind: LimitKind::Depth(depth) }
    }

    #[test]
    fn depth_limited_search_returns_a_move() {
        let board = parse_fen(STARTPOS).unwrap();
        let mut pool = ThreadPool::new(2);
        let (best, _) = pool.search(&board, &quick_limits(4), &[board.hash], false);
        assert!(best.is_some());
        assert!(board.is_pseudo_legal(best));
    }

    #[test]
    fn stalemate_yields_no_move_and_a_draw_score() {
        let board = parse_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let mut pool = ThreadPool::new(1);
        let (best, ponder) = pool.search(&board, &quick_limits(5), &[board.hash], false);
        assert_eq!(best, Move::NONE);
        assert_eq!(ponder, None);
    }

    fn run_to_depth(fen: &str, depth: i32) -> SearchInfo {
        let board = parse_fen(fen).unwrap();
        let tt = TranspositionTable::new(1);
        let nodes = AtomicU64::new(0);
        let abort = AtomicBool::new(false);
        let pondering = AtomicBool::new(false);
        let limits = quick_limits(depth);
        let shared = SearchShared { tt: &tt, abort: &abort, pondering: &pondering, limits: &limits };
        let mut td = ThreadData::new(
            0,
            shared,
            &nodes,
            vec![board.hash],
            HistoryTable::default(),
            PawnKingCache::default(),
        );
        td.time_manager = Some(TimeManager::new(&limits));
        let mut info = SearchInfo::default();
        crate::search::init_reductions();
        iterative_deepening(&mut td, &board, Some(&mut info));
        info
    }

    #[test]
    fn mate_in_one_is_found_and_scored() {
        // Back-rank mate: Ra8#
        let fen = "6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1";
        let info = run_to_depth(fen, 4);
        assert_eq!(info.values[info.depth], MATE - 1);

        let board = parse_fen(fen).unwrap();
        let mut child = board;
        assert!(child.make_move(info.best_moves[info.depth]));
        assert!(child.in_check());
        assert_eq!(child.legal_move_count(), 0);
    }

    #[test]
    fn insufficient_material_scores_zero() {
        let info = run_to_depth("8/8/4k3/8/8/4K3/8/8 w - - 0 1", 4);
        assert_eq!(info.values[info.depth], 0);
    }

    #[test]
    fn repetition_detection_sees_through_history() {
        let mut board = parse_fen(STARTPOS).unwrap();
        let mut history = vec![board.hash];
        // Shuffle knights out and back twice: g1f3 g8f6 f3g1 f6g8 ...
        let loop_moves = ["g1f3", "g8f6", "f3g1", "f6g8"];
        for uci in loop_moves.iter().chain(loop_moves.iter()) {
            let from = crate::board::fen::parse_square(&uci[0..2]).unwrap();
            let to = crate::board::fen::parse_square(&uci[2..4]).unwrap();
            assert!(board.make_move(Move::new(from, to, MoveKind::Normal)));
            history.push(board.hash);
        }

        let shared_nodes = AtomicU64::new(0);
        let abort = AtomicBool::new(false);
        let pondering = AtomicBool::new(false);
        let limits = quick_limits(1);
        let tt = TranspositionTable::new(1);
        let shared = SearchShared { tt: &tt, abort: &abort, pondering: &pondering, limits: &limits };
        let td = ThreadData::new(
            0,
            shared,
            &shared_nodes,
            history,
            HistoryTable::default(),
            PawnKingCache::default(),
        );
        assert!(td.is_repetition(&board));
    }

    #[test]
    fn helpers_skip_some_depths() {
        // The rotation must skip at least one depth for some helper
        let mut skipped = false;
        for index in 1..=8usize {
            let cycle = (index - 1) % SMP_CYCLES;
            for depth in 1..20 {
                if ((depth + SKIP_DEPTHS[cycle]) / SKIP_SIZE[cycle]) % 2 == 1 {
                    skipped = true;
                }
            }
        }
        assert!(skipped);
    }

    #[test]
    fn stop_flag_aborts_promptly() {
        let board = parse_fen(STARTPOS).unwrap();
        let mut pool = ThreadPool::new(1);
        pool.stop();
        // Abort is cleared at the start of each search; a depth-limited
        // search still finishes normally afterwards.
        let (best, _) = pool.search(&board, &quick_limits(2), &[board.hash], false);
        assert!(best.is_some());
    }
}
