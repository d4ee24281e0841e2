use std::time::Instant;

use crate::board::fen::parse_fen;
use crate::search::thread::{LimitKind, Limits, ThreadPool};

const BENCH_DEPTH: i32 = 9;

/// Small position suite spanning opening, middlegame and endgame shapes.
const BENCH_FENS: [&str; 10] = [
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r2q1rk1/pP1p2pp/Q4n2/bbp1p3/Np6/1B3NBn/pPPP1PPP/R3K2R b KQ - 0 1",
    "4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2",
    "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1",
    "8/8/1p2k3/p4p2/P4P2/1P2K3/8/8 w - - 0 1",
    "2kr3r/pp1q1ppp/5n2/1Nb5/2Pp1B2/7Q/P4PPP/1R3RK1 w - - 0 1",
];

/// Fixed-depth sweep over the suite; the node count doubles as a quick
/// regression check on search behavior between builds.
pub fn run() {
    let mut pool = ThreadPool::new(16);
    let limits = Limits { kind: LimitKind::Depth(BENCH_DEPTH) };
    let start = Instant::now();
    let mut nodes = 0;

    for (i, fen) in BENCH_FENS.iter().enumerate() {
        let board = parse_fen(fen).expect("bench fens parse");
        pool.new_game();
        let (best, _) = pool.search(&board, &limits, &[board.hash], false);
        let searched = pool.node_count();
        nodes += searched;
        println!("position {:2} bestmove {best} nodes {searched}", i + 1);
    }

    let elapsed = start.elapsed().as_secs_f64();
    println!("\n{nodes} nodes {:.0} nps", nodes as f64 / elapsed.max(1e-9));
}
