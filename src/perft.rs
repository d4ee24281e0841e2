use std::time::Instant;

use rayon::prelude::*;

use crate::board::board::Board;
use crate::moves::chess_move::Move;
use crate::moves::generate::GenKind;

/// Legal-move path count to `depth`. The workhorse behind the move
/// generator's correctness suite.
pub fn perft(board: &Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut total = 0;
    for m in board.generate(GenKind::All).iter() {
        let mut child = *board;
        if !child.make_move(m) {
            continue;
        }
        total += if depth == 1 { 1 } else { perft(&child, depth - 1) };
    }
    total
}

/// `go perft` output: per-root-move counts plus the total, split across
/// cores at the root.
pub fn divide(board: &Board, depth: u32) {
    let start = Instant::now();

    let roots: Vec<(Move, Board)> = board
        .generate(GenKind::All)
        .iter()
        .filter_map(|m| {
            let mut child = *board;
            child.make_move(m).then_some((m, child))
        })
        .collect();

    let counts: Vec<(Move, u64)> = roots
        .par_iter()
        .map(|(m, child)| (*m, if depth <= 1 { 1 } else { perft(child, depth - 1) }))
        .collect();

    let mut total = 0;
    for (m, count) in &counts {
        println!("{m}: {count}");
        total += count;
    }
    let elapsed = start.elapsed().as_secs_f64();
    println!("\nnodes {total} time {:.3}s nps {:.0}", elapsed, total as f64 / elapsed.max(1e-9));
}
