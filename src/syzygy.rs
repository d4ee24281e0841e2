//! Endgame tablebase seam.
//!
//! The search drives its probes through this module: a DTZ probe at the
//! root before any worker starts, and WDL probes inside the tree. No bases
//! ship with the engine, so `TB_MEN` is zero and every probe reports
//! `Failed`, which callers treat as "keep searching". The caller-side
//! handling (score mapping, bound selection, TT store) lives in the search
//! and is exercised through the same entry points a real probe would use.

use crate::board::board::Board;
use crate::moves::chess_move::Move;

/// Piece-count ceiling for WDL probes. Zero while no bases are mounted.
pub const TB_MEN: u32 = 0;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TbResult {
    /// No probe result; the position is outside the bases.
    Failed,
    Loss,
    Draw,
    Win,
}

/// Root probe: a hit pins the best move directly and skips the search.
pub fn probe_dtz(board: &Board) -> Option<Move> {
    if board.occupied().count() > TB_MEN {
        return None;
    }
    None
}

/// In-tree probe, gated the usual way: few enough men, no castling rights,
/// and a reset halfmove clock so the WDL value is trustworthy.
pub fn probe_wdl(board: &Board, _depth: i32, _height: i32) -> TbResult {
    if board.occupied().count() > TB_MEN || board.castle_rights != 0 || board.halfmove_clock != 0 {
        return TbResult::Failed;
    }
    TbResult::Failed
}

#[cfg(test)]
mod syzygy_tests {
    use super::*;
    use crate::board::fen::parse_fen;

    #[test]
    fn probes_fail_without_bases() {
        let board = parse_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(probe_dtz(&board), None);
        assert_eq!(probe_wdl(&board, 10, 3), TbResult::Failed);
    }
}
