use crate::board::board::Board;
use crate::moves::chess_move::Move;
use crate::search::SearchStack;

pub const MAX_HISTORY: i32 = 16_384;

/// Heuristic state for one (piece, to-square) pair.
#[derive(Clone, Copy)]
struct HistoryEntry {
    score: i16,
    counter: Move,
    /// Indexed by the (piece, to) of an earlier move on the path.
    continuation: [[i16; 64]; 12],
}

impl Default for HistoryEntry {
    fn default() -> Self {
        HistoryEntry { score: 0, counter: Move::NONE, continuation: [[0; 64]; 12] }
    }
}

/// Per-thread quiet-move statistics: plain history, counter moves, and the
/// one/two-ply continuation histories. Never shared, never aged across
/// threads.
#[derive(Clone)]
pub struct HistoryTable {
    table: Box<[[HistoryEntry; 64]; 12]>,
}

impl Default for HistoryTable {
    fn default() -> Self {
        HistoryTable { table: Box::new([[HistoryEntry::default(); 64]; 12]) }
    }
}

/// Gravity update: pull the entry toward the bonus, harder the further away
/// it sits, so scores saturate at `MAX_HISTORY`.
fn nudge(entry: &mut i16, bonus: i32) {
    let current = i32::from(*entry);
    *entry = (current + bonus - current * bonus.abs() / MAX_HISTORY) as i16;
}

impl HistoryTable {
    /// (history, counter-move history, follow-up history) for a quiet move.
    pub fn quiet_histories(&self, board: &Board, stack: &SearchStack, ply: i32, m: Move) -> (i32, i32, i32) {
        let piece = board.piece_at(m.from());
        let entry = &self.table[piece.idx()][m.to().0 as usize];
        let cm = match stack.prior(ply - 1) {
            Some((p, to)) => i32::from(entry.continuation[p.idx()][to.0 as usize]),
            None => 0,
        };
        let fm = match stack.prior(ply - 2) {
            Some((p, to)) => i32::from(entry.continuation[p.idx()][to.0 as usize]),
            None => 0,
        };
        (i32::from(entry.score), cm, fm)
    }

    pub fn quiet_score(&self, board: &Board, stack: &SearchStack, ply: i32, m: Move) -> i32 {
        let (hist, cm, fm) = self.quiet_histories(board, stack, ply, m);
        hist + cm + fm
    }

    /// The stored refutation of whatever was just played.
    pub fn counter_move(&self, stack: &SearchStack, ply: i32) -> Move {
        match stack.prior(ply - 1) {
            Some((p, to)) => self.table[p.idx()][to.0 as usize].counter,
            None => Move::NONE,
        }
    }

    /// Credits the cutoff move and taxes every quiet tried before it.
    pub fn update_quiets(
        &mut self,
        board: &Board,
        stack: &SearchStack,
        ply: i32,
        bonus: i32,
        best: Move,
        quiets_tried: &[Move],
    ) {
        if let Some((p, to)) = stack.prior(ply - 1) {
            self.table[p.idx()][to.0 as usize].counter = best;
        }

        for &m in quiets_tried {
            let delta = if m == best { bonus } else { -bonus };
            let piece = board.piece_at(m.from());
            let entry = &mut self.table[piece.idx()][m.to().0 as usize];
            nudge(&mut entry.score, delta);
            for prior_ply in [ply - 1, ply - 2] {
                if let Some((p, to)) = stack.prior(prior_ply) {
                    nudge(&mut entry.continuation[p.idx()][to.0 as usize], delta);
                }
            }
        }
    }
}

#[cfg(test)]
mod history_tests {
    use super::*;
    use crate::board::fen::{parse_fen, STARTPOS};
    use crate::moves::chess_move::MoveKind;
    use crate::types::square::Square;

    #[test]
    fn cutoff_move_gains_others_lose() {
        let board = parse_fen(STARTPOS).unwrap();
        let stack = SearchStack::default();
        let mut history = HistoryTable::default();

        let good = Move::new(Square(12), Square(28), MoveKind::Normal);
        let bad = Move::new(Square(11), Square(27), MoveKind::Normal);
        history.update_quiets(&board, &stack, 0, 16, good, &[bad, good]);

        assert!(history.quiet_score(&board, &stack, 0, good) > 0);
        assert!(history.quiet_score(&board, &stack, 0, bad) < 0);
    }

    #[test]
    fn scores_saturate() {
        let board = parse_fen(STARTPOS).unwrap();
        let stack = SearchStack::default();
        let mut history = HistoryTable::default();
        let m = Move::new(Square(12), Square(28), MoveKind::Normal);

        for _ in 0..10_000 {
            history.update_quiets(&board, &stack, 0, 400, m, &[m]);
        }
        assert!(history.quiet_score(&board, &stack, 0, m) <= MAX_HISTORY);
    }

    #[test]
    fn counter_is_keyed_on_the_previous_move() {
        let mut board = parse_fen(STARTPOS).unwrap();
        let mut stack = SearchStack::default();
        let e4 = Move::new(Square(12), Square(28), MoveKind::Normal);
        stack[0].played = e4;
        stack[0].moved = board.piece_at(e4.from());
        assert!(board.make_move(e4));

        let mut history = HistoryTable::default();
        let reply = Move::new(Square(52), Square(36), MoveKind::Normal);
        history.update_quiets(&board, &stack, 1, 9, reply, &[reply]);
        assert_eq!(history.counter_move(&stack, 1), reply);
    }
}
