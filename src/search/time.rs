use std::time::Instant;

use crate::moves::chess_move::Move;
use crate::search::thread::{LimitKind, Limits};

/// Move overhead reserved for I/O between us and the GUI, in milliseconds.
const MOVE_OVERHEAD: u64 = 30;

/// Time budgeting for one `go`. Owned by the main worker; helpers never
/// consult the clock and stop only on the shared abort flag.
///
/// Two budgets come out of the clock: `ideal_usage` is the soft target the
/// deepening loop compares against between iterations, `max_usage` the hard
/// wall enforced inside the tree. An unstable best move stretches the soft
/// target, a steady one shrinks it.
pub struct TimeManager {
    start: Instant,
    pub ideal_usage: u64,
    pub max_usage: u64,
    stability: u32,
    last_best: Move,
}

impl TimeManager {
    pub fn new(limits: &Limits) -> TimeManager {
        let (ideal, max) = match limits.kind {
            LimitKind::Clock { time_ms, inc_ms, moves_to_go: Some(mtg) } => {
                let time = time_ms.saturating_sub(MOVE_OVERHEAD);
                let ideal = time / (mtg as u64 + 2) + 3 * inc_ms / 4;
                (ideal, (4 * ideal).min(time / 2))
            }
            LimitKind::Clock { time_ms, inc_ms, moves_to_go: None } => {
                let time = time_ms.saturating_sub(MOVE_OVERHEAD);
                let ideal = (time + 25 * inc_ms) / 45;
                (ideal, (6 * ideal).min(4 * time / 5))
            }
            // Fixed limits need only the stopwatch
            _ => (0, 0),
        };
        TimeManager {
            start: Instant::now(),
            ideal_usage: ideal.max(1),
            max_usage: max.max(1),
            stability: 0,
            last_best: Move::NONE,
        }
    }

    pub fn elapsed(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Called after every completed iteration with that iteration's best
    /// move.
    pub fn update(&mut self, best: Move) {
        if best == self.last_best {
            self.stability = (self.stability + 1).min(8);
        } else {
            self.stability = 0;
            self.last_best = best;
        }
    }

    /// Soft check between iterations: is starting another depth worth it?
    /// A best move that has held for several iterations trims the budget;
    /// a fresh one extends it.
    pub fn should_stop_iterating(&self) -> bool {
        let scale = 110 - 5 * self.stability as u64;
        self.elapsed() * 100 >= self.ideal_usage * scale
    }

    /// Hard wall checked inside the tree (through the abort machinery).
    pub fn out_of_time(&self) -> bool {
        self.elapsed() >= self.max_usage
    }
}

#[cfg(test)]
mod time_tests {
    use super::*;

    fn clock_limits(time_ms: u64, inc_ms: u64, mtg: Option<u32>) -> Limits {
        Limits { kind: LimitKind::Clock { time_ms, inc_ms, moves_to_go: mtg } }
    }

    #[test]
    fn budgets_scale_with_the_clock() {
        let short = TimeManager::new(&clock_limits(1_000, 0, None));
        let long = TimeManager::new(&clock_limits(60_000, 0, None));
        assert!(long.ideal_usage > short.ideal_usage);
        assert!(long.max_usage > long.ideal_usage);
    }

    #[test]
    fn max_usage_never_exceeds_most_of_the_clock() {
        let tm = TimeManager::new(&clock_limits(10_000, 10_000, None));
        assert!(tm.max_usage <= 8_000);
    }

    #[test]
    fn moves_to_go_splits_the_budget() {
        let few = TimeManager::new(&clock_limits(30_000, 0, Some(2)));
        let many = TimeManager::new(&clock_limits(30_000, 0, Some(38)));
        assert!(few.ideal_usage > many.ideal_usage);
    }

    #[test]
    fn stability_tightens_the_soft_budget() {
        let m = Move(77);
        let mut tm = TimeManager::new(&clock_limits(10_000, 100, None));
        for _ in 0..10 {
            tm.update(m);
        }
        assert_eq!(tm.stability, 8);
        tm.update(Move(78));
        assert_eq!(tm.stability, 0);
    }
}
