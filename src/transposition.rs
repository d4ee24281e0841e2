use std::sync::atomic::{AtomicU16, AtomicU64, AtomicU8, Ordering};

use crate::moves::chess_move::Move;
use crate::search::params::{value_from_tt, value_to_tt};

/// Bound kind of a stored score. `Exact` carries both bits so the cutoff
/// tests can mask: a lower bound cuts when the score clears beta, an upper
/// bound when it stays under alpha, exact cuts either way.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Bound {
    Absent = 0,
    Lower = 1,
    Upper = 2,
    Exact = 3,
}

impl Bound {
    pub const fn lower(self) -> bool {
        self as u8 & Bound::Lower as u8 != 0
    }

    pub const fn upper(self) -> bool {
        self as u8 & Bound::Upper as u8 != 0
    }

    const fn from_bits(bits: u64) -> Bound {
        match bits & 0b11 {
            1 => Bound::Lower,
            2 => Bound::Upper,
            3 => Bound::Exact,
            _ => Bound::Absent,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TtEntry {
    pub m: Move,
    pub value: i32,
    pub eval: i32,
    pub depth: i32,
    pub bound: Bound,
}

/// One slot: a 16-bit key check word plus all payload packed into a single
/// atomic 64-bit word, so a reader can never see a half-written payload.
/// Key and payload may still tear against each other under SMP; the picker
/// pseudo-legality-checks every TT move, which makes that harmless.
#[derive(Default)]
struct Slot {
    key: AtomicU16,
    data: AtomicU64,
}

const DEPTH_SHIFT: u64 = 0;
const MOVE_SHIFT: u64 = 8;
const VALUE_SHIFT: u64 = 24;
const EVAL_SHIFT: u64 = 40;
const GEN_SHIFT: u64 = 56;
const BOUND_SHIFT: u64 = 62;

const GEN_MASK: u64 = 0x3f;

fn pack(m: Move, value: i32, eval: i32, depth: i32, generation: u8, bound: Bound) -> u64 {
    (depth as u64 & 0xff) << DEPTH_SHIFT
        | (m.0 as u64) << MOVE_SHIFT
        | (value as i16 as u16 as u64) << VALUE_SHIFT
        | (eval as i16 as u16 as u64) << EVAL_SHIFT
        | (generation as u64 & GEN_MASK) << GEN_SHIFT
        | (bound as u64) << BOUND_SHIFT
}

const fn unpack_depth(data: u64) -> i32 {
    (data >> DEPTH_SHIFT & 0xff) as i32
}

const fn unpack_move(data: u64) -> Move {
    Move((data >> MOVE_SHIFT & 0xffff) as u16)
}

const fn unpack_value(data: u64) -> i32 {
    (data >> VALUE_SHIFT & 0xffff) as u16 as i16 as i32
}

const fn unpack_eval(data: u64) -> i32 {
    (data >> EVAL_SHIFT & 0xffff) as u16 as i16 as i32
}

const fn unpack_gen(data: u64) -> u8 {
    (data >> GEN_SHIFT & GEN_MASK) as u8
}

/// Shared transposition table. The only mutable state the workers share;
/// writers never lock and readers tolerate staleness.
pub struct TranspositionTable {
    slots: Box<[Slot]>,
    generation: AtomicU8,
}

pub const DEFAULT_TT_MB: usize = 16;

impl TranspositionTable {
    pub fn new(megabytes: usize) -> TranspositionTable {
        let bytes = megabytes.max(1) * 1024 * 1024;
        let count = bytes / std::mem::size_of::<Slot>();
        let mut slots = Vec::with_capacity(count);
        slots.resize_with(count, Slot::default);
        TranspositionTable { slots: slots.into_boxed_slice(), generation: AtomicU8::new(0) }
    }

    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.key.store(0, Ordering::Relaxed);
            slot.data.store(0, Ordering::Relaxed);
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Bumps the generation; called once per `go` so old entries lose their
    /// replacement priority without a sweep.
    pub fn increment_generation(&self) {
        let next = (self.generation.load(Ordering::Relaxed) + 1) & GEN_MASK as u8;
        self.generation.store(next, Ordering::Relaxed);
    }

    fn index(&self, hash: u64) -> usize {
        ((u128::from(hash) * self.slots.len() as u128) >> 64) as usize
    }

    pub fn probe(&self, hash: u64, height: i32) -> Option<TtEntry> {
        let slot = &self.slots[self.index(hash)];
        if slot.key.load(Ordering::Relaxed) != hash as u16 {
            return None;
        }
        let data = slot.data.load(Ordering::Relaxed);
        let bound = Bound::from_bits(data >> BOUND_SHIFT);
        if bound == Bound::Absent {
            return None;
        }
        Some(TtEntry {
            m: unpack_move(data),
            value: value_from_tt(unpack_value(data), height),
            eval: unpack_eval(data),
            depth: unpack_depth(data),
            bound,
        })
    }

    pub fn store(&self, hash: u64, m: Move, value: i32, eval: i32, depth: i32, bound: Bound, height: i32) {
        let slot = &self.slots[self.index(hash)];
        let key = hash as u16;
        let old = slot.data.load(Ordering::Relaxed);
        let old_key = slot.key.load(Ordering::Relaxed);
        let generation = self.generation.load(Ordering::Relaxed);

        // Prefer fresher, deeper, or exact data; always claim foreign slots
        let replace = old_key != key
            || unpack_gen(old) != generation
            || bound == Bound::Exact
            || depth + 4 >= unpack_depth(old);
        if !replace {
            return;
        }

        // A depth-preferred overwrite without a best move keeps the old one
        let m = if m == Move::NONE && old_key == key { unpack_move(old) } else { m };

        slot.key.store(key, Ordering::Relaxed);
        slot.data.store(pack(m, value_to_tt(value, height), eval, depth, generation, bound), Ordering::Relaxed);
    }

    /// Rough fill rate in permille, sampled from the table head.
    pub fn hashfull(&self) -> usize {
        let generation = self.generation.load(Ordering::Relaxed);
        self.slots
            .iter()
            .take(1000)
            .filter(|slot| {
                let data = slot.data.load(Ordering::Relaxed);
                Bound::from_bits(data >> BOUND_SHIFT) != Bound::Absent && unpack_gen(data) == generation
            })
            .count()
    }
}

#[cfg(test)]
mod tt_tests {
    use super::*;
    use crate::moves::chess_move::MoveKind;
    use crate::search::params::MATE;
    use crate::types::square::Square;

    fn any_move() -> Move {
        Move::new(Square(12), Square(28), MoveKind::Normal)
    }

    #[test]
    fn store_then_probe() {
        let tt = TranspositionTable::new(1);
        assert!(tt.probe(0xdead_beef, 0).is_none());

        tt.store(0xdead_beef, any_move(), 25, 17, 6, Bound::Exact, 0);
        let entry = tt.probe(0xdead_beef, 0).expect("entry stored");
        assert_eq!(entry.m, any_move());
        assert_eq!(entry.value, 25);
        assert_eq!(entry.eval, 17);
        assert_eq!(entry.depth, 6);
        assert_eq!(entry.bound, Bound::Exact);
    }

    #[test]
    fn mate_scores_adjust_for_height() {
        let tt = TranspositionTable::new(1);
        let ply = 15;
        tt.store(42, any_move(), -MATE + ply, 0, 9, Bound::Exact, ply);
        let entry = tt.probe(42, 2).unwrap();
        assert_eq!(entry.value, -MATE + 2);

        tt.clear();
        let ply = 12;
        tt.store(42, any_move(), MATE - ply, 0, 9, Bound::Exact, ply);
        let entry = tt.probe(42, 4).unwrap();
        assert_eq!(entry.value, MATE - 4);
    }

    #[test]
    fn negative_values_survive_packing() {
        let tt = TranspositionTable::new(1);
        tt.store(7, any_move(), -421, -873, 3, Bound::Upper, 0);
        let entry = tt.probe(7, 0).unwrap();
        assert_eq!(entry.value, -421);
        assert_eq!(entry.eval, -873);
        assert!(entry.bound.upper());
        assert!(!entry.bound.lower());
    }

    #[test]
    fn shallow_stores_do_not_evict_deep_ones() {
        let tt = TranspositionTable::new(1);
        tt.store(99, any_move(), 50, 0, 20, Bound::Lower, 0);
        tt.store(99, Move::NONE, 10, 0, 2, Bound::Upper, 0);
        let entry = tt.probe(99, 0).unwrap();
        assert_eq!(entry.depth, 20);
        assert_eq!(entry.bound, Bound::Lower);
    }

    #[test]
    fn new_generation_reclaims_slots() {
        let tt = TranspositionTable::new(1);
        tt.store(99, any_move(), 50, 0, 20, Bound::Lower, 0);
        tt.increment_generation();
        tt.store(99, any_move(), 10, 0, 2, Bound::Upper, 0);
        let entry = tt.probe(99, 0).unwrap();
        assert_eq!(entry.depth, 2);
    }

    #[test]
    fn exact_bound_masks_both_directions() {
        assert!(Bound::Exact.lower() && Bound::Exact.upper());
        assert!(Bound::Lower.lower() && !Bound::Lower.upper());
        assert!(Bound::Upper.upper() && !Bound::Upper.lower());
    }
}
