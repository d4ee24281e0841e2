use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Once;

use arr_macro::arr;
use arrayvec::ArrayVec;

use crate::moves::chess_move::Move;
use crate::types::pieces::Piece;
use crate::types::square::Square;

pub mod history;
pub mod params;
pub mod quiescence;
pub mod search;
pub mod see;
pub mod thread;
pub mod time;

use params::MAX_PLY;

/// Per-ply search state. One slot past `MAX_PLY` so resetting the children's
/// killers at the horizon stays in bounds.
#[derive(Clone, Copy)]
pub struct PlyEntry {
    pub played: Move,
    pub moved: Piece,
    pub static_eval: i32,
    pub killers: [Move; 2],
}

impl Default for PlyEntry {
    fn default() -> Self {
        PlyEntry { played: Move::NONE, moved: Piece::None, static_eval: 0, killers: [Move::NONE; 2] }
    }
}

#[derive(Clone)]
pub struct SearchStack {
    entries: [PlyEntry; MAX_PLY as usize + 1],
}

impl Default for SearchStack {
    fn default() -> Self {
        SearchStack { entries: [PlyEntry::default(); MAX_PLY as usize + 1] }
    }
}

impl SearchStack {
    /// The (piece, to-square) of the move made at `ply`, if there was a real
    /// one. Null moves and the root boundary both come back as None.
    pub fn prior(&self, ply: i32) -> Option<(Piece, Square)> {
        if ply < 0 {
            return None;
        }
        let entry = &self.entries[ply as usize];
        if entry.played.is_some() && entry.moved != Piece::None {
            Some((entry.moved, entry.played.to()))
        } else {
            None
        }
    }

    /// The raw move at `ply`; `Move::NULL` shows through, which is what the
    /// null-move-pruning guard wants to see.
    pub fn played(&self, ply: i32) -> Move {
        if ply < 0 {
            Move::NONE
        } else {
            self.entries[ply as usize].played
        }
    }
}

impl Index<i32> for SearchStack {
    type Output = PlyEntry;
    fn index(&self, ply: i32) -> &PlyEntry {
        &self.entries[ply as usize]
    }
}

impl IndexMut<i32> for SearchStack {
    fn index_mut(&mut self, ply: i32) -> &mut PlyEntry {
        &mut self.entries[ply as usize]
    }
}

/// Principal variation: `line[0]` is the move played at this node.
#[derive(Clone, Default)]
pub struct PVariation {
    pub line: ArrayVec<Move, { MAX_PLY as usize }>,
}

impl PVariation {
    pub fn clear(&mut self) {
        self.line.clear();
    }

    /// Prepend `m` to the child's line.
    pub fn load(&mut self, m: Move, child: &PVariation) {
        self.line.clear();
        self.line.push(m);
        let room = self.line.capacity() - 1;
        self.line.extend(child.line.iter().copied().take(room));
    }

    pub fn best(&self) -> Move {
        self.line.first().copied().unwrap_or(Move::NONE)
    }

    pub fn ponder(&self) -> Option<Move> {
        self.line.get(1).copied()
    }
}

/// Late-move-reduction table, `floor(0.75 + ln(d) * ln(p) / 2.25)`, filled
/// once at startup.
static LMR_TABLE: [[AtomicI32; 64]; 64] = arr![arr![AtomicI32::new(0); 64]; 64];
static LMR_INIT: Once = Once::new();

pub fn init_reductions() {
    LMR_INIT.call_once(|| {
        for depth in 1..64 {
            for played in 1..64 {
                let r = 0.75 + (depth as f64).ln() * (played as f64).ln() / 2.25;
                LMR_TABLE[depth][played].store(r as i32, Ordering::Relaxed);
            }
        }
    });
}

pub fn lmr_reduction(depth: i32, played: i32) -> i32 {
    LMR_TABLE[depth.min(63) as usize][played.min(63) as usize].load(Ordering::Relaxed)
}
