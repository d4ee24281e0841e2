use lazy_static::lazy_static;

use crate::moves::attacks::{FILES, RANKS};
use crate::types::bitboard::Bitboard;
use crate::types::square::{Direction, Square};

/// Xorshift generator used to hunt for magic numbers and to seed the zobrist
/// keys. Deterministic so every process builds identical tables.
pub struct Rng(u64);

impl Default for Rng {
    fn default() -> Self {
        Rng(0x9E37_79B9_7F4A_7C15)
    }
}

impl Rng {
    pub fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 << 21;
        self.0 ^= self.0 >> 35;
        self.0 ^= self.0 << 4;
        self.0
    }

    /// Sparse candidates make the best magics, so AND a few draws together.
    fn next_candidate(&mut self) -> u64 {
        self.next_u64() & self.next_u64() & self.next_u64()
    }
}

const ROOK_DIRS: [Direction; 4] = [Direction::North, Direction::South, Direction::East, Direction::West];
const BISHOP_DIRS: [Direction; 4] = [
    Direction::NorthEast,
    Direction::NorthWest,
    Direction::SouthEast,
    Direction::SouthWest,
];

/// Total slots in the rook and bishop attack tables when every square uses a
/// full-width index.
const ROOK_TABLE_SIZE: usize = 102_400;
const BISHOP_TABLE_SIZE: usize = 5_248;

#[derive(Clone, Copy, Default)]
struct MagicEntry {
    mask: Bitboard,
    magic: u64,
    shift: u8,
    offset: usize,
}

impl MagicEntry {
    fn index(&self, occupied: Bitboard) -> usize {
        let blockers = occupied & self.mask;
        let hash = blockers.0.wrapping_mul(self.magic);
        self.offset + (hash >> self.shift) as usize
    }
}

pub struct SliderAttacks {
    rook_table: Vec<Bitboard>,
    rook_entries: [MagicEntry; 64],
    bishop_table: Vec<Bitboard>,
    bishop_entries: [MagicEntry; 64],
}

lazy_static! {
    static ref SLIDERS: SliderAttacks = SliderAttacks::generate();
}

pub fn rook_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    SLIDERS.rook_table[SLIDERS.rook_entries[sq.0 as usize].index(occupied)]
}

pub fn bishop_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    SLIDERS.bishop_table[SLIDERS.bishop_entries[sq.0 as usize].index(occupied)]
}

pub fn queen_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    rook_attacks(sq, occupied) | bishop_attacks(sq, occupied)
}

impl SliderAttacks {
    fn generate() -> SliderAttacks {
        let mut rng = Rng::default();
        let mut rook_table = Vec::with_capacity(ROOK_TABLE_SIZE);
        let mut rook_entries = [MagicEntry::default(); 64];
        let mut bishop_table = Vec::with_capacity(BISHOP_TABLE_SIZE);
        let mut bishop_entries = [MagicEntry::default(); 64];

        for sq in Square::iter() {
            let (entry, mut table) = find_magic(sq, ROOK_DIRS, &mut rng, rook_table.len());
            rook_entries[sq.0 as usize] = entry;
            rook_table.append(&mut table);

            let (entry, mut table) = find_magic(sq, BISHOP_DIRS, &mut rng, bishop_table.len());
            bishop_entries[sq.0 as usize] = entry;
            bishop_table.append(&mut table);
        }

        assert_eq!(rook_table.len(), ROOK_TABLE_SIZE);
        assert_eq!(bishop_table.len(), BISHOP_TABLE_SIZE);

        SliderAttacks { rook_table, rook_entries, bishop_table, bishop_entries }
    }
}

/// Rays from `sq` in each direction, stopping on (and including) the first
/// occupied square.
fn ray_attacks(sq: Square, dirs: [Direction; 4], occupied: Bitboard) -> Bitboard {
    let mut attacks = Bitboard::EMPTY;
    for dir in dirs {
        let mut cur = sq;
        while let Some(next) = cur.checked_shift(dir) {
            attacks |= next.bitboard();
            if occupied.contains(next) {
                break;
            }
            cur = next;
        }
    }
    attacks
}

/// The blocker mask excludes board-edge squares: a piece on the edge cannot
/// shorten the ray any further than the edge itself does.
fn blocker_mask(sq: Square, dirs: [Direction; 4]) -> Bitboard {
    let edges = ((RANKS[0] | RANKS[7]) & !RANKS[sq.rank() as usize])
        | ((FILES[0] | FILES[7]) & !FILES[sq.file() as usize]);
    ray_attacks(sq, dirs, Bitboard::EMPTY) & !edges
}

fn find_magic(sq: Square, dirs: [Direction; 4], rng: &mut Rng, offset: usize) -> (MagicEntry, Vec<Bitboard>) {
    let mask = blocker_mask(sq, dirs);
    let bits = mask.count() as u8;
    loop {
        let entry = MagicEntry { mask, magic: rng.next_candidate(), shift: 64 - bits, offset };
        if let Some(table) = try_fill_table(sq, dirs, &entry) {
            return (entry, table);
        }
    }
}

/// Walks every blocker subset of the mask (Carry-Rippler enumeration) and
/// fills the table; None if the candidate magic collides two different
/// attack sets into one slot.
fn try_fill_table(sq: Square, dirs: [Direction; 4], entry: &MagicEntry) -> Option<Vec<Bitboard>> {
    let mut table = vec![Bitboard::EMPTY; 1 << (64 - entry.shift)];
    let mut blockers = Bitboard::EMPTY;
    loop {
        let attacks = ray_attacks(sq, dirs, blockers);
        let slot = &mut table[entry.index(blockers) - entry.offset];
        if *slot == Bitboard::EMPTY {
            *slot = attacks;
        } else if *slot != attacks {
            return None;
        }
        blockers.0 = blockers.0.wrapping_sub(entry.mask.0) & entry.mask.0;
        if blockers.is_empty() {
            break;
        }
    }
    Some(table)
}

#[cfg(test)]
mod magic_tests {
    use super::*;

    #[test]
    fn empty_board_rook_rays() {
        let attacks = rook_attacks(Square(0), Bitboard::EMPTY);
        assert_eq!(attacks, (FILES[0] | RANKS[0]) ^ Square(0).bitboard());
        assert_eq!(rook_attacks(Square(28), Bitboard::EMPTY).count(), 14);
    }

    #[test]
    fn rook_stops_at_blockers() {
        // Rook a1, blocker a3: a2, a3 and the whole first rank remain
        let occupied = Square(16).bitboard();
        let attacks = rook_attacks(Square(0), occupied);
        assert!(attacks.contains(Square(8)));
        assert!(attacks.contains(Square(16)));
        assert!(!attacks.contains(Square(24)));
    }

    #[test]
    fn bishop_diagonals() {
        let attacks = bishop_attacks(Square(28), Bitboard::EMPTY);
        assert_eq!(attacks.count(), 13);
        assert!(attacks.contains(Square(0)));
        assert!(attacks.contains(Square(63)));

        let blocked = bishop_attacks(Square(28), Square(37).bitboard());
        assert!(blocked.contains(Square(37)));
        assert!(!blocked.contains(Square(46)));
    }

    #[test]
    fn queen_is_rook_plus_bishop() {
        for sq in [Square(0), Square(28), Square(63)] {
            assert_eq!(
                queen_attacks(sq, Bitboard::EMPTY),
                rook_attacks(sq, Bitboard::EMPTY) | bishop_attacks(sq, Bitboard::EMPTY)
            );
        }
    }
}
