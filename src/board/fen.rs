use phf::phf_map;

use crate::board::board::{Board, BLACK_KINGSIDE, BLACK_QUEENSIDE, WHITE_KINGSIDE, WHITE_QUEENSIDE};
use crate::types::pieces::{Color, Piece};
use crate::types::square::Square;

pub const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

static PIECE_GLYPHS: phf::Map<char, Piece> = phf_map! {
    'P' => Piece::WhitePawn,
    'N' => Piece::WhiteKnight,
    'B' => Piece::WhiteBishop,
    'R' => Piece::WhiteRook,
    'Q' => Piece::WhiteQueen,
    'K' => Piece::WhiteKing,
    'p' => Piece::BlackPawn,
    'n' => Piece::BlackKnight,
    'b' => Piece::BlackBishop,
    'r' => Piece::BlackRook,
    'q' => Piece::BlackQueen,
    'k' => Piece::BlackKing,
};

/// Builds a board from a FEN record. The halfmove clock and move number are
/// optional, as some GUIs omit them.
pub fn parse_fen(fen: &str) -> Result<Board, String> {
    let mut board = Board::empty();
    let mut fields = fen.split_whitespace();

    let placement = fields.next().ok_or("empty fen")?;
    let mut rank: i32 = 7;
    let mut file: i32 = 0;
    for c in placement.chars() {
        match c {
            '/' => {
                rank -= 1;
                file = 0;
            }
            '1'..='8' => file += c as i32 - '0' as i32,
            _ => {
                let piece = *PIECE_GLYPHS.get(&c).ok_or_else(|| format!("bad piece char {c}"))?;
                if !(0..8).contains(&rank) || !(0..8).contains(&file) {
                    return Err(format!("piece placement escapes the board: {fen}"));
                }
                board.place_piece(piece, Square((rank * 8 + file) as u8));
                file += 1;
            }
        }
    }

    board.stm = match fields.next() {
        Some("w") => Color::White,
        Some("b") => Color::Black,
        other => return Err(format!("bad side to move {other:?}")),
    };

    let castling = fields.next().unwrap_or("-");
    board.castle_rights = castling.chars().fold(0, |rights, c| {
        rights
            | match c {
                'K' => WHITE_KINGSIDE,
                'Q' => WHITE_QUEENSIDE,
                'k' => BLACK_KINGSIDE,
                'q' => BLACK_QUEENSIDE,
                _ => 0,
            }
    });

    board.ep_square = match fields.next() {
        None | Some("-") => None,
        Some(sq) => Some(parse_square(sq)?),
    };

    board.halfmove_clock = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0);
    board.fullmove_number = fields.next().and_then(|f| f.parse().ok()).unwrap_or(1);

    board.hash = board.compute_hash();
    board.pawn_king_hash = board.compute_pawn_king_hash();
    board.refresh_checkers();
    Ok(board)
}

pub fn parse_square(s: &str) -> Result<Square, String> {
    let mut chars = s.chars();
    let file = chars.next().filter(|c| ('a'..='h').contains(c)).ok_or_else(|| format!("bad square {s}"))?;
    let rank = chars.next().filter(|c| ('1'..='8').contains(c)).ok_or_else(|| format!("bad square {s}"))?;
    Ok(Square((rank as u8 - b'1') * 8 + (file as u8 - b'a')))
}

/// Reassembles the fen fields from a tokenized `position fen ...` command.
pub fn fen_from_tokens<'a>(tokens: impl Iterator<Item = &'a str>) -> String {
    tokens.take_while(|t| *t != "moves").collect::<Vec<_>>().join(" ")
}
