use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use itertools::Itertools;

use crate::bench;
use crate::board::board::Board;
use crate::board::fen::{fen_from_tokens, parse_fen, parse_square, STARTPOS};
use crate::moves::chess_move::{Move, MoveKind};
use crate::perft;
use crate::search::params::{MATE, MATED_IN_MAX, MATE_IN_MAX};
use crate::search::thread::{LimitKind, Limits, ThreadData, ThreadPool};
use crate::search::PVariation;
use crate::transposition::DEFAULT_TT_MB;
use crate::types::pieces::{Color, Piece, PieceKind};

const NAME: &str = "Kestrel";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Copy, Eq, PartialEq)]
pub enum ReportBound {
    Exact,
    Lower,
    Upper,
}

/// One `info` line from the main worker. Mate scores are reported in moves,
/// bound tags mark aspiration results that are not yet exact.
pub fn uci_report(td: &ThreadData, value: i32, bound: ReportBound, pv: &PVariation) {
    let elapsed = td.elapsed_ms();
    let nodes = td.nodes.global_count();
    let nps = nodes * 1000 / elapsed.max(1);

    let score = if value >= MATE_IN_MAX {
        format!("mate {}", (MATE - value + 1) / 2)
    } else if value <= MATED_IN_MAX {
        format!("mate {}", -(MATE + value) / 2)
    } else {
        format!("cp {value}")
    };
    let tag = match bound {
        ReportBound::Exact => "",
        ReportBound::Lower => " lowerbound",
        ReportBound::Upper => " upperbound",
    };
    let line = pv.line.iter().map(|m| m.to_uci()).join(" ");

    println!(
        "info depth {} seldepth {} score {score}{tag} time {elapsed} nodes {nodes} nps {nps} \
         hashfull {} tbhits {} pv {line}",
        td.depth,
        td.seldepth,
        td.shared.tt.hashfull(),
        td.tbhits,
    );
}

/// Reads a move in long algebraic notation against the current board, which
/// supplies the castle/en-passant/promotion context the bare string lacks.
pub fn move_from_uci(board: &Board, text: &str) -> Option<Move> {
    let from = parse_square(text.get(0..2)?).ok()?;
    let to = parse_square(text.get(2..4)?).ok()?;
    let promo = match text.as_bytes().get(4) {
        None => None,
        Some(b'n') => Some(PieceKind::Knight),
        Some(b'b') => Some(PieceKind::Bishop),
        Some(b'r') => Some(PieceKind::Rook),
        Some(b'q') => Some(PieceKind::Queen),
        Some(_) => return None,
    };

    let piece = board.piece_at(from);
    let m = if let Some(promo) = promo {
        Move::new_promotion(from, to, promo)
    } else if piece != Piece::None && piece.kind() == PieceKind::King && from.file().abs_diff(to.file()) == 2 {
        Move::new(from, to, MoveKind::Castle)
    } else if piece != Piece::None
        && piece.kind() == PieceKind::Pawn
        && Some(to) == board.ep_square
        && from.file() != to.file()
    {
        Move::new(from, to, MoveKind::EnPassant)
    } else {
        Move::new(from, to, MoveKind::Normal)
    };

    board.is_pseudo_legal(m).then_some(m)
}

struct Session {
    pool: ThreadPool,
    board: Board,
    history: Vec<u64>,
}

impl Session {
    fn new() -> Session {
        let board = parse_fen(STARTPOS).expect("startpos parses");
        Session { pool: ThreadPool::new(DEFAULT_TT_MB), board, history: vec![board.hash] }
    }
}

/// Blocking UCI driver. A dedicated reader thread feeds a channel so that
/// `stop`, `ponderhit` and `isready` are handled while a search runs; any
/// other command arriving mid-search is queued for afterwards.
pub fn main_loop() {
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    // The receiver moves behind a mutex so the in-search watcher thread can
    // poll it; outside a search only this loop touches it.
    let rx = Mutex::new(rx);
    let mut session = Session::new();
    let mut queued: VecDeque<String> = VecDeque::new();

    loop {
        let line = match queued.pop_front() {
            Some(line) => line,
            None => match rx.lock().unwrap().recv() {
                Ok(line) => line,
                Err(_) => return,
            },
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();

        match tokens.first().copied() {
            Some("uci") => {
                println!("id name {NAME} {VERSION}");
                println!("id author the {NAME} authors");
                println!("option name Hash type spin default {DEFAULT_TT_MB} min 1 max 65536");
                println!("option name Threads type spin default 1 min 1 max 256");
                println!("option name Clear Hash type button");
                println!("option name Ponder type check default false");
                println!("uciok");
            }
            Some("isready") => println!("readyok"),
            Some("setoption") => set_option(&mut session, &tokens),
            Some("ucinewgame") => {
                session.pool.new_game();
                session.board = parse_fen(STARTPOS).expect("startpos parses");
                session.history = vec![session.board.hash];
            }
            Some("position") => set_position(&mut session, &tokens),
            Some("go") => {
                if tokens.get(1) == Some(&"perft") {
                    if let Some(depth) = tokens.get(2).and_then(|d| d.parse().ok()) {
                        perft::divide(&session.board, depth);
                    }
                    continue;
                }
                run_search(&mut session, &tokens, &rx, &mut queued);
            }
            Some("perft") => {
                if let Some(depth) = tokens.get(1).and_then(|d| d.parse().ok()) {
                    perft::divide(&session.board, depth);
                }
            }
            Some("bench") => bench::run(),
            Some("d") => print!("{}", session.board),
            Some("stop") | Some("ponderhit") => {} // no search in flight
            Some("quit") => return,
            Some(other) => log::warn!("unhandled command: {other}"),
            None => {}
        }
    }
}

fn set_option(session: &mut Session, tokens: &[&str]) {
    let name_end = tokens.iter().position(|t| *t == "value").unwrap_or(tokens.len());
    let name = tokens.get(2..name_end).unwrap_or_default().join(" ");
    let value = tokens.get(name_end + 1).copied();

    match name.as_str() {
        "Hash" => {
            if let Some(mb) = value.and_then(|v| v.parse().ok()) {
                session.pool.set_hash(mb);
            }
        }
        "Threads" => {
            if let Some(n) = value.and_then(|v| v.parse().ok()) {
                session.pool.set_threads(n);
            }
        }
        "Clear Hash" => session.pool.tt.clear(),
        // The GUI only advertises pondering; `go ponder` carries the flag
        "Ponder" => {}
        _ => log::warn!("unknown option: {name}"),
    }
}

fn set_position(session: &mut Session, tokens: &[&str]) {
    let board = if tokens.get(1) == Some(&"fen") {
        match parse_fen(&fen_from_tokens(tokens.iter().skip(2).copied())) {
            Ok(board) => board,
            Err(err) => {
                log::warn!("bad fen: {err}");
                return;
            }
        }
    } else {
        parse_fen(STARTPOS).expect("startpos parses")
    };

    session.board = board;
    session.history = vec![session.board.hash];

    if let Some(at) = tokens.iter().position(|t| *t == "moves") {
        for text in &tokens[at + 1..] {
            match move_from_uci(&session.board, text) {
                Some(m) if session.board.make_move(m) => session.history.push(session.board.hash),
                _ => {
                    log::warn!("illegal move in position command: {text}");
                    break;
                }
            }
        }
    }
}

fn parse_go(tokens: &[&str], stm: Color) -> (Limits, bool) {
    let mut ponder = false;
    let mut wtime = None;
    let mut btime = None;
    let mut winc = 0;
    let mut binc = 0;
    let mut moves_to_go = None;
    let mut kind = None;

    let mut it = tokens.iter().skip(1);
    while let Some(token) = it.next() {
        let mut next_number = || it.next().and_then(|v| v.parse::<u64>().ok());
        match *token {
            "ponder" => ponder = true,
            "infinite" => kind = Some(LimitKind::Infinite),
            "depth" => kind = next_number().map(|d| LimitKind::Depth(d as i32)),
            "nodes" => kind = next_number().map(LimitKind::Nodes),
            "movetime" => kind = next_number().map(LimitKind::MoveTime),
            "wtime" => wtime = next_number(),
            "btime" => btime = next_number(),
            "winc" => winc = next_number().unwrap_or(0),
            "binc" => binc = next_number().unwrap_or(0),
            "movestogo" => moves_to_go = next_number().map(|m| m as u32),
            _ => {}
        }
    }

    let kind = kind.unwrap_or_else(|| {
        let (time, inc) = match stm {
            Color::White => (wtime, winc),
            Color::Black => (btime, binc),
        };
        match time {
            Some(time_ms) => LimitKind::Clock { time_ms, inc_ms: inc, moves_to_go },
            None => LimitKind::Infinite,
        }
    });
    (Limits { kind }, ponder)
}

fn run_search(
    session: &mut Session,
    tokens: &[&str],
    rx: &Mutex<Receiver<String>>,
    queued: &mut VecDeque<String>,
) {
    let (limits, ponder) = parse_go(tokens, session.board.stm);
    let (abort, pondering) = session.pool.control_handles();
    let overflow: Mutex<Vec<String>> = Mutex::new(Vec::new());
    let done = AtomicBool::new(false);

    let mut result = (Move::NONE, None);
    thread::scope(|scope| {
        // Watch the command channel while the search blocks this thread
        scope.spawn(|| loop {
            match rx.lock().unwrap().recv_timeout(Duration::from_millis(5)) {
                Ok(line) => match line.trim() {
                    "stop" => abort.store(true, Ordering::Release),
                    "ponderhit" => pondering.store(false, Ordering::Release),
                    "isready" => println!("readyok"),
                    "quit" => {
                        abort.store(true, Ordering::Release);
                        overflow.lock().unwrap().push(line);
                    }
                    _ => overflow.lock().unwrap().push(line),
                },
                Err(RecvTimeoutError::Timeout) => {
                    if done.load(Ordering::Acquire) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        result = session.pool.search(&session.board, &limits, &session.history, ponder);
        done.store(true, Ordering::Release);
    });

    queued.extend(overflow.into_inner().unwrap());

    let (best, ponder_move) = result;
    match (best.is_some(), ponder_move) {
        (false, _) => println!("bestmove (none)"),
        (true, Some(ponder_move)) => println!("bestmove {best} ponder {ponder_move}"),
        (true, None) => println!("bestmove {best}"),
    }
}
