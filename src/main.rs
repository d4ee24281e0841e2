mod bench;
mod board;
mod eval;
mod moves;
mod perft;
mod search;
mod syzygy;
mod transposition;
mod types;
mod uci;

use std::env;

fn main() {
    if env::args().any(|arg| arg == "bench") {
        bench::run();
    } else {
        uci::main_loop();
    }
}
