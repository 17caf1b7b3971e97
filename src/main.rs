use magnetite::{board, uci};

fn main() {
    board::init();
    uci::run();
}
