use std::io::{self, BufRead};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use crate::board::{Board, Color, Move, Piece, Square, legal_moves, perft};
use crate::search::{self, SearchState};
use crate::types::{DEFAULT_DEPTH, EngineConfig, MAX_PLY};

pub fn run() {
    let stdin = io::stdin();

    let mut board = Board::default();
    let mut config = EngineConfig::default();
    let mut search_state: Option<SearchState> = Some(SearchState::new());
    let mut stop_flag: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
    let mut search_thread: Option<thread::JoinHandle<SearchState>> = None;
    let mut position_history: Vec<u64> = Vec::new();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        match tokens[0] {
            "uci" => {
                println!("id name magnetite {}", env!("CARGO_PKG_VERSION"));
                println!("id author magnetite contributors");
                println!("option name Hash type spin default 64 min 1 max 4096");
                println!("uciok");
            }
            "isready" => {
                wait_for_search(&mut search_thread, &mut search_state);
                println!("readyok");
            }
            "ucinewgame" => {
                wait_for_search(&mut search_thread, &mut search_state);
                board = Board::default();
                position_history.clear();
                if let Some(ref mut ss) = search_state {
                    ss.tt.clear();
                }
            }
            "position" => {
                wait_for_search(&mut search_thread, &mut search_state);
                parse_position(&tokens, &mut board, &mut position_history);
            }
            "go" => {
                wait_for_search(&mut search_thread, &mut search_state);

                if tokens.get(1) == Some(&"perft") {
                    let depth: u32 = tokens.get(2).and_then(|t| t.parse().ok()).unwrap_or(1);
                    run_perft(&board, depth.max(1));
                    continue;
                }

                let go_params = parse_go(&tokens);
                let time_limit = go_params.compute_time_ms(board.side_to_move());
                let max_depth = go_params.depth.unwrap_or({
                    if go_params.infinite || time_limit > 0 {
                        (MAX_PLY - 1) as u8
                    } else {
                        DEFAULT_DEPTH
                    }
                });

                let mut ss = search_state.take().expect("search state missing");
                ss.reset();
                ss.time_limit_ms = time_limit;
                ss.position_history = position_history.clone();

                let flag = Arc::new(AtomicBool::new(false));
                stop_flag = flag.clone();
                ss.stop = flag;

                let board_copy = board;
                search_thread = Some(thread::spawn(move || {
                    let result = search::search(&board_copy, &mut ss, max_depth);
                    match result.best_move {
                        Some(m) => println!("bestmove {}", m),
                        None => println!("bestmove 0000"),
                    }
                    ss
                }));
            }
            "stop" => {
                stop_flag.store(true, Ordering::SeqCst);
                wait_for_search(&mut search_thread, &mut search_state);
            }
            "setoption" => {
                wait_for_search(&mut search_thread, &mut search_state);
                if let Some(ref mut ss) = search_state {
                    parse_setoption(&tokens, &mut config, ss);
                }
            }
            "quit" => {
                stop_flag.store(true, Ordering::SeqCst);
                wait_for_search(&mut search_thread, &mut search_state);
                break;
            }
            "d" | "print" => {
                println!("{}", board);
            }
            _ => {}
        }
    }
}

/// Join a running search thread and recover its state.
fn wait_for_search(
    handle: &mut Option<thread::JoinHandle<SearchState>>,
    state: &mut Option<SearchState>,
) {
    if let Some(h) = handle.take() {
        match h.join() {
            Ok(ss) => *state = Some(ss),
            Err(_) => *state = Some(SearchState::new()),
        }
    }
}

/// Divide-style perft: per-root-move subtotals, then the total and speed.
fn run_perft(board: &Board, depth: u32) {
    let start = Instant::now();
    let mut total = 0u64;
    for mv in legal_moves(board) {
        let nodes = if depth > 0 { perft(&board.make_move(mv), depth.saturating_sub(1)) } else { 0 };
        total += nodes;
        println!("{}: {}", mv, nodes);
    }
    let elapsed = start.elapsed().as_millis().max(1) as u64;
    println!("\nNodes searched: {} ({} ms, {} knps)", total, elapsed, total / elapsed);
}

struct GoParams {
    depth: Option<u8>,
    movetime: Option<u64>,
    wtime: Option<u64>,
    btime: Option<u64>,
    winc: Option<u64>,
    binc: Option<u64>,
    moves_to_go: Option<u64>,
    infinite: bool,
}

impl GoParams {
    fn new() -> Self {
        Self {
            depth: None,
            movetime: None,
            wtime: None,
            btime: None,
            winc: None,
            binc: None,
            moves_to_go: None,
            infinite: false,
        }
    }

    /// Budget for this move in milliseconds; 0 means no time limit.
    fn compute_time_ms(&self, side: Color) -> u64 {
        if self.infinite {
            return 0;
        }
        if let Some(mt) = self.movetime {
            return mt;
        }

        let (my_time, my_inc) = if side == Color::White {
            (self.wtime.unwrap_or(0), self.winc.unwrap_or(0))
        } else {
            (self.btime.unwrap_or(0), self.binc.unwrap_or(0))
        };

        if my_time == 0 {
            return 0; // no clock given: depth-limited search
        }

        let moves_left = self.moves_to_go.unwrap_or(30).max(1);
        let allocated = my_time / moves_left + my_inc * 3 / 4;

        // never commit more than 80% of the remaining clock
        allocated.min(my_time * 4 / 5)
    }
}

fn parse_go(tokens: &[&str]) -> GoParams {
    let mut params = GoParams::new();
    let mut i = 1;

    while i < tokens.len() {
        let value = tokens.get(i + 1);
        match tokens[i] {
            "depth" => {
                params.depth = value.and_then(|t| t.parse().ok());
                i += 1;
            }
            "movetime" => {
                params.movetime = value.and_then(|t| t.parse().ok());
                i += 1;
            }
            "wtime" => {
                params.wtime = value.and_then(|t| t.parse().ok());
                i += 1;
            }
            "btime" => {
                params.btime = value.and_then(|t| t.parse().ok());
                i += 1;
            }
            "winc" => {
                params.winc = value.and_then(|t| t.parse().ok());
                i += 1;
            }
            "binc" => {
                params.binc = value.and_then(|t| t.parse().ok());
                i += 1;
            }
            "movestogo" => {
                params.moves_to_go = value.and_then(|t| t.parse().ok());
                i += 1;
            }
            "infinite" => params.infinite = true,
            _ => {}
        }
        i += 1;
    }

    params
}

fn parse_position(tokens: &[&str], board: &mut Board, history: &mut Vec<u64>) {
    if tokens.len() < 2 {
        return;
    }

    let mut idx = 1;

    if tokens[idx] == "startpos" {
        *board = Board::default();
        idx += 1;
    } else if tokens[idx] == "fen" {
        idx += 1;
        let mut fen_parts: Vec<&str> = Vec::new();
        while idx < tokens.len() && tokens[idx] != "moves" && fen_parts.len() < 6 {
            fen_parts.push(tokens[idx]);
            idx += 1;
        }
        if fen_parts.len() < 4 {
            return;
        }
        match Board::from_str(&fen_parts.join(" ")) {
            Ok(b) => *board = b,
            Err(_) => return,
        }
    } else {
        return;
    }

    history.clear();
    history.push(board.hash());

    if idx < tokens.len() && tokens[idx] == "moves" {
        idx += 1;
        for &move_str in &tokens[idx..] {
            if let Some(m) = parse_uci_move(board, move_str) {
                *board = board.make_move(m);
                history.push(board.hash());
            }
        }
    }
}

/// Resolve a UCI move string against the legal move list, so the move comes
/// back with its kind nibble filled in.
fn parse_uci_move(board: &Board, move_str: &str) -> Option<Move> {
    let bytes = move_str.as_bytes();
    if bytes.len() < 4 {
        return None;
    }

    let src_file = bytes[0].wrapping_sub(b'a');
    let src_rank = bytes[1].wrapping_sub(b'1');
    let dst_file = bytes[2].wrapping_sub(b'a');
    let dst_rank = bytes[3].wrapping_sub(b'1');
    if src_file >= 8 || src_rank >= 8 || dst_file >= 8 || dst_rank >= 8 {
        return None;
    }

    let src = Square::new(src_rank * 8 + src_file);
    let dst = Square::new(dst_rank * 8 + dst_file);

    let promo = if bytes.len() >= 5 {
        match bytes[4] {
            b'q' => Some(Piece::Queen),
            b'r' => Some(Piece::Rook),
            b'b' => Some(Piece::Bishop),
            b'n' => Some(Piece::Knight),
            _ => None,
        }
    } else {
        None
    };

    board.find_move(src, dst, promo)
}

fn parse_setoption(tokens: &[&str], config: &mut EngineConfig, state: &mut SearchState) {
    let name_idx = tokens.iter().position(|&t| t == "name");
    let value_idx = tokens.iter().position(|&t| t == "value");

    if let (Some(ni), Some(vi)) = (name_idx, value_idx) {
        let name: String = tokens[ni + 1..vi].join(" ");
        let value: String = tokens[vi + 1..].join(" ");

        if name.to_lowercase() == "hash" {
            if let Ok(mb) = value.parse::<usize>() {
                config.hash_mb = mb.clamp(1, 4096);
                state.resize_tt(config.hash_mb);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position_startpos() {
        let mut board = Board::default();
        let mut history = Vec::new();
        parse_position(&["position", "startpos"], &mut board, &mut history);
        assert_eq!(board, Board::default());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_parse_position_with_moves() {
        let mut board = Board::default();
        let mut history = Vec::new();
        parse_position(&["position", "startpos", "moves", "e2e4", "e7e5"], &mut board, &mut history);
        assert_ne!(board, Board::default());
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_parse_position_fen() {
        let mut board = Board::default();
        let mut history = Vec::new();
        let tokens = [
            "position", "fen", "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR", "b", "KQkq", "e3",
            "0", "1",
        ];
        parse_position(&tokens, &mut board, &mut history);
        assert_eq!(board.side_to_move(), Color::Black);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_parse_go_depth_and_clock() {
        let params = parse_go(&["go", "depth", "6"]);
        assert_eq!(params.depth, Some(6));

        let params = parse_go(&["go", "wtime", "60000", "btime", "50000", "winc", "1000"]);
        assert_eq!(params.wtime, Some(60000));
        assert_eq!(params.btime, Some(50000));
        assert_eq!(params.winc, Some(1000));
        assert!(!params.infinite);
    }

    #[test]
    fn test_compute_time_allocation() {
        let mut params = GoParams::new();
        params.wtime = Some(60000);
        params.winc = Some(1000);
        let time = params.compute_time_ms(Color::White);
        assert!(time > 0 && time <= 48000, "allocation {} out of range", time);

        params.infinite = true;
        assert_eq!(params.compute_time_ms(Color::White), 0);
    }

    #[test]
    fn test_movetime_passthrough() {
        let mut params = GoParams::new();
        params.movetime = Some(1234);
        assert_eq!(params.compute_time_ms(Color::Black), 1234);
    }

    #[test]
    fn test_parse_uci_move() {
        let board = Board::default();
        assert!(parse_uci_move(&board, "e2e4").is_some());
        assert!(parse_uci_move(&board, "e2e5").is_none()); // not legal
        assert!(parse_uci_move(&board, "zz99").is_none());

        let mv = parse_uci_move(&board, "e2e4").unwrap();
        assert!(mv.is_double_push());
    }

    #[test]
    fn test_parse_uci_promotion() {
        let board = Board::from_str("8/P7/8/8/8/8/8/K6k w - - 0 1").unwrap();
        let mv = parse_uci_move(&board, "a7a8q").unwrap();
        assert_eq!(mv.promotion(), Some(Piece::Queen));
        let mv = parse_uci_move(&board, "a7a8n").unwrap();
        assert_eq!(mv.promotion(), Some(Piece::Knight));
    }

    #[test]
    fn test_parse_setoption_hash() {
        let mut config = EngineConfig::default();
        let mut state = SearchState::new();
        parse_setoption(&["setoption", "name", "Hash", "value", "128"], &mut config, &mut state);
        assert_eq!(config.hash_mb, 128);
    }

    #[test]
    fn test_history_records_repetition() {
        let mut board = Board::default();
        let mut history = Vec::new();
        let tokens = ["position", "startpos", "moves", "g1f3", "g8f6", "f3g1", "f6g8"];
        parse_position(&tokens, &mut board, &mut history);
        assert_eq!(history.len(), 5);
        assert_eq!(history[0], history[4], "knight shuffle should repeat the start position");
    }
}
