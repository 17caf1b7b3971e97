use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use arrayvec::ArrayVec;

use crate::board::{Board, Move, Piece};
use crate::evaluation::evaluate;
use crate::history::Heuristics;
use crate::movegen::{OrderingContext, bubble_top_move, score_moves, score_noisy_moves};
use crate::see::{STATIC_MATERIAL_VALUE, see};
use crate::tt::{Bound, TranspositionTable};
use crate::types::{CHECKMATE, COUNTER, DEFAULT_HASH_MB, MATE_BOUND, MAX_PLY, Score, SearchResult};

const FUTILITY_MARGIN: Score = 85;
const DELTA_CUTOFF: Score = 200;
const ASPIRATION_DELTA: Score = 10;
/// Stop-flag poll interval in nodes.
const NODE_POLL_MASK: u64 = 2047;

/// Late-move reduction matrix by depth and move count.
static LMR: LazyLock<[[i32; 64]; 64]> = LazyLock::new(|| {
    let mut table = [[0i32; 64]; 64];
    for (d, row) in table.iter_mut().enumerate().skip(1) {
        for (m, r) in row.iter_mut().enumerate().skip(1) {
            *r = (0.6 + (d as f64).ln() * (1.2 * m as f64).ln() / 2.5).floor() as i32;
        }
    }
    table
});

/// Late-move pruning move counts, [improving][depth].
const LMP: [[i32; 9]; 2] = {
    let mut table = [[0i32; 9]; 2];
    let mut d = 0;
    while d < 9 {
        let dd = (d * d) as i32;
        table[0][d] = (3 + dd) / 2;
        table[1][d] = 3 + dd;
        d += 1;
    }
    table
};

/// SEE pruning margins, [tactical][depth].
const SEE_MARGIN: [[Score; 64]; 2] = {
    let mut table = [[0 as Score; 64]; 2];
    let mut d = 0;
    while d < 64 {
        let di = d as Score;
        table[0][d] = -20 * di * di; // quiet
        table[1][d] = -70 * di; // capture/promotion
        d += 1;
    }
    table
};

/// A principal variation: fixed-size line plus length. Children write their
/// own line and parents splice it behind the move just played.
#[derive(Clone, Copy)]
pub struct PVLine {
    moves: [Move; MAX_PLY],
    len: usize,
}

impl PVLine {
    pub fn new() -> Self {
        Self { moves: [Move::NULL; MAX_PLY], len: 0 }
    }

    fn clear(&mut self) {
        self.len = 0;
    }

    fn update(&mut self, mv: Move, child: &PVLine) {
        self.moves[0] = mv;
        let n = child.len.min(MAX_PLY - 1);
        self.moves[1..=n].copy_from_slice(&child.moves[..n]);
        self.len = n + 1;
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves[..self.len]
    }
}

impl Default for PVLine {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable search state threaded through the recursion. Owns the TT and the
/// heuristic tables so nothing about a search is process-global.
pub struct SearchState {
    pub nodes: u64,
    pub seldepth: usize,
    pub start_time: Instant,
    pub stop: Arc<AtomicBool>,
    pub time_limit_ms: u64,
    pub silent: bool,
    pub tt: TranspositionTable,
    pub heuristics: Heuristics,
    /// Hashes of every position on the path from the game start; the search
    /// pushes each node's hash before recursing so children can detect
    /// repetitions.
    pub position_history: Vec<u64>,
    evals: [Score; MAX_PLY],
    played: [Move; MAX_PLY],
    skip_move: [Move; MAX_PLY],
}

impl SearchState {
    pub fn new() -> Self {
        Self {
            nodes: 0,
            seldepth: 0,
            start_time: Instant::now(),
            stop: Arc::new(AtomicBool::new(false)),
            time_limit_ms: 0,
            silent: false,
            tt: TranspositionTable::new(DEFAULT_HASH_MB),
            heuristics: Heuristics::new(),
            position_history: Vec::with_capacity(256),
            evals: [0; MAX_PLY],
            played: [Move::NULL; MAX_PLY],
            skip_move: [Move::NULL; MAX_PLY],
        }
    }

    /// Fresh search: zeroed counters, heuristics, and TT.
    pub fn reset(&mut self) {
        self.nodes = 0;
        self.seldepth = 0;
        self.stop.store(false, Ordering::SeqCst);
        self.start_time = Instant::now();
        self.heuristics.reset();
        self.tt.clear();
        self.evals = [0; MAX_PLY];
        self.played = [Move::NULL; MAX_PLY];
        self.skip_move = [Move::NULL; MAX_PLY];
    }

    pub fn resize_tt(&mut self, mb: usize) {
        self.tt.resize(mb);
    }

    /// Re-check the clock every 2048 nodes; the UCI thread flips the shared
    /// flag for `stop`/`quit`.
    fn communicate(&mut self) {
        if self.nodes & NODE_POLL_MASK != 0 {
            return;
        }
        if self.time_limit_ms > 0 {
            let elapsed = self.start_time.elapsed().as_millis() as u64;
            if elapsed >= self.time_limit_ms {
                self.stop.store(true, Ordering::Relaxed);
            }
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn is_repetition(&self, hash: u64) -> bool {
        self.position_history.iter().rev().any(|&h| h == hash)
    }
}

impl Default for SearchState {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a score for UCI output (centipawns or mate-in-N full moves).
pub fn format_score(score: Score) -> String {
    if score.abs() > MATE_BOUND {
        let moves = (CHECKMATE - score.abs() + 1) / 2;
        if score > 0 { format!("mate {}", moves) } else { format!("mate -{}", moves) }
    } else {
        format!("cp {}", score)
    }
}

/// Iterative deepening driver: searches depth 1 up to `max_depth`, printing
/// one info line per completed depth. The reported best move is the root TT
/// move once the search ends.
pub fn search(board: &Board, state: &mut SearchState, max_depth: u8) -> SearchResult {
    let mut best_move: Option<Move> = None;
    let mut last_score: Score = 0;
    let mut completed_depth: u8 = 0;

    for depth in 1..=max_depth {
        state.seldepth = 0;
        let mut pv = PVLine::new();
        let score = aspiration(board, state, depth as i32, last_score, &mut pv);

        if state.stopped() {
            // discard the interrupted iteration
            break;
        }

        last_score = score;
        completed_depth = depth;
        if let Some(&first) = pv.moves().first() {
            best_move = Some(first);
        }

        if !state.silent {
            print_info(state, depth, score, &pv);
        }

        // soft limit: don't start an iteration we can't finish
        if state.time_limit_ms > 0 {
            let elapsed = state.start_time.elapsed().as_millis() as u64;
            if elapsed > state.time_limit_ms / 2 {
                break;
            }
        }

        if score.abs() > MATE_BOUND {
            break;
        }
    }

    // the root TT entry carries the final best move
    if let Some(entry) = state.tt.probe(board.hash()) {
        let mv = entry.mv();
        if mv != Move::NULL && board.legal(mv) {
            best_move = Some(mv);
        }
    }

    SearchResult {
        best_move,
        score: last_score,
        depth: completed_depth,
        seldepth: state.seldepth,
        nodes: state.nodes,
    }
}

/// One depth through an aspiration window: a narrow window around the last
/// score, widened (delta * 1.5 each time) until the result lands inside.
fn aspiration(
    board: &Board,
    state: &mut SearchState,
    depth: i32,
    prev_score: Score,
    pv: &mut PVLine,
) -> Score {
    let mut delta = ASPIRATION_DELTA;
    let (mut alpha, mut beta) = if depth >= 5 && prev_score.abs() < MATE_BOUND {
        (prev_score - delta, prev_score + delta)
    } else {
        (-CHECKMATE, CHECKMATE)
    };

    loop {
        let score = negamax(board, state, alpha, beta, depth, 0, true, pv);
        if state.stopped() {
            return score;
        }

        if score <= alpha {
            if alpha <= -CHECKMATE {
                return score;
            }
            beta = (alpha + beta) / 2;
            alpha = (alpha - delta).max(-CHECKMATE);
        } else if score >= beta {
            if beta >= CHECKMATE {
                return score;
            }
            beta = (beta + delta).min(CHECKMATE);
        } else {
            return score;
        }
        delta += delta / 2;
    }
}

fn print_info(state: &SearchState, depth: u8, score: Score, pv: &PVLine) {
    let elapsed = state.start_time.elapsed().as_millis().max(1) as u64;
    let nps = state.nodes * 1000 / elapsed;
    let pv_str: Vec<String> = pv.moves().iter().map(|m| m.to_string()).collect();
    println!(
        "info depth {} seldepth {} nodes {} time {} nps {} score {} pv {}",
        depth,
        state.seldepth,
        state.nodes,
        elapsed,
        nps,
        format_score(score),
        pv_str.join(" ")
    );
}

/// Fail-soft PVS negamax.
#[allow(clippy::too_many_arguments)]
fn negamax(
    board: &Board,
    state: &mut SearchState,
    mut alpha: Score,
    mut beta: Score,
    depth: i32,
    ply: usize,
    can_null: bool,
    pv: &mut PVLine,
) -> Score {
    pv.clear();

    if depth <= 0 {
        return quiescence(board, state, alpha, beta, ply, pv);
    }

    state.nodes += 1;
    state.seldepth = state.seldepth.max(ply);

    let is_root = ply == 0;
    let is_pv = beta - alpha > 1;
    let in_check = board.in_check();

    if !is_root {
        if board.halfmove_clock() >= 100
            || board.is_insufficient_material()
            || state.is_repetition(board.hash())
        {
            return 0;
        }
        if ply >= MAX_PLY - 1 {
            return evaluate(board);
        }

        // mate-distance pruning: even a forced mate here can't beat one
        // already found closer to the root
        alpha = alpha.max(-CHECKMATE + ply as Score);
        beta = beta.min(CHECKMATE - ply as Score - 1);
        if alpha >= beta {
            return alpha;
        }
    }

    state.communicate();
    if state.stopped() {
        return 0;
    }

    let skip = state.skip_move[ply];

    let tt_entry = if skip == Move::NULL { state.tt.probe(board.hash()) } else { None };
    if !is_root && let Some(entry) = tt_entry && entry.depth() >= depth {
        let tt_score = entry.score_at(ply);
        match entry.bound() {
            Bound::Exact => return tt_score,
            Bound::Lower if tt_score >= beta => return tt_score,
            Bound::Upper if tt_score <= alpha => return tt_score,
            _ => {}
        }
    }
    let tt_move = tt_entry.map_or(Move::NULL, |e| e.mv());

    let static_eval = match tt_entry {
        Some(entry) => entry.eval(),
        None => evaluate(board),
    };
    state.evals[ply] = static_eval;
    // improving is judged on the raw static evals, before any TT refinement
    let improving = ply >= 2 && state.evals[ply] > state.evals[ply - 2];

    if !is_pv && !in_check {
        // a deep-enough TT score is a better bound than the static eval
        let mut eval = static_eval;
        if let Some(entry) = tt_entry && entry.depth() >= depth {
            let tt_score = entry.score_at(ply);
            match entry.bound() {
                Bound::Lower if tt_score > eval => eval = tt_score,
                Bound::Upper if tt_score < eval => eval = tt_score,
                _ => {}
            }
        }

        // reverse futility pruning
        if depth <= 6 && eval - FUTILITY_MARGIN * depth >= beta && eval < MATE_BOUND {
            return eval;
        }

        // null-move pruning: hand over the move and search reduced; if the
        // opponent still can't reach beta, neither can any real reply
        if depth >= 3
            && can_null
            && skip == Move::NULL
            && eval >= beta
            && board.has_non_pawn_material()
            && let Some(null_board) = board.make_null()
        {
            let r = (3 + depth / 6 + ((eval - beta) / 200).min(3)).min(depth);
            state.played[ply] = Move::NULL;
            state.position_history.push(board.hash());
            state.tt.prefetch(null_board.hash());
            let mut child_pv = PVLine::new();
            let score = -negamax(
                &null_board,
                state,
                -beta,
                -beta + 1,
                depth - r,
                ply + 1,
                false,
                &mut child_pv,
            );
            state.position_history.pop();
            if state.stopped() {
                return 0;
            }
            if score >= beta {
                return beta;
            }
        }
    }

    if ply + 1 < MAX_PLY {
        state.skip_move[ply + 1] = Move::NULL;
        state.heuristics.clear_killers(ply + 1);
    }

    let mut list = {
        let previous = if ply > 0 { state.played[ply - 1] } else { Move::NULL };
        let ctx = OrderingContext {
            tt_move,
            killers: state.heuristics.killers(ply),
            counter: if previous != Move::NULL {
                state.heuristics.counter_move(previous)
            } else {
                Move::NULL
            },
            side: board.side_to_move().to_index(),
            heuristics: &state.heuristics,
        };
        score_moves(board, &ctx)
    };
    let generated = list.len();

    let a0 = alpha;
    let mut best_score = -CHECKMATE;
    let mut best_move = Move::NULL;
    let mut num_moves = 0i32;
    let mut quiets_tried: ArrayVec<Move, 256> = ArrayVec::new();

    let mut i = 0;
    while i < list.len() {
        bubble_top_move(&mut list, i);
        let mv = list[i].mv;
        let move_score = list[i].score;
        i += 1;

        if mv == skip {
            continue;
        }

        let tactical = mv.is_capture() || mv.is_promotion();

        if !is_pv && best_score > -MATE_BOUND {
            // late-move pruning: past this many quiet moves, the rest are
            // not worth a search at shallow depth
            if depth <= 8
                && !tactical
                && num_moves >= LMP[improving as usize][depth as usize]
            {
                continue;
            }

            // SEE pruning: losing exchanges get a depth-scaled pass
            if see(board, mv) < SEE_MARGIN[tactical as usize][depth.min(63) as usize] {
                continue;
            }
        }

        // singular extension: if every alternative fails well below the TT
        // score, the TT move is forced enough to deserve an extra ply
        let mut singular = false;
        if depth >= 8
            && !is_root
            && skip == Move::NULL
            && mv == tt_move
            && let Some(entry) = tt_entry
            && entry.depth() >= depth - 3
            && entry.score_at(ply).abs() < MATE_BOUND
            && entry.bound() == Bound::Lower
        {
            let tt_score = entry.score_at(ply);
            let s_beta = (tt_score - 2 * depth).max(-CHECKMATE);
            let s_depth = depth / 2 - 1;

            state.skip_move[ply] = mv;
            let mut line = PVLine::new();
            let score =
                negamax(board, state, s_beta - 1, s_beta, s_depth, ply, can_null, &mut line);
            state.skip_move[ply] = Move::NULL;
            if state.stopped() {
                return 0;
            }

            if score < s_beta {
                singular = true;
            } else if s_beta >= beta {
                // multi-cut: a second move also beats beta at reduced depth
                return s_beta;
            }
        }

        num_moves += 1;
        state.played[ply] = mv;
        if !tactical {
            quiets_tried.push(mv);
        }

        let next = board.make_move(mv);
        state.tt.prefetch(next.hash());
        let gives_check = next.in_check();
        let new_depth = depth + (singular || gives_check) as i32;

        // late-move reduction for quiet moves after the first
        let mut r = 1;
        if depth >= 2 && num_moves > 1 && !tactical {
            r = LMR[depth.min(63) as usize][(num_moves as usize).min(63)];
            r += !is_pv as i32 + !improving as i32 - (move_score >= COUNTER) as i32;
            if move_score >= COUNTER {
                r -= 1;
            } else {
                r -= Score::min(2, (move_score - 149) / 50);
            }
            r = r.clamp(1, depth - 1);
        }

        state.position_history.push(board.hash());
        let mut child_pv = PVLine::new();
        let mut score = 0;

        // PVS re-search ladder: reduced null window, full-depth null
        // window, then the full window for PV candidates
        if r != 1 {
            score = -negamax(&next, state, -alpha - 1, -alpha, new_depth - r, ply + 1, true, &mut child_pv);
        }
        if (r != 1 && score > alpha) || (r == 1 && !(is_pv && num_moves == 1)) {
            score = -negamax(&next, state, -alpha - 1, -alpha, new_depth - 1, ply + 1, true, &mut child_pv);
        }
        if is_pv && (num_moves == 1 || (score > alpha && (is_root || score < beta))) {
            score = -negamax(&next, state, -beta, -alpha, new_depth - 1, ply + 1, true, &mut child_pv);
        }
        state.position_history.pop();

        if state.stopped() {
            return 0;
        }

        if score > best_score {
            best_score = score;
            best_move = mv;
        }
        if score > alpha {
            alpha = score;
            pv.update(mv, &child_pv);
        }
        if alpha >= beta {
            let side = board.side_to_move().to_index();
            if !tactical {
                state.heuristics.add_killer(ply, mv);
                if ply > 0 {
                    let previous = state.played[ply - 1];
                    if previous != Move::NULL {
                        state.heuristics.add_counter(previous, mv);
                    }
                }
                state.heuristics.add_history(side, mv, depth);
            }
            // the quiets searched before the cutoff move failed to cut
            for &quiet in &quiets_tried {
                if quiet != mv {
                    state.heuristics.add_butterfly(side, quiet, depth);
                }
            }
            break;
        }
    }

    if generated == 0 {
        return if in_check { -CHECKMATE + ply as Score } else { 0 };
    }

    if skip == Move::NULL && !state.stopped() {
        let bound = if best_score >= beta {
            Bound::Lower
        } else if best_score <= a0 {
            Bound::Upper
        } else {
            Bound::Exact
        };
        state.tt.put(board.hash(), depth, best_score, bound, best_move, ply, state.evals[ply]);
    }

    best_score
}

/// Captures-and-promotions-only search that resolves the horizon: recursion
/// ends when no noisy move improves on standing pat.
fn quiescence(
    board: &Board,
    state: &mut SearchState,
    mut alpha: Score,
    beta: Score,
    ply: usize,
    pv: &mut PVLine,
) -> Score {
    state.nodes += 1;
    state.seldepth = state.seldepth.max(ply);

    if board.halfmove_clock() >= 100
        || board.is_insufficient_material()
        || state.is_repetition(board.hash())
    {
        return 0;
    }

    if ply >= MAX_PLY - 1 {
        return evaluate(board);
    }

    state.communicate();
    if state.stopped() {
        return 0;
    }

    // quiescence reads the TT but never writes it
    let tt_entry = state.tt.probe(board.hash());
    if let Some(entry) = tt_entry {
        let tt_score = entry.score_at(ply);
        match entry.bound() {
            Bound::Exact => return tt_score,
            Bound::Lower if tt_score >= beta => return tt_score,
            Bound::Upper if tt_score <= alpha => return tt_score,
            _ => {}
        }
    }

    // stand pat, refined by the TT score when its bound points the same way
    let mut stand_pat = match tt_entry {
        Some(entry) => entry.eval(),
        None => evaluate(board),
    };
    if let Some(entry) = tt_entry {
        let tt_score = entry.score_at(ply);
        match entry.bound() {
            Bound::Lower if tt_score > stand_pat => stand_pat = tt_score,
            Bound::Upper if tt_score < stand_pat => stand_pat = tt_score,
            _ => {}
        }
    }

    if stand_pat >= beta {
        return stand_pat;
    }
    if stand_pat > alpha {
        alpha = stand_pat;
    }

    let mut list = score_noisy_moves(board);
    let mut best_score = stand_pat;

    let mut i = 0;
    while i < list.len() {
        bubble_top_move(&mut list, i);
        let mv = list[i].mv;
        let move_score = list[i].score;
        i += 1;

        // under-promotions are noise, not wins
        if mv.is_promotion() && mv.promotion() != Some(Piece::Queen) {
            continue;
        }

        // delta pruning: even winning this victim outright can't lift alpha
        if mv.is_capture() {
            let victim = if mv.is_en_passant() {
                Piece::Pawn
            } else {
                board.piece_on(mv.dest()).unwrap_or(Piece::Pawn)
            };
            if stand_pat + DELTA_CUTOFF + STATIC_MATERIAL_VALUE[victim.to_index()] < alpha {
                continue;
            }
        }

        // the list is selection-sorted: the first SEE-losing capture means
        // everything left loses at least as much
        if move_score < 0 {
            break;
        }

        let next = board.make_move(mv);
        state.position_history.push(board.hash());
        let mut child_pv = PVLine::new();
        let score = -quiescence(&next, state, -beta, -alpha, ply + 1, &mut child_pv);
        state.position_history.pop();
        if state.stopped() {
            return 0;
        }

        if score > best_score {
            best_score = score;
        }
        if score > alpha {
            alpha = score;
            pv.update(mv, &child_pv);
        }
        if alpha >= beta {
            break;
        }
    }

    best_score
}
