use criterion::{Criterion, criterion_group, criterion_main};
use magnetite::board::{Board, legal_moves};
use magnetite::search::{SearchState, search};
use std::str::FromStr;

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

fn bench_search(c: &mut Criterion) {
    magnetite::board::init();
    let startpos = Board::default();
    let kiwipete = Board::from_str(KIWIPETE).unwrap();

    c.bench_function("search_depth_4_startpos", |b| {
        b.iter(|| {
            let mut state = SearchState::new();
            state.silent = true;
            search(&startpos, &mut state, 4)
        })
    });

    c.bench_function("search_depth_4_kiwipete", |b| {
        b.iter(|| {
            let mut state = SearchState::new();
            state.silent = true;
            search(&kiwipete, &mut state, 4)
        })
    });

    c.bench_function("search_depth_6_startpos", |b| {
        b.iter(|| {
            let mut state = SearchState::new();
            state.silent = true;
            search(&startpos, &mut state, 6)
        })
    });
}

fn bench_movegen(c: &mut Criterion) {
    magnetite::board::init();
    let startpos = Board::default();
    let kiwipete = Board::from_str(KIWIPETE).unwrap();

    c.bench_function("movegen_startpos", |b| b.iter(|| legal_moves(&startpos).len()));
    c.bench_function("movegen_kiwipete", |b| b.iter(|| legal_moves(&kiwipete).len()));
}

criterion_group!(benches, bench_search, bench_movegen);
criterion_main!(benches);
