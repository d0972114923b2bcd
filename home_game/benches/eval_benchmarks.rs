use criterion::{Criterion, black_box, criterion_group, criterion_main};

use home_game::game::cards::{Card, Suit};
use home_game::game::eval::{evaluate, evaluate_omaha};

fn seven_card_hand() -> Vec<Card> {
    vec![
        Card(14, Suit::Spade),
        Card(13, Suit::Spade),
        Card(9, Suit::Heart),
        Card(9, Suit::Club),
        Card(7, Suit::Diamond),
        Card(4, Suit::Spade),
        Card(2, Suit::Club),
    ]
}

fn bench_evaluate_seven(c: &mut Criterion) {
    let cards = seven_card_hand();
    c.bench_function("evaluate_seven_cards", |b| {
        b.iter(|| evaluate(black_box(&cards)))
    });
}

fn bench_evaluate_five(c: &mut Criterion) {
    let cards = seven_card_hand()[..5].to_vec();
    c.bench_function("evaluate_five_cards", |b| {
        b.iter(|| evaluate(black_box(&cards)))
    });
}

fn bench_evaluate_omaha(c: &mut Criterion) {
    let hole = vec![
        Card(14, Suit::Spade),
        Card(14, Suit::Heart),
        Card(13, Suit::Club),
        Card(2, Suit::Diamond),
    ];
    let board = vec![
        Card(14, Suit::Club),
        Card(9, Suit::Heart),
        Card(9, Suit::Spade),
        Card(5, Suit::Diamond),
        Card(3, Suit::Club),
    ];
    c.bench_function("evaluate_omaha", |b| {
        b.iter(|| evaluate_omaha(black_box(&hole), black_box(&board)))
    });
}

criterion_group!(
    benches,
    bench_evaluate_seven,
    bench_evaluate_five,
    bench_evaluate_omaha
);
criterion_main!(benches);
