use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pairenc::decompose::decompose_encoding;
use pairenc::solver::{solve_linear_attack, unknown_symbols};
use pairenc::{parse_expr, Expr};

fn e(s: &str) -> Expr {
    parse_expr(s).unwrap()
}

fn wat11_products() -> (Vec<Expr>, Vec<Expr>) {
    let k = vec![e("alpha + r*b"), e("r*b0"), e("r")];
    let c = vec![e("s*b - s1*b + sp*b1"), e("s"), e("sp"), e("s1*b + sp*b2")];
    let unknown: Vec<Expr> = ["alpha", "b", "b0", "b1", "b2", "r", "s", "s1", "sp"]
        .iter()
        .map(|n| e(n))
        .collect();
    let mut products = Vec::new();
    for ki in &k {
        for ci in &c {
            products.push(ki * ci);
        }
    }
    (products, unknown)
}

fn bench_decompose(c: &mut Criterion) {
    let (products, unknown) = wat11_products();
    let unknown_syms = unknown_symbols(&unknown);
    c.bench_function("decompose_wat11_products", |b| {
        b.iter(|| decompose_encoding(black_box(&products), black_box(&unknown_syms)))
    });
}

fn bench_attack_search(c: &mut Criterion) {
    let (products, unknown) = wat11_products();
    let target = e("alpha*s");
    c.bench_function("attack_search_wat11", |b| {
        b.iter(|| solve_linear_attack(black_box(&target), black_box(&products), black_box(&unknown)))
    });
}

criterion_group!(benches, bench_decompose, bench_attack_search);
criterion_main!(benches);
