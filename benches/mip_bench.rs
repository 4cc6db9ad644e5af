use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use mipmem::element::Element;
use mipmem::mip;
use mipmem::types::Type;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn noise(len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(0x2545_f491);
    let mut bytes = vec![0u8; len];
    rng.fill(bytes.as_mut_slice());
    bytes
}

fn chain_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_chain");

    for (name, element) in [
        ("rgba8888", Element::rgba_8888()),
        ("rgb565", Element::rgb_565()),
        ("a8", Element::a_8()),
    ] {
        let element = Arc::new(element);
        for size in [64u32, 256, 1024] {
            let ty = Type::new_2d(Arc::clone(&element), size, size, true)
                .unwrap();
            let mut buf = noise(ty.total_bytes());
            group.bench_function(format!("{name}_{size}"), |b| {
                b.iter(|| mip::generate_chain(black_box(&ty), &mut buf))
            });
        }
    }

    group.finish();
}

fn cube_benchmark(c: &mut Criterion) {
    let ty =
        Type::new_cube(Arc::new(Element::rgba_8888()), 256, true).unwrap();
    let mut buf = noise(ty.total_bytes());
    c.bench_function("generate_chain_cube_256", |b| {
        b.iter(|| mip::generate_chain(black_box(&ty), &mut buf))
    });
}

fn box_filter_benchmark(c: &mut Criterion) {
    c.bench_function("box_filter_8888", |b| {
        b.iter(|| {
            mip::box_filter_8888(
                black_box(0xff00_00ff),
                black_box(0x00ff_00ff),
                black_box(0x0000_ffff),
                black_box(0xffff_ffff),
            )
        })
    });
}

criterion_group!(
    benches,
    chain_benchmark,
    cube_benchmark,
    box_filter_benchmark
);
criterion_main!(benches);
