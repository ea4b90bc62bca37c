// ─────────────────────────────────────────────────────────────────────
// SCPN Recon Core — Operator Algebra Benchmark
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use recon_op::{DiagScale, FreqDiag, Multiply, Operator, VStack};

fn random_vec(n: usize, rng: &mut StdRng) -> ArrayD<Complex64> {
    let data: Vec<Complex64> = (0..n)
        .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect();
    ArrayD::from_shape_vec(IxDyn(&[n]), data).unwrap()
}

fn random_kernel(n: usize, rng: &mut StdRng) -> Vec<Complex64> {
    (0..n)
        .map(|_| Complex64::new(1.0 + rng.gen_range(0.0..1.0), rng.gen_range(-0.5..0.5)))
        .collect()
}

fn bench_composite_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite_forward");
    group.sample_size(30);

    for n in [1024usize, 4096usize] {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let freq: Arc<dyn Operator> = Arc::new(FreqDiag::new(random_kernel(n, &mut rng)).unwrap());
        let stacked: Arc<dyn Operator> = Arc::new(
            VStack::new(freq.clone(), Arc::new(DiagScale::new(&[n], 0.5))).unwrap(),
        );
        let op = Multiply::new(vec![
            Arc::new(DiagScale::new(&[2 * n], 2.0)) as Arc<dyn Operator>,
            stacked,
        ])
        .unwrap();
        let x = random_vec(n, &mut rng);

        group.bench_function(format!("vstack_multiply_{}", n), |b| {
            b.iter(|| {
                let y = op.forward(black_box(&x)).unwrap();
                black_box(y);
            })
        });

        group.bench_function(format!("freq_gram_{}", n), |b| {
            b.iter(|| {
                let y = freq.adjoint_forward(black_box(&x)).unwrap();
                black_box(y);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_composite_forward);
criterion_main!(benches);
