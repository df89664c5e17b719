use criterion::{criterion_group, criterion_main, Criterion};
use fpmdft::fpm::FocalPlaneMaskConvolver;
use fpmdft::image::{ComplexImage, Image};
use fpmdft::num::Complex64;

fn bench_convolve(c: &mut Criterion) {
    let n = 64;
    let pupil: ComplexImage<f64> = Image::from_fn_2d(n, n, |i, j| {
        let (x, y) = (i as f64 - 32.0, j as f64 - 32.0);
        if x * x + y * y <= 900.0 {
            Complex64::from_polar(1.0, 0.01 * x)
        } else {
            Complex64::zero()
        }
    });
    let mask: ComplexImage<f64> = Image::from_fn_2d(n, n, |i, j| {
        let (x, y) = (i as f64 - 32.0, j as f64 - 32.0);
        let r2 = x * x + y * y;
        if r2 > 36.0 && r2 < 576.0 {
            Complex64::new(1.0, 0.0)
        } else {
            Complex64::zero()
        }
    });
    let conv = FocalPlaneMaskConvolver::new(6.0).force_zero_imaginary(true);
    c.bench_function("fpm_64_annulus", |b| {
        b.iter(|| conv.apply(&pupil, &mask).unwrap());
    });
}

criterion_group!(benches, bench_convolve);
criterion_main!(benches);
