use fpmdft::fft::{
    Complex32, Complex64, Direction, FftError, FftImpl, FftPlanner, FftStrategy, ScalarFftImpl,
};
use fpmdft::ndfft::{fft2d_plane, fft2d_planes};

fn generate_input(n: usize) -> Vec<Complex32> {
    (0..n)
        .map(|i| Complex32::new(i as f32, (i * 2) as f32))
        .collect()
}

fn assert_parity(n: usize) {
    let fft = ScalarFftImpl::<f32>::default();
    let mut radix2_data = generate_input(n);
    let mut stockham_data = radix2_data.clone();

    fft.fft_with_strategy(&mut radix2_data, FftStrategy::Radix2).unwrap();
    fft.fft_with_strategy(&mut stockham_data, FftStrategy::Stockham).unwrap();

    let tol = 1e-5 * (n * n) as f32;
    for (a, b) in radix2_data.iter().zip(stockham_data.iter()) {
        assert!((a.re - b.re).abs() < tol && (a.im - b.im).abs() < tol);
    }
}

#[test]
fn parity_between_radix2_and_stockham() {
    for &n in &[2_usize, 8, 16, 64, 256] {
        assert_parity(n);
    }
}

#[test]
fn planner_prefers_recorded_strategy() {
    let mut planner = FftPlanner::<f32>::new();
    assert_eq!(planner.plan_strategy(32), FftStrategy::Radix2);
    assert_eq!(planner.plan_strategy(1024), FftStrategy::Stockham);
    planner.set_strategy(1024, FftStrategy::Radix2);
    assert_eq!(planner.plan_strategy(1024), FftStrategy::Radix2);
    planner.set_strategy(1024, FftStrategy::Auto);
    assert_eq!(planner.plan_strategy(1024), FftStrategy::Stockham);
}

#[test]
fn twiddles_are_cached_per_length() {
    let mut planner = FftPlanner::<f64>::new();
    let a = planner.get_twiddles(16);
    let b = planner.get_twiddles(16);
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(a.len(), 8);
    planner.get_twiddles(32);
    assert_eq!(planner.cached_lengths(), 2);
}

#[test]
fn rejects_bad_lengths() {
    let fft = ScalarFftImpl::<f64>::default();
    let mut empty: Vec<Complex64> = Vec::new();
    assert_eq!(fft.fft(&mut empty), Err(FftError::EmptyInput));
    let mut six = vec![Complex64::zero(); 6];
    assert_eq!(fft.fft(&mut six), Err(FftError::NonPowerOfTwo(6)));
    let mut out = vec![Complex64::zero(); 4];
    assert_eq!(
        fft.fft_out_of_place(&six, &mut out),
        Err(FftError::MismatchedLengths)
    );
}

#[test]
fn direction_from_sign() {
    assert_eq!(Direction::try_from(-1), Ok(Direction::Forward));
    assert_eq!(Direction::try_from(1), Ok(Direction::Inverse));
    assert!(Direction::try_from(3).is_err());
    assert_eq!(Direction::Forward.reversed(), Direction::Inverse);
}

#[test]
fn plane_transform_matches_stack_transform() {
    let fft = ScalarFftImpl::<f64>::default();
    let (nx, ny) = (8, 4);
    let plane: Vec<Complex64> = (0..nx * ny)
        .map(|i| Complex64::new((i % 5) as f64, (i % 3) as f64 - 1.0))
        .collect();
    let mut single = plane.clone();
    fft2d_plane(&mut single, nx, ny, &fft, Direction::Forward).unwrap();

    let mut stack = plane.clone();
    stack.extend_from_slice(&plane);
    fft2d_planes(&mut stack, nx, ny, Direction::Forward).unwrap();
    for k in 0..2 {
        for (a, b) in stack[k * nx * ny..(k + 1) * nx * ny].iter().zip(&single) {
            assert!((a.re - b.re).abs() < 1e-12 && (a.im - b.im).abs() < 1e-12);
        }
    }

    fft2d_planes(&mut stack, nx, ny, Direction::Inverse).unwrap();
    for (a, b) in stack[..nx * ny].iter().zip(&plane) {
        assert!((a.re - 32.0 * b.re).abs() < 1e-10);
        assert!((a.im - 32.0 * b.im).abs() < 1e-10);
    }
}
