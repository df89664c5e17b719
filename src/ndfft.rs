//! Multi-dimensional FFTs over flat, row-major planes.
//!
//! A plane of `nx × ny` values is stored with x fastest. 2D transforms use
//! the row-column algorithm: every row, then every column through a strided
//! gather. Stacks of planes are transformed plane by plane, in parallel when
//! the `parallel` feature is enabled.

use alloc::vec;

use crate::fft::{Complex, Direction, FftError, FftImpl, Float, ScalarFftImpl};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Transform every row of length `nx` in `data`.
pub fn fft_rows<T: Float>(
    data: &mut [Complex<T>],
    nx: usize,
    fft: &ScalarFftImpl<T>,
    direction: Direction,
) -> Result<(), FftError> {
    if nx == 0 || data.is_empty() {
        return Err(FftError::EmptyInput);
    }
    if data.len() % nx != 0 {
        return Err(FftError::MismatchedLengths);
    }
    for row in data.chunks_mut(nx) {
        fft.transform(row, direction)?;
    }
    Ok(())
}

/// 2D transform of a single `nx × ny` plane, in place.
pub fn fft2d_plane<T: Float>(
    data: &mut [Complex<T>],
    nx: usize,
    ny: usize,
    fft: &ScalarFftImpl<T>,
    direction: Direction,
) -> Result<(), FftError> {
    if nx == 0 || ny == 0 {
        return Err(FftError::EmptyInput);
    }
    if data.len() != nx * ny {
        return Err(FftError::MismatchedLengths);
    }
    fft_rows(data, nx, fft, direction)?;
    if ny == 1 {
        return Ok(());
    }
    let mut column = vec![Complex::<T>::zero(); ny];
    for c in 0..nx {
        fft.transform_strided(&mut data[c..], nx, &mut column, direction)?;
    }
    Ok(())
}

/// 2D transform of every plane of a stack. `data.len()` must be a multiple
/// of `nx·ny`.
pub fn fft2d_planes<T: Float>(
    data: &mut [Complex<T>],
    nx: usize,
    ny: usize,
    direction: Direction,
) -> Result<(), FftError> {
    fft2d_planes_with(data, nx, ny, &ScalarFftImpl::default(), direction)
}

/// [`fft2d_planes`] driven by a caller's engine, so its recorded kernel
/// choices apply. A single plane runs on `fft` directly; with `parallel`,
/// stacks run one engine per task, each seeded from a snapshot of `fft`.
pub fn fft2d_planes_with<T: Float>(
    data: &mut [Complex<T>],
    nx: usize,
    ny: usize,
    fft: &ScalarFftImpl<T>,
    direction: Direction,
) -> Result<(), FftError> {
    let plane = nx * ny;
    if plane == 0 || data.is_empty() {
        return Err(FftError::EmptyInput);
    }
    if data.len() % plane != 0 {
        return Err(FftError::MismatchedLengths);
    }
    if data.len() == plane {
        return fft2d_plane(data, nx, ny, fft, direction);
    }
    #[cfg(feature = "parallel")]
    {
        let seed = fft.planner_snapshot();
        data.par_chunks_mut(plane).try_for_each(|p| {
            let local = ScalarFftImpl::with_planner(seed.clone());
            fft2d_plane(p, nx, ny, &local, direction)
        })
    }
    #[cfg(not(feature = "parallel"))]
    {
        for p in data.chunks_mut(plane) {
            fft2d_plane(p, nx, ny, fft, direction)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::Complex64;
    use alloc::vec::Vec;

    fn naive_2d(data: &[Complex64], nx: usize, ny: usize, sign: f64) -> Vec<Complex64> {
        let mut out = vec![Complex64::zero(); nx * ny];
        for v in 0..ny {
            for u in 0..nx {
                let mut acc = Complex64::zero();
                for j in 0..ny {
                    for i in 0..nx {
                        let theta = sign
                            * 2.0
                            * core::f64::consts::PI
                            * ((u * i) as f64 / nx as f64 + (v * j) as f64 / ny as f64);
                        acc += data[j * nx + i] * Complex64::expi(theta);
                    }
                }
                out[v * nx + u] = acc;
            }
        }
        out
    }

    fn field(nx: usize, ny: usize) -> Vec<Complex64> {
        (0..nx * ny)
            .map(|k| Complex64::new((k % 5) as f64 - 2.0, (k % 3) as f64 * 0.5))
            .collect()
    }

    #[test]
    fn plane_matches_naive_rectangular() {
        let (nx, ny) = (8, 4);
        let x = field(nx, ny);
        let fft = ScalarFftImpl::<f64>::default();
        for (direction, sign) in [(Direction::Forward, -1.0), (Direction::Inverse, 1.0)] {
            let mut data = x.clone();
            fft2d_plane(&mut data, nx, ny, &fft, direction).unwrap();
            let expected = naive_2d(&x, nx, ny, sign);
            for (a, b) in data.iter().zip(&expected) {
                assert!((*a - *b).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn stack_transforms_each_plane() {
        let (nx, ny) = (4, 4);
        let single = field(nx, ny);
        let mut stack = single.clone();
        stack.extend(single.iter().map(|c| c.scale(2.0)));
        fft2d_planes(&mut stack, nx, ny, Direction::Forward).unwrap();
        let expected = naive_2d(&single, nx, ny, -1.0);
        for (k, e) in expected.iter().enumerate() {
            assert!((stack[k] - *e).abs() < 1e-9);
            assert!((stack[16 + k] - e.scale(2.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn engine_choices_reach_every_plane() {
        use crate::fft::{FftPlanner, FftStrategy};
        let (nx, ny) = (8, 8);
        let single = field(nx, ny);
        let mut stack = single.clone();
        stack.extend_from_slice(&single);
        let mut planner = FftPlanner::new();
        planner.set_strategy(8, FftStrategy::Stockham);
        let fft = ScalarFftImpl::with_planner(planner);
        fft2d_planes_with(&mut stack, nx, ny, &fft, Direction::Forward).unwrap();
        assert_eq!(fft.plan_strategy(8), FftStrategy::Stockham);
        let expected = naive_2d(&single, nx, ny, -1.0);
        for (k, e) in expected.iter().enumerate() {
            assert!((stack[k] - *e).abs() < 1e-9);
            assert!((stack[64 + k] - *e).abs() < 1e-9);
        }

        let mut one = single.clone();
        fft2d_planes_with(&mut one, nx, ny, &fft, Direction::Forward).unwrap();
        assert_eq!(fft.cached_lengths(), 1);
    }

    #[test]
    fn rows_only_transform_rows() {
        let fft = ScalarFftImpl::<f64>::default();
        let mut data = vec![Complex64::new(1.0, 0.0); 8];
        fft_rows(&mut data, 4, &fft, Direction::Forward).unwrap();
        assert_eq!(data[0].re, 4.0);
        assert_eq!(data[4].re, 4.0);
        assert!(data[1].abs() < 1e-12);
    }

    #[test]
    fn shape_errors() {
        let fft = ScalarFftImpl::<f64>::default();
        let mut data = vec![Complex64::zero(); 12];
        assert_eq!(
            fft2d_plane(&mut data, 4, 4, &fft, Direction::Forward),
            Err(FftError::MismatchedLengths)
        );
        assert_eq!(
            fft2d_planes(&mut data, 8, 1, Direction::Forward),
            Err(FftError::MismatchedLengths)
        );
        assert_eq!(
            fft2d_plane(&mut data, 3, 4, &fft, Direction::Forward),
            Err(FftError::NonPowerOfTwo(3))
        );
    }
}
