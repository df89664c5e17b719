//! Direct 2D Fourier transform restricted to active pixel supports.
//!
//! [`masked_dft`] evaluates, at every active output pixel `(i', j')`,
//!
//! ```text
//! F = (1/zoom) · Σ A(i, j) · exp(dir · 2πi · (x_in·x_out + y_in·y_out))
//! ```
//!
//! over the active input pixels, with `x_in = i/Nx − 0.5` and
//! `x_out = (i'/Nx' − 0.5)·Nx'/zoom` (likewise for y). With `zoom = 1` and full
//! supports this is an ordinary centred DFT; larger zooms sample the output
//! plane more finely, which is how a small focal-plane mask is resolved.
//!
//! The kernel is separable, so cosines and sines are only evaluated for each
//! (input column, output column) and (input row, output row) pair. The 2D
//! phasor is recombined with the angle-addition identities while
//! accumulating.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::fft::{Direction, InvalidDirection};
use crate::image::{ComplexImage, Image, ImageError, Real, Shape};
use crate::mask::{ActivePoint, ActiveSet};
use crate::num::Complex;

#[cfg(feature = "parallel")]
use core::sync::atomic::{AtomicUsize, Ordering};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(all(feature = "parallel", feature = "std"))]
use std::sync::OnceLock;

/// Minimum active output points before the accumulation runs in parallel.
pub const DEFAULT_PARALLEL_DFT_THRESHOLD: usize = 256;

#[cfg(feature = "parallel")]
static PARALLEL_DFT_THRESHOLD_OVERRIDE: AtomicUsize = AtomicUsize::new(0);
#[cfg(feature = "parallel")]
static PARALLEL_DFT_THREAD_OVERRIDE: AtomicUsize = AtomicUsize::new(0);
#[cfg(all(feature = "parallel", feature = "std"))]
static PARALLEL_ENV: OnceLock<ParallelEnv> = OnceLock::new();

#[cfg(all(feature = "parallel", feature = "std"))]
struct ParallelEnv {
    threshold: usize,
    threads: usize,
}

#[cfg(all(feature = "parallel", feature = "std"))]
fn parallel_env() -> &'static ParallelEnv {
    PARALLEL_ENV.get_or_init(|| {
        let threshold = std::env::var("FPMDFT_PAR_DFT_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v != 0)
            .unwrap_or(DEFAULT_PARALLEL_DFT_THRESHOLD);
        let threads = std::env::var("FPMDFT_PAR_DFT_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v != 0)
            .unwrap_or_else(|| num_cpus::get().max(1));
        ParallelEnv { threshold, threads }
    })
}

#[cfg(feature = "parallel")]
/// Set the minimum number of active output points for which the masked
/// transform accumulates in parallel.
///
/// Passing `0` reverts to `FPMDFT_PAR_DFT_THRESHOLD` or the built-in default.
pub fn set_parallel_dft_threshold(threshold: usize) {
    PARALLEL_DFT_THRESHOLD_OVERRIDE.store(threshold, Ordering::Relaxed);
}

#[cfg(feature = "parallel")]
/// Override the number of work chunks the output points are split into.
/// `0` uses `FPMDFT_PAR_DFT_THREADS` or the CPU count.
pub fn set_parallel_dft_threads(threads: usize) {
    PARALLEL_DFT_THREAD_OVERRIDE.store(threads, Ordering::Relaxed);
}

#[cfg(feature = "parallel")]
fn parallel_dft_threshold() -> usize {
    let override_thr = PARALLEL_DFT_THRESHOLD_OVERRIDE.load(Ordering::Relaxed);
    if override_thr != 0 {
        return override_thr;
    }
    #[cfg(feature = "std")]
    {
        parallel_env().threshold
    }
    #[cfg(not(feature = "std"))]
    {
        DEFAULT_PARALLEL_DFT_THRESHOLD
    }
}

#[cfg(feature = "parallel")]
fn parallel_dft_threads() -> usize {
    let override_thr = PARALLEL_DFT_THREAD_OVERRIDE.load(Ordering::Relaxed);
    if override_thr != 0 {
        return override_thr;
    }
    #[cfg(feature = "std")]
    {
        parallel_env().threads
    }
    #[cfg(not(feature = "std"))]
    {
        1
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DftError {
    /// A mask does not have the (x, y) extent of the buffer it pairs with.
    ShapeMismatch { expected: Shape, found: Shape },
    /// Zoom must be finite and strictly positive.
    InvalidZoom(f64),
    /// Direction sign other than -1 or +1.
    InvalidDirection(i32),
    SliceOutOfRange { index: usize, slices: usize },
    /// A complex mask must have one slice or as many slices as the pupil.
    SliceCountMismatch { pupil: usize, mask: usize },
    /// The real-mask variant only handles a single pupil slice.
    MultiSliceRealMask(usize),
    Image(ImageError),
}

impl fmt::Display for DftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DftError::ShapeMismatch { expected, found } => {
                write!(f, "mask shape {} does not match data shape {}", found, expected)
            }
            DftError::InvalidZoom(z) => write!(f, "zoom must be finite and > 0, got {}", z),
            DftError::InvalidDirection(d) => {
                write!(f, "invalid transform direction {} (expected -1 or +1)", d)
            }
            DftError::SliceOutOfRange { index, slices } => {
                write!(f, "slice {} out of range for {} slice(s)", index, slices)
            }
            DftError::SliceCountMismatch { pupil, mask } => write!(
                f,
                "mask has {} slice(s), expected 1 or {} to match the pupil",
                mask, pupil
            ),
            DftError::MultiSliceRealMask(n) => {
                write!(f, "real focal-plane mask needs a single-slice pupil, got {}", n)
            }
            DftError::Image(e) => write!(f, "image error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DftError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DftError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ImageError> for DftError {
    fn from(e: ImageError) -> Self {
        DftError::Image(e)
    }
}

impl From<InvalidDirection> for DftError {
    fn from(e: InvalidDirection) -> Self {
        DftError::InvalidDirection(e.0)
    }
}

pub(crate) fn check_zoom(zoom: f64) -> Result<(), DftError> {
    if zoom.is_finite() && zoom > 0.0 {
        Ok(())
    } else {
        Err(DftError::InvalidZoom(zoom))
    }
}

/// cos/sin of `dir·2π·u_in·u_out` for every (output, input) pair along one
/// axis, stored with the input index fastest.
struct PhasorTable<T> {
    cos: Vec<T>,
    sin: Vec<T>,
    n_in: usize,
}

impl<T: Real> PhasorTable<T> {
    fn new(inputs: &[usize], n_in: usize, outputs: &[usize], n_out: usize, zoom: f64, sign: f64) -> Self {
        let coords_in: Vec<f64> = inputs.iter().map(|&i| i as f64 / n_in as f64 - 0.5).collect();
        let coords_out: Vec<f64> = outputs
            .iter()
            .map(|&o| (o as f64 / n_out as f64 - 0.5) * n_out as f64 / zoom)
            .collect();
        let width = coords_in.len();
        let mut cos = vec![T::zero(); width * coords_out.len()];
        let mut sin = vec![T::zero(); width * coords_out.len()];
        let fill = |(u_out, (c_row, s_row)): (&f64, (&mut [T], &mut [T]))| {
            for ((c, s), &u_in) in c_row.iter_mut().zip(s_row.iter_mut()).zip(&coords_in) {
                let (sn, cs) = libm::sincos(sign * 2.0 * core::f64::consts::PI * u_in * u_out);
                *c = T::from_f64(cs);
                *s = T::from_f64(sn);
            }
        };
        #[cfg(feature = "parallel")]
        coords_out
            .par_iter()
            .zip(cos.par_chunks_mut(width).zip(sin.par_chunks_mut(width)))
            .for_each(fill);
        #[cfg(not(feature = "parallel"))]
        coords_out
            .iter()
            .zip(cos.chunks_mut(width).zip(sin.chunks_mut(width)))
            .for_each(fill);
        Self {
            cos,
            sin,
            n_in: width,
        }
    }

    #[inline(always)]
    fn get(&self, out: usize, inp: usize) -> (T, T) {
        let k = out * self.n_in + inp;
        (self.cos[k], self.sin[k])
    }
}

/// An active input pixel decomposed into amplitude and phase.
struct InputSample<T> {
    ix: usize,
    iy: usize,
    amp: T,
    cos: T,
    sin: T,
}

struct Accumulator<'a, T> {
    x: &'a PhasorTable<T>,
    y: &'a PhasorTable<T>,
    inputs: &'a [InputSample<T>],
    scale: T,
}

impl<T: Real> Accumulator<'_, T> {
    fn eval(&self, out: &ActivePoint) -> Complex<T> {
        let mut re = T::zero();
        let mut im = T::zero();
        for p in self.inputs {
            let (cxx, sxx) = self.x.get(out.ix, p.ix);
            let (cyy, syy) = self.y.get(out.iy, p.iy);
            let cos_xy = cxx * cyy - sxx * syy;
            let sin_xy = sxx * cyy + cxx * syy;
            let cos_pha = p.cos * cos_xy - p.sin * sin_xy;
            let sin_pha = p.sin * cos_xy + p.cos * sin_xy;
            re += p.amp * cos_pha;
            im += p.amp * sin_pha;
        }
        Complex::new(re * self.scale, im * self.scale)
    }

    fn eval_all(&self, outputs: &[ActivePoint]) -> Vec<Complex<T>> {
        let mut values = vec![Complex::zero(); outputs.len()];
        #[cfg(feature = "parallel")]
        {
            if outputs.len() >= parallel_dft_threshold() {
                let threads = parallel_dft_threads().max(1);
                let chunk = outputs.len().div_ceil(threads).max(1);
                values
                    .par_chunks_mut(chunk)
                    .zip(outputs.par_chunks(chunk))
                    .for_each(|(vals, pts)| {
                        for (v, p) in vals.iter_mut().zip(pts) {
                            *v = self.eval(p);
                        }
                    });
                return values;
            }
        }
        for (v, p) in values.iter_mut().zip(outputs) {
            *v = self.eval(p);
        }
        values
    }
}

/// Masked direct Fourier transform of slice `slice` of `input`.
///
/// `input_mask` must have the (x, y) extent of `input`; `output_mask`
/// defines the extent of the returned image. Only the first plane of each
/// mask is read. Inactive output pixels are zero, and an empty support
/// yields an all-zero image.
pub fn masked_dft<T: Real>(
    input: &ComplexImage<T>,
    input_mask: &Image<T>,
    output_mask: &Image<T>,
    zoom: f64,
    direction: Direction,
    slice: usize,
) -> Result<ComplexImage<T>, DftError> {
    if !input_mask.shape().same_plane(&input.shape()) {
        return Err(DftError::ShapeMismatch {
            expected: input.shape(),
            found: input_mask.shape(),
        });
    }
    check_zoom(zoom)?;
    let plane = input.plane(slice).ok_or(DftError::SliceOutOfRange {
        index: slice,
        slices: input.slices(),
    })?;

    let in_set = ActiveSet::from_mask(input_mask);
    let out_set = ActiveSet::from_mask(output_mask);
    let mut output = ComplexImage::<T>::zeros(Shape::new_2d(output_mask.nx(), output_mask.ny()));

    debug_log!(
        "masked_dft: {} input points ({} x {} active), {} output points ({} x {} active), zoom {}, slice {}",
        in_set.len(),
        in_set.xs().len(),
        in_set.ys().len(),
        out_set.len(),
        out_set.xs().len(),
        out_set.ys().len(),
        zoom,
        slice
    );

    if in_set.is_empty() || out_set.is_empty() {
        return Ok(output);
    }

    let nx = input.nx();
    let inputs: Vec<InputSample<T>> = in_set
        .points()
        .iter()
        .map(|p| {
            let (amp, pha) = plane[p.y * nx + p.x].to_polar();
            let (sin, cos) = pha.sin_cos();
            InputSample {
                ix: p.ix,
                iy: p.iy,
                amp,
                cos,
                sin,
            }
        })
        .collect();

    let sign = direction.sign() as f64;
    let x_table = PhasorTable::new(in_set.xs(), input.nx(), out_set.xs(), output_mask.nx(), zoom, sign);
    let y_table = PhasorTable::new(in_set.ys(), input.ny(), out_set.ys(), output_mask.ny(), zoom, sign);
    let acc = Accumulator {
        x: &x_table,
        y: &y_table,
        inputs: &inputs,
        scale: T::from_f64(1.0 / zoom),
    };

    let values = acc.eval_all(out_set.points());
    let out_nx = output_mask.nx();
    let data = output.as_mut_slice();
    for (p, v) in out_set.points().iter().zip(values) {
        data[p.y * out_nx + p.x] = v;
    }
    Ok(output)
}

/// [`masked_dft`] with the direction given as a raw sign (`-1` forward,
/// `+1` inverse).
pub fn masked_dft_signed<T: Real>(
    input: &ComplexImage<T>,
    input_mask: &Image<T>,
    output_mask: &Image<T>,
    zoom: f64,
    sign: i32,
    slice: usize,
) -> Result<ComplexImage<T>, DftError> {
    let direction = Direction::try_from(sign)?;
    masked_dft(input, input_mask, output_mask, zoom, direction, slice)
}
