//! Power-of-two complex FFT.
//!
//! The transforms here back the image-level Fourier operations in
//! [`crate::fourier`]. Both directions are unnormalized: the forward
//! transform uses `exp(-2πi·jk/n)`, the inverse `exp(+2πi·jk/n)`, so a round
//! trip multiplies the data by `n`.
//!
//! A [`FftPlanner`] caches twiddle tables and the chosen [`FftStrategy`] per
//! length. The planner lives in a `RefCell` inside [`ScalarFftImpl`], so an
//! engine is meant to be used from one thread; parallel callers create one
//! engine per task.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use hashbrown::HashMap;

pub use crate::num::{Complex, Complex32, Complex64, Float};

/// Lengths at or above this use the Stockham kernel when no strategy has
/// been recorded for them.
const STOCKHAM_MIN_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftError {
    EmptyInput,
    /// Only power-of-two lengths are supported.
    NonPowerOfTwo(usize),
    MismatchedLengths,
    InvalidStride,
}

impl fmt::Display for FftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FftError::EmptyInput => write!(f, "empty input"),
            FftError::NonPowerOfTwo(n) => write!(f, "length {} is not a power of two", n),
            FftError::MismatchedLengths => write!(f, "input and output lengths differ"),
            FftError::InvalidStride => write!(f, "invalid stride"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FftError {}

/// Sign of the exponent of a Fourier transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `exp(-i…)`.
    Forward,
    /// `exp(+i…)`.
    Inverse,
}

impl Direction {
    /// The exponent sign as an integer, `-1` or `+1`.
    pub fn sign(self) -> i32 {
        match self {
            Direction::Forward => -1,
            Direction::Inverse => 1,
        }
    }
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Inverse,
            Direction::Inverse => Direction::Forward,
        }
    }
}

/// A raw exponent sign that is neither `-1` nor `+1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidDirection(pub i32);

impl fmt::Display for InvalidDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid transform direction {} (expected -1 or +1)", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InvalidDirection {}

impl TryFrom<i32> for Direction {
    type Error = InvalidDirection;

    fn try_from(sign: i32) -> Result<Self, Self::Error> {
        match sign {
            -1 => Ok(Direction::Forward),
            1 => Ok(Direction::Inverse),
            other => Err(InvalidDirection(other)),
        }
    }
}

/// Butterfly kernel used for a given length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FftStrategy {
    /// In-place iterative radix-2 with bit reversal.
    Radix2,
    /// Out-of-place self-sorting radix-2 over a scratch buffer.
    Stockham,
    /// Whatever the planner has recorded for the length.
    #[default]
    Auto,
}

impl FftStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            FftStrategy::Radix2 => "radix2",
            FftStrategy::Stockham => "stockham",
            FftStrategy::Auto => "auto",
        }
    }
}

impl core::str::FromStr for FftStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "radix2" => Ok(FftStrategy::Radix2),
            "stockham" => Ok(FftStrategy::Stockham),
            "auto" => Ok(FftStrategy::Auto),
            _ => Err(()),
        }
    }
}

#[derive(Clone)]
pub struct FftPlanner<T: Float> {
    /// Twiddle tables keyed by transform length. The table for length `n`
    /// has `n/2` entries `exp(-2πi·k/n)`.
    cache: HashMap<usize, Arc<[Complex<T>]>>,
    strategies: HashMap<usize, FftStrategy>,
    scratch: Vec<Complex<T>>,
}

impl<T: Float> Default for FftPlanner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> FftPlanner<T> {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            strategies: HashMap::new(),
            scratch: Vec::new(),
        }
    }

    /// Twiddle table for length `n`. Angles are evaluated in `f64`.
    pub fn get_twiddles(&mut self, n: usize) -> Arc<[Complex<T>]> {
        let table = self.cache.entry(n).or_insert_with(|| {
            let half = n / 2;
            let step = -2.0 * core::f64::consts::PI / n as f64;
            let mut table: Vec<Complex<T>> = Vec::with_capacity(half);
            for k in 0..half {
                let (sin, cos) = libm::sincos(step * k as f64);
                table.push(Complex::new(T::from_f64(cos), T::from_f64(sin)));
            }
            Arc::from(table)
        });
        Arc::clone(table)
    }

    /// Record the kernel to use for length `n`.
    pub fn set_strategy(&mut self, n: usize, strategy: FftStrategy) {
        if strategy == FftStrategy::Auto {
            self.strategies.remove(&n);
        } else {
            self.strategies.insert(n, strategy);
        }
    }

    /// Kernel for length `n`: the recorded one, else a size heuristic.
    pub fn plan_strategy(&self, n: usize) -> FftStrategy {
        if let Some(&s) = self.strategies.get(&n) {
            return s;
        }
        if n >= STOCKHAM_MIN_LEN {
            FftStrategy::Stockham
        } else {
            FftStrategy::Radix2
        }
    }

    pub fn cached_lengths(&self) -> usize {
        self.cache.len()
    }
}

pub trait FftImpl<T: Float> {
    fn fft(&self, input: &mut [Complex<T>]) -> Result<(), FftError>;
    fn ifft(&self, input: &mut [Complex<T>]) -> Result<(), FftError>;
    fn fft_with_strategy(
        &self,
        input: &mut [Complex<T>],
        strategy: FftStrategy,
    ) -> Result<(), FftError>;

    /// Transform in the given direction.
    fn transform(&self, input: &mut [Complex<T>], direction: Direction) -> Result<(), FftError> {
        match direction {
            Direction::Forward => self.fft(input),
            Direction::Inverse => self.ifft(input),
        }
    }

    fn fft_out_of_place(
        &self,
        input: &[Complex<T>],
        output: &mut [Complex<T>],
    ) -> Result<(), FftError> {
        if input.len() != output.len() {
            return Err(FftError::MismatchedLengths);
        }
        output.copy_from_slice(input);
        self.fft(output)
    }
    fn ifft_out_of_place(
        &self,
        input: &[Complex<T>],
        output: &mut [Complex<T>],
    ) -> Result<(), FftError> {
        if input.len() != output.len() {
            return Err(FftError::MismatchedLengths);
        }
        output.copy_from_slice(input);
        self.ifft(output)
    }

    /// Transform every `stride`-th element, gathering through `scratch`.
    /// The transform length is `scratch.len()`.
    fn transform_strided(
        &self,
        input: &mut [Complex<T>],
        stride: usize,
        scratch: &mut [Complex<T>],
        direction: Direction,
    ) -> Result<(), FftError> {
        if stride == 0 {
            return Err(FftError::InvalidStride);
        }
        let n = scratch.len();
        if n == 0 {
            return Err(FftError::EmptyInput);
        }
        if input.len() < (n - 1) * stride + 1 {
            return Err(FftError::MismatchedLengths);
        }
        for (i, s) in scratch.iter_mut().enumerate() {
            *s = input[i * stride];
        }
        self.transform(scratch, direction)?;
        for (i, s) in scratch.iter().enumerate() {
            input[i * stride] = *s;
        }
        Ok(())
    }
    fn fft_strided(
        &self,
        input: &mut [Complex<T>],
        stride: usize,
        scratch: &mut [Complex<T>],
    ) -> Result<(), FftError> {
        self.transform_strided(input, stride, scratch, Direction::Forward)
    }
    fn ifft_strided(
        &self,
        input: &mut [Complex<T>],
        stride: usize,
        scratch: &mut [Complex<T>],
    ) -> Result<(), FftError> {
        self.transform_strided(input, stride, scratch, Direction::Inverse)
    }
}

pub struct ScalarFftImpl<T: Float> {
    planner: RefCell<FftPlanner<T>>,
}

impl<T: Float> Default for ScalarFftImpl<T> {
    fn default() -> Self {
        Self {
            planner: RefCell::new(FftPlanner::new()),
        }
    }
}

impl<T: Float> ScalarFftImpl<T> {
    pub fn with_planner(planner: FftPlanner<T>) -> Self {
        Self {
            planner: RefCell::new(planner),
        }
    }

    pub fn into_planner(self) -> FftPlanner<T> {
        self.planner.into_inner()
    }

    /// Copy of the current planner, for seeding per-task engines.
    pub fn planner_snapshot(&self) -> FftPlanner<T> {
        self.planner.borrow().clone()
    }

    pub fn plan_strategy(&self, n: usize) -> FftStrategy {
        self.planner.borrow().plan_strategy(n)
    }

    pub fn cached_lengths(&self) -> usize {
        self.planner.borrow().cached_lengths()
    }

    fn check_len(n: usize) -> Result<(), FftError> {
        if n == 0 {
            return Err(FftError::EmptyInput);
        }
        if !n.is_power_of_two() {
            return Err(FftError::NonPowerOfTwo(n));
        }
        Ok(())
    }

    /// In-place iterative radix-2 transform.
    pub fn radix2_fft(&self, input: &mut [Complex<T>]) -> Result<(), FftError> {
        let n = input.len();
        Self::check_len(n)?;
        if n == 1 {
            return Ok(());
        }
        let twiddles = self.planner.borrow_mut().get_twiddles(n);

        let mut j = 0usize;
        for i in 1..n {
            let mut bit = n >> 1;
            while j & bit != 0 {
                j ^= bit;
                bit >>= 1;
            }
            j |= bit;
            if i < j {
                input.swap(i, j);
            }
        }

        let mut len = 2;
        while len <= n {
            let half = len / 2;
            let step = n / len;
            for start in (0..n).step_by(len) {
                for k in 0..half {
                    let w = twiddles[k * step];
                    let u = input[start + k];
                    let v = input[start + k + half] * w;
                    input[start + k] = u + v;
                    input[start + k + half] = u - v;
                }
            }
            len <<= 1;
        }
        Ok(())
    }

    /// Stockham auto-sort transform using the planner's scratch buffer.
    pub fn stockham_fft(&self, input: &mut [Complex<T>]) -> Result<(), FftError> {
        let n = input.len();
        Self::check_len(n)?;
        if n == 1 {
            return Ok(());
        }
        let (twiddles, mut scratch) = {
            let mut planner = self.planner.borrow_mut();
            let twiddles = planner.get_twiddles(n);
            let scratch = core::mem::take(&mut planner.scratch);
            (twiddles, scratch)
        };
        if scratch.len() < n {
            scratch.resize(n, Complex::zero());
        }

        {
            let mut src: &mut [Complex<T>] = &mut *input;
            let mut dst: &mut [Complex<T>] = &mut scratch[..n];
            // n1 groups of n2 points per pass.
            let mut n1 = 1usize;
            let mut n2 = n;
            while n1 < n {
                n2 >>= 1;
                for k in 0..n1 {
                    let w = twiddles[k * n2];
                    let base0 = 2 * k * n2;
                    let base1 = base0 + n2;
                    for j in 0..n2 {
                        let u = src[base0 + j];
                        let v = src[base1 + j] * w;
                        dst[k * n2 + j] = u + v;
                        dst[(k + n1) * n2 + j] = u - v;
                    }
                }
                core::mem::swap(&mut src, &mut dst);
                n1 <<= 1;
            }
        }
        // An odd number of passes leaves the result in scratch.
        if n.trailing_zeros() % 2 == 1 {
            input.copy_from_slice(&scratch[..n]);
        }

        self.planner.borrow_mut().scratch = scratch;
        Ok(())
    }

    fn run(&self, input: &mut [Complex<T>], strategy: FftStrategy) -> Result<(), FftError> {
        let chosen = if strategy == FftStrategy::Auto {
            self.planner.borrow().plan_strategy(input.len())
        } else {
            strategy
        };
        match chosen {
            FftStrategy::Stockham => self.stockham_fft(input),
            _ => self.radix2_fft(input),
        }
    }

    /// Inverse transform with an explicit kernel.
    pub fn ifft_with_strategy(
        &self,
        input: &mut [Complex<T>],
        strategy: FftStrategy,
    ) -> Result<(), FftError> {
        Self::check_len(input.len())?;
        for c in input.iter_mut() {
            c.im = -c.im;
        }
        let result = self.run(input, strategy);
        for c in input.iter_mut() {
            c.im = -c.im;
        }
        result
    }

    pub fn fft_vec(&self, input: &[Complex<T>]) -> Result<Vec<Complex<T>>, FftError> {
        let mut out = Vec::from(input);
        self.fft(&mut out)?;
        Ok(out)
    }
    pub fn ifft_vec(&self, input: &[Complex<T>]) -> Result<Vec<Complex<T>>, FftError> {
        let mut out = Vec::from(input);
        self.ifft(&mut out)?;
        Ok(out)
    }
}

impl<T: Float> FftImpl<T> for ScalarFftImpl<T> {
    fn fft(&self, input: &mut [Complex<T>]) -> Result<(), FftError> {
        self.run(input, FftStrategy::Auto)
    }
    fn ifft(&self, input: &mut [Complex<T>]) -> Result<(), FftError> {
        self.ifft_with_strategy(input, FftStrategy::Auto)
    }
    fn fft_with_strategy(
        &self,
        input: &mut [Complex<T>],
        strategy: FftStrategy,
    ) -> Result<(), FftError> {
        self.run(input, strategy)
    }
}


#[cfg(all(feature = "internal-tests", test))]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn roundtrip_scales_by_length(
            log2 in 0u32..8,
            ref values in proptest::collection::vec(-1000.0f64..1000.0, 256),
        ) {
            let n = 1usize << log2;
            let fft = ScalarFftImpl::<f64>::default();
            let x: Vec<Complex64> = values[..n]
                .iter()
                .zip(values[n..2 * n].iter())
                .map(|(&re, &im)| Complex64::new(re, im))
                .collect();
            let mut data = x.clone();
            fft.fft(&mut data).unwrap();
            fft.ifft(&mut data).unwrap();
            for (a, b) in data.iter().zip(&x) {
                prop_assert!((a.re - b.re * n as f64).abs() < 1e-6 * n as f64 * 1000.0);
                prop_assert!((a.im - b.im * n as f64).abs() < 1e-6 * n as f64 * 1000.0);
            }
        }
    }
}
