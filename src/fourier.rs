//! Image-level Fourier operations.
//!
//! Everything here works plane by plane on [`Image`] buffers and uses the
//! unnormalized power-of-two FFT from [`crate::fft`]. The zero frequency of
//! an FFT sits at pixel 0; [`permute`] moves it to the centre
//! `(Nx/2, Ny/2)` and back.
//!
//! The free functions run on a fresh [`Fourier`] engine. Build one with
//! [`Fourier::with_planner`] or [`Fourier::with_wisdom`] to reuse twiddle
//! tables across calls and to apply measured kernel choices.

use alloc::vec::Vec;
use core::fmt;

use crate::fft::{Direction, FftError, FftPlanner, FftStrategy, ScalarFftImpl};
use crate::image::{ComplexImage, Image, ImageError, Pixel, PixelOps, Real, Shape};
use crate::ndfft::{fft2d_planes_with, fft_rows};
use crate::num::Complex;
#[cfg(feature = "std")]
use crate::wisdom::Wisdom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FourierError {
    Fft(FftError),
    Image(ImageError),
    /// Zoom factors must be at least 1.
    InvalidFactor(usize),
}

impl fmt::Display for FourierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FourierError::Fft(e) => write!(f, "fft error: {}", e),
            FourierError::Image(e) => write!(f, "image error: {}", e),
            FourierError::InvalidFactor(n) => write!(f, "invalid zoom factor {}", n),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FourierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FourierError::Fft(e) => Some(e),
            FourierError::Image(e) => Some(e),
            FourierError::InvalidFactor(_) => None,
        }
    }
}

impl From<FftError> for FourierError {
    fn from(e: FftError) -> Self {
        FourierError::Fft(e)
    }
}

impl From<ImageError> for FourierError {
    fn from(e: ImageError) -> Self {
        FourierError::Image(e)
    }
}

/// How a pair of real images encodes a complex field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    #[default]
    AmpPhase,
    ReIm,
}

/// Swap halves (1D) or quadrants (2D, and each plane of a 3D image) in
/// place. Applying it twice restores the image for even extents; an odd
/// extent leaves its last row or column where it is.
pub fn permute<P: Pixel>(img: &mut Image<P>) {
    let shape = img.shape();
    let (nx, ny) = (shape.x, shape.y);
    let (xh, yh) = (nx / 2, ny / 2);
    if shape.naxis == 1 {
        let data = img.as_mut_slice();
        for i in 0..xh {
            data.swap(i, i + xh);
        }
        return;
    }
    for plane in img.planes_mut() {
        for j in 0..yh {
            for i in 0..xh {
                plane.swap(j * nx + i, (j + yh) * nx + i + xh);
                plane.swap((j + yh) * nx + i, j * nx + i + xh);
            }
        }
    }
}

/// Copy of `img` with [`permute`] applied.
pub fn permuted<P: Pixel>(img: &Image<P>) -> Image<P> {
    let mut out = img.clone();
    permute(&mut out);
    out
}

/// Image-level transforms sharing one FFT engine.
///
/// ```
/// use fpmdft::fft::{FftPlanner, FftStrategy};
/// use fpmdft::fourier::Fourier;
/// use fpmdft::image::{ComplexImage, Shape};
/// use fpmdft::num::Complex64;
///
/// let mut planner = FftPlanner::new();
/// planner.set_strategy(8, FftStrategy::Stockham);
/// let fourier = Fourier::with_planner(planner);
/// let img = ComplexImage::<f64>::filled(Shape::new_2d(8, 8), Complex64::new(1.0, 0.0));
/// let spectrum = fourier.fft_2d(&img).unwrap();
/// assert!((spectrum.get(0, 0, 0).unwrap().re - 64.0).abs() < 1e-9);
/// ```
pub struct Fourier<T: Real> {
    fft: ScalarFftImpl<T>,
}

impl<T: Real> Default for Fourier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> Fourier<T> {
    pub fn new() -> Self {
        Self {
            fft: ScalarFftImpl::default(),
        }
    }

    pub fn with_planner(planner: FftPlanner<T>) -> Self {
        Self {
            fft: ScalarFftImpl::with_planner(planner),
        }
    }

    /// Engine seeded with measured kernel choices.
    #[cfg(feature = "std")]
    pub fn with_wisdom(wisdom: &Wisdom<T>) -> Self {
        Self::with_planner(FftPlanner::with_wisdom(wisdom))
    }

    /// Kernel this engine runs for length `n`.
    pub fn plan_strategy(&self, n: usize) -> FftStrategy {
        self.fft.plan_strategy(n)
    }

    /// Number of transform lengths with a cached twiddle table.
    pub fn cached_lengths(&self) -> usize {
        self.fft.cached_lengths()
    }

    pub fn into_planner(self) -> FftPlanner<T> {
        self.fft.into_planner()
    }

    /// 1D transform of every row of every plane.
    pub fn fft_1d(
        &self,
        img: &ComplexImage<T>,
        direction: Direction,
    ) -> Result<ComplexImage<T>, FourierError> {
        let mut out = img.clone();
        fft_rows(out.as_mut_slice(), img.nx(), &self.fft, direction)?;
        Ok(out)
    }

    /// 2D transform of every plane.
    pub fn fft_2d_dir(
        &self,
        img: &ComplexImage<T>,
        direction: Direction,
    ) -> Result<ComplexImage<T>, FourierError> {
        let mut out = img.clone();
        fft2d_planes_with(out.as_mut_slice(), img.nx(), img.ny(), &self.fft, direction)?;
        Ok(out)
    }

    /// Forward (`exp(-i…)`) unnormalized 2D transform of every plane.
    pub fn fft_2d(&self, img: &ComplexImage<T>) -> Result<ComplexImage<T>, FourierError> {
        self.fft_2d_dir(img, Direction::Forward)
    }

    /// Inverse (`exp(+i…)`) unnormalized 2D transform of every plane.
    pub fn ifft_2d(&self, img: &ComplexImage<T>) -> Result<ComplexImage<T>, FourierError> {
        self.fft_2d_dir(img, Direction::Inverse)
    }

    /// Forward 2D transform of a real image, returning the full complex
    /// spectrum of every plane.
    pub fn rfft_2d(&self, img: &Image<T>) -> Result<ComplexImage<T>, FourierError> {
        self.fft_2d(&promote(img))
    }

    /// Centred transform of a pupil given as two real images.
    ///
    /// The field is assembled from `(a, b)` according to `repr`, quadrant
    /// swapped, transformed in `direction`, split back into two images in
    /// the same representation, and both outputs quadrant swapped.
    pub fn pupil_fft(
        &self,
        a: &Image<T>,
        b: &Image<T>,
        repr: Representation,
        direction: Direction,
    ) -> Result<(Image<T>, Image<T>), FourierError> {
        let mut field = match repr {
            Representation::AmpPhase => ComplexImage::from_amp_phase(a, b)?,
            Representation::ReIm => ComplexImage::from_re_im(a, b)?,
        };
        permute(&mut field);
        let spectrum = self.fft_2d_dir(&field, direction)?;
        let (mut out_a, mut out_b) = match repr {
            Representation::AmpPhase => spectrum.to_amp_phase(),
            Representation::ReIm => spectrum.to_re_im(),
        };
        permute(&mut out_a);
        permute(&mut out_b);
        Ok((out_a, out_b))
    }

    /// Cross-correlation amplitude of two real images of equal shape.
    ///
    /// The spectra are combined as amplitude product and phase difference,
    /// scaled by `1/(√n·n)` with `n` the pixel count, transformed forward,
    /// and the amplitude is returned with its zero lag at the centre.
    pub fn correlate(&self, a: &Image<T>, b: &Image<T>) -> Result<Image<T>, FourierError>
    where
        T: PixelOps<Scalar = T>,
    {
        if a.shape() != b.shape() {
            return Err(ImageError::ShapeMismatch {
                expected: a.shape(),
                found: b.shape(),
            }
            .into());
        }
        let (amp1, pha1) = self.rfft_2d(a)?.to_amp_phase();
        let (amp2, pha2) = self.rfft_2d(b)?.to_amp_phase();
        let n = a.shape().len() as f64;
        let scale = T::from_f64(1.0 / (libm::sqrt(n) * n));
        let amp = amp1.mul(&amp2)?.scale(scale);
        let pha = pha1.sub(&pha2)?;
        let spectrum = ComplexImage::from_amp_phase(&amp, &pha)?;
        let (mut out, _) = self.fft_2d(&spectrum)?.to_amp_phase();
        permute(&mut out);
        Ok(out)
    }

    /// Fourier-domain zero padding of a complex image by an integer factor.
    ///
    /// Each `Nx × Ny` plane becomes `factor·Nx × factor·Ny`. The spectrum is
    /// scaled by `1/(factor²·Nx·Ny)`, so the sum over the output equals the
    /// sum over the input.
    pub fn zoom_complex(
        &self,
        img: &ComplexImage<T>,
        factor: usize,
    ) -> Result<ComplexImage<T>, FourierError> {
        if factor == 0 {
            return Err(FourierError::InvalidFactor(factor));
        }
        let (nx, ny) = (img.nx(), img.ny());
        let (zx, zy) = (factor * nx, factor * ny);
        let coeff = T::from_f64(1.0 / (factor * factor * nx * ny) as f64);

        let spectrum = permuted(&self.fft_2d(&permuted(img))?);
        let shape = match img.shape().naxis {
            3 => Shape::new_3d(zx, zy, img.slices()),
            _ => Shape::new_2d(zx, zy),
        };
        let mut padded = ComplexImage::<T>::zeros(shape);
        let (ox, oy) = (zx / 2 - nx / 2, zy / 2 - ny / 2);
        for (src, dst) in spectrum.planes().zip(padded.planes_mut()) {
            for j in 0..ny {
                for i in 0..nx {
                    dst[(j + oy) * zx + i + ox] = src[j * nx + i].scale(coeff);
                }
            }
        }
        permute(&mut padded);
        let mut out = self.ifft_2d(&padded)?;
        permute(&mut out);
        Ok(out)
    }

    /// [`Fourier::zoom_complex`] of a real image, keeping the real part.
    pub fn zoom_real(&self, img: &Image<T>, factor: usize) -> Result<Image<T>, FourierError> {
        let zoomed = self.zoom_complex(&promote(img), factor)?;
        Ok(zoomed.map(|c| c.re))
    }

    /// Sub-pixel translation of a real image through a Fourier phase ramp.
    ///
    /// The output samples the input at `(i + dx, j + dy)` with periodic
    /// boundaries, so integer shifts are exact circular rolls.
    pub fn translate(&self, img: &Image<T>, dx: f64, dy: f64) -> Result<Image<T>, FourierError> {
        let (nx, ny) = (img.nx(), img.ny());
        let mut spectrum = self.rfft_2d(img)?;
        let tau = 2.0 * core::f64::consts::PI;
        let ramp_x: Vec<f64> = (0..nx).map(|u| dx * tau / nx as f64 * signed_frequency(u, nx)).collect();
        let ramp_y: Vec<f64> = (0..ny).map(|v| dy * tau / ny as f64 * signed_frequency(v, ny)).collect();
        for plane in spectrum.planes_mut() {
            for (v, row) in plane.chunks_mut(nx).enumerate() {
                for (u, z) in row.iter_mut().enumerate() {
                    let (s, c) = libm::sincos(ramp_x[u] + ramp_y[v]);
                    *z = *z * Complex::new(T::from_f64(c), T::from_f64(s));
                }
            }
        }
        let out = self.ifft_2d(&spectrum)?;
        let norm = T::from_f64(1.0 / (nx * ny) as f64);
        Ok(out.map(|c| c.re * norm))
    }
}

fn promote<T: Real>(img: &Image<T>) -> ComplexImage<T> {
    img.map(|a| Complex::new(a, T::zero()))
}

/// 1D transform of every row of every plane.
pub fn fft_1d<T: Real>(
    img: &ComplexImage<T>,
    direction: Direction,
) -> Result<ComplexImage<T>, FourierError> {
    Fourier::new().fft_1d(img, direction)
}

/// 2D transform of every plane.
pub fn fft_2d_dir<T: Real>(
    img: &ComplexImage<T>,
    direction: Direction,
) -> Result<ComplexImage<T>, FourierError> {
    Fourier::new().fft_2d_dir(img, direction)
}

pub fn fft_2d<T: Real>(img: &ComplexImage<T>) -> Result<ComplexImage<T>, FourierError> {
    Fourier::new().fft_2d(img)
}

pub fn ifft_2d<T: Real>(img: &ComplexImage<T>) -> Result<ComplexImage<T>, FourierError> {
    Fourier::new().ifft_2d(img)
}

pub fn rfft_2d<T: Real>(img: &Image<T>) -> Result<ComplexImage<T>, FourierError> {
    Fourier::new().rfft_2d(img)
}

/// See [`Fourier::pupil_fft`].
pub fn pupil_fft<T: Real>(
    a: &Image<T>,
    b: &Image<T>,
    repr: Representation,
    direction: Direction,
) -> Result<(Image<T>, Image<T>), FourierError> {
    Fourier::new().pupil_fft(a, b, repr, direction)
}

/// See [`Fourier::correlate`].
pub fn correlate<T>(a: &Image<T>, b: &Image<T>) -> Result<Image<T>, FourierError>
where
    T: Real + PixelOps<Scalar = T>,
{
    Fourier::new().correlate(a, b)
}

/// See [`Fourier::zoom_complex`].
pub fn zoom_complex<T: Real>(
    img: &ComplexImage<T>,
    factor: usize,
) -> Result<ComplexImage<T>, FourierError> {
    Fourier::new().zoom_complex(img, factor)
}

pub fn zoom_real<T: Real>(img: &Image<T>, factor: usize) -> Result<Image<T>, FourierError> {
    Fourier::new().zoom_real(img, factor)
}

/// See [`Fourier::translate`].
pub fn translate<T: Real>(img: &Image<T>, dx: f64, dy: f64) -> Result<Image<T>, FourierError> {
    Fourier::new().translate(img, dx, dy)
}

/// Signed frequency of FFT bin `u` out of `n`.
fn signed_frequency(u: usize, n: usize) -> f64 {
    if u < n / 2 {
        u as f64
    } else {
        u as f64 - n as f64
    }
}
