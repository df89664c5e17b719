//! # fpmdft - masked Fourier transforms for focal-plane-mask propagation
//!
//! Fourier-domain operations over in-memory 1D/2D/3D image buffers, built
//! around a direct discrete Fourier transform evaluated only on active
//! (masked) pixels. The masked transform supports arbitrary sizes, irregular
//! supports and a rescaled output grid ("zoom"), which makes it suitable for
//! propagating a pupil-plane field through a small, finely sampled
//! focal-plane mask.
//!
//! ## Modules
//!
//! - [`dft`]: the masked direct transform ([`dft::masked_dft`]).
//! - [`fpm`]: pupil → focal plane → pupil propagation through a complex or
//!   real focal-plane mask ([`fpm::FocalPlaneMaskConvolver`]).
//! - [`fourier`]: image-level FFT operations (quadrant swap, 2D transforms,
//!   correlation, Fourier zoom, sub-pixel translation).
//! - [`fft`], [`ndfft`]: the power-of-two FFT primitive.
//! - [`wisdom`]: persisted per-length kernel choices (`std` only).
//! - [`image`], [`mask`], [`num`]: buffers, supports and scalars.
//!
//! ## Cargo Features
//!
//! - `std` (default): `std::error::Error` impls, wisdom files, environment
//!   configuration
//! - `parallel`: rayon data parallelism in the masked transform and plane
//!   stacks
//! - `verbose-logging`: debug output through the `log` crate
//! - `internal-tests`: property tests
//!
//! ## Example
//!
//! ```
//! use fpmdft::dft::masked_dft;
//! use fpmdft::fft::Direction;
//! use fpmdft::image::Image;
//! use fpmdft::num::Complex64;
//!
//! let mut field = Image::<Complex64>::new_2d(8, 8);
//! field.set(4, 4, 0, Complex64::new(1.0, 0.0));
//! let support = Image::<f64>::filled(field.shape(), 1.0);
//! let spectrum = masked_dft(&field, &support, &support, 1.0, Direction::Forward, 0).unwrap();
//! // A centred point source has a flat spectrum.
//! assert!((spectrum.get(0, 0, 0).unwrap().re - 1.0).abs() < 1e-12);
//! ```

#![no_std]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

macro_rules! debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "verbose-logging")]
        {
            log::debug!($($arg)*);
        }
        #[cfg(not(feature = "verbose-logging"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

#[cfg(feature = "std")]
macro_rules! info_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "verbose-logging")]
        {
            log::info!($($arg)*);
        }
        #[cfg(not(feature = "verbose-logging"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

#[cfg(feature = "std")]
macro_rules! warn_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "verbose-logging")]
        {
            log::warn!($($arg)*);
        }
        #[cfg(not(feature = "verbose-logging"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

pub mod num;

/// Image buffers and elementwise arithmetic.
pub mod image;

/// Support masks and active coordinate sets.
pub mod mask;

pub mod fft;

/// Row, plane and plane-stack FFTs.
pub mod ndfft;

/// Masked direct Fourier transform.
pub mod dft;

/// Focal-plane mask propagation.
pub mod fpm;

/// Image-level Fourier operations built on the FFT.
pub mod fourier;

/// Persisted FFT kernel choices.
#[cfg(feature = "std")]
pub mod wisdom;

pub use dft::{masked_dft, DftError};
pub use fpm::{focal_plane_mask_convolve, Convolution, FocalPlaneMaskConvolver};
pub use image::{ComplexImage, ElementType, Image, ImageError, Shape};
pub use num::{Complex, Complex32, Complex64, Float};
