//! In-memory image buffers.
//!
//! An [`Image`] is a 1D, 2D or 3D array stored row-major with the x axis
//! varying fastest: pixel `(i, j, k)` lives at `k·nx·ny + j·nx + i`. A 3D
//! image is a stack of 2D planes (typically one per wavelength).

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::ops::{Add, Mul, Sub};

use crate::num::{Complex, Float};

/// Storage type of an image's pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Real32,
    Real64,
    Complex32,
    Complex64,
}

/// Types usable as image pixels.
pub trait Pixel: Copy + Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    const ELEMENT: ElementType;
    /// Additive identity, used to fill new images.
    fn zeroed() -> Self;
}

impl Pixel for f32 {
    const ELEMENT: ElementType = ElementType::Real32;
    fn zeroed() -> Self {
        0.0
    }
}

impl Pixel for f64 {
    const ELEMENT: ElementType = ElementType::Real64;
    fn zeroed() -> Self {
        0.0
    }
}

/// Real scalar types that also have a complex pixel counterpart.
pub trait Real: Float + Pixel {
    const COMPLEX_ELEMENT: ElementType;
}

impl Real for f32 {
    const COMPLEX_ELEMENT: ElementType = ElementType::Complex32;
}

impl Real for f64 {
    const COMPLEX_ELEMENT: ElementType = ElementType::Complex64;
}

impl<T: Real> Pixel for Complex<T> {
    const ELEMENT: ElementType = T::COMPLEX_ELEMENT;
    fn zeroed() -> Self {
        Complex::zero()
    }
}

/// Errors raised by image construction and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    /// Two images that must share a shape do not.
    ShapeMismatch { expected: Shape, found: Shape },
    /// The backing vector length does not match the requested shape.
    LengthMismatch { expected: usize, found: usize },
    /// Only 1 to 3 axes are supported.
    InvalidAxisCount(usize),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::ShapeMismatch { expected, found } => {
                write!(f, "shape mismatch: expected {}, found {}", expected, found)
            }
            ImageError::LengthMismatch { expected, found } => {
                write!(f, "buffer holds {} pixels, shape needs {}", found, expected)
            }
            ImageError::InvalidAxisCount(n) => write!(f, "unsupported axis count {}", n),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ImageError {}

/// Extents of an image. Unused trailing axes have extent 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub naxis: usize,
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Shape {
    pub fn new_1d(x: usize) -> Self {
        Self { naxis: 1, x, y: 1, z: 1 }
    }
    pub fn new_2d(x: usize, y: usize) -> Self {
        Self { naxis: 2, x, y, z: 1 }
    }
    pub fn new_3d(x: usize, y: usize, z: usize) -> Self {
        Self { naxis: 3, x, y, z }
    }
    /// Number of pixels in one plane.
    pub fn plane_len(&self) -> usize {
        self.x * self.y
    }
    pub fn len(&self) -> usize {
        self.x * self.y * self.z
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// True when both shapes have the same x and y extents.
    pub fn same_plane(&self, other: &Shape) -> bool {
        self.x == other.x && self.y == other.y
    }
    /// Shape of a single plane of this shape.
    pub fn plane(&self) -> Shape {
        if self.naxis == 1 {
            Shape::new_1d(self.x)
        } else {
            Shape::new_2d(self.x, self.y)
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.naxis {
            1 => write!(f, "[{}]", self.x),
            2 => write!(f, "[{} x {}]", self.x, self.y),
            _ => write!(f, "[{} x {} x {}]", self.x, self.y, self.z),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image<P: Pixel> {
    shape: Shape,
    data: Vec<P>,
}

pub type RealImage<T> = Image<T>;
pub type ComplexImage<T> = Image<Complex<T>>;

impl<P: Pixel> Image<P> {
    /// Zero-filled image of the given shape.
    pub fn zeros(shape: Shape) -> Self {
        Self::filled(shape, P::zeroed())
    }
    pub fn filled(shape: Shape, value: P) -> Self {
        Self {
            shape,
            data: vec![value; shape.len()],
        }
    }
    pub fn new_1d(x: usize) -> Self {
        Self::zeros(Shape::new_1d(x))
    }
    pub fn new_2d(x: usize, y: usize) -> Self {
        Self::zeros(Shape::new_2d(x, y))
    }
    pub fn new_3d(x: usize, y: usize, z: usize) -> Self {
        Self::zeros(Shape::new_3d(x, y, z))
    }
    /// Wrap an existing buffer, checking its length against `shape`.
    pub fn from_vec(shape: Shape, data: Vec<P>) -> Result<Self, ImageError> {
        if shape.naxis == 0 || shape.naxis > 3 {
            return Err(ImageError::InvalidAxisCount(shape.naxis));
        }
        if data.len() != shape.len() {
            return Err(ImageError::LengthMismatch {
                expected: shape.len(),
                found: data.len(),
            });
        }
        Ok(Self { shape, data })
    }
    /// Build a 2D image by evaluating `f(i, j)` at every pixel.
    pub fn from_fn_2d(x: usize, y: usize, mut f: impl FnMut(usize, usize) -> P) -> Self {
        let mut data = Vec::with_capacity(x * y);
        for j in 0..y {
            for i in 0..x {
                data.push(f(i, j));
            }
        }
        Self {
            shape: Shape::new_2d(x, y),
            data,
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }
    pub fn element_type(&self) -> ElementType {
        P::ELEMENT
    }
    pub fn nx(&self) -> usize {
        self.shape.x
    }
    pub fn ny(&self) -> usize {
        self.shape.y
    }
    /// Number of planes along the third axis (1 for 1D/2D images).
    pub fn slices(&self) -> usize {
        self.shape.z
    }
    pub fn as_slice(&self) -> &[P] {
        &self.data
    }
    pub fn as_mut_slice(&mut self) -> &mut [P] {
        &mut self.data
    }
    pub fn into_vec(self) -> Vec<P> {
        self.data
    }

    #[inline]
    fn index(&self, i: usize, j: usize, k: usize) -> usize {
        k * self.shape.plane_len() + j * self.shape.x + i
    }
    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<P> {
        if i >= self.shape.x || j >= self.shape.y || k >= self.shape.z {
            return None;
        }
        Some(self.data[self.index(i, j, k)])
    }
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: P) -> bool {
        if i >= self.shape.x || j >= self.shape.y || k >= self.shape.z {
            return false;
        }
        let idx = self.index(i, j, k);
        self.data[idx] = value;
        true
    }

    /// Pixels of plane `k`, or `None` when `k` is out of range.
    pub fn plane(&self, k: usize) -> Option<&[P]> {
        if k >= self.shape.z {
            return None;
        }
        let n = self.shape.plane_len();
        Some(&self.data[k * n..(k + 1) * n])
    }
    pub fn plane_mut(&mut self, k: usize) -> Option<&mut [P]> {
        if k >= self.shape.z {
            return None;
        }
        let n = self.shape.plane_len();
        Some(&mut self.data[k * n..(k + 1) * n])
    }
    /// Copy plane `k` out as a standalone 2D (or 1D) image.
    pub fn plane_image(&self, k: usize) -> Option<Image<P>> {
        let plane = self.plane(k)?;
        Some(Image {
            shape: self.shape.plane(),
            data: plane.to_vec(),
        })
    }
    /// Iterate over the planes in order.
    pub fn planes(&self) -> impl Iterator<Item = &[P]> {
        self.data.chunks(self.shape.plane_len().max(1))
    }
    pub fn planes_mut(&mut self) -> impl Iterator<Item = &mut [P]> {
        let n = self.shape.plane_len().max(1);
        self.data.chunks_mut(n)
    }

    /// Apply `f` to every pixel, producing an image of the same shape.
    pub fn map<Q: Pixel>(&self, f: impl Fn(P) -> Q) -> Image<Q> {
        Image {
            shape: self.shape,
            data: self.data.iter().map(|&p| f(p)).collect(),
        }
    }

    fn zip_with(&self, other: &Self, f: impl Fn(P, P) -> P) -> Result<Self, ImageError> {
        if self.shape != other.shape {
            return Err(ImageError::ShapeMismatch {
                expected: self.shape,
                found: other.shape,
            });
        }
        Ok(Image {
            shape: self.shape,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }
}

/// Pixels that support elementwise arithmetic and scaling by a real.
pub trait PixelOps: Pixel + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> {
    type Scalar: Real;
    fn scaled(self, k: Self::Scalar) -> Self;
}

impl PixelOps for f32 {
    type Scalar = f32;
    fn scaled(self, k: f32) -> Self {
        self * k
    }
}

impl PixelOps for f64 {
    type Scalar = f64;
    fn scaled(self, k: f64) -> Self {
        self * k
    }
}

impl<T: Real> PixelOps for Complex<T> {
    type Scalar = T;
    fn scaled(self, k: T) -> Self {
        self.scale(k)
    }
}

impl<P: PixelOps> Image<P> {
    pub fn add(&self, other: &Self) -> Result<Self, ImageError> {
        self.zip_with(other, |a, b| a + b)
    }
    pub fn sub(&self, other: &Self) -> Result<Self, ImageError> {
        self.zip_with(other, |a, b| a - b)
    }
    pub fn mul(&self, other: &Self) -> Result<Self, ImageError> {
        self.zip_with(other, |a, b| a * b)
    }
    pub fn scale(&self, k: P::Scalar) -> Self {
        self.map(|a| a.scaled(k))
    }
    pub fn scale_inplace(&mut self, k: P::Scalar) {
        for a in self.data.iter_mut() {
            *a = a.scaled(k);
        }
    }
}

impl<T: Real> Image<T> {
    /// Promote to a complex image with zero imaginary part.
    pub fn to_complex(&self) -> ComplexImage<T> {
        self.map(|a| Complex::new(a, T::zero()))
    }
}

impl<T: Real> Image<Complex<T>> {
    /// Split into amplitude and phase images.
    pub fn to_amp_phase(&self) -> (Image<T>, Image<T>) {
        (self.map(|c| c.abs()), self.map(|c| c.arg()))
    }
    /// Split into real and imaginary images.
    pub fn to_re_im(&self) -> (Image<T>, Image<T>) {
        (self.map(|c| c.re), self.map(|c| c.im))
    }
    pub fn from_amp_phase(amp: &Image<T>, pha: &Image<T>) -> Result<Self, ImageError> {
        Self::combine(amp, pha, Complex::from_polar)
    }
    pub fn from_re_im(re: &Image<T>, im: &Image<T>) -> Result<Self, ImageError> {
        Self::combine(re, im, Complex::new)
    }

    fn combine(a: &Image<T>, b: &Image<T>, f: impl Fn(T, T) -> Complex<T>) -> Result<Self, ImageError> {
        if a.shape != b.shape {
            return Err(ImageError::ShapeMismatch {
                expected: a.shape,
                found: b.shape,
            });
        }
        Ok(Image {
            shape: a.shape,
            data: a
                .data
                .iter()
                .zip(b.data.iter())
                .map(|(&x, &y)| f(x, y))
                .collect(),
        })
    }

    /// Sum of squared amplitudes over every pixel.
    pub fn energy(&self) -> T {
        let mut total = T::zero();
        for c in &self.data {
            total += c.norm_sqr();
        }
        total
    }
}
