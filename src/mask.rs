//! Support masks and the active coordinate sets derived from them.

use alloc::vec;
use alloc::vec::Vec;

use crate::image::{Image, Pixel, Shape};
use crate::num::{Complex, Float};

/// A mask pixel is active when its value exceeds this.
pub const ACTIVE_THRESHOLD: f64 = 0.5;

/// One active pixel: its grid coordinates and its position in the active
/// column and row lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePoint {
    pub x: usize,
    pub y: usize,
    pub ix: usize,
    pub iy: usize,
}

/// Active columns, rows and pixels of a 2D support.
///
/// Columns and rows are ascending. Pixels are ordered with x as the outer
/// loop and y as the inner loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSet {
    nx: usize,
    ny: usize,
    xs: Vec<usize>,
    ys: Vec<usize>,
    points: Vec<ActivePoint>,
}

impl ActiveSet {
    /// Derive the active set of an `nx × ny` grid from a predicate.
    pub fn from_fn(nx: usize, ny: usize, active: impl Fn(usize, usize) -> bool) -> Self {
        let mut col = vec![false; nx];
        let mut row = vec![false; ny];
        let mut hits = Vec::new();
        for i in 0..nx {
            for j in 0..ny {
                if active(i, j) {
                    col[i] = true;
                    row[j] = true;
                    hits.push((i, j));
                }
            }
        }
        let mut col_index = vec![usize::MAX; nx];
        let mut xs = Vec::new();
        for (i, &c) in col.iter().enumerate() {
            if c {
                col_index[i] = xs.len();
                xs.push(i);
            }
        }
        let mut row_index = vec![usize::MAX; ny];
        let mut ys = Vec::new();
        for (j, &r) in row.iter().enumerate() {
            if r {
                row_index[j] = ys.len();
                ys.push(j);
            }
        }
        let points = hits
            .into_iter()
            .map(|(x, y)| ActivePoint {
                x,
                y,
                ix: col_index[x],
                iy: row_index[y],
            })
            .collect();
        Self {
            nx,
            ny,
            xs,
            ys,
            points,
        }
    }

    /// Active set of a real mask plane stored row-major with x fastest.
    pub fn from_plane<T: Float>(plane: &[T], nx: usize, ny: usize) -> Self {
        let threshold = T::from_f64(ACTIVE_THRESHOLD);
        Self::from_fn(nx, ny, |i, j| plane[j * nx + i] > threshold)
    }

    /// Active set of the first plane of a mask image.
    pub fn from_mask<T: Float + Pixel>(mask: &Image<T>) -> Self {
        let plane = mask.plane(0).unwrap_or(&[]);
        if plane.is_empty() {
            return Self::from_fn(0, 0, |_, _| false);
        }
        Self::from_plane(plane, mask.nx(), mask.ny())
    }

    pub fn nx(&self) -> usize {
        self.nx
    }
    pub fn ny(&self) -> usize {
        self.ny
    }
    /// Ascending active column indices.
    pub fn xs(&self) -> &[usize] {
        &self.xs
    }
    /// Ascending active row indices.
    pub fn ys(&self) -> &[usize] {
        &self.ys
    }
    pub fn points(&self) -> &[ActivePoint] {
        &self.points
    }
    pub fn len(&self) -> usize {
        self.points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Support of a complex plane: pixels with `|z|² > eps`.
pub fn complex_support<T: Float + Pixel>(
    plane: &[Complex<T>],
    nx: usize,
    ny: usize,
    eps: T,
) -> Image<T> {
    let mut mask = Image::<T>::zeros(Shape::new_2d(nx, ny));
    for (m, z) in mask.as_mut_slice().iter_mut().zip(plane) {
        if z.norm_sqr() > eps {
            *m = T::one();
        }
    }
    mask
}

/// Support of a real plane: pixels with `|v| > eps`.
pub fn real_support<T: Float + Pixel>(plane: &[T], nx: usize, ny: usize, eps: T) -> Image<T> {
    let mut mask = Image::<T>::zeros(Shape::new_2d(nx, ny));
    for (m, v) in mask.as_mut_slice().iter_mut().zip(plane) {
        if v.abs() > eps {
            *m = T::one();
        }
    }
    mask
}

/// OR a second mask into `mask`: pixels active in `extra` become active.
pub fn merge_active<T: Float + Pixel>(mask: &mut Image<T>, extra: &[T]) {
    let threshold = T::from_f64(ACTIVE_THRESHOLD);
    for (m, &e) in mask.as_mut_slice().iter_mut().zip(extra) {
        if e > threshold {
            *m = T::one();
        }
    }
}
