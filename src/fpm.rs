//! Pupil-plane propagation through a focal-plane mask of limited support.
//!
//! For every wavelength slice of a pupil field the convolver
//!
//! 1. derives the pupil support (`|z|² > ε`, optionally OR-ed with a
//!    caller-supplied support),
//! 2. derives the mask support,
//! 3. runs a forward [`masked_dft`] from the pupil support onto the mask
//!    support,
//! 4. multiplies by the mask, measuring energy and tip/tilt,
//! 5. optionally removes the tip/tilt from the imaginary part,
//! 6. runs an inverse [`masked_dft`] back onto the pupil support and divides
//!    by `Nx·Ny`.
//!
//! Because only the mask support is evaluated in the focal plane, a mask a
//! few λ/D across can be sampled at a high zoom for little cost.

use alloc::vec::Vec;

use crate::dft::{check_zoom, masked_dft, DftError};
use crate::fft::Direction;
use crate::image::{ComplexImage, Image, Real, Shape};
use crate::mask::{complex_support, merge_active, real_support};
use crate::num::Complex;

/// Pupil and complex-mask support threshold on `|z|²`.
pub const COMPLEX_SUPPORT_EPS: f64 = 1e-16;
/// Pupil support threshold on `|z|²` and real-mask threshold on `|m|`.
pub const REAL_SUPPORT_EPS: f64 = 1e-10;

/// First and second moments of the focal-plane imaginary part, with
/// `x = i − Nx/2` and `y = j − Ny/2`:
/// `tx = Σ x·im·amp`, `tcx = Σ x²·amp²` (likewise for y).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TipTilt {
    pub tx: f64,
    pub ty: f64,
    pub tcx: f64,
    pub tcy: f64,
}

impl TipTilt {
    /// Fitted x slope `tx/tcx`, or 0 when there is no x lever arm.
    pub fn slope_x(&self) -> f64 {
        if self.tcx > 0.0 {
            self.tx / self.tcx
        } else {
            0.0
        }
    }
    pub fn slope_y(&self) -> f64 {
        if self.tcy > 0.0 {
            self.ty / self.tcy
        } else {
            0.0
        }
    }

    fn measure<T: Real>(plane: &[Complex<T>], nx: usize, ny: usize) -> Self {
        let mut tt = TipTilt::default();
        let (cx, cy) = (0.5 * nx as f64, 0.5 * ny as f64);
        for j in 0..ny {
            let y = j as f64 - cy;
            for i in 0..nx {
                let x = i as f64 - cx;
                let z = plane[j * nx + i];
                let amp = z.abs().to_f64();
                let im = z.im.to_f64();
                tt.tx += x * im * amp;
                tt.ty += y * im * amp;
                tt.tcx += x * x * amp * amp;
                tt.tcy += y * y * amp * amp;
            }
        }
        tt
    }
}

/// Diagnostics for one wavelength slice.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SliceReport {
    /// Σ amplitude² in the focal plane after the mask.
    pub energy: f64,
    /// Tip/tilt of the masked focal field. `None` for real masks.
    pub tip_tilt: Option<TipTilt>,
    /// Tip/tilt left after the imaginary-part correction, when it ran.
    pub residual: Option<TipTilt>,
}

/// Output of a convolution: the pupil-plane field and its diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Convolution<T: Real> {
    pub field: ComplexImage<T>,
    pub slices: Vec<SliceReport>,
    /// Sum of the per-slice energies.
    pub total_energy: f64,
}

#[derive(Clone, Copy)]
enum MaskPlane<'a, T> {
    Complex(&'a [Complex<T>]),
    Real(&'a [T]),
}

/// Configurable focal-plane mask convolver.
///
/// ```
/// use fpmdft::fpm::FocalPlaneMaskConvolver;
/// use fpmdft::image::{ComplexImage, Shape};
/// use fpmdft::num::Complex64;
///
/// let pupil = ComplexImage::<f64>::filled(Shape::new_2d(8, 8), Complex64::new(1.0, 0.0));
/// let mask = ComplexImage::<f64>::filled(Shape::new_2d(8, 8), Complex64::new(1.0, 0.0));
/// let out = FocalPlaneMaskConvolver::new(1.0).apply(&pupil, &mask).unwrap();
/// assert!((out.field.get(3, 3, 0).unwrap().re - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct FocalPlaneMaskConvolver<T: Real> {
    zoom: f64,
    force_zero_imaginary: bool,
    pupil_support: Option<Image<T>>,
}

impl<T: Real> FocalPlaneMaskConvolver<T> {
    pub fn new(zoom: f64) -> Self {
        Self {
            zoom,
            force_zero_imaginary: false,
            pupil_support: None,
        }
    }

    /// Remove the fitted tip/tilt from the focal-plane imaginary part before
    /// propagating back. Complex masks only.
    pub fn force_zero_imaginary(mut self, enabled: bool) -> Self {
        self.force_zero_imaginary = enabled;
        self
    }

    /// Extra pupil pixels (value > 0.5) to always include in the input
    /// support, whatever the field amplitude there.
    pub fn with_pupil_support(mut self, support: Image<T>) -> Self {
        self.pupil_support = Some(support);
        self
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Convolve every slice of `pupil` with a complex mask. The mask has one
    /// slice, shared by all pupil slices, or one slice per pupil slice, and
    /// the same `(x, y)` extent as the pupil: the focal-plane sampling is set
    /// by the zoom alone.
    pub fn apply(
        &self,
        pupil: &ComplexImage<T>,
        mask: &ComplexImage<T>,
    ) -> Result<Convolution<T>, DftError> {
        let slices = pupil.slices();
        if mask.slices() != 1 && mask.slices() != slices {
            return Err(DftError::SliceCountMismatch {
                pupil: slices,
                mask: mask.slices(),
            });
        }
        self.run(pupil, mask.shape(), |k| {
            let index = if mask.slices() == 1 { 0 } else { k };
            mask.plane(index).map(MaskPlane::Complex)
        })
    }

    /// Convolve a single-slice pupil with a real mask of the pupil's extent:
    /// the focal-plane amplitude is scaled by the mask value and the phase
    /// is kept.
    pub fn apply_real(
        &self,
        pupil: &ComplexImage<T>,
        mask: &Image<T>,
    ) -> Result<Convolution<T>, DftError> {
        if pupil.slices() != 1 {
            return Err(DftError::MultiSliceRealMask(pupil.slices()));
        }
        self.run(pupil, mask.shape(), |_| mask.plane(0).map(MaskPlane::Real))
    }

    fn run<'m>(
        &self,
        pupil: &ComplexImage<T>,
        mask_shape: Shape,
        mask_plane: impl Fn(usize) -> Option<MaskPlane<'m, T>>,
    ) -> Result<Convolution<T>, DftError>
    where
        T: 'm,
    {
        check_zoom(self.zoom)?;
        if !mask_shape.same_plane(&pupil.shape()) {
            return Err(DftError::ShapeMismatch {
                expected: pupil.shape(),
                found: mask_shape,
            });
        }
        if let Some(support) = &self.pupil_support {
            if !support.shape().same_plane(&pupil.shape()) {
                return Err(DftError::ShapeMismatch {
                    expected: pupil.shape(),
                    found: support.shape(),
                });
            }
        }
        let (nx, ny) = (pupil.nx(), pupil.ny());
        let (fx, fy) = (mask_shape.x, mask_shape.y);
        let slices = pupil.slices();
        let norm = T::from_f64(1.0 / (nx * ny) as f64);

        debug_log!(
            "focal plane mask: pupil {}, mask {}, zoom {}, {} slice(s)",
            pupil.shape(),
            mask_shape,
            self.zoom,
            slices
        );

        let mut field = ComplexImage::<T>::zeros(pupil.shape());
        let mut reports = Vec::with_capacity(slices);
        for k in 0..slices {
            let plane = pupil.plane(k).ok_or(DftError::SliceOutOfRange { index: k, slices })?;
            let mask = mask_plane(k).ok_or(DftError::SliceOutOfRange {
                index: k,
                slices: mask_shape.z,
            })?;

            let eps = match mask {
                MaskPlane::Complex(_) => COMPLEX_SUPPORT_EPS,
                MaskPlane::Real(_) => REAL_SUPPORT_EPS,
            };
            let mut pupil_mask = complex_support(plane, nx, ny, T::from_f64(eps));
            if let Some(support) = &self.pupil_support {
                if let Some(extra) = support.plane(0) {
                    merge_active(&mut pupil_mask, extra);
                }
            }
            let focal_mask = match mask {
                MaskPlane::Complex(m) => complex_support(m, fx, fy, T::from_f64(eps)),
                MaskPlane::Real(m) => real_support(m, fx, fy, T::from_f64(eps)),
            };

            let mut focal = masked_dft(pupil, &pupil_mask, &focal_mask, self.zoom, Direction::Forward, k)?;

            let mut report = SliceReport::default();
            match mask {
                MaskPlane::Complex(m) => {
                    for (z, &w) in focal.as_mut_slice().iter_mut().zip(m) {
                        *z = *z * w;
                        report.energy += z.norm_sqr().to_f64();
                    }
                    let tt = TipTilt::measure(focal.as_slice(), fx, fy);
                    report.tip_tilt = Some(tt);
                    if self.force_zero_imaginary {
                        report.residual = Some(remove_tip_tilt(focal.as_mut_slice(), fx, fy, &tt));
                    }
                }
                MaskPlane::Real(m) => {
                    for (z, &w) in focal.as_mut_slice().iter_mut().zip(m) {
                        *z = z.scale(w);
                        report.energy += z.norm_sqr().to_f64();
                    }
                }
            }

            debug_log!(
                "slice {}: energy {:.6e}, tip/tilt {:?} -> {:?}",
                k,
                report.energy,
                report.tip_tilt.map(|t| (t.slope_x(), t.slope_y())),
                report.residual.map(|t| (t.slope_x(), t.slope_y()))
            );

            let back = masked_dft(&focal, &focal_mask, &pupil_mask, self.zoom, Direction::Inverse, 0)?;
            if let Some(dst) = field.plane_mut(k) {
                for (d, s) in dst.iter_mut().zip(back.as_slice()) {
                    *d = s.scale(norm);
                }
            }
            reports.push(report);
        }

        let total_energy = reports.iter().map(|r| r.energy).sum();
        Ok(Convolution {
            field,
            slices: reports,
            total_energy,
        })
    }
}

/// Subtract `amp·(x·sx + y·sy)` from the imaginary part of every pixel,
/// using slopes fitted beforehand, and return the residual moments. The
/// residual is weighted by the amplitudes before correction.
///
/// This is a single pass with fixed slopes. It does not re-accumulate the
/// moments while subtracting, so results differ slightly from a scheme
/// that updates `tx`/`ty` as it goes.
fn remove_tip_tilt<T: Real>(plane: &mut [Complex<T>], nx: usize, ny: usize, tt: &TipTilt) -> TipTilt {
    let (sx, sy) = (tt.slope_x(), tt.slope_y());
    let (cx, cy) = (0.5 * nx as f64, 0.5 * ny as f64);
    let mut residual = TipTilt {
        tx: 0.0,
        ty: 0.0,
        tcx: tt.tcx,
        tcy: tt.tcy,
    };
    for j in 0..ny {
        let y = j as f64 - cy;
        for i in 0..nx {
            let x = i as f64 - cx;
            let z = &mut plane[j * nx + i];
            let amp = z.abs().to_f64();
            let im = z.im.to_f64() - amp * (x * sx + y * sy);
            z.im = T::from_f64(im);
            residual.tx += x * im * amp;
            residual.ty += y * im * amp;
        }
    }
    residual
}

/// Propagate `pupil` through a complex focal-plane mask.
pub fn focal_plane_mask_convolve<T: Real>(
    pupil: &ComplexImage<T>,
    mask: &ComplexImage<T>,
    zoom: f64,
    force_zero_imaginary: bool,
) -> Result<Convolution<T>, DftError> {
    FocalPlaneMaskConvolver::new(zoom)
        .force_zero_imaginary(force_zero_imaginary)
        .apply(pupil, mask)
}

/// Propagate a single-slice `pupil` through a real focal-plane mask.
pub fn focal_plane_mask_convolve_real<T: Real>(
    pupil: &ComplexImage<T>,
    mask: &Image<T>,
    zoom: f64,
) -> Result<Convolution<T>, DftError> {
    FocalPlaneMaskConvolver::new(zoom).apply_real(pupil, mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::Complex64;

    fn disk(n: usize, radius: f64) -> ComplexImage<f64> {
        ComplexImage::from_fn_2d(n, n, |i, j| {
            let (x, y) = (i as f64 - n as f64 / 2.0, j as f64 - n as f64 / 2.0);
            if x * x + y * y <= radius * radius {
                Complex64::new(1.0, 0.0)
            } else {
                Complex64::zero()
            }
        })
    }

    #[test]
    fn energy_of_all_pass_mask() {
        let pupil = disk(8, 3.0);
        let mask = ComplexImage::<f64>::filled(Shape::new_2d(8, 8), Complex64::new(1.0, 0.0));
        let out = focal_plane_mask_convolve(&pupil, &mask, 1.0, false).unwrap();
        let pupil_energy = pupil.energy();
        // Parseval for the centred transform: focal energy = N·M·pupil energy.
        assert!((out.total_energy - 64.0 * pupil_energy).abs() < 1e-8 * out.total_energy);
        assert_eq!(out.slices.len(), 1);
        assert!(out.slices[0].tip_tilt.is_some());
        assert!(out.slices[0].residual.is_none());
    }

    #[test]
    fn rejects_bad_slice_layouts() {
        let pupil = ComplexImage::<f64>::filled(Shape::new_3d(4, 4, 3), Complex64::new(1.0, 0.0));
        let mask = ComplexImage::<f64>::filled(Shape::new_3d(4, 4, 2), Complex64::new(1.0, 0.0));
        assert_eq!(
            focal_plane_mask_convolve(&pupil, &mask, 1.0, false).unwrap_err(),
            DftError::SliceCountMismatch { pupil: 3, mask: 2 }
        );
        let real = Image::<f64>::filled(Shape::new_2d(4, 4), 1.0);
        assert_eq!(
            focal_plane_mask_convolve_real(&pupil, &real, 1.0).unwrap_err(),
            DftError::MultiSliceRealMask(3)
        );
        assert_eq!(
            FocalPlaneMaskConvolver::new(-1.0).apply_real(&disk(4, 1.0), &real).unwrap_err(),
            DftError::InvalidZoom(-1.0)
        );
    }

    #[test]
    fn pupil_support_must_match_pupil() {
        let pupil = disk(8, 3.0);
        let mask = ComplexImage::<f64>::filled(Shape::new_2d(8, 8), Complex64::new(1.0, 0.0));
        let err = FocalPlaneMaskConvolver::new(1.0)
            .with_pupil_support(Image::<f64>::new_2d(4, 4))
            .apply(&pupil, &mask)
            .unwrap_err();
        assert!(matches!(err, DftError::ShapeMismatch { .. }));
    }

    #[test]
    fn mask_extent_must_match_pupil() {
        let pupil = disk(8, 3.0);
        let wide = ComplexImage::<f64>::filled(Shape::new_2d(16, 16), Complex64::new(1.0, 0.0));
        assert_eq!(
            FocalPlaneMaskConvolver::new(2.0).apply(&pupil, &wide).unwrap_err(),
            DftError::ShapeMismatch {
                expected: Shape::new_2d(8, 8),
                found: Shape::new_2d(16, 16),
            }
        );
        let narrow = Image::<f64>::filled(Shape::new_2d(8, 4), 1.0);
        assert!(matches!(
            focal_plane_mask_convolve_real(&pupil, &narrow, 1.0),
            Err(DftError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn pupil_support_extends_output() {
        let pupil = disk(8, 2.0);
        let mask = ComplexImage::<f64>::filled(Shape::new_2d(8, 8), Complex64::new(0.5, 0.0));
        let plain = FocalPlaneMaskConvolver::new(1.0).apply(&pupil, &mask).unwrap();
        assert_eq!(plain.field.get(0, 0, 0), Some(Complex64::zero()));
        let mut support = Image::<f64>::new_2d(8, 8);
        support.set(0, 0, 0, 1.0);
        let extended = FocalPlaneMaskConvolver::new(1.0)
            .with_pupil_support(support)
            .apply(&pupil, &mask)
            .unwrap();
        // A flat mask is a scaled identity, so the extra pixel stays dark.
        assert!(extended.field.get(0, 0, 0).unwrap().abs() < 1e-12);
        let v = extended.field.get(4, 4, 0).unwrap();
        assert!((v.re - 0.5).abs() < 1e-9);
    }

    #[test]
    fn force_zero_imaginary_reduces_tilt() {
        let mut pupil = ComplexImage::<f64>::new_2d(16, 16);
        pupil.set(8, 8, 0, Complex64::new(1.0, 0.0));
        // A centred point gives a flat focal field; the mask adds an
        // imaginary ramp along x.
        let mask = ComplexImage::<f64>::from_fn_2d(16, 16, |i, _| {
            Complex64::new(1.0, 0.05 * (i as f64 - 8.0))
        });
        let out = focal_plane_mask_convolve(&pupil, &mask, 1.0, true).unwrap();
        let before = out.slices[0].tip_tilt.unwrap();
        let after = out.slices[0].residual.unwrap();
        assert!(before.slope_x().abs() > 1e-3);
        assert!(after.slope_x().abs() < 0.1 * before.slope_x().abs());
        assert_eq!(before.tcx, after.tcx);
    }
}
