//! Lyot-style coronagraph: a small opaque occulter in the focal plane,
//! sampled at high zoom, removes most of the on-axis light.
use fpmdft::fpm::FocalPlaneMaskConvolver;
use fpmdft::image::{ComplexImage, Image};
use fpmdft::num::Complex64;

fn main() {
    let n = 64;
    let c = n as f64 / 2.0;
    let pupil: ComplexImage<f64> = Image::from_fn_2d(n, n, |i, j| {
        let (x, y) = (i as f64 - c, j as f64 - c);
        if x * x + y * y <= 28.0 * 28.0 {
            Complex64::new(1.0, 0.0)
        } else {
            Complex64::zero()
        }
    });

    // The mask shares the pupil grid; the zoom sets roughly how many focal
    // pixels span λ/D. A 2 λ/D occulter inside a 7 λ/D field stop at zoom 4.
    let (f, zoom) = (n, 4.0);
    let stop = |r2: f64| r2 <= (7.0 * zoom) * (7.0 * zoom);
    let occulter: ComplexImage<f64> = Image::from_fn_2d(f, f, |i, j| {
        let (x, y) = (i as f64 - f as f64 / 2.0, j as f64 - f as f64 / 2.0);
        let r2 = x * x + y * y;
        if r2 > (2.0 * zoom) * (2.0 * zoom) && stop(r2) {
            Complex64::new(1.0, 0.0)
        } else {
            Complex64::zero()
        }
    });
    let open: ComplexImage<f64> = Image::from_fn_2d(f, f, |i, j| {
        let (x, y) = (i as f64 - f as f64 / 2.0, j as f64 - f as f64 / 2.0);
        if stop(x * x + y * y) {
            Complex64::new(1.0, 0.0)
        } else {
            Complex64::zero()
        }
    });

    let conv = FocalPlaneMaskConvolver::new(zoom).force_zero_imaginary(true);
    let reference = conv.apply(&pupil, &open).unwrap();
    let masked = conv.apply(&pupil, &occulter).unwrap();

    println!("focal energy, field stop only: {:.4e}", reference.total_energy);
    println!("focal energy, with occulter:   {:.4e}", masked.total_energy);
    println!(
        "pupil energy after occulter / without: {:.4}",
        masked.field.energy() / reference.field.energy()
    );
    if let Some(tt) = masked.slices[0].tip_tilt {
        println!("tip/tilt slopes: ({:.3e}, {:.3e})", tt.slope_x(), tt.slope_y());
    }
}
