//! Masked DFT walkthrough: a circular pupil transformed onto a finely
//! sampled focal plane, then only onto a small annulus.
use fpmdft::dft::masked_dft;
use fpmdft::fft::Direction;
use fpmdft::image::{ComplexImage, Image, Shape};
use fpmdft::num::Complex64;

fn disk(n: usize, r: f64) -> Image<f64> {
    let c = n as f64 / 2.0;
    Image::from_fn_2d(n, n, |i, j| {
        let (x, y) = (i as f64 - c, j as f64 - c);
        if x * x + y * y <= r * r {
            1.0
        } else {
            0.0
        }
    })
}

fn main() {
    println!("=== fpmdft masked DFT ===\n");
    let n = 32;
    let support = disk(n, 12.0);
    let pupil: ComplexImage<f64> = support.map(|a| Complex64::new(a, 0.0));
    println!("pupil: {} with {} active pixels", pupil.shape(), support.as_slice().iter().filter(|&&a| a > 0.5).count());

    // Full focal plane at 4x zoom.
    let focal_full = Image::<f64>::filled(Shape::new_2d(64, 64), 1.0);
    let psf = masked_dft(&pupil, &support, &focal_full, 4.0, Direction::Forward, 0).unwrap();
    let peak = psf.get(32, 32, 0).unwrap();
    println!("psf peak at centre: {:.3}", peak.abs());
    println!("psf energy: {:.3}", psf.energy());

    // Only an annulus of the focal plane.
    let annulus = Image::from_fn_2d(64, 64, |i, j| {
        let (x, y) = (i as f64 - 32.0, j as f64 - 32.0);
        let r2 = x * x + y * y;
        if (16.0..=64.0).contains(&r2) {
            1.0
        } else {
            0.0
        }
    });
    let ring = masked_dft(&pupil, &support, &annulus, 4.0, Direction::Forward, 0).unwrap();
    println!("annulus energy: {:.3}", ring.energy());
    println!("centre pixel (inactive): {:?}", ring.get(32, 32, 0).unwrap());
}
