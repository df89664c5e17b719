//! Demonstrates enabling verbose logging for fpmdft.
use fpmdft::fpm::focal_plane_mask_convolve;
use fpmdft::image::{ComplexImage, Shape};
use fpmdft::num::Complex64;

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let pupil = ComplexImage::<f64>::filled(Shape::new_2d(8, 8), Complex64::new(1.0, 0.0));
    let mask = ComplexImage::<f64>::filled(Shape::new_2d(8, 8), Complex64::new(0.5, 0.0));
    focal_plane_mask_convolve(&pupil, &mask, 2.0, true).unwrap();
}
