use fpmdft::fft::Direction;
use fpmdft::fourier::{
    correlate, fft_2d, ifft_2d, permute, permuted, pupil_fft, translate, zoom_complex, zoom_real,
    FourierError, Representation,
};
use fpmdft::image::{ComplexImage, Image, Shape};
use fpmdft::num::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_image(nx: usize, ny: usize, seed: u64) -> Image<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Image::from_fn_2d(nx, ny, |_, _| rng.gen_range(0.1..1.0))
}

fn argmax(img: &Image<f64>) -> (usize, usize) {
    let mut best = (0, 0.0);
    for (idx, &v) in img.as_slice().iter().enumerate() {
        if v > best.1 {
            best = (idx, v);
        }
    }
    (best.0 % img.nx(), best.0 / img.nx())
}

#[test]
fn permute_moves_origin_to_centre() {
    let mut img = Image::<f64>::new_2d(8, 6);
    img.set(0, 0, 0, 1.0);
    img.set(7, 5, 0, 2.0);
    permute(&mut img);
    assert_eq!(img.get(4, 3, 0), Some(1.0));
    assert_eq!(img.get(3, 2, 0), Some(2.0));
    permute(&mut img);
    assert_eq!(img.get(0, 0, 0), Some(1.0));
    assert_eq!(img.get(7, 5, 0), Some(2.0));
}

#[test]
fn permute_swaps_1d_halves_and_every_plane() {
    let mut line = Image::from_vec(Shape::new_1d(4), vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
    permute(&mut line);
    assert_eq!(line.as_slice(), &[3.0, 4.0, 1.0, 2.0]);

    let mut cube = Image::<f64>::new_3d(2, 2, 2);
    cube.set(0, 0, 0, 1.0);
    cube.set(0, 0, 1, 2.0);
    let swapped = permuted(&cube);
    assert_eq!(swapped.get(1, 1, 0), Some(1.0));
    assert_eq!(swapped.get(1, 1, 1), Some(2.0));
}

#[test]
fn fft_roundtrip_scales_by_size() {
    let img = random_image(8, 4, 1).to_complex();
    let back = ifft_2d(&fft_2d(&img).unwrap()).unwrap();
    for (a, b) in back.as_slice().iter().zip(img.as_slice()) {
        assert!((a.re - 32.0 * b.re).abs() < 1e-10);
        assert!(a.im.abs() < 1e-10);
    }
}

#[test]
fn fft_rejects_non_power_of_two() {
    let img = ComplexImage::<f64>::new_2d(6, 4);
    assert!(matches!(fft_2d(&img), Err(FourierError::Fft(_))));
}

#[test]
fn autocorrelation_peaks_at_centre() {
    let a = random_image(8, 8, 2);
    let corr = correlate(&a, &a).unwrap();
    assert_eq!(argmax(&corr), (4, 4));
    let energy: f64 = a.as_slice().iter().map(|v| v * v).sum();
    let peak = corr.get(4, 4, 0).unwrap();
    assert!((peak - energy / 8.0).abs() < 1e-10);
}

#[test]
fn correlation_peak_tracks_shift() {
    let a = random_image(8, 8, 3);
    let mut b = Image::<f64>::new_2d(8, 8);
    for j in 0..8 {
        for i in 0..8 {
            b.set((i + 2) % 8, (j + 1) % 8, 0, a.get(i, j, 0).unwrap());
        }
    }
    let corr = correlate(&a, &b).unwrap();
    assert_eq!(argmax(&corr), (6, 5));
}

#[test]
fn correlate_checks_shapes() {
    let a = Image::<f64>::new_2d(8, 8);
    let b = Image::<f64>::new_2d(8, 4);
    assert!(matches!(correlate(&a, &b), Err(FourierError::Image(_))));
}

#[test]
fn zoom_conserves_flux() {
    let img = random_image(8, 8, 4);
    let zoomed = zoom_real(&img, 2).unwrap();
    assert_eq!(zoomed.shape(), Shape::new_2d(16, 16));
    let before: f64 = img.as_slice().iter().sum();
    let after: f64 = zoomed.as_slice().iter().sum();
    assert!((before - after).abs() < 1e-9);
}

#[test]
fn unit_zoom_is_identity() {
    let img = random_image(8, 4, 5).to_complex();
    let same = zoom_complex(&img, 1).unwrap();
    for (a, b) in same.as_slice().iter().zip(img.as_slice()) {
        assert!((a.re - b.re).abs() < 1e-12 && a.im.abs() < 1e-12);
    }
    assert_eq!(zoom_complex(&img, 0).unwrap_err(), FourierError::InvalidFactor(0));
}

#[test]
fn zoom_keeps_slices() {
    let cube = ComplexImage::<f64>::filled(Shape::new_3d(4, 4, 3), Complex64::new(1.0, 0.0));
    let zoomed = zoom_complex(&cube, 2).unwrap();
    assert_eq!(zoomed.shape(), Shape::new_3d(8, 8, 3));
    for z in zoomed.as_slice() {
        assert!((z.re - 0.25).abs() < 1e-12);
    }
}

#[test]
fn integer_translation_is_a_roll() {
    let img = random_image(8, 8, 6);
    let moved = translate(&img, 1.0, 2.0).unwrap();
    for j in 0..8 {
        for i in 0..8 {
            let expect = img.get((i + 1) % 8, (j + 2) % 8, 0).unwrap();
            assert!((moved.get(i, j, 0).unwrap() - expect).abs() < 1e-10);
        }
    }
    let negative = translate(&img, -3.0, 0.0).unwrap();
    assert!((negative.get(3, 0, 0).unwrap() - img.get(0, 0, 0).unwrap()).abs() < 1e-10);
}

#[test]
fn half_pixel_translation_keeps_mean() {
    let img = random_image(8, 8, 7);
    let moved = translate(&img, 0.5, -0.5).unwrap();
    let before: f64 = img.as_slice().iter().sum();
    let after: f64 = moved.as_slice().iter().sum();
    assert!((before - after).abs() < 1e-9);
}

#[test]
fn pupil_fft_of_centred_point_is_flat() {
    let mut amp = Image::<f64>::new_2d(8, 8);
    amp.set(4, 4, 0, 1.0);
    let pha = Image::<f64>::new_2d(8, 8);
    let (a, p) = pupil_fft(&amp, &pha, Representation::AmpPhase, Direction::Forward).unwrap();
    for (x, y) in a.as_slice().iter().zip(p.as_slice()) {
        assert!((x - 1.0).abs() < 1e-12);
        assert!(y.abs() < 1e-12);
    }
}

#[test]
fn pupil_fft_re_im_roundtrip() {
    let re = random_image(8, 8, 8);
    let im = random_image(8, 8, 9);
    let (fr, fi) = pupil_fft(&re, &im, Representation::ReIm, Direction::Forward).unwrap();
    let (br, bi) = pupil_fft(&fr, &fi, Representation::ReIm, Direction::Inverse).unwrap();
    for k in 0..64 {
        assert!((br.as_slice()[k] - 64.0 * re.as_slice()[k]).abs() < 1e-9);
        assert!((bi.as_slice()[k] - 64.0 * im.as_slice()[k]).abs() < 1e-9);
    }
}
