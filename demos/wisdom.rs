//! Measure FFT kernels for this machine and persist the choices.
use fpmdft::fft::{Complex64, FftImpl, FftPlanner, ScalarFftImpl};
use fpmdft::fourier::Fourier;
use fpmdft::image::Image;
use fpmdft::wisdom::{config_dir, Wisdom};

fn main() {
    let dir = config_dir();
    let mut wisdom = Wisdom::<f64>::import(&dir).unwrap_or_default();
    if wisdom.is_empty() {
        println!("measuring kernels up to 2^12 ...");
        wisdom.optimize(12).unwrap();
        let path = wisdom.export(&dir).unwrap();
        println!("saved {}", path.display());
    }
    for (n, s) in wisdom.iter() {
        println!("{:>6} {}", n, s.as_str());
    }

    let fft = ScalarFftImpl::with_planner(FftPlanner::with_wisdom(&wisdom));
    let mut data: Vec<Complex64> = (0..1024).map(|i| Complex64::new(i as f64, 0.0)).collect();
    fft.fft(&mut data).unwrap();
    println!("DC bin: {:.1}", data[0].re);

    let fourier = Fourier::with_wisdom(&wisdom);
    let img = Image::from_fn_2d(64, 64, |i, j| ((i + j) % 7) as f64);
    let zoomed = fourier.zoom_real(&img, 4).unwrap();
    println!(
        "zoomed to {} using {} cached twiddle tables",
        zoomed.shape(),
        fourier.cached_lengths()
    );
}
