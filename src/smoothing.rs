//! One dimensional Gaussian smoothing of trajectories along the time axis.
//!
//! Behaves like `scipy.ndimage.gaussian_filter1d` with its defaults: the kernel is
//! truncated at 4 standard deviations and the signal is extended by mirror
//! reflection that repeats the edge sample (`d c b a | a b c d | d c b a`).

use ndarray::{Array1, Array3, ArrayView1, ArrayViewMut1, Axis, Zip};

/// Kernel half width in standard deviations.
pub const TRUNCATE: f64 = 4.0;

/// Normalized Gaussian weights of radius `(TRUNCATE·σ + 0.5)` truncated to integer.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Maps an index outside `0..n` back into it by reflection about the edges.
fn reflect_index(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let k = i.rem_euclid(period);
    (if k >= n { period - 1 - k } else { k }) as usize
}

fn convolve_into(signal: ArrayView1<f64>, kernel: &[f64], mut output: ArrayViewMut1<f64>) {
    let n = signal.len();
    if n == 0 {
        return;
    }
    let radius = (kernel.len() / 2) as isize;
    for (i, out) in output.iter_mut().enumerate() {
        *out = kernel
            .iter()
            .enumerate()
            .map(|(k, w)| w * signal[reflect_index(i as isize + k as isize - radius, n)])
            .sum();
    }
}

/// Smooths a single signal. A non-positive `sigma` leaves the signal unchanged.
pub fn gaussian_filter1d(signal: ArrayView1<f64>, sigma: f64) -> Array1<f64> {
    if !(sigma > 0.0) {
        return signal.to_owned();
    }
    let kernel = gaussian_kernel(sigma);
    let mut output = Array1::zeros(signal.len());
    convolve_into(signal, &kernel, output.view_mut());
    output
}

/// Smooths every (sample, joint) series of a `[sample, timestep, joint]` batch
/// independently along the timestep axis.
pub fn smooth_along_time(batch: &Array3<f64>, sigma: f64) -> Array3<f64> {
    if !(sigma > 0.0) {
        return batch.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let mut output = Array3::zeros(batch.raw_dim());
    Zip::from(output.lanes_mut(Axis(1)))
        .and(batch.lanes(Axis(1)))
        .for_each(|out, series| convolve_into(series, &kernel, out));
    output
}
