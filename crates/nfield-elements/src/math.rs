//! Shared numeric helpers: sampled Gaussians, kernel construction, and
//! same-mode correlations.
//!
//! Positions are 0-based sample indices. Circular variants treat the sampled
//! range as a ring of circumference `len`.

use ndarray::{Array1, ArrayView1};
use nfield_core::element::FloatValue;

/// Gaussian sampled at positions `0..len`, centred at `mu`.
///
/// With `normalized` the samples are scaled to sum to one before any
/// amplitude is applied by the caller.
pub fn gauss(len: usize, mu: FloatValue, sigma: FloatValue, normalized: bool) -> Array1<FloatValue> {
    let mut values = Array1::from_shape_fn(len, |x| {
        let d = x as FloatValue - mu;
        (-d * d / (2.0 * sigma * sigma)).exp()
    });
    if normalized {
        let sum = values.sum();
        if sum > 0.0 {
            values /= sum;
        }
    }
    values
}

/// Gaussian over circular space: distances wrap around a ring of
/// circumference `len`.
pub fn circular_gauss(
    len: usize,
    mu: FloatValue,
    sigma: FloatValue,
    normalized: bool,
) -> Array1<FloatValue> {
    let circumference = len as FloatValue;
    let mut values = Array1::from_shape_fn(len, |x| {
        let mut d = (x as FloatValue - mu).rem_euclid(circumference);
        if d > circumference / 2.0 {
            d -= circumference;
        }
        (-d * d / (2.0 * sigma * sigma)).exp()
    });
    if normalized {
        let sum = values.sum();
        if sum > 0.0 {
            values /= sum;
        }
    }
    values
}

/// Gaussian sampled at offsets `-half_width..=half_width`, peak at the
/// centre. Used for truncated interaction kernels.
pub fn centered_gauss(
    half_width: usize,
    sigma: FloatValue,
    normalized: bool,
) -> Array1<FloatValue> {
    let h = half_width as FloatValue;
    gauss(2 * half_width + 1, h, sigma, normalized)
}

/// Half-width at which a kernel of width `sigma` is truncated.
///
/// The reach is `ceil(cutoff_factor * sigma)`, clamped so the kernel never
/// exceeds the sampled space: `len - 1` taps to either side for linear
/// space, half the ring for circular space.
pub fn kernel_half_width(
    sigma: FloatValue,
    cutoff_factor: FloatValue,
    len: usize,
    circular: bool,
) -> usize {
    let reach = (sigma * cutoff_factor).ceil() as usize;
    let limit = if circular { (len - 1) / 2 } else { len.saturating_sub(1) };
    reach.min(limit)
}

/// Same-mode correlation of `input` with an odd-length kernel.
///
/// Out-of-range taps read zero in linear mode and wrap in circular mode.
/// The kernel is not flipped; for the symmetric kernels used here the
/// distinction from convolution vanishes.
pub fn correlate_same(
    input: ArrayView1<FloatValue>,
    kernel: ArrayView1<FloatValue>,
    circular: bool,
) -> Array1<FloatValue> {
    let n = input.len() as isize;
    let h = (kernel.len() / 2) as isize;
    Array1::from_shape_fn(input.len(), |i| {
        let mut acc = 0.0;
        for j in -h..=h {
            let idx = i as isize + j;
            let value = if circular {
                input[idx.rem_euclid(n) as usize]
            } else if (0..n).contains(&idx) {
                input[idx as usize]
            } else {
                continue;
            };
            acc += value * kernel[(j + h) as usize];
        }
        acc
    })
}

/// Same-mode linear convolution, `numpy.convolve(signal, kernel, 'same')`
/// semantics: the centred `signal.len()` samples of the full convolution.
pub fn convolve_same(
    signal: ArrayView1<FloatValue>,
    kernel: ArrayView1<FloatValue>,
) -> Array1<FloatValue> {
    let n = signal.len();
    let k = kernel.len();
    if k == 0 {
        return Array1::zeros(n);
    }
    let mut full = vec![0.0; n + k - 1];
    for i in 0..n {
        for j in 0..k {
            full[i + j] += signal[i] * kernel[j];
        }
    }
    let start = (k - 1) / 2;
    Array1::from_iter(full[start..start + n].iter().copied())
}

pub fn sigmoid(u: FloatValue, beta: FloatValue) -> FloatValue {
    1.0 / (1.0 + (-beta * u).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::array;

    #[test]
    fn gauss_peaks_at_mu() {
        let g = gauss(11, 5.0, 2.0, false);
        assert_eq!(g.len(), 11);
        assert!(is_close!(g[5], 1.0));
        assert!(g[4] < g[5] && g[6] < g[5]);
        assert!(is_close!(g[4], g[6]));
    }

    #[test]
    fn normalized_gauss_sums_to_one() {
        let g = gauss(21, 10.0, 3.0, true);
        assert!(is_close!(g.sum(), 1.0));
    }

    #[test]
    fn circular_gauss_wraps() {
        // Centred on the seam: both ends of the ring see the peak's flanks.
        let g = circular_gauss(10, 0.0, 1.5, false);
        assert!(is_close!(g[0], 1.0));
        assert!(is_close!(g[1], g[9]));
        assert!(is_close!(g[2], g[8]));
    }

    #[test]
    fn half_width_is_clamped() {
        assert_eq!(kernel_half_width(2.0, 3.0, 101, false), 6);
        assert_eq!(kernel_half_width(50.0, 5.0, 11, false), 10);
        assert_eq!(kernel_half_width(50.0, 5.0, 11, true), 5);
    }

    #[test]
    fn identity_kernel_correlation() {
        let signal = array![1.0, 2.0, 3.0, 4.0];
        let identity = array![0.0, 1.0, 0.0];
        assert_eq!(
            correlate_same(signal.view(), identity.view(), false),
            signal
        );
    }

    #[test]
    fn linear_correlation_zero_pads() {
        let signal = array![1.0, 2.0, 3.0];
        let kernel = array![1.0, 1.0, 1.0];
        assert_eq!(
            correlate_same(signal.view(), kernel.view(), false),
            array![3.0, 6.0, 5.0]
        );
    }

    #[test]
    fn circular_correlation_wraps() {
        let signal = array![1.0, 2.0, 3.0];
        let kernel = array![1.0, 1.0, 1.0];
        assert_eq!(
            correlate_same(signal.view(), kernel.view(), true),
            array![6.0, 6.0, 6.0]
        );
    }

    #[test]
    fn convolve_same_matches_reference() {
        // numpy.convolve([1, 2, 3], [0, 1, 0.5], 'same') == [1, 2.5, 4]
        let signal = array![1.0, 2.0, 3.0];
        let kernel = array![0.0, 1.0, 0.5];
        let out = convolve_same(signal.view(), kernel.view());
        assert_eq!(out, array![1.0, 2.5, 4.0]);
    }

    #[test]
    fn sigmoid_shape() {
        assert!(is_close!(sigmoid(0.0, 4.0), 0.5));
        assert!(sigmoid(10.0, 4.0) > 0.99);
        assert!(sigmoid(-10.0, 4.0) < 0.01);
    }
}
