//! Analysis windows

use apodize::{blackman_iter, hamming_iter, hanning_iter, nuttall_iter, triangular_iter};

use crate::config::Window;

/// Window coefficients for a frame of `len` samples
///
/// Returns `None` for the rectangular window, which leaves samples untouched.
pub fn coefficients(window: Window, len: usize) -> Option<Vec<f32>> {
    if window == Window::Rectangular {
        return None;
    }
    // apodize divides by len - 1
    if len <= 1 {
        return Some(vec![1.0; len]);
    }

    let iter: Box<dyn Iterator<Item = f64>> = match window {
        Window::Rectangular => return None,
        Window::Hann => Box::new(hanning_iter(len)),
        Window::Hamming => Box::new(hamming_iter(len)),
        Window::Blackman => Box::new(blackman_iter(len)),
        Window::Nuttall => Box::new(nuttall_iter(len)),
        Window::Triangular => Box::new(triangular_iter(len)),
    };
    Some(iter.map(|x| x as f32).collect())
}

/// Multiply `samples` by `coefficients` in place
#[inline]
pub fn apply(coefficients: &[f32], samples: &mut [f32]) {
    for (sample, w) in samples.iter_mut().zip(coefficients) {
        *sample *= w;
    }
}
