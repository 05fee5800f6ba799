use std::f32::consts::PI;

/// Pre-emphasis coefficient used ahead of LPC analysis.
pub const PRE_EMPHASIS: f32 = 0.97;

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

/// Clamp to [0, 1], mapping NaN/Inf to 0.
#[inline]
pub fn clamp01(x: f32) -> f32 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn frame_rms(x: &[f32]) -> f32 {
    let mut s = 0.0f32;
    for &v in x {
        s += v * v;
    }
    (s / (x.len().max(1) as f32)).sqrt()
}

/// Same as [`frame_rms`] but with a pre-gain applied to every sample.
pub fn frame_rms_with_gain(x: &[f32], gain: f32) -> f32 {
    let mut s = 0.0f32;
    for &v in x {
        let g = v * gain;
        s += g * g;
    }
    (s / (x.len().max(1) as f32)).sqrt()
}

/// Fraction of adjacent sample pairs whose sign differs. Zero counts as positive.
pub fn zero_crossing_rate(x: &[f32]) -> f32 {
    if x.len() < 2 {
        return 0.0;
    }
    let mut crossings = 0usize;
    for pair in x.windows(2) {
        if (pair[0] >= 0.0) != (pair[1] >= 0.0) {
            crossings += 1;
        }
    }
    crossings as f32 / (x.len() - 1) as f32
}

pub fn make_hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / denom).cos())
        .collect()
}

pub fn make_hamming_window(n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / denom).cos())
        .collect()
}

/// Remove DC, apply pre-emphasis and the analysis window, writing into `out`.
///
/// `out` and `window` must be at least `frame.len()` long.
pub fn condition_for_lpc(frame: &[f32], window: &[f64], out: &mut [f64]) {
    let n = frame.len();
    let mut mean = 0.0f64;
    for &v in frame {
        mean += v as f64;
    }
    mean /= n.max(1) as f64;

    let mut prev = 0.0f64;
    for i in 0..n {
        let d = frame[i] as f64 - mean;
        out[i] = (d - PRE_EMPHASIS as f64 * prev) * window[i];
        prev = d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp01_handles_non_finite() {
        assert_eq!(clamp01(f32::NAN), 0.0);
        assert_eq!(clamp01(f32::INFINITY), 0.0);
        assert_eq!(clamp01(1.7), 1.0);
        assert_eq!(clamp01(-0.2), 0.0);
    }

    #[test]
    fn test_zero_crossing_rate_alternating() {
        let x = [1.0, -1.0, 1.0, -1.0, 1.0];
        assert!((zero_crossing_rate(&x) - 1.0).abs() < 1e-6);
        assert_eq!(zero_crossing_rate(&[0.0; 16]), 0.0);
    }

    #[test]
    fn test_rms_of_full_scale_square() {
        let x = [1.0, -1.0, 1.0, -1.0];
        assert!((frame_rms(&x) - 1.0).abs() < 1e-6);
        assert!((frame_rms_with_gain(&x, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_windows_are_symmetric() {
        let w = make_hann_window(64);
        assert!((w[0] - w[63]).abs() < 1e-6);
        assert!(w[0] < 1e-6);
        let h = make_hamming_window(64);
        assert!((h[0] - 0.08).abs() < 1e-6);
    }
}
