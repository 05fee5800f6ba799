//! Linear Predictive Coding (autocorrelation method)
//!
//! Fits an all-pole vocal-tract model to one analysis frame. The resulting
//! polynomial `A(z) = 1 + a1 z^-1 + ... + ap z^-p` has its roots at the
//! resonances we report as formants.
//!
//! ## Numerical contract
//! - Zero-energy frames (`r[0] == 0`) return all-zero coefficients; nothing is
//!   divided by zero.
//! - A recursion that produces a non-finite value, or a reflection coefficient
//!   with `|k| >= 1`, is reported as [`LpcError::Unstable`]. Callers resolve
//!   that to a zero-formant result.

// =============================================================================
// Constants
// =============================================================================

/// Default LPC order (12 poles is enough for three speech formants at 16 kHz).
pub const DEFAULT_LPC_ORDER: usize = 12;

/// White-noise correction added to r[0] (-40 dB floor).
/// Keeps the Toeplitz system well conditioned for near-sinusoidal frames.
const WHITE_NOISE_CORRECTION: f64 = 1e-4;

/// Prediction error below this is treated as a collapsed recursion.
const ERROR_FLOOR: f64 = 1e-30;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpcError {
    /// The recursion diverged (NaN/Inf or |k| >= 1).
    Unstable,
}

/// Result of one Levinson-Durbin run.
#[derive(Debug, Clone, Default)]
pub struct LpcCoefficients {
    /// a[1..=p] (the leading 1 is implicit).
    pub a: Vec<f64>,
    /// Reflection (PARCOR) coefficients k[1..=p].
    pub reflection: Vec<f64>,
    /// Final prediction error energy.
    pub error: f64,
}

impl LpcCoefficients {
    pub fn zeros(order: usize) -> Self {
        Self {
            a: vec![0.0; order],
            reflection: vec![0.0; order],
            error: 0.0,
        }
    }

    pub fn order(&self) -> usize {
        self.a.len()
    }

    /// True when every coefficient is zero (silent frame).
    pub fn is_silent(&self) -> bool {
        self.a.iter().all(|&c| c == 0.0)
    }

    /// Monic polynomial coefficients, highest power first:
    /// `z^p + a1 z^(p-1) + ... + ap`.
    pub fn polynomial(&self) -> Vec<f64> {
        let mut poly = Vec::with_capacity(self.a.len() + 1);
        poly.push(1.0);
        poly.extend_from_slice(&self.a);
        poly
    }
}

// =============================================================================
// Analysis
// =============================================================================

/// Autocorrelation r[0..=max_lag] of `signal`, written into `r`.
pub fn autocorrelation(signal: &[f64], r: &mut [f64]) {
    let n = signal.len();
    for (k, slot) in r.iter_mut().enumerate() {
        let mut sum = 0.0;
        for i in 0..n.saturating_sub(k) {
            sum += signal[i] * signal[i + k];
        }
        *slot = sum;
    }
}

/// Levinson-Durbin recursion over autocorrelation values r[0..=order].
pub fn levinson_durbin(r: &[f64], order: usize) -> Result<LpcCoefficients, LpcError> {
    if order == 0 || r.len() < order + 1 {
        return Ok(LpcCoefficients::zeros(order));
    }
    if r[0] == 0.0 {
        return Ok(LpcCoefficients::zeros(order));
    }
    if !r[0].is_finite() || r[0] < 0.0 {
        return Err(LpcError::Unstable);
    }

    let r0 = r[0] * (1.0 + WHITE_NOISE_CORRECTION);

    let mut a = vec![0.0f64; order];
    let mut prev = vec![0.0f64; order];
    let mut reflection = vec![0.0f64; order];
    let mut error = r0;

    for m in 0..order {
        let mut acc = r[m + 1];
        for j in 0..m {
            acc += prev[j] * r[m - j];
        }

        let k = -acc / error;
        if !k.is_finite() || k.abs() >= 1.0 {
            return Err(LpcError::Unstable);
        }
        reflection[m] = k;
        a[m] = k;
        for j in 0..m {
            a[j] = prev[j] + k * prev[m - 1 - j];
        }

        error *= 1.0 - k * k;
        prev[..=m].copy_from_slice(&a[..=m]);

        if error <= ERROR_FLOOR {
            // Perfectly predictable: higher-order terms stay zero.
            break;
        }
    }

    if a.iter().any(|c| !c.is_finite()) || !error.is_finite() {
        return Err(LpcError::Unstable);
    }

    Ok(LpcCoefficients {
        a,
        reflection,
        error,
    })
}
