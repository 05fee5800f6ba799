//! Polynomial root finding (Durand-Kerner / Weierstrass iteration)
//!
//! Finds all complex roots of a monic real polynomial simultaneously. For the
//! degree-12 LPC polynomials we see, this converges in 10-20 iterations. Roots
//! are exact pole positions, so formant frequencies are not quantised to any
//! angular grid.

use rustfft::num_complex::Complex;

/// Iteration cap. Ill-conditioned input that has not converged by then is
/// reported as [`RootError::NoConvergence`].
const MAX_ITERATIONS: usize = 500;

/// Convergence threshold on the largest root update.
const TOLERANCE: f64 = 1e-12;

/// Standard non-real, non-unit seed for the initial guesses.
const SEED: Complex<f64> = Complex { re: 0.4, im: 0.9 };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootError {
    NoConvergence,
    NonFinite,
}

/// Evaluate a polynomial (highest power first) at `z` via Horner's rule.
#[inline]
fn eval(poly: &[f64], z: Complex<f64>) -> Complex<f64> {
    let mut acc = Complex::new(0.0, 0.0);
    for &c in poly {
        acc = acc * z + c;
    }
    acc
}

/// All roots of the polynomial `poly` (highest power first).
///
/// The polynomial is normalised to monic form. A leading zero coefficient or
/// an empty slice yields no roots.
pub fn find_roots(poly: &[f64]) -> Result<Vec<Complex<f64>>, RootError> {
    let lead = match poly.first() {
        Some(&c) if c != 0.0 => c,
        _ => return Ok(Vec::new()),
    };
    if poly.iter().any(|c| !c.is_finite()) {
        return Err(RootError::NonFinite);
    }

    let monic: Vec<f64> = poly.iter().map(|&c| c / lead).collect();
    let degree = monic.len() - 1;
    if degree == 0 {
        return Ok(Vec::new());
    }

    let mut roots: Vec<Complex<f64>> = (0..degree).map(|i| SEED.powu(i as u32)).collect();

    for _ in 0..MAX_ITERATIONS {
        let mut max_step = 0.0f64;
        for i in 0..degree {
            let zi = roots[i];
            let mut denom = Complex::new(1.0, 0.0);
            for (j, &zj) in roots.iter().enumerate() {
                if j != i {
                    denom *= zi - zj;
                }
            }
            if denom.norm_sqr() == 0.0 {
                // Coincident estimates: nudge apart and keep iterating.
                denom = Complex::new(1e-12, 0.0);
            }
            let step = eval(&monic, zi) / denom;
            roots[i] = zi - step;
            max_step = max_step.max(step.norm());
        }

        if !max_step.is_finite() {
            return Err(RootError::NonFinite);
        }
        if max_step < TOLERANCE {
            return Ok(roots);
        }
    }

    Err(RootError::NoConvergence)
}
