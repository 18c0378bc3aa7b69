use num_traits::Float;
use tracing::debug;

use crate::error::{Result, UmapError};

/////////////
// Globals //
/////////////

/// Number of evenly spaced samples of the target kernel
pub const CURVE_SAMPLES: usize = 300;
/// Maximum number of accepted Levenberg-Marquardt steps
const LM_MAX_ITER: usize = 500;
/// Damping above which no downhill step can be found anymore
const LM_MAX_LAMBDA: f64 = 1e16;
/// Stop once the gradient of the cost is this small
const LM_GRAD_TOL: f64 = 1e-14;
/// Stop once the relative parameter update is this small
const LM_STEP_TOL: f64 = 1e-12;

////////////
// Params //
////////////

/// Parameters of the low-dimensional similarity kernel
/// `(1 + a * d^(2b))^-1`
///
/// ### Fields
///
/// * `a` - Scale, strictly positive
/// * `b` - Exponent, strictly positive
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurveParams<T> {
    pub a: T,
    pub b: T,
}

impl<T> CurveParams<T>
where
    T: Float,
{
    /// Evaluate the kernel at distance `d`
    pub fn eval(&self, d: T) -> T {
        T::one() / (T::one() + self.a * d.powf((T::one() + T::one()) * self.b))
    }
}

/////////////
// Helpers //
/////////////

/// Sample the offset exponential decay the kernel is fitted to
///
/// `psi(d) = 1` for `d < min_dist`, `exp(-(d - min_dist) / spread)`
/// otherwise, on `CURVE_SAMPLES` points over `[0, 3 * spread]`.
///
/// ### Returns
///
/// Tuple of `(xs, ys)`
fn target_samples(min_dist: f64, spread: f64) -> (Vec<f64>, Vec<f64>) {
    let step = 3.0 * spread / (CURVE_SAMPLES - 1) as f64;
    (0..CURVE_SAMPLES)
        .map(|i| {
            let x = step * i as f64;
            let y = if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            };
            (x, y)
        })
        .unzip()
}

/// Sum of squared residuals of the kernel against the samples
fn sum_sq_residuals(xs: &[f64], ys: &[f64], a: f64, b: f64) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let r = 1.0 / (1.0 + a * x.powf(2.0 * b)) - y;
            r * r
        })
        .sum()
}

/// Normal equations of the least squares problem at `(a, b)`
///
/// ### Returns
///
/// `(JᵀJ as [j_aa, j_ab, j_bb], Jᵀr as [g_a, g_b])`
fn normal_equations(xs: &[f64], ys: &[f64], a: f64, b: f64) -> ([f64; 3], [f64; 2]) {
    let mut jtj = [0.0; 3];
    let mut jtr = [0.0; 2];

    for (&x, &y) in xs.iter().zip(ys) {
        // at x = 0 the model is constant 1 and both partials vanish
        if x <= 0.0 {
            continue;
        }
        let x_2b = x.powf(2.0 * b);
        let denom = 1.0 + a * x_2b;
        let r = 1.0 / denom - y;
        let d_a = -x_2b / (denom * denom);
        let d_b = -2.0 * a * x_2b * x.ln() / (denom * denom);

        jtj[0] += d_a * d_a;
        jtj[1] += d_a * d_b;
        jtj[2] += d_b * d_b;
        jtr[0] += d_a * r;
        jtr[1] += d_b * r;
    }

    (jtj, jtr)
}

/////////
// Fit //
/////////

/// Fit the `(a, b)` kernel parameters from `min_dist` and `spread`
///
/// Non-linear least squares via Levenberg-Marquardt with Marquardt's
/// diagonal scaling, started at `(1, 1)` and with `a` kept non-negative.
/// The result only depends on the two arguments.
///
/// ### Params
///
/// * `min_dist` - Distance up to which the target kernel is flat at 1
/// * `spread` - Decay scale of the target kernel
///
/// ### Returns
///
/// The fitted parameters, or an error if they are non-finite or not
/// strictly positive.
pub fn fit_ab_params<T>(min_dist: T, spread: T) -> Result<CurveParams<T>>
where
    T: Float,
{
    let min_dist = min_dist
        .to_f64()
        .ok_or_else(|| UmapError::CurveFit("min_dist is not representable".to_string()))?;
    let spread = spread
        .to_f64()
        .ok_or_else(|| UmapError::CurveFit("spread is not representable".to_string()))?;

    if !(spread > 0.0 && spread.is_finite()) || !(min_dist >= 0.0 && min_dist.is_finite()) {
        return Err(UmapError::CurveFit(format!(
            "need finite spread > 0 and min_dist >= 0, got spread = {}, min_dist = {}",
            spread, min_dist
        )));
    }

    let (xs, ys) = target_samples(min_dist, spread);

    let mut a = 1.0_f64;
    let mut b = 1.0_f64;
    let mut lambda = 1e-3_f64;
    let mut cost = sum_sq_residuals(&xs, &ys, a, b);
    let mut n_steps = 0;

    'outer: for _ in 0..LM_MAX_ITER {
        let (jtj, jtr) = normal_equations(&xs, &ys, a, b);

        if jtr[0].abs().max(jtr[1].abs()) < LM_GRAD_TOL {
            break;
        }

        loop {
            let m_aa = jtj[0] + lambda * jtj[0].max(f64::EPSILON);
            let m_bb = jtj[2] + lambda * jtj[2].max(f64::EPSILON);
            let m_ab = jtj[1];
            let det = m_aa * m_bb - m_ab * m_ab;

            if det > 0.0 && det.is_finite() {
                let step_a = -(m_bb * jtr[0] - m_ab * jtr[1]) / det;
                let step_b = -(m_aa * jtr[1] - m_ab * jtr[0]) / det;

                let new_a = (a + step_a).max(0.0);
                let new_b = b + step_b;
                let new_cost = sum_sq_residuals(&xs, &ys, new_a, new_b);

                if new_cost.is_finite() && new_cost < cost {
                    let small_step = (new_a - a).abs() <= LM_STEP_TOL * (a.abs() + LM_STEP_TOL)
                        && (new_b - b).abs() <= LM_STEP_TOL * (b.abs() + LM_STEP_TOL);

                    a = new_a;
                    b = new_b;
                    cost = new_cost;
                    lambda = (lambda / 10.0).max(1e-12);
                    n_steps += 1;

                    if small_step {
                        break 'outer;
                    }
                    break;
                }
            }

            lambda *= 10.0;
            if lambda > LM_MAX_LAMBDA {
                break 'outer;
            }
        }
    }

    debug!(
        "Curve fit converged after {} steps: a = {:.4}, b = {:.4}, sse = {:.3e}",
        n_steps, a, b, cost
    );

    if !(a > 0.0 && b > 0.0 && a.is_finite() && b.is_finite()) {
        return Err(UmapError::CurveFit(format!(
            "fit produced invalid parameters a = {}, b = {}",
            a, b
        )));
    }

    match (T::from(a), T::from(b)) {
        (Some(a), Some(b)) => Ok(CurveParams { a, b }),
        _ => Err(UmapError::CurveFit(
            "fitted parameters are not representable".to_string(),
        )),
    }
}

///////////
// Tests //
///////////
