use crate::error::{Result, SpecError};

/// Piecewise-linear interpolation of `(xp, fp)` at `x`, clamped to the end
/// values outside `xp`. `xp` must be increasing and non-empty. NaN maps to NaN.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let last = xp.len() - 1;
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }
    let i = xp.partition_point(|&v| v < x);
    let t = (x - xp[i - 1]) / (xp[i] - xp[i - 1]);
    fp[i - 1] + t * (fp[i] - fp[i - 1])
}

// ---------------------------------------------------------------------------
// Akima spline
// ---------------------------------------------------------------------------

/// Akima (1970) cubic spline. Local, so moving one knot only changes the
/// curve over the neighbouring intervals, and it does not overshoot the way
/// a natural cubic does next to steps.
///
/// Outside the knot range the curve continues linearly along the end slopes.
#[derive(Debug, Clone)]
pub struct AkimaSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Derivative at each knot.
    t: Vec<f64>,
}

impl AkimaSpline {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        SpecError::check_len("spline y", x.len(), y.len())?;
        if x.is_empty() {
            return Err(SpecError::invalid("spline needs at least one knot"));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(SpecError::invalid("spline knots must be finite"));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SpecError::invalid("spline knots must be strictly increasing"));
        }

        let n = x.len();
        let t = match n {
            1 => vec![0.0],
            2 => {
                let m = (y[1] - y[0]) / (x[1] - x[0]);
                vec![m, m]
            }
            _ => {
                // slopes padded with two extrapolated values at each end
                let mut m = vec![0.0; n + 3];
                for i in 0..n - 1 {
                    m[i + 2] = (y[i + 1] - y[i]) / (x[i + 1] - x[i]);
                }
                m[1] = 2.0 * m[2] - m[3];
                m[0] = 2.0 * m[1] - m[2];
                m[n + 1] = 2.0 * m[n] - m[n - 1];
                m[n + 2] = 2.0 * m[n + 1] - m[n];

                (0..n)
                    .map(|i| {
                        let w1 = (m[i + 3] - m[i + 2]).abs();
                        let w2 = (m[i + 1] - m[i]).abs();
                        if w1 + w2 > f64::EPSILON {
                            (w1 * m[i + 1] + w2 * m[i + 2]) / (w1 + w2)
                        } else {
                            0.5 * (m[i + 1] + m[i + 2])
                        }
                    })
                    .collect()
            }
        };
        Ok(Self { x, y, t })
    }

    pub fn eval(&self, xi: f64) -> f64 {
        if xi.is_nan() {
            return f64::NAN;
        }
        let n = self.x.len();
        if xi <= self.x[0] {
            return self.y[0] + self.t[0] * (xi - self.x[0]);
        }
        if xi >= self.x[n - 1] {
            return self.y[n - 1] + self.t[n - 1] * (xi - self.x[n - 1]);
        }
        let i = self.x.partition_point(|&v| v <= xi) - 1;
        let h = self.x[i + 1] - self.x[i];
        let m = (self.y[i + 1] - self.y[i]) / h;
        let (t0, t1) = (self.t[i], self.t[i + 1]);
        let c = (3.0 * m - 2.0 * t0 - t1) / h;
        let d = (t0 + t1 - 2.0 * m) / (h * h);
        let s = xi - self.x[i];
        self.y[i] + s * (t0 + s * (c + s * d))
    }

    pub fn eval_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }
}
