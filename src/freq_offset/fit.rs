// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Non-linear least squares with the Levenberg-Marquardt algorithm.

use log::trace;
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("Cannot fit {params} parameters to {points} data points")]
    TooFewPoints { points: usize, params: usize },

    #[error("Fit did not converge after {0} iterations")]
    NotConverged(usize),

    #[error("Fit produced a non-finite residual")]
    NonFinite,

    #[error("No step away from the initial guess reduces the residuals")]
    Stalled,
}

/// Fits a model `f(x, p)` to data. The Jacobian is estimated with forward
/// differences.
#[derive(Debug, Clone, Copy)]
pub struct LevenbergMarquardt {
    pub max_iterations: usize,
    /// Relative reduction of the sum of squares below which the fit has
    /// converged.
    pub ftol: f64,
    /// Relative parameter change below which the fit has converged.
    pub xtol: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
        }
    }
}

const MAX_DAMPING: f64 = 1e16;

impl LevenbergMarquardt {
    pub fn fit<F>(&self, model: F, x: &[f64], y: &[f64], p0: &[f64]) -> Result<Vec<f64>, FitError>
    where
        F: Fn(f64, &[f64]) -> f64,
    {
        let n = x.len().min(y.len());
        let m = p0.len();
        if n < m {
            return Err(FitError::TooFewPoints {
                points: n,
                params: m,
            });
        }

        let residuals = |p: &[f64]| -> DVector<f64> {
            DVector::from_iterator(n, x.iter().zip(y).map(|(&xi, &yi)| yi - model(xi, p)))
        };

        let mut p = p0.to_vec();
        let mut r = residuals(&p);
        let mut cost = r.norm_squared();
        if !cost.is_finite() {
            return Err(FitError::NonFinite);
        }
        let mut damping = 1e-3;
        // Has any step been taken?
        let mut moved = false;

        for iteration in 0..self.max_iterations {
            if cost == 0.0 {
                return Ok(p);
            }

            let jacobian = self.jacobian(&model, x, &p, n);
            let jt = jacobian.transpose();
            let jtj = &jt * &jacobian;
            let gradient = &jt * &r;

            // Increase the damping until a step reduces the sum of squares.
            loop {
                let mut a = jtj.clone();
                for i in 0..m {
                    a[(i, i)] += damping * jtj[(i, i)].max(1e-12);
                }
                let step = a.lu().solve(&gradient);
                let step = match step {
                    Some(s) if s.iter().all(|v| v.is_finite()) => s,
                    _ => {
                        damping *= 10.0;
                        if damping > MAX_DAMPING {
                            return stalled(p, moved);
                        }
                        continue;
                    }
                };

                let candidate: Vec<f64> = p.iter().zip(step.iter()).map(|(a, b)| a + b).collect();
                let new_r = residuals(&candidate);
                let new_cost = new_r.norm_squared();
                if new_cost.is_finite() && new_cost < cost {
                    let reduction = cost - new_cost;
                    let p_norm = DVector::from_column_slice(&p).norm();
                    let converged = reduction <= self.ftol * new_cost
                        || step.norm() <= self.xtol * (p_norm + self.xtol);
                    p = candidate;
                    r = new_r;
                    cost = new_cost;
                    moved = true;
                    damping = (damping / 10.0).max(1e-12);
                    if converged {
                        trace!("Fit converged after {} iterations", iteration + 1);
                        return Ok(p);
                    }
                    break;
                }

                damping *= 10.0;
                if damping > MAX_DAMPING {
                    return stalled(p, moved);
                }
            }
        }

        Err(FitError::NotConverged(self.max_iterations))
    }

    fn jacobian<F>(&self, model: &F, x: &[f64], p: &[f64], n: usize) -> DMatrix<f64>
    where
        F: Fn(f64, &[f64]) -> f64,
    {
        let m = p.len();
        let mut jacobian = DMatrix::zeros(n, m);
        let mut shifted = p.to_vec();
        for j in 0..m {
            let h = f64::EPSILON.sqrt() * p[j].abs().max(1.0);
            shifted[j] = p[j] + h;
            for (i, &xi) in x.iter().take(n).enumerate() {
                jacobian[(i, j)] = (model(xi, &shifted) - model(xi, p)) / h;
            }
            shifted[j] = p[j];
        }
        jacobian
    }
}

/// No step reduces the sum of squares any further. That is a minimum, unless
/// the parameters never left the initial guess.
fn stalled(p: Vec<f64>, moved: bool) -> Result<Vec<f64>, FitError> {
    if moved {
        Ok(p)
    } else {
        trace!("Fit stalled at the initial guess");
        Err(FitError::Stalled)
    }
}
