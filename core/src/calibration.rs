//! Probability calibration: Platt scaling over the ensemble output.
//!
//!   p_cal = logistic(a · logit(p) + b)
//!
//! (a, b) come from ordinary least squares of the labels on [1, logit(p)],
//! with p clipped to [eps, 1 − eps] so logit stays finite. Without a fit the
//! calibrator is the identity through clamp; that is not an error.

use crate::{
    config::CalibrationMethod,
    stats::{clamp01, logistic, logit},
};
use serde::{Deserialize, Serialize};

/// Clip applied before logit.
pub const LOGIT_EPS: f64 = 1e-6;

/// Maps raw scores to probabilities in [0, 1], monotonic non-decreasing.
pub trait ScoreCalibrator {
    fn calibrate(&self, p: f64) -> f64;

    fn calibrate_batch(&self, ps: &[f64]) -> Vec<f64> {
        ps.iter().map(|p| self.calibrate(*p)).collect()
    }

    fn name(&self) -> &'static str;
}

// ── Identity ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl ScoreCalibrator for Identity {
    fn calibrate(&self, p: f64) -> f64 { clamp01(p) }
    fn name(&self) -> &'static str { "identity" }
}

// ── Platt scaling ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaler {
    pub a: f64,
    pub b: f64,
}

impl Default for PlattScaler {
    fn default() -> Self { Self { a: 1.0, b: 0.0 } }
}

impl PlattScaler {
    /// Least-squares fit. Returns None when there is nothing to fit on.
    ///
    /// No spread in logit(p) gives a = 0, b = mean(label). A negative slope
    /// is floored at 0 so the transform never inverts the ranking.
    ///
    /// With a = 0 every input maps to the constant logistic(mean(label)).
    /// For 0/1 labels that constant is at least 0.5, so a degenerate or
    /// floored fit flattens p_model to a value no lower than one half.
    pub fn fit(p: &[f64], y: &[f64]) -> Option<Self> {
        let pairs: Vec<(f64, f64)> = p.iter().zip(y)
            .filter(|(p, y)| p.is_finite() && y.is_finite())
            .map(|(p, y)| (logit(*p, LOGIT_EPS), *y))
            .collect();
        if pairs.is_empty() {
            return None;
        }

        let n = pairs.len() as f64;
        let sx:  f64 = pairs.iter().map(|(x, _)| x).sum();
        let sy:  f64 = pairs.iter().map(|(_, y)| y).sum();
        let sxx: f64 = pairs.iter().map(|(x, _)| x * x).sum();
        let sxy: f64 = pairs.iter().map(|(x, y)| x * y).sum();
        let mean_y = sy / n;

        let denom = n * sxx - sx * sx;
        if denom.abs() <= 1e-12 * n * n {
            log::debug!("calibration: no spread in logit(p), fitting intercept only");
            return Some(Self { a: 0.0, b: mean_y });
        }

        let a = (n * sxy - sx * sy) / denom;
        if a < 0.0 {
            log::warn!("calibration: fitted slope {a:.4} < 0, flooring at 0");
            return Some(Self { a: 0.0, b: mean_y });
        }
        let b = (sy - a * sx) / n;
        Some(Self { a, b })
    }
}

impl ScoreCalibrator for PlattScaler {
    fn calibrate(&self, p: f64) -> f64 {
        if p.is_nan() {
            return 0.0;
        }
        clamp01(logistic(self.a * logit(p, LOGIT_EPS) + self.b))
    }

    fn name(&self) -> &'static str { "platt" }
}

// ── Calibrator ──────────────────────────────────────────────────────────────

/// The configured calibration step, fitted or not.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibrator {
    method: CalibrationMethod,
    scaler: Option<PlattScaler>,
}

impl Calibrator {
    pub fn new(method: CalibrationMethod) -> Self {
        Self { method, scaler: None }
    }

    /// Fit on (p_model, label) pairs. A method of `None` ignores the data.
    pub fn fit(mut self, p: &[f64], y: &[f64]) -> Self {
        if self.method == CalibrationMethod::Platt {
            self.scaler = PlattScaler::fit(p, y);
            if let Some(s) = &self.scaler {
                log::info!("calibration: platt fitted on {} rows (a={:.4}, b={:.4})", p.len(), s.a, s.b);
            }
        }
        self
    }

    pub fn is_fitted(&self) -> bool { self.scaler.is_some() }

    pub fn scaler(&self) -> Option<&PlattScaler> { self.scaler.as_ref() }

    pub fn transform(&self, p: f64) -> f64 {
        match &self.scaler {
            Some(s) => s.calibrate(p),
            None    => Identity.calibrate(p),
        }
    }
}

impl ScoreCalibrator for Calibrator {
    fn calibrate(&self, p: f64) -> f64 { self.transform(p) }

    fn name(&self) -> &'static str {
        match &self.scaler {
            Some(s) => s.name(),
            None    => Identity.name(),
        }
    }
}
