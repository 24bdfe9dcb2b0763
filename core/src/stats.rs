//! Statistical primitives shared by every risk component.
//!
//! RULE: every series operator here takes ONE merchant's series, already in
//! chronological order. Callers partition by merchant first (see joiner.rs);
//! feeding a mixed series leaks history across merchants.
//!
//! Missing observations are `None`. An operator whose inputs are missing, or
//! whose window holds fewer than `min_periods` observations, yields `None`,
//! and the component formulas read `None` as a neutral 0.

use crate::config::RollingConfig;
use std::collections::VecDeque;

// ── Scalar operators ────────────────────────────────────────────────────────

/// Clamp to [0, 1]. NaN becomes 0.
pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// Magnitude of a negative movement: max(0, −x).
pub fn relu_minus(x: f64) -> f64 {
    (-x).max(0.0)
}

/// 1 / (1 + e^−x), stable in both tails.
pub fn logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Inverse of `logistic`, after clipping p into [eps, 1 − eps].
pub fn logit(p: f64, eps: f64) -> f64 {
    let p = if p.is_nan() { eps } else { p.clamp(eps, 1.0 - eps) };
    (p / (1.0 - p)).ln()
}

/// Percent (0..100) to a unit fraction, clamped.
pub fn percent(x: f64) -> f64 {
    clamp01(x / 100.0)
}

/// Herfindahl concentration of a share vector: Σ (s_i / (Σ s + eps))².
/// Negative or NaN shares count as 0.
pub fn herfindahl(shares: &[f64], eps: f64) -> f64 {
    let cleaned: Vec<f64> = shares.iter().map(|s| if s.is_nan() { 0.0 } else { s.max(0.0) }).collect();
    let total: f64 = cleaned.iter().sum();
    cleaned.iter().map(|s| {
        let n = s / (total + eps);
        n * n
    }).sum()
}

// ── Order statistics ────────────────────────────────────────────────────────

/// Median of the finite values, or None when there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Empirical quantile with linear interpolation between closest ranks.
/// Non-finite values are ignored; empty input gives None.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        None
    } else {
        Some(finite.iter().sum::<f64>() / finite.len() as f64)
    }
}

// ── Trailing window ─────────────────────────────────────────────────────────

/// Index-ordered buffer of the last `capacity` observations of one series,
/// the current observation included. Missing slots still occupy a position.
#[derive(Debug, Clone)]
pub struct TrailingWindow {
    capacity: usize,
    buf:      VecDeque<Option<f64>>,
}

impl TrailingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, buf: VecDeque::with_capacity(capacity) }
    }

    pub fn push(&mut self, value: Option<f64>) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(value.filter(|v| v.is_finite()));
    }

    fn observed(&self) -> Vec<f64> {
        self.buf.iter().flatten().copied().collect()
    }

    /// Median of the non-missing values, if at least `min_periods` exist.
    pub fn median(&self, min_periods: usize) -> Option<f64> {
        let values = self.observed();
        if values.len() < min_periods.max(1) {
            return None;
        }
        median(&values)
    }

    /// Mean of the non-missing values, if at least `min_periods` exist.
    pub fn mean(&self, min_periods: usize) -> Option<f64> {
        let values = self.observed();
        if values.len() < min_periods.max(1) {
            return None;
        }
        mean(&values)
    }
}

// ── Series operators ────────────────────────────────────────────────────────

/// Trailing rolling median over `window` positions.
pub fn rolling_median(xs: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    let mut w = TrailingWindow::new(window);
    xs.iter().map(|x| {
        w.push(*x);
        w.median(min_periods)
    }).collect()
}

/// Trailing rolling mean over `k` positions, defined from the first value.
pub fn rolling_mean(xs: &[f64], k: usize) -> Vec<f64> {
    let mut w = TrailingWindow::new(k);
    xs.iter().map(|x| {
        w.push(Some(*x));
        w.mean(1).unwrap_or(0.0)
    }).collect()
}

/// Robust z-score: (x − rolling median) / (scale·rolling MAD + eps).
///
/// The MAD is itself a rolling median of |x − rolling median| under the same
/// window rules, so it needs `min_periods` defined deviations first.
/// A constant window gives 0, never NaN or infinity.
pub fn robust_z(xs: &[Option<f64>], cfg: &RollingConfig) -> Vec<Option<f64>> {
    let med = rolling_median(xs, cfg.window, cfg.min_periods);
    let dev: Vec<Option<f64>> = xs.iter().zip(&med)
        .map(|(x, m)| x.zip(*m).map(|(x, m)| (x - m).abs()))
        .collect();
    let mad = rolling_median(&dev, cfg.window, cfg.min_periods);

    xs.iter().zip(med.iter().zip(&mad))
        .map(|(x, (m, d))| match (x, m, d) {
            (Some(x), Some(m), Some(d)) => Some((x - m) / (cfg.mad_scale * d + cfg.eps)),
            _ => None,
        })
        .collect()
}

/// Single-lag difference: x_t − x_{t−1}. The first observation has no lag.
pub fn momentum(xs: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(xs.len());
    let mut prev: Option<f64> = None;
    for (i, x) in xs.iter().enumerate() {
        let m = if i == 0 { None } else { x.zip(prev).map(|(x, p)| x - p) };
        out.push(m);
        prev = *x;
    }
    out
}
