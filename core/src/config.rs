use crate::error::{RiskError, RiskResult};
use serde::{Deserialize, Serialize};

// ── Aggregation ─────────────────────────────────────────────────────

/// RiskScore = alpha·Sales + beta·Customer + gamma·Market.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregateWeights {
    pub alpha: f64,
    pub beta:  f64,
    pub gamma: f64,
}

impl Default for AggregateWeights {
    fn default() -> Self {
        Self { alpha: 0.4, beta: 0.3, gamma: 0.3 }
    }
}

// ── Rolling statistics ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RollingConfig {
    pub window:      usize,
    pub min_periods: usize,
    pub eps:         f64,
    /// Consistency constant turning a MAD into a normal-equivalent sigma.
    pub mad_scale:   f64,
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self { window: 12, min_periods: 6, eps: 1e-6, mad_scale: 1.4826 }
    }
}

// ── Ensemble ────────────────────────────────────────────────────────

/// Per-family weights. Not renormalized when a family is absent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnsembleWeights {
    pub xgb:  f64,
    pub lgbm: f64,
    pub rf:   f64,
    pub gb:   f64,
    pub dl:   f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self { xgb: 0.25, lgbm: 0.25, rf: 0.25, gb: 0.15, dl: 0.10 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMethod {
    #[default]
    Platt,
    None,
}

// ── Alerting ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertPolicyKind {
    #[default]
    Fixed,
    Quantile,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FixedThresholds {
    pub yellow:        f64,
    pub orange:        f64,
    pub red:           f64,
    pub delta:         f64,
    pub persistence_k: usize,
}

impl Default for FixedThresholds {
    fn default() -> Self {
        Self { yellow: 0.60, orange: 0.70, red: 0.80, delta: 0.05, persistence_k: 3 }
    }
}

/// Which attributes partition rows before quantile labeling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// First of industry+zone+month, industry+month, zone+month, month, none
    /// whose attributes are present on every row.
    #[default]
    Auto,
    IndustryZoneMonth,
    IndustryMonth,
    ZoneMonth,
    Month,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreColumn {
    #[default]
    PFinal,
    RiskScore,
    PModel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuantileLevels {
    pub q_yellow: f64,
    pub q_orange: f64,
    pub q_red:    f64,
    pub grouping: Grouping,
    pub score:    ScoreColumn,
}

impl Default for QuantileLevels {
    fn default() -> Self {
        Self {
            q_yellow: 0.80,
            q_orange: 0.90,
            q_red:    0.97,
            grouping: Grouping::Auto,
            score:    ScoreColumn::PFinal,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AlertConfig {
    pub policy:    AlertPolicyKind,
    pub fixed:     FixedThresholds,
    pub quantiles: QuantileLevels,
}

// ── Top level ───────────────────────────────────────────────────────

/// Everything one pipeline run needs. Immutable once built; pass it in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskConfig {
    pub weights:      AggregateWeights,
    pub rolling:      RollingConfig,
    pub ensemble:     EnsembleWeights,
    pub calibration:  CalibrationMethod,
    /// p_final = lambda·p_model_cal + (1 − lambda)·RiskScore.
    pub blend_lambda: f64,
    /// Panel values at or below this mark a suppressed source value.
    pub sentinel:     f64,
    pub alert:        AlertConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights:      AggregateWeights::default(),
            rolling:      RollingConfig::default(),
            ensemble:     EnsembleWeights::default(),
            calibration:  CalibrationMethod::Platt,
            blend_lambda: 0.6,
            sentinel:     -9e5,
            alert:        AlertConfig::default(),
        }
    }
}

const WEIGHT_TOLERANCE: f64 = 1e-9;

impl RiskConfig {
    /// Load from a JSON file. Missing sections fall back to defaults.
    /// In tests, use RiskConfig::default().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: RiskConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Same config with a different alert policy.
    pub fn with_policy(mut self, policy: AlertPolicyKind) -> Self {
        self.alert.policy = policy;
        self
    }

    pub fn validate(&self) -> RiskResult<()> {
        let w = &self.weights;
        for (name, v) in [("alpha", w.alpha), ("beta", w.beta), ("gamma", w.gamma)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(invalid(format!("weight {name}={v} outside [0,1]")));
            }
        }
        let sum = w.alpha + w.beta + w.gamma;
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(invalid(format!("aggregation weights sum to {sum}, expected 1")));
        }

        let r = &self.rolling;
        if r.window == 0 || r.min_periods == 0 || r.min_periods > r.window {
            return Err(invalid(format!(
                "rolling window={} min_periods={} (need 0 < min_periods <= window)",
                r.window, r.min_periods
            )));
        }
        if r.eps <= 0.0 {
            return Err(invalid(format!("rolling eps={} must be positive", r.eps)));
        }

        let e = &self.ensemble;
        if [e.xgb, e.lgbm, e.rf, e.gb, e.dl].iter().any(|v| *v < 0.0) {
            return Err(invalid("ensemble weights must be non-negative".into()));
        }

        if !(0.0..=1.0).contains(&self.blend_lambda) {
            return Err(invalid(format!("blend_lambda={} outside [0,1]", self.blend_lambda)));
        }

        let t = &self.alert.fixed;
        if !(t.yellow <= t.orange && t.orange <= t.red) {
            return Err(invalid(format!(
                "fixed thresholds out of order: yellow={} orange={} red={}",
                t.yellow, t.orange, t.red
            )));
        }
        if t.persistence_k == 0 {
            return Err(invalid("persistence_k must be at least 1".into()));
        }

        let q = &self.alert.quantiles;
        if !(0.0 <= q.q_yellow && q.q_yellow <= q.q_orange && q.q_orange <= q.q_red && q.q_red <= 1.0) {
            return Err(invalid(format!(
                "quantile levels out of order: {} / {} / {}",
                q.q_yellow, q.q_orange, q.q_red
            )));
        }

        Ok(())
    }
}

fn invalid(reason: String) -> RiskError {
    RiskError::InvalidConfig { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RiskConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: RiskConfig = serde_json::from_str(
            r#"{ "alert": { "policy": "quantile", "fixed": { "red": 0.9 } } }"#,
        ).unwrap();

        assert_eq!(cfg.alert.policy, AlertPolicyKind::Quantile);
        assert_eq!(cfg.alert.fixed.red, 0.9);
        assert_eq!(cfg.alert.fixed.orange, 0.70);
        assert_eq!(cfg.weights, AggregateWeights::default());
        assert_eq!(cfg.blend_lambda, 0.6);
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut cfg = RiskConfig::default();
        cfg.weights.gamma = 0.4;
        assert!(matches!(cfg.validate(), Err(RiskError::InvalidConfig { .. })));
    }

    #[test]
    fn min_periods_cannot_exceed_window() {
        let mut cfg = RiskConfig::default();
        cfg.rolling.min_periods = 13;
        assert!(cfg.validate().is_err());
    }
}
