//! Alert assignment: probability series to GREEN / YELLOW / ORANGE / RED.
//!
//! Two first-class policies behind one trait; the run configuration picks one:
//!   - FixedThresholdPolicy: absolute thresholds with a persistence gate on RED.
//!   - QuantilePolicy: relative labeling against per-group empirical quantiles.
//!
//! Labels come back aligned with the input rows, whatever their order.

use crate::{
    config::{AlertConfig, AlertPolicyKind, FixedThresholds, Grouping, QuantileLevels},
    stats::{quantile, rolling_mean},
    types::{RowKey, YearMonth},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLabel {
    Green,
    Yellow,
    Orange,
    Red,
}

impl AlertLabel {
    pub const ALL: [AlertLabel; 4] = [Self::Green, Self::Yellow, Self::Orange, Self::Red];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green  => "GREEN",
            Self::Yellow => "YELLOW",
            Self::Orange => "ORANGE",
            Self::Red    => "RED",
        }
    }
}

impl fmt::Display for AlertLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row handed to a policy: the score plus the context policies group by.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertInput {
    pub key:      RowKey,
    pub industry: Option<String>,
    pub zone:     Option<String>,
    pub score:    f64,
}

/// The contract every labeling policy must fulfill.
pub trait AlertPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// One label per input row, same order as `rows`.
    fn assign(&self, rows: &[AlertInput]) -> Vec<AlertLabel>;
}

/// Build the policy named by the configuration.
pub fn policy_for(config: &AlertConfig) -> Box<dyn AlertPolicy> {
    match config.policy {
        AlertPolicyKind::Fixed    => Box::new(FixedThresholdPolicy::new(config.fixed)),
        AlertPolicyKind::Quantile => Box::new(QuantilePolicy::new(config.quantiles)),
    }
}

// ── Fixed thresholds with persistence ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedThresholdPolicy {
    pub thresholds: FixedThresholds,
}

impl FixedThresholdPolicy {
    pub fn new(thresholds: FixedThresholds) -> Self {
        Self { thresholds }
    }

    /// Label one merchant's chronologically ordered scores.
    ///
    /// RED needs the score at or above `red` AND the trailing mean over
    /// `persistence_k` periods at or above `red − delta`.
    pub fn label_series(&self, scores: &[f64]) -> Vec<AlertLabel> {
        let t = &self.thresholds;
        let means = rolling_mean(scores, t.persistence_k);
        scores.iter().zip(means).map(|(&p, mean)| {
            if p >= t.red && mean >= t.red - t.delta {
                AlertLabel::Red
            } else if p >= t.orange {
                AlertLabel::Orange
            } else if p >= t.yellow {
                AlertLabel::Yellow
            } else {
                AlertLabel::Green
            }
        }).collect()
    }
}

impl AlertPolicy for FixedThresholdPolicy {
    fn name(&self) -> &'static str { "fixed" }

    fn assign(&self, rows: &[AlertInput]) -> Vec<AlertLabel> {
        // Partition by merchant, chronological within merchant.
        let mut by_merchant: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            by_merchant.entry(row.key.merchant_id.as_str()).or_default().push(i);
        }

        let mut labels = vec![AlertLabel::Green; rows.len()];
        for idx in by_merchant.values_mut() {
            idx.sort_by_key(|&i| rows[i].key.year_month);
            let scores: Vec<f64> = idx.iter().map(|&i| rows[i].score).collect();
            for (&i, label) in idx.iter().zip(self.label_series(&scores)) {
                labels[i] = label;
            }
        }
        labels
    }
}

// ── Per-group quantiles ─────────────────────────────────────────────────────

/// Score cut-offs for one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileThresholds {
    pub yellow: f64,
    pub orange: f64,
    pub red:    f64,
}

impl QuantileThresholds {
    /// Empirical quantiles of `scores`; None for an empty group.
    pub fn from_scores(scores: &[f64], levels: &QuantileLevels) -> Option<Self> {
        Some(Self {
            yellow: quantile(scores, levels.q_yellow)?,
            orange: quantile(scores, levels.q_orange)?,
            red:    quantile(scores, levels.q_red)?,
        })
    }

    pub fn label(&self, score: f64) -> AlertLabel {
        if score >= self.red {
            AlertLabel::Red
        } else if score >= self.orange {
            AlertLabel::Orange
        } else if score >= self.yellow {
            AlertLabel::Yellow
        } else {
            AlertLabel::Green
        }
    }
}

type GroupKey = (Option<String>, Option<String>, Option<YearMonth>);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantilePolicy {
    pub levels: QuantileLevels,
}

impl QuantilePolicy {
    pub fn new(levels: QuantileLevels) -> Self {
        Self { levels }
    }

    /// Resolve `Auto` to the finest grouping every row can support.
    pub fn resolve_grouping(&self, rows: &[AlertInput]) -> Grouping {
        if self.levels.grouping != Grouping::Auto {
            return self.levels.grouping;
        }
        let has_industry = rows.iter().all(|r| r.industry.is_some());
        let has_zone = rows.iter().all(|r| r.zone.is_some());
        match (has_industry, has_zone) {
            (true, true)  => Grouping::IndustryZoneMonth,
            (true, false) => Grouping::IndustryMonth,
            (false, true) => Grouping::ZoneMonth,
            // Every row carries a month key.
            (false, false) => Grouping::Month,
        }
    }

    fn group_key(grouping: Grouping, row: &AlertInput) -> GroupKey {
        let month = Some(row.key.year_month);
        match grouping {
            Grouping::IndustryZoneMonth => (row.industry.clone(), row.zone.clone(), month),
            Grouping::IndustryMonth     => (row.industry.clone(), None, month),
            Grouping::ZoneMonth         => (None, row.zone.clone(), month),
            Grouping::Month             => (None, None, month),
            Grouping::None | Grouping::Auto => (None, None, None),
        }
    }
}

impl AlertPolicy for QuantilePolicy {
    fn name(&self) -> &'static str { "quantile" }

    fn assign(&self, rows: &[AlertInput]) -> Vec<AlertLabel> {
        let grouping = self.resolve_grouping(rows);

        let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            groups.entry(Self::group_key(grouping, row)).or_default().push(i);
        }
        log::debug!("alerting: quantile grouping {grouping:?} gave {} groups", groups.len());

        let mut labels = vec![AlertLabel::Green; rows.len()];
        for idx in groups.values() {
            let scores: Vec<f64> = idx.iter().map(|&i| rows[i].score).collect();
            let Some(t) = QuantileThresholds::from_scores(&scores, &self.levels) else {
                continue;
            };
            for &i in idx {
                labels[i] = t.label(rows[i].score);
            }
        }
        labels
    }
}
