//! Market risk: closure environment, peer underperformance and business age.
//!
//!   market_risk = 0.50·closure_env + 0.35·underperformance + 0.15·age_risk
//!
//! Stateless per row; no rolling history involved. The age term is a tent
//! peaking at the median business age (rank 0.5), not a monotone reward for
//! longevity. Kept as is pending product confirmation.

use crate::{
    component::RiskComponent,
    config::RollingConfig,
    normalizer::RankedRecord,
    series::MerchantSeries,
    stats::{clamp01, percent},
};
use serde::{Deserialize, Serialize};

const W_CLOSURE:   f64 = 0.50;
const W_UNDERPERF: f64 = 0.35;
const W_AGE:       f64 = 0.15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketRiskTerms {
    pub closure_env:      f64,
    pub underperformance: f64,
    pub age_risk:         f64,
    pub market_risk:      f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarketRisk;

impl MarketRisk {
    pub fn row_terms(&self, row: &RankedRecord) -> MarketRiskTerms {
        let r = &row.record;

        // Missing closure rates read as no closures; missing percentiles
        // read as the 100th percentile. Missing never looks worse than typical.
        let closure_env = clamp01(
            (percent(r.industry_closure_pct.unwrap_or(0.0)) + percent(r.zone_closure_pct.unwrap_or(0.0))) / 2.0,
        );
        let underperformance = clamp01(
            ((1.0 - percent(r.industry_revenue_pct.unwrap_or(100.0)))
                + (1.0 - percent(r.industry_count_pct.unwrap_or(100.0))))
                / 2.0,
        );
        let age_risk = age_tent(row.ranks.business_age);

        MarketRiskTerms {
            closure_env,
            underperformance,
            age_risk,
            market_risk: clamp01(W_CLOSURE * closure_env + W_UNDERPERF * underperformance + W_AGE * age_risk),
        }
    }

    pub fn terms(&self, series: &MerchantSeries) -> Vec<MarketRiskTerms> {
        series.rows.iter().map(|row| self.row_terms(row)).collect()
    }
}

/// clamp01(4·min(a, 1 − a)); 0 when the age rank is missing.
pub fn age_tent(age_rank: Option<f64>) -> f64 {
    age_rank
        .filter(|a| a.is_finite())
        .map(|a| clamp01(4.0 * a.min(1.0 - a)))
        .unwrap_or(0.0)
}

impl RiskComponent for MarketRisk {
    fn name(&self) -> &'static str { "Market_Risk" }

    fn score_series(&self, series: &MerchantSeries, _rolling: &RollingConfig) -> Vec<f64> {
        self.terms(series).into_iter().map(|t| t.market_risk).collect()
    }
}
