//! Sales risk: sales/transaction drops, ticket shrinkage, cancellations,
//! peer standing and delivery-channel jumps.
//!
//!   sales_risk = 0.35·drop + 0.15·aov + 0.20·cancel + 0.20·peer + 0.10·dlv·delivery_jump

use crate::{
    component::{term, RiskComponent},
    config::RollingConfig,
    series::MerchantSeries,
    stats::{clamp01, logistic, momentum, percent, relu_minus, robust_z},
};
use serde::{Deserialize, Serialize};

const W_DROP:     f64 = 0.35;
const W_AOV:      f64 = 0.15;
const W_CANCEL:   f64 = 0.20;
const W_PEER:     f64 = 0.20;
const W_DELIVERY: f64 = 0.10;

/// Term-level breakdown for one merchant-month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesRiskTerms {
    pub drop:          f64,
    pub aov_risk:      f64,
    pub cancel_risk:   f64,
    pub peer_risk:     f64,
    pub delivery_jump: f64,
    /// Delivery share of sales as a fraction; scales `delivery_jump`.
    pub delivery_share: f64,
    pub sales_risk:    f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SalesRisk;

impl SalesRisk {
    pub fn terms(&self, series: &MerchantSeries, rolling: &RollingConfig) -> Vec<SalesRiskTerms> {
        let sales  = series.column(|r| r.ranks.sales);
        let txn    = series.column(|r| r.ranks.txn_count);
        let ticket = series.column(|r| r.ranks.avg_ticket);
        let cancel = series.column(|r| r.ranks.cancel_rate);
        // Missing delivery share reads as no delivery channel at all.
        let dlv    = series.column(|r| Some(percent(r.record.delivery_share.unwrap_or(0.0))));

        let sales_mom  = momentum(&sales);
        let txn_mom    = momentum(&txn);
        let ticket_z   = robust_z(&ticket, rolling);
        let cancel_z   = robust_z(&cancel, rolling);
        let dlv_mom    = momentum(&dlv);
        let dlv_z      = robust_z(&dlv, rolling);

        series.rows.iter().enumerate().map(|(i, row)| {
            let drop = sales_mom[i].zip(txn_mom[i])
                .map(|(s, t)| (relu_minus(s) + relu_minus(t)) / 2.0);
            let aov_risk = ticket_z[i].map(relu_minus);
            let cancel_risk = cancel[i].zip(cancel_z[i])
                .map(|(rank, z)| rank.max(logistic(z)));
            let delivery_jump = dlv_mom[i].zip(dlv_z[i])
                .map(|(m, z)| relu_minus(-m) + relu_minus(-z));

            let peer_risk = clamp01(
                (peer_deficit(row.record.industry_peer_pct) + peer_deficit(row.record.zone_peer_pct)) / 2.0,
            );
            let delivery_share = dlv[i].unwrap_or(0.0);

            let t = SalesRiskTerms {
                drop:          term(drop),
                aov_risk:      term(aov_risk),
                cancel_risk:   term(cancel_risk),
                peer_risk,
                delivery_jump: term(delivery_jump),
                delivery_share,
                sales_risk:    0.0,
            };
            SalesRiskTerms {
                sales_risk: clamp01(
                    W_DROP * t.drop
                        + W_AOV * t.aov_risk
                        + W_CANCEL * t.cancel_risk
                        + W_PEER * t.peer_risk
                        + W_DELIVERY * t.delivery_share * t.delivery_jump,
                ),
                ..t
            }
        }).collect()
    }
}

/// 1 − percentile rank. A missing percentile contributes nothing.
fn peer_deficit(pct: Option<f64>) -> f64 {
    pct.map(|p| clamp01(1.0 - percent(p))).unwrap_or(0.0)
}

impl RiskComponent for SalesRisk {
    fn name(&self) -> &'static str { "Sales_Risk" }

    fn score_series(&self, series: &MerchantSeries, rolling: &RollingConfig) -> Vec<f64> {
        self.terms(series, rolling).into_iter().map(|t| t.sales_risk).collect()
    }
}
