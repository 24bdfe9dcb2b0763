//! Customer risk: customer-count drops, loyalty and acquisition erosion,
//! and sudden concentration of the customer base.
//!
//!   customer_risk = 0.40·cust_drop + 0.25·loyalty + 0.20·acquisition
//!                 + 0.10·mix_shift + 0.05·type_shift

use crate::{
    component::{term, RiskComponent},
    config::RollingConfig,
    series::MerchantSeries,
    stats::{clamp01, herfindahl, momentum, percent, relu_minus, robust_z},
};
use serde::{Deserialize, Serialize};

const W_CUST_DROP:   f64 = 0.40;
const W_LOYALTY:     f64 = 0.25;
const W_ACQUISITION: f64 = 0.20;
const W_MIX_SHIFT:   f64 = 0.10;
const W_TYPE_SHIFT:  f64 = 0.05;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRiskTerms {
    pub cust_drop:        f64,
    pub loyalty_risk:     f64,
    pub acquisition_risk: f64,
    pub mix_shift:        f64,
    pub type_shift:       f64,
    pub customer_risk:    f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerRisk;

impl CustomerRisk {
    pub fn terms(&self, series: &MerchantSeries, rolling: &RollingConfig) -> Vec<CustomerRiskTerms> {
        let customers = series.column(|r| r.ranks.customer_count);
        let repeat = series.column(|r| Some(percent(r.record.repeat_ratio.unwrap_or(0.0))));
        let new    = series.column(|r| Some(percent(r.record.new_ratio.unwrap_or(0.0))));

        let age_hhi = series.column(|r| Some(share_concentration(&r.record.age_gender_shares, rolling.eps)));
        let type_hhi = series.column(|r| Some(share_concentration(&r.record.visitor_type_shares, rolling.eps)));

        let cust_mom   = momentum(&customers);
        let cust_z     = robust_z(&customers, rolling);
        let repeat_mom = momentum(&repeat);
        let new_mom    = momentum(&new);
        let age_z      = robust_z(&age_hhi, rolling);
        let type_z     = robust_z(&type_hhi, rolling);

        (0..series.len()).map(|i| {
            let cust_drop = cust_mom[i].zip(cust_z[i])
                .map(|(m, z)| relu_minus(m) + relu_minus(z));

            let t = CustomerRiskTerms {
                cust_drop:        term(cust_drop),
                loyalty_risk:     term(repeat_mom[i].map(relu_minus)),
                acquisition_risk: term(new_mom[i].map(relu_minus)),
                // Only a rise in concentration is risk.
                mix_shift:        term(age_z[i].map(|z| z.max(0.0))),
                type_shift:       term(type_z[i].map(|z| z.max(0.0))),
                customer_risk:    0.0,
            };
            CustomerRiskTerms {
                customer_risk: clamp01(
                    W_CUST_DROP * t.cust_drop
                        + W_LOYALTY * t.loyalty_risk
                        + W_ACQUISITION * t.acquisition_risk
                        + W_MIX_SHIFT * t.mix_shift
                        + W_TYPE_SHIFT * t.type_shift,
                ),
                ..t
            }
        }).collect()
    }
}

/// Herfindahl index over percent shares; missing shares count as 0.
fn share_concentration(shares: &[Option<f64>], eps: f64) -> f64 {
    let fractions: Vec<f64> = shares.iter().map(|s| percent(s.unwrap_or(0.0))).collect();
    herfindahl(&fractions, eps)
}

impl RiskComponent for CustomerRisk {
    fn name(&self) -> &'static str { "Customer_Risk" }

    fn score_series(&self, series: &MerchantSeries, rolling: &RollingConfig) -> Vec<f64> {
        self.terms(series, rolling).into_iter().map(|t| t.customer_risk).collect()
    }
}
