//! Risk aggregator: weighted sum of the three component tables.

use crate::{
    component::ComponentTable,
    config::AggregateWeights,
    stats::clamp01,
    types::RowKey,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRisk {
    pub key:           RowKey,
    pub sales_risk:    f64,
    pub customer_risk: f64,
    pub market_risk:   f64,
    pub risk_score:    f64,
}

/// Left-join customer and market onto sales by row key, then weight.
/// A component missing for a row counts as 0.
pub fn aggregate(
    sales:    &ComponentTable,
    customer: &ComponentTable,
    market:   &ComponentTable,
    weights:  &AggregateWeights,
) -> Vec<AggregateRisk> {
    let customer_by_key: HashMap<&RowKey, f64> = customer.rows.iter().map(|(k, v)| (k, *v)).collect();
    let market_by_key:   HashMap<&RowKey, f64> = market.rows.iter().map(|(k, v)| (k, *v)).collect();

    let mut missing = 0usize;
    let out: Vec<AggregateRisk> = sales.rows.iter().map(|(key, s)| {
        let c = customer_by_key.get(key).copied();
        let m = market_by_key.get(key).copied();
        if c.is_none() || m.is_none() {
            missing += 1;
        }
        let (s, c, m) = (clamp01(*s), clamp01(c.unwrap_or(0.0)), clamp01(m.unwrap_or(0.0)));
        AggregateRisk {
            key:           key.clone(),
            sales_risk:    s,
            customer_risk: c,
            market_risk:   m,
            risk_score:    clamp01(weights.alpha * s + weights.beta * c + weights.gamma * m),
        }
    }).collect();

    if missing > 0 {
        log::warn!("aggregate: {missing} rows lacked a component score, defaulted to 0");
    }
    out
}
