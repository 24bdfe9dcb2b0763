//! Human-readable drivers and follow-up actions for one scored row.

use crate::{alerting::AlertLabel, pipeline::OutputRow};
use serde::{Deserialize, Serialize};

/// Component levels above which a driver is reported.
pub const SALES_DRIVER_THRESHOLD:    f64 = 0.05;
pub const CUSTOMER_DRIVER_THRESHOLD: f64 = 0.05;
pub const MARKET_DRIVER_THRESHOLD:   f64 = 0.55;

/// At most this many recommendations are returned.
pub const MAX_RECOMMENDATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    SalesSlowdown,
    CustomerDecline,
    MarketPressure,
}

impl Driver {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::SalesSlowdown   => "sales momentum slowing against the recent 1-3 month trend",
            Self::CustomerDecline => "customer count declining",
            Self::MarketPressure  => "local market and industry risk above typical",
        }
    }

    fn actions(&self) -> [&'static str; 2] {
        match self {
            Self::SalesSlowdown => [
                "Revenue: consider a promotion or a new menu launch",
                "Pricing: review competitor prices and set a differentiated price policy",
            ],
            Self::CustomerDecline => [
                "Retention: run a reward program for repeat customers",
                "Reviews: respond quickly to negative reviews and act on them",
            ],
            Self::MarketPressure => [
                "Differentiation: emphasize strengths competitors lack",
                "Channels: build an own ordering channel beyond delivery apps",
            ],
        }
    }
}

pub const NO_SIGNAL: &str = "no significant risk signal";
pub const URGENT_ACTION: &str = "Urgent: review the cost structure and seek expert advice";
pub const KEEP_MONITORING: &str = "No significant risk signal right now; keep monitoring";

/// Drivers active on this row, in fixed order.
pub fn drivers(row: &OutputRow) -> Vec<Driver> {
    let mut out = Vec::with_capacity(3);
    if row.sales_risk > SALES_DRIVER_THRESHOLD {
        out.push(Driver::SalesSlowdown);
    }
    if row.customer_risk > CUSTOMER_DRIVER_THRESHOLD {
        out.push(Driver::CustomerDecline);
    }
    if row.market_risk > MARKET_DRIVER_THRESHOLD {
        out.push(Driver::MarketPressure);
    }
    out
}

/// Driver descriptions, or a single "no signal" line.
pub fn explain(row: &OutputRow) -> Vec<String> {
    let found = drivers(row);
    if found.is_empty() {
        return vec![NO_SIGNAL.to_string()];
    }
    found.iter().map(|d| d.describe().to_string()).collect()
}

/// Actions for each driver, plus an urgent one on RED. Never more than five.
pub fn recommend(row: &OutputRow) -> Vec<String> {
    let mut out: Vec<String> = drivers(row)
        .iter()
        .flat_map(|d| d.actions())
        .map(str::to_string)
        .collect();
    if row.alert == AlertLabel::Red {
        out.push(URGENT_ACTION.to_string());
    }
    out.truncate(MAX_RECOMMENDATIONS);
    if out.is_empty() {
        out.push(KEEP_MONITORING.to_string());
    }
    out
}
