//! Metric benchmarks: distribution summary of one output column.

use crate::{
    error::{RiskError, RiskResult},
    pipeline::{OutputRow, OutputTable},
    stats::{mean, median, quantile},
    types::YearMonth,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "Sales_Risk")]
    SalesRisk,
    #[serde(rename = "Customer_Risk")]
    CustomerRisk,
    #[serde(rename = "Market_Risk")]
    MarketRisk,
    #[serde(rename = "RiskScore")]
    RiskScore,
    #[serde(rename = "p_model")]
    PModel,
    #[serde(rename = "p_final")]
    PFinal,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Self::SalesRisk, Self::CustomerRisk, Self::MarketRisk,
        Self::RiskScore, Self::PModel, Self::PFinal,
    ];

    /// Output column name.
    pub fn column(&self) -> &'static str {
        match self {
            Self::SalesRisk    => "Sales_Risk",
            Self::CustomerRisk => "Customer_Risk",
            Self::MarketRisk   => "Market_Risk",
            Self::RiskScore    => "RiskScore",
            Self::PModel       => "p_model",
            Self::PFinal       => "p_final",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.column() == name)
    }

    pub fn value(&self, row: &OutputRow) -> f64 {
        match self {
            Self::SalesRisk    => row.sales_risk,
            Self::CustomerRisk => row.customer_risk,
            Self::MarketRisk   => row.market_risk,
            Self::RiskScore    => row.risk_score,
            Self::PModel       => row.p_model,
            Self::PFinal       => row.p_final,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub metric:      Metric,
    pub mean:        f64,
    pub median:      f64,
    pub p25:         f64,
    pub p75:         f64,
    pub sample_size: usize,
}

/// Summarize `metric` over the table, optionally restricted to one month.
pub fn benchmark(table: &OutputTable, metric: Metric, month: Option<YearMonth>) -> RiskResult<BenchmarkSummary> {
    let values: Vec<f64> = table
        .rows
        .iter()
        .filter(|r| month.map_or(true, |m| r.year_month == m))
        .map(|r| metric.value(r))
        .filter(|v| v.is_finite())
        .collect();

    let empty = || RiskError::EmptyJoinResult {
        context: match month {
            Some(m) => format!("no {metric} values for {m}"),
            None    => format!("no {metric} values"),
        },
    };

    Ok(BenchmarkSummary {
        metric,
        mean:        mean(&values).ok_or_else(empty)?,
        median:      median(&values).ok_or_else(empty)?,
        p25:         quantile(&values, 0.25).ok_or_else(empty)?,
        p75:         quantile(&values, 0.75).ok_or_else(empty)?,
        sample_size: values.len(),
    })
}
