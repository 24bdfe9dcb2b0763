//! RiskComponent trait and the per-merchant-month score table.
//!
//! RULE: every component scores ONE merchant series at a time and returns
//! exactly one value in [0, 1] per row, in series order. The aggregator
//! joins component tables on (merchant id, year-month); it never relies on
//! row position across components.

use crate::{
    config::RollingConfig,
    series::MerchantSeries,
    stats::clamp01,
    types::RowKey,
};

/// The contract every risk component must fulfill.
pub trait RiskComponent: Send + Sync {
    /// Stable output column name, e.g. "Sales_Risk".
    fn name(&self) -> &'static str;

    /// One bounded score per row of `series`, same order.
    fn score_series(&self, series: &MerchantSeries, rolling: &RollingConfig) -> Vec<f64>;
}

/// Scores of one component, keyed by row.
#[derive(Debug, Clone)]
pub struct ComponentTable {
    pub name: &'static str,
    pub rows: Vec<(RowKey, f64)>,
}

/// Run a component over every merchant series.
pub fn score_table(
    component: &dyn RiskComponent,
    series: &[MerchantSeries],
    rolling: &RollingConfig,
) -> ComponentTable {
    let mut rows = Vec::with_capacity(series.iter().map(MerchantSeries::len).sum());
    for s in series {
        let scores = component.score_series(s, rolling);
        debug_assert_eq!(scores.len(), s.len(), "{} returned a misaligned series", component.name());
        rows.extend(s.keys().cloned().zip(scores.into_iter().map(clamp01)));
    }
    log::debug!("component: {} scored {} rows", component.name(), rows.len());
    ComponentTable { name: component.name(), rows }
}

/// A formula term: undefined resolves to the neutral 0, defined is clamped.
pub fn term(x: Option<f64>) -> f64 {
    x.map(clamp01).unwrap_or(0.0)
}
