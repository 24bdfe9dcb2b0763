//! Per-merchant series: the partition every rolling operator runs on.

use crate::{normalizer::RankedRecord, types::{MerchantId, RowKey}};

/// One merchant's rows, in chronological order.
#[derive(Debug, Clone)]
pub struct MerchantSeries {
    pub merchant_id: MerchantId,
    pub rows:        Vec<RankedRecord>,
}

impl MerchantSeries {
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn keys(&self) -> impl Iterator<Item = &RowKey> + '_ {
        self.rows.iter().map(|r| &r.record.key)
    }

    /// Pull one column out of the series, preserving missing slots.
    pub fn column<F>(&self, f: F) -> Vec<Option<f64>>
    where
        F: Fn(&RankedRecord) -> Option<f64>,
    {
        self.rows.iter().map(f).collect()
    }

    /// Pull one column with missing values replaced by `default`.
    pub fn column_or<F>(&self, default: f64, f: F) -> Vec<f64>
    where
        F: Fn(&RankedRecord) -> Option<f64>,
    {
        self.rows.iter().map(|r| f(r).unwrap_or(default)).collect()
    }
}

/// Split a table into per-merchant series sorted by month.
///
/// Input order does not matter; output is ordered by merchant id.
pub fn partition_by_merchant(rows: Vec<RankedRecord>) -> Vec<MerchantSeries> {
    let mut rows = rows;
    rows.sort_by(|a, b| a.record.key.cmp(&b.record.key));

    let mut out: Vec<MerchantSeries> = Vec::new();
    for row in rows {
        match out.last_mut() {
            Some(series) if series.merchant_id == row.record.key.merchant_id => series.rows.push(row),
            _ => out.push(MerchantSeries {
                merchant_id: row.record.key.merchant_id.clone(),
                rows:        vec![row],
            }),
        }
    }
    out
}
