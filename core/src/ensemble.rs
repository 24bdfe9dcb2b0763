//! Ensemble blender: weighted sum of external model probabilities.
//!
//! Weights are NOT renormalized when a model family is absent: a table
//! carrying only two families blends to at most their combined weight.
//! This bias toward 0 is documented behavior, kept until product decides
//! otherwise.

use crate::{
    config::EnsembleWeights,
    error::RiskResult,
    joiner::validate_key,
    panel::ExternalPrediction,
    stats::clamp01,
    types::RowKey,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Gradient-boosted trees, first implementation.
    Xgb,
    /// Gradient-boosted trees, second implementation.
    Lgbm,
    /// Random forest.
    Rf,
    /// Generic gradient boosting.
    Gb,
    /// Neural net.
    Dl,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 5] = [Self::Xgb, Self::Lgbm, Self::Rf, Self::Gb, Self::Dl];

    pub fn column(&self) -> &'static str {
        match self {
            Self::Xgb  => "pred_xgb",
            Self::Lgbm => "pred_lgbm",
            Self::Rf   => "pred_rf",
            Self::Gb   => "pred_gb",
            Self::Dl   => "pred_dl",
        }
    }

    pub fn weight(&self, w: &EnsembleWeights) -> f64 {
        match self {
            Self::Xgb  => w.xgb,
            Self::Lgbm => w.lgbm,
            Self::Rf   => w.rf,
            Self::Gb   => w.gb,
            Self::Dl   => w.dl,
        }
    }

    pub fn value(&self, p: &ExternalPrediction) -> Option<f64> {
        let v = match self {
            Self::Xgb  => p.pred_xgb,
            Self::Lgbm => p.pred_lgbm,
            Self::Rf   => p.pred_rf,
            Self::Gb   => p.pred_gb,
            Self::Dl   => p.pred_dl,
        };
        v.filter(|x| x.is_finite())
    }
}

/// External predictions indexed by row key.
#[derive(Debug, Clone, Default)]
pub struct PredictionTable {
    by_key: HashMap<RowKey, ExternalPrediction>,
}

impl PredictionTable {
    /// Index predictions by key. Duplicate keys keep the first row; a
    /// missing key is fatal like any other panel.
    pub fn from_records(records: &[ExternalPrediction]) -> RiskResult<Self> {
        let mut by_key = HashMap::with_capacity(records.len());
        for (row, p) in records.iter().enumerate() {
            let key = validate_key("predictions", row, &p.merchant_id, &p.year_month)?;
            by_key.entry(key).or_insert_with(|| p.clone());
        }
        Ok(Self { by_key })
    }

    pub fn len(&self) -> usize { self.by_key.len() }
    pub fn is_empty(&self) -> bool { self.by_key.is_empty() }

    pub fn get(&self, key: &RowKey) -> Option<&ExternalPrediction> {
        self.by_key.get(key)
    }

    /// Families with at least one value anywhere in the table.
    pub fn families_present(&self) -> Vec<ModelFamily> {
        ModelFamily::ALL
            .into_iter()
            .filter(|f| self.by_key.values().any(|p| f.value(p).is_some()))
            .collect()
    }

    /// p_model for one row; 0 when the row has no predictions.
    pub fn p_model(&self, key: &RowKey, weights: &EnsembleWeights) -> f64 {
        self.get(key).map(|p| blend(p, weights)).unwrap_or(0.0)
    }
}

/// Σ weight_i · prediction_i over the families present on this row.
/// Each prediction is clamped to [0, 1] first; missing ones add nothing.
pub fn blend(prediction: &ExternalPrediction, weights: &EnsembleWeights) -> f64 {
    let sum: f64 = ModelFamily::ALL
        .iter()
        .filter_map(|f| f.value(prediction).map(|v| f.weight(weights) * clamp01(v)))
        .sum();
    clamp01(sum)
}
