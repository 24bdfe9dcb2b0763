//! Pipeline orchestrator: raw panels in, one labeled row per merchant-month out.
//!
//! Stage order is fixed:
//!   join → normalize bins → partition by merchant → three components →
//!   aggregate → (ensemble → calibrate → blend) → alert
//!
//! The blend stage only runs when predictions are supplied; without them
//! p_model is 0 and p_final equals RiskScore.

use crate::{
    aggregate::{aggregate, AggregateRisk},
    alerting::{policy_for, AlertInput, AlertLabel},
    calibration::Calibrator,
    component::{score_table, ComponentTable, RiskComponent},
    config::{AlertPolicyKind, RiskConfig, ScoreColumn},
    customer_risk::CustomerRisk,
    ensemble::{blend, PredictionTable},
    error::{RiskError, RiskResult},
    joiner::{join, validate_key},
    market_risk::MarketRisk,
    normalizer::normalize_bins,
    panel::{CalibrationLabel, CustomerRecord, ExternalPrediction, MerchantProfile, UsageRecord},
    sales_risk::SalesRisk,
    series::{partition_by_merchant, MerchantSeries},
    stats::clamp01,
    types::{MerchantId, RowKey, YearMonth},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One output row. Column names follow the published output schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    pub merchant_id: MerchantId,
    pub year_month:  YearMonth,
    #[serde(rename = "Sales_Risk")]
    pub sales_risk:    f64,
    #[serde(rename = "Customer_Risk")]
    pub customer_risk: f64,
    #[serde(rename = "Market_Risk")]
    pub market_risk:   f64,
    #[serde(rename = "RiskScore")]
    pub risk_score:    f64,
    pub p_model:       f64,
    pub p_final:       f64,
    #[serde(rename = "Alert")]
    pub alert:         AlertLabel,
}

impl OutputRow {
    pub fn key(&self) -> RowKey {
        RowKey::new(self.merchant_id.clone(), self.year_month)
    }
}

/// The scored table, sorted by (merchant id, year-month).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputTable {
    pub rows: Vec<OutputRow>,
}

impl OutputTable {
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    /// A merchant's latest row, or its row for `month` when given.
    pub fn latest_for(&self, merchant_id: &str, month: Option<YearMonth>) -> RiskResult<&OutputRow> {
        self.rows
            .iter()
            .filter(|r| r.merchant_id == merchant_id)
            .filter(|r| month.map_or(true, |m| r.year_month == m))
            .max_by_key(|r| r.year_month)
            .ok_or_else(|| RiskError::EmptyJoinResult {
                context: match month {
                    Some(m) => format!("no output row for merchant {merchant_id} in {m}"),
                    None    => format!("no output row for merchant {merchant_id}"),
                },
            })
    }

    /// Row count per label, every label present (zero counts included).
    pub fn alert_counts(&self) -> BTreeMap<AlertLabel, usize> {
        let mut counts: BTreeMap<AlertLabel, usize> =
            AlertLabel::ALL.into_iter().map(|l| (l, 0)).collect();
        for row in &self.rows {
            *counts.entry(row.alert).or_default() += 1;
        }
        counts
    }

    /// Distinct months present, ascending.
    pub fn months(&self) -> Vec<YearMonth> {
        let mut months: Vec<YearMonth> = self.rows.iter().map(|r| r.year_month).collect();
        months.sort();
        months.dedup();
        months
    }
}

/// The three component tables for a normalized, partitioned panel.
#[derive(Debug, Clone)]
pub struct ComponentScores {
    pub sales:    ComponentTable,
    pub customer: ComponentTable,
    pub market:   ComponentTable,
}

/// Scores that feed the alert stage, per row.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Blended {
    p_model: f64,
    p_final: f64,
}

/// Run the full pipeline once.
pub fn run(
    config:      &RiskConfig,
    profiles:    &[MerchantProfile],
    usage:       &[UsageRecord],
    customer:    &[CustomerRecord],
    predictions: Option<&[ExternalPrediction]>,
    labels:      Option<&[CalibrationLabel]>,
) -> RiskResult<OutputTable> {
    config.validate()?;

    let joined = join(profiles, usage, customer, config.sentinel)?;
    let ranked = normalize_bins(joined);

    // Group attributes for the quantile policy, captured before partitioning.
    let attrs: HashMap<RowKey, (Option<String>, Option<String>)> = ranked
        .iter()
        .map(|r| (r.record.key.clone(), (r.record.industry.clone(), r.record.zone.clone())))
        .collect();

    let series = partition_by_merchant(ranked);
    log::debug!("pipeline: partitioned into {} merchant series", series.len());

    let components = score_components(&series, config);
    let aggregated = aggregate(&components.sales, &components.customer, &components.market, &config.weights);

    let blended = match predictions {
        Some(preds) if !preds.is_empty() => blend_with_predictions(config, &aggregated, preds, labels)?,
        _ => {
            log::debug!("pipeline: no predictions supplied, p_final = RiskScore");
            aggregated
                .iter()
                .map(|a| Blended { p_model: 0.0, p_final: a.risk_score })
                .collect()
        }
    };

    let score_column = match config.alert.policy {
        AlertPolicyKind::Fixed    => ScoreColumn::PFinal,
        AlertPolicyKind::Quantile => config.alert.quantiles.score,
    };
    let inputs: Vec<AlertInput> = aggregated
        .iter()
        .zip(&blended)
        .map(|(a, b)| {
            let (industry, zone) = attrs.get(&a.key).cloned().unwrap_or_default();
            AlertInput {
                key: a.key.clone(),
                industry,
                zone,
                score: match score_column {
                    ScoreColumn::PFinal    => b.p_final,
                    ScoreColumn::RiskScore => a.risk_score,
                    ScoreColumn::PModel    => b.p_model,
                },
            }
        })
        .collect();

    let policy = policy_for(&config.alert);
    let alerts = policy.assign(&inputs);

    let mut rows: Vec<OutputRow> = aggregated
        .into_iter()
        .zip(blended)
        .zip(alerts)
        .map(|((a, b), alert)| OutputRow {
            merchant_id:   a.key.merchant_id,
            year_month:    a.key.year_month,
            sales_risk:    a.sales_risk,
            customer_risk: a.customer_risk,
            market_risk:   a.market_risk,
            risk_score:    a.risk_score,
            p_model:       clamp01(b.p_model),
            p_final:       clamp01(b.p_final),
            alert,
        })
        .collect();
    rows.sort_by(|a, b| (&a.merchant_id, a.year_month).cmp(&(&b.merchant_id, b.year_month)));

    let table = OutputTable { rows };
    let counts = table.alert_counts();
    log::info!(
        "pipeline: scored {} rows with {} policy (red={}, orange={}, yellow={}, green={})",
        table.len(),
        policy.name(),
        counts[&AlertLabel::Red],
        counts[&AlertLabel::Orange],
        counts[&AlertLabel::Yellow],
        counts[&AlertLabel::Green],
    );
    Ok(table)
}

/// Score all three components over the partitioned panel.
pub fn score_components(
    series: &[MerchantSeries],
    config: &RiskConfig,
) -> ComponentScores {
    let score = |c: &dyn RiskComponent| score_table(c, series, &config.rolling);
    ComponentScores {
        sales:    score(&SalesRisk),
        customer: score(&CustomerRisk),
        market:   score(&MarketRisk),
    }
}

fn blend_with_predictions(
    config:     &RiskConfig,
    aggregated: &[AggregateRisk],
    preds:      &[ExternalPrediction],
    labels:     Option<&[CalibrationLabel]>,
) -> RiskResult<Vec<Blended>> {
    let table = PredictionTable::from_records(preds)?;
    log::debug!(
        "pipeline: {} prediction rows, families present: {:?}",
        table.len(),
        table.families_present(),
    );

    // None marks a merchant-month with no prediction record.
    let p_model: Vec<Option<f64>> = aggregated
        .iter()
        .map(|a| table.get(&a.key).map(|p| blend(p, &config.ensemble)))
        .collect();

    let mut calibrator = Calibrator::new(config.calibration);
    if let Some(labels) = labels {
        let mut by_key: HashMap<RowKey, f64> = HashMap::with_capacity(labels.len());
        for (row, l) in labels.iter().enumerate() {
            let key = validate_key("labels", row, &l.merchant_id, &l.year_month)?;
            by_key.entry(key).or_insert(l.label);
        }
        let (xs, ys): (Vec<f64>, Vec<f64>) = aggregated
            .iter()
            .zip(&p_model)
            .filter_map(|(a, p)| Some(((*p)?, *by_key.get(&a.key)?)))
            .unzip();
        calibrator = calibrator.fit(&xs, &ys);
    }

    let lambda = config.blend_lambda;
    Ok(aggregated
        .iter()
        .zip(p_model)
        .map(|(a, p)| {
            let p_cal = p.map_or(0.0, |p| calibrator.transform(p));
            Blended {
                p_model: p.unwrap_or(0.0),
                p_final: clamp01(lambda * p_cal + (1.0 - lambda) * a.risk_score),
            }
        })
        .collect())
}
