//! Seeded synthetic panels for fixtures, demos and determinism checks.
//!
//! Each merchant carries a latent health level in (0, 1). Healthy merchants
//! wander around their starting level; declining merchants lose health
//! steadily from an onset month. Bin labels, peer percentiles, customer
//! ratios and model predictions are all drawn around that level, so a
//! declining merchant shows up in every panel at once.

use crate::{
    panel::{
        CalibrationLabel, CustomerRecord, ExternalPrediction, MerchantProfile, UsageRecord,
        AGE_GENDER_SHARES, VISITOR_TYPE_SHARES,
    },
    rng::{PanelRng, PanelSlot, RngBank},
    types::YearMonth,
};

/// Written into numeric fields to mimic suppressed source values.
pub const SENTINEL_VALUE: f64 = -999_999.9;

const INDUSTRIES: &[&str] = &["Korean food", "Cafe", "Bakery", "Chicken", "Pub", "Convenience"];
const ZONES: &[&str] = &["Seongsu", "Wangsimni", "Majang", "Oksu"];

/// Bin labels in the source spelling, lowest rank first, with upper bounds.
const BIN_LABELS: &[(f64, &str)] = &[
    (0.10, "1_10%이하"),
    (0.25, "2_10-25%"),
    (0.50, "3_25-50%"),
    (0.75, "4_50-75%"),
    (0.90, "5_75-90%"),
    (1.01, "6_90%초과"),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthOptions {
    pub merchants:        usize,
    pub months:           usize,
    pub start:            YearMonth,
    /// Share of merchants that decline over the panel.
    pub decline_fraction: f64,
    /// Chance that any one numeric usage value is suppressed.
    pub sentinel_rate:    f64,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            merchants:        50,
            months:           18,
            start:            YearMonth::new(2023, 1).expect("2023-01 is a valid month"),
            decline_fraction: 0.2,
            sentinel_rate:    0.02,
        }
    }
}

/// Every table the pipeline accepts, generated together.
#[derive(Debug, Clone, Default)]
pub struct SyntheticPanels {
    pub profiles:    Vec<MerchantProfile>,
    pub usage:       Vec<UsageRecord>,
    pub customer:    Vec<CustomerRecord>,
    pub predictions: Vec<ExternalPrediction>,
    /// One label per merchant on its last month: 1 for decliners.
    pub labels:      Vec<CalibrationLabel>,
    /// Merchant ids generated as decliners, ascending.
    pub declining:   Vec<String>,
}

/// Generate with default options for the given size.
pub fn generate(seed: u64, merchants: usize, months: usize) -> SyntheticPanels {
    generate_with(seed, &SynthOptions { merchants, months, ..SynthOptions::default() })
}

pub fn generate_with(seed: u64, opts: &SynthOptions) -> SyntheticPanels {
    let bank = RngBank::new(seed);
    let mut profile_rng = bank.for_panel(PanelSlot::Profile);
    let mut usage_rng = bank.for_panel(PanelSlot::Usage);
    let mut customer_rng = bank.for_panel(PanelSlot::Customer);
    let mut pred_rng = bank.for_panel(PanelSlot::Predictions);

    let months: Vec<YearMonth> = std::iter::successors(Some(opts.start), |m| Some(m.succ()))
        .take(opts.months)
        .collect();

    let mut out = SyntheticPanels::default();

    for i in 0..opts.merchants {
        let merchant_id = format!("MCT{i:05}");
        let declining = profile_rng.chance(opts.decline_fraction);
        let age_level = profile_rng.next_f64();
        out.profiles.push(MerchantProfile {
            merchant_id:      merchant_id.clone(),
            industry:         profile_rng.pick(INDUSTRIES).map(|s| s.to_string()),
            zone:             profile_rng.pick(ZONES).map(|s| s.to_string()),
            business_age_bin: Some(bin_label(age_level).to_string()),
        });

        let levels = health_path(&mut usage_rng, opts.months, declining);
        for (t, (&month, &level)) in months.iter().zip(&levels).enumerate() {
            let ym = month.to_string();
            out.usage.push(usage_row(&mut usage_rng, &merchant_id, &ym, level, declining, opts.sentinel_rate));
            out.customer.push(customer_row(&mut customer_rng, &merchant_id, &ym, level));
            out.predictions.push(prediction_row(&mut pred_rng, &merchant_id, &ym, level));

            if t + 1 == opts.months {
                out.labels.push(CalibrationLabel {
                    merchant_id: merchant_id.clone(),
                    year_month:  ym,
                    label:       if declining { 1.0 } else { 0.0 },
                });
            }
        }

        if declining {
            out.declining.push(merchant_id);
        }
    }

    log::debug!(
        "synth: {} merchants x {} months ({} declining)",
        opts.merchants,
        opts.months,
        out.declining.len(),
    );
    out
}

/// Latent health per month. Decliners lose health from an onset in the
/// middle third of the panel.
fn health_path(rng: &mut PanelRng, months: usize, declining: bool) -> Vec<f64> {
    let start = rng.uniform(0.45, 0.9);
    let onset = (months / 3) + rng.next_u64_below((months / 3).max(1) as u64) as usize;
    let slope = rng.uniform(0.04, 0.08);
    (0..months)
        .map(|t| {
            let decay = if declining && t >= onset { slope * (t - onset + 1) as f64 } else { 0.0 };
            (start - decay + rng.normal(0.0, 0.02)).clamp(0.01, 0.99)
        })
        .collect()
}

fn bin_label(level: f64) -> &'static str {
    BIN_LABELS
        .iter()
        .find(|(upper, _)| level < *upper)
        .map(|(_, label)| *label)
        .unwrap_or("6_90%초과")
}

fn jitter(rng: &mut PanelRng, level: f64, sd: f64) -> f64 {
    (level + rng.normal(0.0, sd)).clamp(0.0, 0.999)
}

fn maybe_suppress(rng: &mut PanelRng, value: f64, rate: f64) -> Option<f64> {
    if rng.chance(rate) { Some(SENTINEL_VALUE) } else { Some(value) }
}

fn usage_row(
    rng: &mut PanelRng,
    merchant_id: &str,
    year_month: &str,
    level: f64,
    declining: bool,
    sentinel_rate: f64,
) -> UsageRecord {
    let cancel_level = if declining { 1.0 - level } else { rng.uniform(0.05, 0.4) };
    let sales = bin_label(jitter(rng, level, 0.03));
    let txn = bin_label(jitter(rng, level, 0.05));
    let customers = bin_label(jitter(rng, level, 0.05));
    let ticket = bin_label(jitter(rng, 0.5, 0.1));
    let cancel = bin_label(jitter(rng, cancel_level, 0.05));

    let peer = level * 100.0;
    let delivery = rng.uniform(0.0, 40.0);
    let industry_peer = jitter(rng, level, 0.05) * 100.0;
    let zone_peer = jitter(rng, level, 0.05) * 100.0;
    let closure_industry = rng.uniform(0.0, 15.0);
    let closure_zone = rng.uniform(0.0, 15.0);

    UsageRecord {
        merchant_id:        merchant_id.to_string(),
        year_month:         year_month.to_string(),
        sales_bin:          Some(sales.to_string()),
        txn_count_bin:      Some(txn.to_string()),
        customer_count_bin: Some(customers.to_string()),
        avg_ticket_bin:     Some(ticket.to_string()),
        cancel_rate_bin:    Some(cancel.to_string()),
        business_age_bin:   None,

        delivery_share:       maybe_suppress(rng, delivery, sentinel_rate),
        industry_peer_pct:    maybe_suppress(rng, industry_peer, sentinel_rate),
        zone_peer_pct:        maybe_suppress(rng, zone_peer, sentinel_rate),
        industry_revenue_pct: maybe_suppress(rng, peer, sentinel_rate),
        industry_count_pct:   maybe_suppress(rng, peer, sentinel_rate),
        industry_closure_pct: maybe_suppress(rng, closure_industry, sentinel_rate),
        zone_closure_pct:     maybe_suppress(rng, closure_zone, sentinel_rate),
    }
}

/// Draw `N` positive weights and scale them to percent shares.
fn shares<const N: usize>(rng: &mut PanelRng) -> [Option<f64>; N] {
    let raw: Vec<f64> = (0..N).map(|_| rng.uniform(0.2, 1.0)).collect();
    let total: f64 = raw.iter().sum();
    let mut out = [None; N];
    for (dst, w) in out.iter_mut().zip(raw) {
        *dst = Some(100.0 * w / total);
    }
    out
}

fn customer_row(rng: &mut PanelRng, merchant_id: &str, year_month: &str, level: f64) -> CustomerRecord {
    CustomerRecord {
        merchant_id:         merchant_id.to_string(),
        year_month:          year_month.to_string(),
        age_gender_shares:   shares::<AGE_GENDER_SHARES>(rng),
        repeat_ratio:        Some(jitter(rng, 0.2 + 0.5 * level, 0.02) * 100.0),
        new_ratio:           Some(jitter(rng, 0.1 + 0.3 * level, 0.02) * 100.0),
        visitor_type_shares: shares::<VISITOR_TYPE_SHARES>(rng),
    }
}

fn prediction_row(rng: &mut PanelRng, merchant_id: &str, year_month: &str, level: f64) -> ExternalPrediction {
    let risk = 1.0 - level;
    let mut draw = |sd: f64| Some(jitter(rng, risk, sd));
    let pred_xgb = draw(0.05);
    let pred_lgbm = draw(0.05);
    let pred_rf = draw(0.08);
    let pred_gb = draw(0.08);
    // The neural family is not always available.
    let pred_dl = if rng.chance(0.7) { Some(jitter(rng, risk, 0.1)) } else { None };
    ExternalPrediction {
        merchant_id: merchant_id.to_string(),
        year_month:  year_month.to_string(),
        pred_xgb,
        pred_lgbm,
        pred_rf,
        pred_gb,
        pred_dl,
    }
}
