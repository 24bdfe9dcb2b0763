use merchant_risk_core::{
    calibration::{Calibrator, ScoreCalibrator},
    config::{CalibrationMethod, EnsembleWeights, RiskConfig, RollingConfig},
    ensemble::blend,
    panel::{CustomerRecord, ExternalPrediction, UsageRecord},
    pipeline::run,
    stats::robust_z,
    types::YearMonth,
};
use proptest::prelude::*;

const BINS: &[&str] = &[
    "1_10%이하", "2_10-25%", "3_25-50%", "4_50-75%", "5_75-90%", "6_90%초과(하위 10% 이하)",
    "10 ~ 25%", "above 90%", "garbage", "0.3", "7.5", "-999999.9", "",
];

fn bin() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::sample::select(BINS).prop_map(str::to_string))
}

fn value() -> impl Strategy<Value = Option<f64>> {
    prop::option::of(prop_oneof![
        0.0..100.0f64,
        -1e6..1e6f64,
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(-999_999.9),
    ])
}

fn usage_month() -> impl Strategy<Value = UsageRecord> {
    (
        (bin(), bin(), bin(), bin(), bin(), bin()),
        (value(), value(), value(), value(), value(), value(), value()),
    )
        .prop_map(|((s, t, c, a, x, age), (dlv, ip, zp, rev, cnt, ic, zc))| UsageRecord {
            merchant_id: String::new(),
            year_month: String::new(),
            sales_bin: s,
            txn_count_bin: t,
            customer_count_bin: c,
            avg_ticket_bin: a,
            cancel_rate_bin: x,
            business_age_bin: age,
            delivery_share: dlv,
            industry_peer_pct: ip,
            zone_peer_pct: zp,
            industry_revenue_pct: rev,
            industry_count_pct: cnt,
            industry_closure_pct: ic,
            zone_closure_pct: zc,
        })
}

fn customer_month() -> impl Strategy<Value = CustomerRecord> {
    (prop::array::uniform10(value()), value(), value(), prop::array::uniform3(value()))
        .prop_map(|(ages, repeat, new, types)| CustomerRecord {
            merchant_id: String::new(),
            year_month: String::new(),
            age_gender_shares: ages,
            repeat_ratio: repeat,
            new_ratio: new,
            visitor_type_shares: types,
        })
}

/// Stamp a merchant id and consecutive months onto generated rows.
fn keyed<T>(rows: Vec<T>, id: &str, mut set: impl FnMut(&mut T, String, String)) -> Vec<T> {
    let mut month = YearMonth::new(2022, 1).unwrap();
    rows.into_iter()
        .map(|mut r| {
            set(&mut r, id.to_string(), month.to_string());
            month = month.succ();
            r
        })
        .collect()
}

proptest! {
    #[test]
    fn every_output_column_is_bounded(
        usage in prop::collection::vec(usage_month(), 1..24),
        customer in prop::collection::vec(customer_month(), 0..24),
    ) {
        let usage = keyed(usage, "M", |r, id, ym| { r.merchant_id = id; r.year_month = ym; });
        let customer = keyed(customer, "M", |r, id, ym| { r.merchant_id = id; r.year_month = ym; });

        let out = run(&RiskConfig::default(), &[], &usage, &customer, None, None).unwrap();
        prop_assert_eq!(out.len(), usage.len());
        for row in &out.rows {
            for v in [row.sales_risk, row.customer_risk, row.market_risk, row.risk_score, row.p_model, row.p_final] {
                prop_assert!((0.0..=1.0).contains(&v), "{:?}", row);
            }
        }
    }

    #[test]
    fn p_model_is_bounded_for_any_predictions(values in prop::array::uniform5(value())) {
        let [pred_xgb, pred_lgbm, pred_rf, pred_gb, pred_dl] = values;
        let p = ExternalPrediction {
            merchant_id: "M".into(),
            year_month: "2023-01".into(),
            pred_xgb, pred_lgbm, pred_rf, pred_gb, pred_dl,
        };
        let v = blend(&p, &EnsembleWeights::default());
        prop_assert!((0.0..=1.0).contains(&v));
    }

    #[test]
    fn fitted_calibration_is_monotonic(
        pairs in prop::collection::vec((0.0..1.0f64, 0.0..=1.0f64), 2..60),
        a in 0.0..1.0f64,
        b in 0.0..1.0f64,
    ) {
        let (p, y): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        let cal = Calibrator::new(CalibrationMethod::Platt).fit(&p, &y);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(cal.calibrate(lo) <= cal.calibrate(hi));
        prop_assert!((0.0..=1.0).contains(&cal.calibrate(hi)));
    }

    #[test]
    fn robust_z_is_finite_when_defined(xs in prop::collection::vec(prop::option::of(-10.0..10.0f64), 0..40)) {
        for z in robust_z(&xs, &RollingConfig::default()).into_iter().flatten() {
            prop_assert!(z.is_finite());
        }
    }
}
