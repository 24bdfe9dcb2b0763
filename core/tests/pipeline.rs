//! End-to-end pipeline runs over hand-built and synthetic panels.

use merchant_risk_core::{
    alerting::{AlertLabel, FixedThresholdPolicy},
    config::{AlertPolicyKind, CalibrationMethod, RiskConfig},
    error::RiskError,
    panel::{CalibrationLabel, ExternalPrediction, MerchantProfile, UsageRecord},
    pipeline::run,
    synth,
    types::YearMonth,
};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn small_usage() -> Vec<UsageRecord> {
    let bins = ["4_50-75%", "4_50-75%", "3_25-50%", "2_10-25%"];
    let mut rows = Vec::new();
    for id in ["A", "B"] {
        for (m, bin) in bins.iter().enumerate() {
            rows.push(UsageRecord {
                merchant_id: id.into(),
                year_month: format!("2023-{:02}", m + 1),
                sales_bin: Some(bin.to_string()),
                txn_count_bin: Some(bin.to_string()),
                industry_peer_pct: Some(30.0),
                zone_closure_pct: Some(8.0),
                ..Default::default()
            });
        }
    }
    rows
}

fn small_profiles() -> Vec<MerchantProfile> {
    vec![
        MerchantProfile { merchant_id: "A".into(), industry: Some("Cafe".into()), zone: Some("Z1".into()), business_age_bin: Some("3_25-50%".into()) },
        MerchantProfile { merchant_id: "B".into(), industry: Some("Pub".into()), zone: Some("Z1".into()), business_age_bin: None },
    ]
}

#[test]
fn without_predictions_p_final_is_risk_score() {
    let out = run(&RiskConfig::default(), &small_profiles(), &small_usage(), &[], None, None).unwrap();

    assert_eq!(out.len(), 8);
    for row in &out.rows {
        assert_eq!(row.p_model, 0.0);
        assert_eq!(row.p_final, row.risk_score);
        for v in [row.sales_risk, row.customer_risk, row.market_risk, row.risk_score] {
            assert!((0.0..=1.0).contains(&v));
        }
    }
}

#[test]
fn output_is_sorted_by_merchant_then_month() {
    let mut usage = small_usage();
    usage.reverse();
    let out = run(&RiskConfig::default(), &small_profiles(), &usage, &[], None, None).unwrap();
    let keys: Vec<_> = out.rows.iter().map(|r| (r.merchant_id.clone(), r.year_month)).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn output_uses_the_published_column_names() {
    let out = run(&RiskConfig::default(), &small_profiles(), &small_usage(), &[], None, None).unwrap();
    let json = serde_json::to_value(&out).unwrap();
    let first = json.as_array().unwrap()[0].as_object().unwrap();

    let mut columns: Vec<&str> = first.keys().map(String::as_str).collect();
    columns.sort();
    assert_eq!(columns, vec![
        "Alert", "Customer_Risk", "Market_Risk", "RiskScore", "Sales_Risk",
        "merchant_id", "p_final", "p_model", "year_month",
    ]);
    assert_eq!(first["year_month"], "2023-01");
}

#[test]
fn predictions_blend_with_lambda() {
    let preds: Vec<ExternalPrediction> = small_usage()
        .iter()
        .map(|u| ExternalPrediction {
            merchant_id: u.merchant_id.clone(),
            year_month: u.year_month.clone(),
            pred_xgb: Some(0.8),
            pred_lgbm: Some(0.8),
            pred_rf: Some(0.8),
            pred_gb: Some(0.8),
            pred_dl: Some(0.8),
        })
        .collect();
    let config = RiskConfig { calibration: CalibrationMethod::None, ..RiskConfig::default() };

    let out = run(&config, &small_profiles(), &small_usage(), &[], Some(&preds), None).unwrap();
    for row in &out.rows {
        assert!(approx(row.p_model, 0.8));
        assert!(approx(row.p_final, 0.6 * 0.8 + 0.4 * row.risk_score));
    }
}

#[test]
fn merchant_months_without_predictions_get_zero_p_model() {
    let preds = vec![ExternalPrediction {
        merchant_id: "A".into(),
        year_month: "2023-04".into(),
        pred_xgb: Some(1.0),
        ..Default::default()
    }];
    let config = RiskConfig { calibration: CalibrationMethod::None, ..RiskConfig::default() };
    let out = run(&config, &small_profiles(), &small_usage(), &[], Some(&preds), None).unwrap();

    let a_apr = out.latest_for("A", None).unwrap();
    assert!(approx(a_apr.p_model, 0.25));
    let b_apr = out.latest_for("B", None).unwrap();
    assert_eq!(b_apr.p_model, 0.0);
    assert!(approx(b_apr.p_final, 0.4 * b_apr.risk_score));
}

#[test]
fn fitted_calibration_leaves_unpredicted_rows_at_zero() {
    // Labels {1, 1, 0} against rising predictions floor the slope, so the
    // fitted scaler maps every input to logistic(2/3).
    let preds: Vec<ExternalPrediction> = [(1, 0.2), (2, 0.5), (3, 0.9)]
        .into_iter()
        .map(|(m, p)| ExternalPrediction {
            merchant_id: "A".into(),
            year_month: format!("2023-{m:02}"),
            pred_xgb: Some(p),
            pred_lgbm: Some(p),
            pred_rf: Some(p),
            pred_gb: Some(p),
            pred_dl: Some(p),
        })
        .collect();
    let labels: Vec<CalibrationLabel> = [(1, 1.0), (2, 1.0), (3, 0.0)]
        .into_iter()
        .map(|(m, y)| CalibrationLabel { merchant_id: "A".into(), year_month: format!("2023-{m:02}"), label: y })
        .collect();
    let config = RiskConfig::default();
    assert_eq!(config.calibration, CalibrationMethod::Platt);

    let out = run(&config, &small_profiles(), &small_usage(), &[], Some(&preds), Some(&labels)).unwrap();

    let calibrated = 1.0 / (1.0 + (-2.0_f64 / 3.0).exp());
    for row in out.rows.iter().filter(|r| r.merchant_id == "A" && r.year_month <= YearMonth::new(2023, 3).unwrap()) {
        assert!(approx(row.p_final, 0.6 * calibrated + 0.4 * row.risk_score));
    }
    for row in out.rows.iter().filter(|r| r.merchant_id == "B") {
        assert_eq!(row.p_model, 0.0);
        assert!(approx(row.p_final, 0.4 * row.risk_score));
    }
    let a_apr = out.latest_for("A", None).unwrap();
    assert_eq!(a_apr.p_model, 0.0);
    assert!(approx(a_apr.p_final, 0.4 * a_apr.risk_score));
}

#[test]
fn fixed_policy_labels_match_the_policy_on_p_final() {
    let out = run(&RiskConfig::default(), &small_profiles(), &small_usage(), &[], None, None).unwrap();
    let a_scores: Vec<f64> = out.rows.iter().filter(|r| r.merchant_id == "A").map(|r| r.p_final).collect();
    let expected = FixedThresholdPolicy::new(RiskConfig::default().alert.fixed).label_series(&a_scores);
    let actual: Vec<AlertLabel> = out.rows.iter().filter(|r| r.merchant_id == "A").map(|r| r.alert).collect();
    assert_eq!(actual, expected);
}

#[test]
fn latest_for_picks_the_last_month_or_the_requested_one() {
    let out = run(&RiskConfig::default(), &small_profiles(), &small_usage(), &[], None, None).unwrap();

    assert_eq!(out.latest_for("A", None).unwrap().year_month, YearMonth::new(2023, 4).unwrap());
    let feb = YearMonth::new(2023, 2).unwrap();
    assert_eq!(out.latest_for("B", Some(feb)).unwrap().year_month, feb);

    assert!(matches!(out.latest_for("Z", None), Err(RiskError::EmptyJoinResult { .. })));
    let dec = YearMonth::new(2022, 12).unwrap();
    assert!(matches!(out.latest_for("A", Some(dec)), Err(RiskError::EmptyJoinResult { .. })));
}

#[test]
fn invalid_config_is_rejected_before_any_work() {
    let mut config = RiskConfig::default();
    config.blend_lambda = 1.5;
    let err = run(&config, &small_profiles(), &small_usage(), &[], None, None).unwrap_err();
    assert!(matches!(err, RiskError::InvalidConfig { .. }));
}

#[test]
fn missing_key_fails_the_whole_run() {
    let mut usage = small_usage();
    usage[3].year_month = String::new();
    let err = run(&RiskConfig::default(), &small_profiles(), &usage, &[], None, None).unwrap_err();
    assert!(matches!(err, RiskError::MissingKey { table: "usage", row: 3, field: "year_month" }));
}

#[test]
fn alert_counts_cover_every_row() {
    let panels = synth::generate(11, 30, 12);
    let config = RiskConfig::default().with_policy(AlertPolicyKind::Quantile);
    let out = run(&config, &panels.profiles, &panels.usage, &panels.customer, Some(&panels.predictions), Some(&panels.labels)).unwrap();

    let counts = out.alert_counts();
    assert_eq!(counts.len(), 4);
    assert_eq!(counts.values().sum::<usize>(), out.len());
    assert_eq!(out.len(), 30 * 12);
}

#[test]
fn decliners_get_higher_model_scores() {
    let panels = synth::generate(2024, 60, 18);
    assert!(!panels.declining.is_empty());
    let out = run(&RiskConfig::default(), &panels.profiles, &panels.usage, &panels.customer, Some(&panels.predictions), Some(&panels.labels)).unwrap();

    let last = *out.months().last().unwrap();
    let (mut dec, mut ok) = (Vec::new(), Vec::new());
    for row in out.rows.iter().filter(|r| r.year_month == last) {
        if panels.declining.contains(&row.merchant_id) { dec.push(row.p_model) } else { ok.push(row.p_model) }
    }
    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    assert!(mean(&dec) > mean(&ok), "decliners {} vs others {}", mean(&dec), mean(&ok));
}
