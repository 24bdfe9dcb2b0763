//! Ensemble blending and Platt calibration.

use merchant_risk_core::{
    calibration::{Calibrator, PlattScaler, ScoreCalibrator},
    config::{CalibrationMethod, EnsembleWeights},
    ensemble::{blend, ModelFamily, PredictionTable},
    panel::ExternalPrediction,
    stats::logistic,
    types::{RowKey, YearMonth},
};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn prediction(id: &str, ym: &str, values: [Option<f64>; 5]) -> ExternalPrediction {
    let [pred_xgb, pred_lgbm, pred_rf, pred_gb, pred_dl] = values;
    ExternalPrediction {
        merchant_id: id.into(),
        year_month: ym.into(),
        pred_xgb,
        pred_lgbm,
        pred_rf,
        pred_gb,
        pred_dl,
    }
}

#[test]
fn full_ensemble_of_certain_models_is_one() {
    let p = prediction("A", "2023-01", [Some(1.0); 5]);
    assert!(approx(blend(&p, &EnsembleWeights::default()), 1.0));
}

#[test]
fn no_predictions_blend_to_zero() {
    let p = prediction("A", "2023-01", [None; 5]);
    assert_eq!(blend(&p, &EnsembleWeights::default()), 0.0);
}

/// Absent families are not renormalized away.
#[test]
fn partial_ensemble_keeps_raw_weights() {
    let p = prediction("A", "2023-01", [Some(0.8), Some(0.4), None, None, None]);
    assert!(approx(blend(&p, &EnsembleWeights::default()), 0.25 * 0.8 + 0.25 * 0.4));
}

#[test]
fn out_of_range_predictions_are_clamped() {
    let p = prediction("A", "2023-01", [Some(1.5), Some(-0.3), Some(f64::NAN), None, None]);
    assert!(approx(blend(&p, &EnsembleWeights::default()), 0.25));
}

#[test]
fn prediction_table_keys_by_merchant_month() {
    let table = PredictionTable::from_records(&[
        prediction("A", "202301", [Some(0.4), None, None, None, None]),
        prediction("A", "2023-01", [Some(0.9), None, None, None, None]),
        prediction("B", "2023-01", [None, None, None, None, Some(0.5)]),
    ]).unwrap();

    assert_eq!(table.len(), 2, "duplicate key keeps the first row");
    let w = EnsembleWeights::default();
    let jan = YearMonth::new(2023, 1).unwrap();
    assert!(approx(table.p_model(&RowKey::new("A", jan), &w), 0.1));
    assert_eq!(table.p_model(&RowKey::new("C", jan), &w), 0.0);
    assert_eq!(table.families_present(), vec![ModelFamily::Xgb, ModelFamily::Dl]);
}

#[test]
fn prediction_table_rejects_missing_keys() {
    let result = PredictionTable::from_records(&[prediction("", "2023-01", [None; 5])]);
    assert!(result.is_err());
}

#[test]
fn platt_fit_is_monotonic() {
    let p = [0.1, 0.2, 0.3, 0.4, 0.6, 0.7, 0.8, 0.9];
    let y = [0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0];
    let scaler = PlattScaler::fit(&p, &y).unwrap();
    assert!(scaler.a > 0.0);

    let grid: Vec<f64> = (0..=100).map(|i| i as f64 / 100.0).collect();
    let out = scaler.calibrate_batch(&grid);
    for w in out.windows(2) {
        assert!(w[1] >= w[0], "not monotonic: {} then {}", w[0], w[1]);
    }
    assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn platt_negative_slope_is_floored() {
    let p = [0.1, 0.3, 0.5, 0.7, 0.9];
    let y = [1.0, 1.0, 0.0, 0.0, 0.0];
    let scaler = PlattScaler::fit(&p, &y).unwrap();
    assert_eq!(scaler.a, 0.0);
    assert!(approx(scaler.b, 0.4));
    assert!(approx(scaler.calibrate(0.2), scaler.calibrate(0.8)));
}

#[test]
fn platt_degenerate_design_fits_intercept_only() {
    let scaler = PlattScaler::fit(&[0.3, 0.3, 0.3], &[1.0, 0.0, 1.0]).unwrap();
    assert_eq!(scaler.a, 0.0);
    assert!(approx(scaler.b, 2.0 / 3.0));
    assert!(approx(scaler.calibrate(0.9), logistic(2.0 / 3.0)));
}

#[test]
fn platt_without_data_does_not_fit() {
    assert!(PlattScaler::fit(&[], &[]).is_none());
}

#[test]
fn unfitted_calibrator_is_identity_through_clamp() {
    let cal = Calibrator::new(CalibrationMethod::Platt);
    assert!(!cal.is_fitted());
    assert_eq!(cal.transform(0.3), 0.3);
    assert_eq!(cal.transform(1.4), 1.0);
    assert_eq!(cal.transform(-0.1), 0.0);
    assert_eq!(cal.name(), "identity");
}

#[test]
fn calibration_method_none_ignores_labels() {
    let cal = Calibrator::new(CalibrationMethod::None).fit(&[0.1, 0.9], &[0.0, 1.0]);
    assert!(!cal.is_fitted());
    assert_eq!(cal.transform(0.42), 0.42);
}

#[test]
fn fitted_calibrator_uses_platt() {
    let cal = Calibrator::new(CalibrationMethod::Platt).fit(&[0.1, 0.2, 0.8, 0.9], &[0.0, 0.0, 1.0, 1.0]);
    assert!(cal.is_fitted());
    assert_eq!(cal.name(), "platt");
    assert!(cal.transform(0.9) > cal.transform(0.1));
}
