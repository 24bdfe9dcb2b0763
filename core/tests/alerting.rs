//! Alert policies: fixed thresholds with persistence, per-group quantiles.

use merchant_risk_core::{
    alerting::{policy_for, AlertInput, AlertLabel, AlertPolicy, FixedThresholdPolicy, QuantilePolicy, QuantileThresholds},
    config::{AlertConfig, AlertPolicyKind, FixedThresholds, Grouping, QuantileLevels},
    types::{RowKey, YearMonth},
};

fn month(m: u32) -> YearMonth {
    YearMonth::new(2023, m).unwrap()
}

fn input(id: &str, m: u32, industry: Option<&str>, zone: Option<&str>, score: f64) -> AlertInput {
    AlertInput {
        key: RowKey::new(id, month(m)),
        industry: industry.map(str::to_string),
        zone: zone.map(str::to_string),
        score,
    }
}

// ── Fixed thresholds ────────────────────────────────────────────────────────

#[test]
fn fixed_bands_without_persistence_pressure() {
    let policy = FixedThresholdPolicy::new(FixedThresholds::default());
    let labels = policy.label_series(&[0.10, 0.65, 0.75]);
    assert_eq!(labels, vec![AlertLabel::Green, AlertLabel::Yellow, AlertLabel::Orange]);
}

/// p_final = [0.50, 0.85, 0.82, 0.90] with k = 3: rolling means are
/// [0.50, 0.675, 0.7233, 0.8567]. Rows 2 and 3 clear the red threshold but
/// not the persistence gate (mean < 0.75); row 4 clears both.
///
/// Row 4 is RED because that is what the rule yields for these inputs. A
/// published walk-through of this scenario lists ORANGE with a fourth mean
/// of 0.7925; that mean does not follow from the inputs and is above 0.75
/// anyway, so the expectation here stays RED.
#[test]
fn persistence_gate_holds_back_red() {
    let policy = FixedThresholdPolicy::new(FixedThresholds::default());
    let labels = policy.label_series(&[0.50, 0.85, 0.82, 0.90]);
    assert_eq!(labels, vec![
        AlertLabel::Green,
        AlertLabel::Orange,
        AlertLabel::Orange,
        AlertLabel::Red,
    ]);
}

#[test]
fn a_single_spike_never_goes_red() {
    let policy = FixedThresholdPolicy::new(FixedThresholds::default());
    let labels = policy.label_series(&[0.20, 0.20, 0.95]);
    assert_eq!(labels[2], AlertLabel::Orange);
}

#[test]
fn persistence_of_one_is_a_plain_threshold() {
    let thresholds = FixedThresholds { persistence_k: 1, ..FixedThresholds::default() };
    let labels = FixedThresholdPolicy::new(thresholds).label_series(&[0.20, 0.95]);
    assert_eq!(labels[1], AlertLabel::Red);
}

/// Rows arrive shuffled and interleaved; the gate still runs per merchant
/// in month order and labels come back in input order.
#[test]
fn fixed_policy_partitions_by_merchant_and_month() {
    let rows = vec![
        input("A", 4, None, None, 0.90),
        input("B", 1, None, None, 0.95),
        input("A", 2, None, None, 0.85),
        input("A", 1, None, None, 0.50),
        input("A", 3, None, None, 0.82),
        input("B", 2, None, None, 0.95),
    ];
    let labels = FixedThresholdPolicy::new(FixedThresholds::default()).assign(&rows);
    assert_eq!(labels, vec![
        AlertLabel::Red,    // A 4
        AlertLabel::Red,    // B 1: first value is its own mean
        AlertLabel::Orange, // A 2
        AlertLabel::Green,  // A 1
        AlertLabel::Orange, // A 3
        AlertLabel::Red,    // B 2
    ]);
}

// ── Quantiles ───────────────────────────────────────────────────────────────

#[test]
fn quantile_thresholds_from_uniform_scores() {
    let scores: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
    let t = QuantileThresholds::from_scores(&scores, &QuantileLevels::default()).unwrap();

    assert!((t.yellow - 0.792).abs() < 1e-9);
    assert!((t.orange - 0.891).abs() < 1e-9);
    assert!((t.red - 0.9603).abs() < 1e-9);

    assert_eq!(t.label(0.975), AlertLabel::Red);
    assert_eq!(t.label(0.91), AlertLabel::Orange);
    assert_eq!(t.label(0.80), AlertLabel::Yellow);
    assert_eq!(t.label(0.55), AlertLabel::Green);
}

#[test]
fn quantile_policy_labels_one_uniform_group() {
    let rows: Vec<AlertInput> = (0..100)
        .map(|i| input(&format!("M{i:03}"), 1, Some("Cafe"), Some("Seongsu"), (i as f64 + 0.5) / 100.0))
        .collect();
    let labels = QuantilePolicy::new(QuantileLevels::default()).assign(&rows);

    assert_eq!(labels[97], AlertLabel::Red);    // 0.975
    assert_eq!(labels[91], AlertLabel::Orange); // 0.915
    assert_eq!(labels[55], AlertLabel::Green);  // 0.555

    let count = |l: AlertLabel| labels.iter().filter(|x| **x == l).count();
    assert_eq!(count(AlertLabel::Red), 3);
    assert_eq!(count(AlertLabel::Orange), 7);
    assert_eq!(count(AlertLabel::Yellow), 10);
    assert_eq!(count(AlertLabel::Green), 80);
}

#[test]
fn auto_grouping_falls_back_when_attributes_are_missing() {
    let policy = QuantilePolicy::new(QuantileLevels::default());

    let full = vec![input("A", 1, Some("Cafe"), Some("Z1"), 0.1)];
    assert_eq!(policy.resolve_grouping(&full), Grouping::IndustryZoneMonth);

    let no_zone = vec![input("A", 1, Some("Cafe"), Some("Z1"), 0.1), input("B", 1, Some("Pub"), None, 0.2)];
    assert_eq!(policy.resolve_grouping(&no_zone), Grouping::IndustryMonth);

    let no_industry = vec![input("A", 1, None, Some("Z1"), 0.1)];
    assert_eq!(policy.resolve_grouping(&no_industry), Grouping::ZoneMonth);

    let bare = vec![input("A", 1, None, None, 0.1)];
    assert_eq!(policy.resolve_grouping(&bare), Grouping::Month);
}

/// Each industry is ranked against itself, not against the other.
#[test]
fn groups_are_labeled_independently() {
    let mut rows = Vec::new();
    for i in 0..10 {
        rows.push(input(&format!("C{i}"), 1, Some("Cafe"), Some("Z1"), 0.01 * i as f64));
        rows.push(input(&format!("P{i}"), 1, Some("Pub"), Some("Z1"), 0.5 + 0.01 * i as f64));
    }
    let labels = QuantilePolicy::new(QuantileLevels::default()).assign(&rows);

    // The top score of each industry is RED even though every Cafe score is
    // below every Pub score.
    assert_eq!(labels[18], AlertLabel::Red); // C9
    assert_eq!(labels[19], AlertLabel::Red); // P9
    assert_eq!(labels[0], AlertLabel::Green); // C0
}

#[test]
fn month_is_part_of_the_group() {
    let rows = vec![
        input("A", 1, Some("Cafe"), Some("Z1"), 0.1),
        input("B", 1, Some("Cafe"), Some("Z1"), 0.2),
        input("A", 2, Some("Cafe"), Some("Z1"), 0.9),
        input("B", 2, Some("Cafe"), Some("Z1"), 0.8),
    ];
    let labels = QuantilePolicy::new(QuantileLevels::default()).assign(&rows);
    assert_eq!(labels[1], AlertLabel::Red);
    assert_eq!(labels[2], AlertLabel::Red);
    assert_eq!(labels[3], AlertLabel::Green);
}

#[test]
fn policy_for_follows_config() {
    let fixed = policy_for(&AlertConfig::default());
    assert_eq!(fixed.name(), "fixed");

    let quantile = policy_for(&AlertConfig { policy: AlertPolicyKind::Quantile, ..AlertConfig::default() });
    assert_eq!(quantile.name(), "quantile");
}

#[test]
fn labels_serialize_upper_case() {
    assert_eq!(serde_json::to_string(&AlertLabel::Orange).unwrap(), "\"ORANGE\"");
    assert_eq!(AlertLabel::Red.to_string(), "RED");
}
