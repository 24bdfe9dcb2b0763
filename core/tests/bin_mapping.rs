//! Bin labels to ranks, and month keys to `YearMonth`.

use merchant_risk_core::{
    normalizer::{bin_to_rank, coerce_month, BOTTOM_BIN, TOP_BIN},
    types::YearMonth,
};

#[test]
fn canonical_bins_map_to_midpoints() {
    assert_eq!(bin_to_rank("10-25%"), Some(0.175));
    assert_eq!(bin_to_rank("2_10-25%"), Some(0.175));
    assert_eq!(bin_to_rank("10 ~ 25%"), Some(0.175));
    assert_eq!(bin_to_rank("50-75%"), Some(0.625));
}

#[test]
fn open_ended_bins_land_in_edge_bins() {
    let top = bin_to_rank("90%초과").unwrap();
    assert!(top >= TOP_BIN.0 && top <= TOP_BIN.1, "top = {top}");

    let top_noted = bin_to_rank("6_90%초과(하위 10% 이하)").unwrap();
    assert!(top_noted >= TOP_BIN.0 && top_noted <= TOP_BIN.1, "top_noted = {top_noted}");

    let bottom = bin_to_rank("10%이하").unwrap();
    assert!(bottom >= BOTTOM_BIN.0 && bottom <= BOTTOM_BIN.1, "bottom = {bottom}");

    let english_top = bin_to_rank("above 90%").unwrap();
    assert!(english_top >= TOP_BIN.0 && english_top <= TOP_BIN.1);

    let english_bottom = bin_to_rank("At most 10%").unwrap();
    assert!(english_bottom >= BOTTOM_BIN.0 && english_bottom <= BOTTOM_BIN.1);
}

#[test]
fn generic_ranges_use_the_midpoint() {
    assert_eq!(bin_to_rank("20-40%"), Some(0.3));
}

#[test]
fn numeric_strings_pass_through() {
    assert_eq!(bin_to_rank("0.42"), Some(0.42));
}

#[test]
fn malformed_bins_are_missing() {
    assert_eq!(bin_to_rank("unknown"), None);
    assert_eq!(bin_to_rank(""), None);
    assert_eq!(bin_to_rank("   "), None);
}

#[test]
fn month_keys_coerce_to_first_of_month() {
    let jan = YearMonth::new(2023, 1).unwrap();
    for raw in ["202301", "2023-01", "2023/01", "2023-01-15", "20230115", "2023-01-31T00:00:00"] {
        assert_eq!(coerce_month(raw), Some(jan), "raw = {raw}");
    }
    assert_eq!(jan.to_string(), "2023-01");
    assert_eq!(jan.first_day().to_string(), "2023-01-01");
}

#[test]
fn month_succ_rolls_over_the_year() {
    let dec = YearMonth::new(2023, 12).unwrap();
    assert_eq!(dec.succ(), YearMonth::new(2024, 1).unwrap());
}

#[test]
fn empty_month_is_missing() {
    assert_eq!(coerce_month(""), None);
    assert_eq!(coerce_month("2023"), None);
}
