//! Key normalization: percentile-bin labels to ranks, month keys to `YearMonth`.
//!
//! Source panels write the same bin several ways ("10-25%", "10 ~ 25%",
//! "2_10-25%", "6_90%초과(하위 10% 이하)"). Labels are folded into one
//! canonical spelling and looked up in a single table; generic range and
//! "at most / above" forms fall through to regex rules.

use crate::{joiner::JoinedRecord, types::YearMonth};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

// ── Bin table ───────────────────────────────────────────────────────────────

/// Canonical bin label → bin midpoint rank.
const BIN_RANKS: &[(&str, f64)] = &[
    ("10%이하", 0.05),
    ("10-25%",  0.175),
    ("25-50%",  0.375),
    ("50-75%",  0.625),
    ("75-90%",  0.875),
    ("90%초과", 0.95),
];

/// Where "at most x%" labels may land: inside the bottom bin.
pub const BOTTOM_BIN: (f64, f64) = (0.05, 0.10);
/// Where "above x%" labels may land: inside the top bin.
pub const TOP_BIN: (f64, f64) = (0.90, 0.95);

const AT_MOST_WORDS: &[&str] = &["이하", "미만", "atmost", "orless", "orbelow", "under", "below", "upto"];
const ABOVE_WORDS:   &[&str] = &["초과", "이상", "above", "over", "ormore", "orabove", "atleast"];

static PARENTHETICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\([^)]*\)").expect("static regex")
});

static ORDINAL_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+_").expect("static regex")
});

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)%?-(\d+(?:\.\d+)?)%$").expect("static regex")
});

static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)%").expect("static regex")
});

static MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})[-/.]?(\d{1,2})(?:[-/.]?\d{1,2})?(?:[T ].*)?$").expect("static regex")
});

/// Fold spacing, range separators, ordinal prefixes and notes away.
pub fn canonical_label(raw: &str) -> String {
    let without_notes = PARENTHETICAL_RE.replace_all(raw.trim(), "");
    let without_prefix = ORDINAL_PREFIX_RE.replace(without_notes.trim(), "");
    without_prefix
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '~' | '∼' | '〜' | '–' | '—' => '-',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}

/// Map a percentile-bin label to a rank in [0, 1].
///
/// Unmapped numeric strings pass through as floats. Anything else is a
/// malformed bin and comes back as None, which scores as neutral.
pub fn bin_to_rank(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let label = canonical_label(trimmed);
    if let Some((_, rank)) = BIN_RANKS.iter().find(|(k, _)| *k == label) {
        return Some(*rank);
    }

    if let Some(rank) = range_rank(&label).or_else(|| bound_rank(&label)) {
        return Some(rank);
    }

    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            log::debug!("normalizer: malformed bin label '{raw}' treated as missing");
            None
        }
    }
}

/// "a-b%" → midpoint of the range as a fraction.
fn range_rank(label: &str) -> Option<f64> {
    let caps = RANGE_RE.captures(label)?;
    let lo: f64 = caps[1].parse().ok()?;
    let hi: f64 = caps[2].parse().ok()?;
    if lo > hi || hi > 100.0 {
        return None;
    }
    Some((lo + hi) / 200.0)
}

/// "x% 이하" / "above x%" style open-ended bins.
fn bound_rank(label: &str) -> Option<f64> {
    let mut numbers = PERCENT_RE.captures_iter(label);
    let x: f64 = numbers.next()?[1].parse().ok()?;
    if numbers.next().is_some() || x > 100.0 {
        return None;
    }

    if ABOVE_WORDS.iter().any(|w| label.contains(w)) {
        let (lo, hi) = TOP_BIN;
        return Some(((x + 100.0) / 200.0).clamp(lo, hi));
    }
    if AT_MOST_WORDS.iter().any(|w| label.contains(w)) {
        let (lo, hi) = BOTTOM_BIN;
        return Some((x / 200.0).clamp(lo, hi));
    }
    None
}

// ── Month keys ──────────────────────────────────────────────────────────────

/// Coerce a year-month written any common way to its first day.
/// Accepts YYYYMM, YYYYMMDD, YYYY-MM, YYYY/MM, YYYY.MM, YYYY-MM-DD and
/// ISO date-times. Empty or unparseable input gives None.
pub fn coerce_month(raw: &str) -> Option<YearMonth> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let caps = MONTH_RE.captures(raw)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    YearMonth::new(year, month)
}

// ── Record ranks ────────────────────────────────────────────────────────────

/// Bin ranks for one joined row. None = missing or malformed label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BinRanks {
    pub sales:          Option<f64>,
    pub txn_count:      Option<f64>,
    pub customer_count: Option<f64>,
    pub avg_ticket:     Option<f64>,
    pub cancel_rate:    Option<f64>,
    pub business_age:   Option<f64>,
}

/// A joined row with its bin labels resolved to ranks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRecord {
    pub record: JoinedRecord,
    pub ranks:  BinRanks,
}

pub fn rank_record(record: &JoinedRecord) -> BinRanks {
    let rank = |label: &Option<String>| label.as_deref().and_then(bin_to_rank);
    BinRanks {
        sales:          rank(&record.sales_bin),
        txn_count:      rank(&record.txn_count_bin),
        customer_count: rank(&record.customer_count_bin),
        avg_ticket:     rank(&record.avg_ticket_bin),
        cancel_rate:    rank(&record.cancel_rate_bin),
        business_age:   rank(&record.business_age_bin),
    }
}

/// Resolve every bin column of the joined table. Row order is preserved.
pub fn normalize_bins(joined: Vec<JoinedRecord>) -> Vec<RankedRecord> {
    joined
        .into_iter()
        .map(|record| {
            let ranks = rank_record(&record);
            RankedRecord { record, ranks }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_label_folds_variants() {
        assert_eq!(canonical_label(" 10 ~ 25% "), "10-25%");
        assert_eq!(canonical_label("2_10-25%"), "10-25%");
        assert_eq!(canonical_label("6_90%초과(하위 10% 이하)"), "90%초과");
        assert_eq!(canonical_label("At Most 10%"), "atmost10%");
    }

    #[test]
    fn month_rejects_invalid_month_number() {
        assert_eq!(coerce_month("202313"), None);
        assert_eq!(coerce_month("hello"), None);
    }
}
