//! Shared key types used across the entire pipeline.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A stable merchant identifier (the encoded store id).
pub type MerchantId = String;

/// A calendar month, stored as its first day.
///
/// Every panel key is coerced into this form before grouping or joining,
/// so "202301", "2023-01" and "2023-01-15" all land on the same row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth(NaiveDate);

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn year(&self) -> i32 { self.0.year() }
    pub fn month(&self) -> u32 { self.0.month() }

    pub fn first_day(&self) -> NaiveDate { self.0 }

    /// The month after this one.
    pub fn succ(&self) -> Self {
        let (y, m) = if self.month() == 12 {
            (self.year() + 1, 1)
        } else {
            (self.year(), self.month() + 1)
        };
        // Day 1 of a valid month always exists.
        Self(NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(self.0))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = deserialize_month_repr(d)?;
        crate::normalizer::coerce_month(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unparseable year-month '{raw}'")))
    }
}

/// The row identity used everywhere: (merchant id, year-month).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub merchant_id: MerchantId,
    pub year_month:  YearMonth,
}

impl RowKey {
    pub fn new(merchant_id: impl Into<MerchantId>, year_month: YearMonth) -> Self {
        Self { merchant_id: merchant_id.into(), year_month }
    }
}

/// Accept a month key written as a JSON string, an integer (202301) or null.
/// Null and absent keys come back empty and are rejected by the joiner.
pub fn deserialize_month_repr<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null      => String::new(),
        other => return Err(serde::de::Error::custom(format!("unsupported year-month value {other}"))),
    })
}

/// Accept a bin label written as a string or a bare number.
pub fn deserialize_bin_label<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accept a numeric field written as a number, a numeric string or null.
/// Anything else is treated as missing, the same way a suppressed value is.
pub fn deserialize_lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}
