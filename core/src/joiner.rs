//! Dataset joiner: profile + usage + customer panels into one table.
//!
//! Order of operations (fixed):
//!   1. Validate every key. A missing key is fatal: row identity is gone.
//!   2. Treat sentinel and non-finite panel values as missing.
//!   3. De-duplicate each panel on (merchant id, year-month), first row wins.
//!   4. Left-join customer onto usage, then profile onto the result.
//!   5. Sort by (merchant id, year-month).
//!
//! The output has exactly one row per de-duplicated usage row.

use crate::{
    error::{RiskError, RiskResult},
    normalizer::coerce_month,
    panel::{CustomerRecord, MerchantProfile, UsageRecord, AGE_GENDER_SHARES, VISITOR_TYPE_SHARES},
    types::RowKey,
};
use serde::{Deserialize, Serialize};
use std::collections::{hash_map::Entry, HashMap, HashSet};

/// One merchant-month after the join. Bins are still raw labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRecord {
    pub key:      RowKey,
    pub industry: Option<String>,
    pub zone:     Option<String>,

    pub sales_bin:          Option<String>,
    pub txn_count_bin:      Option<String>,
    pub customer_count_bin: Option<String>,
    pub avg_ticket_bin:     Option<String>,
    pub cancel_rate_bin:    Option<String>,
    pub business_age_bin:   Option<String>,

    pub delivery_share:       Option<f64>,
    pub industry_peer_pct:    Option<f64>,
    pub zone_peer_pct:        Option<f64>,
    pub industry_revenue_pct: Option<f64>,
    pub industry_count_pct:   Option<f64>,
    pub industry_closure_pct: Option<f64>,
    pub zone_closure_pct:     Option<f64>,

    pub age_gender_shares:   [Option<f64>; AGE_GENDER_SHARES],
    pub repeat_ratio:        Option<f64>,
    pub new_ratio:           Option<f64>,
    pub visitor_type_shares: [Option<f64>; VISITOR_TYPE_SHARES],
}

/// Resolve a raw (merchant id, month) pair or fail with the row's position.
pub fn validate_key(
    table: &'static str,
    row: usize,
    merchant_id: &str,
    year_month: &str,
) -> RiskResult<RowKey> {
    let merchant_id = merchant_id.trim();
    if merchant_id.is_empty() {
        return Err(RiskError::MissingKey { table, row, field: "merchant_id" });
    }
    let month = coerce_month(year_month)
        .ok_or(RiskError::MissingKey { table, row, field: "year_month" })?;
    Ok(RowKey::new(merchant_id, month))
}

/// A numeric panel value, or None when suppressed/non-finite.
pub fn clean_value(v: Option<f64>, sentinel: f64) -> Option<f64> {
    v.filter(|x| x.is_finite() && *x > sentinel)
}

/// A bin label, or None when it is blank or a suppressed numeric value.
pub fn clean_label(label: &Option<String>, sentinel: f64) -> Option<String> {
    let label = label.as_ref()?.trim();
    if label.is_empty() {
        return None;
    }
    match label.parse::<f64>() {
        Ok(v) if !v.is_finite() || v <= sentinel => None,
        _ => Some(label.to_string()),
    }
}

/// Join the three tables. See module docs for the exact semantics.
pub fn join(
    profiles: &[MerchantProfile],
    usage:    &[UsageRecord],
    customer: &[CustomerRecord],
    sentinel: f64,
) -> RiskResult<Vec<JoinedRecord>> {
    // Profiles: unique per merchant, first wins.
    let mut profile_by_id: HashMap<&str, &MerchantProfile> = HashMap::new();
    for (row, p) in profiles.iter().enumerate() {
        let id = p.merchant_id.trim();
        if id.is_empty() {
            return Err(RiskError::MissingKey { table: "profile", row, field: "merchant_id" });
        }
        match profile_by_id.entry(id) {
            Entry::Occupied(_) => {
                log::warn!("joiner: duplicate profile for merchant {id}, keeping the first");
            }
            Entry::Vacant(slot) => {
                slot.insert(p);
            }
        }
    }

    let mut customer_by_key: HashMap<RowKey, &CustomerRecord> = HashMap::new();
    let mut customer_dupes = 0usize;
    for (row, c) in customer.iter().enumerate() {
        let key = validate_key("customer", row, &c.merchant_id, &c.year_month)?;
        if customer_by_key.contains_key(&key) {
            customer_dupes += 1;
            continue;
        }
        customer_by_key.insert(key, c);
    }

    // Validate every usage key before building anything.
    let usage_keys = usage
        .iter()
        .enumerate()
        .map(|(row, u)| validate_key("usage", row, &u.merchant_id, &u.year_month))
        .collect::<RiskResult<Vec<_>>>()?;

    let mut seen: HashSet<RowKey> = HashSet::with_capacity(usage.len());
    let mut joined = Vec::with_capacity(usage.len());
    for (u, key) in usage.iter().zip(usage_keys) {
        if !seen.insert(key.clone()) {
            continue;
        }
        let profile = profile_by_id.get(key.merchant_id.as_str()).copied();
        let cust = customer_by_key.get(&key).copied();
        joined.push(build_record(key, u, cust, profile, sentinel));
    }

    let usage_dupes = usage.len() - joined.len();
    if usage_dupes > 0 || customer_dupes > 0 {
        log::warn!(
            "joiner: dropped duplicate merchant-months (usage={usage_dupes}, customer={customer_dupes})"
        );
    }

    if joined.is_empty() {
        return Err(RiskError::EmptyJoinResult { context: "usage panel has no rows".into() });
    }

    joined.sort_by(|a, b| a.key.cmp(&b.key));

    log::debug!(
        "joiner: {} rows across {} merchants ({} with customer data)",
        joined.len(),
        joined.iter().map(|r| &r.key.merchant_id).collect::<HashSet<_>>().len(),
        joined.iter().filter(|r| r.repeat_ratio.is_some() || r.new_ratio.is_some()).count(),
    );

    Ok(joined)
}

fn build_record(
    key: RowKey,
    u: &UsageRecord,
    c: Option<&CustomerRecord>,
    p: Option<&MerchantProfile>,
    sentinel: f64,
) -> JoinedRecord {
    let num = |v: Option<f64>| clean_value(v, sentinel);
    let lbl = |v: &Option<String>| clean_label(v, sentinel);

    let business_age_bin = lbl(&u.business_age_bin)
        .or_else(|| p.and_then(|p| lbl(&p.business_age_bin)));

    let mut age_gender_shares = [None; AGE_GENDER_SHARES];
    let mut visitor_type_shares = [None; VISITOR_TYPE_SHARES];
    if let Some(c) = c {
        for (dst, src) in age_gender_shares.iter_mut().zip(c.age_gender_shares) {
            *dst = num(src);
        }
        for (dst, src) in visitor_type_shares.iter_mut().zip(c.visitor_type_shares) {
            *dst = num(src);
        }
    }

    JoinedRecord {
        key,
        industry: p.and_then(|p| non_blank(&p.industry)),
        zone:     p.and_then(|p| non_blank(&p.zone)),

        sales_bin:          lbl(&u.sales_bin),
        txn_count_bin:      lbl(&u.txn_count_bin),
        customer_count_bin: lbl(&u.customer_count_bin),
        avg_ticket_bin:     lbl(&u.avg_ticket_bin),
        cancel_rate_bin:    lbl(&u.cancel_rate_bin),
        business_age_bin,

        delivery_share:       num(u.delivery_share),
        industry_peer_pct:    num(u.industry_peer_pct),
        zone_peer_pct:        num(u.zone_peer_pct),
        industry_revenue_pct: num(u.industry_revenue_pct),
        industry_count_pct:   num(u.industry_count_pct),
        industry_closure_pct: num(u.industry_closure_pct),
        zone_closure_pct:     num(u.zone_closure_pct),

        age_gender_shares,
        repeat_ratio: c.and_then(|c| num(c.repeat_ratio)),
        new_ratio:    c.and_then(|c| num(c.new_ratio)),
        visitor_type_shares,
    }
}

fn non_blank(s: &Option<String>) -> Option<String> {
    s.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}
