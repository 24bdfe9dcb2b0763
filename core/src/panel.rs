//! Raw input tables, as handed over by the loader.
//!
//! Keys arrive unvalidated: an empty merchant id or an unparseable month is
//! rejected by the joiner, not by deserialization, so the error can name the
//! offending table and row. Upper-case aliases match the source column names.

use crate::types::{deserialize_bin_label, deserialize_lenient_f64, deserialize_month_repr};
use serde::{Deserialize, Serialize};

/// Number of age/gender share columns on the customer panel.
pub const AGE_GENDER_SHARES: usize = 10;
/// Number of visitor-type share columns on the customer panel.
pub const VISITOR_TYPE_SHARES: usize = 3;

/// Static per-merchant attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MerchantProfile {
    #[serde(default, alias = "ENCODED_MCT")]
    pub merchant_id: String,
    #[serde(default, alias = "HPSN_MCT_ZCD_NM")]
    pub industry: Option<String>,
    #[serde(default, alias = "HPSN_MCT_BZN_CD_NM")]
    pub zone: Option<String>,
    #[serde(default, alias = "MCT_OPE_MS_CN", deserialize_with = "deserialize_bin_label")]
    pub business_age_bin: Option<String>,
}

/// Monthly usage panel: the primary table. One row per merchant-month.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(default, alias = "ENCODED_MCT")]
    pub merchant_id: String,
    #[serde(default, alias = "TA_YM", deserialize_with = "deserialize_month_repr")]
    pub year_month: String,

    #[serde(default, alias = "RC_M1_SAA", deserialize_with = "deserialize_bin_label")]
    pub sales_bin: Option<String>,
    #[serde(default, alias = "RC_M1_TO_UE_CT", deserialize_with = "deserialize_bin_label")]
    pub txn_count_bin: Option<String>,
    #[serde(default, alias = "RC_M1_UE_CUS_CN", deserialize_with = "deserialize_bin_label")]
    pub customer_count_bin: Option<String>,
    #[serde(default, alias = "RC_M1_AV_NP_AT", deserialize_with = "deserialize_bin_label")]
    pub avg_ticket_bin: Option<String>,
    #[serde(default, alias = "APV_CE_RAT", deserialize_with = "deserialize_bin_label")]
    pub cancel_rate_bin: Option<String>,
    /// Overrides the profile's business-age bin when present.
    #[serde(default, alias = "MCT_OPE_MS_CN", deserialize_with = "deserialize_bin_label")]
    pub business_age_bin: Option<String>,

    /// Delivery share of sales, percent.
    #[serde(default, alias = "DLV_SAA_RAT", deserialize_with = "deserialize_lenient_f64")]
    pub delivery_share: Option<f64>,
    /// Sales percentile within the industry peer group, percent.
    #[serde(default, alias = "M12_SME_RY_SAA_PCE_RT", deserialize_with = "deserialize_lenient_f64")]
    pub industry_peer_pct: Option<f64>,
    /// Sales percentile within the zone peer group, percent.
    #[serde(default, alias = "M12_SME_BZN_SAA_PCE_RT", deserialize_with = "deserialize_lenient_f64")]
    pub zone_peer_pct: Option<f64>,
    /// Own revenue relative to the industry, percent.
    #[serde(default, alias = "M1_SME_RY_SAA_RAT", deserialize_with = "deserialize_lenient_f64")]
    pub industry_revenue_pct: Option<f64>,
    /// Own transaction count relative to the industry, percent.
    #[serde(default, alias = "M1_SME_RY_CNT_RAT", deserialize_with = "deserialize_lenient_f64")]
    pub industry_count_pct: Option<f64>,
    /// Closure rate of merchants in the same industry, percent.
    #[serde(default, alias = "M12_SME_RY_ME_MCT_RAT", deserialize_with = "deserialize_lenient_f64")]
    pub industry_closure_pct: Option<f64>,
    /// Closure rate of merchants in the same zone, percent.
    #[serde(default, alias = "M12_SME_BZN_ME_MCT_RAT", deserialize_with = "deserialize_lenient_f64")]
    pub zone_closure_pct: Option<f64>,
}

/// Monthly customer panel. Shares and ratios are percents.
///
/// Share columns load either as arrays or as the individual source columns
/// (`M12_MAL_1020_RAT`, `RC_M1_SHC_RSD_UE_CLN_RAT`, ...). An array entry wins
/// over the matching column when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "CustomerRecordRepr")]
pub struct CustomerRecord {
    pub merchant_id: String,
    pub year_month: String,

    /// Male 10-20s, 30s, 40s, 50s, 60+, then female in the same order.
    pub age_gender_shares: [Option<f64>; AGE_GENDER_SHARES],
    pub repeat_ratio: Option<f64>,
    pub new_ratio: Option<f64>,
    /// Residents, workers, floating visitors.
    pub visitor_type_shares: [Option<f64>; VISITOR_TYPE_SHARES],
}

#[derive(Deserialize)]
struct CustomerRecordRepr {
    #[serde(default, alias = "ENCODED_MCT")]
    merchant_id: String,
    #[serde(default, alias = "TA_YM", deserialize_with = "deserialize_month_repr")]
    year_month: String,

    #[serde(default)]
    age_gender_shares: Option<[Option<f64>; AGE_GENDER_SHARES]>,
    #[serde(default, alias = "MCT_UE_CLN_REU_RAT", deserialize_with = "deserialize_lenient_f64")]
    repeat_ratio: Option<f64>,
    #[serde(default, alias = "MCT_UE_CLN_NEW_RAT", deserialize_with = "deserialize_lenient_f64")]
    new_ratio: Option<f64>,
    #[serde(default)]
    visitor_type_shares: Option<[Option<f64>; VISITOR_TYPE_SHARES]>,

    #[serde(default, rename = "M12_MAL_1020_RAT", deserialize_with = "deserialize_lenient_f64")]
    male_1020: Option<f64>,
    #[serde(default, rename = "M12_MAL_30_RAT", deserialize_with = "deserialize_lenient_f64")]
    male_30: Option<f64>,
    #[serde(default, rename = "M12_MAL_40_RAT", deserialize_with = "deserialize_lenient_f64")]
    male_40: Option<f64>,
    #[serde(default, rename = "M12_MAL_50_RAT", deserialize_with = "deserialize_lenient_f64")]
    male_50: Option<f64>,
    #[serde(default, rename = "M12_MAL_60_RAT", deserialize_with = "deserialize_lenient_f64")]
    male_60: Option<f64>,
    #[serde(default, rename = "M12_FME_1020_RAT", deserialize_with = "deserialize_lenient_f64")]
    female_1020: Option<f64>,
    #[serde(default, rename = "M12_FME_30_RAT", deserialize_with = "deserialize_lenient_f64")]
    female_30: Option<f64>,
    #[serde(default, rename = "M12_FME_40_RAT", deserialize_with = "deserialize_lenient_f64")]
    female_40: Option<f64>,
    #[serde(default, rename = "M12_FME_50_RAT", deserialize_with = "deserialize_lenient_f64")]
    female_50: Option<f64>,
    #[serde(default, rename = "M12_FME_60_RAT", deserialize_with = "deserialize_lenient_f64")]
    female_60: Option<f64>,

    #[serde(default, rename = "RC_M1_SHC_RSD_UE_CLN_RAT", deserialize_with = "deserialize_lenient_f64")]
    residents: Option<f64>,
    #[serde(default, rename = "RC_M1_SHC_WP_UE_CLN_RAT", deserialize_with = "deserialize_lenient_f64")]
    workers: Option<f64>,
    #[serde(default, rename = "RC_M1_SHC_FLP_UE_CLN_RAT", deserialize_with = "deserialize_lenient_f64")]
    floating: Option<f64>,
}

/// Array slots that are still empty take the matching column value.
fn fill_shares<const N: usize>(array: Option<[Option<f64>; N]>, columns: [Option<f64>; N]) -> [Option<f64>; N] {
    let mut shares = array.unwrap_or([None; N]);
    for (slot, column) in shares.iter_mut().zip(columns) {
        if slot.is_none() {
            *slot = column;
        }
    }
    shares
}

impl From<CustomerRecordRepr> for CustomerRecord {
    fn from(r: CustomerRecordRepr) -> Self {
        let age_gender_columns = [
            r.male_1020, r.male_30, r.male_40, r.male_50, r.male_60,
            r.female_1020, r.female_30, r.female_40, r.female_50, r.female_60,
        ];
        Self {
            merchant_id: r.merchant_id,
            year_month: r.year_month,
            age_gender_shares: fill_shares(r.age_gender_shares, age_gender_columns),
            repeat_ratio: r.repeat_ratio,
            new_ratio: r.new_ratio,
            visitor_type_shares: fill_shares(r.visitor_type_shares, [r.residents, r.workers, r.floating]),
        }
    }
}

/// Optional external model probabilities for one merchant-month.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalPrediction {
    #[serde(default, alias = "ENCODED_MCT")]
    pub merchant_id: String,
    #[serde(default, alias = "TA_YM", deserialize_with = "deserialize_month_repr")]
    pub year_month: String,

    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub pred_xgb: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub pred_lgbm: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub pred_rf: Option<f64>,
    #[serde(default, alias = "pred_gbdt", deserialize_with = "deserialize_lenient_f64")]
    pub pred_gb: Option<f64>,
    #[serde(default, alias = "pred_nn", deserialize_with = "deserialize_lenient_f64")]
    pub pred_dl: Option<f64>,
}

/// Observed outcome for one merchant-month, used to fit calibration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalibrationLabel {
    #[serde(default, alias = "ENCODED_MCT")]
    pub merchant_id: String,
    #[serde(default, alias = "TA_YM", deserialize_with = "deserialize_month_repr")]
    pub year_month: String,
    #[serde(alias = "y")]
    pub label: f64,
}
