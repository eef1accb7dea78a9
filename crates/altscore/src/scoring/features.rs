//! Feature normalization: raw form widgets and historical CSV cells into the typed
//! record the model artifacts were trained against.
//!
//! Two named paths on purpose. `normalize_strict` guards fresh submissions and fails on
//! the first missing or uncoercible field. `normalize_lenient` rebuilds historical rows
//! for dashboard re-predictions only, substituting documented defaults so one bad cell
//! never blanks the whole view. Collapsing them would let bad fresh input slip through.

use serde::{Deserialize, Serialize};

/// Employment category the classifier was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    Gig,
    Salaried,
    SelfEmployed,
}

impl EmploymentType {
    /// Case-, space-, and hyphen-insensitive parse against the known category set.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "gig" => Some(Self::Gig),
            "salaried" => Some(Self::Salaried),
            "self_employed" => Some(Self::SelfEmployed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gig => "gig",
            Self::Salaried => "salaried",
            Self::SelfEmployed => "self_employed",
        }
    }
}

/// Monthly income bracket, carried as the canonical range string the models expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncomeRange {
    #[serde(rename = "0-15000")]
    UpTo15000,
    #[serde(rename = "10000-30000")]
    From10000To30000,
    #[serde(rename = "30000-50000")]
    From30000To50000,
    #[serde(rename = "50000-100000")]
    From50000To100000,
}

impl IncomeRange {
    pub fn parse(raw: &str) -> Option<Self> {
        let compact: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        match compact.as_str() {
            "0-15000" => Some(Self::UpTo15000),
            "10000-30000" => Some(Self::From10000To30000),
            "30000-50000" => Some(Self::From30000To50000),
            "50000-100000" => Some(Self::From50000To100000),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpTo15000 => "0-15000",
            Self::From10000To30000 => "10000-30000",
            Self::From30000To50000 => "30000-50000",
            Self::From50000To100000 => "50000-100000",
        }
    }
}

/// One applicant's snapshot in the exact shape the model artifacts consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub employment_type: EmploymentType,
    pub income_range: IncomeRange,
    pub city_tier: u8,
    pub bank_account_age_months: u32,
    pub num_bank_accounts: u32,
    pub monthly_income: f64,
    pub rent_paid_on_time: f64,
    pub utility_delay_days: f64,
    pub upi_txn_count: f64,
    pub avg_month_end_balance: f64,
    pub overdraft_event: bool,
}

/// Loosely-typed applicant input as it arrives from form widgets or historical CSV
/// cells. Everything is a string; the normalizer owns all coercion. `pays_rent` is a
/// form-only toggle and never reaches the models.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawApplicant {
    #[serde(default)]
    pub employment_type: String,
    #[serde(default)]
    pub income_range: String,
    #[serde(default)]
    pub city_tier: String,
    #[serde(default)]
    pub bank_account_age_months: String,
    #[serde(default)]
    pub num_bank_accounts: String,
    #[serde(default)]
    pub monthly_income: String,
    #[serde(default)]
    pub pays_rent: String,
    #[serde(default)]
    pub rent_paid_on_time: String,
    #[serde(default)]
    pub utility_delay_days: String,
    #[serde(default)]
    pub upi_txn_count: String,
    #[serde(default)]
    pub avg_month_end_balance: String,
    #[serde(default)]
    pub overdraft_event: String,
}

/// Rejection of a fresh submission, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' has invalid value '{value}': expected {expected}")]
    InvalidField {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Defaults used by the lenient path when a historical cell cannot be coerced.
pub mod lenient_defaults {
    use super::{EmploymentType, IncomeRange};

    pub const EMPLOYMENT_TYPE: EmploymentType = EmploymentType::Salaried;
    pub const INCOME_RANGE: IncomeRange = IncomeRange::From10000To30000;
    pub const CITY_TIER: u8 = 2;
    pub const BANK_ACCOUNT_AGE_MONTHS: u32 = 24;
    pub const NUM_BANK_ACCOUNTS: u32 = 2;
    pub const MONTHLY_INCOME: f64 = 30_000.0;
    pub const RENT_PAID_ON_TIME: f64 = 1.0;
    pub const UTILITY_DELAY_DAYS: f64 = 0.0;
    pub const UPI_TXN_COUNT: f64 = 20.0;
    pub const AVG_MONTH_END_BALANCE: f64 = 5_000.0;
    pub const OVERDRAFT_EVENT: bool = false;
}

/// Strict coercion for fresh submissions: every field present and parseable or the
/// whole request fails. When the applicant does not pay rent, `rent_paid_on_time` is
/// forced to 1.0 (neutral) no matter what the raw field holds.
pub fn normalize_strict(raw: &RawApplicant) -> Result<FeatureRecord, ValidationError> {
    let employment_type = parse_category(
        "employment_type",
        &raw.employment_type,
        EmploymentType::parse,
        "one of gig, salaried, self_employed",
    )?;
    let income_range = parse_category(
        "income_range",
        &raw.income_range,
        IncomeRange::parse,
        "one of 0-15000, 10000-30000, 30000-50000, 50000-100000",
    )?;

    let city_tier = parse_int("city_tier", &raw.city_tier)?;
    if !(1..=3).contains(&city_tier) {
        return Err(ValidationError::InvalidField {
            field: "city_tier",
            value: raw.city_tier.trim().to_string(),
            expected: "an integer between 1 and 3",
        });
    }

    let bank_account_age_months = parse_int("bank_account_age_months", &raw.bank_account_age_months)?;
    let num_bank_accounts = parse_int("num_bank_accounts", &raw.num_bank_accounts)?;
    if num_bank_accounts < 1 {
        return Err(ValidationError::InvalidField {
            field: "num_bank_accounts",
            value: raw.num_bank_accounts.trim().to_string(),
            expected: "a positive integer",
        });
    }

    let monthly_income = parse_real("monthly_income", &raw.monthly_income)?;
    let utility_delay_days = parse_real("utility_delay_days", &raw.utility_delay_days)?;
    let upi_txn_count = parse_real("upi_txn_count", &raw.upi_txn_count)?;
    let avg_month_end_balance = parse_real("avg_month_end_balance", &raw.avg_month_end_balance)?;

    let pays_rent = parse_flag("pays_rent", &raw.pays_rent)?;
    let rent_paid_on_time = if pays_rent {
        let ratio = parse_real("rent_paid_on_time", &raw.rent_paid_on_time)?;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(ValidationError::InvalidField {
                field: "rent_paid_on_time",
                value: raw.rent_paid_on_time.trim().to_string(),
                expected: "a ratio between 0.0 and 1.0",
            });
        }
        ratio
    } else {
        // No rent obligation: treated as neutral/perfect payment behavior.
        1.0
    };

    let overdraft_event = parse_flag("overdraft_event", &raw.overdraft_event)?;

    Ok(FeatureRecord {
        employment_type,
        income_range,
        city_tier: city_tier as u8,
        bank_account_age_months,
        num_bank_accounts,
        monthly_income,
        rent_paid_on_time,
        utility_delay_days,
        upi_txn_count,
        avg_month_end_balance,
        overdraft_event,
    })
}

/// Best-effort coercion for historical-row rebuilds. Display-only: the dashboard uses
/// this to re-predict stored rows, and a junk cell falls back to a documented default
/// instead of failing the whole page. Never used for fresh submissions.
pub fn normalize_lenient(raw: &RawApplicant) -> FeatureRecord {
    let employment_type =
        EmploymentType::parse(&raw.employment_type).unwrap_or(lenient_defaults::EMPLOYMENT_TYPE);
    let income_range =
        IncomeRange::parse(&raw.income_range).unwrap_or(lenient_defaults::INCOME_RANGE);

    let city_tier = lenient_int(&raw.city_tier)
        .filter(|tier| (1..=3).contains(tier))
        .unwrap_or(lenient_defaults::CITY_TIER as u32) as u8;
    let bank_account_age_months = lenient_int(&raw.bank_account_age_months)
        .unwrap_or(lenient_defaults::BANK_ACCOUNT_AGE_MONTHS);
    let num_bank_accounts = lenient_int(&raw.num_bank_accounts)
        .filter(|count| *count >= 1)
        .unwrap_or(lenient_defaults::NUM_BANK_ACCOUNTS);

    let monthly_income =
        lenient_real(&raw.monthly_income).unwrap_or(lenient_defaults::MONTHLY_INCOME);
    let utility_delay_days =
        lenient_real(&raw.utility_delay_days).unwrap_or(lenient_defaults::UTILITY_DELAY_DAYS);
    let upi_txn_count = lenient_real(&raw.upi_txn_count).unwrap_or(lenient_defaults::UPI_TXN_COUNT);
    let avg_month_end_balance = lenient_real(&raw.avg_month_end_balance)
        .unwrap_or(lenient_defaults::AVG_MONTH_END_BALANCE);

    let rent_paid_on_time = if lenient_flag(&raw.pays_rent) == Some(false) {
        1.0
    } else {
        lenient_real(&raw.rent_paid_on_time)
            .map(|ratio| ratio.clamp(0.0, 1.0))
            .unwrap_or(lenient_defaults::RENT_PAID_ON_TIME)
    };

    let overdraft_event =
        lenient_flag(&raw.overdraft_event).unwrap_or(lenient_defaults::OVERDRAFT_EVENT);

    FeatureRecord {
        employment_type,
        income_range,
        city_tier,
        bank_account_age_months,
        num_bank_accounts,
        monthly_income,
        rent_paid_on_time,
        utility_delay_days,
        upi_txn_count,
        avg_month_end_balance,
        overdraft_event,
    }
}

fn parse_category<T>(
    field: &'static str,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
    expected: &'static str,
) -> Result<T, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    parse(trimmed).ok_or_else(|| ValidationError::InvalidField {
        field,
        value: trimmed.to_string(),
        expected,
    })
}

fn parse_int(field: &'static str, raw: &str) -> Result<u32, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidField {
            field,
            value: trimmed.to_string(),
            expected: "a non-negative integer",
        })
}

fn parse_real(field: &'static str, raw: &str) -> Result<f64, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    let value = trimmed
        .parse::<f64>()
        .map_err(|_| ValidationError::InvalidField {
            field,
            value: trimmed.to_string(),
            expected: "a non-negative real number",
        })?;
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidField {
            field,
            value: trimmed.to_string(),
            expected: "a non-negative real number",
        });
    }
    Ok(value)
}

fn parse_flag(field: &'static str, raw: &str) -> Result<bool, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    match trimmed.to_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Ok(true),
        "no" | "n" | "false" | "0" => Ok(false),
        other => Err(ValidationError::InvalidField {
            field,
            value: other.to_string(),
            expected: "yes or no",
        }),
    }
}

fn lenient_int(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    trimmed
        .parse::<u32>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().map(|v| v.max(0.0).round() as u32))
}

fn lenient_real(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn lenient_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "yes" | "y" | "true" => Some(true),
        "no" | "n" | "false" => Some(false),
        "" => None,
        other => other.parse::<f64>().ok().map(|v| v != 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_raw() -> RawApplicant {
        RawApplicant {
            employment_type: "Salaried".to_string(),
            income_range: "30000-50000".to_string(),
            city_tier: "2".to_string(),
            bank_account_age_months: "36".to_string(),
            num_bank_accounts: "2".to_string(),
            monthly_income: "42000".to_string(),
            pays_rent: "yes".to_string(),
            rent_paid_on_time: "0.9".to_string(),
            utility_delay_days: "1.5".to_string(),
            upi_txn_count: "55".to_string(),
            avg_month_end_balance: "8000".to_string(),
            overdraft_event: "no".to_string(),
        }
    }

    #[test]
    fn strict_normalizes_complete_submission() {
        let record = normalize_strict(&complete_raw()).expect("valid submission");
        assert_eq!(record.employment_type, EmploymentType::Salaried);
        assert_eq!(record.income_range, IncomeRange::From30000To50000);
        assert_eq!(record.city_tier, 2);
        assert_eq!(record.bank_account_age_months, 36);
        assert!((record.rent_paid_on_time - 0.9).abs() < f64::EPSILON);
        assert!(!record.overdraft_event);
    }

    #[test]
    fn categoricals_are_case_and_space_normalized() {
        let mut raw = complete_raw();
        raw.employment_type = "  Self Employed ".to_string();
        raw.income_range = " 30000 - 50000 ".to_string();
        let record = normalize_strict(&raw).expect("normalized categories parse");
        assert_eq!(record.employment_type, EmploymentType::SelfEmployed);
        assert_eq!(record.income_range, IncomeRange::From30000To50000);
    }

    #[test]
    fn strict_names_the_missing_field() {
        let mut raw = complete_raw();
        raw.monthly_income = String::new();
        let err = normalize_strict(&raw).expect_err("missing field fails");
        assert_eq!(err, ValidationError::MissingField("monthly_income"));
    }

    #[test]
    fn strict_rejects_out_of_range_city_tier() {
        let mut raw = complete_raw();
        raw.city_tier = "4".to_string();
        let err = normalize_strict(&raw).expect_err("tier 4 rejected");
        assert!(matches!(
            err,
            ValidationError::InvalidField {
                field: "city_tier",
                ..
            }
        ));
    }

    #[test]
    fn strict_rejects_zero_bank_accounts() {
        let mut raw = complete_raw();
        raw.num_bank_accounts = "0".to_string();
        assert!(matches!(
            normalize_strict(&raw),
            Err(ValidationError::InvalidField {
                field: "num_bank_accounts",
                ..
            })
        ));
    }

    #[test]
    fn not_paying_rent_forces_neutral_ratio_over_stale_input() {
        let mut raw = complete_raw();
        raw.pays_rent = "No".to_string();
        raw.rent_paid_on_time = "0.2".to_string();
        let record = normalize_strict(&raw).expect("rent rule applies");
        assert!((record.rent_paid_on_time - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn lenient_substitutes_documented_defaults() {
        let raw = RawApplicant {
            employment_type: "unemployed".to_string(),
            income_range: "??".to_string(),
            city_tier: "9".to_string(),
            bank_account_age_months: "n/a".to_string(),
            ..RawApplicant::default()
        };
        let record = normalize_lenient(&raw);
        assert_eq!(record.employment_type, lenient_defaults::EMPLOYMENT_TYPE);
        assert_eq!(record.income_range, lenient_defaults::INCOME_RANGE);
        assert_eq!(record.city_tier, lenient_defaults::CITY_TIER);
        assert_eq!(
            record.bank_account_age_months,
            lenient_defaults::BANK_ACCOUNT_AGE_MONTHS
        );
        assert!((record.rent_paid_on_time - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn lenient_keeps_parseable_cells() {
        let raw = RawApplicant {
            employment_type: "gig".to_string(),
            monthly_income: "12500.5".to_string(),
            overdraft_event: "1".to_string(),
            rent_paid_on_time: "0.75".to_string(),
            ..RawApplicant::default()
        };
        let record = normalize_lenient(&raw);
        assert_eq!(record.employment_type, EmploymentType::Gig);
        assert!((record.monthly_income - 12500.5).abs() < f64::EPSILON);
        assert!(record.overdraft_event);
        assert!((record.rent_paid_on_time - 0.75).abs() < f64::EPSILON);
    }
}
