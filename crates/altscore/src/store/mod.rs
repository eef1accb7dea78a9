//! Append-only record store over a flat CSV file.
//!
//! The store assumes a single active writer; there is no locking and concurrent
//! writers would race. Every mutation reads the file fully and replaces it via a
//! write-temp-then-rename so a crash mid-write leaves the previous contents intact.
//! Historical cells are rebuilt leniently on scan; that relaxation exists for
//! display surfaces only, never for fresh scoring input.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::scoring::features::{normalize_lenient, FeatureRecord, RawApplicant};

/// Fixed column schema of the persisted file. First row is always this header.
pub const STORE_COLUMNS: [&str; 13] = [
    "user_id",
    "employment_type",
    "income_range",
    "city_tier",
    "bank_account_age_months",
    "num_bank_accounts",
    "monthly_income",
    "rent_paid_on_time",
    "utility_delay_days",
    "upi_txn_count",
    "avg_month_end_balance",
    "overdraft_event",
    "alt_credit_score",
];

const USER_ID_PREFIX: &str = "USER_";

/// One persisted submission: the feature record plus its assigned identifier and the
/// final score it earned. Never mutated after append.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub user_id: String,
    pub features: FeatureRecord,
    pub alt_credit_score: u8,
}

/// Derives the next identifier from the last stored one: trailing digits plus one,
/// zero-padded to four places. Not a global counter; uniqueness is advisory.
pub fn next_user_id(last: Option<&str>) -> String {
    let sequence = last
        .and_then(|id| {
            let digits: String = id
                .chars()
                .rev()
                .take_while(|c| c.is_ascii_digit())
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            digits.parse::<u32>().ok()
        })
        .map(|n| n + 1)
        .unwrap_or(1);
    format!("{USER_ID_PREFIX}{sequence:04}")
}

/// Storage abstraction so the service layer can be exercised against an in-memory
/// double under test.
pub trait RecordStore: Send + Sync {
    /// Creates an empty store with the fixed header if none exists. Idempotent.
    fn ensure_store(&self) -> Result<(), StoreError>;
    /// Adds one row. Duplicate identifiers are never rejected.
    fn append(&self, record: &StoredRecord) -> Result<(), StoreError>;
    /// Deletes the most recently appended row, returning its identifier. Warns and
    /// no-ops when the store is empty.
    fn remove_last(&self) -> Result<Option<String>, StoreError>;
    /// All rows in storage order. Callers re-sort as needed.
    fn scan(&self) -> Result<Vec<StoredRecord>, StoreError>;
    /// Identifier of the last stored row, if any.
    fn last_user_id(&self) -> Result<Option<String>, StoreError>;
}

/// Failure reading or writing the persisted file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access record store at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse record store at {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// CSV-file backed implementation.
pub struct CsvRecordStore {
    path: PathBuf,
}

impl CsvRecordStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_err(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            path: self.path.clone(),
            source,
        }
    }

    /// Raw rows as stored, header excluded. A missing file reads as empty.
    fn read_rows(&self) -> Result<Vec<CsvRow>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path).map_err(|err| self.csv_err(err))?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| self.csv_err(err))?;
            rows.push(CsvRow::from_string_record(&record));
        }
        Ok(rows)
    }

    /// Serializes header plus rows and atomically replaces the store file.
    fn write_rows(&self, rows: &[CsvRow]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_err(err))?;
            }
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(STORE_COLUMNS)
            .map_err(|err| self.csv_err(err))?;
        for row in rows {
            writer
                .write_record(row.fields())
                .map_err(|err| self.csv_err(err))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| self.io_err(err.into_error()))?;

        let tmp = self.path.with_extension("csv.tmp");
        fs::write(&tmp, bytes).map_err(|err| self.io_err(err))?;
        fs::rename(&tmp, &self.path).map_err(|err| self.io_err(err))
    }
}

impl RecordStore for CsvRecordStore {
    fn ensure_store(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Ok(());
        }
        self.write_rows(&[])
    }

    fn append(&self, record: &StoredRecord) -> Result<(), StoreError> {
        let mut rows = self.read_rows()?;
        rows.push(CsvRow::from_stored(record));
        self.write_rows(&rows)
    }

    fn remove_last(&self) -> Result<Option<String>, StoreError> {
        let mut rows = self.read_rows()?;
        match rows.pop() {
            Some(removed) => {
                self.write_rows(&rows)?;
                Ok(Some(removed.user_id))
            }
            None => {
                warn!(path = %self.path.display(), "remove_last on empty record store");
                Ok(None)
            }
        }
    }

    fn scan(&self) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self.read_rows()?.iter().map(CsvRow::to_stored).collect())
    }

    fn last_user_id(&self) -> Result<Option<String>, StoreError> {
        Ok(self.read_rows()?.pop().map(|row| row.user_id))
    }
}

/// One stored row in its raw string form, so rewrites never reinterpret cells that a
/// previous writer produced.
#[derive(Debug, Clone)]
struct CsvRow {
    user_id: String,
    employment_type: String,
    income_range: String,
    city_tier: String,
    bank_account_age_months: String,
    num_bank_accounts: String,
    monthly_income: String,
    rent_paid_on_time: String,
    utility_delay_days: String,
    upi_txn_count: String,
    avg_month_end_balance: String,
    overdraft_event: String,
    alt_credit_score: String,
}

impl CsvRow {
    fn from_string_record(record: &csv::StringRecord) -> Self {
        let cell = |index: usize| record.get(index).unwrap_or_default().to_string();
        Self {
            user_id: cell(0),
            employment_type: cell(1),
            income_range: cell(2),
            city_tier: cell(3),
            bank_account_age_months: cell(4),
            num_bank_accounts: cell(5),
            monthly_income: cell(6),
            rent_paid_on_time: cell(7),
            utility_delay_days: cell(8),
            upi_txn_count: cell(9),
            avg_month_end_balance: cell(10),
            overdraft_event: cell(11),
            alt_credit_score: cell(12),
        }
    }

    fn from_stored(record: &StoredRecord) -> Self {
        let features = &record.features;
        Self {
            user_id: record.user_id.clone(),
            employment_type: features.employment_type.as_str().to_string(),
            income_range: features.income_range.as_str().to_string(),
            city_tier: features.city_tier.to_string(),
            bank_account_age_months: features.bank_account_age_months.to_string(),
            num_bank_accounts: features.num_bank_accounts.to_string(),
            monthly_income: features.monthly_income.to_string(),
            rent_paid_on_time: features.rent_paid_on_time.to_string(),
            utility_delay_days: features.utility_delay_days.to_string(),
            upi_txn_count: features.upi_txn_count.to_string(),
            avg_month_end_balance: features.avg_month_end_balance.to_string(),
            overdraft_event: i64::from(features.overdraft_event).to_string(),
            alt_credit_score: record.alt_credit_score.to_string(),
        }
    }

    /// Historical rows rebuild through the lenient normalizer: a junk cell becomes a
    /// documented default instead of poisoning the scan.
    fn to_stored(&self) -> StoredRecord {
        let raw = RawApplicant {
            employment_type: self.employment_type.clone(),
            income_range: self.income_range.clone(),
            city_tier: self.city_tier.clone(),
            bank_account_age_months: self.bank_account_age_months.clone(),
            num_bank_accounts: self.num_bank_accounts.clone(),
            monthly_income: self.monthly_income.clone(),
            pays_rent: "yes".to_string(),
            rent_paid_on_time: self.rent_paid_on_time.clone(),
            utility_delay_days: self.utility_delay_days.clone(),
            upi_txn_count: self.upi_txn_count.clone(),
            avg_month_end_balance: self.avg_month_end_balance.clone(),
            overdraft_event: self.overdraft_event.clone(),
        };
        let score = self
            .alt_credit_score
            .trim()
            .parse::<u8>()
            .ok()
            .or_else(|| {
                self.alt_credit_score
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .map(|v| v.clamp(0.0, 100.0).round() as u8)
            })
            .unwrap_or(0);
        StoredRecord {
            user_id: self.user_id.clone(),
            features: normalize_lenient(&raw),
            alt_credit_score: score,
        }
    }

    fn fields(&self) -> [&str; 13] {
        [
            &self.user_id,
            &self.employment_type,
            &self.income_range,
            &self.city_tier,
            &self.bank_account_age_months,
            &self.num_bank_accounts,
            &self.monthly_income,
            &self.rent_paid_on_time,
            &self.utility_delay_days,
            &self.upi_txn_count,
            &self.avg_month_end_balance,
            &self.overdraft_event,
            &self.alt_credit_score,
        ]
    }
}
