//! Per-run sync history.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl TryFrom<&str> for SyncStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(EngineError::InvalidValue(format!(
                "invalid sync status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub id: Uuid,
    pub company_id: String,
    pub bank_account_id: String,
    pub status: SyncStatus,
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
    pub pages_fetched: u32,
    pub transactions_fetched: u64,
    pub transactions_inserted: u64,
    pub transactions_updated: u64,
    pub transactions_skipped: u64,
    /// Skips decided on the fallback key rather than a bank reference.
    pub low_confidence_matches: u64,
    pub total_deposits: Money,
    pub total_withdrawals: Money,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl SyncResult {
    pub(crate) fn start(
        company_id: &str,
        bank_account_id: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_id: company_id.to_string(),
            bank_account_id: bank_account_id.to_string(),
            status: SyncStatus::Completed,
            from_date,
            to_date,
            pages_fetched: 0,
            transactions_fetched: 0,
            transactions_inserted: 0,
            transactions_updated: 0,
            transactions_skipped: 0,
            low_confidence_matches: 0,
            total_deposits: Money::ZERO,
            total_withdrawals: Money::ZERO,
            errors: Vec::new(),
            warnings: Vec::new(),
            started_at: now,
            completed_at: now,
        }
    }

    /// Marks the run failed, keeping the counters accumulated so far.
    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.status = SyncStatus::Failed;
        self.errors.push(error.into());
    }

    pub fn is_completed(&self) -> bool {
        self.status == SyncStatus::Completed
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_results")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: String,
    pub bank_account_id: String,
    pub status: String,
    pub from_date: DateTimeUtc,
    pub to_date: DateTimeUtc,
    pub pages_fetched: i64,
    pub transactions_fetched: i64,
    pub transactions_inserted: i64,
    pub transactions_updated: i64,
    pub transactions_skipped: i64,
    pub low_confidence_matches: i64,
    pub total_deposits_minor: i64,
    pub total_withdrawals_minor: i64,
    /// JSON array of strings.
    pub errors: String,
    /// JSON array of strings.
    pub warnings: String,
    pub started_at: DateTimeUtc,
    pub completed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

fn count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn uncount(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

impl TryFrom<&SyncResult> for ActiveModel {
    type Error = EngineError;

    fn try_from(result: &SyncResult) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ActiveValue::Set(result.id),
            company_id: ActiveValue::Set(result.company_id.clone()),
            bank_account_id: ActiveValue::Set(result.bank_account_id.clone()),
            status: ActiveValue::Set(result.status.as_str().to_string()),
            from_date: ActiveValue::Set(result.from_date),
            to_date: ActiveValue::Set(result.to_date),
            pages_fetched: ActiveValue::Set(i64::from(result.pages_fetched)),
            transactions_fetched: ActiveValue::Set(count(result.transactions_fetched)),
            transactions_inserted: ActiveValue::Set(count(result.transactions_inserted)),
            transactions_updated: ActiveValue::Set(count(result.transactions_updated)),
            transactions_skipped: ActiveValue::Set(count(result.transactions_skipped)),
            low_confidence_matches: ActiveValue::Set(count(result.low_confidence_matches)),
            total_deposits_minor: ActiveValue::Set(result.total_deposits.minor()),
            total_withdrawals_minor: ActiveValue::Set(result.total_withdrawals.minor()),
            errors: ActiveValue::Set(serde_json::to_string(&result.errors)?),
            warnings: ActiveValue::Set(serde_json::to_string(&result.warnings)?),
            started_at: ActiveValue::Set(result.started_at),
            completed_at: ActiveValue::Set(result.completed_at),
        })
    }
}

impl TryFrom<Model> for SyncResult {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            company_id: model.company_id,
            bank_account_id: model.bank_account_id,
            status: SyncStatus::try_from(model.status.as_str())?,
            from_date: model.from_date,
            to_date: model.to_date,
            pages_fetched: u32::try_from(model.pages_fetched).unwrap_or_default(),
            transactions_fetched: uncount(model.transactions_fetched),
            transactions_inserted: uncount(model.transactions_inserted),
            transactions_updated: uncount(model.transactions_updated),
            transactions_skipped: uncount(model.transactions_skipped),
            low_confidence_matches: uncount(model.low_confidence_matches),
            total_deposits: Money::new(model.total_deposits_minor),
            total_withdrawals: Money::new(model.total_withdrawals_minor),
            errors: serde_json::from_str(&model.errors)?,
            warnings: serde_json::from_str(&model.warnings)?,
            started_at: model.started_at,
            completed_at: model.completed_at,
        })
    }
}
