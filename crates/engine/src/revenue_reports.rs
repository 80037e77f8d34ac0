//! Monthly revenue reports.
//!
//! One report per `(company_id, report_year, report_month)`. The figures are
//! frozen at creation; only the review fields move afterwards:
//!
//! ```text
//! PENDING_REVIEW ──┬──> VERIFIED
//!                  └──> REJECTED
//! AUTO_VERIFIED  ──┬──> VERIFIED
//!                  └──> REJECTED
//! ```

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ProfitDistribution, RevenueInputs};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    PendingReview,
    AutoVerified,
    Verified,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingReview => "PENDING_REVIEW",
            Self::AutoVerified => "AUTO_VERIFIED",
            Self::Verified => "VERIFIED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Status a freshly calculated report starts in.
    pub fn initial(anomaly_count: u64) -> Self {
        if anomaly_count > 0 {
            Self::PendingReview
        } else {
            Self::AutoVerified
        }
    }
}

impl TryFrom<&str> for ReportStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING_REVIEW" => Ok(Self::PendingReview),
            "AUTO_VERIFIED" => Ok(Self::AutoVerified),
            "VERIFIED" => Ok(Self::Verified),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(EngineError::InvalidValue(format!(
                "invalid report status: {other}"
            ))),
        }
    }
}

/// Outcome an administrator can record on a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Verified,
    Rejected,
}

impl From<ReviewDecision> for ReportStatus {
    fn from(value: ReviewDecision) -> Self {
        match value {
            ReviewDecision::Verified => Self::Verified,
            ReviewDecision::Rejected => Self::Rejected,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueReport {
    pub id: Uuid,
    pub company_id: String,
    pub report_year: i32,
    pub report_month: u32,
    pub inputs: RevenueInputs,
    pub distribution: ProfitDistribution,
    pub total_shares: u64,
    pub status: ReportStatus,
    pub transaction_count: u64,
    pub anomaly_count: u64,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verification_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "revenue_reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: String,
    pub report_year: i32,
    pub report_month: i32,
    pub total_deposits_minor: i64,
    pub total_withdrawals_minor: i64,
    pub operating_costs_minor: i64,
    pub other_expenses_minor: i64,
    pub manual_adjustments_minor: i64,
    pub net_revenue_minor: i64,
    pub platform_fee_minor: i64,
    pub net_profit_minor: i64,
    pub dividend_pool_minor: i64,
    pub reinvestment_minor: i64,
    pub dividend_per_share_minor: i64,
    pub total_shares: i64,
    pub status: String,
    pub transaction_count: i64,
    pub anomaly_count: i64,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTimeUtc>,
    pub verification_notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

fn to_i64(value: u64, label: &str) -> Result<i64, EngineError> {
    i64::try_from(value).map_err(|_| EngineError::InvalidAmount(format!("{label} too large")))
}

fn to_u64(value: i64, label: &str) -> Result<u64, EngineError> {
    u64::try_from(value).map_err(|_| EngineError::InvalidAmount(format!("{label} is negative")))
}

impl TryFrom<&RevenueReport> for ActiveModel {
    type Error = EngineError;

    fn try_from(report: &RevenueReport) -> Result<Self, Self::Error> {
        let month = i32::try_from(report.report_month)
            .map_err(|_| EngineError::InvalidPeriod(report.report_month.to_string()))?;
        Ok(Self {
            id: ActiveValue::Set(report.id),
            company_id: ActiveValue::Set(report.company_id.clone()),
            report_year: ActiveValue::Set(report.report_year),
            report_month: ActiveValue::Set(month),
            total_deposits_minor: ActiveValue::Set(report.inputs.total_deposits.minor()),
            total_withdrawals_minor: ActiveValue::Set(report.inputs.total_withdrawals.minor()),
            operating_costs_minor: ActiveValue::Set(report.inputs.operating_costs.minor()),
            other_expenses_minor: ActiveValue::Set(report.inputs.other_expenses.minor()),
            manual_adjustments_minor: ActiveValue::Set(report.inputs.manual_adjustments.minor()),
            net_revenue_minor: ActiveValue::Set(report.distribution.net_revenue.minor()),
            platform_fee_minor: ActiveValue::Set(report.distribution.platform_fee.minor()),
            net_profit_minor: ActiveValue::Set(report.distribution.net_profit.minor()),
            dividend_pool_minor: ActiveValue::Set(report.distribution.dividend_pool.minor()),
            reinvestment_minor: ActiveValue::Set(report.distribution.reinvestment_amount.minor()),
            dividend_per_share_minor: ActiveValue::Set(
                report.distribution.dividend_per_share.minor(),
            ),
            total_shares: ActiveValue::Set(to_i64(report.total_shares, "total_shares")?),
            status: ActiveValue::Set(report.status.as_str().to_string()),
            transaction_count: ActiveValue::Set(to_i64(
                report.transaction_count,
                "transaction_count",
            )?),
            anomaly_count: ActiveValue::Set(to_i64(report.anomaly_count, "anomaly_count")?),
            verified_by: ActiveValue::Set(report.verified_by.clone()),
            verified_at: ActiveValue::Set(report.verified_at),
            verification_notes: ActiveValue::Set(report.verification_notes.clone()),
            created_at: ActiveValue::Set(report.created_at),
            updated_at: ActiveValue::Set(report.updated_at),
        })
    }
}

impl TryFrom<Model> for RevenueReport {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            company_id: model.company_id,
            report_year: model.report_year,
            report_month: u32::try_from(model.report_month)
                .map_err(|_| EngineError::InvalidPeriod(model.report_month.to_string()))?,
            inputs: RevenueInputs {
                total_deposits: Money::new(model.total_deposits_minor),
                total_withdrawals: Money::new(model.total_withdrawals_minor),
                operating_costs: Money::new(model.operating_costs_minor),
                other_expenses: Money::new(model.other_expenses_minor),
                manual_adjustments: Money::new(model.manual_adjustments_minor),
            },
            distribution: ProfitDistribution {
                net_revenue: Money::new(model.net_revenue_minor),
                platform_fee: Money::new(model.platform_fee_minor),
                net_profit: Money::new(model.net_profit_minor),
                dividend_pool: Money::new(model.dividend_pool_minor),
                reinvestment_amount: Money::new(model.reinvestment_minor),
                dividend_per_share: Money::new(model.dividend_per_share_minor),
            },
            total_shares: to_u64(model.total_shares, "total_shares")?,
            status: ReportStatus::try_from(model.status.as_str())?,
            transaction_count: to_u64(model.transaction_count, "transaction_count")?,
            anomaly_count: to_u64(model.anomaly_count, "anomaly_count")?,
            verified_by: model.verified_by,
            verified_at: model.verified_at,
            verification_notes: model.verification_notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anomalies_force_pending_review() {
        assert_eq!(ReportStatus::initial(0), ReportStatus::AutoVerified);
        assert_eq!(ReportStatus::initial(1), ReportStatus::PendingReview);
        assert_eq!(ReportStatus::initial(42), ReportStatus::PendingReview);
    }

    #[test]
    fn status_parsing_is_case_insensitive() {
        assert_eq!(
            ReportStatus::try_from("pending_review").unwrap(),
            ReportStatus::PendingReview
        );
        assert!(matches!(
            ReportStatus::try_from("approved"),
            Err(EngineError::InvalidValue(_))
        ));
    }
}
