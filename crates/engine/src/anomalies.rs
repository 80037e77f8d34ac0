//! Anomaly records attached to bank transactions.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

/// How urgently an anomaly needs a human. Ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// `high` and `critical` anomalies go to the review queue first.
    pub fn is_priority(self) -> bool {
        self >= Self::High
    }
}

impl TryFrom<&str> for Severity {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(EngineError::InvalidValue(format!(
                "invalid severity: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    NonPositiveAmount,
    MissingReference,
    PossibleDuplicate,
    FutureDated,
    OutsideEnvelope,
}

impl AnomalyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NonPositiveAmount => "non_positive_amount",
            Self::MissingReference => "missing_reference",
            Self::PossibleDuplicate => "possible_duplicate",
            Self::FutureDated => "future_dated",
            Self::OutsideEnvelope => "outside_envelope",
        }
    }
}

impl TryFrom<&str> for AnomalyType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "non_positive_amount" => Ok(Self::NonPositiveAmount),
            "missing_reference" => Ok(Self::MissingReference),
            "possible_duplicate" => Ok(Self::PossibleDuplicate),
            "future_dated" => Ok(Self::FutureDated),
            "outside_envelope" => Ok(Self::OutsideEnvelope),
            other => Err(EngineError::InvalidValue(format!(
                "invalid anomaly type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAnomaly {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub company_id: String,
    pub kind: AnomalyType,
    pub severity: Severity,
    pub message: String,
    pub detected_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transaction_anomalies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub company_id: String,
    pub kind: String,
    pub severity: String,
    pub message: String,
    pub detected_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Transaction,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&TransactionAnomaly> for ActiveModel {
    fn from(anomaly: &TransactionAnomaly) -> Self {
        Self {
            id: ActiveValue::Set(anomaly.id),
            transaction_id: ActiveValue::Set(anomaly.transaction_id),
            company_id: ActiveValue::Set(anomaly.company_id.clone()),
            kind: ActiveValue::Set(anomaly.kind.as_str().to_string()),
            severity: ActiveValue::Set(anomaly.severity.as_str().to_string()),
            message: ActiveValue::Set(anomaly.message.clone()),
            detected_at: ActiveValue::Set(anomaly.detected_at),
        }
    }
}

impl TryFrom<Model> for TransactionAnomaly {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            transaction_id: model.transaction_id,
            company_id: model.company_id,
            kind: AnomalyType::try_from(model.kind.as_str())?,
            severity: Severity::try_from(model.severity.as_str())?,
            message: model.message,
            detected_at: model.detected_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_are_ordered() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn only_high_and_critical_are_priority() {
        assert!(!Severity::Low.is_priority());
        assert!(!Severity::Medium.is_priority());
        assert!(Severity::High.is_priority());
        assert!(Severity::Critical.is_priority());
    }
}
