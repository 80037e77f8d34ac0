//! Bank transaction primitives.
//!
//! A `BankTransaction` is one normalized movement on a linked bank account.
//! Rows are created once by ingestion and never deleted; the category and the
//! anomaly flag are refined in place by later passes.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }

    /// Maps the gateway's vocabulary to the internal type.
    ///
    /// Gateways are not consistent about casing or abbreviations, so `CR`,
    /// `Credit`, `deposit` and friends are all accepted.
    pub fn from_gateway(value: &str) -> Result<Self, EngineError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "credit" | "cr" | "c" | "deposit" | "in" => Ok(Self::Credit),
            "debit" | "dr" | "d" | "withdrawal" | "out" => Ok(Self::Debit),
            other => Err(EngineError::InvalidValue(format!(
                "unknown transaction type: {other}"
            ))),
        }
    }
}

impl TryFrom<&str> for TransactionType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            other => Err(EngineError::InvalidValue(format!(
                "invalid transaction type: {other}"
            ))),
        }
    }
}

/// Bookkeeping category assigned to a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sales,
    Refund,
    Interest,
    Transfer,
    Payroll,
    Tax,
    BankFee,
    OperatingExpense,
    Uncategorized,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Refund => "refund",
            Self::Interest => "interest",
            Self::Transfer => "transfer",
            Self::Payroll => "payroll",
            Self::Tax => "tax",
            Self::BankFee => "bank_fee",
            Self::OperatingExpense => "operating_expense",
            Self::Uncategorized => "uncategorized",
        }
    }
}

impl TryFrom<&str> for Category {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "sales" => Ok(Self::Sales),
            "refund" => Ok(Self::Refund),
            "interest" => Ok(Self::Interest),
            "transfer" => Ok(Self::Transfer),
            "payroll" => Ok(Self::Payroll),
            "tax" => Ok(Self::Tax),
            "bank_fee" => Ok(Self::BankFee),
            "operating_expense" => Ok(Self::OperatingExpense),
            "uncategorized" => Ok(Self::Uncategorized),
            other => Err(EngineError::InvalidValue(format!(
                "invalid category: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: Uuid,
    pub company_id: String,
    pub bank_account_id: String,
    pub transaction_date: DateTime<Utc>,
    pub kind: TransactionType,
    pub amount: Money,
    pub currency: String,
    pub balance_after: Option<Money>,
    pub description: String,
    pub reference: Option<String>,
    pub bank_reference: Option<String>,
    pub category: Category,
    pub is_anomalous: bool,
    pub raw_payload: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bank_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: String,
    pub bank_account_id: String,
    pub transaction_date: DateTimeUtc,
    pub kind: String,
    pub amount_minor: i64,
    pub currency: String,
    pub balance_after_minor: Option<i64>,
    pub description: String,
    pub reference: Option<String>,
    pub bank_reference: Option<String>,
    pub category: String,
    pub is_anomalous: bool,
    pub raw_payload: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::anomalies::Entity")]
    Anomalies,
}

impl Related<super::anomalies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Anomalies.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BankTransaction> for ActiveModel {
    fn from(tx: &BankTransaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id),
            company_id: ActiveValue::Set(tx.company_id.clone()),
            bank_account_id: ActiveValue::Set(tx.bank_account_id.clone()),
            transaction_date: ActiveValue::Set(tx.transaction_date),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(tx.amount.minor()),
            currency: ActiveValue::Set(tx.currency.clone()),
            balance_after_minor: ActiveValue::Set(tx.balance_after.map(Money::minor)),
            description: ActiveValue::Set(tx.description.clone()),
            reference: ActiveValue::Set(tx.reference.clone()),
            bank_reference: ActiveValue::Set(tx.bank_reference.clone()),
            category: ActiveValue::Set(tx.category.as_str().to_string()),
            is_anomalous: ActiveValue::Set(tx.is_anomalous),
            raw_payload: ActiveValue::Set(tx.raw_payload.clone()),
            created_at: ActiveValue::Set(tx.created_at),
            updated_at: ActiveValue::Set(tx.updated_at),
        }
    }
}

impl TryFrom<Model> for BankTransaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            company_id: model.company_id,
            bank_account_id: model.bank_account_id,
            transaction_date: model.transaction_date,
            kind: TransactionType::try_from(model.kind.as_str())?,
            amount: Money::new(model.amount_minor),
            currency: model.currency,
            balance_after: model.balance_after_minor.map(Money::new),
            description: model.description,
            reference: model.reference,
            bank_reference: model.bank_reference,
            category: Category::try_from(model.category.as_str())?,
            is_anomalous: model.is_anomalous,
            raw_payload: model.raw_payload,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_vocabulary_maps_to_internal_type() {
        assert_eq!(TransactionType::from_gateway("CR").unwrap(), TransactionType::Credit);
        assert_eq!(TransactionType::from_gateway(" Credit ").unwrap(), TransactionType::Credit);
        assert_eq!(TransactionType::from_gateway("DR").unwrap(), TransactionType::Debit);
        assert_eq!(TransactionType::from_gateway("withdrawal").unwrap(), TransactionType::Debit);
        assert!(matches!(
            TransactionType::from_gateway("sideways"),
            Err(EngineError::InvalidValue(_))
        ));
    }

    #[test]
    fn category_round_trips_through_storage_name() {
        for category in [Category::BankFee, Category::OperatingExpense, Category::Uncategorized] {
            assert_eq!(Category::try_from(category.as_str()).unwrap(), category);
        }
    }

    #[test]
    fn unknown_stored_category_is_an_error() {
        let now = Utc::now();
        let model = Model {
            id: Uuid::new_v4(),
            company_id: "acme".to_string(),
            bank_account_id: "acc-1".to_string(),
            transaction_date: now,
            kind: "credit".to_string(),
            amount_minor: 100,
            currency: "EUR".to_string(),
            balance_after_minor: None,
            description: "wire".to_string(),
            reference: None,
            bank_reference: None,
            category: "groceries".to_string(),
            is_anomalous: false,
            raw_payload: None,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(
            BankTransaction::try_from(model).unwrap_err(),
            EngineError::InvalidValue("invalid category: groceries".to_string())
        );
    }
}
