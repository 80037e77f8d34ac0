use std::collections::HashSet;

use chrono::{Duration, Utc};
use sea_orm::{ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::Serialize;

use crate::{
    BankTransaction, EngineError, Money, ResultEngine, TransactionAnomaly, anomalies,
    rules::{self, Envelope, ValidationContext},
    transactions,
};

use super::{Engine, with_tx};

/// Result of a company-wide anomaly scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnomalyScan {
    pub anomalies: Vec<TransactionAnomaly>,
    pub flagged_transaction_count: u64,
}

impl Engine {
    async fn validation_context<C: ConnectionTrait>(
        &self,
        db: &C,
        tx: &BankTransaction,
    ) -> ResultEngine<ValidationContext> {
        let day_start = tx
            .transaction_date
            .date_naive()
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();

        let twins = transactions::Entity::find()
            .filter(transactions::Column::CompanyId.eq(tx.company_id.as_str()))
            .filter(transactions::Column::Id.ne(tx.id))
            .filter(transactions::Column::Kind.eq(tx.kind.as_str()))
            .filter(transactions::Column::AmountMinor.eq(tx.amount.minor()))
            .filter(transactions::Column::TransactionDate.gte(day_start))
            .filter(transactions::Column::TransactionDate.lt(day_start + Duration::days(1)))
            .all(db)
            .await?;

        let history = transactions::Entity::find()
            .filter(transactions::Column::CompanyId.eq(tx.company_id.as_str()))
            .filter(transactions::Column::BankAccountId.eq(tx.bank_account_id.as_str()))
            .filter(transactions::Column::Id.ne(tx.id))
            .filter(transactions::Column::Kind.eq(tx.kind.as_str()))
            .filter(transactions::Column::TransactionDate.lt(tx.transaction_date))
            .all(db)
            .await?;

        let total = history
            .iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(Money::new(m.amount_minor)))
            .ok_or_else(|| {
                EngineError::InvalidAmount(format!(
                    "history of account {} out of range",
                    tx.bank_account_id
                ))
            })?;

        let mut ctx = ValidationContext::new(Utc::now());
        ctx.same_day_twins = twins.len() as u64;
        ctx.envelope = Envelope {
            samples: history.len() as u64,
            total,
        };
        Ok(ctx)
    }

    /// Runs the anomaly rules against a transaction without storing
    /// anything.
    pub async fn validate_transaction(
        &self,
        tx: &BankTransaction,
    ) -> ResultEngine<Vec<TransactionAnomaly>> {
        let ctx = self.validation_context(&self.database, tx).await?;
        Ok(rules::validate(tx, &ctx))
    }

    /// Validates `tx`, stores the anomalies not already on record and flags
    /// the transaction when anything was found.
    pub(super) async fn record_anomalies<C: ConnectionTrait>(
        &self,
        db: &C,
        tx: &BankTransaction,
    ) -> ResultEngine<Vec<TransactionAnomaly>> {
        let ctx = self.validation_context(db, tx).await?;
        let found = rules::validate(tx, &ctx);
        if found.is_empty() {
            return Ok(found);
        }

        let known: HashSet<String> = anomalies::Entity::find()
            .filter(anomalies::Column::TransactionId.eq(tx.id))
            .all(db)
            .await?
            .into_iter()
            .map(|m| m.kind)
            .collect();

        for anomaly in found.iter().filter(|a| !known.contains(a.kind.as_str())) {
            anomalies::ActiveModel::from(anomaly).insert(db).await?;
        }

        transactions::ActiveModel {
            id: ActiveValue::Unchanged(tx.id),
            is_anomalous: ActiveValue::Set(true),
            updated_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .update(db)
        .await?;

        tracing::debug!(
            transaction_id = %tx.id,
            count = found.len(),
            "transaction flagged"
        );
        Ok(found)
    }

    /// Scans every transaction of the company: unflagged ones are validated
    /// again, flagged ones contribute their stored anomalies.
    pub async fn detect_anomalies(&self, company_id: &str) -> ResultEngine<AnomalyScan> {
        let models = transactions::Entity::find()
            .filter(transactions::Column::CompanyId.eq(company_id))
            .order_by_asc(transactions::Column::TransactionDate)
            .all(&self.database)
            .await?;

        let scan = with_tx!(self, |db_tx| {
            let mut scan = AnomalyScan {
                anomalies: Vec::new(),
                flagged_transaction_count: 0,
            };
            for model in models {
                let tx = BankTransaction::try_from(model)?;
                let found = if tx.is_anomalous {
                    anomalies::Entity::find()
                        .filter(anomalies::Column::TransactionId.eq(tx.id))
                        .all(&db_tx)
                        .await?
                        .into_iter()
                        .map(TransactionAnomaly::try_from)
                        .collect::<ResultEngine<Vec<_>>>()?
                } else {
                    self.record_anomalies(&db_tx, &tx).await?
                };
                if tx.is_anomalous || !found.is_empty() {
                    scan.flagged_transaction_count += 1;
                }
                scan.anomalies.extend(found);
            }
            Ok::<AnomalyScan, EngineError>(scan)
        })?;

        tracing::info!(
            company_id,
            flagged = scan.flagged_transaction_count,
            anomalies = scan.anomalies.len(),
            "anomaly scan done"
        );
        Ok(scan)
    }

    /// Stored anomalies of a company, most severe first.
    pub async fn anomalies(&self, company_id: &str) -> ResultEngine<Vec<TransactionAnomaly>> {
        let models = anomalies::Entity::find()
            .filter(anomalies::Column::CompanyId.eq(company_id))
            .order_by_desc(anomalies::Column::DetectedAt)
            .all(&self.database)
            .await?;
        let mut found = models
            .into_iter()
            .map(TransactionAnomaly::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        found.sort_by(|a, b| b.severity.cmp(&a.severity));
        Ok(found)
    }

    /// The `high` and `critical` subset of [`Engine::anomalies`].
    pub async fn high_severity_anomalies(
        &self,
        company_id: &str,
    ) -> ResultEngine<Vec<TransactionAnomaly>> {
        let mut found = self.anomalies(company_id).await?;
        found.retain(|a| a.severity.is_priority());
        Ok(found)
    }
}
