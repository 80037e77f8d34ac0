use chrono::{Duration, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    BankTransaction, Category, EngineError, GatewayTransaction, Money, ResultEngine,
    TransactionType, anomalies, categorize::categorize, transactions,
};

use super::{Engine, with_tx};

/// What [`Engine::process_incoming`] did with one gateway record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted(Uuid),
    Updated(Uuid),
    /// Already stored. `low_confidence` is set when the match came from the
    /// fallback key instead of the bank reference.
    Skipped { id: Uuid, low_confidence: bool },
}

fn bank_reference(raw: &GatewayTransaction) -> Option<String> {
    raw.transaction_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

impl Engine {
    /// Stores one gateway record for `company_id`, unless it is already
    /// known.
    ///
    /// The record is matched on its bank reference when it has one, else on
    /// `(amount, calendar day, description)` through the configured
    /// [`DedupStrategy`](crate::DedupStrategy). A match is skipped, or
    /// updated in place when `force` is set. New records are categorized and
    /// run through the anomaly rules.
    pub async fn process_incoming(
        &self,
        company_id: &str,
        bank_account_id: &str,
        raw: &GatewayTransaction,
        force: bool,
    ) -> ResultEngine<IngestOutcome> {
        let kind = TransactionType::from_gateway(&raw.kind)?;
        let raw_payload = serde_json::to_string(raw)?;

        with_tx!(self, |db_tx| {
            let outcome = match self.find_existing(&db_tx, company_id, raw).await? {
                Some((existing, low_confidence)) if !force => IngestOutcome::Skipped {
                    id: existing.id,
                    low_confidence,
                },
                Some((existing, _)) => {
                    let id = existing.id;
                    self.overwrite(&db_tx, existing, raw, kind, raw_payload).await?;
                    IngestOutcome::Updated(id)
                }
                None => {
                    self.insert_new(&db_tx, company_id, bank_account_id, raw, kind, raw_payload)
                        .await?
                }
            };
            Ok::<IngestOutcome, EngineError>(outcome)
        })
    }

    async fn find_existing<C: ConnectionTrait>(
        &self,
        db: &C,
        company_id: &str,
        raw: &GatewayTransaction,
    ) -> ResultEngine<Option<(transactions::Model, bool)>> {
        if let Some(reference) = bank_reference(raw) {
            let existing = transactions::Entity::find()
                .filter(transactions::Column::CompanyId.eq(company_id))
                .filter(transactions::Column::BankReference.eq(reference))
                .one(db)
                .await?;
            return Ok(existing.map(|model| (model, false)));
        }

        let day_start = raw
            .date
            .date_naive()
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();
        let candidates = transactions::Entity::find()
            .filter(transactions::Column::CompanyId.eq(company_id))
            .filter(transactions::Column::AmountMinor.eq(raw.amount_minor))
            .filter(transactions::Column::TransactionDate.gte(day_start))
            .filter(transactions::Column::TransactionDate.lt(day_start + Duration::days(1)))
            .all(db)
            .await?;

        Ok(candidates
            .into_iter()
            .find(|model| {
                self.dedup
                    .same_description(&model.description, raw.description.trim())
            })
            .map(|model| (model, true)))
    }

    async fn insert_new<C: ConnectionTrait>(
        &self,
        db: &C,
        company_id: &str,
        bank_account_id: &str,
        raw: &GatewayTransaction,
        kind: TransactionType,
        raw_payload: String,
    ) -> ResultEngine<IngestOutcome> {
        let now = Utc::now();
        let description = raw.description.trim().to_string();
        let tx = BankTransaction {
            id: Uuid::new_v4(),
            company_id: company_id.to_string(),
            bank_account_id: bank_account_id.to_string(),
            transaction_date: raw.date,
            kind,
            amount: Money::new(raw.amount_minor),
            currency: raw.currency.trim().to_ascii_uppercase(),
            balance_after: raw.balance_after_minor.map(Money::new),
            category: categorize(kind, &description),
            description,
            reference: normalize_text(raw.reference.as_deref()),
            bank_reference: bank_reference(raw),
            is_anomalous: false,
            raw_payload: Some(raw_payload),
            created_at: now,
            updated_at: now,
        };

        let inserted = transactions::Entity::insert(transactions::ActiveModel::from(&tx))
            .on_conflict(
                OnConflict::columns([
                    transactions::Column::CompanyId,
                    transactions::Column::BankReference,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        if inserted == 0 {
            // A concurrent run stored the same bank reference first.
            return match self.find_existing(db, company_id, raw).await? {
                Some((existing, _)) => Ok(IngestOutcome::Skipped {
                    id: existing.id,
                    low_confidence: false,
                }),
                None => Err(DbErr::RecordNotInserted.into()),
            };
        }

        self.record_anomalies(db, &tx).await?;
        Ok(IngestOutcome::Inserted(tx.id))
    }

    async fn overwrite<C: ConnectionTrait>(
        &self,
        db: &C,
        existing: transactions::Model,
        raw: &GatewayTransaction,
        kind: TransactionType,
        raw_payload: String,
    ) -> ResultEngine<()> {
        let description = raw.description.trim().to_string();
        let recategorize = existing.category == Category::Uncategorized.as_str();
        let mut active: transactions::ActiveModel = existing.into();
        active.transaction_date = ActiveValue::Set(raw.date);
        active.kind = ActiveValue::Set(kind.as_str().to_string());
        active.amount_minor = ActiveValue::Set(raw.amount_minor);
        active.currency = ActiveValue::Set(raw.currency.trim().to_ascii_uppercase());
        active.balance_after_minor = ActiveValue::Set(raw.balance_after_minor);
        active.reference = ActiveValue::Set(normalize_text(raw.reference.as_deref()));
        active.raw_payload = ActiveValue::Set(Some(raw_payload));
        if recategorize {
            active.category = ActiveValue::Set(categorize(kind, &description).as_str().to_string());
        }
        active.description = ActiveValue::Set(description);
        active.is_anomalous = ActiveValue::Set(false);
        active.updated_at = ActiveValue::Set(Utc::now());
        let updated = BankTransaction::try_from(active.update(db).await?)?;

        // Findings of the previous version no longer apply.
        anomalies::Entity::delete_many()
            .filter(anomalies::Column::TransactionId.eq(updated.id))
            .exec(db)
            .await?;
        self.record_anomalies(db, &updated).await?;
        Ok(())
    }

    /// Re-runs auto categorization over the company's `uncategorized`
    /// transactions. Returns how many got a category.
    pub async fn categorize_uncategorized(&self, company_id: &str) -> ResultEngine<u64> {
        let pending = transactions::Entity::find()
            .filter(transactions::Column::CompanyId.eq(company_id))
            .filter(transactions::Column::Category.eq(Category::Uncategorized.as_str()))
            .all(&self.database)
            .await?;

        let mut updated = 0u64;
        with_tx!(self, |db_tx| {
            for model in pending {
                let kind = TransactionType::try_from(model.kind.as_str())?;
                let category = categorize(kind, &model.description);
                if category == Category::Uncategorized {
                    continue;
                }
                let mut active: transactions::ActiveModel = model.into();
                active.category = ActiveValue::Set(category.as_str().to_string());
                active.updated_at = ActiveValue::Set(Utc::now());
                active.update(&db_tx).await?;
                updated += 1;
            }
            Ok::<(), EngineError>(())
        })?;

        tracing::info!(company_id, updated, "categorization sweep done");
        Ok(updated)
    }

    /// Transactions of a company, oldest first, optionally limited to a
    /// `[from, to)` window.
    pub async fn transactions(
        &self,
        company_id: &str,
        period: Option<crate::Period>,
    ) -> ResultEngine<Vec<BankTransaction>> {
        let mut query = transactions::Entity::find()
            .filter(transactions::Column::CompanyId.eq(company_id));
        if let Some(period) = period {
            query = query
                .filter(transactions::Column::TransactionDate.gte(period.start))
                .filter(transactions::Column::TransactionDate.lt(period.end_exclusive));
        }
        let models = query
            .order_by_asc(transactions::Column::TransactionDate)
            .all(&self.database)
            .await?;
        models.into_iter().map(BankTransaction::try_from).collect()
    }
}
