use chrono::{Duration, Utc};
use sea_orm::{PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, prelude::*};

use crate::{
    BankAccount, EngineError, FetchRequest, ResultEngine, SyncCmd, SyncResult, sync_results,
};

use super::{Engine, IngestOutcome};

/// Hard cap on the rows returned by [`Engine::sync_history`].
const HISTORY_LIMIT: u64 = 100;

impl Engine {
    async fn resolve_account(
        &self,
        company_id: &str,
        bank_account_id: Option<&str>,
    ) -> ResultEngine<BankAccount> {
        match bank_account_id {
            Some(id) => self
                .gateway
                .bank_account(id)
                .await?
                .filter(|account| account.company_id == company_id)
                .ok_or_else(|| EngineError::KeyNotFound(id.to_string())),
            None => self
                .gateway
                .bank_accounts_by_company(company_id)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| EngineError::KeyNotFound(company_id.to_string())),
        }
    }

    /// Pulls one account's feed for the requested range and stores it.
    ///
    /// Errors are returned only when the run cannot start (unknown account,
    /// bad range, gateway down while resolving the account). Once pages are
    /// being fetched, any failure ends the run as
    /// [`SyncStatus::Failed`](crate::SyncStatus::Failed) with the counters
    /// accumulated so far, and the result is persisted either way.
    pub async fn sync_transactions(&self, cmd: SyncCmd) -> ResultEngine<SyncResult> {
        let account = self
            .resolve_account(&cmd.company_id, cmd.bank_account_id.as_deref())
            .await?;

        let to = cmd.to.unwrap_or_else(Utc::now);
        let from = cmd
            .from
            .unwrap_or_else(|| to - Duration::days(self.config.default_lookback_days));
        if from > to {
            return Err(EngineError::InvalidPeriod(format!("{from} is after {to}")));
        }

        tracing::info!(
            company_id = %cmd.company_id,
            bank_account_id = %account.id,
            %from,
            %to,
            force = cmd.force,
            "sync started"
        );

        let mut result = SyncResult::start(&cmd.company_id, &account.id, from, to);
        let mut has_more = false;

        for page in 1..=self.config.max_pages {
            let request = FetchRequest {
                account_number: account.account_number.clone(),
                from,
                to,
                page,
                limit: self.config.page_size,
            };
            let fetched = match self.gateway.fetch_transactions(&account.id, &request).await {
                Ok(fetched) => fetched,
                Err(err) => {
                    result.fail(format!("page {page}: {err}"));
                    break;
                }
            };

            result.pages_fetched += 1;
            result.transactions_fetched += fetched.transactions.len() as u64;
            let totals = result
                .total_deposits
                .checked_add(fetched.summary.total_credits)
                .zip(result.total_withdrawals.checked_add(fetched.summary.total_debits));
            let Some((deposits, withdrawals)) = totals else {
                result.fail(format!(
                    "page {page}: {}",
                    EngineError::InvalidAmount("run totals out of range".to_string())
                ));
                break;
            };
            result.total_deposits = deposits;
            result.total_withdrawals = withdrawals;
            tracing::debug!(
                bank_account_id = %account.id,
                page,
                count = fetched.transactions.len(),
                has_more = fetched.has_more,
                "page fetched"
            );

            for raw in &fetched.transactions {
                match self
                    .process_incoming(&cmd.company_id, &account.id, raw, cmd.force)
                    .await
                {
                    Ok(IngestOutcome::Inserted(_)) => result.transactions_inserted += 1,
                    Ok(IngestOutcome::Updated(_)) => result.transactions_updated += 1,
                    Ok(IngestOutcome::Skipped { id, low_confidence }) => {
                        result.transactions_skipped += 1;
                        if low_confidence {
                            result.low_confidence_matches += 1;
                            result.warnings.push(format!(
                                "matched stored transaction {id} on amount, day and description only"
                            ));
                        }
                    }
                    Err(err) => {
                        result.fail(format!(
                            "transaction {}: {err}",
                            raw.transaction_id.as_deref().unwrap_or("<no id>")
                        ));
                        break;
                    }
                }
            }
            if !result.is_completed() {
                break;
            }

            has_more = fetched.has_more;
            if !has_more {
                break;
            }
        }

        if result.is_completed() && has_more {
            let warning = format!(
                "stopped after {} pages with more pages outstanding",
                self.config.max_pages
            );
            tracing::warn!(bank_account_id = %account.id, "{warning}");
            result.warnings.push(warning);
        }

        result.completed_at = Utc::now();
        if result.is_completed() {
            if let Err(err) = self
                .gateway
                .update_last_sync(&account.id, result.completed_at)
                .await
            {
                result
                    .warnings
                    .push(format!("last sync time not recorded: {err}"));
            }
            tracing::info!(
                bank_account_id = %account.id,
                inserted = result.transactions_inserted,
                updated = result.transactions_updated,
                skipped = result.transactions_skipped,
                "sync completed"
            );
        } else {
            tracing::warn!(
                bank_account_id = %account.id,
                errors = ?result.errors,
                "sync failed"
            );
        }

        self.store_sync_result(&result).await?;
        Ok(result)
    }

    /// Appends a run to the history and evicts the oldest ones past the cap.
    async fn store_sync_result(&self, result: &SyncResult) -> ResultEngine<()> {
        sync_results::ActiveModel::try_from(result)?
            .insert(&self.database)
            .await?;

        let stored = sync_results::Entity::find()
            .filter(sync_results::Column::CompanyId.eq(result.company_id.as_str()))
            .count(&self.database)
            .await?;
        let cap = self.config.sync_history_cap;
        if stored > cap {
            let evicted: Vec<Uuid> = sync_results::Entity::find()
                .select_only()
                .column(sync_results::Column::Id)
                .filter(sync_results::Column::CompanyId.eq(result.company_id.as_str()))
                .order_by_asc(sync_results::Column::StartedAt)
                .limit(stored - cap)
                .into_tuple()
                .all(&self.database)
                .await?;
            sync_results::Entity::delete_many()
                .filter(sync_results::Column::Id.is_in(evicted))
                .exec(&self.database)
                .await?;
        }
        Ok(())
    }

    /// Recent sync runs of a company, newest first.
    pub async fn sync_history(
        &self,
        company_id: &str,
        limit: u64,
    ) -> ResultEngine<Vec<SyncResult>> {
        let models = sync_results::Entity::find()
            .filter(sync_results::Column::CompanyId.eq(company_id))
            .order_by_desc(sync_results::Column::StartedAt)
            .limit(limit.min(HISTORY_LIMIT))
            .all(&self.database)
            .await?;
        models.into_iter().map(SyncResult::try_from).collect()
    }
}
