use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Duration, Utc};
use tokio::{
    sync::Semaphore,
    task::{self, JoinSet},
};

use crate::{
    BankAccount, Period, ResultEngine, RevenueReport, SharesLookup, SyncCmd, SyncResult,
};

use super::Engine;

impl Engine {
    /// Syncs every account known to the gateway, `sync_workers` at a time.
    ///
    /// Each account is independent: a run that cannot start, or whose task
    /// panics, becomes a failed [`SyncResult`] in the output (not persisted)
    /// and the others go on.
    pub async fn sync_all_accounts(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        force: bool,
    ) -> ResultEngine<Vec<SyncResult>> {
        let accounts = self.gateway.all_bank_accounts().await?;
        let permits = Arc::new(Semaphore::new(self.config.sync_workers));
        let mut tasks = JoinSet::new();
        let mut spawned: HashMap<task::Id, BankAccount> = HashMap::new();

        tracing::info!(accounts = accounts.len(), "bulk sync started");
        for account in accounts {
            let engine = self.clone();
            let permits = permits.clone();
            let mut cmd = SyncCmd::new(account.company_id.as_str())
                .bank_account(account.id.as_str())
                .force(force);
            cmd.from = from;
            cmd.to = to;
            let handle = tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                engine.sync_transactions(cmd).await
            });
            spawned.insert(handle.id(), account);
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, Ok(result))) => {
                    results.push(result);
                    spawned.remove(&id);
                    continue;
                }
                Ok((id, Err(err))) => (id, err.to_string()),
                Err(err) => (err.id(), format!("sync task panicked: {err}")),
            };
            let Some(account) = spawned.remove(&id) else {
                continue;
            };
            tracing::error!(
                bank_account_id = %account.id,
                error = %outcome,
                "account sync aborted"
            );
            let to = to.unwrap_or_else(Utc::now);
            let from =
                from.unwrap_or_else(|| to - Duration::days(self.config.default_lookback_days));
            let mut failed = SyncResult::start(&account.company_id, &account.id, from, to);
            failed.fail(outcome);
            results.push(failed);
        }
        Ok(results)
    }

    /// Syncs yesterday, for every account.
    pub async fn run_daily_sync(&self) -> ResultEngine<Vec<SyncResult>> {
        let day = Period::previous_day(Utc::now());
        self.sync_all_accounts(Some(day.start), Some(day.end_of_day()), false)
            .await
    }

    /// Builds last month's report for every company with a linked account.
    /// Companies that fail, including those already reported, are logged and
    /// left out of the result.
    pub async fn run_monthly_revenue_calculation(
        &self,
        shares: Arc<dyn SharesLookup>,
    ) -> ResultEngine<Vec<RevenueReport>> {
        let (year, month) = Period::previous_month(Utc::now());
        let companies: BTreeSet<String> = self
            .gateway
            .all_bank_accounts()
            .await?
            .into_iter()
            .map(|account| account.company_id)
            .collect();

        let permits = Arc::new(Semaphore::new(self.config.sync_workers));
        let mut tasks = JoinSet::new();
        let mut spawned: HashMap<task::Id, String> = HashMap::new();
        tracing::info!(year, month, companies = companies.len(), "monthly calculation started");
        for company_id in companies {
            let engine = self.clone();
            let shares = shares.clone();
            let permits = permits.clone();
            let company = company_id.clone();
            let handle = tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let total = shares.total_shares(&company).await?;
                engine
                    .calculate_monthly_revenue(&company, year, month, total)
                    .await
            });
            spawned.insert(handle.id(), company_id);
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, Ok(report))) => {
                    spawned.remove(&id);
                    reports.push(report);
                }
                Ok((id, Err(err))) => {
                    let company_id = spawned.remove(&id).unwrap_or_default();
                    tracing::warn!(%company_id, %err, "monthly report skipped");
                }
                Err(err) => {
                    let company_id = spawned.remove(&err.id()).unwrap_or_default();
                    tracing::error!(%company_id, %err, "monthly report task panicked");
                }
            }
        }
        reports.sort_by(|a, b| a.company_id.cmp(&b.company_id));
        Ok(reports)
    }
}
