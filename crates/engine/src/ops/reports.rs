use chrono::{Datelike, Utc};
use sea_orm::{ActiveValue, PaginatorTrait, QueryFilter, QueryOrder, prelude::*};
use serde::Serialize;

use crate::{
    EngineError, Money, Period, ProfitDistribution, ReportStatus, ResultEngine, RevenueCmd,
    RevenueInputs, RevenueReport, RevenueSummary, ReviewDecision, SyncCmd, TransactionType,
    revenue_reports, summarize,
};

use super::Engine;

/// Listing filter for [`Engine::revenue_reports_for_company`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportFilter {
    pub year: Option<i32>,
    pub status: Option<ReportStatus>,
    /// 1-based.
    pub page: u64,
    pub limit: u64,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            year: None,
            status: None,
            page: 1,
            limit: 20,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportPage {
    pub reports: Vec<RevenueReport>,
    /// Matching reports across all pages.
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Platform-wide counters over every stored report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReportStatistics {
    pub total_reports: u64,
    pub pending_review: u64,
    pub auto_verified: u64,
    pub verified: u64,
    pub rejected: u64,
    pub total_net_revenue: Money,
    pub total_dividend_pool: Money,
    pub total_platform_fees: Money,
}

fn report_key(company_id: &str, year: i32, month: u32) -> String {
    format!("{company_id}/{year}-{month:02}")
}

impl Engine {
    /// Builds the report of `company_id` for one calendar month, with no
    /// costs or adjustments. See [`Engine::calculate_monthly_revenue_with`].
    pub async fn calculate_monthly_revenue(
        &self,
        company_id: &str,
        year: i32,
        month: u32,
        total_shares: u64,
    ) -> ResultEngine<RevenueReport> {
        self.calculate_monthly_revenue_with(RevenueCmd::new(company_id, year, month, total_shares))
            .await
    }

    /// Builds the monthly report described by `cmd`.
    ///
    /// Every account of the company is synced for the month first so late
    /// transactions are included; a failed sync is logged and the report is
    /// built from what is already stored. At most one report exists per
    /// company and month: a second call fails with
    /// [`EngineError::ExistingKey`].
    pub async fn calculate_monthly_revenue_with(
        &self,
        cmd: RevenueCmd,
    ) -> ResultEngine<RevenueReport> {
        let period = Period::month(cmd.year, cmd.month)?;
        let (company_id, year, month) = (cmd.company_id.clone(), cmd.year, cmd.month);

        let lock = self.report_lock(&company_id, year, month);
        let outcome = {
            let _guard = lock.lock().await;
            self.create_report(cmd, period).await
        };
        self.release_report_lock(&company_id, year, month, lock);
        outcome
    }

    async fn presync_month(&self, company_id: &str, period: Period, key: &str) {
        let accounts = match self.gateway.bank_accounts_by_company(company_id).await {
            Ok(accounts) => accounts,
            Err(err) => {
                tracing::warn!(
                    report = %key,
                    %err,
                    "pre-report sync failed, using stored transactions"
                );
                return;
            }
        };

        for account in accounts {
            let sync = SyncCmd::new(company_id)
                .bank_account(account.id.as_str())
                .range(period.start, period.end_of_day());
            match self.sync_transactions(sync).await {
                Ok(result) if !result.is_completed() => tracing::warn!(
                    report = %key,
                    bank_account_id = %account.id,
                    errors = ?result.errors,
                    "pre-report sync failed, using stored transactions"
                ),
                Ok(_) => {}
                Err(err) => tracing::warn!(
                    report = %key,
                    bank_account_id = %account.id,
                    %err,
                    "pre-report sync failed, using stored transactions"
                ),
            }
        }
    }

    async fn create_report(&self, cmd: RevenueCmd, period: Period) -> ResultEngine<RevenueReport> {
        let key = report_key(&cmd.company_id, cmd.year, cmd.month);
        if self
            .find_report_for_month(&cmd.company_id, cmd.year, cmd.month)
            .await?
            .is_some()
        {
            return Err(EngineError::ExistingKey(key));
        }

        self.presync_month(&cmd.company_id, period, &key).await;

        let stored = self.transactions(&cmd.company_id, Some(period)).await?;
        let mut inputs = RevenueInputs {
            operating_costs: cmd.operating_costs,
            other_expenses: cmd.other_expenses,
            manual_adjustments: cmd.manual_adjustments,
            ..Default::default()
        };
        let overflow = || EngineError::InvalidAmount(format!("{key}: monthly totals out of range"));
        let mut anomaly_count = 0u64;
        for tx in &stored {
            match tx.kind {
                TransactionType::Credit => {
                    inputs.total_deposits =
                        inputs.total_deposits.checked_add(tx.amount).ok_or_else(overflow)?;
                }
                TransactionType::Debit => {
                    inputs.total_withdrawals =
                        inputs.total_withdrawals.checked_add(tx.amount).ok_or_else(overflow)?;
                }
            }
            if tx.is_anomalous {
                anomaly_count += 1;
            }
        }

        let now = Utc::now();
        let report = RevenueReport {
            id: Uuid::new_v4(),
            company_id: cmd.company_id.clone(),
            report_year: cmd.year,
            report_month: cmd.month,
            distribution: ProfitDistribution::compute(&inputs, cmd.total_shares)?,
            inputs,
            total_shares: cmd.total_shares,
            status: ReportStatus::initial(anomaly_count),
            transaction_count: stored.len() as u64,
            anomaly_count,
            verified_by: None,
            verified_at: None,
            verification_notes: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = revenue_reports::ActiveModel::try_from(&report)?
            .insert(&self.database)
            .await
        {
            // Another process holds the unique index for this month.
            if self
                .find_report_for_month(&cmd.company_id, cmd.year, cmd.month)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(key));
            }
            return Err(err.into());
        }

        tracing::info!(
            report = %key,
            net_revenue = %report.distribution.net_revenue,
            status = report.status.as_str(),
            "revenue report created"
        );
        Ok(report)
    }

    /// Records an administrator's review outcome on a report.
    pub async fn verify_revenue_report(
        &self,
        report_id: Uuid,
        admin_id: &str,
        decision: ReviewDecision,
        notes: Option<String>,
    ) -> ResultEngine<RevenueReport> {
        let model = revenue_reports::Entity::find_by_id(report_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(report_id.to_string()))?;

        let now = Utc::now();
        let status = ReportStatus::from(decision);
        let mut active: revenue_reports::ActiveModel = model.into();
        active.status = ActiveValue::Set(status.as_str().to_string());
        active.verified_by = ActiveValue::Set(Some(admin_id.to_string()));
        active.verified_at = ActiveValue::Set(Some(now));
        active.verification_notes = ActiveValue::Set(notes);
        active.updated_at = ActiveValue::Set(now);
        let updated = active.update(&self.database).await?;

        tracing::info!(%report_id, admin_id, status = status.as_str(), "report reviewed");
        RevenueReport::try_from(updated)
    }

    pub async fn revenue_report(&self, report_id: Uuid) -> ResultEngine<RevenueReport> {
        let model = revenue_reports::Entity::find_by_id(report_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(report_id.to_string()))?;
        RevenueReport::try_from(model)
    }

    async fn find_report_for_month(
        &self,
        company_id: &str,
        year: i32,
        month: u32,
    ) -> ResultEngine<Option<revenue_reports::Model>> {
        let month =
            i32::try_from(month).map_err(|_| EngineError::InvalidPeriod(month.to_string()))?;
        Ok(revenue_reports::Entity::find()
            .filter(revenue_reports::Column::CompanyId.eq(company_id))
            .filter(revenue_reports::Column::ReportYear.eq(year))
            .filter(revenue_reports::Column::ReportMonth.eq(month))
            .one(&self.database)
            .await?)
    }

    /// The report of one company for one month, `None` when not calculated
    /// yet.
    pub async fn revenue_report_for_month(
        &self,
        company_id: &str,
        year: i32,
        month: u32,
    ) -> ResultEngine<Option<RevenueReport>> {
        self.find_report_for_month(company_id, year, month)
            .await?
            .map(RevenueReport::try_from)
            .transpose()
    }

    /// Reports of a company, newest month first.
    pub async fn revenue_reports_for_company(
        &self,
        company_id: &str,
        filter: &ReportFilter,
    ) -> ResultEngine<ReportPage> {
        let page = filter.page.max(1);
        let limit = filter.limit.max(1);

        let mut query = revenue_reports::Entity::find()
            .filter(revenue_reports::Column::CompanyId.eq(company_id));
        if let Some(year) = filter.year {
            query = query.filter(revenue_reports::Column::ReportYear.eq(year));
        }
        if let Some(status) = filter.status {
            query = query.filter(revenue_reports::Column::Status.eq(status.as_str()));
        }
        let paginator = query
            .order_by_desc(revenue_reports::Column::ReportYear)
            .order_by_desc(revenue_reports::Column::ReportMonth)
            .paginate(&self.database, limit);

        let total = paginator.num_items().await?;
        let reports = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(RevenueReport::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(ReportPage {
            reports,
            total,
            page,
            limit,
        })
    }

    pub async fn report_statistics(&self) -> ResultEngine<ReportStatistics> {
        let models = revenue_reports::Entity::find().all(&self.database).await?;

        let mut stats = ReportStatistics::default();
        for model in models {
            let report = RevenueReport::try_from(model)?;
            stats.total_reports += 1;
            match report.status {
                ReportStatus::PendingReview => stats.pending_review += 1,
                ReportStatus::AutoVerified => stats.auto_verified += 1,
                ReportStatus::Verified => stats.verified += 1,
                ReportStatus::Rejected => stats.rejected += 1,
            }
            stats.total_net_revenue += report.distribution.net_revenue;
            stats.total_dividend_pool += report.distribution.dividend_pool;
            stats.total_platform_fees += report.distribution.platform_fee;
        }
        Ok(stats)
    }

    /// Year-to-date and trend figures over every report of the company.
    pub async fn revenue_summary(&self, company_id: &str) -> ResultEngine<RevenueSummary> {
        let models = revenue_reports::Entity::find()
            .filter(revenue_reports::Column::CompanyId.eq(company_id))
            .order_by_desc(revenue_reports::Column::ReportYear)
            .order_by_desc(revenue_reports::Column::ReportMonth)
            .all(&self.database)
            .await?;
        let reports = models
            .into_iter()
            .map(RevenueReport::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        Ok(summarize(&reports, Utc::now().year()))
    }
}
