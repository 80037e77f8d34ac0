use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use engine::{
    EngineError, Money, Period, ReportFilter, ReportStatus, RevenueCmd, ReviewDecision,
    SharesLookup,
};

mod common;

use common::{MemoryGateway, credit, day, debit, engine_with_db};

struct FixedShares(HashMap<String, u64>);

#[async_trait]
impl SharesLookup for FixedShares {
    async fn total_shares(&self, company_id: &str) -> Result<u64, EngineError> {
        self.0
            .get(company_id)
            .copied()
            .ok_or_else(|| EngineError::KeyNotFound(company_id.to_string()))
    }
}

fn october_gateway() -> Arc<MemoryGateway> {
    let gateway = MemoryGateway::new();
    gateway.add_account("acc-1", "acme");
    gateway.set_feed(
        "acc-1",
        vec![
            credit(Some("r-1"), day(2025, 10, 5), 6_000_000, "Wholesale order"),
            credit(Some("r-2"), day(2025, 10, 12), 4_000_000, "Retail settlement"),
            debit(Some("r-3"), day(2025, 10, 20), 2_000_000, "Supplier invoice"),
            // Outside the month: ignored by the October report.
            credit(Some("r-4"), day(2025, 11, 1), 999_999, "Wholesale order"),
        ],
    );
    gateway
}

#[tokio::test]
async fn october_report_end_to_end() {
    let engine = engine_with_db(october_gateway()).await;

    let report = engine
        .calculate_monthly_revenue("acme", 2025, 10, 1000)
        .await
        .unwrap();

    assert_eq!(report.inputs.total_deposits, Money::new(10_000_000));
    assert_eq!(report.inputs.total_withdrawals, Money::new(2_000_000));
    let split = report.distribution;
    assert_eq!(split.net_revenue, "80000.00".parse().unwrap());
    assert_eq!(split.platform_fee, "4000.00".parse().unwrap());
    assert_eq!(split.net_profit, "76000.00".parse().unwrap());
    assert_eq!(split.dividend_pool, "45600.00".parse().unwrap());
    assert_eq!(split.reinvestment_amount, "30400.00".parse().unwrap());
    assert_eq!(split.dividend_per_share, "45.60".parse().unwrap());
    assert_eq!(report.transaction_count, 3);
    assert_eq!(report.anomaly_count, 0);
    assert_eq!(report.status, ReportStatus::AutoVerified);

    let stored = engine.revenue_report(report.id).await.unwrap();
    assert_eq!(stored, report);
    let by_month = engine
        .revenue_report_for_month("acme", 2025, 10)
        .await
        .unwrap();
    assert_eq!(by_month.map(|r| r.id), Some(report.id));
    assert!(
        engine
            .revenue_report_for_month("acme", 2025, 9)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn second_calculation_is_rejected() {
    let engine = engine_with_db(october_gateway()).await;

    engine
        .calculate_monthly_revenue("acme", 2025, 10, 1000)
        .await
        .unwrap();
    let err = engine
        .calculate_monthly_revenue("acme", 2025, 10, 1000)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::ExistingKey("acme/2025-10".to_string()));
}

#[tokio::test]
async fn concurrent_calculations_create_one_report() {
    let engine = engine_with_db(october_gateway()).await;
    let other = engine.clone();

    let (a, b) = tokio::join!(
        engine.calculate_monthly_revenue("acme", 2025, 10, 1000),
        other.calculate_monthly_revenue("acme", 2025, 10, 1000),
    );
    assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
    let err = a.err().or(b.err()).unwrap();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let page = engine
        .revenue_reports_for_company("acme", &ReportFilter::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn anomalous_month_needs_review() {
    let gateway = october_gateway();
    gateway.set_feed(
        "acc-1",
        vec![
            credit(Some("r-1"), day(2025, 10, 5), 6_000_000, "Wholesale order"),
            credit(None, day(2025, 10, 6), 150_000, "Cash deposit"),
        ],
    );
    let engine = engine_with_db(gateway).await;

    let report = engine
        .calculate_monthly_revenue("acme", 2025, 10, 1000)
        .await
        .unwrap();
    assert_eq!(report.anomaly_count, 1);
    assert_eq!(report.status, ReportStatus::PendingReview);
}

#[tokio::test]
async fn zero_shares_pay_nothing_per_share() {
    let engine = engine_with_db(october_gateway()).await;

    let report = engine
        .calculate_monthly_revenue("acme", 2025, 10, 0)
        .await
        .unwrap();
    assert_eq!(report.distribution.dividend_pool, Money::new(4_560_000));
    assert_eq!(report.distribution.dividend_per_share, Money::ZERO);
}

#[tokio::test]
async fn costs_and_adjustments_enter_net_revenue() {
    let engine = engine_with_db(october_gateway()).await;

    let cmd = RevenueCmd::new("acme", 2025, 10, 1000)
        .operating_costs("5000.00".parse().unwrap())
        .other_expenses("1000.00".parse().unwrap())
        .manual_adjustments("-4000.00".parse().unwrap());
    let report = engine.calculate_monthly_revenue_with(cmd).await.unwrap();

    assert_eq!(report.inputs.operating_costs, Money::new(500_000));
    assert_eq!(report.distribution.net_revenue, "70000.00".parse().unwrap());
}

#[tokio::test]
async fn failed_pre_sync_uses_stored_transactions() {
    let gateway = october_gateway();
    let engine = engine_with_db(gateway.clone()).await;
    let period = Period::month(2025, 10).unwrap();
    engine
        .sync_all_accounts(Some(period.start), Some(period.end_of_day()), false)
        .await
        .unwrap();

    gateway.unreachable("acc-1");
    let report = engine
        .calculate_monthly_revenue("acme", 2025, 10, 1000)
        .await
        .unwrap();
    assert_eq!(report.transaction_count, 3);
    assert_eq!(report.distribution.net_revenue, Money::new(8_000_000));
}

#[tokio::test]
async fn invalid_month_is_rejected() {
    let engine = engine_with_db(october_gateway()).await;

    let err = engine
        .calculate_monthly_revenue("acme", 2025, 13, 1000)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPeriod(_)));
}

#[tokio::test]
async fn verification_records_the_reviewer() {
    let engine = engine_with_db(october_gateway()).await;
    let report = engine
        .calculate_monthly_revenue("acme", 2025, 10, 1000)
        .await
        .unwrap();

    let verified = engine
        .verify_revenue_report(
            report.id,
            "admin-7",
            ReviewDecision::Rejected,
            Some("supplier invoice disputed".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(verified.status, ReportStatus::Rejected);
    assert_eq!(verified.verified_by.as_deref(), Some("admin-7"));
    assert!(verified.verified_at.is_some());
    assert!(verified.updated_at >= report.updated_at);
    assert_eq!(verified.distribution, report.distribution);

    let unknown = Uuid::new_v4();
    let err = engine
        .verify_revenue_report(unknown, "admin-7", ReviewDecision::Verified, None)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound(unknown.to_string()));
    assert_eq!(
        engine.revenue_report(unknown).await.unwrap_err(),
        EngineError::KeyNotFound(unknown.to_string())
    );
}

#[tokio::test]
async fn listing_and_statistics() {
    let engine = engine_with_db(october_gateway()).await;
    for (year, month) in [(2024, 12), (2025, 8), (2025, 9), (2025, 10)] {
        engine
            .calculate_monthly_revenue("acme", year, month, 1000)
            .await
            .unwrap();
    }

    let filter = ReportFilter {
        year: Some(2025),
        limit: 2,
        ..Default::default()
    };
    let first = engine
        .revenue_reports_for_company("acme", &filter)
        .await
        .unwrap();
    assert_eq!(first.total, 3);
    let months: Vec<u32> = first.reports.iter().map(|r| r.report_month).collect();
    assert_eq!(months, vec![10, 9]);

    let second = engine
        .revenue_reports_for_company("acme", &ReportFilter { page: 2, ..filter })
        .await
        .unwrap();
    assert_eq!(second.reports.len(), 1);
    assert_eq!(second.reports[0].report_month, 8);

    let october = first.reports[0].id;
    engine
        .verify_revenue_report(october, "admin-1", ReviewDecision::Verified, None)
        .await
        .unwrap();
    let verified = engine
        .revenue_reports_for_company(
            "acme",
            &ReportFilter {
                status: Some(ReportStatus::Verified),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(verified.total, 1);

    let stats = engine.report_statistics().await.unwrap();
    assert_eq!(stats.total_reports, 4);
    assert_eq!(stats.verified, 1);
    assert_eq!(stats.auto_verified, 3);
    assert_eq!(stats.total_net_revenue, Money::new(8_000_000));
    assert_eq!(stats.total_dividend_pool, Money::new(4_560_000));
    assert_eq!(stats.total_platform_fees, Money::new(400_000));
}

#[tokio::test]
async fn summary_tracks_growth_and_streak() {
    let gateway = MemoryGateway::new();
    gateway.add_account("acc-1", "acme");
    let engine = engine_with_db(gateway).await;

    for (month, adjustment) in [(9, "1000.00"), (10, "1500.00")] {
        let cmd = RevenueCmd::new("acme", 2025, month, 100)
            .manual_adjustments(adjustment.parse().unwrap());
        engine.calculate_monthly_revenue_with(cmd).await.unwrap();
    }

    let summary = engine.revenue_summary("acme").await.unwrap();
    assert_eq!(summary.report_count, 2);
    assert_eq!(summary.revenue_growth_pct, 50.0);
    assert_eq!(summary.profit_growth_pct, 50.0);
    assert_eq!(summary.consecutive_profitable_months, 2);
    assert_eq!(summary.average_monthly_revenue, Money::new(125_000));

    let empty = engine.revenue_summary("initech").await.unwrap();
    assert_eq!(empty, engine::RevenueSummary::default());
}

#[tokio::test]
async fn monthly_batch_covers_every_company_once() {
    let (year, month) = Period::previous_month(Utc::now());
    let gateway = MemoryGateway::new();
    gateway.add_account("acc-1", "acme");
    gateway.add_account("acc-2", "acme");
    gateway.add_account("acc-3", "globex");
    gateway.add_account("acc-4", "initech");
    gateway.set_feed(
        "acc-1",
        vec![credit(Some("m-1"), day(year, month, 10), 500_000, "Order")],
    );
    let engine = engine_with_db(gateway).await;
    let shares = Arc::new(FixedShares(HashMap::from([
        ("acme".to_string(), 100),
        ("globex".to_string(), 50),
    ])));

    let reports = engine
        .run_monthly_revenue_calculation(shares.clone())
        .await
        .unwrap();
    let companies: Vec<&str> = reports.iter().map(|r| r.company_id.as_str()).collect();
    assert_eq!(companies, vec!["acme", "globex"]);
    assert!(reports.iter().all(|r| r.report_month == month));
    assert_eq!(reports[0].inputs.total_deposits, Money::new(500_000));

    let again = engine.run_monthly_revenue_calculation(shares).await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn reset_store_wipes_everything() {
    let engine = engine_with_db(october_gateway()).await;
    engine
        .calculate_monthly_revenue("acme", 2025, 10, 1000)
        .await
        .unwrap();

    engine.reset_store().await.unwrap();

    assert!(engine.transactions("acme", None).await.unwrap().is_empty());
    assert!(engine.sync_history("acme", 10).await.unwrap().is_empty());
    assert_eq!(engine.report_statistics().await.unwrap().total_reports, 0);
    engine
        .calculate_monthly_revenue("acme", 2025, 10, 1000)
        .await
        .unwrap();
}

#[tokio::test]
async fn every_account_is_synced_before_the_report() {
    let gateway = MemoryGateway::new();
    gateway.add_account("acc-1", "acme");
    gateway.add_account("acc-2", "acme");
    gateway.set_feed(
        "acc-1",
        vec![credit(Some("m-1"), day(2025, 10, 6), 100_000, "Retail settlement")],
    );
    gateway.set_feed(
        "acc-2",
        vec![credit(Some("m-2"), day(2025, 10, 7), 900_000, "Wholesale order")],
    );
    let engine = engine_with_db(gateway.clone()).await;

    let report = engine
        .calculate_monthly_revenue("acme", 2025, 10, 100)
        .await
        .unwrap();
    assert_eq!(report.inputs.total_deposits, Money::new(1_000_000));
    assert_eq!(report.transaction_count, 2);
    assert!(gateway.last_sync("acc-1").is_some());
    assert!(gateway.last_sync("acc-2").is_some());
}

#[tokio::test]
async fn corrected_transaction_no_longer_blocks_auto_verification() {
    let gateway = MemoryGateway::new();
    gateway.add_account("acc-1", "acme");
    gateway.set_feed(
        "acc-1",
        vec![credit(Some("c-1"), day(2025, 10, 8), 0, "Retail settlement")],
    );
    let engine = engine_with_db(gateway.clone()).await;
    let period = Period::month(2025, 10).unwrap();
    engine
        .sync_all_accounts(Some(period.start), Some(period.end_of_day()), false)
        .await
        .unwrap();

    gateway.set_feed(
        "acc-1",
        vec![credit(Some("c-1"), day(2025, 10, 8), 50_000, "Retail settlement")],
    );
    engine
        .sync_all_accounts(Some(period.start), Some(period.end_of_day()), true)
        .await
        .unwrap();

    let report = engine
        .calculate_monthly_revenue("acme", 2025, 10, 100)
        .await
        .unwrap();
    assert_eq!(report.anomaly_count, 0);
    assert_eq!(report.status, ReportStatus::AutoVerified);
    assert_eq!(report.inputs.total_deposits, Money::new(50_000));
}

#[tokio::test]
async fn overflowing_month_is_rejected() {
    let gateway = MemoryGateway::new();
    gateway.add_account("acc-1", "acme");
    let engine = engine_with_db(gateway).await;
    for (id, date) in [("x-1", day(2025, 10, 2)), ("x-2", day(2025, 10, 3))] {
        let raw = credit(Some(id), date, i64::MAX - 10, "Wire");
        engine
            .process_incoming("acme", "acc-1", &raw, false)
            .await
            .unwrap();
    }

    let err = engine
        .calculate_monthly_revenue("acme", 2025, 10, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    assert!(
        engine
            .revenue_report_for_month("acme", 2025, 10)
            .await
            .unwrap()
            .is_none()
    );
}
