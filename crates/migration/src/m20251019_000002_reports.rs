use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum RevenueReports {
    Table,
    Id,
    CompanyId,
    ReportYear,
    ReportMonth,
    TotalDepositsMinor,
    TotalWithdrawalsMinor,
    OperatingCostsMinor,
    OtherExpensesMinor,
    ManualAdjustmentsMinor,
    NetRevenueMinor,
    PlatformFeeMinor,
    NetProfitMinor,
    DividendPoolMinor,
    ReinvestmentMinor,
    DividendPerShareMinor,
    TotalShares,
    Status,
    TransactionCount,
    AnomalyCount,
    VerifiedBy,
    VerifiedAt,
    VerificationNotes,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum SyncResults {
    Table,
    Id,
    CompanyId,
    BankAccountId,
    Status,
    FromDate,
    ToDate,
    PagesFetched,
    TransactionsFetched,
    TransactionsInserted,
    TransactionsUpdated,
    TransactionsSkipped,
    LowConfidenceMatches,
    TotalDepositsMinor,
    TotalWithdrawalsMinor,
    Errors,
    Warnings,
    StartedAt,
    CompletedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RevenueReports::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RevenueReports::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RevenueReports::CompanyId).string().not_null())
                    .col(ColumnDef::new(RevenueReports::ReportYear).integer().not_null())
                    .col(ColumnDef::new(RevenueReports::ReportMonth).integer().not_null())
                    .col(
                        ColumnDef::new(RevenueReports::TotalDepositsMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RevenueReports::TotalWithdrawalsMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RevenueReports::OperatingCostsMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RevenueReports::OtherExpensesMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RevenueReports::ManualAdjustmentsMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RevenueReports::NetRevenueMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RevenueReports::PlatformFeeMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RevenueReports::NetProfitMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RevenueReports::DividendPoolMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RevenueReports::ReinvestmentMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RevenueReports::DividendPerShareMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RevenueReports::TotalShares)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(RevenueReports::Status).string().not_null())
                    .col(
                        ColumnDef::new(RevenueReports::TransactionCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RevenueReports::AnomalyCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(RevenueReports::VerifiedBy).string())
                    .col(ColumnDef::new(RevenueReports::VerifiedAt).timestamp())
                    .col(ColumnDef::new(RevenueReports::VerificationNotes).text())
                    .col(ColumnDef::new(RevenueReports::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(RevenueReports::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-revenue_reports-company_id-year-month-unique")
                    .table(RevenueReports::Table)
                    .col(RevenueReports::CompanyId)
                    .col(RevenueReports::ReportYear)
                    .col(RevenueReports::ReportMonth)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-revenue_reports-status")
                    .table(RevenueReports::Table)
                    .col(RevenueReports::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SyncResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncResults::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncResults::CompanyId).string().not_null())
                    .col(ColumnDef::new(SyncResults::BankAccountId).string().not_null())
                    .col(ColumnDef::new(SyncResults::Status).string().not_null())
                    .col(ColumnDef::new(SyncResults::FromDate).timestamp().not_null())
                    .col(ColumnDef::new(SyncResults::ToDate).timestamp().not_null())
                    .col(
                        ColumnDef::new(SyncResults::PagesFetched)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncResults::TransactionsFetched)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncResults::TransactionsInserted)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncResults::TransactionsUpdated)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncResults::TransactionsSkipped)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncResults::LowConfidenceMatches)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncResults::TotalDepositsMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncResults::TotalWithdrawalsMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncResults::Errors)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(SyncResults::Warnings)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(SyncResults::StartedAt).timestamp().not_null())
                    .col(ColumnDef::new(SyncResults::CompletedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-sync_results-company_id-started_at")
                    .table(SyncResults::Table)
                    .col(SyncResults::CompanyId)
                    .col(SyncResults::StartedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncResults::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RevenueReports::Table).to_owned())
            .await?;
        Ok(())
    }
}
