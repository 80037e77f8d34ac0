use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum BankTransactions {
    Table,
    Id,
    CompanyId,
    BankAccountId,
    TransactionDate,
    Kind,
    AmountMinor,
    Currency,
    BalanceAfterMinor,
    Description,
    Reference,
    BankReference,
    Category,
    IsAnomalous,
    RawPayload,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TransactionAnomalies {
    Table,
    Id,
    TransactionId,
    CompanyId,
    Kind,
    Severity,
    Message,
    DetectedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BankTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BankTransactions::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BankTransactions::CompanyId).string().not_null())
                    .col(
                        ColumnDef::new(BankTransactions::BankAccountId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BankTransactions::TransactionDate)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BankTransactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(BankTransactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BankTransactions::Currency).string().not_null())
                    .col(ColumnDef::new(BankTransactions::BalanceAfterMinor).big_integer())
                    .col(
                        ColumnDef::new(BankTransactions::Description)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(BankTransactions::Reference).string())
                    .col(ColumnDef::new(BankTransactions::BankReference).string())
                    .col(
                        ColumnDef::new(BankTransactions::Category)
                            .string()
                            .not_null()
                            .default("uncategorized"),
                    )
                    .col(
                        ColumnDef::new(BankTransactions::IsAnomalous)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(BankTransactions::RawPayload).text())
                    .col(
                        ColumnDef::new(BankTransactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BankTransactions::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // NULL bank references never collide, so only referenced rows are
        // constrained.
        manager
            .create_index(
                Index::create()
                    .name("idx-bank_transactions-company_id-bank_reference-unique")
                    .table(BankTransactions::Table)
                    .col(BankTransactions::CompanyId)
                    .col(BankTransactions::BankReference)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bank_transactions-company_id-transaction_date")
                    .table(BankTransactions::Table)
                    .col(BankTransactions::CompanyId)
                    .col(BankTransactions::TransactionDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bank_transactions-bank_account_id")
                    .table(BankTransactions::Table)
                    .col(BankTransactions::BankAccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TransactionAnomalies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TransactionAnomalies::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TransactionAnomalies::TransactionId)
                            .blob()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionAnomalies::CompanyId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TransactionAnomalies::Kind).string().not_null())
                    .col(
                        ColumnDef::new(TransactionAnomalies::Severity)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionAnomalies::Message)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionAnomalies::DetectedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transaction_anomalies-transaction_id")
                            .from(
                                TransactionAnomalies::Table,
                                TransactionAnomalies::TransactionId,
                            )
                            .to(BankTransactions::Table, BankTransactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transaction_anomalies-transaction_id-kind-unique")
                    .table(TransactionAnomalies::Table)
                    .col(TransactionAnomalies::TransactionId)
                    .col(TransactionAnomalies::Kind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transaction_anomalies-company_id")
                    .table(TransactionAnomalies::Table)
                    .col(TransactionAnomalies::CompanyId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TransactionAnomalies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BankTransactions::Table).to_owned())
            .await?;
        Ok(())
    }
}
