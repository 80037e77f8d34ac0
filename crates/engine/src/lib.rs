//! Revenue synchronization and distribution engine.
//!
//! The [`Engine`] pulls transaction feeds from a [`BankingGateway`], stores
//! them idempotently, flags anomalies, and turns each company's month into a
//! [`RevenueReport`] with its profit split.

pub use anomalies::{AnomalyType, Severity, TransactionAnomaly};
pub use commands::{RevenueCmd, SyncCmd};
pub use config::EngineConfig;
pub use dedup::{DedupStrategy, ExactDescription, NormalizedDescription};
pub use distribution::{
    DIVIDEND_POOL_BP, PLATFORM_FEE_BP, ProfitDistribution, REINVESTMENT_BP, RevenueInputs,
};
pub use error::{EngineError, GatewayError};
pub use gateway::{
    BankAccount, BankingGateway, FetchPage, FetchRequest, GatewayTransaction, PageSummary,
    SharesLookup,
};
pub use money::Money;
pub use ops::{
    AnomalyScan, Engine, EngineBuilder, IngestOutcome, ReportFilter, ReportPage, ReportStatistics,
};
pub use period::Period;
pub use revenue_reports::{ReportStatus, RevenueReport, ReviewDecision};
pub use summary::{RevenueSummary, summarize};
pub use sync_results::{SyncResult, SyncStatus};
pub use transactions::{BankTransaction, Category, TransactionType};

mod anomalies;
pub mod categorize;
mod commands;
mod config;
mod dedup;
mod distribution;
mod error;
mod gateway;
mod money;
mod ops;
mod period;
mod revenue_reports;
pub mod rules;
mod summary;
mod sync_results;
mod transactions;

type ResultEngine<T> = Result<T, EngineError>;
