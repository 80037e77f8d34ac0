//! Banking gateway boundary.
//!
//! The engine never talks to a bank directly: it goes through a
//! [`BankingGateway`], which owns the linked accounts and serves their
//! transaction feed page by page. Transport, authentication and retries are
//! the implementation's business.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GatewayError, Money};

/// A company's linked external account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: String,
    pub company_id: String,
    pub account_number: String,
    pub currency: String,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// One transaction as the gateway reports it, before normalization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTransaction {
    /// External transaction id, when the bank provides one.
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub date: DateTime<Utc>,
    /// Gateway vocabulary: `credit`, `debit`, `CR`, `DR`, ...
    #[serde(rename = "type")]
    pub kind: String,
    pub amount_minor: i64,
    pub currency: String,
    #[serde(default)]
    pub balance_after_minor: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub account_number: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub total_credits: Money,
    pub total_debits: Money,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPage {
    pub transactions: Vec<GatewayTransaction>,
    #[serde(default)]
    pub summary: PageSummary,
    pub has_more: bool,
}

#[async_trait]
pub trait BankingGateway: Send + Sync {
    /// `Ok(None)` when the account is unknown.
    async fn bank_account(&self, id: &str) -> Result<Option<BankAccount>, GatewayError>;

    async fn bank_accounts_by_company(
        &self,
        company_id: &str,
    ) -> Result<Vec<BankAccount>, GatewayError>;

    async fn all_bank_accounts(&self) -> Result<Vec<BankAccount>, GatewayError>;

    async fn update_last_sync(&self, id: &str, at: DateTime<Utc>) -> Result<(), GatewayError>;

    async fn fetch_transactions(
        &self,
        account_id: &str,
        request: &FetchRequest,
    ) -> Result<FetchPage, GatewayError>;
}

/// Source of a company's total share count, used to compute dividends per
/// share.
#[async_trait]
pub trait SharesLookup: Send + Sync {
    async fn total_shares(&self, company_id: &str) -> Result<u64, crate::EngineError>;
}
