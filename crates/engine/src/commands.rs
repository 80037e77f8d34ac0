//! Command structs for engine operations.
//!
//! These types group the parameters of a sync run and of a monthly revenue
//! calculation, keeping call sites readable and avoiding long argument lists.

use chrono::{DateTime, Utc};

use crate::Money;

/// Sync one bank account of a company.
#[derive(Clone, Debug)]
pub struct SyncCmd {
    pub company_id: String,
    /// First account on file for the company when absent.
    pub bank_account_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Update already stored transactions instead of skipping them.
    pub force: bool,
}

impl SyncCmd {
    #[must_use]
    pub fn new(company_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            bank_account_id: None,
            from: None,
            to: None,
            force: false,
        }
    }

    #[must_use]
    pub fn bank_account(mut self, id: impl Into<String>) -> Self {
        self.bank_account_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Calculate the revenue report of one company for one calendar month.
#[derive(Clone, Debug)]
pub struct RevenueCmd {
    pub company_id: String,
    pub year: i32,
    pub month: u32,
    pub total_shares: u64,
    pub operating_costs: Money,
    pub other_expenses: Money,
    pub manual_adjustments: Money,
}

impl RevenueCmd {
    #[must_use]
    pub fn new(company_id: impl Into<String>, year: i32, month: u32, total_shares: u64) -> Self {
        Self {
            company_id: company_id.into(),
            year,
            month,
            total_shares,
            operating_costs: Money::ZERO,
            other_expenses: Money::ZERO,
            manual_adjustments: Money::ZERO,
        }
    }

    #[must_use]
    pub fn operating_costs(mut self, amount: Money) -> Self {
        self.operating_costs = amount;
        self
    }

    #[must_use]
    pub fn other_expenses(mut self, amount: Money) -> Self {
        self.other_expenses = amount;
        self
    }

    #[must_use]
    pub fn manual_adjustments(mut self, amount: Money) -> Self {
        self.manual_adjustments = amount;
        self
    }
}
