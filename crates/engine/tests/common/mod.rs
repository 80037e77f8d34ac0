#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};

use engine::{
    BankAccount, BankingGateway, Engine, EngineConfig, FetchPage, FetchRequest, GatewayError,
    GatewayTransaction, Money, PageSummary,
};
use migration::MigratorTrait;

/// In-memory gateway: accounts, per-account feeds and failure switches.
#[derive(Default)]
pub struct MemoryGateway {
    accounts: Mutex<Vec<BankAccount>>,
    feeds: Mutex<HashMap<String, Vec<GatewayTransaction>>>,
    failing_pages: Mutex<HashMap<String, u32>>,
    unreachable: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    endless: AtomicBool,
    fail_last_sync: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_account(&self, id: &str, company_id: &str) {
        self.accounts.lock().unwrap().push(BankAccount {
            id: id.to_string(),
            company_id: company_id.to_string(),
            account_number: format!("IT00{id}"),
            currency: "EUR".to_string(),
            last_sync_at: None,
        });
    }

    pub fn set_feed(&self, account_id: &str, feed: Vec<GatewayTransaction>) {
        self.feeds
            .lock()
            .unwrap()
            .insert(account_id.to_string(), feed);
    }

    /// Makes `page` of `account_id` fail with a transport error.
    pub fn fail_page(&self, account_id: &str, page: u32) {
        self.failing_pages
            .lock()
            .unwrap()
            .insert(account_id.to_string(), page);
    }

    /// Makes every fetch of `account_id` fail.
    pub fn unreachable(&self, account_id: &str) {
        self.unreachable
            .lock()
            .unwrap()
            .insert(account_id.to_string());
    }

    /// Makes every fetch of `account_id` panic.
    pub fn panicking(&self, account_id: &str) {
        self.panicking
            .lock()
            .unwrap()
            .insert(account_id.to_string());
    }

    /// Every page claims more pages follow.
    pub fn endless(&self) {
        self.endless.store(true, Ordering::SeqCst);
    }

    pub fn fail_last_sync(&self) {
        self.fail_last_sync.store(true, Ordering::SeqCst);
    }

    pub fn last_sync(&self, account_id: &str) -> Option<DateTime<Utc>> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == account_id)
            .and_then(|a| a.last_sync_at)
    }
}

#[async_trait]
impl BankingGateway for MemoryGateway {
    async fn bank_account(&self, id: &str) -> Result<Option<BankAccount>, GatewayError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn bank_accounts_by_company(
        &self,
        company_id: &str,
    ) -> Result<Vec<BankAccount>, GatewayError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn all_bank_accounts(&self) -> Result<Vec<BankAccount>, GatewayError> {
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn update_last_sync(&self, id: &str, at: DateTime<Utc>) -> Result<(), GatewayError> {
        if self.fail_last_sync.load(Ordering::SeqCst) {
            return Err(GatewayError::Status {
                status: 503,
                message: "accounts service down".to_string(),
            });
        }
        if let Some(account) = self.accounts.lock().unwrap().iter_mut().find(|a| a.id == id) {
            account.last_sync_at = Some(at);
        }
        Ok(())
    }

    async fn fetch_transactions(
        &self,
        account_id: &str,
        request: &FetchRequest,
    ) -> Result<FetchPage, GatewayError> {
        if self.panicking.lock().unwrap().contains(account_id) {
            panic!("gateway blew up on {account_id}");
        }
        if self.unreachable.lock().unwrap().contains(account_id)
            || self.failing_pages.lock().unwrap().get(account_id) == Some(&request.page)
        {
            return Err(GatewayError::Transport("connection reset".to_string()));
        }

        let in_range: Vec<GatewayTransaction> = self
            .feeds
            .lock()
            .unwrap()
            .get(account_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|t| t.date >= request.from && t.date <= request.to)
            .collect();

        let limit = request.limit as usize;
        let start = (request.page as usize - 1) * limit;
        let transactions: Vec<GatewayTransaction> =
            in_range.iter().skip(start).take(limit).cloned().collect();

        let mut summary = PageSummary::default();
        for t in &transactions {
            if t.kind == "credit" || t.kind == "CR" {
                summary.total_credits += Money::new(t.amount_minor);
            } else {
                summary.total_debits += Money::new(t.amount_minor);
            }
        }

        Ok(FetchPage {
            has_more: self.endless.load(Ordering::SeqCst) || start + limit < in_range.len(),
            transactions,
            summary,
        })
    }
}

pub fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

pub fn credit(
    id: Option<&str>,
    date: DateTime<Utc>,
    amount_minor: i64,
    description: &str,
) -> GatewayTransaction {
    raw(id, date, "credit", amount_minor, description)
}

pub fn debit(
    id: Option<&str>,
    date: DateTime<Utc>,
    amount_minor: i64,
    description: &str,
) -> GatewayTransaction {
    raw(id, date, "DR", amount_minor, description)
}

fn raw(
    id: Option<&str>,
    date: DateTime<Utc>,
    kind: &str,
    amount_minor: i64,
    description: &str,
) -> GatewayTransaction {
    GatewayTransaction {
        transaction_id: id.map(ToString::to_string),
        date,
        kind: kind.to_string(),
        amount_minor,
        currency: "EUR".to_string(),
        balance_after_minor: None,
        description: description.to_string(),
        reference: None,
    }
}

pub async fn engine_with_db(gateway: Arc<MemoryGateway>) -> Engine {
    engine_with_config(gateway, EngineConfig::default()).await
}

pub async fn database() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn engine_with_config(gateway: Arc<MemoryGateway>, config: EngineConfig) -> Engine {
    Engine::builder()
        .database(database().await)
        .gateway(gateway)
        .config(config)
        .build()
        .await
        .unwrap()
}
