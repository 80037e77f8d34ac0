use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
};

use sea_orm::{DatabaseConnection, EntityTrait, TransactionTrait};

use crate::{
    BankingGateway, DedupStrategy, EngineConfig, EngineError, ExactDescription, ResultEngine,
    anomalies, revenue_reports, sync_results, transactions,
};

mod anomalies_ops;
mod batch;
mod ingest;
mod reports;
mod sync;

pub use anomalies_ops::AnomalyScan;
pub use ingest::IngestOutcome;
pub use reports::{ReportFilter, ReportPage, ReportStatistics};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

type ReportKey = (String, i32, u32);

/// Entry point of the engine. Cheap to clone: clones share the database
/// pool, the gateway and the per-period report locks.
#[derive(Clone)]
pub struct Engine {
    database: DatabaseConnection,
    gateway: Arc<dyn BankingGateway>,
    dedup: Arc<dyn DedupStrategy>,
    config: EngineConfig,
    report_locks: Arc<Mutex<HashMap<ReportKey, Arc<tokio::sync::Mutex<()>>>>>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("dedup", &self.dedup)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Deletes every row owned by the engine: transactions, anomalies,
    /// reports and sync history. Meant for tests and operator resets.
    pub async fn reset_store(&self) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            anomalies::Entity::delete_many().exec(&db_tx).await?;
            transactions::Entity::delete_many().exec(&db_tx).await?;
            revenue_reports::Entity::delete_many().exec(&db_tx).await?;
            sync_results::Entity::delete_many().exec(&db_tx).await?;
            Ok::<(), EngineError>(())
        })?;
        if let Ok(mut locks) = self.report_locks.lock() {
            locks.clear();
        }
        tracing::info!("engine store reset");
        Ok(())
    }

    /// Mutex serializing report creation for one `(company, year, month)`.
    fn report_lock(&self, company_id: &str, year: i32, month: u32) -> Arc<tokio::sync::Mutex<()>> {
        let key = (company_id.to_string(), year, month);
        match self.report_locks.lock() {
            Ok(mut locks) => locks.entry(key).or_default().clone(),
            Err(poisoned) => poisoned.into_inner().entry(key).or_default().clone(),
        }
    }

    /// Drops the map entry of a period once `lock` is its last outside holder.
    fn release_report_lock(
        &self,
        company_id: &str,
        year: i32,
        month: u32,
        lock: Arc<tokio::sync::Mutex<()>>,
    ) {
        let key = (company_id.to_string(), year, month);
        let mut locks = match self.report_locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Clones are only handed out under the map lock, so the count is stable here.
        if locks.get(&key).is_some_and(|held| Arc::ptr_eq(held, &lock))
            && Arc::strong_count(&lock) == 2
        {
            locks.remove(&key);
        }
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    gateway: Option<Arc<dyn BankingGateway>>,
    dedup: Option<Arc<dyn DedupStrategy>>,
    config: EngineConfig,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Pass the required banking gateway
    pub fn gateway(mut self, gateway: Arc<dyn BankingGateway>) -> EngineBuilder {
        self.gateway = Some(gateway);
        self
    }

    /// Override the fallback dedup strategy (default: [`ExactDescription`]).
    pub fn dedup(mut self, dedup: Arc<dyn DedupStrategy>) -> EngineBuilder {
        self.dedup = Some(dedup);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> EngineBuilder {
        self.config = config;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let gateway = self
            .gateway
            .ok_or_else(|| EngineError::Configuration("banking gateway is required".to_string()))?;
        if self.config.page_size == 0 || self.config.max_pages == 0 {
            return Err(EngineError::Configuration(
                "page_size and max_pages must be > 0".to_string(),
            ));
        }
        if self.config.sync_workers == 0 {
            return Err(EngineError::Configuration(
                "sync_workers must be > 0".to_string(),
            ));
        }

        Ok(Engine {
            database: self.database,
            gateway,
            dedup: self.dedup.unwrap_or_else(|| Arc::new(ExactDescription)),
            config: self.config,
            report_locks: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::{BankAccount, FetchPage, FetchRequest, GatewayError};

    struct NoAccounts;

    #[async_trait]
    impl BankingGateway for NoAccounts {
        async fn bank_account(&self, _id: &str) -> Result<Option<BankAccount>, GatewayError> {
            Ok(None)
        }

        async fn bank_accounts_by_company(
            &self,
            _company_id: &str,
        ) -> Result<Vec<BankAccount>, GatewayError> {
            Ok(Vec::new())
        }

        async fn all_bank_accounts(&self) -> Result<Vec<BankAccount>, GatewayError> {
            Ok(Vec::new())
        }

        async fn update_last_sync(&self, _id: &str, _at: DateTime<Utc>) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn fetch_transactions(
            &self,
            account_id: &str,
            _request: &FetchRequest,
        ) -> Result<FetchPage, GatewayError> {
            Err(GatewayError::Transport(format!("no account {account_id}")))
        }
    }

    fn held_locks(engine: &Engine) -> usize {
        engine.report_locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn report_lock_entry_goes_away_with_its_last_holder() {
        let engine = Engine::builder()
            .gateway(Arc::new(NoAccounts))
            .build()
            .await
            .unwrap();

        let first = engine.report_lock("acme", 2025, 10);
        let second = engine.report_lock("acme", 2025, 10);
        assert!(Arc::ptr_eq(&first, &second));
        let other = engine.report_lock("acme", 2025, 11);
        assert_eq!(held_locks(&engine), 2);

        engine.release_report_lock("acme", 2025, 10, first);
        assert_eq!(held_locks(&engine), 2);
        engine.release_report_lock("acme", 2025, 10, second);
        assert_eq!(held_locks(&engine), 1);
        engine.release_report_lock("acme", 2025, 11, other);
        assert_eq!(held_locks(&engine), 0);
    }
}
