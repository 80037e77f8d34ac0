use std::collections::HashMap;

use async_trait::async_trait;
use engine::{EngineError, SharesLookup};

/// Share counts taken from the `[shares]` settings section.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredShares {
    shares: HashMap<String, u64>,
}

impl ConfiguredShares {
    pub fn new(shares: HashMap<String, u64>) -> Self {
        Self { shares }
    }
}

#[async_trait]
impl SharesLookup for ConfiguredShares {
    async fn total_shares(&self, company_id: &str) -> Result<u64, EngineError> {
        self.shares
            .get(company_id)
            .copied()
            .ok_or_else(|| EngineError::KeyNotFound(format!("shares of {company_id}")))
    }
}
