//! Profit distribution.
//!
//! Pure arithmetic: no database, no gateway. Given the monthly totals of a
//! company it derives the net revenue and splits it into:
//!
//! - the platform fee (5% of net revenue)
//! - the dividend pool (60% of what remains)
//! - the reinvestment amount (the rest)
//!
//! All amounts are integer minor units. Each percentage product is rounded
//! half away from zero, and the reinvestment amount is the remainder of the net
//! profit, so `dividend_pool + reinvestment == net_profit` always holds.

use serde::{Deserialize, Serialize};

use crate::{EngineError, Money, ResultEngine};

/// Platform fee, in basis points of the net revenue.
pub const PLATFORM_FEE_BP: i64 = 500;

/// Dividend pool, in basis points of the net profit.
pub const DIVIDEND_POOL_BP: i64 = 6_000;

/// Reinvestment, in basis points of the net profit. Informational: the amount
/// itself is always computed as the remainder after the dividend pool.
pub const REINVESTMENT_BP: i64 = 4_000;

/// Monthly figures the net revenue is derived from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueInputs {
    pub total_deposits: Money,
    pub total_withdrawals: Money,
    pub operating_costs: Money,
    pub other_expenses: Money,
    pub manual_adjustments: Money,
}

impl RevenueInputs {
    /// Deposits minus withdrawals, costs and expenses, plus adjustments.
    pub fn net_revenue(&self) -> ResultEngine<Money> {
        self.total_deposits
            .checked_sub(self.total_withdrawals)
            .and_then(|v| v.checked_sub(self.operating_costs))
            .and_then(|v| v.checked_sub(self.other_expenses))
            .and_then(|v| v.checked_add(self.manual_adjustments))
            .ok_or_else(|| EngineError::InvalidAmount("net revenue out of range".to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitDistribution {
    pub net_revenue: Money,
    pub platform_fee: Money,
    pub net_profit: Money,
    pub dividend_pool: Money,
    pub reinvestment_amount: Money,
    pub dividend_per_share: Money,
}

impl ProfitDistribution {
    /// Splits a net revenue figure.
    ///
    /// `dividend_per_share` truncates toward zero so the sum paid out never
    /// exceeds the pool; with no shares it is zero.
    #[must_use]
    pub fn from_net_revenue(net_revenue: Money, total_shares: u64) -> Self {
        let platform_fee = net_revenue.share_bp(PLATFORM_FEE_BP);
        let net_profit = net_revenue - platform_fee;
        let dividend_pool = net_profit.share_bp(DIVIDEND_POOL_BP);
        let reinvestment_amount = net_profit - dividend_pool;

        Self {
            net_revenue,
            platform_fee,
            net_profit,
            dividend_pool,
            reinvestment_amount,
            dividend_per_share: dividend_pool.per_part(total_shares),
        }
    }

    pub fn compute(inputs: &RevenueInputs, total_shares: u64) -> ResultEngine<Self> {
        Ok(Self::from_net_revenue(inputs.net_revenue()?, total_shares))
    }
}
