//! Year-to-date and trend analytics over a company's report history.

use serde::{Deserialize, Serialize};

use crate::{Money, RevenueReport};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueSummary {
    pub report_count: usize,
    pub ytd_revenue: Money,
    pub ytd_profit: Money,
    pub ytd_dividends: Money,
    /// Net revenue change of the newest month against the previous one, in %.
    pub revenue_growth_pct: f64,
    /// Net profit change of the newest month against the previous one, in %.
    pub profit_growth_pct: f64,
    pub average_monthly_revenue: Money,
    pub average_monthly_profit: Money,
    /// Mean of `dividend_pool / net_revenue × 100` over all reports.
    pub average_dividend_yield_pct: f64,
    pub consecutive_profitable_months: u32,
}

fn growth_pct(current: Money, previous: Money) -> f64 {
    if previous.is_zero() {
        return 0.0;
    }
    (current - previous).minor() as f64 * 100.0 / previous.minor().unsigned_abs() as f64
}

/// Summarizes `reports`, which must be sorted newest first (year, then
/// month). `current_year` selects the year-to-date window.
pub fn summarize(reports: &[RevenueReport], current_year: i32) -> RevenueSummary {
    if reports.is_empty() {
        return RevenueSummary::default();
    }

    let (ytd_revenue, ytd_profit, ytd_dividends) = reports
        .iter()
        .filter(|r| r.report_year == current_year)
        .fold((Money::ZERO, Money::ZERO, Money::ZERO), |acc, r| {
            (
                acc.0 + r.distribution.net_revenue,
                acc.1 + r.distribution.net_profit,
                acc.2 + r.distribution.dividend_pool,
            )
        });

    let (revenue_growth_pct, profit_growth_pct) = match reports {
        [newest, previous, ..] => (
            growth_pct(
                newest.distribution.net_revenue,
                previous.distribution.net_revenue,
            ),
            growth_pct(
                newest.distribution.net_profit,
                previous.distribution.net_profit,
            ),
        ),
        _ => (0.0, 0.0),
    };

    let count = reports.len() as u64;
    let total_revenue: Money = reports.iter().map(|r| r.distribution.net_revenue).sum();
    let total_profit: Money = reports.iter().map(|r| r.distribution.net_profit).sum();
    let yield_sum: f64 = reports
        .iter()
        .map(|r| {
            r.distribution
                .dividend_pool
                .percent_of(r.distribution.net_revenue)
        })
        .sum();

    let consecutive_profitable_months = reports
        .iter()
        .take_while(|r| r.distribution.net_profit.is_positive())
        .count() as u32;

    RevenueSummary {
        report_count: reports.len(),
        ytd_revenue,
        ytd_profit,
        ytd_dividends,
        revenue_growth_pct,
        profit_growth_pct,
        average_monthly_revenue: total_revenue.per_part(count),
        average_monthly_profit: total_profit.per_part(count),
        average_dividend_yield_pct: yield_sum / reports.len() as f64,
        consecutive_profitable_months,
    }
}
