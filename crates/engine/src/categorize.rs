//! Keyword-based auto categorization.

use crate::{Category, TransactionType};

const CREDIT_RULES: &[(&[&str], Category)] = &[
    (&["refund", "chargeback", "reversal"], Category::Refund),
    (&["interest"], Category::Interest),
    (&["transfer", "internal"], Category::Transfer),
];

const DEBIT_RULES: &[(&[&str], Category)] = &[
    (&["salary", "payroll", "wage"], Category::Payroll),
    (&["tax", "vat", "irs"], Category::Tax),
    (&["fee", "charge", "commission"], Category::BankFee),
    (&["transfer", "internal"], Category::Transfer),
    (&["refund"], Category::Refund),
    (
        &["rent", "utility", "utilities", "supplier", "invoice", "subscription", "hosting"],
        Category::OperatingExpense,
    ),
];

/// Picks a category from the transaction type and its description.
///
/// Credits with no matching keyword are sales; debits with no matching keyword
/// stay [`Category::Uncategorized`] for a later sweep or a human.
pub fn categorize(kind: TransactionType, description: &str) -> Category {
    let description = description.to_lowercase();
    let words: Vec<&str> = description
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let (rules, fallback) = match kind {
        TransactionType::Credit => (CREDIT_RULES, Category::Sales),
        TransactionType::Debit => (DEBIT_RULES, Category::Uncategorized),
    };

    rules
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| words.contains(k)))
        .map_or(fallback, |(_, category)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credits_default_to_sales() {
        assert_eq!(
            categorize(TransactionType::Credit, "Payment from ACME Corp"),
            Category::Sales
        );
        assert_eq!(
            categorize(TransactionType::Credit, "REFUND order #12"),
            Category::Refund
        );
    }

    #[test]
    fn debits_match_keywords_on_word_boundaries() {
        assert_eq!(
            categorize(TransactionType::Debit, "October payroll run"),
            Category::Payroll
        );
        assert_eq!(
            categorize(TransactionType::Debit, "Monthly account fee"),
            Category::BankFee
        );
        assert_eq!(
            categorize(TransactionType::Debit, "Office rent - November"),
            Category::OperatingExpense
        );
        // "feeder" must not match "fee"
        assert_eq!(
            categorize(TransactionType::Debit, "Bird feeder"),
            Category::Uncategorized
        );
    }
}
