//! Anomaly rule catalogue.
//!
//! Each rule maps to one [`AnomalyType`] with a fixed [`Severity`]. The rules
//! are pure: everything they need from storage is gathered beforehand into a
//! [`ValidationContext`].

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{AnomalyType, BankTransaction, Money, Severity, TransactionAnomaly};

/// Minimum number of prior transactions before the envelope rule applies.
pub const ENVELOPE_MIN_HISTORY: u64 = 5;
/// Amount-over-mean factor that raises a `high` envelope anomaly.
pub const ENVELOPE_HIGH_FACTOR: i64 = 5;
/// Amount-over-mean factor that raises a `critical` envelope anomaly.
pub const ENVELOPE_CRITICAL_FACTOR: i64 = 10;

/// Historical envelope of one account for one transaction type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    pub samples: u64,
    pub total: Money,
}

impl Envelope {
    /// Mean amount, `None` without history.
    pub fn mean(&self) -> Option<Money> {
        (self.samples > 0).then(|| self.total.per_part(self.samples))
    }
}

#[derive(Clone, Debug)]
pub struct ValidationContext {
    pub now: DateTime<Utc>,
    /// Prior transactions of the same account and type, excluding the one
    /// being validated.
    pub envelope: Envelope,
    /// Other transactions of the company with the same type, amount and
    /// calendar day.
    pub same_day_twins: u64,
}

impl ValidationContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            envelope: Envelope::default(),
            same_day_twins: 0,
        }
    }
}

/// Runs every rule against `tx`. An empty result means the transaction is
/// clean.
pub fn validate(tx: &BankTransaction, ctx: &ValidationContext) -> Vec<TransactionAnomaly> {
    let mut found: Vec<(AnomalyType, Severity, String)> = Vec::new();

    if tx.amount.minor() <= 0 {
        found.push((
            AnomalyType::NonPositiveAmount,
            Severity::High,
            format!("amount {} is not positive", tx.amount),
        ));
    }

    if tx.reference.is_none() && tx.bank_reference.is_none() {
        found.push((
            AnomalyType::MissingReference,
            Severity::Low,
            "transaction carries no reference".to_string(),
        ));
    }

    if ctx.same_day_twins > 0 {
        found.push((
            AnomalyType::PossibleDuplicate,
            Severity::Medium,
            format!(
                "{} other {} of {} on {}",
                ctx.same_day_twins,
                tx.kind.as_str(),
                tx.amount,
                tx.transaction_date.date_naive()
            ),
        ));
    }

    if tx.transaction_date > ctx.now + Duration::days(1) {
        found.push((
            AnomalyType::FutureDated,
            Severity::Medium,
            format!("dated {} in the future", tx.transaction_date),
        ));
    }

    if ctx.envelope.samples >= ENVELOPE_MIN_HISTORY
        && let Some(mean) = ctx.envelope.mean()
        && mean.is_positive()
    {
        let amount = i128::from(tx.amount.minor());
        let mean_minor = i128::from(mean.minor());
        let severity = if amount > mean_minor * i128::from(ENVELOPE_CRITICAL_FACTOR) {
            Some(Severity::Critical)
        } else if amount > mean_minor * i128::from(ENVELOPE_HIGH_FACTOR) {
            Some(Severity::High)
        } else {
            None
        };
        if let Some(severity) = severity {
            found.push((
                AnomalyType::OutsideEnvelope,
                severity,
                format!("amount {} against a mean of {mean}", tx.amount),
            ));
        }
    }

    found
        .into_iter()
        .map(|(kind, severity, message)| TransactionAnomaly {
            id: Uuid::new_v4(),
            transaction_id: tx.id,
            company_id: tx.company_id.clone(),
            kind,
            severity,
            message,
            detected_at: ctx.now,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{Category, TransactionType};

    fn tx(amount: i64) -> BankTransaction {
        let at = Utc.with_ymd_and_hms(2025, 10, 3, 9, 0, 0).unwrap();
        BankTransaction {
            id: Uuid::new_v4(),
            company_id: "acme".to_string(),
            bank_account_id: "acc-1".to_string(),
            transaction_date: at,
            kind: TransactionType::Credit,
            amount: Money::new(amount),
            currency: "USD".to_string(),
            balance_after: None,
            description: "Invoice 42".to_string(),
            reference: Some("INV-42".to_string()),
            bank_reference: Some("bank-1".to_string()),
            category: Category::Sales,
            is_anomalous: false,
            raw_payload: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn ctx() -> ValidationContext {
        ValidationContext::new(Utc.with_ymd_and_hms(2025, 10, 10, 0, 0, 0).unwrap())
    }

    fn kinds(found: &[TransactionAnomaly]) -> Vec<(AnomalyType, Severity)> {
        found.iter().map(|a| (a.kind, a.severity)).collect()
    }

    #[test]
    fn clean_transaction_has_no_anomalies() {
        assert!(validate(&tx(10_000), &ctx()).is_empty());
    }

    #[test]
    fn missing_references_are_low() {
        let mut t = tx(10_000);
        t.reference = None;
        t.bank_reference = None;
        assert_eq!(
            kinds(&validate(&t, &ctx())),
            vec![(AnomalyType::MissingReference, Severity::Low)]
        );
    }

    #[test]
    fn zero_amount_is_high() {
        assert_eq!(
            kinds(&validate(&tx(0), &ctx())),
            vec![(AnomalyType::NonPositiveAmount, Severity::High)]
        );
    }

    #[test]
    fn same_day_twins_flag_possible_duplicate() {
        let mut c = ctx();
        c.same_day_twins = 1;
        assert_eq!(
            kinds(&validate(&tx(10_000), &c)),
            vec![(AnomalyType::PossibleDuplicate, Severity::Medium)]
        );
    }

    #[test]
    fn far_future_date_is_flagged() {
        let mut t = tx(10_000);
        t.transaction_date = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap();
        assert_eq!(
            kinds(&validate(&t, &ctx())),
            vec![(AnomalyType::FutureDated, Severity::Medium)]
        );
    }

    #[test]
    fn envelope_needs_enough_history() {
        let mut c = ctx();
        c.envelope = Envelope {
            samples: ENVELOPE_MIN_HISTORY - 1,
            total: Money::new(4 * 100),
        };
        assert!(validate(&tx(1_000_000), &c).is_empty());
    }

    #[test]
    fn envelope_grades_high_and_critical() {
        let mut c = ctx();
        c.envelope = Envelope {
            samples: 5,
            total: Money::new(5 * 1_000),
        };

        assert!(validate(&tx(5_000), &c).is_empty());
        assert_eq!(
            kinds(&validate(&tx(5_001), &c)),
            vec![(AnomalyType::OutsideEnvelope, Severity::High)]
        );
        assert_eq!(
            kinds(&validate(&tx(10_001), &c)),
            vec![(AnomalyType::OutsideEnvelope, Severity::Critical)]
        );
    }
}
