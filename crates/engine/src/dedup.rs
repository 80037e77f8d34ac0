//! Fallback duplicate matching.
//!
//! A transaction with a `bank_reference` is identified by it, exactly. Without
//! one the engine falls back to `(amount, calendar day, description)`, which
//! can both over- and under-match. The description comparison is pluggable
//! through [`DedupStrategy`], and every fallback match is reported as low
//! confidence.

use std::fmt;

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

pub trait DedupStrategy: fmt::Debug + Send + Sync {
    /// Whether two descriptions of transactions sharing amount and day denote
    /// the same event.
    fn same_description(&self, stored: &str, incoming: &str) -> bool;
}

/// Byte-for-byte equal descriptions.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactDescription;

impl DedupStrategy for ExactDescription {
    fn same_description(&self, stored: &str, incoming: &str) -> bool {
        stored == incoming
    }
}

/// Descriptions equal after normalization: NFKD without combining marks,
/// lowercase, whitespace collapsed.
#[derive(Clone, Copy, Debug, Default)]
pub struct NormalizedDescription;

impl DedupStrategy for NormalizedDescription {
    fn same_description(&self, stored: &str, incoming: &str) -> bool {
        normalize_description(stored) == normalize_description(incoming)
    }
}

pub fn normalize_description(value: &str) -> String {
    let folded: String = value
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_strategy_is_strict() {
        assert!(ExactDescription.same_description("Invoice 7", "Invoice 7"));
        assert!(!ExactDescription.same_description("Invoice 7", "INVOICE  7"));
    }

    #[test]
    fn normalized_strategy_ignores_case_accents_and_spacing() {
        assert!(NormalizedDescription.same_description("Café  Roma", "cafe roma"));
        assert!(NormalizedDescription.same_description(" Invoice\t7 ", "INVOICE 7"));
        assert!(!NormalizedDescription.same_description("Invoice 7", "Invoice 8"));
    }

    #[test]
    fn normalize_folds_compatibility_forms() {
        assert_eq!(normalize_description("ＡＢＣ"), "abc");
    }
}
