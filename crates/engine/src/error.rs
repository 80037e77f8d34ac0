//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`KeyNotFound`] thrown when an account or a report does not exist.
//! - [`ExistingKey`] thrown when a monthly report is already present.
//! - [`Gateway`] thrown when the banking gateway cannot answer.
//!
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`Gateway`]: EngineError::Gateway
use sea_orm::DbErr;
use thiserror::Error;

/// Errors reported by a [`BankingGateway`](crate::BankingGateway)
/// implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Transport(String),
    #[error("gateway answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed gateway payload: {0}")]
    Decode(String),
}

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidValue(a), Self::InvalidValue(b)) => a == b,
            (Self::InvalidPeriod(a), Self::InvalidPeriod(b)) => a == b,
            (Self::Configuration(a), Self::Configuration(b)) => a == b,
            (Self::Gateway(a), Self::Gateway(b)) => a == b,
            (Self::Serialization(a), Self::Serialization(b)) => a.to_string() == b.to_string(),
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
