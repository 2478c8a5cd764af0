//! Errors the engine can return.
//!
//! All engine operations return [`EngineError`] values instead of panicking;
//! the server maps each variant to an HTTP status code.

use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("\"{0}\" not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Account frozen: {0}")]
    AccountFrozen(String),
    #[error("Already cancelled: {0}")]
    AlreadyCancelled(String),
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
    #[error("Empty cart")]
    EmptyCart,
    #[error("Invalid product: {0}")]
    InvalidProduct(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::AccountFrozen(a), Self::AccountFrozen(b)) => a == b,
            (Self::AlreadyCancelled(a), Self::AlreadyCancelled(b)) => a == b,
            (Self::InvalidStateTransition(a), Self::InvalidStateTransition(b)) => a == b,
            (Self::EmptyCart, Self::EmptyCart) => true,
            (Self::InvalidProduct(a), Self::InvalidProduct(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
