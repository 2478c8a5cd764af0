//! Ledger & settlement engine for club treasuries.
//!
//! Member wallets and shared purses hold minor-unit balances; every movement
//! is an appended, immutable ledger row written in the same storage
//! transaction as the balance change. On top of that primitive sit the
//! purchase processor, peer transfers and bulk adjustments, the cancellation
//! engine (compensating entries, never edits), and the weighted settlement
//! of shared-cost events.

pub use accounts::{Account, AccountOwner};
pub use commands::{
    AdjustmentBatchCmd, EventCmd, ExpenseCmd, PurchaseCmd, PurchaseLine, TopUpCmd, TransferCmd,
};
pub use error::EngineError;
pub use events::{Event, EventKind, EventStatus};
pub use expenses::Expense;
pub use identity::{Identity, Role, ShopCapability, ShopGrant};
pub use money::MoneyCents;
pub use ops::{
    ActivationOutcome, AdjustmentBatchOutcome, AdjustmentFailure, DepositWarning, Engine,
    EngineBuilder, SettlementPreview, SettlementShare,
};
pub use participants::Participant;
pub use transactions::{
    Transaction, TransactionDetail, TransactionKind, TransactionStatus, WalletSource,
};

pub mod accounts;
mod commands;
mod error;
pub mod events;
pub mod expense_splits;
pub mod expenses;
mod identity;
mod money;
mod ops;
pub mod participants;
pub mod products;
pub mod transactions;

type ResultEngine<T> = Result<T, EngineError>;
