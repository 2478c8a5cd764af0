//! The single-movement ledger primitive.
//!
//! `record_movement` updates the account row and appends the matching ledger
//! row on the caller's open database transaction, so both commit or neither
//! does. Every balance change flows through it except the cart settlement in
//! `ops/purchases`, which applies one debit for the whole cart and appends a
//! row per line under the same guarantees.

use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Identity, MoneyCents, ResultEngine, Transaction, TransactionDetail, WalletSource,
    accounts, transactions,
};

use super::Engine;

/// What a movement is allowed to do to the target account.
///
/// Adjustments are exempt from the funds check; cancellation, activation and
/// settlement additionally ignore the frozen flag, because those flows must
/// keep the books consistent no matter the account state.
#[derive(Clone, Copy, Debug)]
pub(super) struct MovementPolicy {
    pub enforce_funds: bool,
    pub enforce_frozen: bool,
}

impl MovementPolicy {
    /// Purchases, transfers, top-ups: every guard on.
    pub(super) const STRICT: MovementPolicy = MovementPolicy {
        enforce_funds: true,
        enforce_frozen: true,
    };
    /// Administrative adjustments: may overdraw, still blocked by freezes.
    pub(super) const ADJUSTMENT: MovementPolicy = MovementPolicy {
        enforce_funds: false,
        enforce_frozen: true,
    };
    /// Compensating entries and event settlement: always applied.
    pub(super) const BOOKKEEPING: MovementPolicy = MovementPolicy {
        enforce_funds: false,
        enforce_frozen: false,
    };
}

pub(super) struct MovementSpec<'a> {
    pub account: &'a accounts::Model,
    /// Signed minor units; negative = debit.
    pub amount_minor: i64,
    pub issuer: &'a Identity,
    pub description: Option<String>,
    pub group_id: Option<Uuid>,
    pub detail: TransactionDetail,
    pub policy: MovementPolicy,
}

impl Engine {
    /// Atomically moves money on one account: balance update + appended row.
    ///
    /// Runs on the caller's transaction; a precondition failure leaves
    /// nothing behind once the caller rolls back.
    pub(super) async fn record_movement(
        &self,
        db_tx: &DatabaseTransaction,
        spec: MovementSpec<'_>,
    ) -> ResultEngine<Transaction> {
        let account = spec.account;

        if spec.policy.enforce_frozen && account.frozen {
            return Err(EngineError::AccountFrozen(account.id.clone()));
        }

        let new_balance = account
            .balance_minor
            .checked_add(spec.amount_minor)
            .ok_or_else(|| EngineError::Validation("amount too large".to_string()))?;
        if spec.policy.enforce_funds && spec.amount_minor < 0 && new_balance < 0 {
            return Err(EngineError::InsufficientFunds(format!(
                "balance {}, needed {}",
                MoneyCents::new(account.balance_minor),
                MoneyCents::new(-spec.amount_minor)
            )));
        }

        let wallet_source = match account.kind.as_str() {
            "shared" => WalletSource::Shared,
            _ => WalletSource::Personal,
        };
        let tx = Transaction::new(
            Uuid::parse_str(&account.id)
                .map_err(|_| EngineError::KeyNotFound("account not exists".to_string()))?,
            wallet_source,
            spec.amount_minor,
            spec.issuer.user_id.clone(),
            spec.description,
            spec.group_id,
            spec.detail,
            Utc::now(),
        )?;

        let account_update = accounts::ActiveModel {
            id: ActiveValue::Set(account.id.clone()),
            balance_minor: ActiveValue::Set(new_balance),
            ..Default::default()
        };
        account_update.update(db_tx).await?;
        transactions::ActiveModel::from(&tx).insert(db_tx).await?;

        tracing::debug!(
            account = %account.id,
            amount = tx.amount_minor,
            kind = tx.kind().as_str(),
            "recorded movement"
        );
        Ok(tx)
    }

    /// Shifts a product's stock by `delta` units (signed, already multiplied
    /// by the depletion factor). Stock may go negative.
    pub(super) async fn apply_stock_delta(
        &self,
        db_tx: &DatabaseTransaction,
        product: &crate::products::Model,
        delta: f64,
    ) -> ResultEngine<()> {
        let update = crate::products::ActiveModel {
            id: ActiveValue::Set(product.id.clone()),
            stock: ActiveValue::Set(product.stock + delta),
            ..Default::default()
        };
        update.update(db_tx).await?;
        Ok(())
    }
}
