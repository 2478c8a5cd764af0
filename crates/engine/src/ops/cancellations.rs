//! The cancellation engine.
//!
//! Nothing in the ledger is ever edited or deleted. Cancelling a row appends
//! a compensating entry with the opposite amount and flips both rows to
//! `Cancelled` in the same storage transaction, so the balance always equals
//! the sum of the completed rows. Purchase cancellations also put the sold
//! stock back at the product's current depletion factor.

use uuid::Uuid;

use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};

use crate::{
    EngineError, Identity, ResultEngine, Transaction, TransactionDetail, TransactionStatus,
    transactions,
};

use super::{Engine, movements::MovementPolicy, movements::MovementSpec, with_tx};

impl Engine {
    /// Reverses one completed ledger row.
    ///
    /// Allowed for admins and for the row's original issuer. Fails with
    /// [`EngineError::AlreadyCancelled`] on a second attempt; compensating
    /// entries are born cancelled and can never be reversed themselves.
    ///
    /// Returns the compensating entry.
    pub async fn cancel_transaction(
        &self,
        transaction_id: Uuid,
        identity: &Identity,
    ) -> ResultEngine<Transaction> {
        with_tx!(self, |db_tx| {
            let row = self.require_transaction(&db_tx, transaction_id).await?;
            if row.status != "completed" {
                return Err(EngineError::AlreadyCancelled(row.id));
            }
            if !identity.is_admin() && identity.user_id != row.issuer_id {
                return Err(EngineError::Forbidden(
                    "only the issuer or an admin can cancel a transaction".to_string(),
                ));
            }
            self.cancel_row(&db_tx, &row, identity).await
        })
    }

    /// Reverses every completed row of one group, all or nothing.
    ///
    /// Used to undo a whole cart, a transfer pair or a bulk adjustment in
    /// one go. Returns the compensating entries.
    pub async fn cancel_group(
        &self,
        group_id: Uuid,
        identity: &Identity,
    ) -> ResultEngine<Vec<Transaction>> {
        with_tx!(self, |db_tx| {
            let rows = transactions::Entity::find()
                .filter(transactions::Column::GroupId.eq(group_id.to_string()))
                .all(&db_tx)
                .await?;
            if rows.is_empty() {
                return Err(EngineError::KeyNotFound("group not exists".to_string()));
            }
            let completed: Vec<_> = rows
                .into_iter()
                .filter(|row| row.status == "completed")
                .collect();
            if completed.is_empty() {
                return Err(EngineError::AlreadyCancelled(group_id.to_string()));
            }
            if !identity.is_admin()
                && completed.iter().any(|row| row.issuer_id != identity.user_id)
            {
                return Err(EngineError::Forbidden(
                    "only the issuer or an admin can cancel a group".to_string(),
                ));
            }

            let mut reversals = Vec::with_capacity(completed.len());
            for row in &completed {
                reversals.push(self.cancel_row(&db_tx, row, identity).await?);
            }
            tracing::info!(group = %group_id, rows = reversals.len(), "cancelled group");
            Ok(reversals)
        })
    }

    /// Appends the compensating entry for `row` and flips both rows to
    /// `Cancelled`. Runs on the caller's transaction.
    pub(super) async fn cancel_row(
        &self,
        db_tx: &sea_orm::DatabaseTransaction,
        row: &transactions::Model,
        identity: &Identity,
    ) -> ResultEngine<Transaction> {
        let account_id = Uuid::parse_str(&row.account_id)
            .map_err(|_| EngineError::KeyNotFound("account not exists".to_string()))?;
        let account = self.require_account(db_tx, account_id).await?;

        let event_id = row
            .event_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| EngineError::Validation("invalid event id".to_string()))?;
        let reversal_of = Uuid::parse_str(&row.id)
            .map_err(|_| EngineError::KeyNotFound("transaction not exists".to_string()))?;
        let group_id = row
            .group_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| EngineError::Validation("invalid group id".to_string()))?;

        let mut compensation = self
            .record_movement(
                db_tx,
                MovementSpec {
                    account: &account,
                    amount_minor: -row.amount_minor,
                    issuer: identity,
                    description: row.description.clone(),
                    group_id,
                    detail: TransactionDetail::Refund {
                        reversal_of: Some(reversal_of),
                        event_id,
                    },
                    policy: MovementPolicy::BOOKKEEPING,
                },
            )
            .await?;

        // Put the sold stock back, valued at the product's current factor.
        if row.kind == "purchase"
            && let (Some(product_id), Some(quantity)) = (row.product_id.as_deref(), row.quantity)
            && let Some(product) = crate::products::Entity::find_by_id(product_id.to_string())
                .one(db_tx)
                .await?
        {
            self.apply_stock_delta(db_tx, &product, quantity as f64 * product.depletion_factor)
                .await?;
        }

        for id in [row.id.clone(), compensation.id.to_string()] {
            let update = transactions::ActiveModel {
                id: ActiveValue::Set(id),
                status: ActiveValue::Set(TransactionStatus::Cancelled.as_str().to_string()),
                ..Default::default()
            };
            update.update(db_tx).await?;
        }
        compensation.status = TransactionStatus::Cancelled;

        tracing::info!(
            original = %row.id,
            compensation = %compensation.id,
            amount = compensation.amount_minor,
            "cancelled transaction"
        );
        Ok(compensation)
    }
}
