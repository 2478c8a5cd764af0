//! Peer-to-peer transfers and administrative bulk adjustments.

use uuid::Uuid;

use sea_orm::TransactionTrait;

use crate::{
    AdjustmentBatchCmd, EngineError, Identity, ResultEngine, Transaction, TransactionDetail,
    TransferCmd,
};

use super::{
    Engine,
    movements::{MovementPolicy, MovementSpec},
    normalize_optional_text, normalize_required_text, with_tx,
};

/// One target that a bulk adjustment could not reach.
#[derive(Debug)]
pub struct AdjustmentFailure {
    pub account_id: Uuid,
    pub reason: EngineError,
}

/// Result of a bulk adjustment: the rows that were written and the targets
/// that failed. Targets are independent; one failure never rolls back the
/// others.
#[derive(Debug)]
pub struct AdjustmentBatchOutcome {
    /// Correlation id stamped on every written row.
    pub group_id: Uuid,
    pub succeeded: Vec<Transaction>,
    pub failures: Vec<AdjustmentFailure>,
}

impl Engine {
    /// Moves money from one account to another.
    ///
    /// Writes a debit row and a credit row sharing a fresh `group_id`, each
    /// pointing at the other account, inside one storage transaction. The
    /// issuer must own the source wallet or be an admin; frozen accounts and
    /// insufficient funds on the source both refuse the transfer.
    pub async fn record_transfer(
        &self,
        cmd: TransferCmd,
        identity: &Identity,
    ) -> ResultEngine<(Transaction, Transaction)> {
        if cmd.amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }
        if cmd.from_account_id == cmd.to_account_id {
            return Err(EngineError::Validation(
                "cannot transfer to the same account".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let from = self.require_account(&db_tx, cmd.from_account_id).await?;
            let to = self.require_account(&db_tx, cmd.to_account_id).await?;
            let owns_source = from.kind == "personal" && from.owner_id == identity.user_id;
            if !owns_source && !identity.is_admin() {
                return Err(EngineError::Forbidden(
                    "can only transfer from your own wallet".to_string(),
                ));
            }

            let group_id = Uuid::new_v4();
            let description = normalize_optional_text(cmd.description.as_deref());
            let debit = self
                .record_movement(
                    &db_tx,
                    MovementSpec {
                        account: &from,
                        amount_minor: -cmd.amount_minor,
                        issuer: identity,
                        description: description.clone(),
                        group_id: Some(group_id),
                        detail: TransactionDetail::Transfer {
                            peer_account_id: cmd.to_account_id,
                        },
                        policy: MovementPolicy::STRICT,
                    },
                )
                .await?;
            let credit = self
                .record_movement(
                    &db_tx,
                    MovementSpec {
                        account: &to,
                        amount_minor: cmd.amount_minor,
                        issuer: identity,
                        description,
                        group_id: Some(group_id),
                        detail: TransactionDetail::Transfer {
                            peer_account_id: cmd.from_account_id,
                        },
                        policy: MovementPolicy::STRICT,
                    },
                )
                .await?;
            Ok((debit, credit))
        })
    }

    /// Applies one signed correction to a list of accounts. Admin only.
    ///
    /// Each target runs in its own storage transaction, so a frozen or
    /// missing account fails alone while the rest of the batch lands. The
    /// funds check is waived (corrections may overdraw); the freeze flag is
    /// not.
    pub async fn record_adjustment_batch(
        &self,
        cmd: AdjustmentBatchCmd,
        identity: &Identity,
    ) -> ResultEngine<AdjustmentBatchOutcome> {
        if !identity.is_admin() {
            return Err(EngineError::Forbidden(
                "only admins can record adjustments".to_string(),
            ));
        }
        if cmd.amount_minor == 0 {
            return Err(EngineError::Validation(
                "amount_minor must not be 0".to_string(),
            ));
        }
        if cmd.target_account_ids.is_empty() {
            return Err(EngineError::Validation(
                "target list must not be empty".to_string(),
            ));
        }
        let description = normalize_required_text(&cmd.description, "description")?;

        let group_id = Uuid::new_v4();
        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        for account_id in cmd.target_account_ids {
            let result: ResultEngine<Transaction> = with_tx!(self, |db_tx| {
                match self.require_account(&db_tx, account_id).await {
                    Ok(account) => {
                        self.record_movement(
                            &db_tx,
                            MovementSpec {
                                account: &account,
                                amount_minor: cmd.amount_minor,
                                issuer: identity,
                                description: Some(description.clone()),
                                group_id: Some(group_id),
                                detail: TransactionDetail::Adjustment,
                                policy: MovementPolicy::ADJUSTMENT,
                            },
                        )
                        .await
                    }
                    Err(err) => Err(err),
                }
            });
            match result {
                Ok(tx) => succeeded.push(tx),
                Err(reason) => failures.push(AdjustmentFailure { account_id, reason }),
            }
        }
        tracing::info!(
            group = %group_id,
            written = succeeded.len(),
            failed = failures.len(),
            "recorded adjustment batch"
        );
        Ok(AdjustmentBatchOutcome {
            group_id,
            succeeded,
            failures,
        })
    }
}
