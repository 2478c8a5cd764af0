//! Event activation, weighted cost settlement and revenue reporting.
//!
//! A shared-cost event pools external expenses and splits them across the
//! participants by weight. Activation collects the deposit from everyone;
//! settlement computes each share, refunds or charges the difference against
//! the deposit, and closes the event. Each share is rounded half-up on its
//! own; the rounding drift stays with the pool.

use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, Statement, TransactionTrait, prelude::*,
};

use crate::{
    EngineError, Event, Identity, MoneyCents, ResultEngine, ShopCapability, TransactionDetail,
    events, participants,
};

use super::{
    Engine,
    movements::{MovementPolicy, MovementSpec},
    with_tx,
};

/// A participant whose wallet could not cover the deposit at activation.
///
/// The deposit is charged anyway; the shortfall is reported so the treasurer
/// can chase the debt.
#[derive(Clone, Debug, PartialEq)]
pub struct DepositWarning {
    pub user_id: String,
    pub shortfall_minor: i64,
}

/// Result of activating an event.
#[derive(Clone, Debug)]
pub struct ActivationOutcome {
    pub event: Event,
    pub warnings: Vec<DepositWarning>,
}

/// One participant's line in a settlement.
#[derive(Clone, Debug, PartialEq)]
pub struct SettlementShare {
    pub user_id: String,
    pub weight: i32,
    /// This participant's share of the pooled expenses, rounded half-up.
    pub share_minor: i64,
    /// Deposit actually collected (net of cancellations).
    pub deposit_minor: i64,
    /// `deposit - share`: positive is refunded, negative is charged.
    pub diff_minor: i64,
}

/// The full settlement picture of one event.
#[derive(Clone, Debug)]
pub struct SettlementPreview {
    pub total_expenses_minor: i64,
    pub total_weight: i64,
    /// Cost of one weight unit in thousandths of a cent, rounded half-up.
    pub cost_per_weight_unit_milli: i64,
    pub shares: Vec<SettlementShare>,
}

impl Engine {
    /// Opens a draft event.
    ///
    /// For a shared-cost event with a deposit, every registered participant
    /// is charged immediately, whatever their balance or freeze state; the
    /// returned warnings list who went short. Running activation against an
    /// event whose participants were already charged (late joiners) skips
    /// them instead of charging twice.
    pub async fn activate_event(
        &self,
        event_id: Uuid,
        identity: &Identity,
    ) -> ResultEngine<ActivationOutcome> {
        with_tx!(self, |db_tx| {
            let event = self.require_event(&db_tx, event_id).await?;
            if !identity.has_shop_capability(&event.shop_id, ShopCapability::ManageEvents) {
                return Err(EngineError::Forbidden(
                    "activating events requires the manage_events capability".to_string(),
                ));
            }
            if event.status != "draft" {
                return Err(EngineError::InvalidStateTransition(format!(
                    "cannot activate an event in status {}",
                    event.status
                )));
            }

            let mut warnings = Vec::new();
            if event.kind == "shared_cost" && event.deposit_minor > 0 {
                let roster = participants::Entity::find()
                    .filter(participants::Column::EventId.eq(event.id.clone()))
                    .all(&db_tx)
                    .await?;
                for participant in roster {
                    let account = self
                        .require_personal_account(&db_tx, &participant.user_id)
                        .await?;
                    if self
                        .deposit_collected(&db_tx, &event.id, &account.id)
                        .await?
                        != 0
                    {
                        continue;
                    }
                    if account.balance_minor < event.deposit_minor {
                        warnings.push(DepositWarning {
                            user_id: participant.user_id.clone(),
                            shortfall_minor: event.deposit_minor - account.balance_minor,
                        });
                    }
                    self.record_movement(
                        &db_tx,
                        MovementSpec {
                            account: &account,
                            amount_minor: -event.deposit_minor,
                            issuer: identity,
                            description: Some(format!("deposit for {}", event.name)),
                            group_id: None,
                            detail: TransactionDetail::Purchase {
                                product_id: None,
                                quantity: None,
                                shop_id: Some(event.shop_id.clone()),
                                event_id: Some(event_id),
                            },
                            policy: MovementPolicy::BOOKKEEPING,
                        },
                    )
                    .await?;
                }
            }

            let update = events::ActiveModel {
                id: ActiveValue::Set(event.id.clone()),
                status: ActiveValue::Set("open".to_string()),
                ..Default::default()
            };
            let updated = update.update(&db_tx).await?;
            tracing::info!(event = %updated.id, warnings = warnings.len(), "activated event");
            Ok(ActivationOutcome {
                event: Event::try_from(updated)?,
                warnings,
            })
        })
    }

    /// Computes the settlement of an open shared-cost event without moving
    /// any money.
    pub async fn preview_settlement(
        &self,
        event_id: Uuid,
        identity: &Identity,
    ) -> ResultEngine<SettlementPreview> {
        with_tx!(self, |db_tx| {
            let event = self.require_event(&db_tx, event_id).await?;
            if !identity.has_shop_capability(&event.shop_id, ShopCapability::ManageEvents) {
                return Err(EngineError::Forbidden(
                    "settlement requires the manage_events capability".to_string(),
                ));
            }
            self.check_settleable(&event)?;
            self.compute_settlement(&db_tx, &event).await
        })
    }

    /// Settles an open shared-cost event and closes it.
    ///
    /// Every participant whose deposit exceeds their share is refunded the
    /// difference; everyone short is charged it, even into a negative
    /// balance. All of it lands in one storage transaction together with the
    /// status change to `Closed`.
    pub async fn execute_settlement(
        &self,
        event_id: Uuid,
        identity: &Identity,
    ) -> ResultEngine<SettlementPreview> {
        with_tx!(self, |db_tx| {
            let event = self.require_event(&db_tx, event_id).await?;
            if !identity.has_shop_capability(&event.shop_id, ShopCapability::ManageEvents) {
                return Err(EngineError::Forbidden(
                    "settlement requires the manage_events capability".to_string(),
                ));
            }
            self.check_settleable(&event)?;
            let preview = self.compute_settlement(&db_tx, &event).await?;

            for share in &preview.shares {
                if share.diff_minor == 0 {
                    continue;
                }
                let account = self
                    .require_personal_account(&db_tx, &share.user_id)
                    .await?;
                let detail = if share.diff_minor > 0 {
                    TransactionDetail::Refund {
                        reversal_of: None,
                        event_id: Some(event_id),
                    }
                } else {
                    TransactionDetail::Purchase {
                        product_id: None,
                        quantity: None,
                        shop_id: Some(event.shop_id.clone()),
                        event_id: Some(event_id),
                    }
                };
                self.record_movement(
                    &db_tx,
                    MovementSpec {
                        account: &account,
                        amount_minor: share.diff_minor,
                        issuer: identity,
                        description: Some(format!("settlement of {}", event.name)),
                        group_id: None,
                        detail,
                        policy: MovementPolicy::BOOKKEEPING,
                    },
                )
                .await?;
            }

            let update = events::ActiveModel {
                id: ActiveValue::Set(event.id.clone()),
                status: ActiveValue::Set("closed".to_string()),
                ..Default::default()
            };
            update.update(&db_tx).await?;
            tracing::info!(
                event = %event.id,
                total = %MoneyCents::new(preview.total_expenses_minor),
                participants = preview.shares.len(),
                "settled event"
            );
            Ok(preview)
        })
    }

    /// Closes an event without settlement.
    ///
    /// A shared-cost event that collected deposits must go through
    /// [`Engine::execute_settlement`] instead; closing it here would keep
    /// the deposits without accounting for them.
    pub async fn close_event(&self, event_id: Uuid, identity: &Identity) -> ResultEngine<Event> {
        with_tx!(self, |db_tx| {
            let event = self.require_event(&db_tx, event_id).await?;
            if !identity.has_shop_capability(&event.shop_id, ShopCapability::ManageEvents) {
                return Err(EngineError::Forbidden(
                    "closing events requires the manage_events capability".to_string(),
                ));
            }
            if event.status != "open" {
                return Err(EngineError::InvalidStateTransition(format!(
                    "cannot close an event in status {}",
                    event.status
                )));
            }
            if event.kind == "shared_cost" && event.deposit_minor > 0 {
                return Err(EngineError::InvalidStateTransition(
                    "shared-cost events with a deposit close through settlement".to_string(),
                ));
            }
            let update = events::ActiveModel {
                id: ActiveValue::Set(event.id.clone()),
                status: ActiveValue::Set("closed".to_string()),
                ..Default::default()
            };
            Event::try_from(update.update(&db_tx).await?)
        })
    }

    /// Hides a closed event from listings.
    pub async fn archive_event(&self, event_id: Uuid, identity: &Identity) -> ResultEngine<Event> {
        with_tx!(self, |db_tx| {
            let event = self.require_event(&db_tx, event_id).await?;
            if !identity.has_shop_capability(&event.shop_id, ShopCapability::ManageEvents) {
                return Err(EngineError::Forbidden(
                    "archiving events requires the manage_events capability".to_string(),
                ));
            }
            if event.status != "closed" {
                return Err(EngineError::InvalidStateTransition(format!(
                    "cannot archive an event in status {}",
                    event.status
                )));
            }
            let update = events::ActiveModel {
                id: ActiveValue::Set(event.id.clone()),
                status: ActiveValue::Set("archived".to_string()),
                ..Default::default()
            };
            Event::try_from(update.update(&db_tx).await?)
        })
    }

    /// Net revenue of an event: the completed money that flowed in through
    /// rows stamped with its id, deposits and settlement included, refunds
    /// deducted.
    pub async fn event_revenue(
        &self,
        event_id: Uuid,
        identity: &Identity,
    ) -> ResultEngine<MoneyCents> {
        with_tx!(self, |db_tx| {
            let event = self.require_event(&db_tx, event_id).await?;
            if !identity.has_shop_capability(&event.shop_id, ShopCapability::ViewStats) {
                return Err(EngineError::Forbidden(
                    "revenue reports require the view_stats capability".to_string(),
                ));
            }
            let backend = db_tx.get_database_backend();
            let stmt = Statement::from_sql_and_values(
                backend,
                "SELECT COALESCE(-SUM(amount_minor), 0) AS sum \
                 FROM transactions \
                 WHERE event_id = ? AND status = 'completed';",
                vec![event.id.into()],
            );
            let row = db_tx.query_one(stmt).await?;
            let revenue_minor: i64 = row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0);
            Ok(MoneyCents::new(revenue_minor))
        })
    }

    fn check_settleable(&self, event: &events::Model) -> ResultEngine<()> {
        if event.kind != "shared_cost" {
            return Err(EngineError::InvalidStateTransition(
                "only shared-cost events are settled".to_string(),
            ));
        }
        if event.status != "open" {
            return Err(EngineError::InvalidStateTransition(format!(
                "cannot settle an event in status {}",
                event.status
            )));
        }
        Ok(())
    }

    async fn compute_settlement(
        &self,
        db_tx: &DatabaseTransaction,
        event: &events::Model,
    ) -> ResultEngine<SettlementPreview> {
        let backend = db_tx.get_database_backend();

        let direct_minor: i64 = {
            let stmt = Statement::from_sql_and_values(
                backend,
                "SELECT COALESCE(SUM(amount_minor), 0) AS sum \
                 FROM expenses WHERE event_id = ?;",
                vec![event.id.clone().into()],
            );
            let row = db_tx.query_one(stmt).await?;
            row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0)
        };
        let split_minor: i64 = {
            let stmt = Statement::from_sql_and_values(
                backend,
                "SELECT COALESCE(SUM(amount_minor), 0) AS sum \
                 FROM expense_splits WHERE event_id = ?;",
                vec![event.id.clone().into()],
            );
            let row = db_tx.query_one(stmt).await?;
            row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0)
        };
        let total_expenses_minor = direct_minor + split_minor;

        let roster = participants::Entity::find()
            .filter(participants::Column::EventId.eq(event.id.clone()))
            .all(db_tx)
            .await?;
        let total_weight: i64 = roster.iter().map(|p| i64::from(p.weight)).sum();

        let pool = MoneyCents::new(total_expenses_minor);
        let mut shares = Vec::with_capacity(roster.len());
        for participant in &roster {
            let account = self
                .require_personal_account(db_tx, &participant.user_id)
                .await?;
            let deposit_minor = self
                .deposit_collected(db_tx, &event.id, &account.id)
                .await?;
            let share_minor = pool
                .proportional_share(i64::from(participant.weight), total_weight)
                .cents();
            shares.push(SettlementShare {
                user_id: participant.user_id.clone(),
                weight: participant.weight,
                share_minor,
                deposit_minor,
                diff_minor: deposit_minor - share_minor,
            });
        }

        let cost_per_weight_unit_milli = if total_weight > 0 {
            let numer = i128::from(total_expenses_minor) * 1000;
            let denom = i128::from(total_weight);
            ((2 * numer + denom) / (2 * denom)) as i64
        } else {
            0
        };

        Ok(SettlementPreview {
            total_expenses_minor,
            total_weight,
            cost_per_weight_unit_milli,
            shares,
        })
    }

    /// Deposit actually held for one participant: completed event charges on
    /// their wallet that carry no product line, negated. Cancelled charges
    /// drop out on their own.
    async fn deposit_collected(
        &self,
        db_tx: &DatabaseTransaction,
        event_id: &str,
        account_id: &str,
    ) -> ResultEngine<i64> {
        let backend = db_tx.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "SELECT COALESCE(-SUM(amount_minor), 0) AS sum \
             FROM transactions \
             WHERE event_id = ? AND account_id = ? AND kind = 'purchase' \
               AND product_id IS NULL AND status = 'completed';",
            vec![event_id.into(), account_id.into()],
        );
        let row = db_tx.query_one(stmt).await?;
        Ok(row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0))
    }
}
