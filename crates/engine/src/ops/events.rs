//! Event administration: creation, registration and pooled expenses.

use chrono::Utc;
use uuid::Uuid;

use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};

use crate::{
    EngineError, Event, EventCmd, Expense, ExpenseCmd, Identity, Participant, ResultEngine,
    ShopCapability, TransactionDetail, events, expense_splits, expenses, participants,
    transactions,
};

use super::{
    Engine,
    movements::{MovementPolicy, MovementSpec},
    normalize_required_text, with_tx,
};

impl Engine {
    /// Creates an event in `Draft` status.
    pub async fn new_event(&self, cmd: EventCmd, identity: &Identity) -> ResultEngine<Event> {
        if !identity.has_shop_capability(&cmd.shop_id, ShopCapability::ManageEvents) {
            return Err(EngineError::Forbidden(
                "creating events requires the manage_events capability".to_string(),
            ));
        }
        let name = normalize_required_text(&cmd.name, "name")?;
        let event = Event::new(
            cmd.shop_id,
            name,
            cmd.kind,
            cmd.deposit_minor,
            cmd.allow_self_registration,
            identity.user_id.clone(),
            Utc::now(),
        )?;
        with_tx!(self, |db_tx| {
            events::ActiveModel::from(&event).insert(&db_tx).await?;
            tracing::info!(event = %event.id, kind = event.kind.as_str(), "created event");
            Ok(event)
        })
    }

    /// Current snapshot of one event.
    pub async fn event(&self, event_id: Uuid) -> ResultEngine<Event> {
        with_tx!(self, |db_tx| {
            let model = self.require_event(&db_tx, event_id).await?;
            Event::try_from(model)
        })
    }

    /// Registers a member in an event with a cost weight.
    ///
    /// Members may register themselves when the event allows it; registering
    /// someone else requires `ManageEvents`. Joining an already open
    /// shared-cost event charges the deposit immediately, and the member is
    /// not added if their wallet cannot cover it.
    pub async fn join_event(
        &self,
        event_id: Uuid,
        user_id: &str,
        weight: i32,
        identity: &Identity,
    ) -> ResultEngine<Participant> {
        if weight < 1 {
            return Err(EngineError::Validation("weight must be >= 1".to_string()));
        }
        with_tx!(self, |db_tx| {
            let event = self.require_event(&db_tx, event_id).await?;
            if event.status != "draft" && event.status != "open" {
                return Err(EngineError::InvalidStateTransition(format!(
                    "cannot join an event in status {}",
                    event.status
                )));
            }
            self.check_registration_permission(&event, user_id, identity)?;

            let existing = participants::Entity::find_by_id((
                event.id.clone(),
                user_id.to_string(),
            ))
            .one(&db_tx)
            .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(user_id.to_string()));
            }

            let account = self.require_personal_account(&db_tx, user_id).await?;
            let participant = Participant {
                event_id,
                user_id: user_id.to_string(),
                weight,
                joined_at: Utc::now(),
            };
            participants::ActiveModel::from(&participant)
                .insert(&db_tx)
                .await?;

            // Late joiners of a running shared-cost event pay the deposit on
            // the spot, and only get in if they can afford it.
            if event.status == "open" && event.kind == "shared_cost" && event.deposit_minor > 0 {
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
                        policy: MovementPolicy::STRICT,
                    },
                )
                .await?;
            }
            Ok(participant)
        })
    }

    /// Removes a member from an event that has not been settled yet.
    ///
    /// If a deposit was already collected it is handed back through the
    /// cancellation engine.
    pub async fn leave_event(
        &self,
        event_id: Uuid,
        user_id: &str,
        identity: &Identity,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let event = self.require_event(&db_tx, event_id).await?;
            if event.status != "draft" && event.status != "open" {
                return Err(EngineError::InvalidStateTransition(format!(
                    "cannot leave an event in status {}",
                    event.status
                )));
            }
            self.check_registration_permission(&event, user_id, identity)?;

            participants::Entity::find_by_id((event.id.clone(), user_id.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("participant not exists".to_string()))?;

            if let Some(account) = self
                .find_account_for_owner(&db_tx, "personal", user_id)
                .await?
            {
                let charges = transactions::Entity::find()
                    .filter(transactions::Column::EventId.eq(event.id.clone()))
                    .filter(transactions::Column::AccountId.eq(account.id.clone()))
                    .filter(transactions::Column::Kind.eq("purchase"))
                    .filter(transactions::Column::Status.eq("completed"))
                    .filter(transactions::Column::ProductId.is_null())
                    .all(&db_tx)
                    .await?;
                for charge in &charges {
                    self.cancel_row(&db_tx, charge, identity).await?;
                }
            }

            participants::Entity::delete_by_id((event.id.clone(), user_id.to_string()))
                .exec(&db_tx)
                .await?;
            tracing::info!(event = %event.id, user = user_id, "removed participant");
            Ok(())
        })
    }

    /// Records money the club already spent externally.
    ///
    /// Moves no wallet; only feeds the settlement totals. A direct event
    /// link must point at an event that can still be settled.
    pub async fn add_expense(&self, cmd: ExpenseCmd, identity: &Identity) -> ResultEngine<Expense> {
        if !identity.has_shop_capability(&cmd.shop_id, ShopCapability::ManageExpenses) {
            return Err(EngineError::Forbidden(
                "recording expenses requires the manage_expenses capability".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            if let Some(event_id) = cmd.event_id {
                let event = self.require_event(&db_tx, event_id).await?;
                if event.status == "closed" || event.status == "archived" {
                    return Err(EngineError::InvalidStateTransition(format!(
                        "cannot attribute expenses to an event in status {}",
                        event.status
                    )));
                }
            }
            let expense = Expense::new(
                cmd.shop_id.clone(),
                cmd.event_id,
                cmd.amount_minor,
                normalize_required_text(&cmd.description, "description")?,
                identity.user_id.clone(),
                Utc::now(),
            )?;
            expenses::ActiveModel::from(&expense).insert(&db_tx).await?;
            Ok(expense)
        })
    }

    /// Attributes parts of one expense to several events.
    ///
    /// Replaces any previous split. The parts must each be positive and may
    /// sum to at most the expense amount; the remainder stays unattributed.
    /// Only expenses without a direct event link can be split.
    pub async fn split_expense(
        &self,
        expense_id: Uuid,
        parts: &[(Uuid, i64)],
        identity: &Identity,
    ) -> ResultEngine<()> {
        if parts.is_empty() {
            return Err(EngineError::Validation(
                "split must name at least one event".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let expense = self.require_expense(&db_tx, expense_id).await?;
            if !identity.has_shop_capability(&expense.shop_id, ShopCapability::ManageExpenses) {
                return Err(EngineError::Forbidden(
                    "splitting expenses requires the manage_expenses capability".to_string(),
                ));
            }
            if expense.event_id.is_some() {
                return Err(EngineError::Validation(
                    "expense is already attributed to an event".to_string(),
                ));
            }
            let mut attributed: i64 = 0;
            for (event_id, amount_minor) in parts {
                if *amount_minor <= 0 {
                    return Err(EngineError::Validation(
                        "split amounts must be > 0".to_string(),
                    ));
                }
                self.require_event(&db_tx, *event_id).await?;
                attributed = attributed.checked_add(*amount_minor).ok_or_else(|| {
                    EngineError::Validation("split total too large".to_string())
                })?;
            }
            if attributed > expense.amount_minor {
                return Err(EngineError::Validation(
                    "split exceeds the expense amount".to_string(),
                ));
            }

            expense_splits::Entity::delete_many()
                .filter(expense_splits::Column::ExpenseId.eq(expense.id.clone()))
                .exec(&db_tx)
                .await?;
            for (event_id, amount_minor) in parts {
                let split = expense_splits::ActiveModel {
                    expense_id: ActiveValue::Set(expense.id.clone()),
                    event_id: ActiveValue::Set(event_id.to_string()),
                    amount_minor: ActiveValue::Set(*amount_minor),
                };
                split.insert(&db_tx).await?;
            }
            Ok(())
        })
    }

    fn check_registration_permission(
        &self,
        event: &events::Model,
        user_id: &str,
        identity: &Identity,
    ) -> ResultEngine<()> {
        let manages = identity.has_shop_capability(&event.shop_id, ShopCapability::ManageEvents);
        if identity.user_id == user_id {
            if event.allow_self_registration || manages {
                return Ok(());
            }
            return Err(EngineError::Forbidden(
                "this event does not allow self-registration".to_string(),
            ));
        }
        if manages {
            return Ok(());
        }
        Err(EngineError::Forbidden(
            "registering others requires the manage_events capability".to_string(),
        ))
    }
}
