//! Pooled expenses attributed to events.
//!
//! An expense is money the club already spent externally (the kegs, the bus).
//! It moves no wallet; it only feeds the settlement totals, either linked to
//! one event directly or split across several via `expense_splits`.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub shop_id: String,
    /// Direct attribution; mutually exclusive with splits.
    pub event_id: Option<Uuid>,
    pub amount_minor: i64,
    pub description: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(
        shop_id: String,
        event_id: Option<Uuid>,
        amount_minor: i64,
        description: String,
        created_by: String,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            shop_id,
            event_id,
            amount_minor,
            description,
            created_by,
            created_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub shop_id: String,
    pub event_id: Option<String>,
    pub amount_minor: i64,
    pub description: String,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::expense_splits::Entity")]
    ExpenseSplits,
}

impl Related<super::expense_splits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseSplits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.to_string()),
            shop_id: ActiveValue::Set(expense.shop_id.clone()),
            event_id: ActiveValue::Set(expense.event_id.map(|id| id.to_string())),
            amount_minor: ActiveValue::Set(expense.amount_minor),
            description: ActiveValue::Set(expense.description.clone()),
            created_by: ActiveValue::Set(expense.created_by.clone()),
            created_at: ActiveValue::Set(expense.created_at),
        }
    }
}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("expense not exists".to_string()))?,
            shop_id: model.shop_id,
            event_id: model
                .event_id
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()
                .map_err(|_| EngineError::Validation("invalid event id".to_string()))?,
            amount_minor: model.amount_minor,
            description: model.description,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
