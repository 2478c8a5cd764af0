//! Member wallets and shared purses.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Who owns an account: an individual member or a shared family purse.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "owner_id", rename_all = "snake_case")]
pub enum AccountOwner {
    Personal(String),
    Shared(String),
}

impl AccountOwner {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Personal(_) => "personal",
            Self::Shared(_) => "shared",
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            Self::Personal(id) | Self::Shared(id) => id,
        }
    }

    pub(crate) fn from_parts(kind: &str, owner_id: &str) -> ResultEngine<Self> {
        match kind {
            "personal" => Ok(Self::Personal(owner_id.to_string())),
            "shared" => Ok(Self::Shared(owner_id.to_string())),
            other => Err(EngineError::Validation(format!(
                "invalid account kind: {other}"
            ))),
        }
    }
}

/// An account holding a minor-unit balance.
///
/// The balance is only ever mutated together with an appended ledger row,
/// inside the same storage transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct Account {
    /// Stable identifier, generated once and persisted.
    pub id: Uuid,
    pub owner: AccountOwner,
    pub balance_minor: i64,
    pub frozen: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(owner: AccountOwner, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            balance_minor: 0,
            frozen: false,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub owner_id: String,
    pub balance_minor: i64,
    pub frozen: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id.to_string()),
            kind: ActiveValue::Set(account.owner.kind_str().to_string()),
            owner_id: ActiveValue::Set(account.owner.owner_id().to_string()),
            balance_minor: ActiveValue::Set(account.balance_minor),
            frozen: ActiveValue::Set(account.frozen),
            created_at: ActiveValue::Set(account.created_at),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("account not exists".to_string()))?,
            owner: AccountOwner::from_parts(&model.kind, &model.owner_id)?,
            balance_minor: model.balance_minor,
            frozen: model.frozen,
            created_at: model.created_at,
        })
    }
}
