//! Club events.
//!
//! A `SharedCost` event pools expenses and splits them between participants
//! by weight; a `Commercial` event merely tags shop sales for reporting.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SharedCost,
    Commercial,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SharedCost => "shared_cost",
            Self::Commercial => "commercial",
        }
    }
}

impl TryFrom<&str> for EventKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "shared_cost" => Ok(Self::SharedCost),
            "commercial" => Ok(Self::Commercial),
            other => Err(EngineError::Validation(format!(
                "invalid event kind: {other}"
            ))),
        }
    }
}

/// Event lifecycle. `Closed` is terminal for money movements; `Archived`
/// hides the event from listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    Open,
    Closed,
    Archived,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Archived => "archived",
        }
    }
}

impl TryFrom<&str> for EventStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "draft" => Ok(Self::Draft),
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "archived" => Ok(Self::Archived),
            other => Err(EngineError::Validation(format!(
                "invalid event status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub shop_id: String,
    pub name: String,
    pub kind: EventKind,
    pub status: EventStatus,
    /// Upfront charge collected from each participant at activation.
    pub deposit_minor: i64,
    pub allow_self_registration: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Event {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shop_id: String,
        name: String,
        kind: EventKind,
        deposit_minor: i64,
        allow_self_registration: bool,
        created_by: String,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if deposit_minor < 0 {
            return Err(EngineError::Validation(
                "deposit_minor must be >= 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            shop_id,
            name,
            kind,
            status: EventStatus::Draft,
            deposit_minor,
            allow_self_registration,
            created_by,
            created_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub shop_id: String,
    pub name: String,
    pub kind: String,
    pub status: String,
    pub deposit_minor: i64,
    pub allow_self_registration: bool,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::participants::Entity")]
    Participants,
}

impl Related<super::participants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Event> for ActiveModel {
    fn from(event: &Event) -> Self {
        Self {
            id: ActiveValue::Set(event.id.to_string()),
            shop_id: ActiveValue::Set(event.shop_id.clone()),
            name: ActiveValue::Set(event.name.clone()),
            kind: ActiveValue::Set(event.kind.as_str().to_string()),
            status: ActiveValue::Set(event.status.as_str().to_string()),
            deposit_minor: ActiveValue::Set(event.deposit_minor),
            allow_self_registration: ActiveValue::Set(event.allow_self_registration),
            created_by: ActiveValue::Set(event.created_by.clone()),
            created_at: ActiveValue::Set(event.created_at),
        }
    }
}

impl TryFrom<Model> for Event {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("event not exists".to_string()))?,
            shop_id: model.shop_id,
            name: model.name,
            kind: EventKind::try_from(model.kind.as_str())?,
            status: EventStatus::try_from(model.status.as_str())?,
            deposit_minor: model.deposit_minor,
            allow_self_registration: model.allow_self_registration,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
