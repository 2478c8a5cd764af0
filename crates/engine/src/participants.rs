//! Event participants.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

/// One member's registration in an event.
///
/// `weight` drives the cost split at settlement (a family of four joins with
/// weight 4). Always >= 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub event_id: Uuid,
    pub user_id: String,
    pub weight: i32,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "participants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub event_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub weight: i32,
    pub joined_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::events::Entity",
        from = "Column::EventId",
        to = "super::events::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Events,
}

impl Related<super::events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Participant> for ActiveModel {
    fn from(participant: &Participant) -> Self {
        Self {
            event_id: ActiveValue::Set(participant.event_id.to_string()),
            user_id: ActiveValue::Set(participant.user_id.clone()),
            weight: ActiveValue::Set(participant.weight),
            joined_at: ActiveValue::Set(participant.joined_at),
        }
    }
}

impl TryFrom<Model> for Participant {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            event_id: Uuid::parse_str(&model.event_id)
                .map_err(|_| EngineError::KeyNotFound("event not exists".to_string()))?,
            user_id: model.user_id,
            weight: model.weight,
            joined_at: model.joined_at,
        })
    }
}
