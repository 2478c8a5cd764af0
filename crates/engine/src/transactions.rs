//! Ledger rows.
//!
//! A `Transaction` records one balance movement on one account. Rows are
//! append-only: once written, the only field ever touched again is `status`,
//! and only by the cancellation engine (which also appends a compensating
//! row).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    Transfer,
    TopUp,
    Adjustment,
    Refund,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Transfer => "transfer",
            Self::TopUp => "top_up",
            Self::Adjustment => "adjustment",
            Self::Refund => "refund",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "purchase" => Ok(Self::Purchase),
            "transfer" => Ok(Self::Transfer),
            "top_up" => Ok(Self::TopUp),
            "adjustment" => Ok(Self::Adjustment),
            "refund" => Ok(Self::Refund),
            other => Err(EngineError::Validation(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::Validation(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

/// Which side of the club's money a row drew from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletSource {
    Personal,
    Shared,
}

impl WalletSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Shared => "shared",
        }
    }
}

impl TryFrom<&str> for WalletSource {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "personal" => Ok(Self::Personal),
            "shared" => Ok(Self::Shared),
            other => Err(EngineError::Validation(format!(
                "invalid wallet source: {other}"
            ))),
        }
    }
}

/// Kind-specific payload of a ledger row.
///
/// Each variant carries only the links that make sense for it, instead of a
/// single record full of optional columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionDetail {
    /// A cart line (product + quantity) or an event charge (deposit,
    /// settlement balance) — the latter carries only the event link.
    Purchase {
        product_id: Option<Uuid>,
        quantity: Option<i64>,
        shop_id: Option<String>,
        event_id: Option<Uuid>,
    },
    /// One side of a peer-to-peer transfer; the pair shares a `group_id`.
    Transfer { peer_account_id: Uuid },
    TopUp,
    Adjustment,
    /// A compensating entry (`reversal_of`) or a settlement refund
    /// (`event_id`).
    Refund {
        reversal_of: Option<Uuid>,
        event_id: Option<Uuid>,
    },
}

impl TransactionDetail {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Purchase { .. } => TransactionKind::Purchase,
            Self::Transfer { .. } => TransactionKind::Transfer,
            Self::TopUp => TransactionKind::TopUp,
            Self::Adjustment => TransactionKind::Adjustment,
            Self::Refund { .. } => TransactionKind::Refund,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub wallet_source: WalletSource,
    /// Signed minor units; negative = debit, positive = credit.
    pub amount_minor: i64,
    pub issuer_id: String,
    pub description: Option<String>,
    /// Correlation id shared by the rows of one bulk action or transfer pair.
    pub group_id: Option<Uuid>,
    pub status: TransactionStatus,
    pub detail: TransactionDetail,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: Uuid,
        wallet_source: WalletSource,
        amount_minor: i64,
        issuer_id: String,
        description: Option<String>,
        group_id: Option<Uuid>,
        detail: TransactionDetail,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if amount_minor == 0 {
            return Err(EngineError::Validation(
                "amount_minor must not be 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            wallet_source,
            amount_minor,
            issuer_id,
            description,
            group_id,
            status: TransactionStatus::Completed,
            detail,
            created_at,
        })
    }

    pub fn kind(&self) -> TransactionKind {
        self.detail.kind()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub wallet_source: String,
    pub kind: String,
    pub status: String,
    pub amount_minor: i64,
    pub issuer_id: String,
    pub description: Option<String>,
    pub group_id: Option<String>,
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
    pub shop_id: Option<String>,
    pub event_id: Option<String>,
    pub peer_account_id: Option<String>,
    pub reversal_of: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn parse_optional_uuid(raw: Option<&str>, label: &str) -> ResultEngine<Option<Uuid>> {
    raw.map(|s| {
        Uuid::parse_str(s).map_err(|_| EngineError::Validation(format!("invalid {label} id")))
    })
    .transpose()
}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        let (product_id, quantity, shop_id, event_id, peer_account_id, reversal_of) =
            match &tx.detail {
                TransactionDetail::Purchase {
                    product_id,
                    quantity,
                    shop_id,
                    event_id,
                } => (
                    product_id.map(|id| id.to_string()),
                    *quantity,
                    shop_id.clone(),
                    event_id.map(|id| id.to_string()),
                    None,
                    None,
                ),
                TransactionDetail::Transfer { peer_account_id } => (
                    None,
                    None,
                    None,
                    None,
                    Some(peer_account_id.to_string()),
                    None,
                ),
                TransactionDetail::TopUp | TransactionDetail::Adjustment => {
                    (None, None, None, None, None, None)
                }
                TransactionDetail::Refund {
                    reversal_of,
                    event_id,
                } => (
                    None,
                    None,
                    None,
                    event_id.map(|id| id.to_string()),
                    None,
                    reversal_of.map(|id| id.to_string()),
                ),
            };

        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            account_id: ActiveValue::Set(tx.account_id.to_string()),
            wallet_source: ActiveValue::Set(tx.wallet_source.as_str().to_string()),
            kind: ActiveValue::Set(tx.kind().as_str().to_string()),
            status: ActiveValue::Set(tx.status.as_str().to_string()),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            issuer_id: ActiveValue::Set(tx.issuer_id.clone()),
            description: ActiveValue::Set(tx.description.clone()),
            group_id: ActiveValue::Set(tx.group_id.map(|id| id.to_string())),
            product_id: ActiveValue::Set(product_id),
            quantity: ActiveValue::Set(quantity),
            shop_id: ActiveValue::Set(shop_id),
            event_id: ActiveValue::Set(event_id),
            peer_account_id: ActiveValue::Set(peer_account_id),
            reversal_of: ActiveValue::Set(reversal_of),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let kind = TransactionKind::try_from(model.kind.as_str())?;
        let detail = match kind {
            TransactionKind::Purchase => TransactionDetail::Purchase {
                product_id: parse_optional_uuid(model.product_id.as_deref(), "product")?,
                quantity: model.quantity,
                shop_id: model.shop_id.clone(),
                event_id: parse_optional_uuid(model.event_id.as_deref(), "event")?,
            },
            TransactionKind::Transfer => TransactionDetail::Transfer {
                peer_account_id: parse_optional_uuid(
                    model.peer_account_id.as_deref(),
                    "peer account",
                )?
                .ok_or_else(|| {
                    EngineError::Validation("transfer row missing peer account".to_string())
                })?,
            },
            TransactionKind::TopUp => TransactionDetail::TopUp,
            TransactionKind::Adjustment => TransactionDetail::Adjustment,
            TransactionKind::Refund => TransactionDetail::Refund {
                reversal_of: parse_optional_uuid(model.reversal_of.as_deref(), "transaction")?,
                event_id: parse_optional_uuid(model.event_id.as_deref(), "event")?,
            },
        };

        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("transaction not exists".to_string()))?,
            account_id: Uuid::parse_str(&model.account_id)
                .map_err(|_| EngineError::KeyNotFound("account not exists".to_string()))?,
            wallet_source: WalletSource::try_from(model.wallet_source.as_str())?,
            amount_minor: model.amount_minor,
            issuer_id: model.issuer_id,
            description: model.description,
            group_id: parse_optional_uuid(model.group_id.as_deref(), "group")?,
            status: TransactionStatus::try_from(model.status.as_str())?,
            detail,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(detail: TransactionDetail) -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            WalletSource::Personal,
            -250,
            "alice".to_string(),
            Some("test".to_string()),
            None,
            detail,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn zero_amount_is_rejected() {
        let err = Transaction::new(
            Uuid::new_v4(),
            WalletSource::Personal,
            0,
            "alice".to_string(),
            None,
            None,
            TransactionDetail::TopUp,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation("amount_minor must not be 0".to_string())
        );
    }

    #[test]
    fn purchase_detail_survives_model_round_trip() {
        let product_id = Uuid::new_v4();
        let event_id = Uuid::new_v4();
        let tx = row(TransactionDetail::Purchase {
            product_id: Some(product_id),
            quantity: Some(3),
            shop_id: Some("bar".to_string()),
            event_id: Some(event_id),
        });

        let model_fields: ActiveModel = (&tx).into();
        let model = Model {
            id: tx.id.to_string(),
            account_id: tx.account_id.to_string(),
            wallet_source: "personal".to_string(),
            kind: "purchase".to_string(),
            status: "completed".to_string(),
            amount_minor: -250,
            issuer_id: "alice".to_string(),
            description: Some("test".to_string()),
            group_id: None,
            product_id: model_fields.product_id.unwrap(),
            quantity: Some(3),
            shop_id: Some("bar".to_string()),
            event_id: Some(event_id.to_string()),
            peer_account_id: None,
            reversal_of: None,
            created_at: tx.created_at,
        };

        let back = Transaction::try_from(model).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn transfer_row_without_peer_is_invalid() {
        let model = Model {
            id: Uuid::new_v4().to_string(),
            account_id: Uuid::new_v4().to_string(),
            wallet_source: "personal".to_string(),
            kind: "transfer".to_string(),
            status: "completed".to_string(),
            amount_minor: 100,
            issuer_id: "alice".to_string(),
            description: None,
            group_id: None,
            product_id: None,
            quantity: None,
            shop_id: None,
            event_id: None,
            peer_account_id: None,
            reversal_of: None,
            created_at: Utc::now(),
        };
        assert!(Transaction::try_from(model).is_err());
    }
}
