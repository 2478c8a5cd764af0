//! Wire types shared between the HTTP server and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod account {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AccountKind {
        Personal,
        Shared,
    }

    /// Request body for opening an account.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountNew {
        pub kind: AccountKind,
        /// Username for personal wallets, group name for shared purses.
        pub owner_id: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountView {
        pub id: Uuid,
        pub kind: AccountKind,
        pub owner_id: String,
        pub balance_minor: i64,
        pub frozen: bool,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FreezeRequest {
        pub frozen: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TopUpRequest {
        pub amount_minor: i64,
        pub shop_id: Option<String>,
        pub description: Option<String>,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionKind {
        Purchase,
        Transfer,
        TopUp,
        Adjustment,
        Refund,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionStatus {
        Completed,
        Cancelled,
    }

    /// One ledger row as returned by history and write endpoints.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        pub account_id: Uuid,
        pub kind: TransactionKind,
        pub status: TransactionStatus,
        pub amount_minor: i64,
        pub issuer_id: String,
        pub description: Option<String>,
        pub group_id: Option<Uuid>,
        pub product_id: Option<Uuid>,
        pub quantity: Option<i64>,
        pub shop_id: Option<String>,
        pub event_id: Option<Uuid>,
        pub peer_account_id: Option<Uuid>,
        pub reversal_of: Option<Uuid>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionsResponse {
        pub transactions: Vec<TransactionView>,
    }
}

pub mod purchase {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PurchaseLine {
        pub product_id: Uuid,
        pub quantity: i64,
    }

    /// Request body for settling a cart.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PurchaseNew {
        pub payer_account_id: Uuid,
        pub recipient_user_id: String,
        pub shop_id: String,
        pub lines: Vec<PurchaseLine>,
        pub description: Option<String>,
    }
}

pub mod transfer {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferNew {
        pub from_account_id: Uuid,
        pub to_account_id: Uuid,
        pub amount_minor: i64,
        pub description: Option<String>,
    }
}

pub mod adjustment {
    use super::*;

    /// Request body for a bulk correction.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AdjustmentNew {
        pub target_account_ids: Vec<Uuid>,
        pub amount_minor: i64,
        pub description: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AdjustmentFailureView {
        pub account_id: Uuid,
        pub reason: String,
    }

    /// Per-target outcome of a bulk correction.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AdjustmentResponse {
        pub group_id: Uuid,
        pub transactions: Vec<super::transaction::TransactionView>,
        pub failures: Vec<AdjustmentFailureView>,
    }
}

pub mod event {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum EventKind {
        SharedCost,
        Commercial,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum EventStatus {
        Draft,
        Open,
        Closed,
        Archived,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EventNew {
        pub shop_id: String,
        pub name: String,
        pub kind: EventKind,
        #[serde(default)]
        pub deposit_minor: i64,
        #[serde(default)]
        pub allow_self_registration: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EventView {
        pub id: Uuid,
        pub shop_id: String,
        pub name: String,
        pub kind: EventKind,
        pub status: EventStatus,
        pub deposit_minor: i64,
        pub allow_self_registration: bool,
        pub created_by: String,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct JoinRequest {
        pub user_id: String,
        #[serde(default = "default_weight")]
        pub weight: i32,
    }

    fn default_weight() -> i32 {
        1
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LeaveRequest {
        pub user_id: String,
    }

    /// A participant whose wallet could not cover the deposit.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct DepositWarningView {
        pub user_id: String,
        pub shortfall_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ActivationResponse {
        pub event: EventView,
        pub warnings: Vec<DepositWarningView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementShareView {
        pub user_id: String,
        pub weight: i32,
        pub share_minor: i64,
        pub deposit_minor: i64,
        pub diff_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementResponse {
        pub total_expenses_minor: i64,
        pub total_weight: i64,
        pub cost_per_weight_unit_milli: i64,
        pub shares: Vec<SettlementShareView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RevenueResponse {
        pub revenue_minor: i64,
    }
}

pub mod expense {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub shop_id: String,
        pub amount_minor: i64,
        pub description: String,
        pub event_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: Uuid,
        pub shop_id: String,
        pub event_id: Option<Uuid>,
        pub amount_minor: i64,
        pub description: String,
        pub created_by: String,
        pub created_at: DateTime<Utc>,
    }

    /// One part of an expense split.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitPart {
        pub event_id: Uuid,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitRequest {
        pub parts: Vec<SplitPart>,
    }
}
