//! Account API endpoints.

use api_types::account::{AccountKind, AccountNew, AccountView, FreezeRequest, TopUpRequest};
use api_types::transaction::{TransactionView, TransactionsResponse};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ServerError, server::ServerState, transactions::transaction_view};
use engine::{Account, AccountOwner, Identity, TopUpCmd};

fn account_view(account: Account) -> AccountView {
    let kind = match account.owner {
        AccountOwner::Personal(_) => AccountKind::Personal,
        AccountOwner::Shared(_) => AccountKind::Shared,
    };
    AccountView {
        id: account.id,
        kind,
        owner_id: account.owner.owner_id().to_string(),
        balance_minor: account.balance_minor,
        frozen: account.frozen,
        created_at: account.created_at,
    }
}

pub async fn new(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Json(payload): Json<AccountNew>,
) -> Result<(StatusCode, Json<AccountView>), ServerError> {
    let owner = match payload.kind {
        AccountKind::Personal => AccountOwner::Personal(payload.owner_id),
        AccountKind::Shared => AccountOwner::Shared(payload.owner_id),
    };
    let account = state.engine.new_account(owner, &identity).await?;
    Ok((StatusCode::CREATED, Json(account_view(account))))
}

pub async fn get(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountView>, ServerError> {
    let account = state.engine.account(account_id, &identity).await?;
    Ok(Json(account_view(account)))
}

/// The caller's own wallet.
pub async fn own_wallet(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
) -> Result<Json<AccountView>, ServerError> {
    let account = state
        .engine
        .account_for_user(&identity.user_id, &identity)
        .await?;
    Ok(Json(account_view(account)))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    limit: Option<u64>,
}

pub async fn history(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<TransactionsResponse>, ServerError> {
    let rows = state
        .engine
        .transactions_for_account(account_id, query.limit.unwrap_or(50), &identity)
        .await?;
    let transactions: Vec<TransactionView> = rows.iter().map(transaction_view).collect();
    Ok(Json(TransactionsResponse { transactions }))
}

pub async fn freeze(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
    Json(payload): Json<FreezeRequest>,
) -> Result<Json<AccountView>, ServerError> {
    let account = state
        .engine
        .set_account_frozen(account_id, payload.frozen, &identity)
        .await?;
    Ok(Json(account_view(account)))
}

pub async fn top_up(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
    Json(payload): Json<TopUpRequest>,
) -> Result<(StatusCode, Json<TransactionView>), ServerError> {
    let mut cmd = TopUpCmd::new(account_id, payload.amount_minor);
    if let Some(shop_id) = payload.shop_id {
        cmd = cmd.shop_id(shop_id);
    }
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    let tx = state.engine.top_up(cmd, &identity).await?;
    Ok((StatusCode::CREATED, Json(transaction_view(&tx))))
}
