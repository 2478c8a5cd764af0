//! Ledger write endpoints: purchases, transfers, adjustments, cancellations.

use api_types::adjustment::{AdjustmentFailureView, AdjustmentNew, AdjustmentResponse};
use api_types::purchase::PurchaseNew;
use api_types::transaction::{
    TransactionKind as ApiKind, TransactionStatus as ApiStatus, TransactionView,
    TransactionsResponse,
};
use api_types::transfer::TransferNew;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};
use engine::{
    AdjustmentBatchCmd, Identity, PurchaseCmd, Transaction, TransactionDetail, TransferCmd,
};

fn map_kind(kind: engine::TransactionKind) -> ApiKind {
    match kind {
        engine::TransactionKind::Purchase => ApiKind::Purchase,
        engine::TransactionKind::Transfer => ApiKind::Transfer,
        engine::TransactionKind::TopUp => ApiKind::TopUp,
        engine::TransactionKind::Adjustment => ApiKind::Adjustment,
        engine::TransactionKind::Refund => ApiKind::Refund,
    }
}

fn map_status(status: engine::TransactionStatus) -> ApiStatus {
    match status {
        engine::TransactionStatus::Completed => ApiStatus::Completed,
        engine::TransactionStatus::Cancelled => ApiStatus::Cancelled,
    }
}

pub(crate) fn transaction_view(tx: &Transaction) -> TransactionView {
    let (product_id, quantity, shop_id, event_id, peer_account_id, reversal_of) = match &tx.detail {
        TransactionDetail::Purchase {
            product_id,
            quantity,
            shop_id,
            event_id,
        } => (
            *product_id,
            *quantity,
            shop_id.clone(),
            *event_id,
            None,
            None,
        ),
        TransactionDetail::Transfer { peer_account_id } => {
            (None, None, None, None, Some(*peer_account_id), None)
        }
        TransactionDetail::TopUp | TransactionDetail::Adjustment => {
            (None, None, None, None, None, None)
        }
        TransactionDetail::Refund {
            reversal_of,
            event_id,
        } => (None, None, None, *event_id, None, *reversal_of),
    };

    TransactionView {
        id: tx.id,
        account_id: tx.account_id,
        kind: map_kind(tx.kind()),
        status: map_status(tx.status),
        amount_minor: tx.amount_minor,
        issuer_id: tx.issuer_id.clone(),
        description: tx.description.clone(),
        group_id: tx.group_id,
        product_id,
        quantity,
        shop_id,
        event_id,
        peer_account_id,
        reversal_of,
        created_at: tx.created_at,
    }
}

pub async fn purchase_new(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Json(payload): Json<PurchaseNew>,
) -> Result<(StatusCode, Json<TransactionsResponse>), ServerError> {
    let mut cmd = PurchaseCmd::new(
        payload.payer_account_id,
        payload.recipient_user_id,
        payload.shop_id,
    );
    for line in payload.lines {
        cmd = cmd.line(line.product_id, line.quantity);
    }
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }

    let rows = state.engine.record_purchase(cmd, &identity).await?;
    let transactions = rows.iter().map(transaction_view).collect();
    Ok((
        StatusCode::CREATED,
        Json(TransactionsResponse { transactions }),
    ))
}

pub async fn transfer_new(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Json(payload): Json<TransferNew>,
) -> Result<(StatusCode, Json<TransactionsResponse>), ServerError> {
    let mut cmd = TransferCmd::new(
        payload.from_account_id,
        payload.to_account_id,
        payload.amount_minor,
    );
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }

    let (debit, credit) = state.engine.record_transfer(cmd, &identity).await?;
    Ok((
        StatusCode::CREATED,
        Json(TransactionsResponse {
            transactions: vec![transaction_view(&debit), transaction_view(&credit)],
        }),
    ))
}

pub async fn adjustment_new(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Json(payload): Json<AdjustmentNew>,
) -> Result<(StatusCode, Json<AdjustmentResponse>), ServerError> {
    let cmd = AdjustmentBatchCmd::new(
        payload.target_account_ids,
        payload.amount_minor,
        payload.description,
    );
    let outcome = state.engine.record_adjustment_batch(cmd, &identity).await?;
    Ok((
        StatusCode::CREATED,
        Json(AdjustmentResponse {
            group_id: outcome.group_id,
            transactions: outcome.succeeded.iter().map(transaction_view).collect(),
            failures: outcome
                .failures
                .iter()
                .map(|failure| AdjustmentFailureView {
                    account_id: failure.account_id,
                    reason: failure.reason.to_string(),
                })
                .collect(),
        }),
    ))
}

pub async fn cancel(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<(StatusCode, Json<TransactionView>), ServerError> {
    let compensation = state
        .engine
        .cancel_transaction(transaction_id, &identity)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction_view(&compensation))))
}

pub async fn cancel_group(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<(StatusCode, Json<TransactionsResponse>), ServerError> {
    let reversals = state.engine.cancel_group(group_id, &identity).await?;
    Ok((
        StatusCode::CREATED,
        Json(TransactionsResponse {
            transactions: reversals.iter().map(transaction_view).collect(),
        }),
    ))
}
