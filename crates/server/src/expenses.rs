//! Expense API endpoints.

use api_types::expense::{ExpenseNew, ExpenseView, SplitRequest};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};
use engine::{ExpenseCmd, Identity};

pub async fn new(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseView>), ServerError> {
    let mut cmd = ExpenseCmd::new(payload.shop_id, payload.amount_minor, payload.description);
    if let Some(event_id) = payload.event_id {
        cmd = cmd.event_id(event_id);
    }
    let expense = state.engine.add_expense(cmd, &identity).await?;
    Ok((
        StatusCode::CREATED,
        Json(ExpenseView {
            id: expense.id,
            shop_id: expense.shop_id,
            event_id: expense.event_id,
            amount_minor: expense.amount_minor,
            description: expense.description,
            created_by: expense.created_by,
            created_at: expense.created_at,
        }),
    ))
}

pub async fn split(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
    Json(payload): Json<SplitRequest>,
) -> Result<StatusCode, ServerError> {
    let parts: Vec<(Uuid, i64)> = payload
        .parts
        .into_iter()
        .map(|part| (part.event_id, part.amount_minor))
        .collect();
    state
        .engine
        .split_expense(expense_id, &parts, &identity)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
