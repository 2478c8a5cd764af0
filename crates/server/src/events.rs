//! Event API endpoints: lifecycle, registration, settlement, revenue.

use api_types::event::{
    ActivationResponse, DepositWarningView, EventKind as ApiEventKind,
    EventNew, EventStatus as ApiEventStatus, EventView, JoinRequest, LeaveRequest,
    RevenueResponse, SettlementResponse, SettlementShareView,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};
use engine::{Event, EventCmd, EventKind, Identity, SettlementPreview};

fn map_kind(kind: EventKind) -> ApiEventKind {
    match kind {
        EventKind::SharedCost => ApiEventKind::SharedCost,
        EventKind::Commercial => ApiEventKind::Commercial,
    }
}

fn event_view(event: Event) -> EventView {
    let status = match event.status {
        engine::EventStatus::Draft => ApiEventStatus::Draft,
        engine::EventStatus::Open => ApiEventStatus::Open,
        engine::EventStatus::Closed => ApiEventStatus::Closed,
        engine::EventStatus::Archived => ApiEventStatus::Archived,
    };
    EventView {
        id: event.id,
        shop_id: event.shop_id,
        name: event.name,
        kind: map_kind(event.kind),
        status,
        deposit_minor: event.deposit_minor,
        allow_self_registration: event.allow_self_registration,
        created_by: event.created_by,
        created_at: event.created_at,
    }
}

fn settlement_view(preview: SettlementPreview) -> SettlementResponse {
    SettlementResponse {
        total_expenses_minor: preview.total_expenses_minor,
        total_weight: preview.total_weight,
        cost_per_weight_unit_milli: preview.cost_per_weight_unit_milli,
        shares: preview
            .shares
            .into_iter()
            .map(|share| SettlementShareView {
                user_id: share.user_id,
                weight: share.weight,
                share_minor: share.share_minor,
                deposit_minor: share.deposit_minor,
                diff_minor: share.diff_minor,
            })
            .collect(),
    }
}

pub async fn new(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Json(payload): Json<EventNew>,
) -> Result<(StatusCode, Json<EventView>), ServerError> {
    let kind = match payload.kind {
        ApiEventKind::SharedCost => EventKind::SharedCost,
        ApiEventKind::Commercial => EventKind::Commercial,
    };
    let cmd = EventCmd::new(payload.shop_id, payload.name, kind)
        .deposit_minor(payload.deposit_minor)
        .allow_self_registration(payload.allow_self_registration);
    let event = state.engine.new_event(cmd, &identity).await?;
    Ok((StatusCode::CREATED, Json(event_view(event))))
}

pub async fn get(
    Extension(_identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventView>, ServerError> {
    let event = state.engine.event(event_id).await?;
    Ok(Json(event_view(event)))
}

pub async fn join(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<JoinRequest>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .join_event(event_id, &payload.user_id, payload.weight, &identity)
        .await?;
    Ok(StatusCode::CREATED)
}

pub async fn leave(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<LeaveRequest>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .leave_event(event_id, &payload.user_id, &identity)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn activate(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<ActivationResponse>, ServerError> {
    let outcome = state.engine.activate_event(event_id, &identity).await?;
    Ok(Json(ActivationResponse {
        event: event_view(outcome.event),
        warnings: outcome
            .warnings
            .into_iter()
            .map(|warning| DepositWarningView {
                user_id: warning.user_id,
                shortfall_minor: warning.shortfall_minor,
            })
            .collect(),
    }))
}

pub async fn settlement_preview(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<SettlementResponse>, ServerError> {
    let preview = state.engine.preview_settlement(event_id, &identity).await?;
    Ok(Json(settlement_view(preview)))
}

pub async fn settle(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<SettlementResponse>, ServerError> {
    let preview = state.engine.execute_settlement(event_id, &identity).await?;
    Ok(Json(settlement_view(preview)))
}

pub async fn close(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventView>, ServerError> {
    let event = state.engine.close_event(event_id, &identity).await?;
    Ok(Json(event_view(event)))
}

pub async fn archive(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventView>, ServerError> {
    let event = state.engine.archive_event(event_id, &identity).await?;
    Ok(Json(event_view(event)))
}

pub async fn revenue(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<RevenueResponse>, ServerError> {
    let revenue = state.engine.event_revenue(event_id, &identity).await?;
    Ok(Json(RevenueResponse {
        revenue_minor: revenue.cents(),
    }))
}
