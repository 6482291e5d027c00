use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::actor::Actor;
use crate::api::extract::{ApiJson, ApiPath};
use crate::db::models::{Handover, HandoverType};
use crate::error::{HandoverError, Result};
use crate::handover::{BankDeposit, Confirmation, OpenHandover};
use crate::AppState;

pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
) -> Result<Json<Vec<Handover>>> {
    let handovers = state.handover_service.pending_for(&actor).await?;

    Ok(Json(handovers))
}

pub async fn get_handover(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Handover>> {
    let handover = state.handover_service.get(id).await?;

    Ok(Json(handover))
}

pub async fn get_station_chain(
    State(state): State<Arc<AppState>>,
    ApiPath(station_id): ApiPath<String>,
) -> Result<Json<Vec<Handover>>> {
    let chain = state.handover_service.chain(&station_id).await?;

    Ok(Json(chain))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandoverRequest {
    pub station_id: String,
    // parsed by hand so an unknown type is a 400 with our error body
    pub handover_type: String,
    pub from_user_id: Option<String>,
    pub shift_id: Option<String>,
    pub notes: Option<String>,
    // accepted only to be refused; the receiver is always looked up
    pub to_user_id: Option<String>,
}

pub async fn open_handover(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<OpenHandoverRequest>,
) -> Result<(StatusCode, Json<Handover>)> {
    if req.to_user_id.is_some() {
        return Err(HandoverError::InvalidRequest(
            "toUserId is assigned by the server".to_string(),
        ));
    }

    let handover_type: HandoverType = req
        .handover_type
        .parse()
        .map_err(HandoverError::InvalidRequest)?;

    let handover = state
        .handover_service
        .open_handover(OpenHandover {
            station_id: req.station_id,
            handover_type,
            from_user_id: req.from_user_id.unwrap_or(actor),
            shift_id: req.shift_id,
            notes: req.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(handover)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub actual_amount: Option<Decimal>,
    pub accept_as_is: Option<bool>,
    pub notes: Option<String>,
}

pub async fn confirm_handover(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ConfirmRequest>,
) -> Result<Json<Handover>> {
    let confirmation = Confirmation {
        actual_amount: req.actual_amount,
        accept_as_is: req.accept_as_is.unwrap_or(false),
        notes: req.notes,
    };

    let handover = state
        .handover_service
        .confirm(id, &actor, confirmation)
        .await?;

    Ok(Json(handover))
}

pub async fn record_bank_deposit(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<BankDeposit>,
) -> Result<(StatusCode, Json<Handover>)> {
    let handover = state.handover_service.record_deposit(&actor, req).await?;

    Ok((StatusCode::CREATED, Json(handover)))
}
