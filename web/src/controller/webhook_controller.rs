//! Inspection and secret rotation for an organization's outbound webhooks.

use crate::controller::ApiResponse;
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::params::LimitParams;
use crate::{AppState, Error};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::Id;
use log::*;
use serde_json::json;

/// GET recent delivery attempts of a webhook, newest first
#[utoipa::path(
    get,
    path = "/webhooks/{id}/deliveries",
    params(
        ("id" = Uuid, Path, description = "Webhook id"),
        LimitParams
    ),
    responses(
        (status = 200, description = "Delivery history", body = [domain::webhook_deliveries::Model]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a manager or admin"),
        (status = 404, description = "Webhook not found in the caller's organization"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn deliveries(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET deliveries of webhook {id}");

    let deliveries = app_state
        .pipeline
        .dispatcher
        .list_deliveries(claims.org_id, id, params.limit)
        .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), deliveries)))
}

/// POST rotate a webhook's signing secret
///
/// The response is the only place the new secret is ever revealed.
#[utoipa::path(
    post,
    path = "/webhooks/{id}/secret",
    params(
        ("id" = Uuid, Path, description = "Webhook id")
    ),
    responses(
        (status = 201, description = "New signing secret"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a manager or admin"),
        (status = 404, description = "Webhook not found in the caller's organization"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn regenerate_secret(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    info!("User {} is regenerating the secret of webhook {id}", claims.sub);

    let secret = app_state
        .pipeline
        .dispatcher
        .regenerate_secret(claims.org_id, id)
        .await?;

    Ok(Json(ApiResponse::new(
        StatusCode::CREATED.into(),
        json!({ "secret": secret }),
    )))
}
