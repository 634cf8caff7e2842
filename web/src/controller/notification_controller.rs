use crate::controller::ApiResponse;
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::params::notification::IndexParams;
use crate::{AppState, Error};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::{notification as NotificationApi, Id};
use log::*;
use serde_json::json;

/// GET the caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/notifications",
    params(IndexParams),
    responses(
        (status = 200, description = "Successfully retrieved notifications", body = [domain::notifications::Model]),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn index(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(app_state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET notifications for user {}: {params:?}", claims.sub);

    let notifications = NotificationApi::list_notifications(
        app_state.db_conn_ref(),
        claims.org_id,
        claims.sub,
        params.unread_only,
        params.limit,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), notifications)))
}

/// PUT mark one of the caller's notifications as read
#[utoipa::path(
    put,
    path = "/notifications/{id}/read",
    params(
        ("id" = Uuid, Path, description = "Notification id to mark read")
    ),
    responses(
        (status = 200, description = "Notification marked read", body = domain::notifications::Model),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Notification not found"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn read(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("PUT mark notification {id} read");

    let notification =
        NotificationApi::mark_read(app_state.db_conn_ref(), claims.org_id, claims.sub, id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), notification)))
}

/// PUT mark every unread notification of the caller as read
#[utoipa::path(
    put,
    path = "/notifications/read_all",
    responses(
        (status = 200, description = "Number of notifications marked read"),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn read_all(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    let updated =
        NotificationApi::mark_all_read(app_state.db_conn_ref(), claims.org_id, claims.sub).await?;
    info!("Marked {updated} notifications read for user {}", claims.sub);

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        json!({ "updated": updated }),
    )))
}
