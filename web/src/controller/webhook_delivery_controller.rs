use crate::controller::ApiResponse;
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::Id;
use log::*;

/// POST re-send a stored delivery as a new delivery attempt
#[utoipa::path(
    post,
    path = "/webhook_deliveries/{id}/retry",
    params(
        ("id" = Uuid, Path, description = "Delivery id to re-send")
    ),
    responses(
        (status = 201, description = "Outcome of the new delivery"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not a manager or admin"),
        (status = 404, description = "Delivery or webhook not found"),
        (status = 422, description = "Webhook is disabled"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn retry(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST retry of webhook delivery {id} by {}", claims.sub);

    let outcome = app_state
        .pipeline
        .dispatcher
        .retry_delivery(claims.org_id, id)
        .await?;

    Ok(Json(ApiResponse::new(StatusCode::CREATED.into(), outcome)))
}
