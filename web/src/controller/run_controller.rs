use crate::controller::ApiResponse;
use crate::params::LimitParams;
use crate::{AppState, Error};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::Id;
use log::*;

const DEFAULT_FAILED_RUN_LIMIT: u64 = 50;
const MAX_FAILED_RUN_LIMIT: u64 = 500;

/// GET subscriber runs that exhausted their attempts
#[utoipa::path(
    get,
    path = "/runs/failed",
    params(LimitParams),
    responses(
        (status = 200, description = "Failed runs, most recently updated first", body = [domain::subscriber_runs::Model]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not an admin"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn failed(
    State(app_state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, Error> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_FAILED_RUN_LIMIT)
        .clamp(1, MAX_FAILED_RUN_LIMIT);

    let runs = app_state.pipeline.ledger().failed_runs(limit).await?;
    debug!("Found {} failed runs", runs.len());

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), runs)))
}

/// POST put a failed run back in the queue with a fresh attempt budget
#[utoipa::path(
    post,
    path = "/runs/{id}/replay",
    params(
        ("id" = Uuid, Path, description = "Failed run to replay")
    ),
    responses(
        (status = 200, description = "The requeued run", body = domain::subscriber_runs::Model),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Run not found"),
        (status = 422, description = "Run is not in a failed state"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn replay(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    let run = app_state.pipeline.ledger().replay(id).await?;
    info!("Replaying run {id} of {}", run.subscriber_id);

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), run)))
}
