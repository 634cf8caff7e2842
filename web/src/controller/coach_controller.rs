use crate::controller::ApiResponse;
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::{coach as CoachApi, Id};
use log::*;

/// GET a pre-call briefing for the caller on one scenario
#[utoipa::path(
    get,
    path = "/coach/briefing/{scenario_id}",
    params(
        ("scenario_id" = Uuid, Path, description = "Scenario about to be practiced")
    ),
    responses(
        (status = 200, description = "Focus areas, tips, previous attempts and a motivational note"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Scenario not found or not visible to the caller's organization"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn briefing(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(scenario_id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET briefing on scenario {scenario_id} for {}", claims.sub);

    let pipeline = &app_state.pipeline;
    let briefing = CoachApi::generate_pre_call_briefing(
        pipeline.directory.as_ref(),
        pipeline.text.as_ref(),
        claims.org_id,
        claims.sub,
        scenario_id,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), briefing)))
}

/// GET the caller's current skill gaps and recommended next scenario
#[utoipa::path(
    get,
    path = "/coach/recommendation",
    responses(
        (status = 200, description = "Skill gap analysis and recommendation"),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn recommendation(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    let snapshot = CoachApi::coaching_snapshot(
        app_state.pipeline.directory.as_ref(),
        claims.org_id,
        claims.sub,
    )
    .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), snapshot)))
}
