use crate::controller::ApiResponse;
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::params::event::EmitParams;
use crate::{AppState, Error};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use events::DomainEvent;
use log::*;

/// POST emit a domain event into the pipeline
///
/// The payload is validated before anything is stored. Callers may only emit
/// events for their own organization unless they are admins.
#[utoipa::path(
    post,
    path = "/events",
    request_body = EmitParams,
    responses(
        (status = 201, description = "Event accepted and subscriber runs scheduled"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Event belongs to another organization"),
        (status = 422, description = "Unknown event name or invalid payload"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create(
    AuthenticatedUser(claims): AuthenticatedUser,
    State(app_state): State<AppState>,
    Json(params): Json<EmitParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST emit {} from user {}", params.name, claims.sub);

    let event = DomainEvent::from_parts(&params.name, params.data)?;

    // Organization-less events (schedule ticks) are admin only.
    let permitted = claims.is_admin() || event.org_id() == Some(claims.org_id);
    if !permitted {
        warn!(
            "User {} tried to emit {} for org {:?}",
            claims.sub,
            params.name,
            event.org_id()
        );
        return Ok((StatusCode::FORBIDDEN, "FORBIDDEN").into_response());
    }

    let envelope = app_state.pipeline.emitter.emit(event).await?;

    Ok(Json(ApiResponse::new(StatusCode::CREATED.into(), envelope)).into_response())
}
