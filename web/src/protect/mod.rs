//! Role checks applied to route groups with `axum::middleware::from_fn_with_state`.
//!
//! Authentication itself happens in the [`AuthenticatedUser`] extractor; these
//! functions only decide whether an authenticated caller may proceed.

use crate::{extractors::authenticated_user::AuthenticatedUser, AppState};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use log::*;

/// Webhook administration is limited to managers and admins of the org.
pub(crate) async fn webhook_managers(
    State(_app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    request: Request,
    next: Next,
) -> impl IntoResponse {
    if claims.can_manage_webhooks() {
        next.run(request).await
    } else {
        debug!("User {} may not manage webhooks", claims.sub);
        (StatusCode::FORBIDDEN, "FORBIDDEN").into_response()
    }
}

/// Subscriber run inspection and replay are admin-only.
pub(crate) async fn admins(
    State(_app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    request: Request,
    next: Next,
) -> impl IntoResponse {
    if claims.is_admin() {
        next.run(request).await
    } else {
        debug!("User {} is not an admin", claims.sub);
        (StatusCode::FORBIDDEN, "FORBIDDEN").into_response()
    }
}
