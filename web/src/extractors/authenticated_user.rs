use crate::extractors::RejectionType;
use crate::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use domain::jwt::{self, Claims};
use log::*;

/// The caller identified by a valid `Authorization: Bearer <jwt>` header.
pub(crate) struct AuthenticatedUser(pub Claims);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = RejectionType;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let unauthorized = || (StatusCode::UNAUTHORIZED, "Unauthorized".to_string());

        let token = bearer_token(parts).ok_or_else(unauthorized)?;

        match jwt::decode_token(state.config(), token) {
            Ok(claims) => {
                trace!("Authenticated user {} in org {}", claims.sub, claims.org_id);
                Ok(AuthenticatedUser(claims))
            }
            Err(err) if err.is_config() => {
                error!("Cannot authenticate requests: {err}");
                Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL SERVER ERROR".to_string(),
                ))
            }
            Err(_) => Err(unauthorized()),
        }
    }
}
