use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use domain::error::{
    DomainErrorKind, EntityErrorKind, Error as DomainError, ExternalErrorKind, InternalErrorKind,
};
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl Error {
    fn status(&self) -> StatusCode {
        match &self.0.error_kind {
            DomainErrorKind::Internal(internal_error_kind) => match internal_error_kind {
                InternalErrorKind::Entity(entity_error_kind) => match entity_error_kind {
                    EntityErrorKind::NotFound | EntityErrorKind::NotUpdated => {
                        StatusCode::NOT_FOUND
                    }
                    EntityErrorKind::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
                    EntityErrorKind::DbTransaction | EntityErrorKind::Other(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                },
                InternalErrorKind::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                InternalErrorKind::Config
                | InternalErrorKind::RuleEvaluation(_)
                | InternalErrorKind::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            DomainErrorKind::External(external_error_kind) => match external_error_kind {
                ExternalErrorKind::Network | ExternalErrorKind::Timeout => StatusCode::BAD_GATEWAY,
                ExternalErrorKind::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html#associatedconstant.UNPROCESSABLE_ENTITY
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        if let DomainErrorKind::Internal(InternalErrorKind::Validation(message)) =
            self.0.error_kind
        {
            return (status, message).into_response();
        }

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let reason = status.canonical_reason().unwrap_or("UNKNOWN").to_uppercase();
        (status, reason).into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::error::DomainErrorKind::{External, Internal};

    fn status_of(error_kind: DomainErrorKind) -> StatusCode {
        Error(DomainError {
            source: None,
            error_kind,
        })
        .into_response()
        .status()
    }

    #[test]
    fn entity_kinds_map_to_client_and_server_errors() {
        assert_eq!(
            status_of(Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(Internal(InternalErrorKind::Entity(EntityErrorKind::Invalid))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(Internal(InternalErrorKind::Entity(
                EntityErrorKind::DbTransaction
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_is_unprocessable() {
        assert_eq!(
            status_of(Internal(InternalErrorKind::Validation(
                "title is empty".to_string()
            ))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn upstream_failures_are_bad_gateway() {
        assert_eq!(status_of(External(ExternalErrorKind::Network)), StatusCode::BAD_GATEWAY);
        assert_eq!(status_of(External(ExternalErrorKind::Timeout)), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_of(External(ExternalErrorKind::Other("boom".to_string()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn missing_configuration_is_a_server_error() {
        assert_eq!(
            status_of(Internal(InternalErrorKind::Config)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
