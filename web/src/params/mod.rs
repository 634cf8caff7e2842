pub(crate) mod event;
pub(crate) mod notification;

use serde::Deserialize;
use utoipa::IntoParams;

/// `?limit=` for list endpoints; each endpoint clamps it to its own maximum.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct LimitParams {
    pub(crate) limit: Option<u64>,
}
