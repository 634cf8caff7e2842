use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct IndexParams {
    /// Only return notifications that have not been read
    #[serde(default)]
    pub(crate) unread_only: bool,
    pub(crate) limit: Option<u64>,
}
