use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

/// Body of `POST /events`: an event name from the vocabulary and its payload.
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct EmitParams {
    #[schema(example = "attempt.scored")]
    pub(crate) name: String,
    #[schema(value_type = Object)]
    pub(crate) data: Value,
}
