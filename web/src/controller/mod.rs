use serde::Serialize;
pub(crate) mod coach_controller;
pub(crate) mod event_controller;
pub(crate) mod health_check_controller;
pub(crate) mod notification_controller;
pub(crate) mod run_controller;
pub(crate) mod webhook_controller;
pub(crate) mod webhook_delivery_controller;

/// Envelope wrapped around every JSON response.
#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status_code: u16, data: T) -> Self {
        Self {
            status_code,
            data: Some(data),
        }
    }
}
