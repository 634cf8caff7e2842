use crate::{controller::health_check_controller, protect, AppState};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

use crate::controller::{
    coach_controller, event_controller, notification_controller, run_controller,
    webhook_controller, webhook_delivery_controller,
};

use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Coaching Pipeline API"
        ),
        paths(
            health_check_controller::health_check,
            event_controller::create,
            notification_controller::index,
            notification_controller::read,
            notification_controller::read_all,
            webhook_controller::deliveries,
            webhook_controller::regenerate_secret,
            webhook_delivery_controller::retry,
            coach_controller::briefing,
            coach_controller::recommendation,
            run_controller::failed,
            run_controller::replay,
        ),
        components(
            schemas(
                domain::notifications::Model,
                domain::webhook_deliveries::Model,
                domain::subscriber_runs::Model,
                crate::params::event::EmitParams,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "coaching_pipeline", description = "Sales coaching event pipeline API")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Every endpoint except /health expects a bearer JWT issued by the identity provider.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(event_routes(app_state.clone()))
        .merge(notification_routes(app_state.clone()))
        .merge(webhook_routes(app_state.clone()))
        .merge(coach_routes(app_state.clone()))
        .merge(run_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn event_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events", post(event_controller::create))
        .with_state(app_state)
}

fn notification_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/notifications", get(notification_controller::index))
        .route(
            "/notifications/read_all",
            put(notification_controller::read_all),
        )
        .route(
            "/notifications/{id}/read",
            put(notification_controller::read),
        )
        .with_state(app_state)
}

fn webhook_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/webhooks/{id}/deliveries",
            get(webhook_controller::deliveries),
        )
        .route(
            "/webhooks/{id}/secret",
            post(webhook_controller::regenerate_secret),
        )
        .route(
            "/webhook_deliveries/{id}/retry",
            post(webhook_delivery_controller::retry),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            protect::webhook_managers,
        ))
        .with_state(app_state)
}

fn coach_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/coach/briefing/{scenario_id}",
            get(coach_controller::briefing),
        )
        .route(
            "/coach/recommendation",
            get(coach_controller::recommendation),
        )
        .with_state(app_state)
}

fn run_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/runs/failed", get(run_controller::failed))
        .route("/runs/{id}/replay", post(run_controller::replay))
        .route_layer(from_fn_with_state(app_state.clone(), protect::admins))
        .with_state(app_state)
}
