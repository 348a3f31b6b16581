use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};
use checkin_core::config::CheckinConfig;
use checkin_scheduler::TriggerScheduler;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: CheckinConfig,
    pub scheduler: TriggerScheduler,
}

impl AppState {
    pub fn new(config: CheckinConfig, scheduler: TriggerScheduler) -> Self {
        Self { config, scheduler }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/v1/checkin-service/checkin",
            put(crate::http::checkins::schedule_checkin),
        )
        .route(
            "/v1/checkin-service/users/{user_id}/checkins",
            get(crate::http::checkins::list_checkins),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_token,
        ));

    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .merge(api)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
