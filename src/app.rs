//! Application wiring: shared state and the router built from the model
//! registry. Routing is fixed at startup; nothing is dispatched on model
//! names at request time.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::account;
use crate::config::AppConfig;
use crate::crud;
use crate::email::Mailer;
use crate::model::ModelRegistry;
use crate::store::Datastore;

/// Shared state handed to every handler. The storage and mail collaborators
/// are trait objects so deployments (and tests) can swap backends.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn Datastore>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

pub fn build_router(ctx: AppContext, registry: &ModelRegistry) -> Router {
    let mut router = Router::new()
        .route("/signup", post(account::signup))
        .route("/signin", post(account::signin))
        .route("/forgot", post(account::forgot))
        .route("/reset", post(account::reset))
        .route("/magiclink_request", post(account::magic_link_request))
        .route("/magiclink_signin", post(account::magic_link_signin))
        .route(
            "/user",
            get(account::user_profile).post(account::user_update),
        )
        .route("/", get(project_name));

    for model in registry.models() {
        tracing::info!(model = %model.name, access = ?model.access, "registering model routes");
        router = router.merge(crud::model_routes(model));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn project_name(State(ctx): State<AppContext>) -> String {
    ctx.config.project_name.clone()
}
