mod api;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;
use crate::state::AppState;
use crate::ws::handler::room_entry;
pub use api::create_api_routes;

/// Assemble the full application router.
///
/// API and documentation paths are matched first; every other path is a room.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(room_entry))
        // Mount API routes
        .nest("/api", create_api_routes())
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(room_entry)
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
