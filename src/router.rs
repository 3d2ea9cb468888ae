use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::get,
};
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let max_upload = state.config.files.max_upload_bytes;

    Router::new()
        .route("/", get(crate::web::handlers::index))
        .route("/health", get(crate::api::handlers::health_check))
        .route(
            "/files/upload",
            get(crate::web::handlers::upload_page)
                .post(crate::api::handlers::upload_file)
                .layer(DefaultBodyLimit::max(max_upload)),
        )
        .route(
            "/files/share/:id",
            get(crate::web::handlers::share_page).post(crate::api::handlers::revoke_share),
        )
        .route(
            "/files/view/:id",
            get(crate::web::handlers::view_page).post(crate::api::handlers::unlock_view),
        )
        .fallback(crate::web::handlers::not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
