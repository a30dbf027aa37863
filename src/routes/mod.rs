// Route definitions

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::AppState;

mod api;

pub fn create_router(app_state: AppState) -> Router {
    // Scraping and analysis endpoints, all JSON in and out
    let api_router = Router::new()
        .route("/listings", post(api::fetch_listings))
        .route("/listings/parse", post(api::parse_listings))
        .route("/details", post(api::fetch_car_detail))
        .route("/analysis", post(api::analyze_market))
        .route("/deals", post(api::find_best_deals))
        .route("/depreciation", post(api::project_depreciation));

    Router::new()
        .route("/health", get(api::health))
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
