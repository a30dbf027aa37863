// Handlers for the scraping and analysis endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    deals, depreciation,
    error::AppResult,
    fetcher, market,
    models::{AnalysisMode, CarDetail, CarRecord, DealCriteria, DealResult, DepreciationProjection, MarketSummary},
    parser, AppState,
};

// --- Response Wrappers ---

// Every successful response is {"success": true, ...payload}
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    payload: T,
}

fn success<T: Serialize>(payload: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { success: true, payload })
}

#[derive(Serialize)]
pub struct ListingsPayload {
    cars_found: usize,
    data: Vec<CarRecord>,
}

impl From<Vec<CarRecord>> for ListingsPayload {
    fn from(data: Vec<CarRecord>) -> Self {
        Self { cars_found: data.len(), data }
    }
}

// --- Request Structs ---

fn default_max_pages() -> u32 {
    1
}

fn default_years_ahead() -> u32 {
    3
}

#[derive(Deserialize, Debug)]
pub struct FetchListingsRequest {
    url: String,
    #[serde(default = "default_max_pages")]
    max_pages: u32,
}

#[derive(Deserialize, Debug)]
pub struct ParseListingsRequest {
    html: String,
    reference_year: Option<i32>,
}

#[derive(Deserialize, Debug)]
pub struct CarDetailRequest {
    car_url: String,
}

#[derive(Deserialize, Debug)]
pub struct AnalysisRequest {
    cars_data: Vec<CarRecord>,
    #[serde(default)]
    analysis_type: AnalysisMode,
}

#[derive(Deserialize, Debug)]
pub struct DealsRequest {
    cars_data: Vec<CarRecord>,
    max_price: Option<u64>,
    max_mileage: Option<u64>,
    min_year: Option<i32>,
}

#[derive(Deserialize, Debug)]
pub struct DepreciationRequest {
    car_data: CarRecord,
    #[serde(default = "default_years_ahead")]
    years_ahead: u32,
}

// --- API Handlers ---

pub async fn health() -> Json<Value> {
    Json(json!({ "success": true, "status": "ok" }))
}

pub async fn fetch_listings(
    State(app_state): State<AppState>,
    payload: Result<Json<FetchListingsRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<ListingsPayload>>> {
    let Json(request) = payload?;
    tracing::info!("[HANDLER] /api/listings - Request received for {} ({} pages)", request.url, request.max_pages);

    let cars = fetcher::fetch_listings(&app_state.http_client, &app_state.settings, &request.url, request.max_pages).await?;

    tracing::info!("[HANDLER] /api/listings - Returning {} cars.", cars.len());
    Ok(success(ListingsPayload::from(cars)))
}

pub async fn parse_listings(
    State(app_state): State<AppState>,
    payload: Result<Json<ParseListingsRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<ListingsPayload>>> {
    let Json(request) = payload?;
    let reference_year = request.reference_year.unwrap_or_else(|| app_state.settings.reference_year());
    tracing::info!("[HANDLER] /api/listings/parse - Parsing {} bytes of markup.", request.html.len());

    let cars = parser::parse_listings_with_base(&request.html, reference_year, &app_state.settings.base_url);

    tracing::info!("[HANDLER] /api/listings/parse - Parsed {} cars.", cars.len());
    Ok(success(ListingsPayload::from(cars)))
}

pub async fn fetch_car_detail(
    State(app_state): State<AppState>,
    payload: Result<Json<CarDetailRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<CarDetail>>> {
    let Json(request) = payload?;
    tracing::info!("[HANDLER] /api/details - Request received for {}", request.car_url);

    let detail = fetcher::fetch_car_detail(&app_state.http_client, &app_state.settings, &request.car_url).await?;

    tracing::debug!(
        "[HANDLER] /api/details - {} specifications, {} equipment items.",
        detail.specifications.len(),
        detail.equipment.len()
    );
    Ok(success(detail))
}

pub async fn analyze_market(
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<MarketSummary>>> {
    let Json(request) = payload?;
    tracing::info!(
        "[HANDLER] /api/analysis - Analysing {} cars ({:?}).",
        request.cars_data.len(),
        request.analysis_type
    );

    Ok(success(market::analyze_market(&request.cars_data, request.analysis_type)))
}

pub async fn find_best_deals(
    payload: Result<Json<DealsRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<DealResult>>> {
    let Json(request) = payload?;
    let criteria = DealCriteria {
        max_price: request.max_price,
        max_mileage: request.max_mileage,
        min_year: request.min_year,
    };
    tracing::info!("[HANDLER] /api/deals - Ranking {} cars with {:?}", request.cars_data.len(), criteria);

    let result = deals::find_best_deals(&request.cars_data, criteria);

    tracing::info!("[HANDLER] /api/deals - {} matches.", result.total_matches);
    Ok(success(result))
}

pub async fn project_depreciation(
    payload: Result<Json<DepreciationRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<DepreciationProjection>>> {
    let Json(request) = payload?;
    tracing::info!(
        "[HANDLER] /api/depreciation - Projecting '{}' {} years ahead.",
        request.car_data.name,
        request.years_ahead
    );

    let projection = depreciation::project_depreciation(&request.car_data, request.years_ahead)?;
    Ok(success(projection))
}
