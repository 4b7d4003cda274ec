// Handlers for the JSON API

use std::sync::Arc;

use axum::{
    extract::{Json as JsonExtract, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use super::load_listing;
use crate::{
    emi::{emi, EmiBreakdown},
    error::{AppError, AppResult},
    filters::RouteFilters,
    leads::{LeadRequest, LeadSink},
    listing::{ListingEngine, LoadFailure, LoadState},
    models::{CarModel, ListingParams},
    profile::ListingKind,
};

// --- Request Structs ---

#[derive(Deserialize)]
pub struct ModelsQuery {
    #[serde(default = "default_kind")]
    kind: ListingKind,
    brand: Option<String>,
}

fn default_kind() -> ListingKind {
    ListingKind::Used
}

#[derive(Deserialize)]
pub struct EmiQuery {
    principal: f64,
    rate: f64,
    months: u32,
}

// --- Response Wrappers ---

#[derive(Serialize)]
struct ListingFailureResponse {
    success: bool,
    error: LoadFailure,
}

// --- API Handlers ---

pub async fn get_brands(State(engine): State<Arc<ListingEngine>>) -> AppResult<impl IntoResponse> {
    tracing::info!("[HANDLER] /api/brands - Request received.");
    let brands = engine.catalog().brands().await?;
    tracing::debug!("[HANDLER] /api/brands - Returning {} brands.", brands.len());
    Ok(Json(brands))
}

pub async fn get_models(
    State(engine): State<Arc<ListingEngine>>,
    Query(query): Query<ModelsQuery>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("[HANDLER] /api/models - kind: {:?}, brand: {:?}", query.kind, query.brand);
    let models: Vec<CarModel> = match query.brand.as_deref() {
        Some(brand) => engine.catalog().models_for_brand(query.kind, brand).await?,
        None => engine.catalog().models(query.kind).await?,
    };
    Ok(Json(models))
}

pub async fn used_cars(
    State(engine): State<Arc<ListingEngine>>,
    Query(params): Query<ListingParams>,
) -> Response {
    listing_json(&engine, ListingKind::Used, params).await
}

pub async fn new_cars(
    State(engine): State<Arc<ListingEngine>>,
    Query(params): Query<ListingParams>,
) -> Response {
    listing_json(&engine, ListingKind::New, params).await
}

async fn listing_json(engine: &Arc<ListingEngine>, kind: ListingKind, params: ListingParams) -> Response {
    tracing::info!("[HANDLER] /api/{}-cars - params: {:?}", kind.as_str(), params);
    let controller = load_listing(engine, kind, RouteFilters::from_params(&params), &params).await;
    match controller.state() {
        LoadState::Ready(page) => Json(page).into_response(),
        LoadState::Error(failure) => (
            StatusCode::BAD_GATEWAY,
            Json(ListingFailureResponse { success: false, error: failure.clone() }),
        )
            .into_response(),
        // load() always settles in Ready or Error
        LoadState::Idle | LoadState::Loading => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

pub async fn get_car(
    State(engine): State<Arc<ListingEngine>>,
    Path((kind, id)): Path<(ListingKind, String)>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("[HANDLER] /api/cars - kind: {}, id: {}", kind.as_str(), id);
    match engine.find_listing(kind, &id).await? {
        Some(document) => Ok(Json(document)),
        None => Err(AppError::NotFound(format!("No {} car with id '{}'", kind.as_str(), id))),
    }
}

pub async fn get_emi(Query(query): Query<EmiQuery>) -> AppResult<Json<EmiBreakdown>> {
    let breakdown = emi(query.principal, query.rate, query.months)?;
    Ok(Json(breakdown))
}

pub async fn submit_lead(
    State(leads): State<Arc<dyn LeadSink>>,
    JsonExtract(lead): JsonExtract<LeadRequest>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("[HANDLER] /api/leads - {} lead received.", lead.kind.as_str());
    let ack = leads.submit(lead).await?;
    Ok((StatusCode::CREATED, Json(ack)))
}
