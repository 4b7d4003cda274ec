// Route definitions

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    filters::{FilterSelection, RouteFilters},
    listing::{ListingController, ListingEngine},
    models::ListingParams,
    profile::ListingKind,
    AppState,
};

mod api;
mod pages;

pub fn create_router(app_state: AppState) -> Router {
    // JSON endpoints, mirroring what the pages render
    let api_router = Router::new()
        .route("/brands", get(api::get_brands))
        .route("/models", get(api::get_models))
        .route("/used-cars", get(api::used_cars))
        .route("/new-cars", get(api::new_cars))
        .route("/cars/:kind/:id", get(api::get_car))
        .route("/emi", get(api::get_emi))
        .route("/leads", post(api::submit_lead))
        .with_state(app_state.clone());

    Router::new()
        .route("/", get(pages::landing_page))
        // Listing pages: brand, model and city are optional trailing segments
        .route("/used-cars", get(pages::used_cars_page))
        .route("/used-cars/:brand", get(pages::used_cars_page))
        .route("/used-cars/:brand/:model", get(pages::used_cars_page))
        .route("/used-cars/:brand/:model/:city", get(pages::used_cars_page))
        .route("/new-cars", get(pages::new_cars_page))
        .route("/new-cars/:brand", get(pages::new_cars_page))
        .route("/new-cars/:brand/:model", get(pages::new_cars_page))
        .route("/franchise", get(pages::franchise_page))
        .route("/finance", get(pages::finance_page))
        .route("/insurance", get(pages::insurance_page))
        .nest("/api", api_router)
        .with_state(app_state)
}

/// Runs one load cycle for a request: route, sidebar filters and page all come from the URL.
async fn load_listing(
    engine: &Arc<ListingEngine>,
    kind: ListingKind,
    route: RouteFilters,
    params: &ListingParams,
) -> ListingController {
    let mut controller = engine.controller(kind);
    controller.set_route(route);
    controller.set_filters(FilterSelection::from_params(params));
    controller.set_page(params.page.unwrap_or(1));
    controller.load().await;
    controller
}
