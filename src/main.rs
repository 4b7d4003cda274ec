use anyhow::{Context, Result};
use axum::{extract::FromRef, Router};
use reqwest::Client;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    cache::{FileStore, ReferenceCache, SystemClock},
    catalog::Catalog,
    config::Settings,
    leads::{CsvLeadSink, LeadSink},
    listing::ListingEngine,
    mfind::MfindClient,
};

// Declare modules
mod cache;
mod catalog;
mod config;
mod emi;
mod error;
mod facets;
mod filters;
mod leads;
mod listing;
mod mfind;
mod models;
mod pagination;
mod profile;
mod query;
mod routes;
mod schema;
#[cfg(test)]
mod testing;

// Define the application state struct
#[derive(Clone, FromRef)]
struct AppState {
    engine: Arc<ListingEngine>,
    leads: Arc<dyn LeadSink>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "carlisting_rust=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing car listing server...");

    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    let settings = Arc::new(settings);

    // One pooled client for every call to the query endpoint
    let http_client = Arc::new(
        Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("Failed to build shared reqwest client")?,
    );
    let backend = Arc::new(MfindClient::new(http_client, &settings.mfind));
    tracing::info!("Query endpoint: {} (db: {})", settings.mfind.url, settings.mfind.db_name);

    let store = FileStore::open(&settings.cache.dir)
        .with_context(|| format!("Failed to open cache directory {}", settings.cache.dir.display()))?;
    let reference_cache = ReferenceCache::new(Arc::new(store), Arc::new(SystemClock));
    let catalog = Arc::new(Catalog::new(backend.clone(), reference_cache, &settings));
    let engine = Arc::new(ListingEngine::new(backend, catalog, &settings));

    let app_state = AppState {
        engine,
        leads: Arc::new(CsvLeadSink::new(settings.leads.csv_path.clone())),
    };

    let router: Router = routes::create_router(app_state);
    let app = router
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    // Parse the server address from settings
    let addr: SocketAddr = settings
        .server
        .address
        .parse()
        .with_context(|| format!("Invalid server address format: {}", settings.server.address))?;

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
