// Listing page controller: filter state in, one page of documents plus facet options out

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use cached::{Cached, TimedSizedCache};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    catalog::Catalog,
    config::Settings,
    error::{EngineError, RemoteQueryError, LOAD_FAILED_MESSAGE},
    facets::{extract_facets, facet_projection, FacetOptions},
    filters::{Facet, FilterSelection, RouteFilters},
    mfind::{LookupStage, QueryBackend, QueryOptions},
    pagination::{build_page_query, paginate, PageState},
    profile::{CollectionProfile, ListingKind, PagingMode},
    query::{compile, CompiledQuery, ResolvedRoute},
};

pub const EMPTY_RESULT_MESSAGE: &str = "No cars found for the selected filters";

/// Remembers result counts per compiled query so paging through known
/// results does not re-count. A single-entry memo is exactly "compare with
/// the previous query"; the server shares a larger one between requests.
#[derive(Clone)]
pub struct CountMemo(Arc<Mutex<TimedSizedCache<String, u64>>>);

impl CountMemo {
    pub fn new(size: usize, lifespan: Duration) -> Self {
        let cache = TimedSizedCache::with_size_and_lifespan(size.max(1), lifespan.as_secs().max(1));
        CountMemo(Arc::new(Mutex::new(cache)))
    }

    pub fn single(lifespan: Duration) -> Self {
        Self::new(1, lifespan)
    }

    fn get(&self, key: &String) -> Option<u64> {
        let mut cache = self.0.lock().ok()?;
        cache.cache_get(key).copied()
    }

    fn set(&self, key: String, count: u64) {
        if let Ok(mut cache) = self.0.lock() {
            cache.cache_set(key, count);
        }
    }
}

/// Shared, long-lived pieces every controller needs.
pub struct ListingEngine {
    backend: Arc<dyn QueryBackend>,
    catalog: Arc<Catalog>,
    db_name: String,
    page_size: u32,
    timeout: Duration,
    used: CollectionProfile,
    new: CollectionProfile,
    counts: CountMemo,
    memo_lifespan: Duration,
}

impl ListingEngine {
    pub fn new(backend: Arc<dyn QueryBackend>, catalog: Arc<Catalog>, settings: &Settings) -> Self {
        let memo_lifespan = Duration::from_secs(settings.cache.count_memo_secs);
        Self {
            backend,
            catalog,
            db_name: settings.mfind.db_name.clone(),
            page_size: settings.listing.page_size,
            timeout: settings.request_timeout(),
            used: CollectionProfile::used_cars(settings.collections.used_cars.clone()),
            new: CollectionProfile::new_cars(settings.collections.new_cars.clone()),
            counts: CountMemo::new(settings.cache.count_memo_size, memo_lifespan),
            memo_lifespan,
        }
    }

    pub fn profile(&self, kind: ListingKind) -> &CollectionProfile {
        match kind {
            ListingKind::Used => &self.used,
            ListingKind::New => &self.new,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Controller that shares the engine-wide count memo (one per HTTP request).
    pub fn controller(self: &Arc<Self>, kind: ListingKind) -> ListingController {
        ListingController::new(self.clone(), kind, self.counts.clone())
    }

    /// Controller with its own memo that only remembers the previous query
    /// (one per visitor session).
    pub fn session_controller(self: &Arc<Self>, kind: ListingKind) -> ListingController {
        ListingController::new(self.clone(), kind, CountMemo::single(self.memo_lifespan))
    }

    /// Single listing by identifier.
    pub async fn find_listing(&self, kind: ListingKind, id: &str) -> Result<Option<Value>, EngineError> {
        let profile = self.profile(kind);
        let options = QueryOptions { limit: 1, ..QueryOptions::all(json!({ "_id": id })) };
        let fetch = self.backend.query(&self.db_name, &profile.collection, &options);
        let documents = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| EngineError::Timeout(self.timeout))??;
        Ok(documents.into_iter().next())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Recovery {
    BackToHome,
    ClearFilters,
}

impl Recovery {
    pub fn label(self) -> &'static str {
        match self {
            Recovery::BackToHome => "Back to Home",
            Recovery::ClearFilters => "Clear Filters",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadFailure {
    pub message: &'static str,
    pub recovery: Recovery,
}

/// One loaded page, ready to render.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub documents: Vec<Value>,
    pub facets: FacetOptions,
    pub page: PageState,
    pub total_pages: u32,
    pub query: CompiledQuery,
    /// Brand/model names that matched no reference entity, shown as plain labels.
    pub unresolved: Vec<String>,
    #[serde(skip)]
    pub route: ResolvedRoute,
}

impl ListingPage {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready(ListingPage),
    Error(LoadFailure),
}

pub struct ListingController {
    engine: Arc<ListingEngine>,
    kind: ListingKind,
    counts: CountMemo,
    route: RouteFilters,
    filters: FilterSelection,
    page: PageState,
    // Whether `page.total_count` belongs to the current inputs
    count_known: bool,
    last_query: Option<CompiledQuery>,
    facets: Option<(CompiledQuery, FacetOptions)>,
    // Full result set of a client-paged collection, for paging without refetching
    results: Option<(CompiledQuery, Arc<Vec<Value>>)>,
    state: LoadState,
}

impl ListingController {
    fn new(engine: Arc<ListingEngine>, kind: ListingKind, counts: CountMemo) -> Self {
        let page = PageState::new(engine.page_size);
        Self {
            engine,
            kind,
            counts,
            route: RouteFilters::default(),
            filters: FilterSelection::default(),
            page,
            count_known: false,
            last_query: None,
            facets: None,
            results: None,
            state: LoadState::Idle,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn page(&self) -> &PageState {
        &self.page
    }

    pub fn filters(&self) -> &FilterSelection {
        &self.filters
    }

    pub fn profile(&self) -> &CollectionProfile {
        self.engine.profile(self.kind)
    }

    pub fn set_route(&mut self, route: RouteFilters) {
        if route != self.route {
            self.route = route;
            self.inputs_changed();
        }
    }

    pub fn set_filters(&mut self, filters: FilterSelection) {
        if filters != self.filters {
            self.filters = filters;
            self.inputs_changed();
        }
    }

    pub fn toggle_filter(&mut self, facet: Facet, value: &str) -> bool {
        let selected = self.filters.toggle(facet, value);
        self.inputs_changed();
        selected
    }

    /// Empties every facet and goes back to page 1.
    pub fn clear_all(&mut self) {
        self.filters.clear_all();
        self.inputs_changed();
    }

    /// Clamped to the known page range once a count is known; before that the
    /// request is kept and clamped when the count arrives.
    pub fn set_page(&mut self, page: u32) {
        if self.count_known {
            self.page.go_to(page);
        } else {
            self.page.current = page.max(1);
        }
    }

    fn inputs_changed(&mut self) {
        self.page.reset();
        self.count_known = false;
    }

    /// Snapshots the current inputs and moves to `Loading`.
    pub fn begin(&mut self) -> LoadTicket {
        self.state = LoadState::Loading;
        LoadTicket {
            engine: self.engine.clone(),
            kind: self.kind,
            counts: self.counts.clone(),
            route: self.route.clone(),
            filters: self.filters.clone(),
            requested_page: self.page.current,
            previous_query: self.last_query.clone(),
            facets: self.facets.clone(),
            results: self.results.clone(),
        }
    }

    /// Applies a finished load unless the inputs moved on while it was in
    /// flight. Returns whether it was applied.
    pub fn finish(&mut self, done: CompletedLoad) -> bool {
        if done.route != self.route || done.requested_page != self.page.current {
            tracing::debug!("Discarding listing response for superseded inputs");
            return false;
        }

        match done.result {
            Ok(outcome) => {
                let current = compile(&outcome.route, &self.filters, self.engine.profile(self.kind));
                if current != outcome.query {
                    tracing::debug!("Discarding listing response for a superseded query");
                    return false;
                }
                self.page = outcome.page;
                self.count_known = true;
                self.last_query = Some(outcome.query.clone());
                self.facets = Some((outcome.facet_query, outcome.facets.clone()));
                self.results = outcome.results;
                self.state = LoadState::Ready(ListingPage {
                    documents: outcome.documents,
                    facets: outcome.facets,
                    page: outcome.page,
                    total_pages: outcome.page.total_pages(),
                    query: outcome.query,
                    unresolved: outcome.route.unresolved_labels(),
                    route: outcome.route,
                });
            }
            Err(e) => {
                if done.filters != self.filters {
                    tracing::debug!("Discarding listing failure for superseded filters");
                    return false;
                }
                tracing::error!(error = %e, "Listing load failed");
                let recovery = if self.filters.is_empty() { Recovery::BackToHome } else { Recovery::ClearFilters };
                self.state = LoadState::Error(LoadFailure { message: LOAD_FAILED_MESSAGE, recovery });
            }
        }
        true
    }

    /// One full cycle: `Loading`, then `Ready` or `Error`. Nothing is retried.
    pub async fn load(&mut self) -> &LoadState {
        let ticket = self.begin();
        let done = ticket.execute().await;
        self.finish(done);
        &self.state
    }
}

/// Inputs captured at the start of a load. Executing it does not borrow the
/// controller, so newer loads may start before it resolves.
pub struct LoadTicket {
    engine: Arc<ListingEngine>,
    kind: ListingKind,
    counts: CountMemo,
    route: RouteFilters,
    filters: FilterSelection,
    requested_page: u32,
    previous_query: Option<CompiledQuery>,
    facets: Option<(CompiledQuery, FacetOptions)>,
    results: Option<(CompiledQuery, Arc<Vec<Value>>)>,
}

pub struct CompletedLoad {
    route: RouteFilters,
    filters: FilterSelection,
    requested_page: u32,
    result: Result<LoadOutcome, EngineError>,
}

struct LoadOutcome {
    route: ResolvedRoute,
    query: CompiledQuery,
    page: PageState,
    documents: Vec<Value>,
    facet_query: CompiledQuery,
    facets: FacetOptions,
    results: Option<(CompiledQuery, Arc<Vec<Value>>)>,
}

impl LoadTicket {
    pub async fn execute(self) -> CompletedLoad {
        let timeout = self.engine.timeout;
        let result = match tokio::time::timeout(timeout, self.run()).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout(timeout)),
        };
        CompletedLoad {
            route: self.route,
            filters: self.filters,
            requested_page: self.requested_page,
            result,
        }
    }

    async fn run(&self) -> Result<LoadOutcome, EngineError> {
        let engine = &self.engine;
        let profile = engine.profile(self.kind);

        let route = engine.catalog.resolve(&self.route, self.kind).await?;
        let query = compile(&route, &self.filters, profile);
        let facet_query = compile(&route, &FilterSelection::default(), profile);

        let mut page = PageState::new(engine.page_size);
        page.current = self.requested_page.max(1);
        if self.previous_query.as_ref().is_some_and(|previous| *previous != query) {
            page.reset();
        }

        let mut results = None;
        let (documents, facets) = match profile.paging {
            PagingMode::Server => {
                let total = self.count(profile, &query).await?;
                page.set_total(total);
                let options = QueryOptions::default()
                    .with_lookups(build_page_query(&query, page.page_size, page.current))
                    .sorted(profile.sort_by.clone(), profile.order);
                futures::try_join!(
                    engine.backend.query(&engine.db_name, &profile.collection, &options),
                    self.facet_options(profile, &facet_query),
                )?
            }
            PagingMode::Client => {
                let (all, facets) = futures::try_join!(
                    self.full_results(profile, &query),
                    self.facet_options(profile, &facet_query),
                )?;
                page.set_total(all.len() as u64);
                let documents = paginate(&all, page.page_size, page.current).items;
                results = Some((query.clone(), all));
                (documents, facets)
            }
        };

        tracing::info!(
            collection = %profile.collection,
            clauses = query.clauses().len(),
            unfiltered = query.is_match_all(),
            page = page.current,
            total = page.total_count,
            shown = documents.len(),
            "Listing page loaded"
        );
        Ok(LoadOutcome { route, query, page, documents, facet_query, facets, results })
    }

    async fn count(&self, profile: &CollectionProfile, query: &CompiledQuery) -> Result<u64, RemoteQueryError> {
        let key = format!("{}:{}", profile.collection, query.cache_key());
        if let Some(total) = self.counts.get(&key) {
            tracing::debug!(total, "Reusing count for unchanged query");
            return Ok(total);
        }
        let options = QueryOptions::default()
            .with_projection(json!({ "_id": 1 }))
            .with_lookups(vec![LookupStage::Match(query.clone())]);
        let engine = &self.engine;
        let total = engine.backend.query(&engine.db_name, &profile.collection, &options).await?.len() as u64;
        self.counts.set(key, total);
        Ok(total)
    }

    async fn full_results(&self, profile: &CollectionProfile, query: &CompiledQuery) -> Result<Arc<Vec<Value>>, RemoteQueryError> {
        if let Some((known_query, all)) = &self.results {
            if known_query == query {
                tracing::debug!(total = all.len(), "Paging held results for unchanged query");
                return Ok(all.clone());
            }
        }
        let options = QueryOptions::all(query.as_value().clone()).sorted(profile.sort_by.clone(), profile.order);
        let engine = &self.engine;
        let all = engine.backend.query(&engine.db_name, &profile.collection, &options).await?;
        Ok(Arc::new(all))
    }

    async fn facet_options(&self, profile: &CollectionProfile, facet_query: &CompiledQuery) -> Result<FacetOptions, RemoteQueryError> {
        if let Some((known_query, options)) = &self.facets {
            if known_query == facet_query {
                return Ok(options.clone());
            }
        }
        let options = QueryOptions::all(facet_query.as_value().clone()).with_projection(facet_projection(profile));
        let engine = &self.engine;
        let documents = engine.backend.query(&engine.db_name, &profile.collection, &options).await?;
        Ok(extract_facets(&documents, profile))
    }
}
