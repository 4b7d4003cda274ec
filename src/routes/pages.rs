// Server-rendered pages

use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::Uri,
    response::{Html, IntoResponse},
};

use super::load_listing;
use crate::{
    error::{AppError, AppResult},
    filters::{slugify, FilterSelection, RouteFilters},
    leads::LeadKind,
    listing::{ListingEngine, ListingPage, LoadFailure, LoadState, Recovery, EMPTY_RESULT_MESSAGE},
    models::{ListingCard, ListingParams, RouteSegments},
    profile::{CollectionProfile, ListingKind},
};

// --- View models ---

pub struct BrandLink {
    pub name: String,
    pub used_link: String,
    pub new_link: String,
}

pub struct SidebarOption {
    pub value: String,
    pub selected: bool,
    pub link: String,
}

pub struct SidebarGroup {
    pub label: &'static str,
    pub options: Vec<SidebarOption>,
}

pub struct PageLink {
    pub number: u32,
    pub current: bool,
    pub link: String,
}

pub struct ErrorView {
    pub message: &'static str,
    pub action_label: &'static str,
    pub action_link: String,
}

// --- Templates ---

#[derive(Template)]
#[template(path = "landing.html")]
struct LandingTemplate {
    brands: Vec<BrandLink>,
}

#[derive(Template)]
#[template(path = "listing.html")]
struct ListingTemplate {
    heading: String,
    kind: &'static str,
    unresolved: Vec<String>,
    total_count: u64,
    cards: Vec<ListingCard>,
    sidebar: Vec<SidebarGroup>,
    pages: Vec<PageLink>,
    clear_link: Option<String>,
    empty_message: Option<&'static str>,
    error: Option<ErrorView>,
}

#[derive(Template)]
#[template(path = "info.html")]
struct InfoTemplate {
    title: &'static str,
    blurb: &'static str,
    lead_kind: &'static str,
}

fn render(template: &impl Template, name: &str) -> AppResult<Html<String>> {
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render {} template: {}", name, e);
            Err(AppError::InternalServerError(anyhow::Error::new(e)))
        }
    }
}

// --- Handlers ---

pub async fn landing_page(State(engine): State<Arc<ListingEngine>>) -> AppResult<impl IntoResponse> {
    // The landing page still renders when reference data is unavailable
    let brands = match engine.catalog().brands().await {
        Ok(brands) => brands,
        Err(e) => {
            tracing::warn!("Landing page rendered without brands: {}", e);
            Vec::new()
        }
    };
    let brands = brands
        .into_iter()
        .map(|brand| {
            let slug = slugify(&brand.name);
            BrandLink {
                used_link: format!("{}/{}", ListingKind::Used.base_path(), slug),
                new_link: format!("{}/{}", ListingKind::New.base_path(), slug),
                name: brand.name,
            }
        })
        .collect();
    render(&LandingTemplate { brands }, "landing")
}

pub async fn used_cars_page(
    State(engine): State<Arc<ListingEngine>>,
    segments: Option<Path<RouteSegments>>,
    Query(params): Query<ListingParams>,
    uri: Uri,
) -> AppResult<impl IntoResponse> {
    listing_page(&engine, ListingKind::Used, segments, params, uri).await
}

pub async fn new_cars_page(
    State(engine): State<Arc<ListingEngine>>,
    segments: Option<Path<RouteSegments>>,
    Query(params): Query<ListingParams>,
    uri: Uri,
) -> AppResult<impl IntoResponse> {
    listing_page(&engine, ListingKind::New, segments, params, uri).await
}

async fn listing_page(
    engine: &Arc<ListingEngine>,
    kind: ListingKind,
    segments: Option<Path<RouteSegments>>,
    params: ListingParams,
    uri: Uri,
) -> AppResult<Html<String>> {
    let segments = segments.map(|Path(segments)| segments).unwrap_or_default();
    let route = RouteFilters::from_segments(&segments);
    tracing::info!("[PAGE] {} - route: {:?}, params: {:?}", uri.path(), route, params);

    let controller = load_listing(engine, kind, route.clone(), &params).await;
    let template = listing_view(
        controller.state(),
        controller.profile(),
        controller.filters(),
        &route,
        uri.path(),
    );
    render(&template, "listing")
}

fn listing_view(
    state: &LoadState,
    profile: &CollectionProfile,
    filters: &FilterSelection,
    route: &RouteFilters,
    path: &str,
) -> ListingTemplate {
    let clear_link = (!filters.is_empty()).then(|| path.to_string());
    let mut view = ListingTemplate {
        heading: heading(profile.kind, route, None),
        kind: profile.kind.as_str(),
        unresolved: Vec::new(),
        total_count: 0,
        cards: Vec::new(),
        sidebar: Vec::new(),
        pages: Vec::new(),
        clear_link,
        empty_message: None,
        error: None,
    };

    match state {
        LoadState::Ready(page) => {
            view.heading = heading(profile.kind, route, Some(page));
            view.unresolved = page.unresolved.clone();
            view.total_count = page.page.total_count;
            view.cards = page.documents.iter().map(|doc| ListingCard::from_document(doc, profile)).collect();
            view.sidebar = sidebar(page, profile, filters, path);
            view.pages = page_links(page, filters, path);
            view.empty_message = page.is_empty().then_some(EMPTY_RESULT_MESSAGE);
        }
        LoadState::Error(failure) => view.error = Some(error_view(failure, path)),
        LoadState::Idle | LoadState::Loading => {}
    }
    view
}

// "Used Maruti Swift Cars in Ahmedabad"; resolved names replace the URL spelling when known
fn heading(kind: ListingKind, route: &RouteFilters, page: Option<&ListingPage>) -> String {
    let brand = page.and_then(|p| p.route.brand.label()).or(route.brand.as_deref());
    let model = page.and_then(|p| p.route.model.label()).or(route.model.as_deref());
    let mut heading = match kind {
        ListingKind::Used => "Used".to_string(),
        ListingKind::New => "New".to_string(),
    };
    for part in [brand, model].into_iter().flatten() {
        heading.push(' ');
        heading.push_str(part);
    }
    heading.push_str(" Cars");
    if let Some(city) = route.city.as_deref().filter(|_| kind == ListingKind::Used) {
        heading.push_str(" in ");
        heading.push_str(city);
    }
    heading
}

fn link(path: &str, selection: &FilterSelection, page: Option<u32>) -> String {
    let query = selection.to_query_string(page);
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

// Each option links to the selection with that option toggled, back on page 1
fn sidebar(page: &ListingPage, profile: &CollectionProfile, filters: &FilterSelection, path: &str) -> Vec<SidebarGroup> {
    profile
        .facets
        .iter()
        .map(|(facet, _)| SidebarGroup {
            label: facet.label(),
            options: page
                .facets
                .get(*facet)
                .iter()
                .map(|value| {
                    let mut toggled = filters.clone();
                    toggled.toggle(*facet, value);
                    SidebarOption {
                        value: value.clone(),
                        selected: filters.contains(*facet, value),
                        link: link(path, &toggled, None),
                    }
                })
                .collect(),
        })
        .filter(|group| !group.options.is_empty())
        .collect()
}

fn page_links(page: &ListingPage, filters: &FilterSelection, path: &str) -> Vec<PageLink> {
    if !page.page.show_controls() {
        return Vec::new();
    }
    (1..=page.total_pages)
        .map(|number| PageLink {
            number,
            current: number == page.page.current,
            link: link(path, filters, Some(number)),
        })
        .collect()
}

fn error_view(failure: &LoadFailure, path: &str) -> ErrorView {
    let action_link = match failure.recovery {
        Recovery::ClearFilters => path.to_string(),
        Recovery::BackToHome => "/".to_string(),
    };
    ErrorView { message: failure.message, action_label: failure.recovery.label(), action_link }
}

pub async fn franchise_page() -> AppResult<impl IntoResponse> {
    info_page(
        "Franchise",
        "Open a dealership under our brand. Leave your details and our team will call you back.",
        LeadKind::Franchise,
    )
}

pub async fn finance_page() -> AppResult<impl IntoResponse> {
    info_page(
        "Car Finance",
        "Compare loan offers and work out your monthly instalment before you buy.",
        LeadKind::Finance,
    )
}

pub async fn insurance_page() -> AppResult<impl IntoResponse> {
    info_page(
        "Car Insurance",
        "Get quotes for new policies and renewals from our insurance partners.",
        LeadKind::Insurance,
    )
}

fn info_page(title: &'static str, blurb: &'static str, kind: LeadKind) -> AppResult<Html<String>> {
    render(&InfoTemplate { title, blurb, lead_kind: kind.as_str() }, "info")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::LOAD_FAILED_MESSAGE,
        facets::FacetOptions,
        filters::Facet,
        pagination::PageState,
        query::{CompiledQuery, Resolution, ResolvedRoute},
    };
    use serde_json::json;
    use std::collections::BTreeMap;

    fn ready_page() -> ListingPage {
        let mut options = BTreeMap::new();
        options.insert(Facet::FuelType, vec!["Diesel".to_string(), "Petrol".to_string()]);
        options.insert(Facet::Color, Vec::new());
        options.insert(Facet::PriceBucket, vec!["Below ₹5 Lakh".to_string()]);
        let mut page = PageState::new(12);
        page.set_total(30);
        page.go_to(2);
        ListingPage {
            documents: vec![json!({"_id": "c1", "name": "Swift VXI", "price": "550000"})],
            facets: FacetOptions(options),
            page,
            total_pages: 3,
            query: CompiledQuery::match_all(),
            unresolved: Vec::new(),
            route: ResolvedRoute {
                brand: Resolution::Resolved { id: "b1".into(), name: "Maruti Suzuki".into() },
                ..ResolvedRoute::default()
            },
        }
    }

    #[test]
    fn heading_prefers_resolved_names() {
        let route = RouteFilters::new(Some("maruti suzuki"), None, Some("pune"));
        let page = ready_page();
        assert_eq!(heading(ListingKind::Used, &route, Some(&page)), "Used Maruti Suzuki Cars in pune");
        assert_eq!(heading(ListingKind::New, &route, None), "New maruti suzuki Cars");
    }

    #[test]
    fn sidebar_links_toggle_and_drop_the_page() {
        let profile = CollectionProfile::used_cars("usedcars");
        let mut filters = FilterSelection::default();
        filters.add(Facet::FuelType, "Diesel");
        let groups = sidebar(&ready_page(), &profile, &filters, "/used-cars");

        let fuel = &groups[0];
        assert_eq!(fuel.label, Facet::FuelType.label());
        assert!(fuel.options[0].selected);
        assert_eq!(fuel.options[0].link, "/used-cars");
        assert_eq!(fuel.options[1].link, "/used-cars?fuel=Diesel,Petrol");
        // Facets with nothing to offer are hidden
        assert!(groups.iter().all(|g| g.label != Facet::Color.label()));
    }

    #[test]
    fn pager_keeps_filters() {
        let mut filters = FilterSelection::default();
        filters.add(Facet::FuelType, "Diesel");
        let links = page_links(&ready_page(), &filters, "/used-cars");
        assert_eq!(links.len(), 3);
        assert!(links[1].current);
        assert_eq!(links[2].link, "/used-cars?fuel=Diesel&page=3");
    }

    #[test]
    fn error_state_renders_recovery_action() {
        let failure = LoadFailure { message: LOAD_FAILED_MESSAGE, recovery: Recovery::ClearFilters };
        let profile = CollectionProfile::used_cars("usedcars");
        let view = listing_view(
            &LoadState::Error(failure),
            &profile,
            &FilterSelection::default(),
            &RouteFilters::default(),
            "/used-cars/tata",
        );
        let error = view.error.as_ref().unwrap();
        assert_eq!(error.action_label, "Clear Filters");
        assert_eq!(error.action_link, "/used-cars/tata");
        assert!(view.cards.is_empty());
        assert!(view.render().unwrap().contains(LOAD_FAILED_MESSAGE));
    }
}
