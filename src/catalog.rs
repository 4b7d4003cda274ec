// Brand and model reference data, and resolution of route names to identifiers

use std::{sync::Arc, time::Duration};

use serde_json::json;

use crate::{
    cache::ReferenceCache,
    config::Settings,
    error::RemoteQueryError,
    filters::{normalize_name, RouteFilters},
    mfind::{QueryBackend, QueryOptions},
    models::{Brand, CarModel},
    profile::ListingKind,
    query::{Resolution, ResolvedRoute},
};

pub const BRANDS_CACHE_KEY: &str = "brands";

pub fn models_cache_key(kind: ListingKind) -> String {
    format!("models:{}", kind.as_str())
}

pub struct Catalog {
    backend: Arc<dyn QueryBackend>,
    cache: ReferenceCache,
    db_name: String,
    ttl: Duration,
    brand_collection: String,
    used_model_collection: String,
    new_model_collection: String,
}

impl Catalog {
    pub fn new(backend: Arc<dyn QueryBackend>, cache: ReferenceCache, settings: &Settings) -> Self {
        Self {
            backend,
            cache,
            db_name: settings.mfind.db_name.clone(),
            ttl: settings.reference_ttl(),
            brand_collection: settings.collections.brands.clone(),
            used_model_collection: settings.collections.used_models.clone(),
            new_model_collection: settings.collections.new_models.clone(),
        }
    }

    pub async fn brands(&self) -> Result<Vec<Brand>, RemoteQueryError> {
        self.cache
            .get_or_refresh(BRANDS_CACHE_KEY, self.ttl, || async move {
                self.backend
                    .query(&self.db_name, &self.brand_collection, &QueryOptions::all(json!({})))
                    .await
            })
            .await
    }

    pub async fn models(&self, kind: ListingKind) -> Result<Vec<CarModel>, RemoteQueryError> {
        let collection = match kind {
            ListingKind::Used => &self.used_model_collection,
            ListingKind::New => &self.new_model_collection,
        };
        self.cache
            .get_or_refresh(&models_cache_key(kind), self.ttl, || async move {
                self.backend.query(&self.db_name, collection, &QueryOptions::all(json!({}))).await
            })
            .await
    }

    /// Models of one brand, by brand display name. Unknown brands give no models.
    pub async fn models_for_brand(&self, kind: ListingKind, brand_name: &str) -> Result<Vec<CarModel>, RemoteQueryError> {
        let brands = self.brands().await?;
        let Some(brand) = find_brand(&brands, brand_name) else {
            return Ok(Vec::new());
        };
        let models = self.models(kind).await?;
        Ok(models.into_iter().filter(|m| m.brand_id == brand.id).collect())
    }

    /// Turns route names into identifiers. A name that matches nothing becomes
    /// `Resolution::Unresolved` rather than an error. Reference data is only
    /// fetched for the parts the route actually has.
    pub async fn resolve(&self, route: &RouteFilters, kind: ListingKind) -> Result<ResolvedRoute, RemoteQueryError> {
        let brands = match route.brand {
            Some(_) => self.brands().await?,
            None => Vec::new(),
        };
        let models = match route.model {
            Some(_) => self.models(kind).await?,
            None => Vec::new(),
        };
        Ok(resolve_with(route, &brands, &models))
    }
}

fn find_brand<'a>(brands: &'a [Brand], name: &str) -> Option<&'a Brand> {
    let wanted = normalize_name(name);
    brands.iter().find(|b| normalize_name(&b.name) == wanted)
}

/// Case-insensitive, whitespace-trimmed exact match against display names.
/// When the brand resolved, the model must belong to it.
pub fn resolve_with(route: &RouteFilters, brands: &[Brand], models: &[CarModel]) -> ResolvedRoute {
    let brand = match route.brand.as_deref() {
        None => Resolution::Absent,
        Some(name) => match find_brand(brands, name) {
            Some(b) => Resolution::Resolved { id: b.id.clone(), name: b.name.clone() },
            None => {
                tracing::info!(brand = name, "Route brand matches no known brand");
                Resolution::Unresolved(name.to_string())
            }
        },
    };

    let model = match route.model.as_deref() {
        None => Resolution::Absent,
        Some(name) => {
            let wanted = normalize_name(name);
            let found = models.iter().find(|m| {
                normalize_name(&m.name) == wanted && brand.id().is_none_or(|brand_id| m.brand_id == brand_id)
            });
            match found {
                Some(m) => Resolution::Resolved { id: m.id.clone(), name: m.name.clone() },
                None => {
                    tracing::info!(model = name, "Route model matches no known model");
                    Resolution::Unresolved(name.to_string())
                }
            }
        }
    };

    ResolvedRoute { brand, model, city: route.city.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, FixedClock, MemoryStore};
    use serde_json::Value;

    fn brands() -> Vec<Brand> {
        vec![
            Brand { id: "b-maruti".into(), name: "Maruti Suzuki".into() },
            Brand { id: "b-tata".into(), name: "Tata".into() },
        ]
    }

    fn models() -> Vec<CarModel> {
        vec![
            CarModel { id: "m-swift".into(), name: "Swift".into(), brand_id: "b-maruti".into() },
            CarModel { id: "m-nexon".into(), name: "Nexon".into(), brand_id: "b-tata".into() },
            CarModel { id: "m-other-swift".into(), name: "Swift".into(), brand_id: "b-other".into() },
        ]
    }

    fn catalog(backend: Arc<FakeBackend>) -> Catalog {
        let settings = Settings::from_sources(None).unwrap();
        let cache = ReferenceCache::new(
            Arc::new(MemoryStore::default()),
            Arc::new(FixedClock::at("2026-03-01T10:00:00Z")),
        );
        Catalog::new(backend, cache, &settings)
    }

    #[test]
    fn slug_and_case_insensitive_brand_match() {
        let route = RouteFilters::new(Some(" maruti   SUZUKI "), Some("swift"), None);
        let resolved = resolve_with(&route, &brands(), &models());
        assert_eq!(resolved.brand.id(), Some("b-maruti"));
        assert_eq!(resolved.model.id(), Some("m-swift"));
    }

    #[test]
    fn model_must_belong_to_resolved_brand() {
        let route = RouteFilters::new(Some("Tata"), Some("Swift"), None);
        let resolved = resolve_with(&route, &brands(), &models());
        assert_eq!(resolved.model, Resolution::Unresolved("Swift".into()));
    }

    #[test]
    fn unknown_brand_degrades_to_label() {
        let route = RouteFilters::new(Some("Hindustan"), None, Some("Pune"));
        let resolved = resolve_with(&route, &brands(), &models());
        assert_eq!(resolved.brand.label(), Some("Hindustan"));
        assert_eq!(resolved.brand.id(), None);
        assert_eq!(resolved.city.as_deref(), Some("Pune"));
    }

    #[tokio::test]
    async fn resolve_skips_reference_fetches_for_missing_parts() {
        let backend = FakeBackend::new(|_, _| Ok(Vec::new()));
        let catalog = catalog(backend.clone());
        let resolved = catalog.resolve(&RouteFilters::new(None, None, Some("Pune")), ListingKind::Used).await.unwrap();
        assert_eq!(resolved.brand, Resolution::Absent);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn brands_are_fetched_once_per_ttl_window() {
        let backend = FakeBackend::new(|collection, options| {
            assert_eq!(options.limit, 0);
            match collection {
                "companies" => Ok(vec![serde_json::json!({"_id": "b1", "name": "Maruti"})]),
                _ => Ok(Vec::<Value>::new()),
            }
        });
        let catalog = catalog(backend.clone());
        for _ in 0..3 {
            assert_eq!(catalog.brands().await.unwrap().len(), 1);
        }
        assert_eq!(backend.calls_to("companies").len(), 1);
    }

    #[tokio::test]
    async fn models_for_brand_filters_by_parent() {
        let backend = FakeBackend::new(|collection, _| match collection {
            "companies" => Ok(vec![serde_json::json!({"_id": "b1", "name": "Maruti"})]),
            "models" => Ok(vec![
                serde_json::json!({"_id": "m1", "name": "Swift", "company": "b1"}),
                serde_json::json!({"_id": "m2", "name": "Nexon", "company": "b2"}),
            ]),
            _ => Ok(Vec::new()),
        });
        let catalog = catalog(backend);
        let models = catalog.models_for_brand(ListingKind::Used, "maruti").await.unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "Swift");
        assert!(catalog.models_for_brand(ListingKind::Used, "nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolve_reads_new_car_models_through_the_cache() {
        let backend = FakeBackend::new(|collection, _| match collection {
            "companies" => Ok(vec![serde_json::json!({"_id": "b1", "name": "Tata"})]),
            "newcarmodels" => Ok(vec![serde_json::json!({"_id": "m1", "name": "Nexon", "company": "b1"})]),
            _ => Ok(Vec::new()),
        });
        let catalog = catalog(backend.clone());
        let route = RouteFilters::new(Some("tata"), Some("nexon"), None);
        for _ in 0..2 {
            let resolved = catalog.resolve(&route, ListingKind::New).await.unwrap();
            assert_eq!(resolved.model.id(), Some("m1"));
        }
        assert_eq!(backend.calls_to("companies").len(), 1);
        assert_eq!(backend.calls_to("newcarmodels").len(), 1);
        assert!(backend.calls_to("models").is_empty());
    }
}
