// Per-collection configuration: which fields hold what, and which facets a page offers

use serde::{Deserialize, Serialize};

use crate::{filters::Facet, mfind::SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Used,
    New,
}

impl ListingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingKind::Used => "used",
            ListingKind::New => "new",
        }
    }

    pub fn base_path(self) -> &'static str {
        match self {
            ListingKind::Used => "/used-cars",
            ListingKind::New => "/new-cars",
        }
    }
}

/// Where a collection's result pages are cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingMode {
    /// `$skip`/`$limit` stages on the endpoint, with a separate count query.
    Server,
    /// Fetch every match once and slice locally. Fine for small catalogues.
    Client,
}

#[derive(Debug, Clone)]
pub struct CollectionProfile {
    pub kind: ListingKind,
    pub collection: String,
    pub brand_field: String,
    pub model_field: String,
    /// `None` when the collection has no per-city listings.
    pub city_field: Option<String>,
    /// Stored as a string on most documents; coerced to a number when compared.
    pub price_field: String,
    /// Facets shown in the sidebar, with the field each one reads. Price buckets
    /// are listed here too but their options are fixed.
    pub facets: Vec<(Facet, String)>,
    pub title_field: String,
    pub image_field: String,
    pub sort_by: Option<String>,
    pub order: SortOrder,
    pub paging: PagingMode,
}

impl CollectionProfile {
    pub fn used_cars(collection: impl Into<String>) -> Self {
        Self {
            kind: ListingKind::Used,
            collection: collection.into(),
            brand_field: "company".into(),
            model_field: "model".into(),
            city_field: Some("registrationCity".into()),
            price_field: "price".into(),
            facets: vec![
                (Facet::FuelType, "fueltype".into()),
                (Facet::Transmission, "transmission".into()),
                (Facet::Color, "color".into()),
                (Facet::RegistrationYear, "registrationYear".into()),
                (Facet::PriceBucket, "price".into()),
            ],
            title_field: "name".into(),
            image_field: "images".into(),
            sort_by: None,
            order: SortOrder::Asc,
            paging: PagingMode::Server,
        }
    }

    pub fn new_cars(collection: impl Into<String>) -> Self {
        Self {
            kind: ListingKind::New,
            collection: collection.into(),
            brand_field: "company".into(),
            model_field: "model".into(),
            city_field: None,
            price_field: "price".into(),
            facets: vec![
                (Facet::FuelType, "fueltype".into()),
                (Facet::Transmission, "transmission".into()),
                (Facet::PriceBucket, "price".into()),
            ],
            title_field: "name".into(),
            image_field: "images".into(),
            sort_by: None,
            order: SortOrder::Asc,
            paging: PagingMode::Client,
        }
    }

    pub fn field_for(&self, facet: Facet) -> Option<&str> {
        self.facets
            .iter()
            .find(|(f, _)| *f == facet)
            .map(|(_, path)| path.as_str())
    }

    /// Facets whose options come from the documents themselves.
    pub fn document_facets(&self) -> impl Iterator<Item = (Facet, &str)> {
        self.facets
            .iter()
            .filter(|(facet, _)| *facet != Facet::PriceBucket)
            .map(|(facet, path)| (*facet, path.as_str()))
    }
}
