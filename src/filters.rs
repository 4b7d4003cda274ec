// Filter state: facet selections from the sidebar and brand/model/city from the route

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use url::form_urlencoded;

use crate::models::{ListingParams, RouteSegments};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// A filterable listing attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Facet {
    FuelType,
    Transmission,
    Color,
    RegistrationYear,
    PriceBucket,
}

impl Facet {
    pub fn all() -> [Facet; 5] {
        [
            Facet::FuelType,
            Facet::Transmission,
            Facet::Color,
            Facet::RegistrationYear,
            Facet::PriceBucket,
        ]
    }

    pub fn param_name(self) -> &'static str {
        match self {
            Facet::FuelType => "fuel",
            Facet::Transmission => "transmission",
            Facet::Color => "color",
            Facet::RegistrationYear => "year",
            Facet::PriceBucket => "price",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Facet::FuelType => "Fuel Type",
            Facet::Transmission => "Transmission",
            Facet::Color => "Color",
            Facet::RegistrationYear => "Registration Year",
            Facet::PriceBucket => "Budget",
        }
    }
}

/// Fixed price bands offered in the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriceBucket {
    Below5Lakh,
    From5To10Lakh,
    From10To15Lakh,
    Above15Lakh,
}

impl PriceBucket {
    pub const ALL: [PriceBucket; 4] = [
        PriceBucket::Below5Lakh,
        PriceBucket::From5To10Lakh,
        PriceBucket::From10To15Lakh,
        PriceBucket::Above15Lakh,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PriceBucket::Below5Lakh => "Below ₹5 Lakh",
            PriceBucket::From5To10Lakh => "₹5 - ₹10 Lakh",
            PriceBucket::From10To15Lakh => "₹10 - ₹15 Lakh",
            PriceBucket::Above15Lakh => "Above ₹15 Lakh",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            PriceBucket::Below5Lakh => "below-5-lakh",
            PriceBucket::From5To10Lakh => "5-10-lakh",
            PriceBucket::From10To15Lakh => "10-15-lakh",
            PriceBucket::Above15Lakh => "above-15-lakh",
        }
    }
}

impl fmt::Display for PriceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PriceBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        PriceBucket::ALL
            .into_iter()
            .find(|bucket| bucket.slug().eq_ignore_ascii_case(s) || bucket.label() == s)
            .ok_or_else(|| format!("unknown price bucket '{s}'"))
    }
}

/// Selected values per facet. A facet with no entry, or an empty set, is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    selected: BTreeMap<Facet, BTreeSet<String>>,
}

impl FilterSelection {
    /// Price buckets are stored by label; a value naming no bucket is rejected.
    pub fn add(&mut self, facet: Facet, value: impl Into<String>) -> bool {
        let Some(value) = canonical(facet, &value.into()) else {
            return false;
        };
        self.selected.entry(facet).or_default().insert(value)
    }

    pub fn remove(&mut self, facet: Facet, value: &str) -> bool {
        let Some(value) = canonical(facet, value) else {
            return false;
        };
        let removed = self
            .selected
            .get_mut(&facet)
            .is_some_and(|values| values.remove(&value));
        if self.selected.get(&facet).is_some_and(BTreeSet::is_empty) {
            self.selected.remove(&facet);
        }
        removed
    }

    /// Adds the value if absent, removes it if present. Returns whether it is now selected.
    pub fn toggle(&mut self, facet: Facet, value: &str) -> bool {
        if self.contains(facet, value) {
            self.remove(facet, value);
            false
        } else {
            self.add(facet, value)
        }
    }

    pub fn contains(&self, facet: Facet, value: &str) -> bool {
        canonical(facet, value)
            .is_some_and(|value| self.selected.get(&facet).is_some_and(|values| values.contains(&value)))
    }

    pub fn values(&self, facet: Facet) -> impl Iterator<Item = &str> {
        self.selected.get(&facet).into_iter().flatten().map(String::as_str)
    }

    /// Facets with at least one selected value, in a fixed order.
    pub fn active_facets(&self) -> impl Iterator<Item = Facet> + '_ {
        self.selected
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(facet, _)| *facet)
    }

    /// Selected price buckets; labels that name no bucket are skipped.
    pub fn price_buckets(&self) -> BTreeSet<PriceBucket> {
        self.values(Facet::PriceBucket)
            .filter_map(|value| value.parse().ok())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.active_facets().next().is_none()
    }

    pub fn clear_all(&mut self) {
        self.selected.clear();
    }

    /// Reads comma-separated facet values out of the listing query string.
    pub fn from_params(params: &ListingParams) -> Self {
        let mut selection = Self::default();
        let sources = [
            (Facet::FuelType, &params.fuel),
            (Facet::Transmission, &params.transmission),
            (Facet::Color, &params.color),
            (Facet::RegistrationYear, &params.year),
        ];
        for (facet, raw) in sources {
            for value in raw.iter().flat_map(|raw| raw.split(',')) {
                selection.add(facet, value);
            }
        }
        for value in params.price.iter().flat_map(|raw| raw.split(',')) {
            match value.parse::<PriceBucket>() {
                Ok(bucket) => {
                    selection.add(Facet::PriceBucket, bucket.label());
                }
                Err(e) if !value.trim().is_empty() => tracing::debug!("Ignoring price filter: {}", e),
                Err(_) => {}
            }
        }
        selection
    }

    /// Inverse of [`FilterSelection::from_params`], used to build sidebar links.
    /// Each value is form-encoded on its own; commas between values stay literal.
    pub fn to_query_string(&self, page: Option<u32>) -> String {
        let mut parts: Vec<String> = Facet::all()
            .into_iter()
            .filter_map(|facet| {
                let values: Vec<String> = if facet == Facet::PriceBucket {
                    self.price_buckets().into_iter().map(|b| b.slug().to_string()).collect()
                } else {
                    self.values(facet)
                        .map(|value| form_urlencoded::byte_serialize(value.as_bytes()).collect())
                        .collect()
                };
                (!values.is_empty()).then(|| format!("{}={}", facet.param_name(), values.join(",")))
            })
            .collect();
        if let Some(page) = page {
            parts.push(format!("page={page}"));
        }
        parts.join("&")
    }
}

// Stored form of a selected value: trimmed, and price buckets by label
fn canonical(facet: Facet, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match facet {
        Facet::PriceBucket => value.parse::<PriceBucket>().ok().map(|b| b.label().to_string()),
        _ => Some(value.to_string()),
    }
}

/// Brand, model and city taken from the page route, as human-readable names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteFilters {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub city: Option<String>,
}

impl RouteFilters {
    pub fn new(brand: Option<&str>, model: Option<&str>, city: Option<&str>) -> Self {
        let clean = |s: Option<&str>| s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        Self { brand: clean(brand), model: clean(model), city: clean(city) }
    }

    /// URL slugs such as `maruti-suzuki` become `maruti suzuki`.
    pub fn from_segments(segments: &RouteSegments) -> Self {
        let brand = segments.brand.as_deref().map(deslug);
        let model = segments.model.as_deref().map(deslug);
        let city = segments.city.as_deref().map(deslug);
        Self::new(brand.as_deref(), model.as_deref(), city.as_deref())
    }

    pub fn from_params(params: &ListingParams) -> Self {
        let brand = params.brand.as_deref().map(deslug);
        let model = params.model.as_deref().map(deslug);
        let city = params.city.as_deref().map(deslug);
        Self::new(brand.as_deref(), model.as_deref(), city.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.brand.is_none() && self.model.is_none() && self.city.is_none()
    }
}

pub fn deslug(segment: &str) -> String {
    WHITESPACE.replace_all(&segment.replace(['-', '_'], " "), " ").trim().to_string()
}

/// Link form of a display name: `Maruti Suzuki` becomes `maruti-suzuki`.
pub fn slugify(name: &str) -> String {
    normalize_name(name).replace(' ', "-")
}

/// Comparison form for display names: trimmed, lowercased, single-spaced.
pub fn normalize_name(name: &str) -> String {
    deslug(name).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_adds_then_removes() {
        let mut selection = FilterSelection::default();
        assert!(selection.toggle(Facet::FuelType, "Petrol"));
        assert!(selection.contains(Facet::FuelType, "Petrol"));
        assert!(!selection.toggle(Facet::FuelType, "Petrol"));
        assert!(selection.is_empty());
    }

    #[test]
    fn values_are_unique() {
        let mut selection = FilterSelection::default();
        assert!(selection.add(Facet::Color, "Red"));
        assert!(!selection.add(Facet::Color, " Red "));
        assert_eq!(selection.values(Facet::Color).count(), 1);
    }

    #[test]
    fn empty_facet_set_is_not_active() {
        let mut selection = FilterSelection::default();
        selection.add(Facet::Color, "Red");
        selection.remove(Facet::Color, "Red");
        assert_eq!(selection.active_facets().count(), 0);
    }

    #[test]
    fn clear_all_empties_every_facet() {
        let mut selection = FilterSelection::default();
        for facet in Facet::all() {
            selection.add(facet, "x");
        }
        selection.clear_all();
        assert!(Facet::all().iter().all(|f| selection.values(*f).next().is_none()));
    }

    #[test]
    fn price_buckets_parse_from_slug_or_label() {
        assert_eq!("5-10-lakh".parse::<PriceBucket>(), Ok(PriceBucket::From5To10Lakh));
        assert_eq!("Above ₹15 Lakh".parse::<PriceBucket>(), Ok(PriceBucket::Above15Lakh));
        assert!("cheap".parse::<PriceBucket>().is_err());
    }

    #[test]
    fn params_round_trip_through_query_string() {
        let params = ListingParams {
            fuel: Some("Petrol,Diesel".into()),
            price: Some("5-10-lakh,nonsense".into()),
            color: Some("Pearl White".into()),
            ..Default::default()
        };
        let selection = FilterSelection::from_params(&params);
        assert!(selection.contains(Facet::PriceBucket, "₹5 - ₹10 Lakh"));
        assert_eq!(selection.values(Facet::PriceBucket).count(), 1);
        assert_eq!(
            selection.to_query_string(Some(2)),
            "fuel=Diesel,Petrol&color=Pearl+White&price=5-10-lakh&page=2"
        );
    }

    #[test]
    fn reserved_characters_survive_a_link_round_trip() {
        let mut selection = FilterSelection::default();
        for color in ["A+B", "100% Red", "Blue #2", "Black & White"] {
            selection.add(Facet::Color, color);
        }
        selection.add(Facet::PriceBucket, "below-5-lakh");

        let query = selection.to_query_string(Some(3));
        assert!(!query.contains('#'));
        let uri: axum::http::Uri = format!("/used-cars?{query}").parse().unwrap();
        let axum::extract::Query(params) = axum::extract::Query::<ListingParams>::try_from_uri(&uri).unwrap();

        assert_eq!(FilterSelection::from_params(&params), selection);
        assert_eq!(params.page, Some(3));
    }

    #[test]
    fn unknown_price_bucket_is_rejected() {
        let mut selection = FilterSelection::default();
        assert!(!selection.toggle(Facet::PriceBucket, "cheap"));
        assert!(selection.is_empty());

        assert!(selection.add(Facet::PriceBucket, "10-15-lakh"));
        assert!(selection.contains(Facet::PriceBucket, "₹10 - ₹15 Lakh"));
        assert!(!selection.add(Facet::PriceBucket, "₹10 - ₹15 Lakh"));
        assert!(!selection.toggle(Facet::PriceBucket, "10-15-lakh"));
        assert!(selection.is_empty());
    }

    #[test]
    fn slugify_inverts_deslug() {
        assert_eq!(slugify(" Maruti  Suzuki "), "maruti-suzuki");
        assert_eq!(deslug(&slugify("Grand Vitara")), "grand vitara");
    }

    #[test]
    fn route_segments_are_deslugged() {
        let route = RouteFilters::from_segments(&RouteSegments {
            brand: Some("maruti-suzuki".into()),
            model: None,
            city: Some("  new-delhi ".into()),
        });
        assert_eq!(route.brand.as_deref(), Some("maruti suzuki"));
        assert_eq!(route.city.as_deref(), Some("new delhi"));
        assert_eq!(normalize_name("  Maruti   Suzuki "), "maruti suzuki");
    }
}
