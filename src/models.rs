// Data structures: reference entities, listing cards, request/response payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    profile::CollectionProfile,
    schema::{self, Validate, Validation},
};

/// A car maker, e.g. "Maruti Suzuki".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

impl Validate for Brand {
    fn validate(document: &Value) -> Validation<Self> {
        let mut reasons = Vec::new();
        let id = schema::required_id(document, "_id", &mut reasons);
        let name = schema::required_text(document, "name", &mut reasons);
        match (id, name) {
            (Some(id), Some(name)) => Validation::Valid(Brand { id, name }),
            _ => Validation::Invalid(reasons),
        }
    }
}

/// A model line belonging to a brand. The parent brand id is stored under `company`,
/// the same field listings use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarModel {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "company")]
    pub brand_id: String,
}

impl Validate for CarModel {
    fn validate(document: &Value) -> Validation<Self> {
        let mut reasons = Vec::new();
        let id = schema::required_id(document, "_id", &mut reasons);
        let name = schema::required_text(document, "name", &mut reasons);
        let brand_id = schema::required_id(document, "company", &mut reasons);
        match (id, name, brand_id) {
            (Some(id), Some(name), Some(brand_id)) => Validation::Valid(CarModel { id, name, brand_id }),
            _ => Validation::Invalid(reasons),
        }
    }
}

/// Looks up a dot-separated path inside a document.
pub fn field<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |current, key| current.get(key))
}

/// Renders a scalar field as display text.
pub fn field_text(document: &Value, path: &str) -> Option<String> {
    match field(document, path)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Formats a rupee amount the way listings show it: lakhs and crores.
pub fn format_price(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    match cleaned.parse::<f64>() {
        Ok(amount) if amount >= 1_00_00_000.0 => format!("₹{:.2} Crore", amount / 1_00_00_000.0),
        Ok(amount) if amount >= 1_00_000.0 => format!("₹{:.2} Lakh", amount / 1_00_000.0),
        Ok(amount) => format!("₹{amount:.0}"),
        Err(_) => raw.to_string(),
    }
}

// What a listing page shows for one vehicle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingCard {
    pub id: String,
    pub title: String,
    pub price: Option<String>,
    pub image: Option<String>,
    pub details: Vec<String>,
}

impl ListingCard {
    pub fn from_document(document: &Value, profile: &CollectionProfile) -> Self {
        let id = document.get("_id").and_then(schema::document_id).unwrap_or_default();
        let title = field_text(document, &profile.title_field).unwrap_or_else(|| "Untitled listing".to_string());
        let price = field_text(document, &profile.price_field).map(|p| format_price(&p));
        let image = match field(document, &profile.image_field) {
            Some(Value::Array(images)) => images.first().and_then(Value::as_str).map(str::to_string),
            Some(Value::String(image)) => Some(image.clone()),
            _ => None,
        };
        let details = profile
            .document_facets()
            .filter_map(|(_, path)| field_text(document, path))
            .collect();

        Self { id, title, price, image, details }
    }
}

// Route parts as they arrive in the URL path
#[derive(Debug, Deserialize, Default)]
pub struct RouteSegments {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

// Listing query string: comma-separated facet values plus page
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ListingParams {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub city: Option<String>,
    pub fuel: Option<String>,
    pub transmission: Option<String>,
    pub color: Option<String>,
    pub year: Option<String>,
    pub price: Option<String>,
    pub page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::CollectionProfile;
    use serde_json::json;

    #[test]
    fn model_requires_parent_brand() {
        let doc = json!({"_id": "m1", "name": "Swift"});
        match CarModel::validate(&doc) {
            Validation::Invalid(reasons) => assert!(reasons[0].contains("company")),
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[test]
    fn brand_round_trips_through_cache_shape() {
        let brand = Brand { id: "b1".into(), name: "Tata".into() };
        let stored = serde_json::to_value(&brand).unwrap();
        assert_eq!(Brand::validate(&stored), Validation::Valid(brand));
    }

    #[test]
    fn nested_paths_resolve() {
        let doc = json!({"data": {"fueltype": " Petrol "}});
        assert_eq!(field_text(&doc, "data.fueltype"), Some("Petrol".into()));
        assert_eq!(field_text(&doc, "data.color"), None);
    }

    #[test]
    fn prices_format_in_lakhs() {
        assert_eq!(format_price("550000"), "₹5.50 Lakh");
        assert_eq!(format_price("12500000"), "₹1.25 Crore");
        assert_eq!(format_price("95,000"), "₹95000");
        assert_eq!(format_price("on request"), "on request");
    }

    #[test]
    fn card_picks_first_image() {
        let profile = CollectionProfile::used_cars("usedcars");
        let doc = json!({
            "_id": {"$oid": "abc"},
            "name": "2019 Swift VXi",
            "price": "550000",
            "images": ["a.jpg", "b.jpg"],
            "fueltype": "Petrol"
        });
        let card = ListingCard::from_document(&doc, &profile);
        assert_eq!(card.id, "abc");
        assert_eq!(card.image.as_deref(), Some("a.jpg"));
        assert_eq!(card.details, vec!["Petrol".to_string()]);
    }
}
