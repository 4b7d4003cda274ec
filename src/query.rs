// Translates route + facet selections into the remote filter document

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::{
    filters::{Facet, FilterSelection, PriceBucket},
    profile::CollectionProfile,
};

/// A backend-ready filter. Either `{}` (match everything) or `{"$and": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CompiledQuery(Value);

impl CompiledQuery {
    pub fn match_all() -> Self {
        CompiledQuery(Value::Object(Map::new()))
    }

    pub fn is_match_all(&self) -> bool {
        self.0.as_object().is_some_and(Map::is_empty)
    }

    pub fn clauses(&self) -> &[Value] {
        self.0
            .get("$and")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Stable textual form, used as a memo key.
    pub fn cache_key(&self) -> String {
        self.0.to_string()
    }

    fn from_clauses(clauses: Vec<Value>) -> Self {
        if clauses.is_empty() {
            Self::match_all()
        } else {
            CompiledQuery(json!({ "$and": clauses }))
        }
    }
}

/// How one route name fared against the reference data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Absent,
    Resolved { id: String, name: String },
    /// The name matched nothing; the page still shows it as a label.
    Unresolved(String),
}

impl Resolution {
    pub fn id(&self) -> Option<&str> {
        match self {
            Resolution::Resolved { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Resolution::Absent => None,
            Resolution::Resolved { name, .. } => Some(name),
            Resolution::Unresolved(raw) => Some(raw),
        }
    }
}

/// Route filters after brand/model names have been turned into identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub brand: Resolution,
    pub model: Resolution,
    pub city: Option<String>,
}

impl Default for ResolvedRoute {
    fn default() -> Self {
        Self { brand: Resolution::Absent, model: Resolution::Absent, city: None }
    }
}

impl ResolvedRoute {
    pub fn unresolved_labels(&self) -> Vec<String> {
        [&self.brand, &self.model]
            .into_iter()
            .filter_map(|r| match r {
                Resolution::Unresolved(raw) => Some(raw.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Builds the filter for a route and a facet selection. Pure: the same inputs
/// always give an identical query.
pub fn compile(route: &ResolvedRoute, selection: &FilterSelection, profile: &CollectionProfile) -> CompiledQuery {
    let mut clauses = Vec::new();

    if let Some(id) = route.brand.id() {
        clauses.push(json!({ profile.brand_field.as_str(): id }));
    }
    if let Some(id) = route.model.id() {
        clauses.push(json!({ profile.model_field.as_str(): id }));
    }
    if let Some(city) = route.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        match &profile.city_field {
            Some(field) => clauses.push(city_clause(field, city)),
            None => tracing::debug!(city, collection = %profile.collection, "Collection has no city field; ignoring city"),
        }
    }

    for facet in selection.active_facets() {
        if facet == Facet::PriceBucket {
            if let Some(clause) = price_clause(&profile.price_field, selection) {
                clauses.push(clause);
            }
            continue;
        }
        let Some(field) = profile.field_for(facet) else {
            tracing::debug!(?facet, collection = %profile.collection, "Facet not offered by collection; ignoring");
            continue;
        };
        let values: Vec<Value> = if facet == Facet::RegistrationYear {
            year_values(selection.values(facet))
        } else {
            selection.values(facet).map(|v| Value::String(v.to_string())).collect()
        };
        clauses.push(json!({ field: { "$in": values } }));
    }

    CompiledQuery::from_clauses(clauses)
}

/// Exact, case-insensitive city match. A substring match would let "Pune" hit "Punekar".
fn city_clause(field: &str, city: &str) -> Value {
    json!({ field: { "$regex": format!("^{}$", regex::escape(city)), "$options": "i" } })
}

// Years are stored as strings on some documents and numbers on others
fn year_values<'a>(values: impl Iterator<Item = &'a str>) -> Vec<Value> {
    let mut out = Vec::new();
    for value in values {
        out.push(Value::String(value.to_string()));
        if let Ok(year) = value.parse::<i64>() {
            out.push(json!(year));
        }
    }
    out
}

fn price_clause(price_field: &str, selection: &FilterSelection) -> Option<Value> {
    let buckets = selection.price_buckets();
    if buckets.is_empty() {
        return None;
    }
    // BTreeSet order makes the $or independent of selection order
    let predicates: Vec<Value> = buckets
        .into_iter()
        .map(|bucket| price_predicate(price_field, bucket))
        .collect();
    Some(json!({ "$or": predicates }))
}

/// Numeric condition for one bucket, comparing the price after string-to-number coercion.
/// ₹10 Lakh sits in both middle buckets.
pub fn price_predicate(price_field: &str, bucket: PriceBucket) -> Value {
    let price = json!({ "$toDouble": format!("${price_field}") });
    let expr = match bucket {
        PriceBucket::Below5Lakh => json!({ "$lt": [price, 500_000] }),
        PriceBucket::From5To10Lakh => json!({ "$and": [
            { "$gte": [price, 500_000] },
            { "$lte": [price, 1_000_000] },
        ]}),
        PriceBucket::From10To15Lakh => json!({ "$and": [
            { "$gte": [price, 1_000_000] },
            { "$lte": [price, 1_500_000] },
        ]}),
        PriceBucket::Above15Lakh => json!({ "$gt": [price, 1_500_000] }),
    };
    json!({ "$expr": expr })
}
