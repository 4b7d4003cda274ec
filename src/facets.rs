// Available sidebar options derived from a result set

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};

use serde::Serialize;
use serde_json::Value;

use crate::{
    filters::{Facet, PriceBucket},
    models,
    profile::CollectionProfile,
};

/// Options per facet, each list already deduplicated and sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FacetOptions(pub BTreeMap<Facet, Vec<String>>);

impl FacetOptions {
    pub fn get(&self, facet: Facet) -> &[String] {
        self.0.get(&facet).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Collects the distinct values each facet field takes across `documents`.
///
/// Values are trimmed before deduplication but case is kept, so "Red" and
/// "red" are two options. Text facets sort alphabetically, registration
/// year newest first. Price buckets are not read from documents; every
/// bucket is always offered.
pub fn extract_facets(documents: &[Value], profile: &CollectionProfile) -> FacetOptions {
    let mut options = BTreeMap::new();

    for (facet, path) in profile.document_facets() {
        let distinct: BTreeSet<String> = documents
            .iter()
            .filter_map(|doc| models::field_text(doc, path))
            .collect();
        let mut values: Vec<String> = distinct.into_iter().collect();
        sort_for(facet, &mut values);
        options.insert(facet, values);
    }

    if profile.field_for(Facet::PriceBucket).is_some() {
        let buckets = PriceBucket::ALL.iter().map(|b| b.label().to_string()).collect();
        options.insert(Facet::PriceBucket, buckets);
    }

    FacetOptions(options)
}

fn sort_for(facet: Facet, values: &mut [String]) {
    match facet {
        Facet::RegistrationYear => values.sort_by(newest_first),
        _ => values.sort(),
    }
}

// Numeric years descending; anything unparseable goes last, alphabetically
fn newest_first(a: &String, b: &String) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => y.cmp(&x),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Projection that fetches only the fields facets are built from.
pub fn facet_projection(profile: &CollectionProfile) -> Value {
    let fields: serde_json::Map<String, Value> = profile
        .document_facets()
        .map(|(_, path)| (path.to_string(), Value::from(1)))
        .collect();
    Value::Object(fields)
}
