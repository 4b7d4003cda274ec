// Shape checks for loosely-typed documents coming from the query endpoint or the cache

use serde_json::Value;

/// Outcome of checking one document against the shape a type needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    Valid(T),
    Invalid(Vec<String>),
}

pub trait Validate: Sized {
    fn validate(document: &Value) -> Validation<Self>;
}

/// A document that failed validation, with its position in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    pub index: usize,
    pub reasons: Vec<String>,
}

/// Splits documents into the ones that validate and the ones that don't.
pub fn partition<T: Validate>(documents: &[Value]) -> (Vec<T>, Vec<Rejected>) {
    let mut valid = Vec::with_capacity(documents.len());
    let mut rejected = Vec::new();
    for (index, document) in documents.iter().enumerate() {
        match T::validate(document) {
            Validation::Valid(item) => valid.push(item),
            Validation::Invalid(reasons) => rejected.push(Rejected { index, reasons }),
        }
    }
    (valid, rejected)
}

/// Reads a document identifier stored either as a plain string or as `{"$oid": "..."}`.
pub fn document_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => map.get("$oid").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Reads a non-empty, trimmed string field.
pub fn required_text(document: &Value, field: &str, reasons: &mut Vec<String>) -> Option<String> {
    match document.get(field).and_then(Value::as_str).map(str::trim) {
        Some(text) if !text.is_empty() => Some(text.to_string()),
        Some(_) => {
            reasons.push(format!("`{field}` is empty"));
            None
        }
        None => {
            reasons.push(format!("`{field}` is missing or not a string"));
            None
        }
    }
}

pub fn required_id(document: &Value, field: &str, reasons: &mut Vec<String>) -> Option<String> {
    let id = document.get(field).and_then(document_id);
    if id.is_none() {
        reasons.push(format!("`{field}` is missing or not an identifier"));
    }
    id
}
