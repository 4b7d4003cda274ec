// Client for the remote document-query endpoint (`mfind`)

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{config::MfindSettings, error::RemoteQueryError, query::CompiledQuery};

/// One server-side pipeline step, applied in order after `query`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LookupStage {
    #[serde(rename = "$match")]
    Match(CompiledQuery),
    #[serde(rename = "$skip")]
    Skip(u64),
    #[serde(rename = "$limit")]
    Limit(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Everything besides db/collection that goes into a query request.
/// `limit == 0` asks for every match.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub filter: Value,
    pub projection: Value,
    pub limit: u64,
    pub skip: u64,
    pub sort_by: Option<String>,
    pub order: SortOrder,
    pub lookups: Vec<LookupStage>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            filter: json!({}),
            projection: json!({}),
            limit: 0,
            skip: 0,
            sort_by: None,
            order: SortOrder::Asc,
            lookups: Vec::new(),
        }
    }
}

impl QueryOptions {
    /// Unbounded fetch of everything matching `filter`.
    pub fn all(filter: Value) -> Self {
        Self { filter, ..Self::default() }
    }

    pub fn with_projection(mut self, projection: Value) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_lookups(mut self, lookups: Vec<LookupStage>) -> Self {
        self.lookups = lookups;
        self
    }

    pub fn sorted(mut self, sort_by: Option<String>, order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.order = order;
        self
    }
}

// Wire body, camelCase keys as the endpoint expects
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<'a> {
    db_name: &'a str,
    collection_name: &'a str,
    query: &'a Value,
    projection: &'a Value,
    limit: u64,
    skip: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort_by: Option<&'a str>,
    order: SortOrder,
    lookups: &'a [LookupStage],
}

impl<'a> QueryRequest<'a> {
    pub fn new(db_name: &'a str, collection_name: &'a str, options: &'a QueryOptions) -> Self {
        Self {
            db_name,
            collection_name,
            query: &options.filter,
            projection: &options.projection,
            limit: options.limit,
            skip: options.skip,
            sort_by: options.sort_by.as_deref(),
            order: options.order,
            lookups: &options.lookups,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Option<Vec<Value>>,
}

/// Anything that can answer document queries. The HTTP client is the real one;
/// tests substitute a scripted fake.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn query(
        &self,
        db_name: &str,
        collection: &str,
        options: &QueryOptions,
    ) -> Result<Vec<Value>, RemoteQueryError>;
}

pub struct MfindClient {
    http_client: Arc<Client>,
    url: String,
    api_key: Option<(String, String)>,
}

impl MfindClient {
    pub fn new(http_client: Arc<Client>, settings: &MfindSettings) -> Self {
        Self {
            http_client,
            url: settings.url.clone(),
            api_key: settings
                .api_key
                .as_ref()
                .map(|key| (settings.api_key_header.clone(), key.clone())),
        }
    }
}

#[async_trait]
impl QueryBackend for MfindClient {
    async fn query(
        &self,
        db_name: &str,
        collection: &str,
        options: &QueryOptions,
    ) -> Result<Vec<Value>, RemoteQueryError> {
        let body = QueryRequest::new(db_name, collection, options);
        tracing::debug!(collection, limit = options.limit, lookups = options.lookups.len(), "Sending mfind query");

        let mut request = self.http_client.post(&self.url).json(&body);
        if let Some((header, key)) = &self.api_key {
            request = request.header(header.as_str(), key.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "[Failed to read response body]".to_string());
            tracing::warn!(collection, status = %status, "mfind query failed");
            return Err(RemoteQueryError::Status { status: status.as_u16(), body });
        }

        let bytes = response.bytes().await?;
        let parsed: QueryResponse = serde_json::from_slice(&bytes)
            .map_err(|e| RemoteQueryError::Decode(e.to_string()))?;
        let documents = parsed.data.unwrap_or_default();
        tracing::debug!(collection, count = documents.len(), "mfind query returned");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::{HeaderMap, StatusCode}, routing::post, Json, Router};
    use tokio::net::TcpListener;

    fn settings(url: String) -> MfindSettings {
        MfindSettings {
            url,
            api_key: Some("secret".into()),
            api_key_header: "x-api-key".into(),
            db_name: "carmarket".into(),
            timeout_secs: 5,
        }
    }

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/mfind")
    }

    #[test]
    fn request_body_uses_endpoint_field_names() {
        let options = QueryOptions::all(json!({"fueltype": "Petrol"})).with_lookups(vec![
            LookupStage::Match(CompiledQuery::match_all()),
            LookupStage::Skip(12),
            LookupStage::Limit(12),
        ]);
        let body = serde_json::to_value(QueryRequest::new("carmarket", "usedcars", &options)).unwrap();

        assert_eq!(
            body,
            json!({
                "dbName": "carmarket",
                "collectionName": "usedcars",
                "query": {"fueltype": "Petrol"},
                "projection": {},
                "limit": 0,
                "skip": 0,
                "order": "asc",
                "lookups": [{"$match": {}}, {"$skip": 12}, {"$limit": 12}]
            })
        );
    }

    #[tokio::test]
    async fn returns_documents_and_sends_api_key() {
        let router = Router::new().route(
            "/mfind",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers.get("x-api-key").unwrap(), "secret");
                assert_eq!(body["collectionName"], "companies");
                Json(json!({"data": [{"_id": "b1", "name": "Maruti"}]}))
            }),
        );
        let client = MfindClient::new(Arc::new(Client::new()), &settings(serve(router).await));

        let docs = client.query("carmarket", "companies", &QueryOptions::default()).await.unwrap();
        assert_eq!(docs, vec![json!({"_id": "b1", "name": "Maruti"})]);
    }

    #[tokio::test]
    async fn null_data_becomes_empty_sequence() {
        let router = Router::new().route("/mfind", post(|| async { Json(json!({"data": null})) }));
        let client = MfindClient::new(Arc::new(Client::new()), &settings(serve(router).await));

        let docs = client.query("carmarket", "usedcars", &QueryOptions::default()).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let router = Router::new().route(
            "/mfind",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let client = MfindClient::new(Arc::new(Client::new()), &settings(serve(router).await));

        let err = client.query("carmarket", "usedcars", &QueryOptions::default()).await.unwrap_err();
        match err {
            RemoteQueryError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
