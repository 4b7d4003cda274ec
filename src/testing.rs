// Test doubles shared by the unit tests

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    cache::{Clock, KeyValueStore},
    error::RemoteQueryError,
    mfind::{LookupStage, QueryBackend, QueryOptions},
};

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(rfc3339: &str) -> Self {
        let now = DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc);
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub collection: String,
    pub options: QueryOptions,
}

impl RecordedCall {
    pub fn is_page_fetch(&self) -> bool {
        self.options.lookups.iter().any(|stage| matches!(stage, LookupStage::Skip(_)))
    }

    pub fn is_count(&self) -> bool {
        self.options.projection == serde_json::json!({"_id": 1})
    }
}

type Responder = dyn Fn(&str, &QueryOptions) -> Result<Vec<Value>, RemoteQueryError> + Send + Sync;

/// Scripted backend: answers with `responder` and records every call.
pub struct FakeBackend {
    responder: Box<Responder>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeBackend {
    pub fn new(
        responder: impl Fn(&str, &QueryOptions) -> Result<Vec<Value>, RemoteQueryError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self { responder: Box::new(responder), delay: None, calls: Mutex::new(Vec::new()) })
    }

    pub fn slow(
        delay: Duration,
        responder: impl Fn(&str, &QueryOptions) -> Result<Vec<Value>, RemoteQueryError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self { responder: Box::new(responder), delay: Some(delay), calls: Mutex::new(Vec::new()) })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, collection: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.collection == collection).collect()
    }
}

#[async_trait]
impl QueryBackend for FakeBackend {
    async fn query(&self, _db_name: &str, collection: &str, options: &QueryOptions) -> Result<Vec<Value>, RemoteQueryError> {
        self.calls.lock().unwrap().push(RecordedCall {
            collection: collection.to_string(),
            options: options.clone(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(collection, options)
    }
}
