// Lead capture: sell-car, test-drive, franchise, finance and insurance enquiries

use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::LeadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeadKind {
    SellCar,
    TestDrive,
    Franchise,
    Finance,
    Insurance,
}

impl LeadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LeadKind::SellCar => "sell-car",
            LeadKind::TestDrive => "test-drive",
            LeadKind::Franchise => "franchise",
            LeadKind::Finance => "finance",
            LeadKind::Insurance => "insurance",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRequest {
    pub kind: LeadKind,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub city: Option<String>,
    /// Listing the enquiry is about, when there is one (test drives).
    #[serde(default)]
    pub listing_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl LeadRequest {
    /// Trimmed name and the bare 10-digit phone number.
    fn validated(&self) -> Result<(String, String), LeadError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(LeadError::Invalid("name is required".into()));
        }
        let phone = normalize_phone(&self.phone)
            .ok_or_else(|| LeadError::Invalid("phone must be a 10 digit mobile number".into()))?;
        Ok((name.to_string(), phone))
    }
}

/// Strips spaces, dashes and an optional +91 prefix. `None` unless exactly 10 digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    let digits = compact.strip_prefix("+91").unwrap_or(&compact);
    (digits.len() == 10 && digits.chars().all(|c| c.is_ascii_digit())).then(|| digits.to_string())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadAck {
    pub reference: String,
    pub received_at: DateTime<Utc>,
}

#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn submit(&self, lead: LeadRequest) -> Result<LeadAck, LeadError>;
}

#[derive(Debug, Serialize)]
struct LeadRow<'a> {
    reference: &'a str,
    received_at: String,
    kind: &'static str,
    name: &'a str,
    phone: &'a str,
    city: &'a str,
    listing_id: &'a str,
    message: &'a str,
}

/// Appends one CSV row per lead. The header is written when the file is created.
pub struct CsvLeadSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvLeadSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    fn append(path: &Path, row: &LeadRow<'_>) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create lead directory {}", parent.display()))?;
        }
        let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open lead file {}", path.display()))?;
        let mut writer = csv::WriterBuilder::new().has_headers(is_new).from_writer(file);
        writer.serialize(row).context("Failed to write lead row")?;
        writer.flush().context("Failed to flush lead file")?;
        Ok(())
    }
}

#[async_trait]
impl LeadSink for CsvLeadSink {
    async fn submit(&self, lead: LeadRequest) -> Result<LeadAck, LeadError> {
        let (name, phone) = lead.validated()?;
        let received_at = Utc::now();
        let reference = format!("LD-{}", received_at.timestamp_millis());

        let row = LeadRow {
            reference: &reference,
            received_at: received_at.to_rfc3339(),
            kind: lead.kind.as_str(),
            name: &name,
            phone: &phone,
            city: lead.city.as_deref().unwrap_or_default(),
            listing_id: lead.listing_id.as_deref().unwrap_or_default(),
            message: lead.message.as_deref().unwrap_or_default(),
        };

        let _guard = self.write_lock.lock().await;
        Self::append(&self.path, &row)?;
        tracing::info!(reference = %reference, kind = lead.kind.as_str(), "Lead recorded");

        Ok(LeadAck { reference, received_at })
    }
}
