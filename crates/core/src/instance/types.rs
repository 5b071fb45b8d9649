//! Types shared by every instance implementation.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Tracker message qBittorrent relays when a tracker has dropped the torrent.
pub const DELETED_TORRENT_MESSAGE: &str = "Torrent has been deleted.";

/// Errors that can occur while talking to a single instance.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstanceError {
    #[error("Invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Category name is empty")]
    CategoryNameEmpty,

    #[error("Category name is invalid or already exists: {0}")]
    CategoryConflict(String),

    #[error("Torrent file is invalid: {0}")]
    UnsupportedFile(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// An error tagged with the instance that produced it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{instance}: {error}")]
pub struct InstanceFailure {
    pub instance: InstanceId,
    #[source]
    pub error: InstanceError,
}

impl InstanceFailure {
    pub fn new(instance: InstanceId, error: InstanceError) -> Self {
        Self { instance, error }
    }
}

/// Serialized as `{ "instance": ..., "error": ... }` with the error's message.
impl Serialize for InstanceFailure {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("InstanceFailure", 2)?;
        state.serialize_field("instance", &self.instance)?;
        state.serialize_field("error", &self.error.to_string())?;
        state.end()
    }
}

/// Normalized base address of an instance.
///
/// Unique key of the registry. Records keep one of these instead of a handle
/// to the session that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Parse and normalize a configured base address.
    ///
    /// Only absolute http(s) URLs are accepted; the trailing slash is dropped so
    /// that `http://host:8080` and `http://host:8080/` name the same instance.
    pub fn parse(raw: &str) -> Result<Self, InstanceError> {
        let invalid = |reason: String| InstanceError::InvalidAddress {
            address: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("query and fragment are not allowed".to_string()));
        }

        Ok(Self(url.as_str().trim_end_matches('/').to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A torrent as reported by one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentRecord {
    /// Info hash (lowercase hex).
    pub hash: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub content_path: String,
    pub save_path: String,
    pub ratio: f64,
    pub size_bytes: u64,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    /// Raw qBittorrent state string (e.g. "stalledUP").
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    /// Instance the torrent lives on.
    pub instance: InstanceId,
}

/// A category as defined on one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub name: String,
    pub save_path: String,
}

impl CategoryInfo {
    pub fn new(name: impl Into<String>, save_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            save_path: save_path.into(),
        }
    }
}

/// Tracker status as reported by the WebUI API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerStatus {
    Disabled,
    NotContacted,
    Working,
    Updating,
    NotWorking,
    Unknown,
}

impl From<i64> for TrackerStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => TrackerStatus::Disabled,
            1 => TrackerStatus::NotContacted,
            2 => TrackerStatus::Working,
            3 => TrackerStatus::Updating,
            4 => TrackerStatus::NotWorking,
            _ => TrackerStatus::Unknown,
        }
    }
}

/// One tracker entry of a torrent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerRecord {
    pub url: String,
    pub status: TrackerStatus,
    pub tier: i64,
    pub message: String,
    pub seeds: i64,
    pub peers: i64,
    pub leeches: i64,
    pub downloaded: i64,
}

impl TrackerRecord {
    /// Whether the tracker says it has removed the torrent.
    pub fn reports_deleted(&self) -> bool {
        self.message == DELETED_TORRENT_MESSAGE
    }
}

/// One file inside a torrent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentFile {
    pub index: i64,
    pub name: String,
    pub size: u64,
    pub progress: f64,
    pub priority: i64,
    pub availability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_seed: Option<bool>,
}

/// A .torrent file to upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// Operations the fleet core performs against a single instance.
#[async_trait]
pub trait InstanceApi: Send + Sync {
    /// Normalized base address.
    fn id(&self) -> &InstanceId;

    /// List every torrent, in the order the instance returns them.
    async fn list_torrents(&self) -> Result<Vec<TorrentRecord>, InstanceError>;

    /// Get one torrent by info hash.
    async fn get_torrent(&self, hash: &str) -> Result<TorrentRecord, InstanceError>;

    /// List categories, sorted by name.
    async fn list_categories(&self) -> Result<Vec<CategoryInfo>, InstanceError>;

    /// Create a category.
    async fn create_category(&self, name: &str, save_path: &str) -> Result<(), InstanceError>;

    /// Add .torrent files, optionally into a category (empty string for none).
    async fn upload(&self, files: Vec<UploadFile>, category: &str) -> Result<(), InstanceError>;

    /// Trackers of one torrent.
    async fn get_trackers(&self, hash: &str) -> Result<Vec<TrackerRecord>, InstanceError>;

    /// WebUI API version string.
    async fn get_version(&self) -> Result<String, InstanceError>;

    /// Files of one torrent.
    async fn list_files(&self, hash: &str) -> Result<Vec<TorrentFile>, InstanceError>;

    async fn pause_torrents(&self, hashes: &[String]) -> Result<(), InstanceError>;

    async fn resume_torrents(&self, hashes: &[String]) -> Result<(), InstanceError>;
}
