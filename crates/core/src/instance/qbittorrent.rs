//! qBittorrent WebUI session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::metrics;
use crate::registry::InstanceConnector;

use super::{
    CategoryInfo, InstanceApi, InstanceError, InstanceId, TorrentFile, TorrentRecord,
    TrackerRecord, TrackerStatus, UploadFile,
};

/// One authenticated qBittorrent instance.
///
/// The session cookie lives in the client's own cookie jar, so sessions for
/// different instances never share state.
pub struct QBittorrentSession {
    client: Client,
    id: InstanceId,
}

impl QBittorrentSession {
    /// Parse the endpoint address, log in, and return the ready session.
    pub async fn login(endpoint: &EndpointConfig) -> Result<Self, InstanceError> {
        let id = InstanceId::parse(&endpoint.url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| InstanceError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let session = Self { client, id };
        session
            .authenticate(&endpoint.username, &endpoint.password)
            .await?;
        Ok(session)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.id.as_str(), endpoint)
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<(), InstanceError> {
        let params = [("username", username), ("password", password)];
        let response = self
            .send("login", self.client.post(self.url("/api/v2/auth/login")).form(&params))
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InstanceError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(InstanceError::AuthenticationFailed(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(100).collect::<String>()
            )));
        }
        if body.trim() == "Fails." {
            return Err(InstanceError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ));
        }

        debug!(instance = %self.id, "qBittorrent login successful");
        Ok(())
    }

    /// Send a request, mapping transport failures and recording the outcome.
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, InstanceError> {
        let result = request.send().await.map_err(|e| {
            if e.is_timeout() {
                InstanceError::Timeout
            } else if e.is_connect() {
                InstanceError::ConnectionFailed(e.to_string())
            } else {
                InstanceError::Transport(e.to_string())
            }
        });

        let outcome = match &result {
            Ok(r) if r.status().is_success() => "ok",
            _ => "error",
        };
        metrics::INSTANCE_REQUESTS
            .with_label_values(&[operation, outcome])
            .inc();

        result
    }

    async fn get_text(
        &self,
        operation: &'static str,
        endpoint: &str,
    ) -> Result<String, InstanceError> {
        let response = self
            .send(operation, self.client.get(self.url(endpoint)))
            .await?;
        success_body(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        endpoint: &str,
    ) -> Result<T, InstanceError> {
        let body = self.get_text(operation, endpoint).await?;
        serde_json::from_str(&body).map_err(|e| InstanceError::MalformedResponse(e.to_string()))
    }

    async fn post_form(
        &self,
        operation: &'static str,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Response, InstanceError> {
        self.send(operation, self.client.post(self.url(endpoint)).form(params))
            .await
    }

    fn to_record(&self, raw: QbTorrent) -> TorrentRecord {
        TorrentRecord {
            hash: raw.hash.to_lowercase(),
            name: raw.name,
            category: if raw.category.is_empty() {
                None
            } else {
                Some(raw.category)
            },
            content_path: raw.content_path,
            save_path: raw.save_path,
            ratio: raw.ratio,
            size_bytes: raw.size.max(0) as u64,
            progress: raw.progress,
            state: raw.state,
            added_at: timestamp_to_datetime(raw.added_on),
            instance: self.id.clone(),
        }
    }
}

/// Read the body of a 2xx response, or turn anything else into an API error.
async fn success_body(response: Response) -> Result<String, InstanceError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| InstanceError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(InstanceError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(body)
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QbTorrent {
    hash: String,
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    content_path: String,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    ratio: f64,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    state: String,
    #[serde(default)]
    added_on: i64,
}

/// qBittorrent category entry (`{"name": .., "savePath": ..}`).
#[derive(Debug, Deserialize)]
struct QbCategory {
    name: String,
    #[serde(rename = "savePath", default)]
    save_path: String,
}

/// qBittorrent tracker entry.
#[derive(Debug, Deserialize)]
struct QbTracker {
    url: String,
    #[serde(default)]
    status: i64,
    /// Integer for real trackers, empty string for the DHT/PeX/LSD pseudo entries.
    #[serde(default)]
    tier: serde_json::Value,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    num_seeds: i64,
    #[serde(default)]
    num_peers: i64,
    #[serde(default)]
    num_leeches: i64,
    #[serde(default)]
    num_downloaded: i64,
}

impl From<QbTracker> for TrackerRecord {
    fn from(raw: QbTracker) -> Self {
        TrackerRecord {
            url: raw.url,
            status: TrackerStatus::from(raw.status),
            tier: raw.tier.as_i64().unwrap_or(-1),
            message: raw.msg,
            seeds: raw.num_seeds,
            peers: raw.num_peers,
            leeches: raw.num_leeches,
            downloaded: raw.num_downloaded,
        }
    }
}

/// qBittorrent file entry.
#[derive(Debug, Deserialize)]
struct QbFile {
    #[serde(default)]
    index: i64,
    name: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    priority: i64,
    #[serde(default)]
    availability: f64,
    #[serde(default)]
    is_seed: Option<bool>,
}

impl From<QbFile> for TorrentFile {
    fn from(raw: QbFile) -> Self {
        TorrentFile {
            index: raw.index,
            name: raw.name,
            size: raw.size.max(0) as u64,
            progress: raw.progress,
            priority: raw.priority,
            availability: raw.availability,
            is_seed: raw.is_seed,
        }
    }
}

/// Convert Unix timestamp to DateTime<Utc>.
fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

#[async_trait]
impl InstanceApi for QBittorrentSession {
    fn id(&self) -> &InstanceId {
        &self.id
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentRecord>, InstanceError> {
        let torrents: Vec<QbTorrent> = self
            .get_json("list_torrents", "/api/v2/torrents/info?sort=added_on")
            .await?;
        Ok(torrents.into_iter().map(|t| self.to_record(t)).collect())
    }

    async fn get_torrent(&self, hash: &str) -> Result<TorrentRecord, InstanceError> {
        let endpoint = format!(
            "/api/v2/torrents/info?hashes={}",
            urlencoding::encode(&hash.to_lowercase())
        );
        let mut torrents: Vec<QbTorrent> = self.get_json("get_torrent", &endpoint).await?;

        if torrents.len() != 1 {
            return Err(InstanceError::TorrentNotFound(hash.to_string()));
        }
        Ok(self.to_record(torrents.remove(0)))
    }

    async fn list_categories(&self) -> Result<Vec<CategoryInfo>, InstanceError> {
        let raw: HashMap<String, QbCategory> = self
            .get_json("list_categories", "/api/v2/torrents/categories")
            .await?;

        let mut categories: Vec<CategoryInfo> = raw
            .into_values()
            .map(|c| CategoryInfo::new(c.name, c.save_path))
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(&self, name: &str, save_path: &str) -> Result<(), InstanceError> {
        debug!(instance = %self.id, category = %name, save_path = %save_path, "Creating category");

        let response = self
            .post_form(
                "create_category",
                "/api/v2/torrents/createCategory",
                &[("category", name), ("savePath", save_path)],
            )
            .await?;

        match response.status() {
            StatusCode::BAD_REQUEST => Err(InstanceError::CategoryNameEmpty),
            StatusCode::CONFLICT => Err(InstanceError::CategoryConflict(name.to_string())),
            _ => success_body(response).await.map(|_| ()),
        }
    }

    async fn upload(&self, files: Vec<UploadFile>, category: &str) -> Result<(), InstanceError> {
        let mut form = multipart::Form::new();
        for file in files {
            let part = multipart::Part::bytes(file.data.to_vec())
                .file_name(file.filename)
                .mime_str("application/x-bittorrent")
                .map_err(|e| InstanceError::Internal(e.to_string()))?;
            form = form.part("torrents", part);
        }
        if !category.is_empty() {
            form = form.text("category", category.to_string());
        }
        form = form.text("autoTMM", "true");

        let response = self
            .send(
                "upload",
                self.client.post(self.url("/api/v2/torrents/add")).multipart(form),
            )
            .await?;

        if response.status() == StatusCode::UNSUPPORTED_MEDIA_TYPE {
            let body = response.text().await.unwrap_or_default();
            return Err(InstanceError::UnsupportedFile(body));
        }

        // qBittorrent answers 200 "Fails." when it rejected every file.
        let body = success_body(response).await?;
        if body.trim() == "Fails." {
            return Err(InstanceError::UnsupportedFile(
                "instance rejected the torrent".to_string(),
            ));
        }
        Ok(())
    }

    async fn get_trackers(&self, hash: &str) -> Result<Vec<TrackerRecord>, InstanceError> {
        let endpoint = format!(
            "/api/v2/torrents/trackers?hash={}",
            urlencoding::encode(&hash.to_lowercase())
        );
        let trackers: Vec<QbTracker> = self.get_json("get_trackers", &endpoint).await?;
        Ok(trackers.into_iter().map(TrackerRecord::from).collect())
    }

    async fn get_version(&self) -> Result<String, InstanceError> {
        let body = self
            .get_text("get_version", "/api/v2/app/webapiVersion")
            .await?;
        Ok(body.trim().to_string())
    }

    async fn list_files(&self, hash: &str) -> Result<Vec<TorrentFile>, InstanceError> {
        let endpoint = format!(
            "/api/v2/torrents/files?hash={}",
            urlencoding::encode(&hash.to_lowercase())
        );
        let files: Vec<QbFile> = self.get_json("list_files", &endpoint).await?;
        Ok(files.into_iter().map(TorrentFile::from).collect())
    }

    async fn pause_torrents(&self, hashes: &[String]) -> Result<(), InstanceError> {
        let joined = hashes.join("|");
        let response = self
            .post_form("pause", "/api/v2/torrents/stop", &[("hashes", joined.as_str())])
            .await?;
        success_body(response).await.map(|_| ())
    }

    async fn resume_torrents(&self, hashes: &[String]) -> Result<(), InstanceError> {
        let joined = hashes.join("|");
        let response = self
            .post_form("resume", "/api/v2/torrents/start", &[("hashes", joined.as_str())])
            .await?;
        success_body(response).await.map(|_| ())
    }
}

/// Connector that logs into real qBittorrent instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct QBittorrentConnector;

#[async_trait]
impl InstanceConnector for QBittorrentConnector {
    async fn connect(
        &self,
        endpoint: &EndpointConfig,
    ) -> Result<Arc<dyn InstanceApi>, InstanceError> {
        let session = QBittorrentSession::login(endpoint).await?;
        Ok(Arc::new(session))
    }
}
