//! Mock qBittorrent instance for testing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::EndpointConfig;
use crate::instance::{
    CategoryInfo, InstanceApi, InstanceError, InstanceId, TorrentFile, TorrentRecord,
    TrackerRecord, UploadFile,
};
use crate::registry::InstanceConnector;

/// A recorded upload for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub filenames: Vec<String>,
    pub category: String,
    pub total_bytes: usize,
}

/// Mock implementation of the InstanceApi trait.
///
/// Provides controllable behavior for testing:
/// - Seed torrents, categories, trackers and files
/// - Record category creations and uploads for assertions
/// - Simulate failures and slow responses
///
/// Category creation behaves like qBittorrent: creating a name that already
/// exists fails with `CategoryConflict`.
#[derive(Debug)]
pub struct MockInstance {
    id: InstanceId,
    version: String,
    torrents: RwLock<Vec<TorrentRecord>>,
    /// Category name -> save path.
    categories: RwLock<BTreeMap<String, String>>,
    trackers: RwLock<HashMap<String, Vec<TrackerRecord>>>,
    files: RwLock<HashMap<String, Vec<TorrentFile>>>,
    paused: RwLock<HashSet<String>>,
    created: RwLock<Vec<CategoryInfo>>,
    uploads: RwLock<Vec<RecordedUpload>>,
    /// If set, every operation fails with this error.
    failure: RwLock<Option<InstanceError>>,
    /// If set, category creation fails with this error.
    create_error: RwLock<Option<InstanceError>>,
    /// If set, uploads fail with this error.
    upload_error: RwLock<Option<InstanceError>>,
    delay: RwLock<Option<Duration>>,
    /// Extra delay applied only to category creation.
    create_delay: RwLock<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockInstance {
    /// Create an empty instance at `base_address`.
    ///
    /// Panics if the address is not a valid instance URL.
    pub fn new(base_address: &str) -> Self {
        let id = InstanceId::parse(base_address).expect("valid mock instance address");
        Self {
            id,
            version: "2.11.2".to_string(),
            torrents: RwLock::new(Vec::new()),
            categories: RwLock::new(BTreeMap::new()),
            trackers: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
            paused: RwLock::new(HashSet::new()),
            created: RwLock::new(Vec::new()),
            uploads: RwLock::new(Vec::new()),
            failure: RwLock::new(None),
            create_error: RwLock::new(None),
            upload_error: RwLock::new(None),
            delay: RwLock::new(None),
            create_delay: RwLock::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Pre-populate a torrent.
    pub async fn add_torrent(&self, torrent: TorrentRecord) {
        self.torrents.write().await.push(torrent);
    }

    /// Pre-populate a category without recording it as created.
    pub async fn add_category(&self, name: &str, save_path: &str) {
        self.categories
            .write()
            .await
            .insert(name.to_string(), save_path.to_string());
    }

    /// Set the trackers reported for a torrent.
    pub async fn set_trackers(&self, hash: &str, trackers: Vec<TrackerRecord>) {
        self.trackers.write().await.insert(hash.to_string(), trackers);
    }

    /// Set the files reported for a torrent.
    pub async fn set_files(&self, hash: &str, files: Vec<TorrentFile>) {
        self.files.write().await.insert(hash.to_string(), files);
    }

    /// Make every operation fail with `error` until cleared.
    pub async fn set_failure(&self, error: InstanceError) {
        *self.failure.write().await = Some(error);
    }

    pub async fn clear_failure(&self) {
        *self.failure.write().await = None;
    }

    /// Make category creation fail with `error`.
    pub async fn set_create_error(&self, error: InstanceError) {
        *self.create_error.write().await = Some(error);
    }

    /// Make uploads fail with `error`.
    pub async fn set_upload_error(&self, error: InstanceError) {
        *self.upload_error.write().await = Some(error);
    }

    /// Delay every operation by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Delay category creation only, after the call is counted.
    pub async fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.write().await = Some(delay);
    }

    /// Categories currently defined, name -> save path.
    pub async fn categories(&self) -> BTreeMap<String, String> {
        self.categories.read().await.clone()
    }

    /// Categories created through `create_category`.
    pub async fn created_categories(&self) -> Vec<CategoryInfo> {
        self.created.read().await.clone()
    }

    /// Uploads received.
    pub async fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.read().await.clone()
    }

    /// Whether `hash` is currently paused.
    pub async fn is_paused(&self, hash: &str) -> bool {
        self.paused.read().await.contains(hash)
    }

    /// Number of API calls received, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Count the call, apply the delay, and return the configured failure.
    async fn begin_call(&self) -> Result<(), InstanceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.failure.read().await.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn has_torrent(&self, hash: &str) -> bool {
        self.torrents.read().await.iter().any(|t| t.hash == hash)
    }
}

#[async_trait]
impl InstanceApi for MockInstance {
    fn id(&self) -> &InstanceId {
        &self.id
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentRecord>, InstanceError> {
        self.begin_call().await?;
        Ok(self.torrents.read().await.clone())
    }

    async fn get_torrent(&self, hash: &str) -> Result<TorrentRecord, InstanceError> {
        self.begin_call().await?;
        self.torrents
            .read()
            .await
            .iter()
            .find(|t| t.hash == hash)
            .cloned()
            .ok_or_else(|| InstanceError::TorrentNotFound(hash.to_string()))
    }

    async fn list_categories(&self) -> Result<Vec<CategoryInfo>, InstanceError> {
        self.begin_call().await?;
        Ok(self
            .categories
            .read()
            .await
            .iter()
            .map(|(name, path)| CategoryInfo::new(name.clone(), path.clone()))
            .collect())
    }

    async fn create_category(&self, name: &str, save_path: &str) -> Result<(), InstanceError> {
        self.begin_call().await?;
        let delay = *self.create_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.create_error.read().await.clone() {
            return Err(error);
        }
        if name.is_empty() {
            return Err(InstanceError::CategoryNameEmpty);
        }

        let mut categories = self.categories.write().await;
        if categories.contains_key(name) {
            return Err(InstanceError::CategoryConflict(name.to_string()));
        }
        categories.insert(name.to_string(), save_path.to_string());
        self.created
            .write()
            .await
            .push(CategoryInfo::new(name, save_path));
        Ok(())
    }

    async fn upload(&self, files: Vec<UploadFile>, category: &str) -> Result<(), InstanceError> {
        self.begin_call().await?;
        if let Some(error) = self.upload_error.read().await.clone() {
            return Err(error);
        }
        if files.is_empty() {
            return Err(InstanceError::UnsupportedFile("no files".to_string()));
        }

        self.uploads.write().await.push(RecordedUpload {
            filenames: files.iter().map(|f| f.filename.clone()).collect(),
            category: category.to_string(),
            total_bytes: files.iter().map(|f| f.data.len()).sum(),
        });
        Ok(())
    }

    async fn get_trackers(&self, hash: &str) -> Result<Vec<TrackerRecord>, InstanceError> {
        self.begin_call().await?;
        if !self.has_torrent(hash).await {
            return Err(InstanceError::TorrentNotFound(hash.to_string()));
        }
        Ok(self
            .trackers
            .read()
            .await
            .get(hash)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_version(&self) -> Result<String, InstanceError> {
        self.begin_call().await?;
        Ok(self.version.clone())
    }

    async fn list_files(&self, hash: &str) -> Result<Vec<TorrentFile>, InstanceError> {
        self.begin_call().await?;
        if !self.has_torrent(hash).await {
            return Err(InstanceError::TorrentNotFound(hash.to_string()));
        }
        Ok(self.files.read().await.get(hash).cloned().unwrap_or_default())
    }

    async fn pause_torrents(&self, hashes: &[String]) -> Result<(), InstanceError> {
        self.begin_call().await?;
        self.paused.write().await.extend(hashes.iter().cloned());
        Ok(())
    }

    async fn resume_torrents(&self, hashes: &[String]) -> Result<(), InstanceError> {
        self.begin_call().await?;
        let mut paused = self.paused.write().await;
        for hash in hashes {
            paused.remove(hash);
        }
        Ok(())
    }
}

/// Connector handing out mock instances by address.
///
/// Unknown addresses fail with `ConnectionFailed`, like an unreachable host.
#[derive(Default)]
pub struct MockConnector {
    instances: HashMap<InstanceId, Arc<MockInstance>>,
    failures: HashMap<InstanceId, InstanceError>,
    delay: Option<Duration>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `instance` at its own address.
    pub fn with_instance(mut self, instance: Arc<MockInstance>) -> Self {
        self.instances.insert(instance.id().clone(), instance);
        self
    }

    /// Fail connections to `base_address` with `error`.
    pub fn with_failure(mut self, base_address: &str, error: InstanceError) -> Self {
        let id = InstanceId::parse(base_address).expect("valid mock instance address");
        self.failures.insert(id, error);
        self
    }

    /// Delay every connection attempt.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of connection attempts made.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstanceConnector for MockConnector {
    async fn connect(
        &self,
        endpoint: &EndpointConfig,
    ) -> Result<Arc<dyn InstanceApi>, InstanceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let id = InstanceId::parse(&endpoint.url)?;
        if let Some(error) = self.failures.get(&id) {
            return Err(error.clone());
        }
        match self.instances.get(&id) {
            Some(instance) => Ok(Arc::clone(instance) as Arc<dyn InstanceApi>),
            None => Err(InstanceError::ConnectionFailed(format!(
                "{}: connection refused",
                id
            ))),
        }
    }
}
