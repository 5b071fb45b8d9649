//! Testing utilities and mock implementations.
//!
//! This module provides an in-memory `InstanceApi` and a matching connector,
//! so fleet behaviour can be exercised without running qBittorrent.
//!
//! # Example
//!
//! ```rust,ignore
//! use qbfleet_core::testing::{fixtures, MockInstance};
//!
//! let qb1 = Arc::new(MockInstance::new("http://qb1:8080"));
//! qb1.add_category("movies", "/data/movies").await;
//! qb1.add_torrent(fixtures::torrent(qb1.id(), "abcd", "Some Movie")).await;
//!
//! let registry = InstanceRegistry::from_sessions(vec![qb1.clone() as Arc<dyn InstanceApi>]);
//! ```

mod mock_instance;

pub use mock_instance::{MockConnector, MockInstance, RecordedUpload};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::config::EndpointConfig;
    use crate::instance::{InstanceId, TorrentRecord, TrackerRecord, TrackerStatus};

    /// A torrent with reasonable defaults living on `instance`.
    pub fn torrent(instance: &InstanceId, hash: &str, name: &str) -> TorrentRecord {
        TorrentRecord {
            hash: hash.to_string(),
            name: name.to_string(),
            category: None,
            content_path: format!("/downloads/{}", name),
            save_path: "/downloads".to_string(),
            ratio: 1.0,
            size_bytes: 1024 * 1024 * 100, // 100 MB
            progress: 1.0,
            state: "stalledUP".to_string(),
            added_at: None,
            instance: instance.clone(),
        }
    }

    /// A torrent filed under `category`.
    pub fn categorized_torrent(
        instance: &InstanceId,
        hash: &str,
        name: &str,
        category: &str,
    ) -> TorrentRecord {
        TorrentRecord {
            category: Some(category.to_string()),
            save_path: format!("/data/{}", category),
            ..torrent(instance, hash, name)
        }
    }

    /// A working tracker entry with the given message.
    pub fn tracker(url: &str, message: &str) -> TrackerRecord {
        TrackerRecord {
            url: url.to_string(),
            status: TrackerStatus::Working,
            tier: 0,
            message: message.to_string(),
            seeds: 10,
            peers: 2,
            leeches: 1,
            downloaded: 100,
        }
    }

    /// Endpoint config pointing at `url`.
    pub fn endpoint(url: &str) -> EndpointConfig {
        EndpointConfig {
            url: url.to_string(),
            username: "admin".to_string(),
            password: "adminadmin".to_string(),
            timeout_secs: 5,
        }
    }
}
