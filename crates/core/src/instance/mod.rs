//! Per-instance access to qBittorrent.
//!
//! This module provides the `InstanceApi` trait, the seam every fleet-wide
//! operation goes through, plus the reqwest-backed `QBittorrentSession`.

mod qbittorrent;
mod types;

pub use qbittorrent::{QBittorrentConnector, QBittorrentSession};
pub use types::*;
