//! Abandoned torrent detection.
//!
//! A torrent is abandoned when one of its trackers reports that the torrent
//! has been deleted upstream.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::fanout::{fan_out, FanOut};
use crate::instance::{InstanceApi, InstanceError, TorrentRecord};

/// Tracker lookups in flight per instance.
const TRACKER_CONCURRENCY: usize = 8;

/// A torrent whose tracker reports it as deleted.
#[derive(Debug, Clone, Serialize)]
pub struct AbandonedTorrent {
    pub torrent: TorrentRecord,
    pub tracker_url: String,
    pub message: String,
}

/// Find abandoned torrents on every instance.
///
/// Each instance lists its torrents and then queries their trackers. A failure
/// anywhere in that sequence fails that instance only.
pub async fn find_abandoned(
    instances: &[Arc<dyn InstanceApi>],
    cancel: &CancellationToken,
) -> FanOut<AbandonedTorrent> {
    fan_out("find_abandoned", instances, cancel, abandoned_on).await
}

async fn abandoned_on(
    instance: Arc<dyn InstanceApi>,
) -> Result<Vec<AbandonedTorrent>, InstanceError> {
    let torrents = instance.list_torrents().await?;

    let found: Vec<Option<AbandonedTorrent>> = stream::iter(torrents)
        .map(|torrent| check_trackers(Arc::clone(&instance), torrent))
        .buffered(TRACKER_CONCURRENCY)
        .try_collect()
        .await?;

    Ok(found.into_iter().flatten().collect())
}

/// The first tracker reporting the torrent as deleted, if any.
async fn check_trackers(
    instance: Arc<dyn InstanceApi>,
    torrent: TorrentRecord,
) -> Result<Option<AbandonedTorrent>, InstanceError> {
    let trackers = instance.get_trackers(&torrent.hash).await?;
    Ok(trackers
        .into_iter()
        .find(|t| t.reports_deleted())
        .map(|t| AbandonedTorrent {
            torrent,
            tracker_url: t.url,
            message: t.message,
        }))
}
