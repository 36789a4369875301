use super::{ServiceError, spawn_detached};
use crate::db::Repository;
use crate::metrics::PortalMetrics;
use crate::models::{Activity, NewActivity};
use std::sync::Arc;

/// Feed size when the caller does not ask for one.
pub const DEFAULT_FEED_LIMIT: i64 = 10;
/// Largest feed a caller may request.
pub const MAX_FEED_LIMIT: i64 = 50;

/// Writes and reads the activity feed.
#[derive(Clone)]
pub struct ActivityRecorder {
    repo: Arc<dyn Repository>,
    metrics: Arc<PortalMetrics>,
}

impl ActivityRecorder {
    pub fn new(repo: Arc<dyn Repository>, metrics: Arc<PortalMetrics>) -> Self {
        Self { repo, metrics }
    }

    /// Record an activity in the background.
    pub fn record_detached(&self, activity: NewActivity) {
        let repo = self.repo.clone();
        spawn_detached("record_activity", self.metrics.clone(), async move {
            repo.insert_activity(activity).await.map(|_| ())
        });
    }

    /// Most recent activities, newest first.
    pub async fn recent(&self, limit: Option<i64>) -> Result<Vec<Activity>, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT);
        Ok(self.repo.recent_activities(limit).await?)
    }
}
