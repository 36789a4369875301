use super::{PgRepository, RepositoryError};
use crate::models::{Activity, NewActivity};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

const ACTIVITY_COLUMNS: &str = "id, user_id, activity_type, subject_id, document_id, metadata, created_at";

/// Persistence for the activity feed.
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Record one activity.
    async fn insert_activity(&self, activity: NewActivity) -> Result<Activity, RepositoryError>;

    /// Most recent activities, newest first.
    async fn recent_activities(&self, limit: i64) -> Result<Vec<Activity>, RepositoryError>;
}

fn activity_from_row(row: &PgRow) -> Result<Activity, RepositoryError> {
    let activity_type: String = row.try_get("activity_type")?;
    Ok(Activity {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        activity_type: activity_type.parse()?,
        subject_id: row.try_get("subject_id")?,
        document_id: row.try_get("document_id")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ActivityRepository for PgRepository {
    async fn insert_activity(&self, activity: NewActivity) -> Result<Activity, RepositoryError> {
        let row = sqlx::query(&format!(
            "INSERT INTO activities (id, user_id, activity_type, subject_id, document_id, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ACTIVITY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(activity.user_id)
        .bind(activity.activity_type.as_str())
        .bind(activity.subject_id)
        .bind(activity.document_id)
        .bind(&activity.metadata)
        .fetch_one(&self.pool)
        .await?;
        activity_from_row(&row)
    }

    async fn recent_activities(&self, limit: i64) -> Result<Vec<Activity>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(activity_from_row).collect()
    }
}
