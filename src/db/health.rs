use super::{PgRepository, RepositoryError};
use async_trait::async_trait;

/// Liveness probe for the relational store.
#[async_trait]
pub trait HealthRepository: Send + Sync {
    /// Round-trip a trivial query.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

#[async_trait]
impl HealthRepository for PgRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
