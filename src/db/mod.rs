//! Relational persistence for every portal entity.
//!
//! Each entity area gets its own repository trait so coordinators can depend on
//! exactly the slice they use. [`PgRepository`] implements all of them over a
//! bounded Postgres pool; tests substitute in-memory fakes.

pub mod activities;
pub mod categories;
pub mod comments;
pub mod documents;
pub mod favorites;
pub mod health;
pub mod questions;
pub mod ratings;
pub mod semesters;
pub mod subjects;

use crate::config::Config;
use crate::models::UnknownVariant;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use thiserror::Error;

pub use activities::ActivityRepository;
pub use categories::CategoryRepository;
pub use comments::CommentRepository;
pub use documents::DocumentRepository;
pub use favorites::FavoriteRepository;
pub use health::HealthRepository;
pub use questions::QuestionRepository;
pub use ratings::RatingRepository;
pub use semesters::SemesterRepository;
pub use subjects::SubjectRepository;

/// Errors returned by the relational store.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Query or connection failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    /// Stored value could not be mapped onto a domain type.
    #[error("Corrupt row: {0}")]
    Decode(#[from] UnknownVariant),
}

impl RepositoryError {
    /// Whether the failure was a unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Database(sqlx::Error::Database(err)) if err.is_unique_violation())
    }
}

/// Every repository slice the portal needs.
pub trait Repository:
    SemesterRepository
    + SubjectRepository
    + DocumentRepository
    + CategoryRepository
    + FavoriteRepository
    + QuestionRepository
    + CommentRepository
    + RatingRepository
    + ActivityRepository
    + HealthRepository
{
}

impl<T> Repository for T where
    T: SemesterRepository
        + SubjectRepository
        + DocumentRepository
        + CategoryRepository
        + FavoriteRepository
        + QuestionRepository
        + CommentRepository
        + RatingRepository
        + ActivityRepository
        + HealthRepository
{
}

/// Postgres-backed implementation of every repository trait.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Open a bounded connection pool.
pub async fn connect(config: &Config) -> Result<PgPool, RepositoryError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_idle)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await?;
    tracing::info!(
        max_connections = config.database_max_connections,
        min_idle = config.database_min_idle,
        "Connected to Postgres"
    );
    Ok(pool)
}

/// Apply pending schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), RepositoryError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
