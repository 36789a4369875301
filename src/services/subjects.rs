//! Semester and subject catalogue.

use super::{CategoryPolicy, ServiceError, require_text, spawn_detached};
use crate::db::{Repository, RepositoryError};
use crate::metrics::PortalMetrics;
use crate::models::{
    NewSemester, NewSubject, Semester, SemesterChanges, SemesterDetail, Subject, SubjectChanges,
    SubjectDetail,
};
use crate::search::{SearchIndex, SearchResults};
use std::sync::Arc;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 200;

fn invalid_semester() -> ServiceError {
    ServiceError::InvalidReference {
        code: "INVALID_SEMESTER",
        message: "Semester does not exist".into(),
    }
}

fn duplicate_code(err: RepositoryError) -> ServiceError {
    if err.is_unique_violation() {
        ServiceError::Conflict("A subject with this code already exists".into())
    } else {
        err.into()
    }
}

#[derive(Clone)]
pub struct SubjectService {
    repo: Arc<dyn Repository>,
    search: Arc<dyn SearchIndex>,
    categories: CategoryPolicy,
    metrics: Arc<PortalMetrics>,
}

impl SubjectService {
    pub fn new(repo: Arc<dyn Repository>, search: Arc<dyn SearchIndex>, metrics: Arc<PortalMetrics>) -> Self {
        Self {
            categories: CategoryPolicy::new(repo.clone()),
            repo,
            search,
            metrics,
        }
    }

    pub async fn list_semesters(&self) -> Result<Vec<Semester>, ServiceError> {
        Ok(self.repo.list_semesters().await?)
    }

    /// A semester with its subjects, the caller's favorites first.
    pub async fn semester(&self, id: Uuid, user_id: Uuid) -> Result<SemesterDetail, ServiceError> {
        let semester = self
            .repo
            .get_semester(id)
            .await?
            .ok_or(ServiceError::NotFound("Semester"))?;
        let subjects = self.repo.list_subjects(user_id, Some(id)).await?;
        Ok(SemesterDetail { semester, subjects })
    }

    pub async fn create_semester(&self, mut semester: NewSemester) -> Result<Semester, ServiceError> {
        semester.name_cs = require_text(&semester.name_cs, "name_cs", MAX_NAME_LEN)?;
        semester.name_en = semester.name_en.trim().to_string();
        Ok(self.repo.insert_semester(semester).await?)
    }

    pub async fn update_semester(&self, id: Uuid, mut changes: SemesterChanges) -> Result<Semester, ServiceError> {
        if let Some(name_cs) = &changes.name_cs {
            changes.name_cs = Some(require_text(name_cs, "name_cs", MAX_NAME_LEN)?);
        }
        self.repo
            .update_semester(id, &changes)
            .await?
            .ok_or(ServiceError::NotFound("Semester"))
    }

    /// Delete an empty semester.
    pub async fn delete_semester(&self, id: Uuid) -> Result<(), ServiceError> {
        let subjects = self.repo.count_semester_subjects(id).await?;
        if subjects > 0 {
            return Err(ServiceError::Conflict(format!(
                "Semester still has {subjects} subject(s)"
            )));
        }
        if !self.repo.delete_semester(id).await? {
            return Err(ServiceError::NotFound("Semester"));
        }
        Ok(())
    }

    pub async fn list_subjects(&self, user_id: Uuid, semester_id: Option<Uuid>) -> Result<Vec<Subject>, ServiceError> {
        Ok(self.repo.list_subjects(user_id, semester_id).await?)
    }

    /// A subject with its teachers.
    pub async fn subject(&self, id: Uuid) -> Result<SubjectDetail, ServiceError> {
        let subject = self
            .repo
            .get_subject(id)
            .await?
            .ok_or(ServiceError::NotFound("Subject"))?;
        let teachers = self.repo.list_teachers(id).await?;
        Ok(SubjectDetail { subject, teachers })
    }

    /// Create a subject with its teachers, seed its protected categories, and index it.
    pub async fn create_subject(&self, mut subject: NewSubject, created_by: Uuid) -> Result<SubjectDetail, ServiceError> {
        subject.name_cs = require_text(&subject.name_cs, "name_cs", MAX_NAME_LEN)?;
        subject.code = subject
            .code
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty());
        if subject.teachers.iter().any(|t| t.teacher_name.trim().is_empty()) {
            return Err(ServiceError::Validation("teacher_name is required".into()));
        }
        if self.repo.get_semester(subject.semester_id).await?.is_none() {
            return Err(invalid_semester());
        }

        let detail = self
            .repo
            .insert_subject(subject)
            .await
            .map_err(duplicate_code)?;
        self.categories
            .ensure_subject_sentinels(detail.subject.id, created_by)
            .await?;
        tracing::info!(subject_id = %detail.subject.id, "Subject created");

        self.index_detached(detail.subject.clone());
        Ok(detail)
    }

    /// Apply a partial update; a present teacher list replaces the whole set.
    pub async fn update_subject(&self, id: Uuid, mut changes: SubjectChanges) -> Result<SubjectDetail, ServiceError> {
        if let Some(name_cs) = &changes.name_cs {
            changes.name_cs = Some(require_text(name_cs, "name_cs", MAX_NAME_LEN)?);
        }
        if let Some(semester_id) = changes.semester_id {
            if self.repo.get_semester(semester_id).await?.is_none() {
                return Err(invalid_semester());
            }
        }
        if changes
            .teachers
            .as_ref()
            .is_some_and(|teachers| teachers.iter().any(|t| t.teacher_name.trim().is_empty()))
        {
            return Err(ServiceError::Validation("teacher_name is required".into()));
        }

        let detail = self
            .repo
            .update_subject(id, changes)
            .await
            .map_err(duplicate_code)?
            .ok_or(ServiceError::NotFound("Subject"))?;
        self.index_detached(detail.subject.clone());
        Ok(detail)
    }

    pub async fn delete_subject(&self, id: Uuid) -> Result<(), ServiceError> {
        if !self.repo.delete_subject(id).await? {
            return Err(ServiceError::NotFound("Subject"));
        }
        tracing::info!(subject_id = %id, "Subject deleted");

        let search = self.search.clone();
        spawn_detached("unindex_subject", self.metrics.clone(), async move {
            search.delete_subject(id).await
        });
        Ok(())
    }

    pub async fn search(&self, query: &str, semester_id: Option<Uuid>) -> Result<SearchResults, ServiceError> {
        Ok(self.search.search_subjects(query, semester_id).await?)
    }

    fn index_detached(&self, subject: Subject) {
        let search = self.search.clone();
        spawn_detached("index_subject", self.metrics.clone(), async move {
            search.index_subject(&subject).await
        });
    }
}
