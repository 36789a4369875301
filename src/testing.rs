//! In-memory collaborators for unit tests.

use crate::api::AppState;
use crate::db::{
    ActivityRepository, CategoryRepository, CommentRepository, DocumentRepository, FavoriteRepository,
    HealthRepository, QuestionRepository, RatingRepository, RepositoryError, SemesterRepository,
    SubjectRepository,
};
use crate::extraction::{ExtractionError, TextExtractor};
use crate::metrics::PortalMetrics;
use crate::models::*;
use crate::search::{SearchError, SearchIndex, SearchResults};
use crate::services::Actor;
use crate::storage::{Blob, ObjectStore, ObjectStoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Poll `condition` until it holds or roughly two seconds pass.
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn student() -> Actor {
    Actor {
        id: Uuid::new_v4(),
        role: Role::Student,
    }
}

pub fn admin() -> Actor {
    Actor {
        id: Uuid::new_v4(),
        role: Role::Admin,
    }
}

fn db_failure() -> RepositoryError {
    RepositoryError::Database(sqlx::Error::PoolTimedOut)
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, (String, String)>,
    semesters: Vec<Semester>,
    subjects: Vec<Subject>,
    teachers: Vec<SubjectTeacher>,
    documents: Vec<Document>,
    categories: Vec<DocumentCategory>,
    favorites: HashSet<(Uuid, FavoriteTarget)>,
    questions: Vec<Question>,
    answers: Vec<Answer>,
    comments: Vec<Comment>,
    ratings: Vec<TeacherRating>,
    activities: Vec<Activity>,
}

impl State {
    fn author(&self, id: Uuid) -> Author {
        let (display_name, email) = self.users.get(&id).cloned().unwrap_or_default();
        Author {
            id,
            display_name,
            email,
        }
    }

    fn subject_detail(&self, subject: Subject) -> SubjectDetail {
        let teachers = self
            .teachers
            .iter()
            .filter(|teacher| teacher.subject_id == subject.id)
            .cloned()
            .collect();
        SubjectDetail { subject, teachers }
    }

    fn with_answers(&self, mut question: Question) -> Question {
        question.answers = self
            .answers
            .iter()
            .filter(|answer| answer.question_id == question.id)
            .cloned()
            .map(|mut answer| {
                answer.document = answer
                    .document_id
                    .and_then(|id| self.documents.iter().find(|doc| doc.id == id).cloned());
                answer
            })
            .collect();
        question
    }

    fn add_teachers(&mut self, subject_id: Uuid, teachers: Vec<NewTeacher>) {
        for teacher in teachers {
            self.teachers.push(SubjectTeacher {
                id: Uuid::new_v4(),
                subject_id,
                teacher_name: teacher.teacher_name,
                topic_cs: teacher.topic_cs,
                created_at: OffsetDateTime::now_utc(),
            });
        }
    }
}

/// Repository backed by vectors behind a mutex.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
    pub fail_document_insert: AtomicBool,
    pub fail_answer_insert: AtomicBool,
    pub fail_document_answer: AtomicBool,
    pub fail_ping: AtomicBool,
    /// Makes the next `find_sentinel` miss, as if another writer inserted after the read.
    pub stale_sentinel_read: AtomicBool,
}

impl MemoryRepository {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn seed_user(&self, display_name: &str, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state()
            .users
            .insert(id, (display_name.to_string(), email.to_string()));
        id
    }

    pub fn seed_semester(&self) -> Semester {
        let now = OffsetDateTime::now_utc();
        let semester = Semester {
            id: Uuid::new_v4(),
            name_cs: "Zimní semestr".into(),
            name_en: "Winter term".into(),
            order_index: 0,
            created_at: now,
            updated_at: now,
        };
        self.state().semesters.push(semester.clone());
        semester
    }

    pub fn seed_subject(&self) -> Subject {
        let semester = self.seed_semester();
        let now = OffsetDateTime::now_utc();
        let subject = Subject {
            id: Uuid::new_v4(),
            semester_id: semester.id,
            name_cs: "Lineární algebra".into(),
            name_en: "Linear algebra".into(),
            code: None,
            description_cs: String::new(),
            description_en: String::new(),
            credits: 5,
            created_at: now,
            updated_at: now,
            is_favorite: false,
        };
        self.state().subjects.push(subject.clone());
        subject
    }

    pub fn seed_teacher(&self, subject_id: Uuid) -> SubjectTeacher {
        let mut state = self.state();
        state.add_teachers(
            subject_id,
            vec![NewTeacher {
                teacher_name: "doc. Novák".into(),
                topic_cs: "Přednášky".into(),
            }],
        );
        state.teachers.last().cloned().unwrap()
    }

    /// Insert a category row verbatim, bypassing every policy.
    pub fn seed_category(
        &self,
        subject_id: Uuid,
        doc_type: DocumentType,
        name_cs: &str,
        name_en: &str,
        order_index: i32,
        is_protected: bool,
    ) -> DocumentCategory {
        let now = OffsetDateTime::now_utc();
        let category = DocumentCategory {
            id: Uuid::new_v4(),
            subject_id,
            doc_type,
            name_cs: name_cs.into(),
            name_en: name_en.into(),
            order_index,
            is_protected,
            created_by: Uuid::nil(),
            created_at: now,
            updated_at: now,
        };
        self.state().categories.push(category.clone());
        category
    }

    pub fn documents(&self) -> Vec<Document> {
        self.state().documents.clone()
    }

    pub fn document(&self, id: Uuid) -> Option<Document> {
        self.state().documents.iter().find(|doc| doc.id == id).cloned()
    }

    pub fn categories_of(&self, subject_id: Uuid, doc_type: DocumentType) -> Vec<DocumentCategory> {
        let mut categories: Vec<_> = self
            .state()
            .categories
            .iter()
            .filter(|category| category.subject_id == subject_id && category.doc_type == doc_type)
            .cloned()
            .collect();
        categories.sort_by_key(|category| category.order_index);
        categories
    }

    pub fn activities(&self) -> Vec<Activity> {
        self.state().activities.clone()
    }
}

#[async_trait]
impl SemesterRepository for MemoryRepository {
    async fn list_semesters(&self) -> Result<Vec<Semester>, RepositoryError> {
        let mut semesters = self.state().semesters.clone();
        semesters.sort_by_key(|semester| semester.order_index);
        Ok(semesters)
    }

    async fn get_semester(&self, id: Uuid) -> Result<Option<Semester>, RepositoryError> {
        Ok(self.state().semesters.iter().find(|s| s.id == id).cloned())
    }

    async fn insert_semester(&self, semester: NewSemester) -> Result<Semester, RepositoryError> {
        let now = OffsetDateTime::now_utc();
        let semester = Semester {
            id: Uuid::new_v4(),
            name_cs: semester.name_cs,
            name_en: semester.name_en,
            order_index: semester.order_index,
            created_at: now,
            updated_at: now,
        };
        self.state().semesters.push(semester.clone());
        Ok(semester)
    }

    async fn update_semester(
        &self,
        id: Uuid,
        changes: &SemesterChanges,
    ) -> Result<Option<Semester>, RepositoryError> {
        let mut state = self.state();
        let Some(semester) = state.semesters.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if let Some(name_cs) = &changes.name_cs {
            semester.name_cs = name_cs.clone();
        }
        if let Some(name_en) = &changes.name_en {
            semester.name_en = name_en.clone();
        }
        if let Some(order_index) = changes.order_index {
            semester.order_index = order_index;
        }
        semester.updated_at = OffsetDateTime::now_utc();
        Ok(Some(semester.clone()))
    }

    async fn delete_semester(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        let before = state.semesters.len();
        state.semesters.retain(|s| s.id != id);
        Ok(state.semesters.len() < before)
    }

    async fn count_semester_subjects(&self, id: Uuid) -> Result<i64, RepositoryError> {
        Ok(self.state().subjects.iter().filter(|s| s.semester_id == id).count() as i64)
    }
}

#[async_trait]
impl SubjectRepository for MemoryRepository {
    async fn list_subjects(
        &self,
        user_id: Uuid,
        semester_id: Option<Uuid>,
    ) -> Result<Vec<Subject>, RepositoryError> {
        let state = self.state();
        let mut subjects: Vec<Subject> = state
            .subjects
            .iter()
            .filter(|subject| semester_id.is_none_or(|id| subject.semester_id == id))
            .cloned()
            .map(|mut subject| {
                subject.is_favorite = state
                    .favorites
                    .contains(&(user_id, FavoriteTarget::Subject(subject.id)));
                subject
            })
            .collect();
        subjects.sort_by(|a, b| {
            b.is_favorite
                .cmp(&a.is_favorite)
                .then_with(|| a.name_cs.cmp(&b.name_cs))
        });
        Ok(subjects)
    }

    async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>, RepositoryError> {
        Ok(self.state().subjects.iter().find(|s| s.id == id).cloned())
    }

    async fn list_subject_ids(&self) -> Result<Vec<Uuid>, RepositoryError> {
        Ok(self.state().subjects.iter().map(|s| s.id).collect())
    }

    async fn list_teachers(&self, subject_id: Uuid) -> Result<Vec<SubjectTeacher>, RepositoryError> {
        Ok(self
            .state()
            .teachers
            .iter()
            .filter(|t| t.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn teacher_exists(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.state().teachers.iter().any(|t| t.id == id))
    }

    async fn insert_subject(&self, subject: NewSubject) -> Result<SubjectDetail, RepositoryError> {
        let now = OffsetDateTime::now_utc();
        let record = Subject {
            id: Uuid::new_v4(),
            semester_id: subject.semester_id,
            name_cs: subject.name_cs,
            name_en: subject.name_en,
            code: subject.code,
            description_cs: subject.description_cs,
            description_en: subject.description_en,
            credits: subject.credits,
            created_at: now,
            updated_at: now,
            is_favorite: false,
        };
        let mut state = self.state();
        state.subjects.push(record.clone());
        state.add_teachers(record.id, subject.teachers);
        Ok(state.subject_detail(record))
    }

    async fn update_subject(
        &self,
        id: Uuid,
        changes: SubjectChanges,
    ) -> Result<Option<SubjectDetail>, RepositoryError> {
        let mut state = self.state();
        let Some(subject) = state.subjects.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if let Some(semester_id) = changes.semester_id {
            subject.semester_id = semester_id;
        }
        if let Some(name_cs) = changes.name_cs {
            subject.name_cs = name_cs;
        }
        if let Some(name_en) = changes.name_en {
            subject.name_en = name_en;
        }
        if let Some(code) = changes.code {
            subject.code = Some(code);
        }
        if let Some(description_cs) = changes.description_cs {
            subject.description_cs = description_cs;
        }
        if let Some(description_en) = changes.description_en {
            subject.description_en = description_en;
        }
        if let Some(credits) = changes.credits {
            subject.credits = credits;
        }
        subject.updated_at = OffsetDateTime::now_utc();
        let subject = subject.clone();
        if let Some(teachers) = changes.teachers {
            state.teachers.retain(|t| t.subject_id != id);
            state.add_teachers(id, teachers);
        }
        Ok(Some(state.subject_detail(subject)))
    }

    async fn delete_subject(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        state.teachers.retain(|t| t.subject_id != id);
        let before = state.subjects.len();
        state.subjects.retain(|s| s.id != id);
        Ok(state.subjects.len() < before)
    }
}

#[async_trait]
impl DocumentRepository for MemoryRepository {
    async fn insert_document(&self, document: NewDocument) -> Result<Document, RepositoryError> {
        if self.fail_document_insert.load(Ordering::SeqCst) {
            return Err(db_failure());
        }
        let record = Document {
            id: document.id,
            subject_id: document.subject_id,
            uploaded_by: document.uploaded_by,
            answer_id: None,
            doc_type: document.doc_type,
            category_id: document.category_id,
            storage_key: document.storage_key,
            original_name: document.original_name,
            file_size: document.file_size,
            mime_type: document.mime_type,
            content_text: document.content_text,
            created_at: OffsetDateTime::now_utc(),
            is_favorite: false,
        };
        self.state().documents.push(record.clone());
        Ok(record)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, RepositoryError> {
        Ok(self.document(id))
    }

    async fn list_documents(
        &self,
        subject_id: Uuid,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Document>, RepositoryError> {
        let state = self.state();
        let mut documents: Vec<Document> = state
            .documents
            .iter()
            .rev()
            .filter(|doc| doc.subject_id == subject_id)
            .cloned()
            .map(|mut doc| {
                doc.is_favorite = state
                    .favorites
                    .contains(&(user_id, FavoriteTarget::Document(doc.id)));
                doc
            })
            .collect();
        documents.sort_by_key(|doc| !doc.is_favorite);
        Ok(documents
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        let before = state.documents.len();
        state.documents.retain(|doc| doc.id != id);
        Ok(state.documents.len() < before)
    }

    async fn set_document_answer(&self, id: Uuid, answer_id: Uuid) -> Result<(), RepositoryError> {
        if self.fail_document_answer.load(Ordering::SeqCst) {
            return Err(db_failure());
        }
        if let Some(doc) = self.state().documents.iter_mut().find(|doc| doc.id == id) {
            doc.answer_id = Some(answer_id);
        }
        Ok(())
    }

    async fn set_document_category(
        &self,
        id: Uuid,
        category_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<(), RepositoryError> {
        if let Some(doc) = self.state().documents.iter_mut().find(|doc| doc.id == id) {
            doc.category_id = Some(category_id);
            doc.doc_type = doc_type;
        }
        Ok(())
    }

    async fn reassign_documents(&self, from: Uuid, to: Uuid) -> Result<u64, RepositoryError> {
        let mut moved = 0;
        for doc in self.state().documents.iter_mut() {
            if doc.category_id == Some(from) {
                doc.category_id = Some(to);
                moved += 1;
            }
        }
        Ok(moved)
    }
}

#[async_trait]
impl CategoryRepository for MemoryRepository {
    async fn list_categories(
        &self,
        subject_id: Uuid,
        doc_type: Option<DocumentType>,
    ) -> Result<Vec<DocumentCategory>, RepositoryError> {
        let mut categories: Vec<_> = self
            .state()
            .categories
            .iter()
            .filter(|c| c.subject_id == subject_id && doc_type.is_none_or(|t| c.doc_type == t))
            .cloned()
            .collect();
        categories.sort_by_key(|c| (c.order_index, c.created_at));
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<DocumentCategory>, RepositoryError> {
        Ok(self.state().categories.iter().find(|c| c.id == id).cloned())
    }

    async fn find_sentinel(
        &self,
        subject_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<Option<DocumentCategory>, RepositoryError> {
        if self.stale_sentinel_read.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let state = self.state();
        let mut matches: Vec<_> = state
            .categories
            .iter()
            .filter(|c| c.subject_id == subject_id && c.doc_type == doc_type && c.is_sentinel())
            .collect();
        matches.sort_by_key(|c| !c.is_protected);
        Ok(matches.first().map(|c| (*c).clone()))
    }

    async fn category_name_taken(
        &self,
        subject_id: Uuid,
        doc_type: DocumentType,
        name_cs: &str,
        name_en: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        Ok(self.state().categories.iter().any(|c| {
            c.subject_id == subject_id
                && c.doc_type == doc_type
                && (c.name_cs == name_cs || name_en.is_some_and(|en| c.name_en == en))
        }))
    }

    async fn max_order_index(
        &self,
        subject_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<Option<i32>, RepositoryError> {
        Ok(self
            .state()
            .categories
            .iter()
            .filter(|c| c.subject_id == subject_id && c.doc_type == doc_type && !c.is_sentinel())
            .map(|c| c.order_index)
            .max())
    }

    async fn insert_category(&self, category: NewCategory) -> Result<DocumentCategory, RepositoryError> {
        let now = OffsetDateTime::now_utc();
        let record = DocumentCategory {
            id: Uuid::new_v4(),
            subject_id: category.subject_id,
            doc_type: category.doc_type,
            name_cs: category.name_cs,
            name_en: category.name_en,
            order_index: category.order_index,
            is_protected: category.is_protected,
            created_by: category.created_by,
            created_at: now,
            updated_at: now,
        };
        self.state().categories.push(record.clone());
        Ok(record)
    }

    async fn insert_sentinel(
        &self,
        category: NewCategory,
    ) -> Result<Option<DocumentCategory>, RepositoryError> {
        let mut state = self.state();
        let taken = state.categories.iter().any(|c| {
            c.subject_id == category.subject_id && c.doc_type == category.doc_type && c.is_protected
        });
        if taken {
            return Ok(None);
        }
        let now = OffsetDateTime::now_utc();
        let record = DocumentCategory {
            id: Uuid::new_v4(),
            subject_id: category.subject_id,
            doc_type: category.doc_type,
            name_cs: category.name_cs,
            name_en: category.name_en,
            order_index: category.order_index,
            is_protected: true,
            created_by: category.created_by,
            created_at: now,
            updated_at: now,
        };
        state.categories.push(record.clone());
        Ok(Some(record))
    }

    async fn update_category(
        &self,
        id: Uuid,
        changes: &CategoryChanges,
    ) -> Result<Option<DocumentCategory>, RepositoryError> {
        let mut state = self.state();
        let Some(category) = state.categories.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(name_cs) = &changes.name_cs {
            category.name_cs = name_cs.clone();
        }
        if let Some(name_en) = &changes.name_en {
            category.name_en = name_en.clone();
        }
        if let Some(order_index) = changes.order_index {
            category.order_index = order_index;
        }
        category.updated_at = OffsetDateTime::now_utc();
        Ok(Some(category.clone()))
    }

    async fn set_category_order(&self, id: Uuid, order_index: i32) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        match state.categories.iter_mut().find(|c| c.id == id) {
            Some(category) => {
                category.order_index = order_index;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pin_sentinel(&self, id: Uuid) -> Result<(), RepositoryError> {
        if let Some(category) = self.state().categories.iter_mut().find(|c| c.id == id) {
            category.is_protected = true;
            category.order_index = SENTINEL_ORDER_INDEX;
        }
        Ok(())
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        Ok(state.categories.len() < before)
    }
}

#[async_trait]
impl FavoriteRepository for MemoryRepository {
    async fn is_favorite(&self, user_id: Uuid, target: FavoriteTarget) -> Result<bool, RepositoryError> {
        Ok(self.state().favorites.contains(&(user_id, target)))
    }

    async fn add_favorite(&self, user_id: Uuid, target: FavoriteTarget) -> Result<(), RepositoryError> {
        self.state().favorites.insert((user_id, target));
        Ok(())
    }

    async fn remove_favorite(&self, user_id: Uuid, target: FavoriteTarget) -> Result<(), RepositoryError> {
        self.state().favorites.remove(&(user_id, target));
        Ok(())
    }

    async fn favorite_subjects(&self, user_id: Uuid) -> Result<Vec<Subject>, RepositoryError> {
        let state = self.state();
        Ok(state
            .subjects
            .iter()
            .filter(|s| state.favorites.contains(&(user_id, FavoriteTarget::Subject(s.id))))
            .cloned()
            .map(|mut s| {
                s.is_favorite = true;
                s
            })
            .collect())
    }

    async fn favorite_documents(&self, user_id: Uuid) -> Result<Vec<Document>, RepositoryError> {
        let state = self.state();
        Ok(state
            .documents
            .iter()
            .filter(|d| state.favorites.contains(&(user_id, FavoriteTarget::Document(d.id))))
            .cloned()
            .map(|mut d| {
                d.is_favorite = true;
                d
            })
            .collect())
    }
}

#[async_trait]
impl QuestionRepository for MemoryRepository {
    async fn list_questions(&self, subject_id: Uuid) -> Result<Vec<Question>, RepositoryError> {
        let state = self.state();
        Ok(state
            .questions
            .iter()
            .rev()
            .filter(|q| q.subject_id == subject_id)
            .cloned()
            .map(|q| state.with_answers(q))
            .collect())
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, RepositoryError> {
        Ok(self.state().questions.iter().find(|q| q.id == id).cloned())
    }

    async fn insert_question(&self, question: NewQuestion) -> Result<Question, RepositoryError> {
        let now = OffsetDateTime::now_utc();
        let mut state = self.state();
        let record = Question {
            id: Uuid::new_v4(),
            subject_id: question.subject_id,
            user_id: question.user_id,
            content: question.content,
            is_anonymous: question.is_anonymous,
            created_at: now,
            updated_at: now,
            user: state.author(question.user_id),
            answers: Vec::new(),
        };
        state.questions.push(record.clone());
        Ok(record)
    }

    async fn insert_answer(&self, answer: NewAnswer) -> Result<Answer, RepositoryError> {
        if self.fail_answer_insert.load(Ordering::SeqCst) {
            return Err(db_failure());
        }
        let now = OffsetDateTime::now_utc();
        let mut state = self.state();
        let document = answer
            .document_id
            .and_then(|id| state.documents.iter().find(|d| d.id == id).cloned());
        let record = Answer {
            id: Uuid::new_v4(),
            question_id: answer.question_id,
            user_id: answer.user_id,
            content: answer.content,
            document_id: answer.document_id,
            created_at: now,
            updated_at: now,
            user: state.author(answer.user_id),
            document: None,
        };
        state.answers.push(record.clone());
        Ok(Answer { document, ..record })
    }

    async fn delete_question(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        state.answers.retain(|a| a.question_id != id);
        let before = state.questions.len();
        state.questions.retain(|q| q.id != id);
        Ok(state.questions.len() < before)
    }
}

#[async_trait]
impl CommentRepository for MemoryRepository {
    async fn list_comments(&self, subject_id: Uuid) -> Result<Vec<Comment>, RepositoryError> {
        Ok(self
            .state()
            .comments
            .iter()
            .rev()
            .filter(|c| c.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, RepositoryError> {
        Ok(self.state().comments.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, RepositoryError> {
        let now = OffsetDateTime::now_utc();
        let mut state = self.state();
        let record = Comment {
            id: Uuid::new_v4(),
            subject_id: comment.subject_id,
            user_id: comment.user_id,
            content: comment.content,
            is_anonymous: comment.is_anonymous,
            created_at: now,
            updated_at: now,
            user: state.author(comment.user_id),
        };
        state.comments.push(record.clone());
        Ok(record)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        let before = state.comments.len();
        state.comments.retain(|c| c.id != id);
        Ok(state.comments.len() < before)
    }
}

#[async_trait]
impl RatingRepository for MemoryRepository {
    async fn get_rating(&self, teacher_id: Uuid, user_id: Uuid) -> Result<Option<TeacherRating>, RepositoryError> {
        Ok(self
            .state()
            .ratings
            .iter()
            .find(|r| r.subject_teacher_id == teacher_id && r.user_id == user_id)
            .cloned())
    }

    async fn insert_rating(
        &self,
        teacher_id: Uuid,
        user_id: Uuid,
        rating: i32,
    ) -> Result<TeacherRating, RepositoryError> {
        let now = OffsetDateTime::now_utc();
        let record = TeacherRating {
            id: Uuid::new_v4(),
            subject_teacher_id: teacher_id,
            user_id,
            rating,
            created_at: now,
            updated_at: now,
        };
        self.state().ratings.push(record.clone());
        Ok(record)
    }

    async fn update_rating(&self, id: Uuid, rating: i32) -> Result<TeacherRating, RepositoryError> {
        let mut state = self.state();
        let record = state
            .ratings
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RepositoryError::Database(sqlx::Error::RowNotFound))?;
        record.rating = rating;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_rating(&self, teacher_id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        let before = state.ratings.len();
        state
            .ratings
            .retain(|r| !(r.subject_teacher_id == teacher_id && r.user_id == user_id));
        Ok(state.ratings.len() < before)
    }

    async fn rating_stats(&self, teacher_id: Uuid) -> Result<RatingStats, RepositoryError> {
        let state = self.state();
        let ratings: Vec<i32> = state
            .ratings
            .iter()
            .filter(|r| r.subject_teacher_id == teacher_id)
            .map(|r| r.rating)
            .collect();
        let total = ratings.len() as i64;
        let average = if total == 0 {
            0.0
        } else {
            ratings.iter().map(|r| f64::from(*r)).sum::<f64>() / total as f64
        };
        let distribution = (1..=5)
            .map(|value| (value, ratings.iter().filter(|r| **r == value).count() as i64))
            .filter(|(_, count)| *count > 0)
            .collect();
        Ok(RatingStats {
            average,
            total,
            distribution,
        })
    }
}

#[async_trait]
impl ActivityRepository for MemoryRepository {
    async fn insert_activity(&self, activity: NewActivity) -> Result<Activity, RepositoryError> {
        let record = Activity {
            id: Uuid::new_v4(),
            user_id: activity.user_id,
            activity_type: activity.activity_type,
            subject_id: activity.subject_id,
            document_id: activity.document_id,
            metadata: activity.metadata,
            created_at: OffsetDateTime::now_utc(),
        };
        self.state().activities.push(record.clone());
        Ok(record)
    }

    async fn recent_activities(&self, limit: i64) -> Result<Vec<Activity>, RepositoryError> {
        Ok(self
            .state()
            .activities
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HealthRepository for MemoryRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(db_failure());
        }
        Ok(())
    }
}

/// Object store backed by a map.
#[derive(Default)]
pub struct MemoryObjectStore {
    blobs: Mutex<HashMap<String, (Vec<u8>, String)>>,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl MemoryObjectStore {
    pub fn contains(&self, key: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

fn store_offline() -> ObjectStoreError {
    ObjectStoreError::Io(std::io::Error::other("object store offline"))
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), ObjectStoreError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(store_offline());
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Blob, ObjectStoreError> {
        self.blobs
            .lock()
            .unwrap()
            .get(key)
            .map(|(bytes, content_type)| Blob {
                bytes: bytes.clone(),
                content_type: Some(content_type.clone()),
            })
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(store_offline());
        }
        self.blobs.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Default)]
struct SearchLog {
    indexed_documents: Vec<Uuid>,
    deleted_documents: Vec<Uuid>,
    indexed_subjects: Vec<Uuid>,
    deleted_subjects: Vec<Uuid>,
    queries: Vec<(String, Option<Uuid>)>,
}

/// Search index that records calls and returns canned hits.
#[derive(Default)]
pub struct RecordingSearchIndex {
    log: Mutex<SearchLog>,
    hits: Mutex<Vec<Value>>,
    pub fail: AtomicBool,
}

impl RecordingSearchIndex {
    pub fn set_hits(&self, hits: Vec<Value>) {
        *self.hits.lock().unwrap() = hits;
    }

    pub fn indexed_documents(&self) -> Vec<Uuid> {
        self.log.lock().unwrap().indexed_documents.clone()
    }

    pub fn deleted_documents(&self) -> Vec<Uuid> {
        self.log.lock().unwrap().deleted_documents.clone()
    }

    pub fn indexed_subjects(&self) -> Vec<Uuid> {
        self.log.lock().unwrap().indexed_subjects.clone()
    }

    pub fn deleted_subjects(&self) -> Vec<Uuid> {
        self.log.lock().unwrap().deleted_subjects.clone()
    }

    pub fn queries(&self) -> Vec<(String, Option<Uuid>)> {
        self.log.lock().unwrap().queries.clone()
    }

    fn check(&self) -> Result<(), SearchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SearchError::InvalidUrl("search offline".into()));
        }
        Ok(())
    }

    fn results(&self, query: &str, filter: Option<Uuid>) -> Result<SearchResults, SearchError> {
        self.check()?;
        self.log
            .lock()
            .unwrap()
            .queries
            .push((query.to_string(), filter));
        Ok(SearchResults {
            hits: self.hits.lock().unwrap().clone(),
            query: query.to_string(),
            estimated_total_hits: None,
            processing_time_ms: None,
        })
    }
}

#[async_trait]
impl SearchIndex for RecordingSearchIndex {
    async fn index_document(&self, document: &Document) -> Result<(), SearchError> {
        self.check()?;
        self.log.lock().unwrap().indexed_documents.push(document.id);
        Ok(())
    }

    async fn delete_document(&self, id: Uuid) -> Result<(), SearchError> {
        self.check()?;
        self.log.lock().unwrap().deleted_documents.push(id);
        Ok(())
    }

    async fn search_documents(
        &self,
        query: &str,
        subject_id: Option<Uuid>,
    ) -> Result<SearchResults, SearchError> {
        self.results(query, subject_id)
    }

    async fn index_subject(&self, subject: &Subject) -> Result<(), SearchError> {
        self.check()?;
        self.log.lock().unwrap().indexed_subjects.push(subject.id);
        Ok(())
    }

    async fn delete_subject(&self, id: Uuid) -> Result<(), SearchError> {
        self.check()?;
        self.log.lock().unwrap().deleted_subjects.push(id);
        Ok(())
    }

    async fn search_subjects(
        &self,
        query: &str,
        semester_id: Option<Uuid>,
    ) -> Result<SearchResults, SearchError> {
        self.results(query, semester_id)
    }
}

/// Extractor returning fixed text, or failing when built with [`StubExtractor::failing`].
pub struct StubExtractor {
    text: Option<String>,
    calls: AtomicUsize,
}

impl StubExtractor {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            text: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextExtractor for StubExtractor {
    async fn extract(&self, _bytes: &[u8], _mime_type: &str) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text
            .clone()
            .ok_or_else(|| ExtractionError::InvalidUrl("extractor offline".into()))
    }
}

/// Every fake wired together.
pub struct Harness {
    pub repo: Arc<MemoryRepository>,
    pub store: Arc<MemoryObjectStore>,
    pub search: Arc<RecordingSearchIndex>,
    pub extractor: Arc<StubExtractor>,
    pub metrics: Arc<PortalMetrics>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_extractor(StubExtractor::returning("extracted text"))
    }

    pub fn with_extractor(extractor: StubExtractor) -> Self {
        Self {
            repo: Arc::new(MemoryRepository::default()),
            store: Arc::new(MemoryObjectStore::default()),
            search: Arc::new(RecordingSearchIndex::default()),
            extractor: Arc::new(extractor),
            metrics: Arc::new(PortalMetrics::new()),
        }
    }

    pub fn state(&self) -> AppState {
        AppState::new(
            self.repo.clone(),
            self.store.clone(),
            self.search.clone(),
            self.extractor.clone(),
            self.metrics.clone(),
        )
    }
}
