//! Domain records shared by the repositories, coordinators, and HTTP surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Czech label of the protected per-(subject, type) category.
pub const SENTINEL_NAME_CS: &str = "Nepřiřazeno";
/// English label of the protected per-(subject, type) category.
pub const SENTINEL_NAME_EN: &str = "Unassigned";
/// Order index the protected category is pinned to so it always sorts last.
pub const SENTINEL_ORDER_INDEX: i32 = 999;

/// Display name substituted for authors who posted anonymously.
pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous Student";

/// Raised when a stored or supplied enum literal is not recognised.
#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Role carried by an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular portal user.
    Student,
    /// Portal administrator.
    Admin,
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

/// Partition tag shared by documents and their categories.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Lecture material.
    Lecture,
    /// Seminar material.
    Seminar,
    /// Anything else, including answer attachments.
    #[default]
    Other,
}

impl DocumentType {
    /// Every type, in display order.
    pub const ALL: [DocumentType; 3] = [Self::Lecture, Self::Seminar, Self::Other];

    /// Stable lowercase literal used in storage and JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lecture => "lecture",
            Self::Seminar => "seminar",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lecture" => Ok(Self::Lecture),
            "seminar" => Ok(Self::Seminar),
            "other" => Ok(Self::Other),
            other => Err(UnknownVariant::new("document type", other)),
        }
    }
}

/// Kind of user action recorded in the activity feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// A document was uploaded.
    DocumentUploaded,
    /// A document was deleted.
    DocumentDeleted,
}

impl ActivityType {
    /// Stable literal used in storage and JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DocumentUploaded => "document_uploaded",
            Self::DocumentDeleted => "document_deleted",
        }
    }
}

impl FromStr for ActivityType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document_uploaded" => Ok(Self::DocumentUploaded),
            "document_deleted" => Ok(Self::DocumentDeleted),
            other => Err(UnknownVariant::new("activity type", other)),
        }
    }
}

/// Public projection of a user attached to authored content.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Author {
    /// User identifier.
    pub id: Uuid,
    /// Display name, replaced for anonymous posts.
    pub display_name: String,
    /// Email, blanked for anonymous posts.
    pub email: String,
}

impl Author {
    fn anonymise(&mut self) {
        self.display_name = ANONYMOUS_DISPLAY_NAME.to_string();
        self.email.clear();
    }
}

/// Uploaded file persisted in the object store and described in the relational store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub uploaded_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub category_id: Option<Uuid>,
    /// Object-store key; never derived from the original filename.
    pub storage_key: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Computed per caller; not a stored column.
    pub is_favorite: bool,
}

/// Insert payload for [`Document`].
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub uploaded_by: Uuid,
    pub doc_type: DocumentType,
    pub category_id: Option<Uuid>,
    pub storage_key: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub content_text: String,
}

/// Per-(subject, type) grouping of documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentCategory {
    pub id: Uuid,
    pub subject_id: Uuid,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub name_cs: String,
    pub name_en: String,
    pub order_index: i32,
    pub is_protected: bool,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl DocumentCategory {
    /// Whether this is the protected "Unassigned" bucket.
    ///
    /// Rows written before the flag existed are recognised by either label.
    pub fn is_sentinel(&self) -> bool {
        self.is_protected || is_sentinel_name(&self.name_cs) || is_sentinel_name(&self.name_en)
    }
}

/// Whether `name` equals one of the reserved "Unassigned" labels.
pub fn is_sentinel_name(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed == SENTINEL_NAME_CS || trimmed == SENTINEL_NAME_EN
}

/// Insert payload for [`DocumentCategory`].
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub subject_id: Uuid,
    pub doc_type: DocumentType,
    pub name_cs: String,
    pub name_en: String,
    pub order_index: i32,
    pub is_protected: bool,
    pub created_by: Uuid,
}

impl NewCategory {
    /// The protected bucket for a (subject, type) pair.
    pub fn sentinel(subject_id: Uuid, doc_type: DocumentType, created_by: Uuid) -> Self {
        Self {
            subject_id,
            doc_type,
            name_cs: SENTINEL_NAME_CS.to_string(),
            name_en: SENTINEL_NAME_EN.to_string(),
            order_index: SENTINEL_ORDER_INDEX,
            is_protected: true,
            created_by,
        }
    }
}

/// Partial update applied to a category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryChanges {
    #[serde(default)]
    pub name_cs: Option<String>,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub order_index: Option<i32>,
}

impl CategoryChanges {
    /// Whether the update touches either label.
    pub fn renames(&self) -> bool {
        self.name_cs.is_some() || self.name_en.is_some()
    }

    /// Whether the update carries no changes at all.
    pub fn is_empty(&self) -> bool {
        !self.renames() && self.order_index.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Semester {
    pub id: Uuid,
    pub name_cs: String,
    pub name_en: String,
    pub order_index: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSemester {
    pub name_cs: String,
    #[serde(default)]
    pub name_en: String,
    #[serde(default)]
    pub order_index: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SemesterChanges {
    #[serde(default)]
    pub name_cs: Option<String>,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub order_index: Option<i32>,
}

/// Semester together with its subjects.
#[derive(Debug, Clone, Serialize)]
pub struct SemesterDetail {
    #[serde(flatten)]
    pub semester: Semester,
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subject {
    pub id: Uuid,
    pub semester_id: Uuid,
    pub name_cs: String,
    pub name_en: String,
    pub code: Option<String>,
    pub description_cs: String,
    pub description_en: String,
    pub credits: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTeacher {
    pub teacher_name: String,
    #[serde(default)]
    pub topic_cs: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectTeacher {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub teacher_name: String,
    pub topic_cs: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubject {
    pub semester_id: Uuid,
    pub name_cs: String,
    #[serde(default)]
    pub name_en: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description_cs: String,
    #[serde(default)]
    pub description_en: String,
    #[serde(default)]
    pub credits: i32,
    #[serde(default)]
    pub teachers: Vec<NewTeacher>,
}

/// Partial update applied to a subject. A present `teachers` list replaces the whole set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectChanges {
    #[serde(default)]
    pub semester_id: Option<Uuid>,
    #[serde(default)]
    pub name_cs: Option<String>,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description_cs: Option<String>,
    #[serde(default)]
    pub description_en: Option<String>,
    #[serde(default)]
    pub credits: Option<i32>,
    #[serde(default)]
    pub teachers: Option<Vec<NewTeacher>>,
}

/// Subject together with its teachers.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectDetail {
    #[serde(flatten)]
    pub subject: Subject,
    pub teachers: Vec<SubjectTeacher>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub is_anonymous: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub user: Author,
    pub answers: Vec<Answer>,
}

impl Question {
    /// Hide the author when the question was posted anonymously.
    pub fn sanitize(mut self) -> Self {
        if self.is_anonymous {
            self.user.anonymise();
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub subject_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub id: Uuid,
    pub question_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub document_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub user: Author,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
}

#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub question_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub document_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub is_anonymous: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub user: Author,
}

impl Comment {
    /// Hide the author when the comment was posted anonymously.
    pub fn sanitize(mut self) -> Self {
        if self.is_anonymous {
            self.user.anonymise();
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub subject_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeacherRating {
    pub id: Uuid,
    pub subject_teacher_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Raw aggregate over a teacher's ratings.
#[derive(Debug, Clone, Default)]
pub struct RatingStats {
    pub average: f64,
    pub total: i64,
    /// `(rating, count)` pairs for every rating value that occurs.
    pub distribution: Vec<(i32, i64)>,
}

/// Rating aggregate returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub total_ratings: i64,
    pub user_rating: Option<i32>,
    pub rating_distribution: BTreeMap<String, i64>,
}

impl RatingSummary {
    /// Build the summary, zero-filling every rating value from 1 to 5.
    pub fn new(stats: RatingStats, user_rating: Option<i32>) -> Self {
        let mut rating_distribution: BTreeMap<String, i64> =
            (1..=5).map(|value| (value.to_string(), 0)).collect();
        for (rating, count) in stats.distribution {
            rating_distribution.insert(rating.to_string(), count);
        }
        Self {
            average_rating: stats.average,
            total_ratings: stats.total,
            user_rating,
            rating_distribution,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub activity_type: ActivityType,
    pub subject_id: Option<Uuid>,
    pub document_id: Option<Uuid>,
    pub metadata: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: Uuid,
    pub activity_type: ActivityType,
    pub subject_id: Option<Uuid>,
    pub document_id: Option<Uuid>,
    pub metadata: Value,
}

/// Membership target of a favorites toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FavoriteTarget {
    Subject(Uuid),
    Document(Uuid),
}

/// A user's favorite subjects and documents.
#[derive(Debug, Clone, Serialize)]
pub struct Favorites {
    pub subjects: Vec<Subject>,
    pub documents: Vec<Document>,
}
