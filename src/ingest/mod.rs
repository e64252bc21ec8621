pub mod telegram;

use std::fmt;

use sqlx::SqlitePool;

use crate::db;
use crate::models::ContentKind;

/// One inbound submission. Accepting it performs exactly one enqueue.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub kind: ContentKind,
    pub payload: String,
    pub caption: String,
}

impl Submission {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Text,
            payload: text.into(),
            caption: String::new(),
        }
    }

    pub fn photo(content_ref: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            kind: ContentKind::Photo,
            payload: content_ref.into(),
            caption: caption.unwrap_or_default(),
        }
    }

    pub fn video(content_ref: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            kind: ContentKind::Video,
            payload: content_ref.into(),
            caption: caption.unwrap_or_default(),
        }
    }
}

#[derive(Debug)]
pub enum IngestError {
    Invalid(String),
    Database(sqlx::Error),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Invalid(msg) => write!(f, "Invalid submission: {msg}"),
            IngestError::Database(err) => write!(f, "Database error: {err}"),
        }
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        IngestError::Database(err)
    }
}

/// Validate and enqueue a submission, returning the new queue id.
/// Nothing is written unless the submission is complete.
pub async fn accept(pool: &SqlitePool, submission: Submission) -> Result<i64, IngestError> {
    let (payload, caption) = match submission.kind {
        ContentKind::Text => {
            let text = submission.payload.trim();
            if text.is_empty() {
                return Err(IngestError::Invalid("text is empty".to_string()));
            }
            (text, "")
        }
        ContentKind::Photo | ContentKind::Video => {
            let content_ref = submission.payload.trim();
            if content_ref.is_empty() {
                return Err(IngestError::Invalid(format!(
                    "{} reference is empty",
                    submission.kind
                )));
            }
            (content_ref, submission.caption.as_str())
        }
    };

    let id = db::queue::enqueue(pool, submission.kind.as_str(), payload, caption).await?;
    tracing::info!("Queued {} item {id}", submission.kind);
    Ok(id)
}
