use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Photo,
    Video,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Photo => "photo",
            ContentKind::Video => "video",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentKind::Text),
            "photo" => Ok(ContentKind::Photo),
            "video" => Ok(ContentKind::Video),
            other => Err(format!("Unknown content kind: {other}")),
        }
    }
}

/// A stored queue row. `kind` stays a raw string so rows written with a tag
/// this build does not know are still readable and can be put back.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: i64,
    pub kind: String,
    pub payload: String,
    pub caption: String,
    pub created: i64,
}

impl QueueItem {
    pub fn content_kind(&self) -> Result<ContentKind, String> {
        self.kind.parse()
    }

    /// Caption as sent to the transport: empty means absent.
    pub fn caption(&self) -> Option<&str> {
        if self.caption.is_empty() {
            None
        } else {
            Some(&self.caption)
        }
    }
}
