use sqlx::SqlitePool;

use crate::db;
use crate::models::{ContentKind, QueueItem};

pub const DEFAULT_LIMIT: i64 = 20;

const PREVIEW_CHARS: usize = 70;

pub async fn list(pool: &SqlitePool, limit: i64) -> Result<Vec<QueueItem>, sqlx::Error> {
    db::queue::peek(pool, limit).await
}

pub async fn clear(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let removed = db::queue::purge(pool).await?;
    tracing::info!("Queue purged ({removed} item(s) removed)");
    Ok(removed)
}

pub fn icon(item: &QueueItem) -> &'static str {
    match item.content_kind() {
        Ok(ContentKind::Text) => "📝",
        Ok(ContentKind::Photo) => "🖼️",
        Ok(ContentKind::Video) => "🎬",
        Err(_) => "❓",
    }
}

/// One-line summary: the caption for media when there is one, else the payload.
pub fn preview(item: &QueueItem) -> String {
    let source = match item.content_kind() {
        Ok(ContentKind::Photo | ContentKind::Video) if !item.caption.is_empty() => &item.caption,
        _ => &item.payload,
    };

    source
        .replace(['\n', '\r'], " ")
        .chars()
        .take(PREVIEW_CHARS)
        .collect()
}

pub fn format_listing(items: &[QueueItem]) -> String {
    if items.is_empty() {
        return "Queue is empty ✅".to_string();
    }

    let lines: Vec<String> = items
        .iter()
        .map(|item| format!("{} #{}  {}", icon(item), item.id, preview(item)))
        .collect();

    format!("Upcoming posts:\n{}", lines.join("\n"))
}
