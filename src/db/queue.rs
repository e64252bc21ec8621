use sqlx::SqlitePool;

use crate::models::QueueItem;

/// Append one item at the tail. The new row's id is returned.
pub async fn enqueue(
    pool: &SqlitePool,
    kind: &str,
    payload: &str,
    caption: &str,
) -> Result<i64, sqlx::Error> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO queue (kind, payload, caption) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(kind)
    .bind(payload)
    .bind(caption)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Atomically remove and return the head of the queue.
/// A single DELETE ... RETURNING means no two callers can receive the same row.
pub async fn dequeue(pool: &SqlitePool) -> Result<Option<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(
        "DELETE FROM queue
         WHERE id = (SELECT id FROM queue ORDER BY id ASC LIMIT 1)
         RETURNING id, kind, payload, caption, created",
    )
    .fetch_optional(pool)
    .await
}

/// Up to `limit` items from the head, oldest first. Nothing is removed.
pub async fn peek(pool: &SqlitePool, limit: i64) -> Result<Vec<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(
        "SELECT id, kind, payload, caption, created FROM queue ORDER BY id ASC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM queue")
        .fetch_one(pool)
        .await
}

/// Remove every queued item. Returns how many rows were deleted.
pub async fn purge(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM queue").execute(pool).await?;
    Ok(result.rows_affected())
}
