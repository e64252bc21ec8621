use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::ApiAccess;
use crate::db;
use crate::error::AppError;
use crate::ingest::{self, Submission};
use crate::inspector;
use crate::models::ContentKind;
use crate::state::SharedState;

const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

pub async fn list(
    _access: ApiAccess,
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let limit = query
        .limit
        .unwrap_or(inspector::DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);

    let items = inspector::list(&state.pool, limit).await?;
    let total = db::queue::count(&state.pool).await?;

    let items: Vec<Value> = items
        .iter()
        .map(|item| {
            json!({
                "id": item.id,
                "kind": item.kind,
                "payload": item.payload,
                "caption": item.caption,
                "created": item.created,
                "preview": inspector::preview(item),
            })
        })
        .collect();

    Ok(Json(json!({ "items": items, "total": total })))
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub kind: String,
    pub payload: String,
    pub caption: Option<String>,
}

pub async fn create(
    _access: ApiAccess,
    State(state): State<SharedState>,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let kind: ContentKind = req.kind.parse().map_err(AppError::BadRequest)?;

    let submission = match kind {
        ContentKind::Text => {
            if req.caption.as_deref().is_some_and(|c| !c.is_empty()) {
                return Err(AppError::BadRequest(
                    "caption is only allowed for photo and video".to_string(),
                ));
            }
            Submission::text(req.payload)
        }
        ContentKind::Photo => Submission::photo(req.payload, req.caption),
        ContentKind::Video => Submission::video(req.payload, req.caption),
    };

    let id = ingest::accept(&state.pool, submission).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "queued", "id": id })),
    ))
}

pub async fn purge(
    _access: ApiAccess,
    State(state): State<SharedState>,
) -> Result<Json<Value>, AppError> {
    let removed = inspector::clear(&state.pool).await?;
    Ok(Json(json!({ "status": "purged", "removed": removed })))
}
