use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde_json::{Value, json};

use crate::auth::ApiAccess;
use crate::error::AppError;
use crate::scheduler;
use crate::state::SharedState;

pub async fn list(
    _access: ApiAccess,
    State(state): State<SharedState>,
) -> Result<Json<Value>, AppError> {
    let config = &state.config;

    let slots: Vec<Value> = scheduler::upcoming(&config.slots, config.timezone, Utc::now())
        .into_iter()
        .map(|(slot, next)| {
            json!({
                "time": slot.to_string(),
                "next_fire": next.map(|at| at.to_rfc3339()),
            })
        })
        .collect();

    Ok(Json(json!({
        "timezone": config.timezone.name(),
        "target": config.target.to_string(),
        "slots": slots,
    })))
}
