pub mod queue;
pub mod slots;

use axum::Router;
use axum::routing::get;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route(
            "/api/v1/queue",
            get(queue::list).post(queue::create).delete(queue::purge),
        )
        .route("/api/v1/slots", get(slots::list))
}
