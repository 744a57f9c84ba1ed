//! Admin/stats HTTP surface.
//!
//! An embedding binary mounts this under whatever prefix it likes (e.g.
//! `/admin`); the broker itself has no opinion on transport.

// Layer 2: Third-party crate imports
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;

// Layer 3: Internal module imports
use crate::broker::{Broker, Snapshot};

/// Build the admin/stats router, wired to `broker`.
pub fn router(broker: Broker) -> Router {
    Router::new()
        .route("/stats", get(get_stats))
        .with_state(broker)
}

async fn get_stats(State(broker): State<Broker>) -> Json<Snapshot> {
    Json(broker.get_stats())
}
