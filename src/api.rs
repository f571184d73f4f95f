pub(crate) mod error;
pub(crate) mod health;
pub(crate) mod history;
pub(crate) mod metrics;
pub(crate) mod sms;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/metrics", get(metrics::exporter))
        .route("/api/sms/send", post(sms::send_single))
        .route("/api/sms/bulk", post(sms::send_bulk))
        .route("/api/sms/bulk/stream", post(sms::send_bulk_stream))
        .route("/api/sms/preview", post(sms::preview))
        .route("/api/sms/stats", get(history::stats))
        .route("/api/sms/batches", get(history::list_batches))
        .route("/api/sms/batches/{id}", get(history::get_batch))
        .route("/api/sms/records", get(history::list_records))
        .route("/api/sms/records/range", get(history::records_between))
        .route("/api/sms/search", get(history::search))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
