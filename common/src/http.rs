//! HTTP front end answering every GET with the current snapshot.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::{NotReady, ReadingStore};

/// Content type of every response. Existing clients expect `text/json` rather than
/// `application/json`.
pub const CONTENT_TYPE: &str = "text/json";

/// Body sent while no snapshot has been published yet.
pub const NOT_READY_BODY: &str = "{}\n";

const LOG_TARGET: &str = "airq::http";

/// Builds the router: `GET` on any path returns the current snapshot.
pub fn router(store: ReadingStore) -> Router {
    Router::new()
        .route("/", get(current_reading))
        .route("/*path", get(current_reading))
        .with_state(store)
}

async fn current_reading(State(store): State<ReadingStore>) -> Response {
    let snapshot = match store.current() {
        Ok(snapshot) => snapshot,
        Err(NotReady) => {
            debug!(target: LOG_TARGET, "no readings published yet");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::CONTENT_TYPE, CONTENT_TYPE)],
                NOT_READY_BODY,
            )
                .into_response();
        }
    };

    debug!(target: LOG_TARGET, "response readings updated {}...", snapshot.timestamp());

    match snapshot.to_json_line() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(target: LOG_TARGET, "error serializing readings: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serves requests on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    store: ReadingStore,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    info!(target: LOG_TARGET, "web server starting on {}...", listener.local_addr()?);

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
