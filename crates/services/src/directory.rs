use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use hail_core::error::HailError;
use hail_store::Store;
use tracing::{field, info_span};

use crate::propagation;

pub fn router(store: Store) -> Router {
    Router::new()
        .route("/getPerson/{name}", get(handle_get_person))
        .layer(middleware::from_fn(propagation::propagate))
        .with_state(store)
}

/// Resolves a person profile and returns it as JSON. A missing record is
/// served like any other profile, with only the name populated; only a
/// failing store query is an error.
async fn handle_get_person(State(store): State<Store>, Path(name): Path<String>) -> Response {
    let span = info_span!(
        "get-person",
        person.name = field::Empty,
        person.title = field::Empty,
        person.description = field::Empty,
        error = field::Empty,
    );

    let person = match span.in_scope(|| store.lookup_person(&name)) {
        Ok(person) => person,
        Err(err) => {
            span.record("error", true);
            tracing::error!(error = %err, name = %name, "person lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    span.record("person.name", person.name.as_str());
    span.record("person.title", person.title.as_str());
    span.record("person.description", person.description.as_str());

    match serde_json::to_vec(&person) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            let err = HailError::Transport(format!("encoding person response failed: {e}"));
            span.record("error", true);
            tracing::error!(error = %err, name = %name, "person response failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
