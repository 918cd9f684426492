use axum::Router;
use axum::extract::Query;
use axum::middleware;
use axum::routing::get;
use serde::Deserialize;
use tracing::{Span, field, info_span};

use crate::propagation;

/// Renders the canonical greeting. Pure and deterministic; the output is
/// compared byte-for-byte across deployment topologies.
pub fn render(name: &str, title: &str, description: &str) -> String {
    let mut greeting = String::from("Hello, ");
    if !title.is_empty() {
        greeting.push_str(title);
        greeting.push(' ');
    }
    greeting.push_str(name);
    greeting.push('!');
    if !description.is_empty() {
        greeting.push(' ');
        greeting.push_str(description);
    }
    greeting
}

/// The formatter has no knowledge of the person entity; it only sees
/// three strings. Missing parameters decode as empty.
#[derive(Debug, Default, Deserialize)]
pub struct GreetingParams {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub fn router() -> Router {
    Router::new()
        .route("/formatGreeting", get(handle_format_greeting))
        .layer(middleware::from_fn(propagation::propagate))
}

async fn handle_format_greeting(Query(params): Query<GreetingParams>) -> String {
    let span = info_span!("format-greeting", greeting = field::Empty);
    span.in_scope(|| {
        let greeting = render(&params.name, &params.title, &params.description);
        Span::current().record("greeting", greeting.as_str());
        greeting
    })
}
