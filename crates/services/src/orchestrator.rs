use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use hail_core::error::{HailError, Result};
use hail_core::model::Person;
use hail_store::Store;
use tracing::{Instrument, Span, field, info_span};

use crate::client::HttpClient;
use crate::formatter;
use crate::propagation;

/// Where the orchestrator resolves people and renders greetings: over the
/// network in the distributed topology, in-process in the collapsed one.
/// Both emit the same operation spans and produce identical bodies for
/// the same stored data.
#[derive(Clone)]
pub enum Backend {
    Remote {
        client: HttpClient,
        directory_url: String,
        formatter_url: String,
    },
    Local {
        store: Store,
    },
}

#[derive(Clone)]
pub struct Orchestrator {
    backend: Backend,
}

impl Orchestrator {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// The full greeting chain: resolve the person, then render the
    /// greeting. Strictly sequential; the first failing step aborts the
    /// rest and surfaces to the caller.
    pub async fn say_hello(&self, name: &str) -> Result<String> {
        let span = info_span!(
            "say-hello",
            person.name = %name,
            response = field::Empty,
            error = field::Empty,
        );

        let result = async {
            let person = self.get_person(name).await?;
            let greeting = self.format_greeting(&person).await?;
            Span::current().record("response", greeting.as_str());
            Ok(greeting)
        }
        .instrument(span.clone())
        .await;

        if result.is_err() {
            span.record("error", true);
        }
        result
    }

    async fn get_person(&self, name: &str) -> Result<Person> {
        let span = info_span!(
            "get-person",
            person.name = field::Empty,
            person.title = field::Empty,
            person.description = field::Empty,
            error = field::Empty,
        );

        let result = async {
            match &self.backend {
                Backend::Remote {
                    client,
                    directory_url,
                    ..
                } => {
                    let url = person_url(directory_url, name)?;
                    let body = client.get_text(url).await?;
                    serde_json::from_str(&body).map_err(|e| {
                        HailError::Transport(format!("malformed person response: {e}"))
                    })
                }
                Backend::Local { store } => store.lookup_person(name),
            }
        }
        .instrument(span.clone())
        .await;

        match &result {
            Ok(person) => {
                span.record("person.name", person.name.as_str());
                span.record("person.title", person.title.as_str());
                span.record("person.description", person.description.as_str());
            }
            Err(_) => {
                span.record("error", true);
            }
        }
        result
    }

    async fn format_greeting(&self, person: &Person) -> Result<String> {
        let span = info_span!("format-greeting", error = field::Empty);

        let result = async {
            match &self.backend {
                Backend::Remote {
                    client,
                    formatter_url,
                    ..
                } => {
                    let url = greeting_url(formatter_url, person)?;
                    client.get_text(url).await
                }
                Backend::Local { .. } => Ok(formatter::render(
                    &person.name,
                    &person.title,
                    &person.description,
                )),
            }
        }
        .instrument(span.clone())
        .await;

        if result.is_err() {
            span.record("error", true);
        }
        result
    }
}

fn person_url(base: &str, name: &str) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| HailError::Config(format!("bad directory url {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| HailError::Config(format!("directory url {base} cannot carry a path")))?
        .pop_if_empty()
        .push("getPerson")
        .push(name);
    Ok(url)
}

fn greeting_url(base: &str, person: &Person) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| HailError::Config(format!("bad formatter url {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| HailError::Config(format!("formatter url {base} cannot carry a path")))?
        .pop_if_empty()
        .push("formatGreeting");
    url.query_pairs_mut()
        .append_pair("title", &person.title)
        .append_pair("name", &person.name)
        .append_pair("description", &person.description);
    Ok(url)
}

pub fn router(orchestrator: Orchestrator) -> Router {
    Router::new()
        .route("/sayHello/{name}", get(handle_say_hello))
        .layer(middleware::from_fn(propagation::propagate))
        .with_state(orchestrator)
}

async fn handle_say_hello(
    State(orchestrator): State<Orchestrator>,
    Path(name): Path<String>,
) -> Response {
    match orchestrator.say_hello(&name).await {
        Ok(greeting) => greeting.into_response(),
        Err(err) => {
            tracing::error!(error = %err, name = %name, "say-hello failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_orchestrator(people: &[Person]) -> Orchestrator {
        let store = Store::open_in_memory().unwrap();
        for person in people {
            store.upsert_person(person).unwrap();
        }
        Orchestrator::new(Backend::Local { store })
    }

    #[tokio::test]
    async fn say_hello_with_stored_profile() {
        let orchestrator = local_orchestrator(&[Person {
            name: "Ada".to_string(),
            title: "Dr.".to_string(),
            description: "pioneer of computing".to_string(),
        }]);

        let greeting = orchestrator.say_hello("Ada").await.unwrap();
        assert_eq!(greeting, "Hello, Dr. Ada! pioneer of computing");
    }

    #[tokio::test]
    async fn say_hello_falls_back_for_unknown_name() {
        let orchestrator = local_orchestrator(&[]);

        let greeting = orchestrator.say_hello("Bob").await.unwrap();
        assert_eq!(greeting, "Hello, Bob!");
    }

    #[tokio::test]
    async fn unreachable_directory_is_a_transport_error() {
        // Port 9 (discard) on loopback is not listening.
        let client = HttpClient::new(std::time::Duration::from_millis(500)).unwrap();
        let orchestrator = Orchestrator::new(Backend::Remote {
            client,
            directory_url: "http://127.0.0.1:9".to_string(),
            formatter_url: "http://127.0.0.1:9".to_string(),
        });

        let err = orchestrator.say_hello("Ada").await.unwrap_err();
        assert!(matches!(err, HailError::Transport(_)));
    }

    #[test]
    fn person_url_escapes_path_segment() {
        let url = person_url("http://127.0.0.1:8081", "Ada Lovelace").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8081/getPerson/Ada%20Lovelace");
    }

    #[test]
    fn greeting_url_carries_all_fields() {
        let url = greeting_url(
            "http://127.0.0.1:8082",
            &Person {
                name: "Ada".to_string(),
                title: "Dr.".to_string(),
                description: "pioneer of computing".to_string(),
            },
        )
        .unwrap();
        assert_eq!(url.path(), "/formatGreeting");
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(query.contains(&("title".to_string(), "Dr.".to_string())));
        assert!(query.contains(&("name".to_string(), "Ada".to_string())));
        assert!(
            query.contains(&("description".to_string(), "pioneer of computing".to_string()))
        );
    }
}
