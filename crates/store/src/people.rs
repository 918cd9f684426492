use duckdb::params;
use hail_core::error::{HailError, Result};
use hail_core::model::Person;
use tracing::info_span;

use crate::Store;

const LOOKUP_SQL: &str = "SELECT title, description FROM people WHERE name = ?";
const UPSERT_SQL: &str = "INSERT OR REPLACE INTO people (name, title, description) VALUES (?, ?, ?)";

impl Store {
    /// Looks up a person by exact name. A missing row is not an error:
    /// the returned profile then carries only the name.
    pub fn lookup_person(&self, name: &str) -> Result<Person> {
        let span = info_span!("lookup-person", db.statement = LOOKUP_SQL);
        span.in_scope(|| {
            let conn = self.conn();
            let mut stmt = conn
                .prepare(LOOKUP_SQL)
                .map_err(|e| HailError::Storage(format!("prepare lookup failed: {e}")))?;
            let mut rows = stmt
                .query(params![name])
                .map_err(|e| HailError::Storage(format!("lookup query failed: {e}")))?;

            match rows
                .next()
                .map_err(|e| HailError::Storage(format!("lookup row read failed: {e}")))?
            {
                Some(row) => {
                    let title: String = row
                        .get(0)
                        .map_err(|e| HailError::Storage(format!("lookup column failed: {e}")))?;
                    let description: String = row
                        .get(1)
                        .map_err(|e| HailError::Storage(format!("lookup column failed: {e}")))?;
                    Ok(Person {
                        name: name.to_string(),
                        title,
                        description,
                    })
                }
                None => Ok(Person::named(name)),
            }
        })
    }

    pub fn upsert_person(&self, person: &Person) -> Result<()> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(UPSERT_SQL)
            .map_err(|e| HailError::Storage(format!("prepare upsert failed: {e}")))?;
        stmt.execute(params![person.name, person.title, person.description])
            .map_err(|e| HailError::Storage(format!("upsert failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada() -> Person {
        Person {
            name: "Ada".to_string(),
            title: "Dr.".to_string(),
            description: "pioneer of computing".to_string(),
        }
    }

    #[test]
    fn missing_person_falls_back_to_name_only() {
        let store = Store::open_in_memory().unwrap();
        let person = store.lookup_person("Bob").unwrap();
        assert_eq!(person, Person::named("Bob"));
    }

    #[test]
    fn lookup_returns_seeded_row() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_person(&ada()).unwrap();

        let person = store.lookup_person("Ada").unwrap();
        assert_eq!(person, ada());
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_person(&ada()).unwrap();
        store
            .upsert_person(&Person {
                title: "Countess".to_string(),
                ..ada()
            })
            .unwrap();

        let person = store.lookup_person("Ada").unwrap();
        assert_eq!(person.title, "Countess");
        assert_eq!(person.description, "pioneer of computing");
    }

    #[test]
    fn lookup_matches_exact_name_only() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_person(&ada()).unwrap();

        let person = store.lookup_person("ada").unwrap();
        assert_eq!(person, Person::named("ada"));
    }

    #[test]
    fn concurrent_lookups_share_one_handle() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_person(&ada()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.lookup_person("Ada").unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), ada());
        }
    }
}
