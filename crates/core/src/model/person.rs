use serde::{Deserialize, Serialize};

/// A person profile as stored in the people table and carried over the
/// wire between services. `name` is always populated; `title` and
/// `description` empty mean "no title" / "no description".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Person {
    /// Fallback profile for a name with no stored record.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            description: String::new(),
        }
    }
}
