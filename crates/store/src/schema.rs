pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS people (
  name TEXT PRIMARY KEY,
  title TEXT NOT NULL DEFAULT '',
  description TEXT NOT NULL DEFAULT ''
);
"#;
