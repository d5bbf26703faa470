//! Typed find / exists / create / delete helpers over the SQLite schema.
//!
//! Every function borrows a single connection so a request can run all of
//! its queries on one pooled handle.

pub mod engagement;
pub mod hashtags;
pub mod notifications;
pub mod posts;
pub mod users;

pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// `LIKE` pattern matching `needle` anywhere, with wildcards escaped.
/// Use together with `ESCAPE '\'`.
pub fn contains_pattern(needle: &str) -> String {
    format!("%{}%", escape_like(needle))
}

/// `LIKE` pattern matching values that start with `prefix`.
pub fn prefix_pattern(prefix: &str) -> String {
    format!("{}%", escape_like(prefix))
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
