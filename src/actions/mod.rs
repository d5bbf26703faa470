//! State-changing operations. Each one validates its input, checks that the
//! rows it touches exist, checks ownership, writes, then fans out
//! notifications, all on the caller's connection.

pub mod engagement;
pub mod posts;
pub mod users;

use crate::db::is_unique_violation;
use crate::error::AppError;

/// Map a unique-constraint failure to a conflict carrying `message`.
fn conflict_on_duplicate(err: rusqlite::Error, message: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(message.to_string())
    } else {
        AppError::Database(err)
    }
}
