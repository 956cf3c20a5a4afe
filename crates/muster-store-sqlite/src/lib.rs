//! SQLite backend for the Muster directory store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. A counting gate bounds how many
//! [`SqliteSession`]s may be open at once.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{DEFAULT_MAX_SESSIONS, SqliteSession, SqliteStore};
