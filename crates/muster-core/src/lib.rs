//! Domain model and collaborator traits for the Muster directory crawler.
//!
//! No I/O lives here. The SQLite store, the HTTP session layer and the crawl
//! engine all build on these types.

// Trait methods spell out `+ Send` futures; impls may still use `async fn`.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod model;
pub mod movement;
pub mod position;
pub mod source;
pub mod store;
pub mod timestamp;

pub use error::{Error, Result};
