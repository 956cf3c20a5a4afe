//! Web collaborators for the Muster crawler.
//!
//! - [`HttpSessionProvider`]: a `reqwest` session layer with a bounded number
//!   of concurrently open sessions.
//! - [`TawGrammar`]: the field-extraction grammar for roster, event and
//!   profile pages and the movement feed.

#![allow(async_fn_in_trait)]

pub mod error;
pub mod grammar;
pub mod session;

pub use error::{Error, Result};
pub use grammar::TawGrammar;
pub use session::{HttpSession, HttpSessionProvider, SessionSettings};
