//! libSQL persistence for learnpath.
//!
//! [`TursoStore`] implements every storage contract from `learnpath_core::store` against a
//! local SQLite file, a remote Turso database, or an in-memory database for tests.

mod error;
mod schema;
mod turso;

pub use error::{Error, Result};
pub use turso::TursoStore;
