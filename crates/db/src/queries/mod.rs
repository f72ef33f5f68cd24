// crates/db/src/queries/mod.rs
//! Store-trait implementations on [`Database`], one module per entity
//! surface. Row structs live in `row_types`.

mod categories;
mod deep_dives;
mod issues;
mod repos;
mod row_types;
mod saved;
mod tokens;
mod users;

use crate::Database;
use gitscout_core::store::StoreError;

impl Database {
    /// Map a sqlx failure into the backend-agnostic store error.
    pub(crate) fn store_err(err: sqlx::Error) -> StoreError {
        StoreError::backend(err)
    }
}
