//! Error mapping for the Postgres backends

use pulse_core::CoreError;
use sqlx::Error as SqlxError;

/// Convert a SQLx error into the contract error type
pub(crate) fn map_db_error(e: SqlxError) -> CoreError {
    CoreError::Storage(e.to_string())
}
