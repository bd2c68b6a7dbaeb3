//! Database query functions organized by domain.

pub mod balances;
pub mod ledger;
pub mod reactions;
pub mod settings;
pub mod tasks;
pub mod users;

/// Wrap a decoding failure so it can be returned from a row-mapping closure.
pub(crate) fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}
