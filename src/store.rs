mod batch;
pub mod ledger;
#[cfg(test)]
pub(crate) mod mock;
pub mod models;
pub mod pg_ledger;
mod record;
pub mod schema;

pub use ledger::BatchLedger;
pub use pg_ledger::PgBatchLedger;
