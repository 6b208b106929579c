mod blob;
mod envelope;
mod sqlite;

pub use blob::*;
pub use envelope::*;
pub use sqlite::*;

/// SQL migration for the key-value table
pub const MIGRATION_001_KEY_VALUES: &str = include_str!("migrations/001_key_values.sql");

/// Storage key of the current ledger envelope.
pub const FINANCE_KEY: &str = "delicias-finance";

/// Storage key written by older releases. Read once for migration, never written.
pub const LEGACY_FINANCE_KEY: &str = "delicias-transactions";
