//! Database initialization, schema synchronization and run ledger

pub mod init;
pub mod runs;
pub mod schema_sync;

pub use init::*;
pub use runs::*;
pub use schema_sync::*;
