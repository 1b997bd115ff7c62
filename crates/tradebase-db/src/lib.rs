pub mod accounts;
pub mod inspect;
pub mod migrations;
pub mod runner;
pub mod schema;
pub mod store;

pub use inspect::ColumnInfo;
pub use migrations::Migration;
pub use runner::{MigrationRunner, MigrationStatus, RollbackReport, RunReport};
pub use schema::{ColumnDefinition, ColumnKind, TableDefinition};
pub use store::Store;
