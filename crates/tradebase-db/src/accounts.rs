//! The `accounts` table: a trading account's display name, description and
//! the identifier its institution knows it by.

use crate::migrations::Migration;
use crate::schema::{ColumnDefinition, TableDefinition};

pub const VERSION: u32 = 4;
pub const TABLE: &str = "accounts";

/// Upper bound on the string columns, in characters.
pub const STRING_LIMIT: u32 = 255;

pub fn create_accounts() -> Migration {
    Migration::create_table(
        VERSION,
        "create_accounts",
        TableDefinition::new(TABLE)
            .column(ColumnDefinition::string("nickname", STRING_LIMIT))
            .column(ColumnDefinition::string("description", STRING_LIMIT))
            .column(ColumnDefinition::string(
                "institution_identifier",
                STRING_LIMIT,
            ))
            .column(ColumnDefinition::datetime("created_on"))
            .column(ColumnDefinition::datetime("updated_on")),
    )
}
