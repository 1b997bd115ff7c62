//! Declarative table definitions and the DDL rendered from them.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tradebase_common::{Error, LengthPolicy, Result, is_valid_identifier};

/// Name of the identity key every table gets implicitly.
pub const IDENTITY_COLUMN: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
}

impl ColumnKind {
    fn sql_type(&self) -> &'static str {
        match self {
            Self::String => "varchar",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub kind: ColumnKind,
    /// Only meaningful for [`ColumnKind::String`].
    pub max_length: Option<u32>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            max_length: None,
        }
    }

    pub fn string(name: impl Into<String>, max_length: u32) -> Self {
        Self {
            max_length: Some(max_length),
            ..Self::new(name, ColumnKind::String)
        }
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::DateTime)
    }

    /// The declared SQL type, e.g. `varchar(255)` or `datetime`.
    pub fn sql_type(&self) -> String {
        match (self.kind, self.max_length) {
            (ColumnKind::String, Some(len)) => format!("varchar({len})"),
            (kind, _) => kind.sql_type().to_string(),
        }
    }

    /// Parse a declared SQL type back into a column definition. Returns `None`
    /// for types this crate never renders.
    pub fn from_declared(name: impl Into<String>, declared_type: &str) -> Option<Self> {
        let declared = declared_type.trim().to_ascii_lowercase();
        if let Some(rest) = declared.strip_prefix("varchar(") {
            let len = rest.strip_suffix(')')?.trim().parse().ok()?;
            return Some(Self::string(name, len));
        }
        let kind = match declared.as_str() {
            "varchar" => ColumnKind::String,
            "text" => ColumnKind::Text,
            "integer" => ColumnKind::Integer,
            "float" => ColumnKind::Float,
            "boolean" => ColumnKind::Boolean,
            "date" => ColumnKind::Date,
            "datetime" => ColumnKind::DateTime,
            _ => return None,
        };
        Some(Self::new(name, kind))
    }

    fn validate(&self, table: &str) -> Result<()> {
        if !is_valid_identifier(&self.name) {
            return Err(Error::InvalidDefinition(format!(
                "column name {:?} in table {table} is not a valid identifier",
                self.name
            )));
        }
        if self.name.eq_ignore_ascii_case(IDENTITY_COLUMN) {
            return Err(Error::InvalidDefinition(format!(
                "column {IDENTITY_COLUMN} in table {table} is reserved for the identity key"
            )));
        }
        match (self.kind, self.max_length) {
            (ColumnKind::String, Some(0)) => Err(Error::InvalidDefinition(format!(
                "column {}.{} has a zero max length",
                table, self.name
            ))),
            (ColumnKind::String, _) | (_, None) => Ok(()),
            (kind, Some(_)) => Err(Error::InvalidDefinition(format!(
                "column {}.{} is {} and cannot declare a max length",
                table,
                self.name,
                kind.sql_type()
            ))),
        }
    }

    fn render(&self, policy: LengthPolicy) -> String {
        let name = quote_ident(&self.name);
        let mut sql = format!("{name} {}", self.sql_type());
        if let (ColumnKind::String, Some(len), LengthPolicy::Reject) =
            (self.kind, self.max_length, policy)
        {
            let _ = write!(sql, " CHECK (length({name}) <= {len})");
        }
        sql
    }
}

/// A table and its ordered columns. The identity key is implicit and never
/// listed in `columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_identifier(&self.name) {
            return Err(Error::InvalidDefinition(format!(
                "table name {:?} is not a valid identifier",
                self.name
            )));
        }
        if self.name.to_ascii_lowercase().starts_with("sqlite_") {
            return Err(Error::InvalidDefinition(format!(
                "table name {} uses the reserved sqlite_ prefix",
                self.name
            )));
        }
        if self.columns.is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "table {} declares no columns beyond the identity key",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            column.validate(&self.name)?;
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(Error::InvalidDefinition(format!(
                    "duplicate column {} in table {}",
                    column.name, self.name
                )));
            }
        }
        Ok(())
    }

    /// `CREATE TABLE` for this definition. Every declared column is nullable
    /// with no default.
    pub fn create_sql(&self, policy: LengthPolicy) -> String {
        let mut parts = Vec::with_capacity(self.columns.len() + 1);
        parts.push(format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL",
            quote_ident(IDENTITY_COLUMN)
        ));
        parts.extend(self.columns.iter().map(|c| c.render(policy)));
        format!(
            "CREATE TABLE {} ({})",
            quote_ident(&self.name),
            parts.join(", ")
        )
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE {}", quote_ident(&self.name))
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TableDefinition {
        TableDefinition::new("accounts")
            .column(ColumnDefinition::string("nickname", 255))
            .column(ColumnDefinition::datetime("created_on"))
    }

    #[test]
    fn renders_create_table_with_length_checks() {
        assert_eq!(
            sample().create_sql(LengthPolicy::Reject),
            "CREATE TABLE \"accounts\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
             \"nickname\" varchar(255) CHECK (length(\"nickname\") <= 255), \
             \"created_on\" datetime)"
        );
    }

    #[test]
    fn unenforced_policy_omits_checks() {
        let sql = sample().create_sql(LengthPolicy::Unenforced);
        assert!(sql.contains("\"nickname\" varchar(255),"));
        assert!(!sql.contains("CHECK"));
    }

    #[test]
    fn renders_drop_table() {
        assert_eq!(sample().drop_sql(), "DROP TABLE \"accounts\"");
    }

    #[test]
    fn validate_accepts_sample() {
        sample().validate().unwrap();
    }

    #[test]
    fn validate_requires_columns() {
        let err = TableDefinition::new("accounts").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidDefinition(_)));
    }

    #[test]
    fn validate_rejects_duplicate_columns() {
        let table = sample().column(ColumnDefinition::string("Nickname", 40));
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate column"));
    }

    #[test]
    fn validate_rejects_length_on_non_string() {
        let mut column = ColumnDefinition::datetime("updated_on");
        column.max_length = Some(10);
        let err = sample().column(column).validate().unwrap_err();
        assert!(err.to_string().contains("cannot declare a max length"));
    }

    #[test]
    fn validate_rejects_zero_length() {
        let err = sample()
            .column(ColumnDefinition::string("code", 0))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("zero max length"));
    }

    #[test]
    fn validate_rejects_reserved_names() {
        let table = sample().column(ColumnDefinition::new("id", ColumnKind::Integer));
        assert!(table.validate().is_err());

        let table = TableDefinition::new("sqlite_accounts")
            .column(ColumnDefinition::datetime("created_on"));
        assert!(table.validate().is_err());

        let table =
            TableDefinition::new("accounts; --").column(ColumnDefinition::datetime("created_on"));
        assert!(table.validate().is_err());
    }

    #[test]
    fn parses_declared_types() {
        assert_eq!(
            ColumnDefinition::from_declared("nickname", "VARCHAR(255)"),
            Some(ColumnDefinition::string("nickname", 255))
        );
        assert_eq!(
            ColumnDefinition::from_declared("created_on", "datetime"),
            Some(ColumnDefinition::datetime("created_on"))
        );
        assert_eq!(
            ColumnDefinition::from_declared("flag", "boolean").map(|c| c.kind),
            Some(ColumnKind::Boolean)
        );
        assert_eq!(ColumnDefinition::from_declared("blob", "blob"), None);
        assert_eq!(ColumnDefinition::from_declared("bad", "varchar(x)"), None);
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("accounts"), "\"accounts\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
