use serde::{Deserialize, Serialize};

/// How declared maximum lengths on string columns are enforced.
///
/// SQLite accepts any length for a `varchar(n)` column, so the bound has to be
/// spelled out when a table is created. Values are never truncated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthPolicy {
    /// Emit a `CHECK (length(col) <= n)` constraint; longer values are rejected.
    #[default]
    Reject,
    /// The declared length is advisory and the store keeps the full value.
    Unenforced,
}

impl LengthPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Unenforced => "unenforced",
        }
    }
}

impl std::fmt::Display for LengthPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `name` can be used as a table or column name without quoting
/// surprises: an ASCII letter or underscore followed by ASCII alphanumerics or
/// underscores.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
