use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The object a schema change would create is already present.
    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    /// The object a schema change would remove does not exist.
    #[error("schema not found: {0}")]
    SchemaNotFound(String),

    /// Connectivity or permission failure. Always fatal; DDL is never retried.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display_includes_context() {
        let e = Error::SchemaConflict("table accounts already exists".into());
        assert_eq!(e.to_string(), "schema conflict: table accounts already exists");

        let e = Error::SchemaNotFound("table accounts does not exist".into());
        assert_eq!(e.to_string(), "schema not found: table accounts does not exist");

        let e = Error::StoreUnavailable("unable to open database file".into());
        assert_eq!(e.to_string(), "store unavailable: unable to open database file");

        let e = Error::Config("bad yaml".into());
        assert_eq!(e.to_string(), "configuration error: bad yaml");
    }
}
