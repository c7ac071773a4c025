//! Storage error types.

use derive_getters::Getters;
use derive_more::{Display, Error};
use tracing::instrument;

/// What went wrong in the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DbErrorKind {
    /// Opening the database failed.
    #[display("connection")]
    Connection,
    /// Applying embedded migrations failed.
    #[display("migration")]
    Migration,
    /// A query or statement failed.
    #[display("query")]
    Query,
    /// The addressed user, invite or session does not exist.
    #[display("not found")]
    NotFound,
    /// A stored value could not be decoded into a game type.
    #[display("corrupt record")]
    Corrupt,
    /// The repository was set up with unusable settings.
    #[display("configuration")]
    Config,
}

/// Storage failure, tagged with its kind and the call site that raised it.
#[derive(Debug, Clone, Display, Error, Getters)]
#[display("Storage {} error: {} at {}:{}", kind, message, file, line)]
pub struct DbError {
    kind: DbErrorKind,
    message: String,
    line: u32,
    #[getter(skip)]
    file: &'static str,
}

impl DbError {
    /// Creates a storage error at the caller's location.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// A missing row, named by table and id.
    #[track_caller]
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        Self::new(DbErrorKind::NotFound, format!("No {} with id {}", what, id))
    }

    /// A stored value that does not decode.
    #[track_caller]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::new(DbErrorKind::Corrupt, message)
    }

    /// Source file where the error was raised.
    pub fn file(&self) -> &'static str {
        self.file
    }

    /// True when the addressed record does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind == DbErrorKind::NotFound
    }
}

impl From<diesel::result::Error> for DbError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        let kind = match err {
            diesel::result::Error::NotFound => DbErrorKind::NotFound,
            _ => DbErrorKind::Query,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<diesel::ConnectionError> for DbError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::new(DbErrorKind::Connection, err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::corrupt(format!("Board snapshot: {}", err))
    }
}
