//! Error types for oxide-pg.

/// Errors that can occur while mapping, reconciling, compiling or executing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A field's type has no column mapping and no `db_type` override.
    #[error("field '{field}' has unmapped pg data type '{rust_type}'")]
    StructuralType {
        /// The field that could not be mapped.
        field: String,
        /// The Rust type of that field.
        rust_type: String,
    },

    /// Two fields resolve to the same column name.
    #[error("column '{column}' is declared more than once")]
    DuplicateColumn {
        /// The lower-cased column name.
        column: String,
    },

    /// The live catalog could not be read. No DDL was attempted.
    #[error("schema introspection failed for table '{table}': {source}")]
    SchemaIntrospection {
        /// Table being introspected.
        table: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// A generated statement failed. Statements after it were not run.
    #[error("{source}. SQL Command: {statement}")]
    DdlExecution {
        /// The statement that failed.
        statement: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// begin while in a transaction, or commit/rollback outside one.
    #[error("transaction state error: {0}")]
    TransactionState(String),

    /// A scanned value cannot be converted to the requested type.
    #[error("cannot coerce column '{column}': {message}")]
    Coercion {
        /// Column name, empty when not known yet.
        column: String,
        /// Description of the mismatch.
        message: String,
    },

    /// The command is missing its payload or is used the wrong way.
    #[error("command error: {0}")]
    CommandShape(String),

    /// A filter tree cannot be rendered.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The process-wide mapper registry was already initialised.
    #[error("mapper registry already initialized")]
    RegistryInitialized,

    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON encoding or decoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Creates a coercion error with no column attached yet.
    #[must_use]
    pub fn coercion(message: impl Into<String>) -> Self {
        Self::Coercion {
            column: String::new(),
            message: message.into(),
        }
    }

    /// Attaches a column name to a coercion error. Other variants pass through.
    #[must_use]
    pub fn at_column(self, name: &str) -> Self {
        match self {
            Self::Coercion { message, .. } => Self::Coercion {
                column: name.to_string(),
                message,
            },
            other => other,
        }
    }

    /// Returns the failing statement for DDL execution errors.
    #[must_use]
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::DdlExecution { statement, .. } => Some(statement),
            _ => None,
        }
    }
}

/// Result type alias for oxide-pg operations.
pub type Result<T> = std::result::Result<T, Error>;
