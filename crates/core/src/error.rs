//! Error types for featql.

use crate::types::FieldType;
use alloc::string::String;
use core::fmt;

/// Result type alias for featql operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for query layer operations.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A table referenced by a statement does not exist in its data source.
    TableNotFound {
        name: String,
    },
    /// A secondary data source could not be opened.
    DataSourceNotFound {
        name: String,
    },
    /// A field name could not be resolved.
    FieldNotFound {
        table: String,
        field: String,
    },
    /// Attribute filter text could not be compiled.
    InvalidFilter {
        filter: String,
        message: String,
    },
    /// Evaluation of a computed expression failed for one row.
    Evaluation {
        column: String,
        message: String,
    },
    /// A buffer could not grow.
    ResourceExhausted {
        message: String,
    },
    /// The operation is not available on this layer.
    Unsupported {
        operation: String,
    },
    /// Type mismatch error.
    TypeMismatch {
        expected: FieldType,
        got: FieldType,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TableNotFound { name } => write!(f, "Table not found: {}", name),
            Error::DataSourceNotFound { name } => {
                write!(f, "Unable to open secondary data source: {}", name)
            }
            Error::FieldNotFound { table, field } => {
                write!(f, "Field {} not found in table {}", field, table)
            }
            Error::InvalidFilter { filter, message } => {
                write!(f, "Invalid attribute filter '{}': {}", filter, message)
            }
            Error::Evaluation { column, message } => {
                write!(f, "Evaluation of column {} failed: {}", column, message)
            }
            Error::ResourceExhausted { message } => {
                write!(f, "Resource exhausted: {}", message)
            }
            Error::Unsupported { operation } => {
                write!(f, "Unsupported operation: {}", operation)
            }
            Error::TypeMismatch { expected, got } => {
                write!(f, "Type mismatch: expected {:?}, got {:?}", expected, got)
            }
            Error::InvalidOperation { message } => {
                write!(f, "Invalid operation: {}", message)
            }
        }
    }
}

impl Error {
    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    /// Creates a data source not found error.
    pub fn data_source_not_found(name: impl Into<String>) -> Self {
        Error::DataSourceNotFound { name: name.into() }
    }

    /// Creates a field not found error.
    pub fn field_not_found(table: impl Into<String>, field: impl Into<String>) -> Self {
        Error::FieldNotFound {
            table: table.into(),
            field: field.into(),
        }
    }

    /// Creates an invalid filter error.
    pub fn invalid_filter(filter: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidFilter {
            filter: filter.into(),
            message: message.into(),
        }
    }

    /// Creates an evaluation error.
    pub fn evaluation(column: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Evaluation {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Creates a resource exhausted error.
    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Error::ResourceExhausted {
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Error::Unsupported {
            operation: operation.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: FieldType, got: FieldType) -> Self {
        Error::TypeMismatch { expected, got }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for errors raised while the results layer is being built.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Error::TableNotFound { .. } | Error::DataSourceNotFound { .. }
        )
    }
}
