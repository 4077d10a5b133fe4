//! Core error types.

use crate::catalog::FieldError;
use thiserror::Error;

/// Core mapping and security errors.
///
/// Not-found results and authorization denials are not errors; they are
/// reported as `Ok(None)` and `Ok(false)` by the operations that produce them.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A record type was written before its table was created.
    #[error("table `{table}` for record `{record}` does not exist")]
    MissingTable {
        /// Record type name.
        record: &'static str,
        /// Table name derived from the record type name.
        table: String,
    },

    /// A stored value could not be decoded into a record field.
    #[error("cannot decode column `{column}` of record `{record}`: {source}")]
    Decode {
        /// Record type name.
        record: &'static str,
        /// Column being decoded.
        column: String,
        /// Underlying conversion failure.
        #[source]
        source: FieldError,
    },

    /// A column path does not resolve against the record value.
    #[error("record `{record}` has no field for column `{column}`")]
    UnknownColumn {
        /// Record type name.
        record: &'static str,
        /// Column name.
        column: String,
    },

    /// The operation needs an instance id but the record type has no primary key.
    #[error("record `{record}` declares no primary key")]
    NoPrimaryKey {
        /// Record type name.
        record: &'static str,
    },

    /// The record's primary key holds no id (NULL).
    #[error("record `{record}` has no primary key value")]
    MissingId {
        /// Record type name.
        record: &'static str,
    },

    /// A `read_by`/`write_by` annotation does not name the referenced
    /// record type's primary key.
    #[error("{annotation}({target}, {field}) on `{record}`: not the primary key of `{target}`")]
    InvalidAnnotation {
        /// Annotated record type name.
        record: &'static str,
        /// `read_by` or `write_by`.
        annotation: &'static str,
        /// Referenced record type name.
        target: &'static str,
        /// Field named by the annotation.
        field: &'static str,
    },

    /// The record type has no field that determines read permission.
    #[error("record `{record}` has neither a read_by annotation nor a primary key")]
    NoReadDeterminer {
        /// Record type name.
        record: &'static str,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MissingTable {
            record: "UserComment",
            table: "user_comment".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "table `user_comment` for record `UserComment` does not exist"
        );

        let err = Error::Decode {
            record: "Post",
            column: "views".to_string(),
            source: FieldError::TypeMismatch {
                expected: "integer",
                found: "text",
            },
        };
        assert!(err.to_string().contains("views"));
        assert!(err.to_string().contains("expected integer, found text"));
    }

    #[test]
    fn test_invalid_annotation_display() {
        let err = Error::InvalidAnnotation {
            record: "Note",
            annotation: "read_by",
            target: "User",
            field: "no_such_field",
        };
        assert_eq!(
            err.to_string(),
            "read_by(User, no_such_field) on `Note`: not the primary key of `User`"
        );
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::Storage(_)));
    }
}
