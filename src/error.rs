// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy.
//!
//! Every error is returned to the immediate caller; nothing in this crate
//! logs, retries or swallows one.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error, one variant per concern.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaDefinitionError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Query(#[from] QueryResolutionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Malformed schema definition. Fatal; canonicalization never partially succeeds.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaDefinitionError {
    #[error("field '{field}' starts with the reserved '$' prefix; rename it")]
    ReservedName { field: String },

    #[error("field '{field}' has unknown type '{kind}'; use one of string, number, bigint, boolean, text, date, point, vector, array, tuple, object, reference, relation")]
    UnknownKind { field: String, kind: String },

    #[error("field '{field}' uses '{kind}' as shorthand; write {{ \"type\": \"{kind}\", {hint} }} instead")]
    ShorthandNotAllowed {
        field: String,
        kind: String,
        hint: &'static str,
    },

    #[error("field '{field}' is missing required option '{option}'; {hint}")]
    MissingOption {
        field: String,
        option: &'static str,
        hint: &'static str,
    },

    #[error("field '{field}' has invalid value '{value}' for option '{option}'; {hint}")]
    InvalidOption {
        field: String,
        option: &'static str,
        value: String,
        hint: &'static str,
    },

    #[error("field '{field}' has invalid default '{value}': {reason}")]
    InvalidDefault {
        field: String,
        value: String,
        reason: String,
    },

    #[error("tuple field '{field}' needs at least one element; list them under \"elements\"")]
    EmptyTuple { field: String },

    #[error("field '{field}' references unknown schema '{target}'; register it first or use \"self\"")]
    UnknownReference { field: String, target: String },

    #[error("schema could not be read: {0}")]
    Malformed(String),
}

impl SchemaDefinitionError {
    /// Offending key (dotted path for nested fields).
    pub fn key(&self) -> &str {
        match self {
            Self::ReservedName { field }
            | Self::UnknownKind { field, .. }
            | Self::ShorthandNotAllowed { field, .. }
            | Self::MissingOption { field, .. }
            | Self::InvalidOption { field, .. }
            | Self::InvalidDefault { field, .. }
            | Self::EmptyTuple { field }
            | Self::UnknownReference { field, .. } => field,
            Self::Malformed(_) => "",
        }
    }
}

/// A value's runtime type does not fit its field kind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field '{field}' is nested; the flat encoding cannot represent objects, tuples or arrays of objects")]
    NestingUnsupported { field: String },

    #[error("field '{field}' has point ({longitude}, {latitude}) outside the indexable range")]
    PointOutOfRange {
        field: String,
        longitude: f64,
        latitude: f64,
    },

    #[error("field '{field}' has a non-finite number")]
    NonFiniteNumber { field: String },

    #[error("field '{field}' value '{value}' is not one of the allowed literals")]
    LiteralViolation { field: String, value: String },

    #[error("field '{field}' element '{value}' contains the separator '{separator}'")]
    SeparatorInValue {
        field: String,
        value: String,
        separator: String,
    },

    #[error("field '{field}' contains a null element at index {index}")]
    NullElement { field: String, index: usize },

    #[error("field '{field}' contains an empty element at index {index}; the flat encoding cannot tell it from a missing one")]
    EmptyElement { field: String, index: usize },

    #[error("tuple field '{field}' expects {expected} elements, got {found}")]
    TupleLength {
        field: String,
        expected: usize,
        found: usize,
    },
}

/// Wire data violates the grammar of its field kind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("field '{field}' expects \"1\" or \"0\", got '{raw}'")]
    InvalidBoolean { field: String, raw: String },

    #[error("field '{field}' expects a number, got '{raw}'")]
    InvalidNumber { field: String, raw: String },

    #[error("field '{field}' expects an integer, got '{raw}'")]
    InvalidBigInt { field: String, raw: String },

    #[error("field '{field}' expects an epoch timestamp, got '{raw}'")]
    InvalidDate { field: String, raw: String },

    #[error("field '{field}' expects 'longitude,latitude', got '{raw}'")]
    InvalidPoint { field: String, raw: String },

    #[error("field '{field}' contains null at index {index}; only the whole field may be null")]
    NullInArray { field: String, index: usize },

    #[error("field '{field}' expects {expected}, got '{raw}'")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        raw: String,
    },

    #[error("field '{field}' is nested and cannot be read from the flat encoding")]
    NestingUnsupported { field: String },

    #[error("document root must be an object, got '{raw}'")]
    NotAnObject { raw: String },
}

/// A query clause cannot be resolved against the schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryResolutionError {
    #[error("field '{path}' does not exist in the schema")]
    UnknownField { path: String },

    #[error("field '{path}' is an object and not a queryable leaf")]
    NotALeaf { path: String },

    #[error("cannot descend into '{segment}' of '{path}': not an object or array of objects")]
    NotTraversable { path: String, segment: String },

    #[error("field '{path}' is a {kind} and cannot be searched")]
    NotSearchable { path: String, kind: &'static str },

    #[error("operator '{operator}' is not supported on {kind} field '{field}'")]
    UnsupportedOperator {
        field: String,
        kind: &'static str,
        operator: &'static str,
    },

    #[error("field '{field}' cannot use value: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("clause on '{field}' has no value; call an operator before compiling")]
    IncompleteClause { field: String },
}

/// Failure reported by a store client.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("unexpected reply: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_carries_key_and_fix() {
        let err = SchemaDefinitionError::ShorthandNotAllowed {
            field: "address".into(),
            kind: "object".into(),
            hint: "\"properties\": { ... }",
        };
        assert_eq!(err.key(), "address");
        let msg = err.to_string();
        assert!(msg.contains("address"));
        assert!(msg.contains("\"properties\""));
    }

    #[test]
    fn test_decode_error_includes_raw_value() {
        let err = DecodeError::InvalidBoolean {
            field: "active".into(),
            raw: "yes".into(),
        };
        assert!(err.to_string().contains("'yes'"));
    }

    #[test]
    fn test_crate_error_from() {
        let err: Error = QueryResolutionError::UnknownField { path: "nope".into() }.into();
        assert!(matches!(err, Error::Query(_)));
        assert!(err.to_string().contains("nope"));
    }
}
