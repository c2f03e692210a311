//! Protocol error codes.
//!
//! Errors never cross the protocol boundary as failures: every reply carries
//! exactly one of these codes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::message::{DecodeError, DecodeResult};

/// Outcome code carried by every protocol reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Request handled.
    NoError,
    /// Target id in the message does not match the mediator.
    InvalidId,
    /// Malformed message or missing required field.
    InvalidData,
    /// Predicate references an attribute the target does not expose.
    InvalidAttribute,
    /// Predicate tree is structurally invalid.
    InvalidQuery,
    /// Update or unregister names a component that is not registered.
    UnknownComponent,
    /// Unsubscribe names a subscription that does not exist.
    UnknownSubscriber,
    /// Subscription bound to an event callback the mediator does not emit.
    UnknownCallback,
    /// Paging request references an unknown cursor.
    QueryNotFound,
    /// Query message carries no predicate.
    EmptyQuery,
    /// Valid predicate, no matching component.
    EmptyResult,
    /// Transport or encoding failure.
    IoError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoError => "noError",
            ErrorCode::InvalidId => "invalidId",
            ErrorCode::InvalidData => "invalidData",
            ErrorCode::InvalidAttribute => "invalidAttribute",
            ErrorCode::InvalidQuery => "invalidQuery",
            ErrorCode::UnknownComponent => "unknownComponent",
            ErrorCode::UnknownSubscriber => "unknownSubscriber",
            ErrorCode::UnknownCallback => "unknownCallback",
            ErrorCode::QueryNotFound => "queryNotFound",
            ErrorCode::EmptyQuery => "emptyQuery",
            ErrorCode::EmptyResult => "emptyResult",
            ErrorCode::IoError => "ioError",
        }
    }

    pub fn parse(raw: &str) -> DecodeResult<Self> {
        let code = match raw.trim() {
            "noError" => ErrorCode::NoError,
            "invalidId" => ErrorCode::InvalidId,
            "invalidData" => ErrorCode::InvalidData,
            "invalidAttribute" => ErrorCode::InvalidAttribute,
            "invalidQuery" => ErrorCode::InvalidQuery,
            "unknownComponent" => ErrorCode::UnknownComponent,
            "unknownSubscriber" => ErrorCode::UnknownSubscriber,
            "unknownCallback" => ErrorCode::UnknownCallback,
            "queryNotFound" => ErrorCode::QueryNotFound,
            "emptyQuery" => ErrorCode::EmptyQuery,
            "emptyResult" => ErrorCode::EmptyResult,
            "ioError" => ErrorCode::IoError,
            other => {
                return Err(DecodeError::UnknownVariant {
                    kind: "error code",
                    value: other.to_string(),
                })
            }
        };
        Ok(code)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ErrorCode::NoError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_parse_their_display() {
        let all = [
            ErrorCode::NoError,
            ErrorCode::InvalidId,
            ErrorCode::InvalidData,
            ErrorCode::InvalidAttribute,
            ErrorCode::InvalidQuery,
            ErrorCode::UnknownComponent,
            ErrorCode::UnknownSubscriber,
            ErrorCode::UnknownCallback,
            ErrorCode::QueryNotFound,
            ErrorCode::EmptyQuery,
            ErrorCode::EmptyResult,
            ErrorCode::IoError,
        ];
        for code in all {
            assert_eq!(ErrorCode::parse(&code.to_string()).unwrap(), code);
        }
        assert!(ErrorCode::parse("kaput").is_err());
    }

    #[test]
    fn test_no_data_and_invalid_query_are_distinct() {
        assert_ne!(ErrorCode::EmptyResult, ErrorCode::InvalidQuery);
        assert!(!ErrorCode::EmptyResult.is_ok());
    }
}
