//! Error types for XML decoding operations

use thiserror::Error;

/// Errors that can occur while decoding notification or metadata XML
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The XML was well-formed but did not match the expected shape
    #[error("XML deserialization failed: {0}")]
    XmlDeserializationFailed(String),

    /// The XML itself is malformed (mismatched or unclosed tags, bad attributes)
    #[error("Invalid XML structure: {0}")]
    InvalidXmlStructure(String),

    /// A state variable carried a value that cannot be interpreted
    #[error("Invalid value '{value}' for {field}")]
    InvalidValue {
        /// Name of the state variable
        field: &'static str,
        /// The raw value as received
        value: String,
    },
}

/// Result type alias for decoding operations
pub type ParseResult<T> = Result<T, ParseError>;
