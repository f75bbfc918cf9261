use thiserror::Error;

/// Common error types shared across the workspace.
#[derive(Error, Debug, PartialEq)]
pub enum CommonError {
    /// A symbol was empty or contained characters that cannot name an asset.
    #[error("Invalid asset symbol: {0:?}")]
    InvalidSymbol(String),

    /// Represents an error during data parsing or deserialization.
    #[error("Parse error: {0}")]
    ParseError(String),
}
