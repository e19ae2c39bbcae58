//! OFX bank statement parsing for both SGML (1.x) and XML (2.x) exports.

pub mod format;
pub mod statement;
pub mod tags;
pub mod validate;

use thiserror::Error;

pub use format::{detect, FormatInfo, OfxVersion};
pub use statement::{parse_str, parse_transaction, ParsedStatement, ParsedTransaction};
pub use validate::{validate, ValidationError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OfxError {
    #[error("Invalid OFX file: {0}")]
    InvalidFormat(#[from] ValidationError),
}

/// Parses raw file bytes. Bytes that are not valid UTF-8 are replaced, so
/// callers holding a differently-encoded file should decode it first.
pub fn parse(data: &[u8]) -> Result<ParsedStatement, OfxError> {
    let content = String::from_utf8_lossy(data);
    parse_str(&content)
}
