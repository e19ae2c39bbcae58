use thiserror::Error;

pub const MIN_CONTENT_LEN: usize = 50;

/// Why content was rejected as an OFX statement. Checks run in declaration
/// order and stop at the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("file is empty or too small to be an OFX statement")]
    TooSmall,
    #[error("not an OFX file")]
    NotOfx,
    #[error("missing bank or credit card statement section")]
    MissingStatementSection,
    #[error("missing transaction list")]
    MissingTransactionList,
    #[error("no transactions found")]
    NoTransactions,
}

pub fn validate(content: &str) -> Result<(), ValidationError> {
    if content.trim().chars().count() < MIN_CONTENT_LEN {
        return Err(ValidationError::TooSmall);
    }

    let upper = content.to_ascii_uppercase();

    if !upper.contains("<OFX>") && !upper.contains("OFXHEADER:") {
        return Err(ValidationError::NotOfx);
    }
    if !upper.contains("<BANKMSGSRSV1>") && !upper.contains("<CREDITCARDMSGSRSV1>") {
        return Err(ValidationError::MissingStatementSection);
    }
    if !upper.contains("<BANKTRANLIST>") && !upper.contains("<CCSTMTRS>") {
        return Err(ValidationError::MissingTransactionList);
    }
    if !upper.contains("<STMTTRN>") {
        return Err(ValidationError::NoTransactions);
    }

    Ok(())
}
