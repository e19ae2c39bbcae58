pub mod classify;
pub mod ofx;
pub mod prepare;
pub mod rules;

pub use classify::classify;
pub use ofx::{FormatInfo, OfxError, OfxVersion, ParsedStatement, ParsedTransaction, ValidationError};
pub use prepare::{prepare, selected_transactions, summarize, ImportCandidate, ImportSummary};
pub use rules::{apply_suggestions, patterns_from_toml, suggest, CategoryPattern, RulesError};

pub mod import {
    use crate::*;
    use std::collections::HashSet;

    pub fn import_ofx(data: &[u8]) -> Result<ParsedStatement, OfxError> {
        crate::ofx::parse(data)
    }

    /// Parse, deduplicate against `existing_fit_ids` and pre-fill categories.
    pub fn prepare_ofx_import(
        data: &[u8],
        existing_fit_ids: &HashSet<String>,
        patterns: &[CategoryPattern],
    ) -> Result<(ParsedStatement, Vec<ImportCandidate>), OfxError> {
        let statement = import_ofx(data)?;
        let mut candidates = prepare(&statement, existing_fit_ids);
        apply_suggestions(&mut candidates, patterns);
        Ok((statement, candidates))
    }
}
