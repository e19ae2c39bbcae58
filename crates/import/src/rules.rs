use saldo_core::CategoryId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prepare::ImportCandidate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPattern {
    pub pattern: String,
    pub category_id: CategoryId,
}

impl CategoryPattern {
    pub fn new(pattern: &str, category_id: CategoryId) -> Self {
        CategoryPattern {
            pattern: pattern.to_string(),
            category_id,
        }
    }

    /// Case-insensitive substring test. Blank patterns never match.
    pub fn matches(&self, description: &str) -> bool {
        let pattern = self.pattern.trim().to_lowercase();
        !pattern.is_empty() && description.to_lowercase().contains(&pattern)
    }
}

#[derive(Error, Debug)]
pub enum RulesError {
    #[error("Failed to parse category patterns: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Deserialize)]
struct PatternFile {
    #[serde(default)]
    category_patterns: Vec<CategoryPattern>,
}

/// Reads `[[category_patterns]]` tables, keeping file order.
pub fn patterns_from_toml(toml_content: &str) -> Result<Vec<CategoryPattern>, RulesError> {
    let file: PatternFile = toml::from_str(toml_content)?;
    Ok(file.category_patterns)
}

/// First matching pattern wins, in the order given.
pub fn suggest(description: &str, patterns: &[CategoryPattern]) -> Option<CategoryId> {
    patterns
        .iter()
        .find(|p| p.matches(description))
        .map(|p| p.category_id)
}

/// Fills `category_id` on candidates that do not have one yet. Returns how
/// many were filled.
pub fn apply_suggestions(candidates: &mut [ImportCandidate], patterns: &[CategoryPattern]) -> usize {
    let mut filled = 0;
    for candidate in candidates.iter_mut().filter(|c| c.category_id.is_none()) {
        if let Some(id) = suggest(&candidate.description, patterns) {
            candidate.category_id = Some(id);
            filled += 1;
        }
    }
    filled
}
