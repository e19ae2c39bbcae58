use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::{AccountId, CategoryId, UserId};
use super::money::Money;

/// Whether a ledger movement adds to or takes from the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Income,
    Expense,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Income => "income",
            Direction::Expense => "expense",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Direction::Income),
            "expense" => Ok(Direction::Expense),
            other => Err(format!("Unknown direction: '{other}'")),
        }
    }
}

/// A ledger row ready to be inserted by the store.
///
/// `amount` is unsigned; the sign lives in `direction`. `fit_id` is kept so
/// later imports of overlapping statements can be deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLedgerTransaction {
    pub user_id: UserId,
    pub account_id: AccountId,
    pub fit_id: Option<String>,
    pub date: String,
    pub description: String,
    pub memo: Option<String>,
    pub amount: Money,
    pub direction: Direction,
    pub category_id: Option<CategoryId>,
}

impl NewLedgerTransaction {
    /// The amount with the direction applied: negative for expenses.
    pub fn signed_amount(&self) -> Money {
        match self.direction {
            Direction::Income => self.amount,
            Direction::Expense => Money::zero() - self.amount,
        }
    }
}
