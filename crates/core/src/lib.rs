pub mod account;
pub mod money;
pub mod transaction;

pub use account::{AccountId, CategoryId, UserId};
pub use money::{Money, MoneyError};
pub use transaction::{Direction, NewLedgerTransaction};
