use rust_decimal::Decimal;
use saldo_core::Direction;

/// Direction for zero-amount movements, keyed by OFX `TRNTYPE`.
pub const TYPE_CODE_DIRECTIONS: &[(&str, Direction)] = &[
    ("CREDIT", Direction::Income),
    ("DEP", Direction::Income),
    ("DIRECTDEP", Direction::Income),
    ("INT", Direction::Income),
    ("DIV", Direction::Income),
    ("DEBIT", Direction::Expense),
    ("CHECK", Direction::Expense),
    ("PAYMENT", Direction::Expense),
    ("FEE", Direction::Expense),
    ("SRVCHG", Direction::Expense),
    ("ATM", Direction::Expense),
    ("POS", Direction::Expense),
    ("XFER", Direction::Expense),
    ("OTHER", Direction::Expense),
];

/// The sign decides; the type code only breaks a zero amount. Unknown codes
/// are expenses.
pub fn classify(type_code: &str, amount: Decimal) -> Direction {
    if amount > Decimal::ZERO {
        return Direction::Income;
    }
    if amount < Decimal::ZERO {
        return Direction::Expense;
    }
    direction_for_type_code(type_code).unwrap_or(Direction::Expense)
}

pub fn direction_for_type_code(type_code: &str) -> Option<Direction> {
    let code = type_code.trim();
    TYPE_CODE_DIRECTIONS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map(|(_, direction)| *direction)
}
