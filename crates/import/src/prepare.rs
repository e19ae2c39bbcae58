use saldo_core::{AccountId, CategoryId, Direction, Money, NewLedgerTransaction, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::classify::classify;
use crate::ofx::{ParsedStatement, ParsedTransaction};

/// A parsed transaction annotated for review before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportCandidate {
    pub fit_id: String,
    pub date: String,
    /// Unsigned; the sign is carried by `direction`.
    pub amount: Money,
    pub direction: Direction,
    pub description: String,
    pub memo: Option<String>,
    pub is_duplicate: bool,
    pub selected: bool,
    pub category_id: Option<CategoryId>,
}

impl ImportCandidate {
    pub fn from_parsed(tx: &ParsedTransaction, is_duplicate: bool) -> Self {
        ImportCandidate {
            fit_id: tx.fit_id.clone(),
            date: tx.date.clone(),
            amount: Money::from_decimal(tx.amount.abs()),
            direction: classify(&tx.type_code, tx.amount),
            description: tx.description.clone(),
            memo: tx.memo.clone(),
            is_duplicate,
            selected: !is_duplicate,
            category_id: None,
        }
    }

    pub fn to_ledger_transaction(&self, user_id: UserId, account_id: AccountId) -> NewLedgerTransaction {
        NewLedgerTransaction {
            user_id,
            account_id,
            fit_id: Some(self.fit_id.clone()),
            date: self.date.clone(),
            description: self.description.clone(),
            memo: self.memo.clone(),
            amount: self.amount,
            direction: self.direction,
            category_id: self.category_id,
        }
    }
}

/// Marks every transaction whose FITID is already stored as a duplicate.
///
/// Duplicates stay in the list, unselected, so a reviewer can see them and
/// override the selection. Order follows the statement (most recent first).
pub fn prepare(statement: &ParsedStatement, existing_fit_ids: &HashSet<String>) -> Vec<ImportCandidate> {
    let candidates: Vec<ImportCandidate> = statement
        .transactions
        .iter()
        .map(|tx| ImportCandidate::from_parsed(tx, existing_fit_ids.contains(&tx.fit_id)))
        .collect();

    tracing::debug!(
        total = candidates.len(),
        duplicates = candidates.iter().filter(|c| c.is_duplicate).count(),
        "prepared import candidates"
    );
    candidates
}

/// Ledger rows for the selected candidates only.
pub fn selected_transactions(
    candidates: &[ImportCandidate],
    user_id: UserId,
    account_id: AccountId,
) -> Vec<NewLedgerTransaction> {
    candidates
        .iter()
        .filter(|c| c.selected)
        .map(|c| c.to_ledger_transaction(user_id, account_id))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total: usize,
    pub duplicates: usize,
    pub selected: usize,
}

pub fn summarize(candidates: &[ImportCandidate]) -> ImportSummary {
    candidates.iter().fold(ImportSummary::default(), |mut s, c| {
        s.total += 1;
        s.duplicates += usize::from(c.is_duplicate);
        s.selected += usize::from(c.selected);
        s
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ofx::parse_str;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn parsed(fit_id: &str, type_code: &str, date: &str, amount: &str) -> ParsedTransaction {
        ParsedTransaction {
            fit_id: fit_id.to_string(),
            type_code: type_code.to_string(),
            date: date.to_string(),
            amount: Decimal::from_str(amount).unwrap(),
            description: format!("tx {fit_id}"),
            memo: None,
            check_number: None,
            ref_number: None,
        }
    }

    fn statement(transactions: Vec<ParsedTransaction>) -> ParsedStatement {
        ParsedStatement {
            bank_id: "0341".to_string(),
            account_id: "12345-6".to_string(),
            account_type: "CHECKING".to_string(),
            currency: "BRL".to_string(),
            balance: None,
            balance_date: None,
            start_date: None,
            end_date: None,
            transactions,
            skipped: 0,
            format_info: None,
        }
    }

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn known_fit_id_is_unselected_duplicate() {
        let stmt = statement(vec![parsed("1001", "DEBIT", "2024-01-15", "-45.90")]);
        let candidates = prepare(&stmt, &ids(&["1001"]));
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].is_duplicate);
        assert!(!candidates[0].selected);
    }

    #[test]
    fn duplicate_flags_follow_membership() {
        let stmt = statement(vec![
            parsed("3", "DEBIT", "2024-01-20", "-1.00"),
            parsed("2", "DEBIT", "2024-01-19", "-2.00"),
            parsed("1", "DEBIT", "2024-01-18", "-3.00"),
        ]);
        let existing = ids(&["1", "3", "99"]);
        let candidates = prepare(&stmt, &existing);

        for c in &candidates {
            assert_eq!(c.is_duplicate, existing.contains(&c.fit_id));
            assert_eq!(c.selected, !existing.contains(&c.fit_id));
        }
        let order: Vec<&str> = candidates.iter().map(|c| c.fit_id.as_str()).collect();
        assert_eq!(order, vec!["3", "2", "1"]);
    }

    #[test]
    fn amount_is_unsigned_with_two_places() {
        let stmt = statement(vec![
            parsed("1", "DEBIT", "2024-01-15", "-45.9"),
            parsed("2", "CREDIT", "2024-03-10", "5000"),
        ]);
        let candidates = prepare(&stmt, &HashSet::new());
        assert_eq!(candidates[0].amount.to_string(), "45.90");
        assert_eq!(candidates[0].direction, Direction::Expense);
        assert_eq!(candidates[1].amount.to_string(), "5000.00");
        assert_eq!(candidates[1].direction, Direction::Income);
    }

    #[test]
    fn zero_amount_direction_from_type_code() {
        let stmt = statement(vec![
            parsed("1", "DEP", "2024-01-15", "0.00"),
            parsed("2", "SRVCHG", "2024-01-15", "0.00"),
        ]);
        let candidates = prepare(&stmt, &HashSet::new());
        assert_eq!(candidates[0].direction, Direction::Income);
        assert_eq!(candidates[1].direction, Direction::Expense);
    }

    #[test]
    fn duplicates_are_kept_in_the_list() {
        let stmt = statement(vec![
            parsed("a", "DEBIT", "2024-01-15", "-1.00"),
            parsed("b", "DEBIT", "2024-01-14", "-1.00"),
        ]);
        let candidates = prepare(&stmt, &ids(&["a", "b"]));
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| !c.selected));
    }

    #[test]
    fn summary_counts() {
        let stmt = statement(vec![
            parsed("a", "DEBIT", "2024-01-15", "-1.00"),
            parsed("b", "DEBIT", "2024-01-14", "-1.00"),
            parsed("c", "CREDIT", "2024-01-13", "1.00"),
        ]);
        let candidates = prepare(&stmt, &ids(&["b"]));
        assert_eq!(
            summarize(&candidates),
            ImportSummary { total: 3, duplicates: 1, selected: 2 }
        );
        assert_eq!(summarize(&[]), ImportSummary::default());
    }

    #[test]
    fn selected_rows_carry_fit_id_and_owner() {
        let stmt = statement(vec![
            parsed("a", "DEBIT", "2024-01-15", "-10.00"),
            parsed("b", "CREDIT", "2024-01-14", "20.00"),
        ]);
        let mut candidates = prepare(&stmt, &ids(&["a"]));
        candidates[1].category_id = Some(CategoryId(7));

        let rows = selected_transactions(&candidates, UserId(1), AccountId(2));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fit_id.as_deref(), Some("b"));
        assert_eq!(rows[0].user_id, UserId(1));
        assert_eq!(rows[0].account_id, AccountId(2));
        assert_eq!(rows[0].amount, Money::from_cents(2000));
        assert_eq!(rows[0].category_id, Some(CategoryId(7)));
    }

    #[test]
    fn user_can_override_duplicate_selection() {
        let stmt = statement(vec![parsed("a", "DEBIT", "2024-01-15", "-10.00")]);
        let mut candidates = prepare(&stmt, &ids(&["a"]));
        candidates[0].selected = true;
        assert_eq!(selected_transactions(&candidates, UserId(1), AccountId(2)).len(), 1);
    }

    #[test]
    fn sgml_scenario_end_to_end() {
        let content = "OFXHEADER:100\nDATA:OFXSGML\n\n<OFX>\n<BANKMSGSRSV1>\n<STMTTRNRS>\n<STMTRS>\n\
                       <BANKTRANLIST>\n<STMTTRN>\n<TRNTYPE>DEBIT\n<FITID>1001\n<DTPOSTED>20240115\n\
                       <TRNAMT>-45.90\n<NAME>Supermercado\n</BANKTRANLIST>\n</STMTRS>\n</STMTTRNRS>\n\
                       </BANKMSGSRSV1>\n</OFX>\n";
        let stmt = parse_str(content).unwrap();
        assert_eq!(stmt.transactions.len(), 1);
        let tx = &stmt.transactions[0];
        assert_eq!(tx.date, "2024-01-15");
        assert_eq!(tx.amount, Decimal::from_str("-45.90").unwrap());

        let candidates = prepare(&stmt, &HashSet::new());
        assert_eq!(candidates[0].direction, Direction::Expense);
        assert!(candidates[0].selected);

        let again = prepare(&stmt, &ids(&["1001"]));
        assert!(again[0].is_duplicate);
        assert!(!again[0].selected);
    }

    #[test]
    fn xml_scenario_end_to_end() {
        let content = "<?xml version=\"1.0\"?>\n<OFX><BANKMSGSRSV1><STMTTRNRS><STMTRS><BANKTRANLIST>\
                       <STMTTRN><FITID>2002</FITID><DTPOSTED>20240310</DTPOSTED><TRNAMT>5000.00</TRNAMT>\
                       <NAME>Salario</NAME></STMTTRN></BANKTRANLIST></STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>";
        let stmt = parse_str(content).unwrap();
        assert_eq!(stmt.transactions.len(), 1);

        let candidates = prepare(&stmt, &HashSet::new());
        assert_eq!(candidates[0].direction, Direction::Income);
        assert_eq!(candidates[0].amount.to_string(), "5000.00");
        assert_eq!(candidates[0].description, "Salario");
    }

    #[test]
    fn one_malformed_block_of_two_yields_one() {
        let content = "<?xml version=\"1.0\"?>\n<OFX><BANKMSGSRSV1><STMTTRNRS><STMTRS><BANKTRANLIST>\
                       <STMTTRN><DTPOSTED>20240310</DTPOSTED><TRNAMT>1.00</TRNAMT></STMTTRN>\
                       <STMTTRN><FITID>2</FITID><DTPOSTED>20240311</DTPOSTED><TRNAMT>2.00</TRNAMT></STMTTRN>\
                       </BANKTRANLIST></STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>";
        let stmt = parse_str(content).unwrap();
        assert_eq!(stmt.transactions.len(), 1);
        assert_eq!(stmt.transactions[0].fit_id, "2");
    }
}
