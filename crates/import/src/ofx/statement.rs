use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::format::{self, FormatInfo};
use super::tags::{extract_blocks, extract_optional, extract_value};
use super::validate;
use super::OfxError;

pub const UNKNOWN: &str = "UNKNOWN";
pub const DEFAULT_CURRENCY: &str = "BRL";
pub const DEFAULT_ACCOUNT_TYPE: &str = "CHECKING";
pub const CREDIT_CARD_ACCOUNT_TYPE: &str = "CREDIT_CARD";
pub const DEFAULT_TYPE_CODE: &str = "OTHER";
pub const DEFAULT_DESCRIPTION: &str = "Transação OFX";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub fit_id: String,
    pub type_code: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub amount: Decimal,
    pub description: String,
    pub memo: Option<String>,
    pub check_number: Option<String>,
    pub ref_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedStatement {
    pub bank_id: String,
    pub account_id: String,
    pub account_type: String,
    pub currency: String,
    pub balance: Option<Decimal>,
    pub balance_date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Most recent first; same-day transactions keep their source order.
    pub transactions: Vec<ParsedTransaction>,
    /// Transaction blocks dropped for a missing or malformed required field.
    pub skipped: usize,
    pub format_info: Option<FormatInfo>,
}

/// Validates and parses decoded OFX text.
pub fn parse_str(content: &str) -> Result<ParsedStatement, OfxError> {
    validate::validate(content)?;

    let format_info = format::detect(content);
    let body = normalize(content);
    let upper = body.to_ascii_uppercase();

    let bank_id = extract_optional(&body, "BANKID")
        .or_else(|| extract_optional(&body, "ORG"))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let account_id = extract_optional(&body, "ACCTID").unwrap_or_else(|| UNKNOWN.to_string());
    let account_type = extract_optional(&body, "ACCTTYPE").unwrap_or_else(|| {
        if upper.contains("<CCSTMTRS>") || upper.contains("<CREDITCARDMSGSRSV1>") {
            CREDIT_CARD_ACCOUNT_TYPE.to_string()
        } else {
            DEFAULT_ACCOUNT_TYPE.to_string()
        }
    });
    let currency = extract_optional(&body, "CURDEF").unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let start_date = extract_optional(&body, "DTSTART").and_then(|d| parse_ofx_date(&d));
    let end_date = extract_optional(&body, "DTEND").and_then(|d| parse_ofx_date(&d));

    let (balance, balance_date) = extract_balance(&body);

    let blocks = extract_blocks(&body, "STMTTRN");
    let block_count = blocks.len();
    let mut transactions: Vec<ParsedTransaction> =
        blocks.iter().filter_map(|b| parse_transaction(b)).collect();
    let skipped = block_count - transactions.len();

    // Fixed-width zero-padded dates compare correctly as strings; the sort
    // is stable, so equal dates keep block order.
    transactions.sort_by(|a, b| b.date.cmp(&a.date));

    tracing::debug!(
        account = %account_id,
        parsed = transactions.len(),
        skipped,
        "parsed OFX statement"
    );

    Ok(ParsedStatement {
        bank_id,
        account_id,
        account_type,
        currency,
        balance,
        balance_date,
        start_date,
        end_date,
        transactions,
        skipped,
        format_info: Some(format_info),
    })
}

/// Drops anything before the root element and unifies line endings.
fn normalize(content: &str) -> String {
    let root = content.to_ascii_uppercase().find("<OFX>").unwrap_or(0);
    content[root..].replace("\r\n", "\n").replace('\r', "\n")
}

/// Ledger balance first; a bare `BALAMT` anywhere otherwise.
fn extract_balance(body: &str) -> (Option<Decimal>, Option<String>) {
    if let Some(ledger) = extract_blocks(body, "LEDGERBAL").into_iter().next() {
        if let Some(amount) = extract_optional(&ledger, "BALAMT").and_then(|a| parse_ofx_amount(&a)) {
            let as_of = extract_optional(&ledger, "DTASOF").and_then(|d| parse_ofx_date(&d));
            return (Some(amount), as_of);
        }
    }

    let amount = extract_optional(body, "BALAMT").and_then(|a| parse_ofx_amount(&a));
    let as_of = amount
        .and(extract_optional(body, "DTASOF"))
        .and_then(|d| parse_ofx_date(&d));
    (amount, as_of)
}

/// Parses one `<STMTTRN>` block. `None` when `FITID`, `DTPOSTED` or `TRNAMT`
/// is missing or unparseable.
pub fn parse_transaction(block: &str) -> Option<ParsedTransaction> {
    let fit_id = extract_value(block, "FITID");
    let posted = extract_value(block, "DTPOSTED");
    let raw_amount = extract_value(block, "TRNAMT");

    if fit_id.is_empty() || posted.is_empty() || raw_amount.is_empty() {
        tracing::warn!(
            fit_id = %fit_id,
            "skipping OFX transaction with missing FITID, DTPOSTED or TRNAMT"
        );
        return None;
    }

    let Some(amount) = parse_ofx_amount(&raw_amount) else {
        tracing::warn!(fit_id = %fit_id, amount = %raw_amount, "skipping OFX transaction with invalid amount");
        return None;
    };
    let Some(date) = parse_ofx_date(&posted) else {
        tracing::warn!(fit_id = %fit_id, date = %posted, "skipping OFX transaction with invalid date");
        return None;
    };

    let name = extract_optional(block, "NAME");
    let memo = extract_optional(block, "MEMO");
    let description = name
        .or_else(|| memo.clone())
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

    Some(ParsedTransaction {
        fit_id,
        type_code: extract_optional(block, "TRNTYPE").unwrap_or_else(|| DEFAULT_TYPE_CODE.to_string()),
        date,
        amount,
        description,
        memo,
        check_number: extract_optional(block, "CHECKNUM"),
        ref_number: extract_optional(block, "REFNUM"),
    })
}

/// `YYYYMMDD[HHMMSS[.XXX]][[tz:NAME]]` to `YYYY-MM-DD`. Only month and day
/// ranges are checked, so `20240231` is accepted.
pub(crate) fn parse_ofx_date(s: &str) -> Option<String> {
    let s = s.split('[').next().unwrap_or_default().trim();
    if s.len() < 8 || !s.as_bytes()[..8].iter().all(u8::is_ascii_digit) {
        return None;
    }

    let (year, month, day) = (&s[0..4], &s[4..6], &s[6..8]);
    let m: u32 = month.parse().ok()?;
    let d: u32 = day.parse().ok()?;
    if !(1..=12).contains(&m) || !(1..=31).contains(&d) {
        return None;
    }

    Some(format!("{year}-{month}-{day}"))
}

/// Accepts a comma decimal separator (`-45,90`).
pub(crate) fn parse_ofx_amount(s: &str) -> Option<Decimal> {
    let s = s.trim().replace(',', ".");
    Decimal::from_str(&s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ofx::format::OfxVersion;
    use crate::ofx::ValidationError;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    // ── unit helpers ──────────────────────────────────────────────────────────

    #[test]
    fn parse_ofx_date_8digit() {
        assert_eq!(parse_ofx_date("20240115").as_deref(), Some("2024-01-15"));
    }

    #[test]
    fn parse_ofx_date_with_time_and_timezone() {
        assert_eq!(parse_ofx_date("20240115120000[-3:BRT]").as_deref(), Some("2024-01-15"));
        assert_eq!(parse_ofx_date("20240115120000.000[-5:EST]").as_deref(), Some("2024-01-15"));
    }

    #[test]
    fn parse_ofx_date_is_permissive_about_calendar() {
        assert_eq!(parse_ofx_date("20240231").as_deref(), Some("2024-02-31"));
    }

    #[test]
    fn parse_ofx_date_rejects_bad_ranges_and_short_input() {
        assert_eq!(parse_ofx_date("20241315"), None);
        assert_eq!(parse_ofx_date("20240100"), None);
        assert_eq!(parse_ofx_date("20240132"), None);
        assert_eq!(parse_ofx_date("2024011"), None);
        assert_eq!(parse_ofx_date("not-a-date"), None);
        assert_eq!(parse_ofx_date(""), None);
    }

    #[test]
    fn parse_ofx_amount_variants() {
        assert_eq!(parse_ofx_amount("-45.90"), Some(dec("-45.90")));
        assert_eq!(parse_ofx_amount("-45,90"), Some(dec("-45.90")));
        assert_eq!(parse_ofx_amount(" 5000.00 "), Some(dec("5000.00")));
        assert_eq!(parse_ofx_amount("abc"), None);
        assert_eq!(parse_ofx_amount(""), None);
    }

    // ── transaction blocks ────────────────────────────────────────────────────

    #[test]
    fn block_requires_fitid() {
        let block = "<STMTTRN>\n<DTPOSTED>20240115\n<TRNAMT>-10.00\n<NAME>Loja";
        assert_eq!(parse_transaction(block), None);
    }

    #[test]
    fn block_requires_valid_amount_and_date() {
        assert_eq!(
            parse_transaction("<STMTTRN><FITID>1</FITID><DTPOSTED>20240115</DTPOSTED><TRNAMT>dez</TRNAMT></STMTTRN>"),
            None
        );
        assert_eq!(
            parse_transaction("<STMTTRN><FITID>1</FITID><DTPOSTED>2024</DTPOSTED><TRNAMT>1.00</TRNAMT></STMTTRN>"),
            None
        );
    }

    #[test]
    fn description_falls_back_to_memo_then_placeholder() {
        let with_memo = parse_transaction(
            "<STMTTRN>\n<FITID>1\n<DTPOSTED>20240115\n<TRNAMT>-1.00\n<MEMO>PIX enviado\n",
        )
        .unwrap();
        assert_eq!(with_memo.description, "PIX enviado");
        assert_eq!(with_memo.memo.as_deref(), Some("PIX enviado"));

        let bare = parse_transaction("<STMTTRN>\n<FITID>2\n<DTPOSTED>20240115\n<TRNAMT>-1.00\n").unwrap();
        assert_eq!(bare.description, DEFAULT_DESCRIPTION);
        assert_eq!(bare.type_code, DEFAULT_TYPE_CODE);
    }

    #[test]
    fn block_optional_fields() {
        let tx = parse_transaction(
            "<STMTTRN><TRNTYPE>CHECK</TRNTYPE><FITID>9</FITID><DTPOSTED>20240301</DTPOSTED>\
             <TRNAMT>-200.00</TRNAMT><CHECKNUM>000123</CHECKNUM><REFNUM>R-77</REFNUM>\
             <NAME>Aluguel</NAME></STMTTRN>",
        )
        .unwrap();
        assert_eq!(tx.type_code, "CHECK");
        assert_eq!(tx.check_number.as_deref(), Some("000123"));
        assert_eq!(tx.ref_number.as_deref(), Some("R-77"));
        assert_eq!(tx.memo, None);
    }

    // ── full statement parse ──────────────────────────────────────────────────

    const SGML_STATEMENT: &str = "OFXHEADER:100\r
DATA:OFXSGML\r
VERSION:102\r
ENCODING:USASCII\r
CHARSET:1252\r
\r
<OFX>\r
<SIGNONMSGSRSV1><SONRS><STATUS><CODE>0<SEVERITY>INFO</STATUS><FI><ORG>Banco Exemplo</FI></SONRS></SIGNONMSGSRSV1>\r
<BANKMSGSRSV1>\r
<STMTTRNRS>\r
<STMTRS>\r
<CURDEF>BRL\r
<BANKACCTFROM>\r
<BANKID>0341\r
<ACCTID>12345-6\r
<ACCTTYPE>CHECKING\r
</BANKACCTFROM>\r
<BANKTRANLIST>\r
<DTSTART>20240101100000[-3:BRT]\r
<DTEND>20240131100000[-3:BRT]\r
<STMTTRN>\r
<TRNTYPE>DEBIT\r
<DTPOSTED>20240115\r
<TRNAMT>-45.90\r
<FITID>1001\r
<NAME>Supermercado\r
<STMTTRN>\r
<TRNTYPE>CREDIT\r
<DTPOSTED>20240120\r
<TRNAMT>1500,00\r
<FITID>1002\r
<MEMO>Transferencia recebida\r
<STMTTRN>\r
<TRNTYPE>DEBIT\r
<DTPOSTED>20240115\r
<TRNAMT>-8.00\r
<FITID>1003\r
<NAME>Padaria\r
</BANKTRANLIST>\r
<LEDGERBAL>\r
<BALAMT>2345.67\r
<DTASOF>20240131\r
</LEDGERBAL>\r
<AVAILBAL>\r
<BALAMT>2000.00\r
<DTASOF>20240131\r
</AVAILBAL>\r
</STMTRS>\r
</STMTTRNRS>\r
</BANKMSGSRSV1>\r
</OFX>\r
";

    const XML_STATEMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<?OFX OFXHEADER="200" VERSION="211" SECURITY="NONE" OLDFILEUID="NONE" NEWFILEUID="NONE"?>
<OFX>
  <CREDITCARDMSGSRSV1>
    <CCSTMTTRNRS>
      <CCSTMTRS>
        <CURDEF>USD</CURDEF>
        <CCACCTFROM><ACCTID>4111</ACCTID></CCACCTFROM>
        <BANKTRANLIST>
          <STMTTRN><TRNTYPE>DEBIT</TRNTYPE><DTPOSTED>20240305</DTPOSTED><TRNAMT>-12.50</TRNAMT><FITID>A1</FITID><NAME>Cafe</NAME></STMTTRN>
          <STMTTRN><TRNTYPE>CREDIT</TRNTYPE><DTPOSTED>20240310</DTPOSTED><TRNAMT>5000.00</TRNAMT><FITID>A2</FITID><NAME>Salario</NAME></STMTTRN>
        </BANKTRANLIST>
        <BALAMT>-310.25</BALAMT>
      </CCSTMTRS>
    </CCSTMTTRNRS>
  </CREDITCARDMSGSRSV1>
</OFX>"#;

    #[test]
    fn parse_sgml_statement_metadata() {
        let stmt = parse_str(SGML_STATEMENT).unwrap();
        assert_eq!(stmt.bank_id, "0341");
        assert_eq!(stmt.account_id, "12345-6");
        assert_eq!(stmt.account_type, "CHECKING");
        assert_eq!(stmt.currency, "BRL");
        assert_eq!(stmt.start_date.as_deref(), Some("2024-01-01"));
        assert_eq!(stmt.end_date.as_deref(), Some("2024-01-31"));
        assert_eq!(stmt.balance, Some(dec("2345.67")));
        assert_eq!(stmt.balance_date.as_deref(), Some("2024-01-31"));
        assert_eq!(stmt.skipped, 0);

        let info = stmt.format_info.unwrap();
        assert_eq!(info.version_major, OfxVersion::V1);
        assert_eq!(info.header_version, "102");
    }

    #[test]
    fn parse_sgml_statement_sorted_most_recent_first() {
        let stmt = parse_str(SGML_STATEMENT).unwrap();
        let ids: Vec<&str> = stmt.transactions.iter().map(|t| t.fit_id.as_str()).collect();
        // 1001 and 1003 share a date and keep block order.
        assert_eq!(ids, vec!["1002", "1001", "1003"]);
        assert_eq!(stmt.transactions[0].amount, dec("1500.00"));
        assert_eq!(stmt.transactions[0].description, "Transferencia recebida");
    }

    #[test]
    fn parse_xml_credit_card_statement() {
        let stmt = parse_str(XML_STATEMENT).unwrap();
        assert_eq!(stmt.account_id, "4111");
        assert_eq!(stmt.bank_id, UNKNOWN);
        assert_eq!(stmt.account_type, CREDIT_CARD_ACCOUNT_TYPE);
        assert_eq!(stmt.currency, "USD");
        assert_eq!(stmt.balance, Some(dec("-310.25")));
        assert_eq!(stmt.start_date, None);
        assert_eq!(stmt.transactions.len(), 2);
        assert_eq!(stmt.transactions[0].fit_id, "A2");

        let info = stmt.format_info.unwrap();
        assert_eq!(info.version_major, OfxVersion::V2);
        assert_eq!(info.header_version, "211");
    }

    #[test]
    fn bank_id_falls_back_to_org() {
        let content = SGML_STATEMENT.replace("<BANKID>0341\r\n", "");
        let stmt = parse_str(&content).unwrap();
        assert_eq!(stmt.bank_id, "Banco Exemplo");
    }

    #[test]
    fn defaults_when_account_fields_missing() {
        let content = SGML_STATEMENT
            .replace("<ACCTID>12345-6\r\n", "")
            .replace("<ACCTTYPE>CHECKING\r\n", "")
            .replace("<CURDEF>BRL\r\n", "");
        let stmt = parse_str(&content).unwrap();
        assert_eq!(stmt.account_id, UNKNOWN);
        assert_eq!(stmt.account_type, DEFAULT_ACCOUNT_TYPE);
        assert_eq!(stmt.currency, DEFAULT_CURRENCY);
    }

    #[test]
    fn balance_absent_is_none() {
        let content = SGML_STATEMENT
            .replace("<BALAMT>2345.67\r\n", "")
            .replace("<BALAMT>2000.00\r\n", "");
        let stmt = parse_str(&content).unwrap();
        assert_eq!(stmt.balance, None);
        assert_eq!(stmt.balance_date, None);
    }

    #[test]
    fn malformed_block_is_skipped_not_fatal() {
        let content = SGML_STATEMENT.replace("<FITID>1002\r\n", "");
        let stmt = parse_str(&content).unwrap();
        assert_eq!(stmt.transactions.len(), 2);
        assert_eq!(stmt.skipped, 1);
    }

    #[test]
    fn all_blocks_skipped_is_an_empty_statement() {
        let content = SGML_STATEMENT.replace("<FITID>", "<XFITID>");
        let stmt = parse_str(&content).unwrap();
        assert!(stmt.transactions.is_empty());
        assert_eq!(stmt.skipped, 3);
    }

    #[test]
    fn invalid_content_is_rejected() {
        assert_eq!(
            parse_str("hello"),
            Err(OfxError::InvalidFormat(ValidationError::TooSmall))
        );
    }

    #[test]
    fn parsing_is_deterministic() {
        assert_eq!(parse_str(SGML_STATEMENT).unwrap(), parse_str(SGML_STATEMENT).unwrap());
        assert_eq!(parse_str(XML_STATEMENT).unwrap(), parse_str(XML_STATEMENT).unwrap());
    }

    #[test]
    fn transactions_are_non_increasing_by_date() {
        for content in [SGML_STATEMENT, XML_STATEMENT] {
            let stmt = parse_str(content).unwrap();
            assert!(stmt.transactions.windows(2).all(|w| w[0].date >= w[1].date));
        }
    }

    #[test]
    fn parse_bytes_entry_point() {
        let stmt = crate::ofx::parse(SGML_STATEMENT.as_bytes()).unwrap();
        assert_eq!(stmt.transactions.len(), 3);
    }
}
