//! Bank Statement Import Module
//!
//! Converts text extracted from bank statement PDFs into normalized
//! per-account transaction ledgers. Each institution has its own parser
//! behind the common [`StatementParser`] trait; the heavy lifting is done
//! by the generic engine in [`engine`], driven by a per-bank
//! [`engine::BankProfile`].

pub mod engine;
pub mod hsbc;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel for holder/period fields the statement did not yield.
pub const UNSPECIFIED: &str = "Sin Especificar";

/// MIME type for the rendered workbook.
pub const XLSX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Statement currency. Argentine statements only distinguish pesos
/// from US dollar accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Currency {
    Pesos,
    Dollars,
}

impl Currency {
    /// Symbol used in the statement text and the rendered report.
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Pesos => "$",
            Currency::Dollars => "U$S",
        }
    }
}

/// Document-level metadata extracted once per statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementMetadata {
    pub holder: String,
    /// Human-readable period, e.g. "Del 01/01/2024 al 31/01/2024".
    pub period: String,
    /// Four-digit year taken from the period start date.
    pub reference_year: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
}

/// One reconciled ledger entry.
///
/// The amount is signed (positive = credit) and is always derived from the
/// running-balance delta, never from a printed sign glyph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    /// Already formatted dd/mm/yyyy, or the statement period as fallback.
    pub date: String,
    pub description: String,
    pub amount: f64,
}

/// One account discovered in the statement's summary region.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub label: String,
    pub currency: Currency,
    pub opening_balance: f64,
    pub closing_balance: f64,
    pub movements: Vec<Movement>,
}

impl AccountInfo {
    /// An account earns a report sheet when it has movements or an
    /// unexplained balance difference.
    pub fn is_reportable(&self) -> bool {
        !self.movements.is_empty() || self.opening_balance != self.closing_balance
    }

    pub fn credit_total(&self) -> f64 {
        self.movements
            .iter()
            .filter(|m| m.amount > 0.0)
            .map(|m| m.amount)
            .sum()
    }

    pub fn debit_total(&self) -> f64 {
        self.movements
            .iter()
            .filter(|m| m.amount < 0.0)
            .map(|m| -m.amount)
            .sum()
    }

    /// Reconciliation check: zero for a balanced statement.
    pub fn control_value(&self) -> f64 {
        let v = self.opening_balance + self.credit_total() - self.debit_total()
            - self.closing_balance;
        (v * 100.0).round() / 100.0
    }
}

/// Accounts keyed by canonical account number, in discovery order.
pub type AccountRegistry = IndexMap<String, AccountInfo>;

/// Result of parsing a full statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedStatement {
    pub bank: String,
    pub metadata: StatementMetadata,
    pub accounts: AccountRegistry,
}

/// Errors crossing the import boundary. Line-level noise never surfaces
/// here; a parse either yields a complete ledger or one of these.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Banco no soportado: {0}")]
    UnsupportedBank(String),
    #[error("No se pudo detectar el banco del contenido")]
    UnknownBank,
    #[error("No se pudo procesar el extracto: {0}")]
    ParseFailed(String),
    #[error("No se pudo leer el PDF: {0}")]
    PdfExtract(String),
}

/// Bank statement parser trait
pub trait StatementParser: Send + Sync {
    /// Check if this parser can handle the given statement text
    fn detect(&self, content: &str) -> bool;

    /// Parse the statement text into per-account ledgers
    fn parse(&self, content: &str) -> Result<ParsedStatement, ImportError>;

    /// Get the bank name
    fn bank_name(&self) -> &'static str;
}

/// All available statement parsers
pub fn get_parsers() -> Vec<Box<dyn StatementParser>> {
    vec![Box::new(hsbc::HsbcParser::new())]
}

/// Look a parser up by bank identifier (case-insensitive).
pub fn parser_for(bank: &str) -> Option<Box<dyn StatementParser>> {
    get_parsers()
        .into_iter()
        .find(|p| p.bank_name().eq_ignore_ascii_case(bank.trim()))
}

/// Name of the first registered parser whose detection patterns match.
pub fn detect_bank(content: &str) -> Option<&'static str> {
    get_parsers()
        .into_iter()
        .find(|p| p.detect(content))
        .map(|p| p.bank_name())
}

/// Parse statement text with the parser registered for `bank`.
pub fn parse_statement(bank: &str, content: &str) -> Result<ParsedStatement, ImportError> {
    let parser =
        parser_for(bank).ok_or_else(|| ImportError::UnsupportedBank(bank.to_string()))?;
    run_guarded(|| parser.parse(content))
}

/// Parse statement text using content auto-detection.
pub fn parse_statement_content(content: &str) -> Result<ParsedStatement, ImportError> {
    for parser in get_parsers() {
        if parser.detect(content) {
            log::info!("Detected bank: {}", parser.bank_name());
            return run_guarded(|| parser.parse(content));
        }
    }
    Err(ImportError::UnknownBank)
}

/// A parser panic on degenerate input surfaces as a typed failure; a half
/// reconciled ledger must never escape this boundary.
fn run_guarded<F>(f: F) -> Result<ParsedStatement, ImportError>
where
    F: FnOnce() -> Result<ParsedStatement, ImportError>,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "error interno".to_string());
            log::error!("statement parser panicked: {}", msg);
            Err(ImportError::ParseFailed(msg))
        }
    }
}

/// Deterministic output file name for a processed statement.
pub fn output_filename(bank: &str) -> String {
    format!("{}_procesado.xlsx", bank.replace(' ', "_"))
}

/// Parse a statement decimal ("1,000.00", "100.00", ".16", "0.43").
///
/// Malformed tokens normalize to 0.0: extraction noise is treated as "no
/// usable amount", not as a parse failure.
pub fn parse_statement_amount(token: &str) -> f64 {
    let clean = token.trim().replace(',', "");
    let clean = if clean.starts_with('.') {
        format!("0{}", clean)
    } else {
        clean
    };
    clean.parse::<f64>().unwrap_or(0.0)
}

/// Extract text from a statement PDF file
pub fn extract_pdf_text(pdf_path: &str) -> Result<String, ImportError> {
    let bytes = std::fs::read(pdf_path)
        .map_err(|e| ImportError::PdfExtract(format!("{}: {}", pdf_path, e)))?;
    extract_pdf_text_from_mem(&bytes)
}

/// Extract text from an in-memory statement PDF
pub fn extract_pdf_text_from_mem(bytes: &[u8]) -> Result<String, ImportError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ImportError::PdfExtract(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statement_amount() {
        assert_eq!(parse_statement_amount("1,000.00"), 1000.0);
        assert_eq!(parse_statement_amount("100.00"), 100.0);
        assert_eq!(parse_statement_amount(".16"), 0.16);
        assert_eq!(parse_statement_amount("0.43"), 0.43);
        assert_eq!(parse_statement_amount("1,234.56"), 1234.56);
    }

    #[test]
    fn test_parse_statement_amount_malformed() {
        assert_eq!(parse_statement_amount("abc"), 0.0);
        assert_eq!(parse_statement_amount(""), 0.0);
        assert_eq!(parse_statement_amount("."), 0.0);
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(
            output_filename("BBVA Frances"),
            "BBVA_Frances_procesado.xlsx"
        );
        assert_eq!(output_filename("HSBC"), "HSBC_procesado.xlsx");
    }

    #[test]
    fn test_parser_for() {
        assert!(parser_for("HSBC").is_some());
        assert!(parser_for("hsbc").is_some());
        assert!(parser_for("Banco Inexistente").is_none());
    }

    #[test]
    fn test_parse_statement_unsupported_bank() {
        let err = parse_statement("Banco Inexistente", "").unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedBank(_)));
    }

    #[test]
    fn test_detect_bank() {
        assert_eq!(detect_bank("HSBC Bank Argentina S.A."), Some("HSBC"));
        assert_eq!(detect_bank("texto sin marcas conocidas"), None);
    }

    #[test]
    fn test_parse_statement_content_unknown() {
        let err = parse_statement_content("texto sin marcas conocidas").unwrap_err();
        assert!(matches!(err, ImportError::UnknownBank));
    }

    #[test]
    fn test_control_value() {
        let account = AccountInfo {
            label: "Cuenta".to_string(),
            currency: Currency::Pesos,
            opening_balance: 500.0,
            closing_balance: 450.0,
            movements: vec![Movement {
                date: "01/01/2024".to_string(),
                description: "PAGO SERVICIOS".to_string(),
                amount: -50.0,
            }],
        };
        assert_eq!(account.control_value(), 0.0);
        assert_eq!(account.credit_total(), 0.0);
        assert_eq!(account.debit_total(), 50.0);
    }

    #[test]
    fn test_is_reportable() {
        let mut account = AccountInfo {
            label: "Cuenta".to_string(),
            currency: Currency::Pesos,
            opening_balance: 100.0,
            closing_balance: 100.0,
            movements: vec![],
        };
        assert!(!account.is_reportable());

        account.closing_balance = 90.0;
        assert!(account.is_reportable());
        assert_eq!(account.control_value(), 10.0);
    }
}
