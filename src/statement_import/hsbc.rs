//! HSBC Argentina statement parser.
//!
//! HSBC extractos are multi-page, multi-account documents: a summary block
//! near the top lists every product with its previous and final balance,
//! then one movement section per account follows, re-opened on every page
//! with the account header.

use super::engine::{BankProfile, StatementEngine};
use super::{ImportError, ParsedStatement, StatementParser};

pub static HSBC_PROFILE: BankProfile = BankProfile {
    bank_name: "HSBC",
    default_year: "2024",
    holder_marker: "SUCURSAL",
    holder_scan_lines: 15,
    period_pattern: r"EXTRACTO DEL\s*(\d{2}/\d{2}/\d{4})\s*AL\s*(\d{2}/\d{2}/\d{4})",
    period_scan_lines: 35,
    summary_start_markers: ["PRODUCTO", "SALDO ANTERIOR"],
    summary_end_marker: "DETALLE DE OPERACIONES",
    account_header_pattern: r"(?:NRO\. )?(\d{3,4}-\d-\d{5}-\d)",
    section_markers: &["CUENTA", "CAJA", "WPB"],
    section_end_markers: &["DETALLE DE TITULARIDAD", "CALCULO DE INTERESES"],
    balance_label_markers: &["- SALDO ANTERIOR", "- SALDO FINAL"],
    header_row_markers: ["FECHA", "SALDO"],
    footer_markers: ["HOJA", "DE"],
    foreign_currency_marker: "u$s",
    label_noise_pattern: r"(?i)(SUCURSAL|SUC|MRNEZ|SLEIL|CENTRO|MICROCENTRO)",
    reconcile_tolerance: 1.0,
};

pub struct HsbcParser {
    detect_patterns: Vec<&'static str>,
}

impl HsbcParser {
    pub fn new() -> Self {
        Self {
            detect_patterns: vec![
                "HSBC Bank Argentina",
                "HSBC",
                "EXTRACTO DEL",
            ],
        }
    }
}

impl Default for HsbcParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for HsbcParser {
    fn detect(&self, content: &str) -> bool {
        self.detect_patterns.iter().any(|p| content.contains(p))
    }

    fn parse(&self, content: &str) -> Result<ParsedStatement, ImportError> {
        let engine = StatementEngine::new(&HSBC_PROFILE)?;
        engine.parse(content)
    }

    fn bank_name(&self) -> &'static str {
        "HSBC"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement_import::Currency;

    #[test]
    fn test_detect() {
        let parser = HsbcParser::new();
        assert!(parser.detect("HSBC Bank Argentina S.A."));
        assert!(parser.detect("EXTRACTO DEL 01/01/2024 AL 31/01/2024"));
        assert!(!parser.detect("Banco Galicia y Buenos Aires"));
    }

    #[test]
    fn test_parse_single_account_statement() {
        let parser = HsbcParser::new();

        let content = r#"HSBC Bank Argentina S.A.
EMPRESA EJEMPLO S.A. SUCURSAL MICROCENTRO (042)
EXTRACTO DEL 01/01/2024 AL 31/01/2024
PRODUCTO SALDO ANTERIOR SALDO FINAL
CUENTA CORRIENTE SUCURSAL CENTRO 191-1-12345-6 500.00 450.00
- DETALLE DE OPERACIONES -
CUENTA CORRIENTE NRO. 191-1-12345-6
FECHA DESCRIPCION IMPORTE SALDO
- SALDO ANTERIOR 500.00
01-ENE PAGO SERVICIOS 50.00 450.00
- SALDO FINAL 450.00
DETALLE DE TITULARIDAD
"#;

        let statement = parser.parse(content).unwrap();
        assert_eq!(statement.bank, "HSBC");
        assert_eq!(statement.metadata.holder, "EMPRESA EJEMPLO S.A.");
        assert_eq!(
            statement.metadata.period,
            "Del 01/01/2024 al 31/01/2024"
        );
        assert_eq!(statement.metadata.reference_year, "2024");

        assert_eq!(statement.accounts.len(), 1);
        let account = &statement.accounts["191-1-12345-6"];
        assert_eq!(account.label, "CUENTA CORRIENTE");
        assert_eq!(account.currency, Currency::Pesos);
        assert_eq!(account.opening_balance, 500.0);
        assert_eq!(account.closing_balance, 450.0);

        assert_eq!(account.movements.len(), 1);
        let movement = &account.movements[0];
        assert_eq!(movement.date, "01/01/2024");
        assert_eq!(movement.description, "PAGO SERVICIOS");
        assert!((movement.amount + 50.0).abs() < 0.001);

        // balanced statement: the control cell comes out at zero
        assert_eq!(account.control_value(), 0.0);
    }

    #[test]
    fn test_parse_multi_account_statement() {
        let parser = HsbcParser::new();

        let content = r#"HSBC Bank Argentina S.A.
EMPRESA EJEMPLO S.A. SUCURSAL MICROCENTRO (042)
EXTRACTO DEL 01/03/2024 AL 31/03/2024
PRODUCTO SALDO ANTERIOR SALDO FINAL
CUENTA CORRIENTE SUCURSAL CENTRO 191-1-12345-6 1,000.00 1,020.00
CAJA DE AHORRO U$S SUC MRNEZ 802-2-54321-9 500.00 500.00
- DETALLE DE OPERACIONES -
CUENTA CORRIENTE NRO. 191-1-12345-6
FECHA DESCRIPCION IMPORTE SALDO
- SALDO ANTERIOR 1,000.00
05-MAR DEPOSITO EFECTIVO 70.00 1,070.00
- TRANSFERENCIA RECIBIDA INTERBANCARIA
10-MAR PAGO PROVEEDOR 50.00 1,020.00
HOJA 1 DE 2
- SALDO FINAL 1,020.00
DETALLE DE TITULARIDAD
CAJA DE AHORRO U$S NRO. 802-2-54321-9
FECHA DESCRIPCION IMPORTE SALDO
- SALDO ANTERIOR 500.00
- SALDO FINAL 500.00
CALCULO DE INTERESES
"#;

        let statement = parser.parse(content).unwrap();
        assert_eq!(statement.accounts.len(), 2);

        let current = &statement.accounts["191-1-12345-6"];
        assert_eq!(current.movements.len(), 2);
        assert!((current.movements[0].amount - 70.0).abs() < 0.001);
        assert_eq!(
            current.movements[0].description,
            "DEPOSITO EFECTIVO TRANSFERENCIA RECIBIDA INTERBANCARIA"
        );
        assert_eq!(current.movements[0].date, "05/03/2024");
        assert!((current.movements[1].amount + 50.0).abs() < 0.001);
        assert_eq!(current.control_value(), 0.0);

        // the dollar savings account had no movements
        let savings = &statement.accounts["802-2-54321-9"];
        assert_eq!(savings.currency, Currency::Dollars);
        assert!(savings.movements.is_empty());
        assert!(!savings.is_reportable());
    }

    #[test]
    fn test_accounts_keep_discovery_order() {
        let parser = HsbcParser::new();

        let content = r#"EXTRACTO DEL 01/01/2024 AL 31/01/2024
PRODUCTO SALDO ANTERIOR SALDO FINAL
CAJA DE AHORRO 802-2-54321-9 10.00 10.00
CUENTA CORRIENTE 191-1-12345-6 20.00 20.00
DETALLE DE OPERACIONES
"#;

        let statement = parser.parse(content).unwrap();
        let keys: Vec<&String> = statement.accounts.keys().collect();
        assert_eq!(keys, vec!["802-2-54321-9", "191-1-12345-6"]);
    }
}
