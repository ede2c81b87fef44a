//! XLSX report rendering for parsed statements.
//!
//! Consumes a finished [`ParsedStatement`] and produces the styled
//! workbook: one sheet per reportable account with a title band, balance
//! cells, side-by-side credit and debit columns with SUM totals, and a
//! control cell that must come out at zero for a balanced statement. This
//! module does no parsing.

use rust_xlsxwriter::{
    Color, ConditionalFormatCell, ConditionalFormatCellRule, Format, FormatAlign, FormatBorder,
    Formula, Workbook, Worksheet, XlsxError,
};
use thiserror::Error;

use crate::statement_import::{AccountInfo, ParsedStatement};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("No se pudo generar el reporte: {0}")]
    Workbook(#[from] XlsxError),
}

/// First spreadsheet row (1-based) holding ledger line items.
const FIRST_DATA_ROW: u32 = 12;

/// Render the workbook for a parsed statement.
///
/// Accounts with no movements and matching balances are omitted; an empty
/// account with a balance mismatch still gets a sheet so the discrepancy
/// shows up in the control cell.
pub fn render_workbook(statement: &ParsedStatement) -> Result<Vec<u8>, ReportError> {
    let mut workbook = Workbook::new();
    let mut used_names: Vec<String> = Vec::new();

    for (number, account) in &statement.accounts {
        if !account.is_reportable() {
            log::info!("cuenta {} sin movimientos ni diferencia, omitida", number);
            continue;
        }

        let name = sheet_name(account, &used_names);
        used_names.push(name.clone());

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&name)?;
        write_account_sheet(worksheet, statement, account)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Sheet name: truncated label plus currency symbol, deduplicated with a
/// counter the way the statement processor always has.
fn sheet_name(account: &AccountInfo, used: &[String]) -> String {
    let short: String = account.label.chars().take(10).collect();
    let base = format!("{} {}", short, account.currency.symbol())
        .replace('/', "")
        .trim()
        .to_string();

    let mut name = base.clone();
    let mut count = 1;
    while used.contains(&name) {
        name = format!("{} {}", base, count);
        count += 1;
    }
    name
}

fn write_account_sheet(
    worksheet: &mut Worksheet,
    statement: &ParsedStatement,
    account: &AccountInfo,
) -> Result<(), ReportError> {
    worksheet.set_screen_gridlines(false);

    let num_format = match account.currency.symbol() {
        "$" => "\"$ \"#,##0.00",
        _ => "\"U$S \"#,##0.00",
    };

    let title_format = Format::new()
        .set_bold()
        .set_font_size(14)
        .set_font_color(Color::White)
        .set_background_color(accent_color(&statement.bank))
        .set_align(FormatAlign::Center);
    let money = Format::new().set_num_format(num_format);
    let bold = Format::new().set_bold();
    let thin_border = |format: Format| {
        format
            .set_border(FormatBorder::Thin)
            .set_border_color(Color::RGB(0xA6A6A6))
    };

    let credit_band = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x00B050));
    let debit_band = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0xC00000));
    let credit_header = thin_border(
        Format::new()
            .set_bold()
            .set_background_color(Color::RGB(0xEBF1DE)),
    );
    let debit_header = thin_border(
        Format::new()
            .set_bold()
            .set_background_color(Color::RGB(0xF2DCDB)),
    );
    let credit_cell = thin_border(Format::new().set_background_color(Color::RGB(0xF2F9F1)));
    let credit_amount = credit_cell.clone().set_num_format(num_format);
    let debit_cell = thin_border(Format::new().set_background_color(Color::RGB(0xFDE9D9)));
    let debit_amount = debit_cell.clone().set_num_format(num_format);

    // Title band across A1:G1
    let title = format!(
        "REPORTE {} - {} - {}",
        statement.bank, account.label, statement.metadata.holder
    );
    worksheet.merge_range(0, 0, 0, 6, &title, &title_format)?;

    // Balance and metadata cells
    worksheet.write_string(2, 0, "SALDO INICIAL")?;
    worksheet.write_number_with_format(2, 1, account.opening_balance, &money)?;
    worksheet.write_string(3, 0, "SALDO FINAL")?;
    worksheet.write_number_with_format(3, 1, account.closing_balance, &money)?;
    worksheet.write_string(2, 3, "TITULAR")?;
    worksheet.write_string(2, 4, &statement.metadata.holder)?;
    worksheet.write_string(3, 3, "PERIODO")?;
    worksheet.write_string(3, 4, &statement.metadata.period)?;

    // Column bands and headers
    worksheet.merge_range(9, 0, 9, 2, "CRÉDITOS", &credit_band)?;
    worksheet.merge_range(9, 4, 9, 6, "DÉBITOS", &debit_band)?;
    for (col, text) in [(0, "Fecha"), (1, "Desc"), (2, "Imp")] {
        worksheet.write_string_with_format(10, col, text, &credit_header)?;
    }
    for (col, text) in [(4, "Fecha"), (5, "Desc"), (6, "Imp")] {
        worksheet.write_string_with_format(10, col, text, &debit_header)?;
    }

    // Credit items in A:C, debit items (absolute values) in E:G
    let mut credit_row = FIRST_DATA_ROW;
    let mut debit_row = FIRST_DATA_ROW;
    for movement in &account.movements {
        if movement.amount > 0.0 {
            let row = credit_row - 1;
            worksheet.write_string_with_format(row, 0, &movement.date, &credit_cell)?;
            worksheet.write_string_with_format(row, 1, &movement.description, &credit_cell)?;
            worksheet.write_number_with_format(row, 2, movement.amount, &credit_amount)?;
            credit_row += 1;
        } else if movement.amount < 0.0 {
            let row = debit_row - 1;
            worksheet.write_string_with_format(row, 4, &movement.date, &debit_cell)?;
            worksheet.write_string_with_format(row, 5, &movement.description, &debit_cell)?;
            worksheet.write_number_with_format(row, 6, -movement.amount, &debit_amount)?;
            debit_row += 1;
        }
    }

    // Running sum totals under each column
    worksheet.write_formula_with_format(
        credit_row - 1,
        2,
        Formula::new(format!("=SUM(C{}:C{})", FIRST_DATA_ROW, credit_row - 1)),
        &money,
    )?;
    worksheet.write_formula_with_format(
        debit_row - 1,
        6,
        Formula::new(format!("=SUM(G{}:G{})", FIRST_DATA_ROW, debit_row - 1)),
        &money,
    )?;

    // Control cell: opening + credits - debits - closing, rounded. Zero for
    // a balanced statement; highlighted red otherwise.
    worksheet.write_string(5, 3, "CONTROL")?;
    worksheet.write_formula_with_format(
        6,
        3,
        Formula::new(format!("=ROUND(B3+C{}-G{}-B4, 2)", credit_row, debit_row)),
        &bold,
    )?;
    let control_alert = Format::new()
        .set_bold()
        .set_font_color(Color::RGB(0x9C0006))
        .set_background_color(Color::RGB(0xFFC7CE));
    worksheet.add_conditional_format(
        6,
        3,
        6,
        3,
        &ConditionalFormatCell::new()
            .set_rule(ConditionalFormatCellRule::NotEqualTo(0.0))
            .set_format(&control_alert),
    )?;

    worksheet.set_column_width(1, 40)?;
    worksheet.set_column_width(5, 40)?;
    worksheet.set_column_width(2, 18)?;
    worksheet.set_column_width(6, 18)?;

    Ok(())
}

fn accent_color(bank: &str) -> Color {
    match bank {
        "HSBC" => Color::RGB(0xDB0011),
        _ => Color::RGB(0x1F4E78),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement_import::{
        AccountRegistry, Currency, Movement, ParsedStatement, StatementMetadata,
    };

    fn metadata() -> StatementMetadata {
        StatementMetadata {
            holder: "EMPRESA EJEMPLO S.A.".to_string(),
            period: "Del 01/01/2024 al 31/01/2024".to_string(),
            reference_year: "2024".to_string(),
            period_start: None,
            period_end: None,
        }
    }

    fn account(opening: f64, closing: f64, movements: Vec<Movement>) -> AccountInfo {
        AccountInfo {
            label: "CUENTA CORRIENTE".to_string(),
            currency: Currency::Pesos,
            opening_balance: opening,
            closing_balance: closing,
            movements,
        }
    }

    fn statement_with(accounts: AccountRegistry) -> ParsedStatement {
        ParsedStatement {
            bank: "HSBC".to_string(),
            metadata: metadata(),
            accounts,
        }
    }

    #[test]
    fn test_render_workbook_produces_xlsx() {
        let mut accounts = AccountRegistry::new();
        accounts.insert(
            "191-1-12345-6".to_string(),
            account(
                500.0,
                450.0,
                vec![Movement {
                    date: "01/01/2024".to_string(),
                    description: "PAGO SERVICIOS".to_string(),
                    amount: -50.0,
                }],
            ),
        );

        let bytes = render_workbook(&statement_with(accounts)).unwrap();
        // XLSX files are ZIP containers
        assert!(bytes.len() > 4);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_empty_balanced_account_is_omitted() {
        let mut accounts = AccountRegistry::new();
        accounts.insert("191-1-12345-6".to_string(), account(100.0, 100.0, vec![]));
        accounts.insert(
            "802-2-54321-9".to_string(),
            account(
                100.0,
                150.0,
                vec![Movement {
                    date: "02/01/2024".to_string(),
                    description: "DEPOSITO".to_string(),
                    amount: 50.0,
                }],
            ),
        );

        // only the account with movements gets a sheet; rendering still
        // succeeds with the other one skipped
        let bytes = render_workbook(&statement_with(accounts)).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_empty_account_with_mismatch_still_renders() {
        let mut accounts = AccountRegistry::new();
        accounts.insert("191-1-12345-6".to_string(), account(100.0, 90.0, vec![]));

        let bytes = render_workbook(&statement_with(accounts)).unwrap();
        assert_eq!(&bytes[..2], b"PK");

        // the discrepancy is what the control cell flags
        let acc = account(100.0, 90.0, vec![]);
        assert!(acc.is_reportable());
        assert_eq!(acc.control_value(), 10.0);
    }

    #[test]
    fn test_sheet_name_truncation_and_dedup() {
        let long = account(0.0, 1.0, vec![]);
        let name = sheet_name(&long, &[]);
        assert_eq!(name, "CUENTA COR $");

        let second = sheet_name(&long, &[name.clone()]);
        assert_eq!(second, "CUENTA COR $ 1");

        let third = sheet_name(&long, &[name, second]);
        assert_eq!(third, "CUENTA COR $ 2");
    }
}
