//! Drive the full statement pipeline from the command line.
//!
//! Usage: process_statement <bank> <statement.pdf|statement.txt> [output.xlsx]
//!
//! Reads a statement (PDF, or already extracted text), parses it with the
//! parser registered for the given bank and writes the processed workbook.
//! Pass --json to also dump the parsed ledger next to the workbook.

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;

use extracto::report::render_workbook;
use extracto::statement_import::{self, output_filename};

fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();

    let dump_json = args.iter().any(|a| a == "--json");
    args.retain(|a| a != "--json");

    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: process_statement <bank> <statement.pdf|statement.txt> [output.xlsx] [--json]");
        bail!("argumentos inválidos");
    }

    let bank = &args[0];
    let input = &args[1];

    println!("=== Procesando extracto {} ===\n", bank);
    println!("Archivo: {}", input);

    let content = if input.to_lowercase().ends_with(".pdf") {
        statement_import::extract_pdf_text(input)?
    } else {
        fs::read_to_string(input).with_context(|| format!("no se pudo leer {}", input))?
    };

    let statement = statement_import::parse_statement(bank, &content)?;

    println!("Titular: {}", statement.metadata.holder);
    println!("Periodo: {}", statement.metadata.period);
    println!("Cuentas: {}", statement.accounts.len());
    for (number, account) in &statement.accounts {
        println!(
            "  {} | {} {} | {} movimientos | saldo {:.2} -> {:.2} | control {:.2}",
            number,
            account.label,
            account.currency.symbol(),
            account.movements.len(),
            account.opening_balance,
            account.closing_balance,
            account.control_value(),
        );
    }

    let bytes = render_workbook(&statement)?;
    let output = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| output_filename(bank));
    fs::write(&output, &bytes).with_context(|| format!("no se pudo escribir {}", output))?;
    println!("\nReporte generado: {}", output);

    if dump_json {
        let json_path = format!("{}.json", output.trim_end_matches(".xlsx"));
        fs::write(&json_path, serde_json::to_string_pretty(&statement)?)?;
        println!("Ledger JSON: {}", json_path);
    }

    Ok(())
}
