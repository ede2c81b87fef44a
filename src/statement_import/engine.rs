//! Generic statement-to-ledger engine.
//!
//! One engine serves every bank: the literals that differ between
//! institutions (section markers, period pattern, label noise words,
//! tolerances) live in a [`BankProfile`], and a parser is just a profile
//! plus detection patterns. The engine walks the extracted text in a single
//! pass: metadata and the account summary come from a bounded prefix, then
//! a state machine classifies every line and reconciles transaction
//! candidates against a running balance.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    parse_statement_amount, AccountInfo, AccountRegistry, Currency, ImportError, Movement,
    ParsedStatement, StatementMetadata, UNSPECIFIED,
};
use chrono::{Datelike, NaiveDate};

/// Canonical account number as printed in the statement body.
pub const ACCOUNT_NUMBER_PATTERN: &str = r"\d{3,4}-\d-\d{5}-\d";
/// Leading day-month token on movement lines ("01-ENE").
pub const DATE_TOKEN_PATTERN: &str = r"\d{2}-[A-Z]{3}";
/// Decimal amount as printed on movement lines; the integer part may be
/// missing entirely (".16").
pub const AMOUNT_TOKEN_PATTERN: &str = r"(?:\d{1,3}(?:,\d{3})*)?\.\d{2}";
/// Decimal amount with a mandatory integer part, used in the summary region
/// where balances are always fully printed.
pub const STRICT_AMOUNT_PATTERN: &str = r"\d{1,3}(?:,\d{3})*\.\d{2}";

static ACCOUNT_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(ACCOUNT_NUMBER_PATTERN).unwrap());
static DATE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}", DATE_TOKEN_PATTERN)).unwrap());
static AMOUNT_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(AMOUNT_TOKEN_PATTERN).unwrap());
static STRICT_AMOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(STRICT_AMOUNT_PATTERN).unwrap());
static PAREN_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\d+\)").unwrap());
static LEADING_DASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*-\s*").unwrap());
static TRAILING_DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+$").unwrap());
static TRAILING_AMOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\d{2}$").unwrap());

/// Fallback description for movements whose text could not be recovered.
const MOVEMENT_FALLBACK: &str = "Movimiento";

/// Fixed month lookup for the dd-MMM date token.
const MONTHS: [(&str, &str); 12] = [
    ("ENE", "01"),
    ("FEB", "02"),
    ("MAR", "03"),
    ("ABR", "04"),
    ("MAY", "05"),
    ("JUN", "06"),
    ("JUL", "07"),
    ("AGO", "08"),
    ("SEP", "09"),
    ("OCT", "10"),
    ("NOV", "11"),
    ("DIC", "12"),
];

fn month_number(abbr: &str) -> &'static str {
    MONTHS
        .iter()
        .find(|(name, _)| *name == abbr)
        .map(|(_, number)| *number)
        .unwrap_or("01")
}

/// Per-bank configuration consumed by the engine.
///
/// The tolerance and scan windows are behavior-compatibility constants
/// carried over from production statements; they are configuration, not
/// values to tune.
#[derive(Debug, Clone)]
pub struct BankProfile {
    pub bank_name: &'static str,
    /// Reference year used when no statement period is found.
    pub default_year: &'static str,
    /// Marker on the holder line; the holder is the text before it.
    pub holder_marker: &'static str,
    pub holder_scan_lines: usize,
    /// Pattern with two capture groups for the period start/end dates.
    pub period_pattern: &'static str,
    pub period_scan_lines: usize,
    /// Both markers must appear on the summary-region header line.
    pub summary_start_markers: [&'static str; 2],
    pub summary_end_marker: &'static str,
    /// Account header pattern; group 1 captures the account number.
    pub account_header_pattern: &'static str,
    /// Section keywords that turn an account-number line into a header.
    pub section_markers: &'static [&'static str],
    /// Markers that close the active account section.
    pub section_end_markers: &'static [&'static str],
    /// Repeated balance labels consumed as boilerplate.
    pub balance_label_markers: &'static [&'static str],
    /// Both markers present = column header row, consumed as boilerplate.
    pub header_row_markers: [&'static str; 2],
    /// Both markers present = page footer, consumed as boilerplate.
    pub footer_markers: [&'static str; 2],
    /// Case-insensitive marker for secondary-currency accounts.
    pub foreign_currency_marker: &'static str,
    /// Branch/location words split off the end of account labels.
    pub label_noise_pattern: &'static str,
    /// Max discrepancy between printed amount and balance delta for a line
    /// to be accepted as a transaction.
    pub reconcile_tolerance: f64,
}

/// Classifier state, threaded through the fold over the line sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionState {
    NoActiveAccount,
    ActiveAccount {
        account_key: String,
        running_balance: f64,
        last_date: String,
    },
}

/// A [`BankProfile`] with its patterns compiled.
pub struct StatementEngine {
    profile: &'static BankProfile,
    period_re: Regex,
    account_header_re: Regex,
    label_noise_re: Regex,
}

impl StatementEngine {
    pub fn new(profile: &'static BankProfile) -> Result<Self, ImportError> {
        Ok(Self {
            period_re: compile(profile.period_pattern)?,
            account_header_re: compile(profile.account_header_pattern)?,
            label_noise_re: compile(profile.label_noise_pattern)?,
            profile,
        })
    }

    /// Run the whole pipeline over the extracted statement text.
    pub fn parse(&self, content: &str) -> Result<ParsedStatement, ImportError> {
        let lines: Vec<&str> = content.lines().collect();

        let metadata = self.extract_metadata(&lines);
        let mut accounts = self.build_registry(&lines);
        log::info!(
            "{}: {} cuentas en el resumen, titular '{}'",
            self.profile.bank_name,
            accounts.len(),
            metadata.holder
        );

        self.scan_movements(&lines, &mut accounts, &metadata);

        Ok(ParsedStatement {
            bank: self.profile.bank_name.to_string(),
            metadata,
            accounts,
        })
    }

    /// Holder and period live in a bounded prefix of the document; scanning
    /// further would start matching transaction text that looks like
    /// metadata. Absent fields keep their sentinels.
    fn extract_metadata(&self, lines: &[&str]) -> StatementMetadata {
        let profile = self.profile;

        let mut holder = UNSPECIFIED.to_string();
        for line in lines.iter().take(profile.holder_scan_lines) {
            if line.contains(profile.holder_marker) && line.contains('(') && line.contains(')') {
                let prefix = line.split(profile.holder_marker).next().unwrap_or("");
                holder = PAREN_CODE_RE.replace_all(prefix, "").trim().to_string();
                break;
            }
        }

        let mut period = UNSPECIFIED.to_string();
        let mut reference_year = profile.default_year.to_string();
        let mut period_start = None;
        let mut period_end = None;
        for line in lines.iter().take(profile.period_scan_lines) {
            if let Some(caps) = self.period_re.captures(line) {
                let start = NaiveDate::parse_from_str(&caps[1], "%d/%m/%Y");
                let end = NaiveDate::parse_from_str(&caps[2], "%d/%m/%Y");
                if let (Ok(start), Ok(end)) = (start, end) {
                    period = format!("Del {} al {}", &caps[1], &caps[2]);
                    reference_year = start.year().to_string();
                    period_start = Some(start);
                    period_end = Some(end);
                    break;
                }
            }
        }

        StatementMetadata {
            holder,
            period,
            reference_year,
            period_start,
            period_end,
        }
    }

    /// Discover every account in the summary region, with its label,
    /// currency and opening/closing balances.
    ///
    /// Balances are positional: the second-to-last amount on the row is the
    /// opening balance and the last is the closing balance. Column labels
    /// are not reliably on the same line once the PDF text is linearized.
    fn build_registry(&self, lines: &[&str]) -> AccountRegistry {
        let profile = self.profile;
        let mut accounts = AccountRegistry::new();

        let Some(start) = lines.iter().position(|line| {
            profile
                .summary_start_markers
                .iter()
                .all(|marker| line.contains(marker))
        }) else {
            log::warn!("{}: resumen de cuentas no encontrado", profile.bank_name);
            return accounts;
        };

        let mut seen_content = false;
        for line in &lines[start + 1..] {
            if line.contains(profile.summary_end_marker) {
                break;
            }
            if line.trim().is_empty() {
                if seen_content {
                    break;
                }
                continue;
            }
            seen_content = true;

            let Some(number_match) = ACCOUNT_NUMBER_RE.find(line) else {
                continue;
            };
            let number = number_match.as_str().to_string();

            let currency = if line
                .to_lowercase()
                .contains(profile.foreign_currency_marker)
            {
                Currency::Dollars
            } else {
                Currency::Pesos
            };

            let raw_label = &line[..number_match.start()];
            let label = self
                .label_noise_re
                .splitn(raw_label, 2)
                .next()
                .unwrap_or("")
                .trim();
            let label = if label.is_empty() { "Cuenta" } else { label };

            let amounts: Vec<&str> = STRICT_AMOUNT_RE
                .find_iter(line)
                .map(|m| m.as_str())
                .collect();
            let (opening, closing) = if amounts.len() >= 2 {
                (
                    parse_statement_amount(amounts[amounts.len() - 2]),
                    parse_statement_amount(amounts[amounts.len() - 1]),
                )
            } else {
                (0.0, 0.0)
            };

            log::debug!(
                "{}: cuenta {} '{}' {} {:.2} -> {:.2}",
                profile.bank_name,
                number,
                label,
                currency.symbol(),
                opening,
                closing
            );
            accounts.insert(
                number,
                AccountInfo {
                    label: label.to_string(),
                    currency,
                    opening_balance: opening,
                    closing_balance: closing,
                    movements: Vec::new(),
                },
            );
        }

        accounts
    }

    /// Classify every line, reconciling transaction candidates into the
    /// active account's ledger.
    fn scan_movements(
        &self,
        lines: &[&str],
        accounts: &mut AccountRegistry,
        metadata: &StatementMetadata,
    ) {
        lines.iter().fold(SectionState::NoActiveAccount, |state, line| {
            self.step(state, line, accounts, metadata)
        });
    }

    /// One classifier transition. Public so each guard is testable on its
    /// own.
    pub fn step(
        &self,
        state: SectionState,
        line: &str,
        accounts: &mut AccountRegistry,
        metadata: &StatementMetadata,
    ) -> SectionState {
        let profile = self.profile;

        // Account header: reopens the section from its opening balance,
        // consuming the line even when the number is not in the registry.
        if let Some(caps) = self.account_header_re.captures(line) {
            if profile.section_markers.iter().any(|m| line.contains(m)) {
                let number = &caps[1];
                if let Some(info) = accounts.get(number) {
                    return SectionState::ActiveAccount {
                        account_key: number.to_string(),
                        running_balance: info.opening_balance,
                        last_date: String::new(),
                    };
                }
                return state;
            }
        }

        let SectionState::ActiveAccount {
            account_key,
            mut running_balance,
            mut last_date,
        } = state
        else {
            return SectionState::NoActiveAccount;
        };

        if profile
            .section_end_markers
            .iter()
            .any(|m| line.contains(m))
        {
            return SectionState::NoActiveAccount;
        }

        // Boilerplate rows: repeated balance labels, the column header row,
        // page footers. Consumed with no data effect.
        if profile
            .balance_label_markers
            .iter()
            .any(|m| line.contains(m))
            || profile.header_row_markers.iter().all(|m| line.contains(m))
            || profile.footer_markers.iter().all(|m| line.contains(m))
        {
            return SectionState::ActiveAccount {
                account_key,
                running_balance,
                last_date,
            };
        }

        let trimmed = line.trim();

        // A leading date token updates the remembered date; the same line
        // may still carry a transaction.
        let date_token = DATE_TOKEN_RE.find(trimmed);
        if let Some(token) = date_token {
            if let Some((day, month)) = token.as_str().split_once('-') {
                last_date = format!(
                    "{}/{}/{}",
                    day,
                    month_number(month),
                    metadata.reference_year
                );
            }
        }

        // Transaction candidate: at least two amount tokens, last one being
        // the printed running balance. The balance delta is the only robust
        // discriminator between a transaction line and incidental numbers.
        let amounts: Vec<regex::Match<'_>> = AMOUNT_TOKEN_RE
            .find_iter(line)
            .filter(|m| {
                let token = m.as_str();
                !token.trim().is_empty() && token != "."
            })
            .collect();

        if amounts.len() >= 2 {
            let balance_token = amounts[amounts.len() - 1];
            let amount_token = amounts[amounts.len() - 2];
            let printed_balance = parse_statement_amount(balance_token.as_str());
            let printed_amount = parse_statement_amount(amount_token.as_str());

            let delta = printed_balance - running_balance;

            if (delta.abs() - printed_amount).abs() < profile.reconcile_tolerance {
                running_balance = printed_balance;

                let raw_desc = &line[..amount_token.start()];
                let mut desc_text = raw_desc.trim_start();
                if let Some(token) = date_token {
                    if let Some(rest) = desc_text.strip_prefix(token.as_str()) {
                        desc_text = rest;
                    }
                }
                let desc = LEADING_DASH_RE.replace(desc_text, "");
                let desc = TRAILING_DIGITS_RE.replace(desc.trim(), "");
                let desc = desc.trim();
                let description = if desc.is_empty() {
                    MOVEMENT_FALLBACK.to_string()
                } else {
                    desc.to_string()
                };

                let date = if last_date.is_empty() {
                    metadata.period.clone()
                } else {
                    last_date.clone()
                };

                if let Some(info) = accounts.get_mut(&account_key) {
                    info.movements.push(Movement {
                        date,
                        description,
                        amount: delta,
                    });
                }

                return SectionState::ActiveAccount {
                    account_key,
                    running_balance,
                    last_date,
                };
            }
        }

        // Continuation: wrapped description text belonging to the previous
        // movement. Short fragments and numeric rows are noise.
        if trimmed.chars().count() > 3 && !TRAILING_AMOUNT_RE.is_match(trimmed) {
            if let Some(info) = accounts.get_mut(&account_key) {
                if let Some(last) = info.movements.last_mut() {
                    let extra = LEADING_DASH_RE.replace(trimmed, "");
                    let extra = extra.trim();
                    if !extra.is_empty() && !last.description.contains(extra) {
                        last.description.push(' ');
                        last.description.push_str(extra);
                    }
                }
            }
        }

        SectionState::ActiveAccount {
            account_key,
            running_balance,
            last_date,
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, ImportError> {
    Regex::new(pattern).map_err(|e| ImportError::ParseFailed(format!("patrón inválido: {}", e)))
}
