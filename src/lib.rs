pub mod report;
pub mod statement_import;
