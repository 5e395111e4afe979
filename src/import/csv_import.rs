use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use crate::db::Database;
use crate::models::{Invoice, InvoiceAllocation, InvoiceStatus, LaborEntry, LaborStatus};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ImportSummary {
    pub imported: usize,
    /// Rows (labor) or invoices already present, keyed by import hash.
    pub skipped: usize,
}

fn col_index(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn read_headers(rdr: &mut csv::Reader<std::fs::File>) -> Result<Vec<String>> {
    Ok(rdr
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.to_lowercase().trim().to_string())
        .collect())
}

fn cell<'a>(record: &'a csv::StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("").trim()
}

fn opt_cell<'a>(record: &'a csv::StringRecord, idx: Option<usize>) -> &'a str {
    idx.map(|i| cell(record, i)).unwrap_or("")
}

/// Normalize a date cell to ISO "YYYY-MM-DD"; US-style dates accepted.
fn parse_date(s: &str) -> Result<String> {
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(date.format("%Y-%m-%d").to_string());
        }
    }
    anyhow::bail!("Unrecognized date: '{s}'")
}

/// Amount cells may carry currency symbols and thousand separators.
fn parse_amount(s: &str) -> Result<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    Decimal::from_str(&cleaned).with_context(|| format!("Unrecognized amount: '{s}'"))
}

/// Import labor time entries.
///
/// Required columns: worker, date, cost code, hours, cost. Optional:
/// status (defaults to approved), budget line, area, system. Re-imports
/// are idempotent via the row hash.
pub(crate) fn import_labor(db: &mut Database, job_id: i64, path: &Path) -> Result<ImportSummary> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("Failed to open CSV file")?;
    let headers = read_headers(&mut rdr)?;

    let worker_col = col_index(&headers, "worker").context("Missing 'worker' column")?;
    let date_col = col_index(&headers, "date").context("Missing 'date' column")?;
    let code_col = col_index(&headers, "cost code").context("Missing 'cost code' column")?;
    let hours_col = col_index(&headers, "hours").context("Missing 'hours' column")?;
    let cost_col = col_index(&headers, "cost").context("Missing 'cost' column")?;
    let status_col = col_index(&headers, "status");
    let line_col = col_index(&headers, "budget line");
    let area_col = col_index(&headers, "area");
    let system_col = col_index(&headers, "system");

    let mut entries = Vec::new();
    for result in rdr.records() {
        let record = result.context("Failed to read CSV row")?;
        let worker = cell(&record, worker_col);
        if worker.is_empty() {
            continue;
        }
        let work_date = parse_date(cell(&record, date_col))?;
        let cost_code = cell(&record, code_col).to_string();
        let hours = parse_amount(cell(&record, hours_col))?;
        let total_cost = parse_amount(cell(&record, cost_col))?;
        let status = match opt_cell(&record, status_col) {
            "" => LaborStatus::Approved,
            s => LaborStatus::parse(s),
        };
        let budget_line_id = opt_cell(&record, line_col).parse::<i64>().ok();

        let import_hash = format!("{job_id}|{worker}|{work_date}|{cost_code}|{total_cost}");
        entries.push(LaborEntry {
            id: None,
            job_id,
            worker: worker.to_string(),
            work_date,
            status,
            cost_code,
            budget_line_id,
            area: opt_cell(&record, area_col).to_string(),
            system: opt_cell(&record, system_col).to_string(),
            hours,
            total_cost,
            import_hash,
            created_at: chrono::Utc::now().to_rfc3339(),
        });
    }

    let imported = db.insert_labor_batch(&entries)?;
    Ok(ImportSummary {
        imported,
        skipped: entries.len() - imported,
    })
}

struct InvoiceRow {
    vendor: String,
    invoice_date: String,
    status: InvoiceStatus,
    total: Option<Decimal>,
    allocation: InvoiceAllocation,
}

/// Import vendor invoices.
///
/// One CSV row per allocation; rows sharing an invoice number fold into a
/// single invoice. Required columns: invoice, vendor, date, cost code,
/// amount. Optional: total (defaults to the allocation sum), status,
/// budget line, area, system. The allocation-sum invariant is enforced per
/// invoice at insert.
pub(crate) fn import_invoices(
    db: &mut Database,
    job_id: i64,
    path: &Path,
) -> Result<ImportSummary> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("Failed to open CSV file")?;
    let headers = read_headers(&mut rdr)?;

    let number_col = col_index(&headers, "invoice").context("Missing 'invoice' column")?;
    let vendor_col = col_index(&headers, "vendor").context("Missing 'vendor' column")?;
    let date_col = col_index(&headers, "date").context("Missing 'date' column")?;
    let code_col = col_index(&headers, "cost code").context("Missing 'cost code' column")?;
    let amount_col = col_index(&headers, "amount").context("Missing 'amount' column")?;
    let total_col = col_index(&headers, "total");
    let status_col = col_index(&headers, "status");
    let line_col = col_index(&headers, "budget line");
    let area_col = col_index(&headers, "area");
    let system_col = col_index(&headers, "system");

    let mut by_number: BTreeMap<String, Vec<InvoiceRow>> = BTreeMap::new();
    for result in rdr.records() {
        let record = result.context("Failed to read CSV row")?;
        let number = cell(&record, number_col);
        if number.is_empty() {
            continue;
        }
        let total = match opt_cell(&record, total_col) {
            "" => None,
            s => Some(parse_amount(s)?),
        };
        by_number
            .entry(number.to_string())
            .or_default()
            .push(InvoiceRow {
                vendor: cell(&record, vendor_col).to_string(),
                invoice_date: parse_date(cell(&record, date_col))?,
                status: match opt_cell(&record, status_col) {
                    "" => InvoiceStatus::Open,
                    s => InvoiceStatus::parse(s),
                },
                total,
                allocation: InvoiceAllocation {
                    id: None,
                    invoice_id: 0,
                    cost_code: cell(&record, code_col).to_string(),
                    budget_line_id: opt_cell(&record, line_col).parse::<i64>().ok(),
                    area: opt_cell(&record, area_col).to_string(),
                    system: opt_cell(&record, system_col).to_string(),
                    amount: parse_amount(cell(&record, amount_col))?,
                },
            });
    }

    let mut summary = ImportSummary::default();
    for (number, rows) in by_number {
        let import_hash = format!("{job_id}|{number}");
        if db.invoice_hash_exists(&import_hash)? {
            summary.skipped += 1;
            continue;
        }
        let allocations: Vec<InvoiceAllocation> =
            rows.iter().map(|r| r.allocation.clone()).collect();
        let total_amount = rows
            .iter()
            .find_map(|r| r.total)
            .unwrap_or_else(|| allocations.iter().map(|a| a.amount).sum());
        let first = &rows[0];
        let invoice = Invoice {
            id: None,
            job_id,
            vendor: first.vendor.clone(),
            invoice_number: number.clone(),
            invoice_date: first.invoice_date.clone(),
            status: first.status,
            total_amount,
            import_hash,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        db.insert_invoice(&invoice, &allocations)
            .with_context(|| format!("Invoice {number} failed to import"))?;
        summary.imported += 1;
    }
    Ok(summary)
}

#[cfg(test)]
#[path = "csv_import_tests.rs"]
mod tests;
