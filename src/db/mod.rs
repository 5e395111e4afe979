mod schema;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

use crate::models::*;

pub(crate) struct Database {
    conn: Connection,
}

/// Decimal columns are stored as TEXT; a malformed cell reads as zero
/// rather than poisoning the whole row.
fn get_dec(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    Ok(Decimal::from_str(&s).unwrap_or_default())
}

impl Database {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("Failed to set database pragmas")?;
        let mut db = Self { conn };
        db.migrate().context("Database migration failed")?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&mut self) -> Result<()> {
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            self.conn.execute_batch(schema::SCHEMA_V1)?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            return Ok(());
        }

        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                self.conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }

        Ok(())
    }

    // ── Jobs ──────────────────────────────────────────────────

    pub(crate) fn insert_job(&self, job: &Job) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO jobs (number, name, start_date, end_date, contract_value, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job.number,
                job.name,
                job.start_date,
                job.end_date,
                job.contract_value.to_string(),
                job.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn map_job(row: &Row) -> rusqlite::Result<Job> {
        Ok(Job {
            id: Some(row.get(0)?),
            number: row.get(1)?,
            name: row.get(2)?,
            start_date: row.get(3)?,
            end_date: row.get(4)?,
            contract_value: get_dec(row, 5)?,
            created_at: row.get(6)?,
        })
    }

    pub(crate) fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let result = self.conn.query_row(
            "SELECT id, number, name, start_date, end_date, contract_value, created_at
             FROM jobs WHERE id = ?1",
            params![id],
            Self::map_job,
        );
        match result {
            Ok(j) => Ok(Some(j)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn get_job_by_number(&self, number: &str) -> Result<Option<Job>> {
        let result = self.conn.query_row(
            "SELECT id, number, name, start_date, end_date, contract_value, created_at
             FROM jobs WHERE number = ?1",
            params![number],
            Self::map_job,
        );
        match result {
            Ok(j) => Ok(Some(j)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Look a job up by number first, then by numeric id.
    pub(crate) fn find_job(&self, reference: &str) -> Result<Option<Job>> {
        if let Some(job) = self.get_job_by_number(reference)? {
            return Ok(Some(job));
        }
        if let Ok(id) = reference.parse::<i64>() {
            return self.get_job(id);
        }
        Ok(None)
    }

    pub(crate) fn get_jobs(&self) -> Result<Vec<Job>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, number, name, start_date, end_date, contract_value, created_at
             FROM jobs ORDER BY number",
        )?;
        let rows = stmt.query_map([], Self::map_job)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ── Budget lines ──────────────────────────────────────────

    pub(crate) fn insert_budget_line(&self, line: &BudgetLine) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO budget_lines (job_id, cost_code, area, system, phase, budget_cost, budget_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                line.job_id,
                line.cost_code,
                line.area,
                line.system,
                line.phase,
                line.budget_cost.to_string(),
                line.budget_value.to_string(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub(crate) fn get_budget_lines(&self, job_id: i64) -> Result<Vec<BudgetLine>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, job_id, cost_code, area, system, phase, budget_cost, budget_value
             FROM budget_lines WHERE job_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![job_id], |row| {
            Ok(BudgetLine {
                id: Some(row.get(0)?),
                job_id: row.get(1)?,
                cost_code: row.get(2)?,
                area: row.get(3)?,
                system: row.get(4)?,
                phase: row.get(5)?,
                budget_cost: get_dec(row, 6)?,
                budget_value: get_dec(row, 7)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ── Labor entries ─────────────────────────────────────────

    pub(crate) fn insert_labor_entry(&self, entry: &LaborEntry) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO labor_entries (job_id, worker, work_date, status, cost_code, budget_line_id, area, system, hours, total_cost, import_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                entry.job_id,
                entry.worker,
                entry.work_date,
                entry.status.as_str(),
                entry.cost_code,
                entry.budget_line_id,
                entry.area,
                entry.system,
                entry.hours.to_string(),
                entry.total_cost.to_string(),
                entry.import_hash,
                entry.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub(crate) fn insert_labor_batch(&mut self, entries: &[LaborEntry]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut count = 0;
        for entry in entries {
            // Skip duplicates based on import_hash (only when hash is non-empty)
            if !entry.import_hash.is_empty() {
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM labor_entries WHERE import_hash = ?1 AND import_hash != '')",
                    params![entry.import_hash],
                    |row| row.get(0),
                )?;
                if exists {
                    continue;
                }
            }
            tx.execute(
                "INSERT INTO labor_entries (job_id, worker, work_date, status, cost_code, budget_line_id, area, system, hours, total_cost, import_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    entry.job_id,
                    entry.worker,
                    entry.work_date,
                    entry.status.as_str(),
                    entry.cost_code,
                    entry.budget_line_id,
                    entry.area,
                    entry.system,
                    entry.hours.to_string(),
                    entry.total_cost.to_string(),
                    entry.import_hash,
                    entry.created_at,
                ],
            )?;
            count += 1;
        }
        tx.commit()?;
        Ok(count)
    }

    /// Approved labor with a work date on or before the cutoff, the only
    /// labor records that count toward cost-to-date.
    pub(crate) fn get_approved_labor(&self, job_id: i64, cutoff: &str) -> Result<Vec<LaborEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, job_id, worker, work_date, status, cost_code, budget_line_id, area, system, hours, total_cost, import_hash, created_at
             FROM labor_entries
             WHERE job_id = ?1 AND status = 'approved' AND work_date <= ?2
             ORDER BY work_date, id",
        )?;
        let rows = stmt.query_map(params![job_id, cutoff], |row| {
            Ok(LaborEntry {
                id: Some(row.get(0)?),
                job_id: row.get(1)?,
                worker: row.get(2)?,
                work_date: row.get(3)?,
                status: LaborStatus::parse(&row.get::<_, String>(4)?),
                cost_code: row.get(5)?,
                budget_line_id: row.get(6)?,
                area: row.get(7)?,
                system: row.get(8)?,
                hours: get_dec(row, 9)?,
                total_cost: get_dec(row, 10)?,
                import_hash: row.get(11)?,
                created_at: row.get(12)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ── Invoices ──────────────────────────────────────────────

    /// Insert an invoice and its allocations in one transaction, enforcing
    /// the allocation-sum invariant first.
    pub(crate) fn insert_invoice(
        &mut self,
        invoice: &Invoice,
        allocations: &[InvoiceAllocation],
    ) -> Result<i64> {
        invoice.validate_allocations(allocations)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO invoices (job_id, vendor, invoice_number, invoice_date, status, total_amount, import_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                invoice.job_id,
                invoice.vendor,
                invoice.invoice_number,
                invoice.invoice_date,
                invoice.status.as_str(),
                invoice.total_amount.to_string(),
                invoice.import_hash,
                invoice.created_at,
            ],
        )?;
        let invoice_id = tx.last_insert_rowid();
        for alloc in allocations {
            tx.execute(
                "INSERT INTO invoice_allocations (invoice_id, cost_code, budget_line_id, area, system, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    invoice_id,
                    alloc.cost_code,
                    alloc.budget_line_id,
                    alloc.area,
                    alloc.system,
                    alloc.amount.to_string(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(invoice_id)
    }

    pub(crate) fn invoice_hash_exists(&self, hash: &str) -> Result<bool> {
        if hash.is_empty() {
            return Ok(false);
        }
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM invoices WHERE import_hash = ?1)",
            params![hash],
            |row| row.get(0),
        )?)
    }

    pub(crate) fn get_invoices(&self, job_id: i64) -> Result<Vec<Invoice>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, job_id, vendor, invoice_number, invoice_date, status, total_amount, import_hash, created_at
             FROM invoices WHERE job_id = ?1 ORDER BY invoice_date, id",
        )?;
        let rows = stmt.query_map(params![job_id], |row| {
            Ok(Invoice {
                id: Some(row.get(0)?),
                job_id: row.get(1)?,
                vendor: row.get(2)?,
                invoice_number: row.get(3)?,
                invoice_date: row.get(4)?,
                status: InvoiceStatus::parse(&row.get::<_, String>(5)?),
                total_amount: get_dec(row, 6)?,
                import_hash: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Allocations whose parent invoice is dated on or before the cutoff.
    pub(crate) fn get_allocations_before(
        &self,
        job_id: i64,
        cutoff: &str,
    ) -> Result<Vec<InvoiceAllocation>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.invoice_id, a.cost_code, a.budget_line_id, a.area, a.system, a.amount
             FROM invoice_allocations a
             JOIN invoices i ON a.invoice_id = i.id
             WHERE i.job_id = ?1 AND i.invoice_date <= ?2
             ORDER BY i.invoice_date, a.id",
        )?;
        let rows = stmt.query_map(params![job_id, cutoff], |row| {
            Ok(InvoiceAllocation {
                id: Some(row.get(0)?),
                invoice_id: row.get(1)?,
                cost_code: row.get(2)?,
                budget_line_id: row.get(3)?,
                area: row.get(4)?,
                system: row.get(5)?,
                amount: get_dec(row, 6)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ── Progress reports ──────────────────────────────────────

    pub(crate) fn insert_progress_report(
        &mut self,
        report: &ProgressReport,
        lines: &[ProgressLine],
    ) -> Result<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO progress_reports (job_id, report_date, status, approved_by, approved_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                report.job_id,
                report.report_date,
                report.status.as_str(),
                report.approved_by,
                report.approved_at,
                report.created_at,
            ],
        )?;
        let report_id = tx.last_insert_rowid();
        for line in lines {
            tx.execute(
                "INSERT INTO progress_lines (report_id, area, system, submitted_ctd_amount, submitted_ctd_percent, approved_ctd_amount, approved_ctd_percent, previous_ctd_amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    report_id,
                    line.area,
                    line.system,
                    line.submitted_ctd_amount.to_string(),
                    line.submitted_ctd_percent.to_string(),
                    line.approved_ctd_amount.to_string(),
                    line.approved_ctd_percent.to_string(),
                    line.previous_ctd_amount.to_string(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(report_id)
    }

    fn map_progress_report(row: &Row) -> rusqlite::Result<ProgressReport> {
        Ok(ProgressReport {
            id: Some(row.get(0)?),
            job_id: row.get(1)?,
            report_date: row.get(2)?,
            status: ProgressStatus::parse(&row.get::<_, String>(3)?),
            approved_by: row.get(4)?,
            approved_at: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub(crate) fn get_progress_report(&self, id: i64) -> Result<Option<ProgressReport>> {
        let result = self.conn.query_row(
            "SELECT id, job_id, report_date, status, approved_by, approved_at, created_at
             FROM progress_reports WHERE id = ?1",
            params![id],
            Self::map_progress_report,
        );
        match result {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn get_progress_reports(&self, job_id: i64) -> Result<Vec<ProgressReport>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, job_id, report_date, status, approved_by, approved_at, created_at
             FROM progress_reports WHERE job_id = ?1 ORDER BY report_date, id",
        )?;
        let rows = stmt.query_map(params![job_id], Self::map_progress_report)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Latest approved report whose date falls in a "YYYY-MM" month.
    pub(crate) fn approved_report_in_month(
        &self,
        job_id: i64,
        month: &str,
    ) -> Result<Option<ProgressReport>> {
        let result = self.conn.query_row(
            "SELECT id, job_id, report_date, status, approved_by, approved_at, created_at
             FROM progress_reports
             WHERE job_id = ?1 AND status = 'approved' AND report_date LIKE ?2
             ORDER BY report_date DESC, id DESC LIMIT 1",
            params![job_id, format!("{month}%")],
            Self::map_progress_report,
        );
        match result {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The approved report immediately preceding a date, if any.
    pub(crate) fn previous_approved_report(
        &self,
        job_id: i64,
        before_date: &str,
    ) -> Result<Option<ProgressReport>> {
        let result = self.conn.query_row(
            "SELECT id, job_id, report_date, status, approved_by, approved_at, created_at
             FROM progress_reports
             WHERE job_id = ?1 AND status = 'approved' AND report_date < ?2
             ORDER BY report_date DESC, id DESC LIMIT 1",
            params![job_id, before_date],
            Self::map_progress_report,
        );
        match result {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn latest_approved_report(&self, job_id: i64) -> Result<Option<ProgressReport>> {
        let result = self.conn.query_row(
            "SELECT id, job_id, report_date, status, approved_by, approved_at, created_at
             FROM progress_reports
             WHERE job_id = ?1 AND status = 'approved'
             ORDER BY report_date DESC, id DESC LIMIT 1",
            params![job_id],
            Self::map_progress_report,
        );
        match result {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn get_progress_lines(&self, report_id: i64) -> Result<Vec<ProgressLine>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, report_id, area, system, submitted_ctd_amount, submitted_ctd_percent, approved_ctd_amount, approved_ctd_percent, previous_ctd_amount
             FROM progress_lines WHERE report_id = ?1 ORDER BY area, system",
        )?;
        let rows = stmt.query_map(params![report_id], |row| {
            Ok(ProgressLine {
                id: Some(row.get(0)?),
                report_id: row.get(1)?,
                area: row.get(2)?,
                system: row.get(3)?,
                submitted_ctd_amount: get_dec(row, 4)?,
                submitted_ctd_percent: get_dec(row, 5)?,
                approved_ctd_amount: get_dec(row, 6)?,
                approved_ctd_percent: get_dec(row, 7)?,
                previous_ctd_amount: get_dec(row, 8)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn update_progress_status(
        &self,
        report_id: i64,
        status: ProgressStatus,
        approved_by: &str,
        approved_at: &str,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE progress_reports SET status = ?1, approved_by = ?2, approved_at = ?3 WHERE id = ?4",
            params![status.as_str(), approved_by, approved_at, report_id],
        )?;
        Ok(())
    }

    // ── Forecasts ─────────────────────────────────────────────

    const FORECAST_COLUMNS: &'static str = "id, job_id, period, month_number, progress_report_id, status, archived,
        budget_cost, budget_value, cost_to_date, earned_to_date, planned_value, percent_complete,
        cost_variance, schedule_variance, cpi, spi, eac, etc, vac, tcpi,
        forecast_final_cost, forecast_final_value, fee, health,
        created_at, updated_at, submitted_by, submitted_at, approved_by, approved_at";

    /// Insert or update a forecast and replace its line detail in one
    /// transaction. The partial unique indexes serialize concurrent saves
    /// for the same (job, period) or progress report.
    pub(crate) fn save_forecast(
        &mut self,
        forecast: &mut Forecast,
        lines: &[ForecastLine],
    ) -> Result<i64> {
        let tx = self.conn.transaction()?;
        let s = &forecast.summary;
        let forecast_id = match forecast.id {
            Some(id) => {
                tx.execute(
                    "UPDATE forecasts SET
                        month_number = ?1, progress_report_id = ?2, status = ?3, archived = ?4,
                        budget_cost = ?5, budget_value = ?6, cost_to_date = ?7, earned_to_date = ?8,
                        planned_value = ?9, percent_complete = ?10, cost_variance = ?11,
                        schedule_variance = ?12, cpi = ?13, spi = ?14, eac = ?15, etc = ?16,
                        vac = ?17, tcpi = ?18, forecast_final_cost = ?19, forecast_final_value = ?20,
                        fee = ?21, health = ?22, updated_at = ?23, submitted_by = ?24,
                        submitted_at = ?25, approved_by = ?26, approved_at = ?27
                     WHERE id = ?28",
                    params![
                        forecast.month_number,
                        forecast.progress_report_id,
                        forecast.status.as_str(),
                        forecast.archived,
                        s.budget_cost.to_string(),
                        s.budget_value.to_string(),
                        s.cost_to_date.to_string(),
                        s.earned_to_date.to_string(),
                        s.planned_value.to_string(),
                        s.percent_complete.to_string(),
                        s.cost_variance.to_string(),
                        s.schedule_variance.to_string(),
                        s.cpi.to_string(),
                        s.spi.to_string(),
                        s.eac.to_string(),
                        s.etc.to_string(),
                        s.vac.to_string(),
                        s.tcpi.to_string(),
                        s.forecast_final_cost.to_string(),
                        s.forecast_final_value.to_string(),
                        s.fee.to_string(),
                        s.health,
                        forecast.updated_at,
                        forecast.submitted_by,
                        forecast.submitted_at,
                        forecast.approved_by,
                        forecast.approved_at,
                        id,
                    ],
                )?;
                tx.execute(
                    "DELETE FROM forecast_lines WHERE forecast_id = ?1",
                    params![id],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO forecasts (job_id, period, month_number, progress_report_id, status, archived,
                        budget_cost, budget_value, cost_to_date, earned_to_date, planned_value, percent_complete,
                        cost_variance, schedule_variance, cpi, spi, eac, etc, vac, tcpi,
                        forecast_final_cost, forecast_final_value, fee, health,
                        created_at, updated_at, submitted_by, submitted_at, approved_by, approved_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                        ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30)",
                    params![
                        forecast.job_id,
                        forecast.period,
                        forecast.month_number,
                        forecast.progress_report_id,
                        forecast.status.as_str(),
                        forecast.archived,
                        s.budget_cost.to_string(),
                        s.budget_value.to_string(),
                        s.cost_to_date.to_string(),
                        s.earned_to_date.to_string(),
                        s.planned_value.to_string(),
                        s.percent_complete.to_string(),
                        s.cost_variance.to_string(),
                        s.schedule_variance.to_string(),
                        s.cpi.to_string(),
                        s.spi.to_string(),
                        s.eac.to_string(),
                        s.etc.to_string(),
                        s.vac.to_string(),
                        s.tcpi.to_string(),
                        s.forecast_final_cost.to_string(),
                        s.forecast_final_value.to_string(),
                        s.fee.to_string(),
                        s.health,
                        forecast.created_at,
                        forecast.updated_at,
                        forecast.submitted_by,
                        forecast.submitted_at,
                        forecast.approved_by,
                        forecast.approved_at,
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        for line in lines {
            tx.execute(
                "INSERT INTO forecast_lines (forecast_id, area, system, budget_cost, budget_value, cost_to_date, earned_to_date, forecast_final_cost, forecast_final_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    forecast_id,
                    line.area,
                    line.system,
                    line.budget_cost.to_string(),
                    line.budget_value.to_string(),
                    line.cost_to_date.to_string(),
                    line.earned_to_date.to_string(),
                    line.forecast_final_cost.to_string(),
                    line.forecast_final_value.to_string(),
                ],
            )?;
        }
        tx.commit()?;
        forecast.id = Some(forecast_id);
        Ok(forecast_id)
    }

    fn map_forecast(row: &Row) -> rusqlite::Result<Forecast> {
        Ok(Forecast {
            id: Some(row.get(0)?),
            job_id: row.get(1)?,
            period: row.get(2)?,
            month_number: row.get(3)?,
            progress_report_id: row.get(4)?,
            status: ForecastStatus::parse(&row.get::<_, String>(5)?),
            archived: row.get(6)?,
            summary: ForecastSummary {
                budget_cost: get_dec(row, 7)?,
                budget_value: get_dec(row, 8)?,
                cost_to_date: get_dec(row, 9)?,
                earned_to_date: get_dec(row, 10)?,
                planned_value: get_dec(row, 11)?,
                percent_complete: get_dec(row, 12)?,
                cost_variance: get_dec(row, 13)?,
                schedule_variance: get_dec(row, 14)?,
                cpi: get_dec(row, 15)?,
                spi: get_dec(row, 16)?,
                eac: get_dec(row, 17)?,
                etc: get_dec(row, 18)?,
                vac: get_dec(row, 19)?,
                tcpi: get_dec(row, 20)?,
                forecast_final_cost: get_dec(row, 21)?,
                forecast_final_value: get_dec(row, 22)?,
                fee: get_dec(row, 23)?,
                health: row.get(24)?,
            },
            created_at: row.get(25)?,
            updated_at: row.get(26)?,
            submitted_by: row.get(27)?,
            submitted_at: row.get(28)?,
            approved_by: row.get(29)?,
            approved_at: row.get(30)?,
        })
    }

    /// The active (non-archived) forecast for a period, if any.
    pub(crate) fn get_forecast(&self, job_id: i64, period: &str) -> Result<Option<Forecast>> {
        let sql = format!(
            "SELECT {} FROM forecasts WHERE job_id = ?1 AND period = ?2 AND archived = 0",
            Self::FORECAST_COLUMNS
        );
        let result = self
            .conn
            .query_row(&sql, params![job_id, period], Self::map_forecast);
        match result {
            Ok(f) => Ok(Some(f)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The active forecast consuming a progress report, if any.
    pub(crate) fn get_forecast_by_report(&self, report_id: i64) -> Result<Option<Forecast>> {
        let sql = format!(
            "SELECT {} FROM forecasts WHERE progress_report_id = ?1 AND archived = 0",
            Self::FORECAST_COLUMNS
        );
        let result = self
            .conn
            .query_row(&sql, params![report_id], Self::map_forecast);
        match result {
            Ok(f) => Ok(Some(f)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn get_forecasts(&self, job_id: i64) -> Result<Vec<Forecast>> {
        let sql = format!(
            "SELECT {} FROM forecasts WHERE job_id = ?1 AND archived = 0 ORDER BY period",
            Self::FORECAST_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![job_id], Self::map_forecast)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn get_forecast_lines(&self, forecast_id: i64) -> Result<Vec<ForecastLine>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, forecast_id, area, system, budget_cost, budget_value, cost_to_date, earned_to_date, forecast_final_cost, forecast_final_value
             FROM forecast_lines WHERE forecast_id = ?1 ORDER BY area, system",
        )?;
        let rows = stmt.query_map(params![forecast_id], |row| {
            Ok(ForecastLine {
                id: Some(row.get(0)?),
                forecast_id: row.get(1)?,
                area: row.get(2)?,
                system: row.get(3)?,
                budget_cost: get_dec(row, 4)?,
                budget_value: get_dec(row, 5)?,
                cost_to_date: get_dec(row, 6)?,
                earned_to_date: get_dec(row, 7)?,
                forecast_final_cost: get_dec(row, 8)?,
                forecast_final_value: get_dec(row, 9)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Soft delete: the row survives but leaves every active query.
    pub(crate) fn archive_forecast(&self, forecast_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE forecasts SET archived = 1, updated_at = ?1 WHERE id = ?2",
            params![chrono::Utc::now().to_rfc3339(), forecast_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
