pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS jobs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    number          TEXT NOT NULL UNIQUE,
    name            TEXT NOT NULL,
    start_date      TEXT NOT NULL,
    end_date        TEXT NOT NULL,
    contract_value  TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS budget_lines (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id       INTEGER NOT NULL REFERENCES jobs(id),
    cost_code    TEXT NOT NULL,
    area         TEXT NOT NULL,
    system       TEXT NOT NULL,
    phase        TEXT NOT NULL DEFAULT '',
    budget_cost  TEXT NOT NULL,
    budget_value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_budget_lines_job ON budget_lines(job_id);
CREATE INDEX IF NOT EXISTS idx_budget_lines_code ON budget_lines(job_id, cost_code);

CREATE TABLE IF NOT EXISTS labor_entries (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id         INTEGER NOT NULL REFERENCES jobs(id),
    worker         TEXT NOT NULL,
    work_date      TEXT NOT NULL,
    status         TEXT NOT NULL DEFAULT 'pending',
    cost_code      TEXT NOT NULL,
    budget_line_id INTEGER REFERENCES budget_lines(id),
    area           TEXT NOT NULL DEFAULT '',
    system         TEXT NOT NULL DEFAULT '',
    hours          TEXT NOT NULL,
    total_cost     TEXT NOT NULL,
    import_hash    TEXT NOT NULL DEFAULT '',
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_labor_job_date ON labor_entries(job_id, work_date);
CREATE UNIQUE INDEX IF NOT EXISTS idx_labor_hash_unique ON labor_entries(import_hash) WHERE import_hash != '';

CREATE TABLE IF NOT EXISTS invoices (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id         INTEGER NOT NULL REFERENCES jobs(id),
    vendor         TEXT NOT NULL,
    invoice_number TEXT NOT NULL,
    invoice_date   TEXT NOT NULL,
    status         TEXT NOT NULL DEFAULT 'open',
    total_amount   TEXT NOT NULL,
    import_hash    TEXT NOT NULL DEFAULT '',
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_invoices_job_date ON invoices(job_id, invoice_date);
CREATE UNIQUE INDEX IF NOT EXISTS idx_invoices_hash_unique ON invoices(import_hash) WHERE import_hash != '';

CREATE TABLE IF NOT EXISTS invoice_allocations (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    invoice_id     INTEGER NOT NULL REFERENCES invoices(id),
    cost_code      TEXT NOT NULL,
    budget_line_id INTEGER REFERENCES budget_lines(id),
    area           TEXT NOT NULL DEFAULT '',
    system         TEXT NOT NULL DEFAULT '',
    amount         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_allocations_invoice ON invoice_allocations(invoice_id);

CREATE TABLE IF NOT EXISTS progress_reports (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id      INTEGER NOT NULL REFERENCES jobs(id),
    report_date TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'draft',
    approved_by TEXT NOT NULL DEFAULT '',
    approved_at TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_progress_job_date ON progress_reports(job_id, report_date);

CREATE TABLE IF NOT EXISTS progress_lines (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    report_id             INTEGER NOT NULL REFERENCES progress_reports(id),
    area                  TEXT NOT NULL,
    system                TEXT NOT NULL,
    submitted_ctd_amount  TEXT NOT NULL,
    submitted_ctd_percent TEXT NOT NULL,
    approved_ctd_amount   TEXT NOT NULL,
    approved_ctd_percent  TEXT NOT NULL,
    previous_ctd_amount   TEXT NOT NULL DEFAULT '0'
);

CREATE INDEX IF NOT EXISTS idx_progress_lines_report ON progress_lines(report_id);

CREATE TABLE IF NOT EXISTS forecasts (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id               INTEGER NOT NULL REFERENCES jobs(id),
    period               TEXT NOT NULL,
    month_number         INTEGER NOT NULL,
    progress_report_id   INTEGER REFERENCES progress_reports(id),
    status               TEXT NOT NULL DEFAULT 'draft',
    archived             BOOLEAN NOT NULL DEFAULT 0,
    budget_cost          TEXT NOT NULL DEFAULT '0',
    budget_value         TEXT NOT NULL DEFAULT '0',
    cost_to_date         TEXT NOT NULL DEFAULT '0',
    earned_to_date       TEXT NOT NULL DEFAULT '0',
    planned_value        TEXT NOT NULL DEFAULT '0',
    percent_complete     TEXT NOT NULL DEFAULT '0',
    cost_variance        TEXT NOT NULL DEFAULT '0',
    schedule_variance    TEXT NOT NULL DEFAULT '0',
    cpi                  TEXT NOT NULL DEFAULT '0',
    spi                  TEXT NOT NULL DEFAULT '0',
    eac                  TEXT NOT NULL DEFAULT '0',
    etc                  TEXT NOT NULL DEFAULT '0',
    vac                  TEXT NOT NULL DEFAULT '0',
    tcpi                 TEXT NOT NULL DEFAULT '0',
    forecast_final_cost  TEXT NOT NULL DEFAULT '0',
    forecast_final_value TEXT NOT NULL DEFAULT '0',
    fee                  TEXT NOT NULL DEFAULT '0',
    health               TEXT NOT NULL DEFAULT 'on_budget',
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL,
    submitted_by         TEXT NOT NULL DEFAULT '',
    submitted_at         TEXT NOT NULL DEFAULT '',
    approved_by          TEXT NOT NULL DEFAULT '',
    approved_at          TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_forecasts_job ON forecasts(job_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_forecasts_period_active ON forecasts(job_id, period) WHERE archived = 0;
CREATE UNIQUE INDEX IF NOT EXISTS idx_forecasts_report_active ON forecasts(progress_report_id) WHERE archived = 0 AND progress_report_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS forecast_lines (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    forecast_id          INTEGER NOT NULL REFERENCES forecasts(id),
    area                 TEXT NOT NULL,
    system               TEXT NOT NULL,
    budget_cost          TEXT NOT NULL DEFAULT '0',
    budget_value         TEXT NOT NULL DEFAULT '0',
    cost_to_date         TEXT NOT NULL DEFAULT '0',
    earned_to_date       TEXT NOT NULL DEFAULT '0',
    forecast_final_cost  TEXT NOT NULL DEFAULT '0',
    forecast_final_value TEXT NOT NULL DEFAULT '0'
);

CREATE INDEX IF NOT EXISTS idx_forecast_lines_forecast ON forecast_lines(forecast_id);

"#;

pub(crate) const CURRENT_VERSION: i32 = 1;

/// Migrations from version N to N+1.
/// Each entry is (from_version, sql).
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[];
