#![allow(clippy::unwrap_used)]

use super::*;
use rust_decimal_macros::dec;

fn test_job() -> Job {
    Job::new(
        "24-017".into(),
        "Riverside Plant".into(),
        "2024-02-01".into(),
        "2024-11-30".into(),
        dec!(2500000),
    )
}

fn setup_job(db: &Database) -> i64 {
    db.insert_job(&test_job()).unwrap()
}

fn setup_budget(db: &Database, job_id: i64) -> Vec<i64> {
    let lines = [
        ("02-100", "Area 1", "Piping", dec!(80000), dec!(100000)),
        ("02-200", "Area 1", "Piping", dec!(40000), dec!(50000)),
        ("03-100", "Area 2", "Electrical", dec!(60000), dec!(75000)),
    ];
    lines
        .iter()
        .map(|(code, area, system, cost, value)| {
            db.insert_budget_line(&BudgetLine::new(
                job_id,
                code.to_string(),
                area.to_string(),
                system.to_string(),
                String::new(),
                *cost,
                *value,
            ))
            .unwrap()
        })
        .collect()
}

fn make_labor(job_id: i64, date: &str, status: LaborStatus, cost: Decimal) -> LaborEntry {
    LaborEntry {
        id: None,
        job_id,
        worker: "J. Ortiz".into(),
        work_date: date.into(),
        status,
        cost_code: "02-100".into(),
        budget_line_id: None,
        area: String::new(),
        system: String::new(),
        hours: dec!(8),
        total_cost: cost,
        import_hash: String::new(),
        created_at: String::new(),
    }
}

fn make_report(job_id: i64, date: &str, status: ProgressStatus) -> ProgressReport {
    let mut report = ProgressReport::new(job_id, date.into());
    report.status = status;
    report
}

fn make_progress_line(amount: Decimal, percent: Decimal) -> ProgressLine {
    ProgressLine {
        id: None,
        report_id: 0,
        area: "Area 1".into(),
        system: "Piping".into(),
        submitted_ctd_amount: amount,
        submitted_ctd_percent: percent,
        approved_ctd_amount: amount,
        approved_ctd_percent: percent,
        previous_ctd_amount: Decimal::ZERO,
    }
}

// ── Jobs ──────────────────────────────────────────────────────

#[test]
fn test_job_crud() {
    let db = Database::open_in_memory().unwrap();
    let id = setup_job(&db);

    let fetched = db.get_job(id).unwrap().unwrap();
    assert_eq!(fetched.number, "24-017");
    assert_eq!(fetched.contract_value, dec!(2500000));

    let by_number = db.get_job_by_number("24-017").unwrap();
    assert!(by_number.is_some());

    assert!(db.get_job(9999).unwrap().is_none());
    assert!(db.get_job_by_number("nope").unwrap().is_none());
}

#[test]
fn test_find_job_by_number_then_id() {
    let db = Database::open_in_memory().unwrap();
    let id = setup_job(&db);

    assert!(db.find_job("24-017").unwrap().is_some());
    assert!(db.find_job(&id.to_string()).unwrap().is_some());
    assert!(db.find_job("99-999").unwrap().is_none());
}

#[test]
fn test_jobs_sorted_by_number() {
    let db = Database::open_in_memory().unwrap();
    for number in ["24-030", "24-002", "24-017"] {
        let mut job = test_job();
        job.number = number.into();
        db.insert_job(&job).unwrap();
    }
    let numbers: Vec<String> = db.get_jobs().unwrap().into_iter().map(|j| j.number).collect();
    assert_eq!(numbers, vec!["24-002", "24-017", "24-030"]);
}

// ── Budget lines ──────────────────────────────────────────────

#[test]
fn test_budget_lines_roundtrip() {
    let db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);
    let ids = setup_budget(&db, job_id);
    assert_eq!(ids.len(), 3);

    let lines = db.get_budget_lines(job_id).unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0].cost_code, "02-100");
    assert_eq!(lines[0].budget_value, dec!(100000));
    // Insertion order preserved.
    assert_eq!(lines.iter().map(|l| l.id.unwrap()).collect::<Vec<_>>(), ids);
}

// ── Labor ─────────────────────────────────────────────────────

#[test]
fn test_approved_labor_filters_status_and_date() {
    let db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    db.insert_labor_entry(&make_labor(job_id, "2024-03-05", LaborStatus::Approved, dec!(640)))
        .unwrap();
    db.insert_labor_entry(&make_labor(job_id, "2024-03-06", LaborStatus::Pending, dec!(500)))
        .unwrap();
    db.insert_labor_entry(&make_labor(job_id, "2024-04-02", LaborStatus::Approved, dec!(720)))
        .unwrap();

    let march = db.get_approved_labor(job_id, "2024-03-31").unwrap();
    assert_eq!(march.len(), 1);
    assert_eq!(march[0].total_cost, dec!(640));

    let april = db.get_approved_labor(job_id, "2024-04-30").unwrap();
    assert_eq!(april.len(), 2);
}

#[test]
fn test_labor_batch_dedup() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    let mut entry = make_labor(job_id, "2024-03-05", LaborStatus::Approved, dec!(640));
    entry.import_hash = "labor-1".into();

    let count = db.insert_labor_batch(std::slice::from_ref(&entry)).unwrap();
    assert_eq!(count, 1);
    let count = db.insert_labor_batch(std::slice::from_ref(&entry)).unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_labor_batch_empty_hash_not_deduped() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    let entry = make_labor(job_id, "2024-03-05", LaborStatus::Approved, dec!(640));
    assert!(entry.import_hash.is_empty());
    assert_eq!(db.insert_labor_batch(std::slice::from_ref(&entry)).unwrap(), 1);
    assert_eq!(db.insert_labor_batch(std::slice::from_ref(&entry)).unwrap(), 1);
}

// ── Invoices ──────────────────────────────────────────────────

fn make_invoice(job_id: i64, number: &str, date: &str, total: Decimal) -> Invoice {
    Invoice {
        id: None,
        job_id,
        vendor: "Apex Supply".into(),
        invoice_number: number.into(),
        invoice_date: date.into(),
        status: InvoiceStatus::Open,
        total_amount: total,
        import_hash: String::new(),
        created_at: String::new(),
    }
}

fn make_allocation(code: &str, amount: Decimal) -> InvoiceAllocation {
    InvoiceAllocation {
        id: None,
        invoice_id: 0,
        cost_code: code.into(),
        budget_line_id: None,
        area: String::new(),
        system: String::new(),
        amount,
    }
}

#[test]
fn test_invoice_insert_and_allocations() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    let invoice = make_invoice(job_id, "INV-1001", "2024-03-10", dec!(1000));
    let allocs = vec![
        make_allocation("02-100", dec!(600)),
        make_allocation("03-100", dec!(400)),
    ];
    let id = db.insert_invoice(&invoice, &allocs).unwrap();
    assert!(id > 0);

    let stored = db.get_invoices(job_id).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].total_amount, dec!(1000));

    let within = db.get_allocations_before(job_id, "2024-03-31").unwrap();
    assert_eq!(within.len(), 2);
    let before = db.get_allocations_before(job_id, "2024-03-01").unwrap();
    assert!(before.is_empty());
}

#[test]
fn test_invoice_allocation_mismatch_rejected() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    let invoice = make_invoice(job_id, "INV-1002", "2024-03-10", dec!(1000));
    let allocs = vec![make_allocation("02-100", dec!(900))];
    let err = db.insert_invoice(&invoice, &allocs).unwrap_err();
    assert!(err.to_string().contains("invoice total"));
    // Nothing half-written.
    assert!(db.get_invoices(job_id).unwrap().is_empty());
}

#[test]
fn test_invoice_hash_exists() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    let mut invoice = make_invoice(job_id, "INV-1003", "2024-03-10", dec!(500));
    invoice.import_hash = format!("{job_id}|INV-1003");
    db.insert_invoice(&invoice, &[make_allocation("02-100", dec!(500))])
        .unwrap();

    assert!(db.invoice_hash_exists(&invoice.import_hash).unwrap());
    assert!(!db.invoice_hash_exists("other").unwrap());
    assert!(!db.invoice_hash_exists("").unwrap());
}

// ── Progress reports ──────────────────────────────────────────

#[test]
fn test_progress_report_with_lines() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    let report = make_report(job_id, "2024-03-28", ProgressStatus::Draft);
    let lines = vec![make_progress_line(dec!(40000), dec!(40))];
    let id = db.insert_progress_report(&report, &lines).unwrap();

    let fetched = db.get_progress_report(id).unwrap().unwrap();
    assert_eq!(fetched.status, ProgressStatus::Draft);

    let stored_lines = db.get_progress_lines(id).unwrap();
    assert_eq!(stored_lines.len(), 1);
    assert_eq!(stored_lines[0].approved_ctd_amount, dec!(40000));
    assert_eq!(stored_lines[0].approved_ctd_percent, dec!(40));
}

#[test]
fn test_approved_report_in_month_latest_wins() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    db.insert_progress_report(&make_report(job_id, "2024-03-14", ProgressStatus::Approved), &[])
        .unwrap();
    let late = db
        .insert_progress_report(&make_report(job_id, "2024-03-28", ProgressStatus::Approved), &[])
        .unwrap();
    db.insert_progress_report(&make_report(job_id, "2024-03-30", ProgressStatus::Draft), &[])
        .unwrap();

    let found = db.approved_report_in_month(job_id, "2024-03").unwrap().unwrap();
    assert_eq!(found.id, Some(late));

    assert!(db.approved_report_in_month(job_id, "2024-04").unwrap().is_none());
}

#[test]
fn test_previous_and_latest_approved_report() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    let march = db
        .insert_progress_report(&make_report(job_id, "2024-03-28", ProgressStatus::Approved), &[])
        .unwrap();
    let april = db
        .insert_progress_report(&make_report(job_id, "2024-04-26", ProgressStatus::Approved), &[])
        .unwrap();

    let prev = db.previous_approved_report(job_id, "2024-04-26").unwrap().unwrap();
    assert_eq!(prev.id, Some(march));
    assert!(db.previous_approved_report(job_id, "2024-03-28").unwrap().is_none());

    let latest = db.latest_approved_report(job_id).unwrap().unwrap();
    assert_eq!(latest.id, Some(april));
}

#[test]
fn test_update_progress_status() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);
    let id = db
        .insert_progress_report(&make_report(job_id, "2024-03-28", ProgressStatus::Submitted), &[])
        .unwrap();

    db.update_progress_status(id, ProgressStatus::Approved, "pm", "2024-03-29T00:00:00Z")
        .unwrap();
    let report = db.get_progress_report(id).unwrap().unwrap();
    assert_eq!(report.status, ProgressStatus::Approved);
    assert_eq!(report.approved_by, "pm");
}

// ── Forecasts ─────────────────────────────────────────────────

fn make_forecast(job_id: i64, period: &str) -> Forecast {
    let mut forecast = Forecast::new(job_id, period.into(), 2);
    forecast.summary.budget_value = dec!(225000);
    forecast.summary.cost_to_date = dec!(60000);
    forecast.summary.forecast_final_cost = dec!(230000);
    forecast.summary.health = "at_risk".into();
    forecast
}

fn make_forecast_line(area: &str, system: &str) -> ForecastLine {
    ForecastLine {
        id: None,
        forecast_id: 0,
        area: area.into(),
        system: system.into(),
        budget_cost: dec!(120000),
        budget_value: dec!(150000),
        cost_to_date: dec!(40000),
        earned_to_date: dec!(45000),
        forecast_final_cost: dec!(130000),
        forecast_final_value: dec!(150000),
    }
}

#[test]
fn test_forecast_insert_and_fetch() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    let mut forecast = make_forecast(job_id, "2024-03");
    let lines = vec![make_forecast_line("Area 1", "Piping")];
    let id = db.save_forecast(&mut forecast, &lines).unwrap();
    assert_eq!(forecast.id, Some(id));

    let fetched = db.get_forecast(job_id, "2024-03").unwrap().unwrap();
    assert_eq!(fetched.summary.budget_value, dec!(225000));
    assert_eq!(fetched.summary.health, "at_risk");
    assert_eq!(fetched.status, ForecastStatus::Draft);

    let stored_lines = db.get_forecast_lines(id).unwrap();
    assert_eq!(stored_lines.len(), 1);
    assert_eq!(stored_lines[0].earned_to_date, dec!(45000));
}

#[test]
fn test_forecast_update_replaces_lines() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    let mut forecast = make_forecast(job_id, "2024-03");
    let id = db
        .save_forecast(&mut forecast, &[make_forecast_line("Area 1", "Piping")])
        .unwrap();

    forecast.summary.cost_to_date = dec!(72000);
    let new_lines = vec![
        make_forecast_line("Area 1", "Piping"),
        make_forecast_line("Area 2", "Electrical"),
    ];
    let second_id = db.save_forecast(&mut forecast, &new_lines).unwrap();
    assert_eq!(second_id, id);

    let fetched = db.get_forecast(job_id, "2024-03").unwrap().unwrap();
    assert_eq!(fetched.summary.cost_to_date, dec!(72000));
    assert_eq!(db.get_forecast_lines(id).unwrap().len(), 2);
    assert_eq!(db.get_forecasts(job_id).unwrap().len(), 1);
}

#[test]
fn test_forecast_unique_per_period_when_active() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    let mut first = make_forecast(job_id, "2024-03");
    db.save_forecast(&mut first, &[]).unwrap();

    // A second active row for the same period violates the partial index.
    let mut duplicate = make_forecast(job_id, "2024-03");
    assert!(db.save_forecast(&mut duplicate, &[]).is_err());

    // Archiving the first frees the slot.
    db.archive_forecast(first.id.unwrap()).unwrap();
    let mut replacement = make_forecast(job_id, "2024-03");
    assert!(db.save_forecast(&mut replacement, &[]).is_ok());
}

#[test]
fn test_forecast_by_report_and_report_uniqueness() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);
    let report_id = db
        .insert_progress_report(&make_report(job_id, "2024-03-28", ProgressStatus::Approved), &[])
        .unwrap();

    let mut forecast = make_forecast(job_id, "2024-03");
    forecast.progress_report_id = Some(report_id);
    db.save_forecast(&mut forecast, &[]).unwrap();

    let found = db.get_forecast_by_report(report_id).unwrap().unwrap();
    assert_eq!(found.period, "2024-03");

    // The same report cannot back a second active forecast.
    let mut second = make_forecast(job_id, "2024-04");
    second.progress_report_id = Some(report_id);
    assert!(db.save_forecast(&mut second, &[]).is_err());
}

#[test]
fn test_archived_forecasts_excluded() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    let mut forecast = make_forecast(job_id, "2024-03");
    let id = db.save_forecast(&mut forecast, &[]).unwrap();
    db.archive_forecast(id).unwrap();

    assert!(db.get_forecast(job_id, "2024-03").unwrap().is_none());
    assert!(db.get_forecasts(job_id).unwrap().is_empty());
}

#[test]
fn test_forecasts_ordered_by_period() {
    let mut db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    for period in ["2024-05", "2024-03", "2024-04"] {
        let mut forecast = make_forecast(job_id, period);
        db.save_forecast(&mut forecast, &[]).unwrap();
    }
    let periods: Vec<String> = db
        .get_forecasts(job_id)
        .unwrap()
        .into_iter()
        .map(|f| f.period)
        .collect();
    assert_eq!(periods, vec!["2024-03", "2024-04", "2024-05"]);
}

// ── Decimal precision ─────────────────────────────────────────

#[test]
fn test_decimal_precision_preserved() {
    let db = Database::open_in_memory().unwrap();
    let job_id = setup_job(&db);

    db.insert_labor_entry(&make_labor(job_id, "2024-03-05", LaborStatus::Approved, dec!(1234.5678)))
        .unwrap();
    let labor = db.get_approved_labor(job_id, "2024-12-31").unwrap();
    assert_eq!(labor[0].total_cost, dec!(1234.5678));
}

// ── Schema migration ──────────────────────────────────────────

#[test]
fn test_schema_version_set() {
    let db = Database::open_in_memory().unwrap();
    let version: i32 = db
        .conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(version, schema::CURRENT_VERSION);
}

#[test]
fn test_double_migrate_idempotent() {
    let mut db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();
    let version: i32 = db
        .conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(version, schema::CURRENT_VERSION);
}
