use anyhow::{bail, Context, Result};
use regex::Regex;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

use crate::db::Database;
use crate::forecast::{self, GroupBy};
use crate::grouping::GroupKey;
use crate::import;
use crate::models::Job;
use crate::progress;

pub(crate) fn as_cli(args: &[String], db: &mut Database) -> Result<()> {
    match args[1].as_str() {
        "job" => cmd_job(&args[2..], db),
        "jobs" => cmd_jobs(db),
        "budget" => cmd_budget(&args[2..], db),
        "import" => cmd_import(&args[2..], db),
        "progress" => cmd_progress(&args[2..], db),
        "ctc" => cmd_ctc(&args[2..], db),
        "forecasts" => cmd_forecasts(&args[2..], db),
        "forecast" => cmd_forecast(&args[2..], db),
        "evb" => cmd_evb(&args[2..], db),
        "summary" | "s" => cmd_summary(&args[2..], db),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("jobcost {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("JobCost — construction job cost tracking and earned-value forecasting");
    println!();
    println!("Usage: jobcost <command>");
    println!();
    println!("Commands:");
    println!("  jobs                                   List jobs");
    println!("  job add --number N --name NAME --start YYYY-MM-DD --end YYYY-MM-DD --value AMT");
    println!("  budget add <job> --code C --area A --system S [--phase P] --cost AMT --value AMT");
    println!("  budget list <job>                      Show the schedule of values");
    println!("  import labor <job> <file.csv>          Import labor time entries");
    println!("  import invoices <job> <file.csv>       Import vendor invoices");
    println!("  progress add <job> --date YYYY-MM-DD --line 'Area/System=amount@pct' ...");
    println!("  progress list <job>                    List progress reports");
    println!("  progress submit <job> <report-id>");
    println!("  progress approve <job> <report-id> [--actor NAME]");
    println!("  ctc <job> <period>                     Cost-to-complete for a period (YYYY-MM or month #)");
    println!("  forecasts <job>                        Forecast timeline, saved or generated");
    println!("  forecast save <job> <period>           Persist the forecast for a period");
    println!("  forecast submit <job> <period> [--actor NAME]");
    println!("  forecast approve <job> <period> [--actor NAME]");
    println!("  forecast archive <job> <period>");
    println!("  evb <job> [--as-of YYYY-MM-DD] [--group-by area|system|flat]");
    println!("  summary <job>                          Latest-period overview");
    println!("  --help, -h                             Show this help");
}

// ── Argument helpers ─────────────────────────────────────────

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn flag_values<'a>(args: &'a [String], name: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        if arg == name {
            if let Some(v) = args.get(i + 1) {
                out.push(v.as_str());
            }
        }
    }
    out
}

fn require_flag<'a>(args: &'a [String], name: &str) -> Result<&'a str> {
    flag_value(args, name).with_context(|| format!("Missing required flag {name}"))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s.trim()).with_context(|| format!("Not a number: '{s}'"))
}

fn lookup_job(db: &Database, reference: &str) -> Result<Job> {
    db.find_job(reference)?
        .with_context(|| format!("Job '{reference}' not found"))
}

fn actor(args: &[String]) -> String {
    flag_value(args, "--actor")
        .map(str::to_string)
        .unwrap_or_else(|| std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()))
}

/// Format a decimal amount with thousand separators and 2 decimal places.
/// e.g. `1234567.89` → `"$1,234,567.89"`
fn format_amount(val: Decimal) -> String {
    let abs = val.abs().round_dp(2);
    let formatted = format!("{abs:.2}");
    let mut parts = formatted.split('.');
    let int_part = parts.next().unwrap_or("0");
    let dec_part = parts.next().unwrap_or("00");

    let with_commas: String = int_part
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(",");

    if val < Decimal::ZERO {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

// ── Jobs & budget ────────────────────────────────────────────

fn cmd_job(args: &[String], db: &mut Database) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("add") => {
            let job = Job::new(
                require_flag(args, "--number")?.to_string(),
                require_flag(args, "--name")?.to_string(),
                require_flag(args, "--start")?.to_string(),
                require_flag(args, "--end")?.to_string(),
                parse_decimal(require_flag(args, "--value")?)?,
            );
            let id = db.insert_job(&job)?;
            println!("Created job {} ({}) id={id}", job.number, job.name);
            Ok(())
        }
        _ => bail!("Usage: jobcost job add --number N --name NAME --start D --end D --value AMT"),
    }
}

fn cmd_jobs(db: &Database) -> Result<()> {
    let jobs = db.get_jobs()?;
    if jobs.is_empty() {
        println!("No jobs yet. Create one with: jobcost job add ...");
        return Ok(());
    }
    println!("{:<10} {:<30} {:<12} {:<12} {:>16}", "NUMBER", "NAME", "START", "END", "CONTRACT");
    for job in jobs {
        println!(
            "{:<10} {:<30} {:<12} {:<12} {:>16}",
            job.number,
            job.name,
            job.start_date,
            job.end_date,
            format_amount(job.contract_value)
        );
    }
    Ok(())
}

fn cmd_budget(args: &[String], db: &mut Database) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("add") => {
            let job = lookup_job(db, args.get(1).map(String::as_str).unwrap_or(""))?;
            let line = crate::models::BudgetLine::new(
                job.id.unwrap_or_default(),
                require_flag(args, "--code")?.to_string(),
                require_flag(args, "--area")?.to_string(),
                require_flag(args, "--system")?.to_string(),
                flag_value(args, "--phase").unwrap_or("").to_string(),
                parse_decimal(require_flag(args, "--cost")?)?,
                parse_decimal(require_flag(args, "--value")?)?,
            );
            let id = db.insert_budget_line(&line)?;
            println!("Added budget line {} ({} / {}) id={id}", line.cost_code, line.area, line.system);
            Ok(())
        }
        Some("list") => {
            let job = lookup_job(db, args.get(1).map(String::as_str).unwrap_or(""))?;
            let lines = db.get_budget_lines(job.id.unwrap_or_default())?;
            println!("{:<10} {:<16} {:<16} {:>14} {:>14}", "CODE", "AREA", "SYSTEM", "COST", "VALUE");
            for line in lines {
                println!(
                    "{:<10} {:<16} {:<16} {:>14} {:>14}",
                    line.cost_code,
                    line.area,
                    line.system,
                    format_amount(line.budget_cost),
                    format_amount(line.budget_value)
                );
            }
            Ok(())
        }
        _ => bail!("Usage: jobcost budget add|list <job> ..."),
    }
}

// ── Import ───────────────────────────────────────────────────

fn cmd_import(args: &[String], db: &mut Database) -> Result<()> {
    let (kind, job_ref, file) = match (args.first(), args.get(1), args.get(2)) {
        (Some(k), Some(j), Some(f)) => (k.as_str(), j.as_str(), f.as_str()),
        _ => bail!("Usage: jobcost import labor|invoices <job> <file.csv>"),
    };
    let job = lookup_job(db, job_ref)?;
    let job_id = job.id.unwrap_or_default();
    let summary = match kind {
        "labor" => import::import_labor(db, job_id, Path::new(file))?,
        "invoices" => import::import_invoices(db, job_id, Path::new(file))?,
        other => bail!("Unknown import type: {other}"),
    };
    println!(
        "Imported {} record(s), {} duplicate(s) skipped",
        summary.imported, summary.skipped
    );
    Ok(())
}

// ── Progress ─────────────────────────────────────────────────

/// "Area/System=amount@pct", e.g. "Area 1/Piping=40000@40".
fn parse_line_spec(spec: &str) -> Result<(GroupKey, Decimal, Decimal)> {
    let re = Regex::new(r"^(.+?)/(.+?)=([\d.,$]+)@([\d.]+)$")
        .context("Internal pattern error")?;
    let caps = re
        .captures(spec)
        .with_context(|| format!("Bad progress line '{spec}' (want Area/System=amount@pct)"))?;
    let area = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let system = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let amount = parse_decimal(&caps.get(3).map(|m| m.as_str()).unwrap_or("").replace(['$', ','], ""))?;
    let percent = parse_decimal(caps.get(4).map(|m| m.as_str()).unwrap_or(""))?;
    Ok((GroupKey::new(area, system), amount, percent))
}

fn cmd_progress(args: &[String], db: &mut Database) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("add") => {
            let job = lookup_job(db, args.get(1).map(String::as_str).unwrap_or(""))?;
            let date = require_flag(args, "--date")?;
            let lines: Vec<(GroupKey, Decimal, Decimal)> = flag_values(args, "--line")
                .into_iter()
                .map(parse_line_spec)
                .collect::<Result<_>>()?;
            if lines.is_empty() {
                bail!("At least one --line 'Area/System=amount@pct' is required");
            }
            let id = progress::create_report(db, &job, date, lines)?;
            println!("Created draft progress report id={id} dated {date}");
            Ok(())
        }
        Some("list") => {
            let job = lookup_job(db, args.get(1).map(String::as_str).unwrap_or(""))?;
            let reports = db.get_progress_reports(job.id.unwrap_or_default())?;
            println!("{:<6} {:<12} {:<10} {:<16}", "ID", "DATE", "STATUS", "APPROVED BY");
            for report in reports {
                println!(
                    "{:<6} {:<12} {:<10} {:<16}",
                    report.id.unwrap_or_default(),
                    report.report_date,
                    report.status,
                    report.approved_by
                );
            }
            Ok(())
        }
        Some("submit") => {
            let report_id = parse_report_id(args.get(2))?;
            lookup_job(db, args.get(1).map(String::as_str).unwrap_or(""))?;
            progress::submit_report(db, report_id)?;
            println!("Progress report {report_id} submitted");
            Ok(())
        }
        Some("approve") => {
            let job = lookup_job(db, args.get(1).map(String::as_str).unwrap_or(""))?;
            let report_id = parse_report_id(args.get(2))?;
            progress::approve_report(db, &job, report_id, &actor(args))?;
            println!("Progress report {report_id} approved");
            Ok(())
        }
        _ => bail!("Usage: jobcost progress add|list|submit|approve <job> ..."),
    }
}

fn parse_report_id(arg: Option<&String>) -> Result<i64> {
    arg.context("Missing report id")?
        .parse()
        .context("Report id must be a number")
}

// ── Reports ──────────────────────────────────────────────────

fn cmd_ctc(args: &[String], db: &Database) -> Result<()> {
    let (job_ref, period) = match (args.first(), args.get(1)) {
        (Some(j), Some(p)) => (j.as_str(), p.as_str()),
        _ => bail!("Usage: jobcost ctc <job> <period>"),
    };
    let job = lookup_job(db, job_ref)?;
    let report = forecast::cost_to_complete(db, &job, period)?;

    println!(
        "Cost to complete — job {} period {} (month {}, data through {})",
        job.number, report.period, report.month_number, report.cutoff
    );
    println!();
    println!(
        "{:<28} {:>13} {:>13} {:>13} {:>7} {:>14} {:<11}",
        "GROUP", "BUDGET VALUE", "COST TO DATE", "EARNED", "CPI", "FORECAST", "STATUS"
    );
    for line in &report.lines {
        let m = &line.metrics;
        println!(
            "{:<28} {:>13} {:>13} {:>13} {:>7} {:>14} {:<11}",
            line.group.to_string(),
            format_amount(m.bac),
            format_amount(m.actual_cost),
            format_amount(m.earned_value),
            m.cpi.round_dp(2),
            format_amount(m.forecast_final_cost),
            m.health
        );
    }
    println!();
    let s = &report.summary;
    println!(
        "Project: {} complete, EV {}, AC {}, CPI {}, SPI {}",
        s.percent_complete.round_dp(1),
        format_amount(s.earned_value),
        format_amount(s.actual_cost),
        s.cpi.round_dp(2),
        s.spi.round_dp(2)
    );
    println!(
        "Forecast final cost {} against budget {} (fee {}), EAC {}, VAC {}",
        format_amount(s.forecast_final_cost),
        format_amount(s.bac),
        format_amount(s.fee),
        format_amount(s.eac),
        format_amount(s.vac)
    );
    println!(
        "This period: earned {}, cost {}",
        format_amount(report.earned_this_period),
        format_amount(report.cost_this_period)
    );
    Ok(())
}

fn cmd_forecasts(args: &[String], db: &Database) -> Result<()> {
    let job = lookup_job(db, args.first().map(String::as_str).unwrap_or(""))?;
    let entries = forecast::list_or_generate(db, &job)?;
    if entries.is_empty() {
        println!("No forecastable periods: approve a progress report first.");
        return Ok(());
    }
    println!(
        "{:<9} {:>6} {:<12} {:>14} {:>14} {:>7} {:>15}",
        "PERIOD", "MONTH", "STATUS", "COST TO DATE", "EARNED", "CPI", "FORECAST"
    );
    for (f, _lines) in entries {
        let s = &f.summary;
        println!(
            "{:<9} {:>6} {:<12} {:>14} {:>14} {:>7} {:>15}",
            f.period,
            f.month_number,
            f.status.to_string(),
            format_amount(s.cost_to_date),
            format_amount(s.earned_to_date),
            s.cpi.round_dp(2),
            format_amount(s.forecast_final_cost)
        );
    }
    Ok(())
}

fn cmd_forecast(args: &[String], db: &mut Database) -> Result<()> {
    let (action, job_ref, period) = match (args.first(), args.get(1), args.get(2)) {
        (Some(a), Some(j), Some(p)) => (a.as_str(), j.as_str(), p.as_str()),
        _ => bail!("Usage: jobcost forecast save|submit|approve|archive <job> <period>"),
    };
    let job = lookup_job(db, job_ref)?;
    match action {
        "save" => {
            let saved = forecast::save_forecast(db, &job, period, None)?;
            println!(
                "Saved forecast for {} ({}): final cost {}",
                saved.period,
                saved.status,
                format_amount(saved.summary.forecast_final_cost)
            );
        }
        "submit" => {
            let f = forecast::submit_forecast(db, &job, period, &actor(args))?;
            println!("Forecast {} submitted by {}", f.period, f.submitted_by);
        }
        "approve" => {
            let f = forecast::approve_forecast(db, &job, period, &actor(args))?;
            println!("Forecast {} approved by {}", f.period, f.approved_by);
        }
        "archive" => {
            forecast::archive_forecast(db, &job, period)?;
            println!("Forecast {period} archived");
        }
        other => bail!("Unknown forecast action: {other}"),
    }
    Ok(())
}

fn cmd_evb(args: &[String], db: &Database) -> Result<()> {
    let job = lookup_job(db, args.first().map(String::as_str).unwrap_or(""))?;
    let as_of = flag_value(args, "--as-of");
    let group_by = match flag_value(args, "--group-by") {
        Some(s) => GroupBy::parse(s).with_context(|| format!("Unknown grouping: '{s}'"))?,
        None => GroupBy::Area,
    };
    let report = forecast::earned_vs_burned(db, &job, as_of, group_by)?;

    println!(
        "Earned vs burned — job {} (progress as of {}{})",
        job.number,
        report.report_date,
        report
            .as_of
            .as_deref()
            .map(|d| format!(", cost through {d}"))
            .unwrap_or_default()
    );
    println!();
    println!(
        "{:<24} {:>14} {:>14} {:>14} {:>7} {:>7}",
        "GROUP", "BUDGET VALUE", "EARNED", "BURNED", "CPI", "SPI"
    );
    for bucket in &report.buckets {
        let m = &bucket.metrics;
        println!(
            "{:<24} {:>14} {:>14} {:>14} {:>7} {:>7}",
            bucket.label,
            format_amount(m.bac),
            format_amount(m.earned_value),
            format_amount(m.actual_cost),
            m.cpi.round_dp(2),
            m.spi.round_dp(2)
        );
    }
    let s = &report.summary;
    println!();
    println!(
        "Project: earned {} against {} burned (CPI {})",
        format_amount(s.earned_value),
        format_amount(s.actual_cost),
        s.cpi.round_dp(2)
    );
    Ok(())
}

fn cmd_summary(args: &[String], db: &Database) -> Result<()> {
    let job = lookup_job(db, args.first().map(String::as_str).unwrap_or(""))?;
    let periods = progress::valid_periods(db, &job)?;
    let Some(latest) = periods.last() else {
        println!(
            "Job {} — {} ({} to {}): no approved progress yet",
            job.number, job.name, job.start_date, job.end_date
        );
        return Ok(());
    };
    let report = forecast::compute_period(db, &job, &latest.period)?;
    let s = &report.summary;
    println!("Job {} — {}", job.number, job.name);
    println!(
        "Through {}: {} complete, earned {} / burned {} (CPI {})",
        report.cutoff,
        s.percent_complete.round_dp(1),
        format_amount(s.earned_value),
        format_amount(s.actual_cost),
        s.cpi.round_dp(2)
    );
    println!(
        "Forecast final cost {} vs budget {} — {}",
        format_amount(s.forecast_final_cost),
        format_amount(s.bac),
        s.health
    );
    Ok(())
}
