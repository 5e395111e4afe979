use std::collections::BTreeMap;

use regex::Regex;
use rust_decimal::Decimal;
use tracing::warn;

use crate::db::Database;
use crate::error::EngineError;
use crate::grouping::{GroupIndex, GroupKey};
use crate::models::{month_of, Job, ProgressLine, ProgressReport, ProgressStatus};

/// One forecastable period: a calendar month backed by an approved report.
#[derive(Debug, Clone)]
pub(crate) struct PeriodRef {
    /// Format: "YYYY-MM"
    pub period: String,
    /// 1-based month count from the job's start month.
    pub month_number: i64,
    pub report_id: i64,
    pub report_date: String,
}

/// Everything the cost window and delta computation need for one period.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedPeriod {
    pub report: ProgressReport,
    pub lines: Vec<ProgressLine>,
    /// The report date. Cost records dated on or before it count; dates
    /// are day-granular, so "on or before" is the end-of-day cutoff.
    pub cutoff: String,
    pub previous_cutoff: Option<String>,
    /// Approved CTD per group from the immediately preceding approved
    /// report; empty when none exists.
    pub previous: BTreeMap<GroupKey, Decimal>,
}

fn month_parts(label: &str) -> Option<(i32, u32)> {
    let re = Regex::new(r"^(\d{4})-(\d{2})$").ok()?;
    let caps = re.captures(label)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    if (1..=12).contains(&month) {
        Some((year, month))
    } else {
        None
    }
}

/// Accepts "YYYY-MM" or a bare month number (1-based from the job start)
/// and yields the canonical period label.
pub(crate) fn parse_period(job: &Job, input: &str) -> Result<String, EngineError> {
    if let Ok(n) = input.parse::<i64>() {
        if n < 1 {
            return Err(EngineError::InvalidPeriod {
                period: input.to_string(),
                reason: "month numbers start at 1".to_string(),
            });
        }
        let (start_year, start_month) =
            month_parts(month_of(&job.start_date)).ok_or_else(|| EngineError::InvalidPeriod {
                period: input.to_string(),
                reason: format!("job start date '{}' is not a valid date", job.start_date),
            })?;
        let total = start_year as i64 * 12 + (start_month as i64 - 1) + (n - 1);
        return Ok(format!("{:04}-{:02}", total / 12, total % 12 + 1));
    }
    if month_parts(input).is_some() {
        return Ok(input.to_string());
    }
    Err(EngineError::InvalidPeriod {
        period: input.to_string(),
        reason: "expected YYYY-MM or a month number".to_string(),
    })
}

/// 1-based month count of a period from the job's start month; 0 when
/// either date fails to parse.
pub(crate) fn month_number(job: &Job, period: &str) -> i64 {
    match (month_parts(month_of(&job.start_date)), month_parts(period)) {
        (Some((sy, sm)), Some((py, pm))) => {
            (py as i64 * 12 + pm as i64) - (sy as i64 * 12 + sm as i64) + 1
        }
        _ => 0,
    }
}

fn job_id(job: &Job) -> Result<i64, EngineError> {
    job.id
        .ok_or_else(|| EngineError::JobNotFound(job.number.clone()))
}

/// Locate the approved report backing a period and build the
/// previous-approved-CTD map for delta computation.
pub(crate) fn resolve_period(
    db: &Database,
    job: &Job,
    period: &str,
) -> Result<ResolvedPeriod, EngineError> {
    let job_id = job_id(job)?;
    if !job.contains_month(period) {
        return Err(EngineError::InvalidPeriod {
            period: period.to_string(),
            reason: format!(
                "outside the job's duration ({} to {})",
                job.start_month(),
                job.end_month()
            ),
        });
    }

    let report = db
        .approved_report_in_month(job_id, period)?
        .ok_or_else(|| EngineError::InvalidPeriod {
            period: period.to_string(),
            reason: "no approved progress report in this month".to_string(),
        })?;
    let report_id = report.id.unwrap_or_default();
    let lines = db.get_progress_lines(report_id)?;

    let mut previous = BTreeMap::new();
    let mut previous_cutoff = None;
    if let Some(prev) = db.previous_approved_report(job_id, &report.report_date)? {
        for line in db.get_progress_lines(prev.id.unwrap_or_default())? {
            previous.insert(
                GroupKey::new(&line.area, &line.system),
                line.approved_ctd_amount,
            );
        }
        previous_cutoff = Some(prev.report_date);
    }

    Ok(ResolvedPeriod {
        cutoff: report.report_date.clone(),
        report,
        lines,
        previous_cutoff,
        previous,
    })
}

/// Every forecastable period for a job, in date order. Only months that
/// actually have an approved report materialize; gaps are skipped, never
/// interpolated. Within a month the latest approved report wins.
pub(crate) fn valid_periods(db: &Database, job: &Job) -> Result<Vec<PeriodRef>, EngineError> {
    let job_id = job_id(job)?;
    let mut by_month: BTreeMap<String, ProgressReport> = BTreeMap::new();
    for report in db.get_progress_reports(job_id)? {
        if report.status != ProgressStatus::Approved {
            continue;
        }
        let month = month_of(&report.report_date).to_string();
        if !job.contains_month(&month) {
            continue;
        }
        // Reports arrive date-ordered, so a later one replaces an earlier
        // one in the same month.
        by_month.insert(month, report);
    }
    Ok(by_month
        .into_iter()
        .map(|(period, report)| PeriodRef {
            month_number: month_number(job, &period),
            report_id: report.id.unwrap_or_default(),
            report_date: report.report_date,
            period,
        })
        .collect())
}

/// Create a draft report, copying each group's approved CTD forward from
/// the immediately preceding approved report.
pub(crate) fn create_report(
    db: &mut Database,
    job: &Job,
    report_date: &str,
    lines: Vec<(GroupKey, Decimal, Decimal)>,
) -> Result<i64, EngineError> {
    let job_id = job_id(job)?;

    let mut previous: BTreeMap<GroupKey, Decimal> = BTreeMap::new();
    if let Some(prev) = db.previous_approved_report(job_id, report_date)? {
        for line in db.get_progress_lines(prev.id.unwrap_or_default())? {
            previous.insert(
                GroupKey::new(&line.area, &line.system),
                line.approved_ctd_amount,
            );
        }
    }

    let report = ProgressReport::new(job_id, report_date.to_string());
    let rows: Vec<ProgressLine> = lines
        .into_iter()
        .map(|(key, amount, percent)| {
            let prev_amount = previous.get(&key).copied().unwrap_or_default();
            ProgressLine {
                id: None,
                report_id: 0,
                area: key.area,
                system: key.system,
                submitted_ctd_amount: amount,
                submitted_ctd_percent: percent,
                approved_ctd_amount: amount,
                approved_ctd_percent: percent,
                previous_ctd_amount: prev_amount,
            }
        })
        .collect();

    Ok(db.insert_progress_report(&report, &rows)?)
}

pub(crate) fn submit_report(db: &Database, report_id: i64) -> Result<(), EngineError> {
    let report = db
        .get_progress_report(report_id)?
        .ok_or(EngineError::ReportNotFound(report_id))?;
    if report.status != ProgressStatus::Draft {
        return Err(EngineError::InvalidTransition {
            from: report.status.to_string(),
            to: ProgressStatus::Submitted.to_string(),
        });
    }
    db.update_progress_status(report_id, ProgressStatus::Submitted, "", "")?;
    Ok(())
}

/// Approve a report, validating each line's approved CTD amount against
/// its group's budget value first.
pub(crate) fn approve_report(
    db: &Database,
    job: &Job,
    report_id: i64,
    actor: &str,
) -> Result<(), EngineError> {
    let job_id = job_id(job)?;
    let report = db
        .get_progress_report(report_id)?
        .filter(|r| r.job_id == job_id)
        .ok_or(EngineError::ReportNotFound(report_id))?;
    if !report.status.can_approve() {
        return Err(EngineError::InvalidTransition {
            from: report.status.to_string(),
            to: ProgressStatus::Approved.to_string(),
        });
    }

    let index = GroupIndex::build(&db.get_budget_lines(job_id)?);
    for line in db.get_progress_lines(report_id)? {
        let key = GroupKey::new(&line.area, &line.system);
        match index.get(&key) {
            Some(info) => {
                if line.approved_ctd_amount > info.total_budget_value {
                    return Err(EngineError::ProgressExceedsBudget {
                        group: key.to_string(),
                        amount: line.approved_ctd_amount,
                        budget: info.total_budget_value,
                    });
                }
            }
            None => {
                // No budget assigned to this group; downstream math treats
                // it as zero-BAC rather than rejecting the report.
                warn!(group = %key, "progress line has no matching budget group");
            }
        }
    }

    db.update_progress_status(
        report_id,
        ProgressStatus::Approved,
        actor,
        &chrono::Utc::now().to_rfc3339(),
    )?;
    Ok(())
}
