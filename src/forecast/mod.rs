use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::costing::{CostAggregate, GroupCost};
use crate::db::Database;
use crate::error::EngineError;
use crate::evm::{self, LineMetrics, Metrics};
use crate::grouping::{GroupIndex, GroupKey};
use crate::models::{
    Forecast, ForecastLine, ForecastStatus, ForecastSummary, Job, ProgressLine,
};
use crate::progress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupBy {
    Area,
    System,
    Flat,
}

impl GroupBy {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "area" => Some(Self::Area),
            "system" => Some(Self::System),
            "flat" | "total" => Some(Self::Flat),
            _ => None,
        }
    }
}

/// The full pipeline output for one (job, period): aggregation →
/// reconciliation → EVM, nothing persisted.
#[derive(Debug, Clone)]
pub(crate) struct PeriodComputation {
    pub period: String,
    pub month_number: i64,
    pub report_id: i64,
    pub cutoff: String,
    pub lines: Vec<LineMetrics>,
    pub summary: Metrics,
    pub earned_this_period: Decimal,
    pub cost_this_period: Decimal,
}

/// Earned-vs-burned rollup at a chosen grouping.
#[derive(Debug, Clone)]
pub(crate) struct EvbBucket {
    pub label: String,
    pub metrics: Metrics,
}

#[derive(Debug, Clone)]
pub(crate) struct EvbReport {
    pub report_id: i64,
    pub report_date: String,
    pub as_of: Option<String>,
    pub buckets: Vec<EvbBucket>,
    pub summary: Metrics,
}

/// Caller-supplied forecast payload: a human override of the extrapolated
/// line detail and final-cost figures.
#[derive(Debug, Clone)]
pub(crate) struct ForecastInput {
    pub line_items: Vec<ForecastLine>,
    pub summary: ForecastSummary,
}

fn job_id(job: &Job) -> Result<i64, EngineError> {
    job.id
        .ok_or_else(|| EngineError::JobNotFound(job.number.clone()))
}

/// Per-group metrics over the budget index: one line per budget group plus
/// zero-BAC lines for progress groups with no budget assigned.
fn group_metrics(
    index: &GroupIndex,
    group_costs: &BTreeMap<GroupKey, GroupCost>,
    progress_lines: &[ProgressLine],
) -> Vec<LineMetrics> {
    let by_group: BTreeMap<GroupKey, &ProgressLine> = progress_lines
        .iter()
        .map(|l| (GroupKey::new(&l.area, &l.system), l))
        .collect();

    let mut lines = Vec::new();
    for (key, info) in index.iter() {
        let cost = group_costs.get(key).cloned().unwrap_or_default();
        let (amount, percent) = match by_group.get(key) {
            Some(l) => (Some(l.approved_ctd_amount), l.approved_ctd_percent),
            None => (None, Decimal::ZERO),
        };
        lines.push(LineMetrics {
            group: key.clone(),
            labor_cost: cost.labor_cost,
            invoice_cost: cost.invoice_cost,
            total_hours: cost.total_hours,
            metrics: evm::compute_group(
                info.total_budget_cost,
                info.total_budget_value,
                amount,
                percent,
                cost.total_cost(),
            ),
        });
    }
    for line in progress_lines {
        let key = GroupKey::new(&line.area, &line.system);
        if index.contains_group(&key) {
            continue;
        }
        lines.push(LineMetrics {
            group: key,
            labor_cost: Decimal::ZERO,
            invoice_cost: Decimal::ZERO,
            total_hours: Decimal::ZERO,
            metrics: evm::compute_group(
                Decimal::ZERO,
                Decimal::ZERO,
                Some(line.approved_ctd_amount),
                line.approved_ctd_percent,
                Decimal::ZERO,
            ),
        });
    }
    lines
}

/// Run the whole pipeline for one period. Any storage failure aborts the
/// computation; a partial forecast is never returned as if complete.
pub(crate) fn compute_period(
    db: &Database,
    job: &Job,
    period: &str,
) -> Result<PeriodComputation, EngineError> {
    let id = job_id(job)?;
    let resolved = progress::resolve_period(db, job, period)?;

    let budget = db.get_budget_lines(id)?;
    let index = GroupIndex::build(&budget);
    let labor = db.get_approved_labor(id, &resolved.cutoff)?;
    let allocations = db.get_allocations_before(id, &resolved.cutoff)?;
    let agg = CostAggregate::build(&index, &labor, &allocations);
    let group_costs = agg.group_costs(&index);

    let lines = group_metrics(&index, &group_costs, &resolved.lines);
    let summary = evm::roll_up(&lines, Some(agg.project_cost_to_date()));

    let earned_this_period = resolved
        .lines
        .iter()
        .map(|l| {
            let key = GroupKey::new(&l.area, &l.system);
            let previous = resolved.previous.get(&key).copied().unwrap_or_default();
            (l.approved_ctd_amount - previous).max(Decimal::ZERO)
        })
        .sum();

    let cost_this_period = match &resolved.previous_cutoff {
        Some(prev_cutoff) => {
            let prev_labor = db.get_approved_labor(id, prev_cutoff)?;
            let prev_allocations = db.get_allocations_before(id, prev_cutoff)?;
            let prev_agg = CostAggregate::build(&index, &prev_labor, &prev_allocations);
            (summary.actual_cost - prev_agg.project_cost_to_date()).max(Decimal::ZERO)
        }
        None => summary.actual_cost,
    };

    Ok(PeriodComputation {
        period: period.to_string(),
        month_number: progress::month_number(job, period),
        report_id: resolved.report.id.unwrap_or_default(),
        cutoff: resolved.cutoff,
        lines,
        summary,
        earned_this_period,
        cost_this_period,
    })
}

/// Fresh cost-to-complete computation, no persistence. Accepts a "YYYY-MM"
/// label or a bare month number.
pub(crate) fn cost_to_complete(
    db: &Database,
    job: &Job,
    period_input: &str,
) -> Result<PeriodComputation, EngineError> {
    let period = progress::parse_period(job, period_input)?;
    compute_period(db, job, &period)
}

/// Re-derive the volatile summary fields from live data. The stored values
/// are a cache: cost-to-date, earned-to-date and CPI always come from the
/// current cost records and the linked progress report, never from the
/// caller.
pub(crate) fn derive_volatile_fields(
    summary: &ForecastSummary,
    comp: &PeriodComputation,
) -> ForecastSummary {
    let mut out = summary.clone();
    out.cost_to_date = comp.summary.actual_cost;
    out.earned_to_date = comp.summary.earned_value;
    out.cpi = comp.summary.cpi;
    out
}

fn summary_from_metrics(m: &Metrics) -> ForecastSummary {
    ForecastSummary {
        budget_cost: m.budget_cost,
        budget_value: m.bac,
        cost_to_date: m.actual_cost,
        earned_to_date: m.earned_value,
        planned_value: m.planned_value,
        percent_complete: m.percent_complete,
        cost_variance: m.cost_variance,
        schedule_variance: m.schedule_variance,
        cpi: m.cpi,
        spi: m.spi,
        eac: m.eac,
        etc: m.etc,
        vac: m.vac,
        tcpi: m.tcpi,
        forecast_final_cost: m.forecast_final_cost,
        forecast_final_value: m.forecast_final_value,
        fee: m.fee,
        health: m.health.to_string(),
    }
}

fn lines_from_metrics(lines: &[LineMetrics]) -> Vec<ForecastLine> {
    lines
        .iter()
        .map(|l| ForecastLine {
            id: None,
            forecast_id: 0,
            area: l.group.area.clone(),
            system: l.group.system.clone(),
            budget_cost: l.metrics.budget_cost,
            budget_value: l.metrics.bac,
            cost_to_date: l.metrics.actual_cost,
            earned_to_date: l.metrics.earned_value,
            forecast_final_cost: l.metrics.forecast_final_cost,
            forecast_final_value: l.metrics.forecast_final_value,
        })
        .collect()
}

fn synthesize(job_id: i64, comp: &PeriodComputation) -> (Forecast, Vec<ForecastLine>) {
    let mut forecast = Forecast::new(job_id, comp.period.clone(), comp.month_number);
    forecast.status = ForecastStatus::NotCreated;
    forecast.progress_report_id = Some(comp.report_id);
    forecast.summary = summary_from_metrics(&comp.summary);
    (forecast, lines_from_metrics(&comp.lines))
}

/// Create or update the forecast for a period.
///
/// Caller-supplied line items and forecast-final figures are stored as
/// given; cost-to-date, earned-to-date and CPI are re-derived from live
/// data before every write. With no supplied payload the engine's own
/// extrapolation is persisted.
pub(crate) fn save_forecast(
    db: &mut Database,
    job: &Job,
    period_input: &str,
    supplied: Option<ForecastInput>,
) -> Result<Forecast, EngineError> {
    let id = job_id(job)?;
    let period = progress::parse_period(job, period_input)?;
    let comp = compute_period(db, job, &period)?;

    // One active forecast per progress report: a report already consumed by
    // a different forecast is a conflict, not an overwrite.
    if let Some(existing) = db.get_forecast_by_report(comp.report_id)? {
        if existing.job_id != id || existing.period != period {
            return Err(EngineError::ReportInUse {
                report_id: comp.report_id,
                forecast_id: existing.id.unwrap_or_default(),
                period: existing.period,
            });
        }
    }

    let now = chrono::Utc::now().to_rfc3339();
    let (mut forecast, lines) = match db.get_forecast(id, &period)? {
        Some(mut existing) => {
            let lines = match &supplied {
                Some(input) => {
                    existing.summary = input.summary.clone();
                    input.line_items.clone()
                }
                None => {
                    existing.summary = summary_from_metrics(&comp.summary);
                    lines_from_metrics(&comp.lines)
                }
            };
            existing.month_number = comp.month_number;
            existing.progress_report_id = Some(comp.report_id);
            existing.updated_at = now;
            (existing, lines)
        }
        None => {
            let mut forecast = Forecast::new(id, period.clone(), comp.month_number);
            forecast.progress_report_id = Some(comp.report_id);
            let lines = match &supplied {
                Some(input) => {
                    forecast.summary = input.summary.clone();
                    input.line_items.clone()
                }
                None => {
                    forecast.summary = summary_from_metrics(&comp.summary);
                    lines_from_metrics(&comp.lines)
                }
            };
            (forecast, lines)
        }
    };

    forecast.summary = derive_volatile_fields(&forecast.summary, &comp);
    db.save_forecast(&mut forecast, &lines)?;
    Ok(forecast)
}

/// One entry per valid period: the persisted forecast where one exists,
/// otherwise a freshly computed stand-in tagged `not_created`, never
/// persisted, so the timeline reads complete before anyone has saved.
pub(crate) fn list_or_generate(
    db: &Database,
    job: &Job,
) -> Result<Vec<(Forecast, Vec<ForecastLine>)>, EngineError> {
    let id = job_id(job)?;
    let mut out = Vec::new();
    for period_ref in progress::valid_periods(db, job)? {
        match db.get_forecast(id, &period_ref.period)? {
            Some(forecast) => {
                let lines = db.get_forecast_lines(forecast.id.unwrap_or_default())?;
                out.push((forecast, lines));
            }
            None => {
                let comp = compute_period(db, job, &period_ref.period)?;
                out.push(synthesize(id, &comp));
            }
        }
    }
    Ok(out)
}

fn transition(
    db: &mut Database,
    job: &Job,
    period_input: &str,
    to: ForecastStatus,
    actor: &str,
) -> Result<Forecast, EngineError> {
    let id = job_id(job)?;
    let period = progress::parse_period(job, period_input)?;
    let mut forecast = db
        .get_forecast(id, &period)?
        .ok_or_else(|| EngineError::ForecastNotFound(period.clone()))?;
    if !forecast.status.can_transition_to(to) {
        return Err(EngineError::InvalidTransition {
            from: forecast.status.to_string(),
            to: to.to_string(),
        });
    }

    // The always-on re-derivation: stored volatile fields are refreshed on
    // every write, state changes included.
    let comp = compute_period(db, job, &period)?;
    forecast.summary = derive_volatile_fields(&forecast.summary, &comp);

    let now = chrono::Utc::now().to_rfc3339();
    forecast.status = to;
    forecast.updated_at = now.clone();
    match to {
        ForecastStatus::Submitted => {
            forecast.submitted_by = actor.to_string();
            forecast.submitted_at = now;
        }
        ForecastStatus::Approved => {
            forecast.approved_by = actor.to_string();
            forecast.approved_at = now;
        }
        _ => {}
    }

    let lines = db.get_forecast_lines(forecast.id.unwrap_or_default())?;
    db.save_forecast(&mut forecast, &lines)?;
    Ok(forecast)
}

pub(crate) fn submit_forecast(
    db: &mut Database,
    job: &Job,
    period_input: &str,
    actor: &str,
) -> Result<Forecast, EngineError> {
    transition(db, job, period_input, ForecastStatus::Submitted, actor)
}

pub(crate) fn approve_forecast(
    db: &mut Database,
    job: &Job,
    period_input: &str,
    actor: &str,
) -> Result<Forecast, EngineError> {
    transition(db, job, period_input, ForecastStatus::Approved, actor)
}

pub(crate) fn archive_forecast(
    db: &Database,
    job: &Job,
    period_input: &str,
) -> Result<(), EngineError> {
    let id = job_id(job)?;
    let period = progress::parse_period(job, period_input)?;
    let forecast = db
        .get_forecast(id, &period)?
        .ok_or_else(|| EngineError::ForecastNotFound(period.clone()))?;
    db.archive_forecast(forecast.id.unwrap_or_default())?;
    Ok(())
}

/// Earned-vs-burned rollup. EV always comes from the latest approved
/// progress report regardless of `as_of`; `as_of` bounds actual cost only.
/// That asymmetry is deliberate and load-bearing for the report's meaning.
pub(crate) fn earned_vs_burned(
    db: &Database,
    job: &Job,
    as_of: Option<&str>,
    group_by: GroupBy,
) -> Result<EvbReport, EngineError> {
    let id = job_id(job)?;
    let report = db
        .latest_approved_report(id)?
        .ok_or_else(|| EngineError::NoApprovedProgress(job.number.clone()))?;
    let report_id = report.id.unwrap_or_default();
    let report_lines = db.get_progress_lines(report_id)?;

    let budget = db.get_budget_lines(id)?;
    let index = GroupIndex::build(&budget);
    let cutoff = as_of.unwrap_or("9999-12-31");
    let labor = db.get_approved_labor(id, cutoff)?;
    let allocations = db.get_allocations_before(id, cutoff)?;
    let agg = CostAggregate::build(&index, &labor, &allocations);
    let group_costs = agg.group_costs(&index);

    let lines = group_metrics(&index, &group_costs, &report_lines);
    let summary = evm::roll_up(&lines, Some(agg.project_cost_to_date()));

    let buckets = match group_by {
        GroupBy::Flat => vec![EvbBucket {
            label: "Total".to_string(),
            metrics: summary.clone(),
        }],
        GroupBy::Area | GroupBy::System => {
            let mut grouped: BTreeMap<String, Vec<LineMetrics>> = BTreeMap::new();
            for line in &lines {
                let label = match group_by {
                    GroupBy::Area => line.group.area.clone(),
                    _ => line.group.system.clone(),
                };
                grouped.entry(label).or_default().push(line.clone());
            }
            grouped
                .into_iter()
                .map(|(label, members)| EvbBucket {
                    metrics: evm::roll_up(&members, None),
                    label,
                })
                .collect()
        }
    };

    Ok(EvbReport {
        report_id,
        report_date: report.report_date,
        as_of: as_of.map(str::to_string),
        buckets,
        summary,
    })
}
