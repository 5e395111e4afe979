use rust_decimal::Decimal;

use crate::grouping::GroupKey;
use crate::models::BudgetHealth;

/// Floor multiplier on actual cost: a forecast can never land closer than
/// 5% above what has already been spent.
fn forecast_floor() -> Decimal {
    Decimal::new(105, 2)
}

/// Ceiling multiplier on budget: extrapolation stops at 2x budget so a
/// near-zero CPI cannot produce a runaway number.
fn troubled_ceiling() -> Decimal {
    Decimal::TWO
}

/// Cost variance beyond 10% of budget classifies a group as over budget.
fn over_budget_threshold() -> Decimal {
    Decimal::new(10, 2)
}

/// n/d with a zero denominator yielding 0: "no data", never a panic.
fn ratio(n: Decimal, d: Decimal) -> Decimal {
    n.checked_div(d).unwrap_or(Decimal::ZERO)
}

/// The full earned-value metric set, granularity-agnostic: the same shape
/// serves a single (area, system) group and the whole-project rollup.
#[derive(Debug, Clone, Default)]
pub(crate) struct Metrics {
    pub budget_cost: Decimal,
    /// Budget at Completion: the group's total budget value.
    pub bac: Decimal,
    pub percent_complete: Decimal,
    pub earned_value: Decimal,
    pub actual_cost: Decimal,
    pub planned_value: Decimal,
    pub cost_variance: Decimal,
    pub schedule_variance: Decimal,
    pub cpi: Decimal,
    pub spi: Decimal,
    pub eac: Decimal,
    pub etc: Decimal,
    pub vac: Decimal,
    pub tcpi: Decimal,
    pub forecast_final_cost: Decimal,
    pub forecast_final_value: Decimal,
    pub fee: Decimal,
    pub health: BudgetHealth,
}

/// Metrics for one (area, system) group plus its cost-stream detail.
#[derive(Debug, Clone)]
pub(crate) struct LineMetrics {
    pub group: GroupKey,
    pub labor_cost: Decimal,
    pub invoice_cost: Decimal,
    pub total_hours: Decimal,
    pub metrics: Metrics,
}

/// Clamped CPI extrapolation to final cost.
///
/// No progress or no spend means no information: assume on-budget. An
/// already-over-budget group switches to overrun extrapolation. The result
/// is floored at 1.05x actual cost and capped at 2x budget, in that order,
/// with the overrun override applied between the two.
pub(crate) fn forecast_final_cost(
    bac: Decimal,
    ac: Decimal,
    percent_complete: Decimal,
    cpi: Decimal,
) -> Decimal {
    if percent_complete <= Decimal::ZERO || ac.is_zero() {
        return bac;
    }
    if bac <= Decimal::ZERO {
        // Unbudgeted work: the spend is the only signal there is.
        return ac;
    }

    let remaining = bac - bac * percent_complete / Decimal::ONE_HUNDRED;
    let base = if cpi > Decimal::ZERO {
        ac + remaining / cpi
    } else {
        // Earned nothing against real spend; the ceiling below holds.
        bac * troubled_ceiling()
    };

    let mut forecast = base.max(ac * forecast_floor());

    if ac > bac {
        let overrun_fraction = ac / bac - Decimal::ONE;
        forecast = ac + remaining * (Decimal::ONE + overrun_fraction);
    }

    forecast.min(bac * troubled_ceiling())
}

fn classify(cost_variance: Decimal, bac: Decimal) -> BudgetHealth {
    if cost_variance < Decimal::ZERO {
        if cost_variance.abs() > bac * over_budget_threshold() {
            BudgetHealth::OverBudget
        } else {
            BudgetHealth::AtRisk
        }
    } else {
        BudgetHealth::OnBudget
    }
}

/// Core formula set shared by line-level and rollup computation.
fn compute(
    budget_cost: Decimal,
    bac: Decimal,
    earned_value: Decimal,
    actual_cost: Decimal,
    planned_value: Decimal,
    percent_complete: Decimal,
) -> Metrics {
    let cost_variance = earned_value - actual_cost;
    let schedule_variance = earned_value - planned_value;
    let cpi = ratio(earned_value, actual_cost);
    let spi = ratio(earned_value, planned_value);
    let eac = if cpi > Decimal::ZERO { bac / cpi } else { bac };
    let etc = eac - actual_cost;
    let vac = bac - eac;
    let tcpi = ratio(bac - earned_value, bac - actual_cost);
    let forecast = forecast_final_cost(bac, actual_cost, percent_complete, cpi);
    // The contracted value does not move with cost; fee absorbs the hit and
    // may go negative.
    let forecast_final_value = bac;
    let fee = forecast_final_value - forecast;

    Metrics {
        budget_cost,
        bac,
        percent_complete,
        earned_value,
        actual_cost,
        planned_value,
        cost_variance,
        schedule_variance,
        cpi,
        spi,
        eac,
        etc,
        vac,
        tcpi,
        forecast_final_cost: forecast,
        forecast_final_value,
        fee,
        health: classify(cost_variance, bac),
    }
}

/// Per-group metrics. EV is the approved CTD amount when present, falling
/// back to percent of budget value.
pub(crate) fn compute_group(
    budget_cost: Decimal,
    bac: Decimal,
    ctd_amount: Option<Decimal>,
    ctd_percent: Decimal,
    actual_cost: Decimal,
) -> Metrics {
    let planned_value = bac * ctd_percent / Decimal::ONE_HUNDRED;
    let earned_value = ctd_amount.unwrap_or(planned_value);
    compute(
        budget_cost,
        bac,
        earned_value,
        actual_cost,
        planned_value,
        ctd_percent,
    )
}

/// Project rollup: sum BAC/EV/AC/PV across groups and recompute every
/// formula at the aggregate, never averaging per-group ratios.
///
/// `cost_floor` carries the aggregator's flat-total safeguard: project
/// actual cost is raised to it when attribution lost records.
pub(crate) fn roll_up(lines: &[LineMetrics], cost_floor: Option<Decimal>) -> Metrics {
    let mut budget_cost = Decimal::ZERO;
    let mut bac = Decimal::ZERO;
    let mut earned_value = Decimal::ZERO;
    let mut actual_cost = Decimal::ZERO;
    let mut planned_value = Decimal::ZERO;
    for line in lines {
        budget_cost += line.metrics.budget_cost;
        bac += line.metrics.bac;
        earned_value += line.metrics.earned_value;
        actual_cost += line.metrics.actual_cost;
        planned_value += line.metrics.planned_value;
    }
    if let Some(floor) = cost_floor {
        actual_cost = actual_cost.max(floor);
    }
    let percent_complete = ratio(planned_value, bac) * Decimal::ONE_HUNDRED;
    compute(
        budget_cost,
        bac,
        earned_value,
        actual_cost,
        planned_value,
        percent_complete,
    )
}

#[cfg(test)]
mod tests;
