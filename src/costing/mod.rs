use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::grouping::{GroupIndex, GroupKey};
use crate::models::{InvoiceAllocation, LaborEntry};

/// Ordered fallback chain for tying a cost record to the budget structure.
/// Earlier strategies win; the winning strategy is recorded for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchStrategy {
    ByDirectReference,
    ByCostCode,
    ByAreaSystemGroup,
}

impl MatchStrategy {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::ByDirectReference => "direct_reference",
            Self::ByCostCode => "cost_code",
            Self::ByAreaSystemGroup => "area_system_group",
        }
    }
}

/// Outcome of running one record through the strategy chain.
#[derive(Debug, Clone)]
enum Attribution {
    /// Tied to a specific budget line.
    Line(i64, MatchStrategy),
    /// Tied to an (area, system) group only; counts at group rollup but has
    /// no line-level home.
    Group(GroupKey, MatchStrategy),
    Miss,
}

fn resolve(
    direct: Option<i64>,
    cost_code: &str,
    area: &str,
    system: &str,
    index: &GroupIndex,
) -> Attribution {
    if let Some(id) = direct {
        if index.contains_line(id) {
            return Attribution::Line(id, MatchStrategy::ByDirectReference);
        }
    }
    if let Some(id) = index.first_line_for_code(cost_code) {
        if index.lines_for_code(cost_code).len() > 1 {
            debug!(
                cost_code,
                line_id = id,
                "cost code shared by multiple budget lines; attributing full amount to first match"
            );
        }
        return Attribution::Line(id, MatchStrategy::ByCostCode);
    }
    if !area.trim().is_empty() && !system.trim().is_empty() {
        let key = GroupKey::new(area, system);
        if index.contains_group(&key) {
            return Attribution::Group(key, MatchStrategy::ByAreaSystemGroup);
        }
    }
    Attribution::Miss
}

/// Cost attributed to one budget line.
#[derive(Debug, Clone, Default)]
pub(crate) struct LineCost {
    pub labor_cost: Decimal,
    pub invoice_cost: Decimal,
    pub total_hours: Decimal,
    pub record_count: u32,
}

impl LineCost {
    pub(crate) fn total_cost(&self) -> Decimal {
        self.labor_cost + self.invoice_cost
    }
}

/// Cost rolled up to one (area, system) group.
#[derive(Debug, Clone, Default)]
pub(crate) struct GroupCost {
    pub labor_cost: Decimal,
    pub invoice_cost: Decimal,
    pub total_hours: Decimal,
    pub record_count: u32,
}

impl GroupCost {
    pub(crate) fn total_cost(&self) -> Decimal {
        self.labor_cost + self.invoice_cost
    }

    fn absorb_line(&mut self, line: &LineCost) {
        self.labor_cost += line.labor_cost;
        self.invoice_cost += line.invoice_cost;
        self.total_hours += line.total_hours;
        self.record_count += line.record_count;
    }
}

/// How many records each strategy placed, and how many none could.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MatchAudit {
    pub direct_reference: u32,
    pub cost_code: u32,
    pub area_system_group: u32,
    pub missed: u32,
}

impl MatchAudit {
    fn record(&mut self, strategy: MatchStrategy) {
        match strategy {
            MatchStrategy::ByDirectReference => self.direct_reference += 1,
            MatchStrategy::ByCostCode => self.cost_code += 1,
            MatchStrategy::ByAreaSystemGroup => self.area_system_group += 1,
        }
    }
}

/// Aggregated cost-to-date for one job at one cutoff.
///
/// Two totals are always carried: the attributed map (line detail, may be
/// incomplete when attribution fails) and a flat sum of every record in the
/// input streams. The project cost-to-date figure is the maximum of the two,
/// so dropped line-level detail can never undercount the top line.
pub(crate) struct CostAggregate {
    by_line: HashMap<i64, LineCost>,
    group_extra: BTreeMap<GroupKey, GroupCost>,
    unattributed: Decimal,
    flat_total: Decimal,
    pub audit: MatchAudit,
}

impl CostAggregate {
    /// The inputs must already be filtered to the cost window: approved
    /// labor with work date on or before the cutoff, and allocations whose
    /// invoice date is on or before the cutoff.
    pub(crate) fn build(
        index: &GroupIndex,
        labor: &[LaborEntry],
        allocations: &[InvoiceAllocation],
    ) -> Self {
        let mut agg = Self {
            by_line: HashMap::new(),
            group_extra: BTreeMap::new(),
            unattributed: Decimal::ZERO,
            flat_total: Decimal::ZERO,
            audit: MatchAudit::default(),
        };

        for entry in labor {
            agg.flat_total += entry.total_cost;
            match resolve(
                entry.budget_line_id,
                &entry.cost_code,
                &entry.area,
                &entry.system,
                index,
            ) {
                Attribution::Line(id, strategy) => {
                    agg.audit.record(strategy);
                    debug!(line_id = id, strategy = strategy.as_str(), "labor entry attributed");
                    let line = agg.by_line.entry(id).or_default();
                    line.labor_cost += entry.total_cost;
                    line.total_hours += entry.hours;
                    line.record_count += 1;
                }
                Attribution::Group(key, strategy) => {
                    agg.audit.record(strategy);
                    debug!(group = %key, strategy = strategy.as_str(), "labor entry attributed");
                    let group = agg.group_extra.entry(key).or_default();
                    group.labor_cost += entry.total_cost;
                    group.total_hours += entry.hours;
                    group.record_count += 1;
                }
                Attribution::Miss => {
                    agg.audit.missed += 1;
                    agg.unattributed += entry.total_cost;
                    warn!(
                        worker = %entry.worker,
                        work_date = %entry.work_date,
                        cost_code = %entry.cost_code,
                        amount = %entry.total_cost,
                        "labor entry matches no budget line; kept in project total only"
                    );
                }
            }
        }

        for alloc in allocations {
            agg.flat_total += alloc.amount;
            match resolve(
                alloc.budget_line_id,
                &alloc.cost_code,
                &alloc.area,
                &alloc.system,
                index,
            ) {
                Attribution::Line(id, strategy) => {
                    agg.audit.record(strategy);
                    debug!(line_id = id, strategy = strategy.as_str(), "allocation attributed");
                    let line = agg.by_line.entry(id).or_default();
                    line.invoice_cost += alloc.amount;
                    line.record_count += 1;
                }
                Attribution::Group(key, strategy) => {
                    agg.audit.record(strategy);
                    debug!(group = %key, strategy = strategy.as_str(), "allocation attributed");
                    let group = agg.group_extra.entry(key).or_default();
                    group.invoice_cost += alloc.amount;
                    group.record_count += 1;
                }
                Attribution::Miss => {
                    agg.audit.missed += 1;
                    agg.unattributed += alloc.amount;
                    warn!(
                        invoice_id = alloc.invoice_id,
                        cost_code = %alloc.cost_code,
                        amount = %alloc.amount,
                        "invoice allocation matches no budget line; kept in project total only"
                    );
                }
            }
        }

        agg
    }

    pub(crate) fn line(&self, line_id: i64) -> Option<&LineCost> {
        self.by_line.get(&line_id)
    }

    /// Sum of everything the strategy chain managed to place.
    pub(crate) fn attributed_total(&self) -> Decimal {
        let lines: Decimal = self.by_line.values().map(LineCost::total_cost).sum();
        let groups: Decimal = self.group_extra.values().map(GroupCost::total_cost).sum();
        lines + groups
    }

    /// Cost that fell out of line-level detail entirely.
    pub(crate) fn unattributed(&self) -> Decimal {
        self.unattributed
    }

    /// Flat sum of every input record, attribution-independent.
    pub(crate) fn flat_total(&self) -> Decimal {
        self.flat_total
    }

    /// The top-line cost-to-date: max(attributed, flat). Line detail may be
    /// incomplete, but this figure never undercounts.
    pub(crate) fn project_cost_to_date(&self) -> Decimal {
        self.attributed_total().max(self.flat_total)
    }

    /// Roll the line-level map up to (area, system) granularity and fold in
    /// the group-only attributions.
    pub(crate) fn group_costs(&self, index: &GroupIndex) -> BTreeMap<GroupKey, GroupCost> {
        let mut out: BTreeMap<GroupKey, GroupCost> = BTreeMap::new();
        for (line_id, cost) in &self.by_line {
            if let Some(key) = index.group_of_line(*line_id) {
                out.entry(key.clone()).or_default().absorb_line(cost);
            }
        }
        for (key, extra) in &self.group_extra {
            let group = out.entry(key.clone()).or_default();
            group.labor_cost += extra.labor_cost;
            group.invoice_cost += extra.invoice_cost;
            group.total_hours += extra.total_hours;
            group.record_count += extra.record_count;
        }
        out
    }
}
