use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use crate::models::BudgetLine;

/// The (area, system) granularity progress reports are written at.
///
/// Ordering is lexical on area then system so grouped output is stable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct GroupKey {
    pub area: String,
    pub system: String,
}

impl GroupKey {
    pub(crate) fn new(area: &str, system: &str) -> Self {
        Self {
            area: area.trim().to_string(),
            system: system.trim().to_string(),
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.area, self.system)
    }
}

/// Budget totals and membership for one (area, system) group.
#[derive(Debug, Clone, Default)]
pub(crate) struct GroupInfo {
    pub total_budget_cost: Decimal,
    pub total_budget_value: Decimal,
    /// Contributing budget lines, in insertion order. Needed because
    /// cost-code fallback matching enumerates a group's lines.
    pub line_ids: Vec<i64>,
}

/// Per-request lookup tables over a job's Schedule of Values.
///
/// Built once from the budget lines and passed by reference to the cost
/// aggregation and EVM stages; nothing here outlives the request.
pub(crate) struct GroupIndex {
    groups: BTreeMap<GroupKey, GroupInfo>,
    line_to_group: HashMap<i64, GroupKey>,
    /// Cost code (normalized) → line ids sharing it, in insertion order so
    /// "first match" is deterministic.
    code_to_lines: HashMap<String, Vec<i64>>,
}

impl GroupIndex {
    pub(crate) fn build(lines: &[BudgetLine]) -> Self {
        let mut groups: BTreeMap<GroupKey, GroupInfo> = BTreeMap::new();
        let mut line_to_group = HashMap::new();
        let mut code_to_lines: HashMap<String, Vec<i64>> = HashMap::new();

        for line in lines {
            let Some(id) = line.id else {
                continue;
            };
            let key = GroupKey::new(&line.area, &line.system);
            let info = groups.entry(key.clone()).or_default();
            info.total_budget_cost += line.budget_cost;
            info.total_budget_value += line.budget_value;
            info.line_ids.push(id);

            line_to_group.insert(id, key);
            code_to_lines
                .entry(normalize_code(&line.cost_code))
                .or_default()
                .push(id);
        }

        Self {
            groups,
            line_to_group,
            code_to_lines,
        }
    }

    pub(crate) fn get(&self, key: &GroupKey) -> Option<&GroupInfo> {
        self.groups.get(key)
    }

    pub(crate) fn contains_group(&self, key: &GroupKey) -> bool {
        self.groups.contains_key(key)
    }

    pub(crate) fn contains_line(&self, line_id: i64) -> bool {
        self.line_to_group.contains_key(&line_id)
    }

    pub(crate) fn group_of_line(&self, line_id: i64) -> Option<&GroupKey> {
        self.line_to_group.get(&line_id)
    }

    /// First budget line sharing a cost code. When several lines collide on
    /// one code, the earliest wins and receives the full attribution.
    pub(crate) fn first_line_for_code(&self, cost_code: &str) -> Option<i64> {
        self.code_to_lines
            .get(&normalize_code(cost_code))
            .and_then(|ids| ids.first().copied())
    }

    pub(crate) fn lines_for_code(&self, cost_code: &str) -> &[i64] {
        self.code_to_lines
            .get(&normalize_code(cost_code))
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&GroupKey, &GroupInfo)> {
        self.groups.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests;
