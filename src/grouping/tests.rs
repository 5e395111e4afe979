#![allow(clippy::unwrap_used)]

use rust_decimal_macros::dec;

use super::*;
use crate::models::BudgetLine;

fn make_line(id: i64, code: &str, area: &str, system: &str, cost: i64, value: i64) -> BudgetLine {
    BudgetLine {
        id: Some(id),
        job_id: 1,
        cost_code: code.into(),
        area: area.into(),
        system: system.into(),
        phase: String::new(),
        budget_cost: cost.into(),
        budget_value: value.into(),
    }
}

#[test]
fn test_groups_by_area_system() {
    let lines = vec![
        make_line(1, "02-100", "Area 1", "Piping", 50000, 60000),
        make_line(2, "02-200", "Area 1", "Piping", 30000, 36000),
        make_line(3, "03-100", "Area 2", "Electrical", 20000, 25000),
    ];
    let index = GroupIndex::build(&lines);
    assert_eq!(index.len(), 2);

    let piping = index.get(&GroupKey::new("Area 1", "Piping")).unwrap();
    assert_eq!(piping.total_budget_cost, dec!(80000));
    assert_eq!(piping.total_budget_value, dec!(96000));
    assert_eq!(piping.line_ids, vec![1, 2]);

    let elec = index.get(&GroupKey::new("Area 2", "Electrical")).unwrap();
    assert_eq!(elec.line_ids, vec![3]);
}

#[test]
fn test_line_to_group_lookup() {
    let lines = vec![
        make_line(1, "02-100", "Area 1", "Piping", 50000, 60000),
        make_line(3, "03-100", "Area 2", "Electrical", 20000, 25000),
    ];
    let index = GroupIndex::build(&lines);
    assert_eq!(index.group_of_line(1), Some(&GroupKey::new("Area 1", "Piping")));
    assert_eq!(index.group_of_line(3), Some(&GroupKey::new("Area 2", "Electrical")));
    assert_eq!(index.group_of_line(99), None);
    assert!(index.contains_line(1));
    assert!(!index.contains_line(99));
}

#[test]
fn test_cost_code_lookup_first_match() {
    // Two lines share a code across different groups: first one wins.
    let lines = vec![
        make_line(1, "02-100", "Area 1", "Piping", 50000, 60000),
        make_line(2, "02-100", "Area 2", "Piping", 30000, 36000),
    ];
    let index = GroupIndex::build(&lines);
    assert_eq!(index.first_line_for_code("02-100"), Some(1));
    assert_eq!(index.lines_for_code("02-100"), &[1, 2]);
    assert_eq!(index.first_line_for_code("09-999"), None);
}

#[test]
fn test_cost_code_normalized() {
    let lines = vec![make_line(1, "02-100", "Area 1", "Piping", 50000, 60000)];
    let index = GroupIndex::build(&lines);
    assert_eq!(index.first_line_for_code(" 02-100 "), Some(1));
    assert_eq!(index.first_line_for_code("02-100"), Some(1));
}

#[test]
fn test_group_key_trims() {
    let key = GroupKey::new(" Area 1 ", " Piping ");
    assert_eq!(key.area, "Area 1");
    assert_eq!(key.system, "Piping");
    assert_eq!(key.to_string(), "Area 1 / Piping");
}

#[test]
fn test_unsaved_lines_skipped() {
    let mut line = make_line(1, "02-100", "Area 1", "Piping", 50000, 60000);
    line.id = None;
    let index = GroupIndex::build(&[line]);
    assert!(index.is_empty());
}

#[test]
fn test_groups_iterate_in_key_order() {
    let lines = vec![
        make_line(1, "09-100", "Area 2", "Coatings", 1000, 1200),
        make_line(2, "02-100", "Area 1", "Piping", 1000, 1200),
        make_line(3, "05-100", "Area 1", "Steel", 1000, 1200),
    ];
    let index = GroupIndex::build(&lines);
    let keys: Vec<String> = index.iter().map(|(k, _)| k.to_string()).collect();
    assert_eq!(
        keys,
        vec!["Area 1 / Piping", "Area 1 / Steel", "Area 2 / Coatings"]
    );
}
