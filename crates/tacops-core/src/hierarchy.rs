//! Flat unit list to command forest.

use crate::domain::{Soldier, Unit, UnitRecord};
use crate::ids::{SoldierId, UnitId};
use std::collections::HashMap;

/// Builds the rooted forest from the flat `GET /hierarchy` rows.
///
/// Roots are the rows without a parent reference. Every other row is
/// attached under the unit its parent reference names. Rows without an
/// identifier, rows whose parent does not resolve, and rows caught in a
/// parent cycle are unreachable and left out of the forest. When several
/// rows share an identifier the last one wins. Roots and children keep the
/// input order.
pub fn build_hierarchy(records: Vec<UnitRecord>) -> Vec<Unit> {
    let mut winners: HashMap<UnitId, usize> = HashMap::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        if let Some(unit_id) = record_id(record) {
            winners.insert(unit_id.clone(), index);
        }
    }

    let mut nodes: HashMap<UnitId, Unit> = HashMap::with_capacity(winners.len());
    let mut children: HashMap<UnitId, Vec<UnitId>> = HashMap::new();
    let mut roots: Vec<UnitId> = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        let Some(unit_id) = record_id(&record).cloned() else {
            continue;
        };
        if winners.get(&unit_id) != Some(&index) {
            continue;
        }
        match record.parent() {
            Some(parent) => children
                .entry(parent.clone())
                .or_default()
                .push(unit_id.clone()),
            None => roots.push(unit_id.clone()),
        }
        nodes.insert(unit_id.clone(), Unit::from_record(unit_id, record));
    }

    roots
        .iter()
        .filter_map(|unit_id| assemble(unit_id, &mut nodes, &children))
        .collect()
}

fn record_id(record: &UnitRecord) -> Option<&UnitId> {
    record.unit_id.as_ref().filter(|unit_id| !unit_id.is_blank())
}

// Each node is moved out of the lookup exactly once, so a parent cycle
// cannot recurse forever.
fn assemble(
    unit_id: &UnitId,
    nodes: &mut HashMap<UnitId, Unit>,
    children: &HashMap<UnitId, Vec<UnitId>>,
) -> Option<Unit> {
    let mut unit = nodes.remove(unit_id)?;
    if let Some(child_ids) = children.get(unit_id) {
        for child_id in child_ids {
            if let Some(child) = assemble(child_id, nodes, children) {
                unit.subunits.push(child);
            }
        }
    }
    Some(unit)
}

/// Number of units reachable in the forest.
pub fn count_units(roots: &[Unit]) -> usize {
    roots
        .iter()
        .map(|unit| 1 + count_units(&unit.subunits))
        .sum()
}

/// Depth-first search for a unit by identifier.
pub fn find_unit<'a>(roots: &'a [Unit], unit_id: &UnitId) -> Option<&'a Unit> {
    for unit in roots {
        if &unit.unit_id == unit_id {
            return Some(unit);
        }
        if let Some(found) = find_unit(&unit.subunits, unit_id) {
            return Some(found);
        }
    }
    None
}

pub fn find_soldier<'a>(roots: &'a [Unit], soldier_id: &SoldierId) -> Option<&'a Soldier> {
    for unit in roots {
        if let Some(soldier) = unit
            .soldiers
            .iter()
            .find(|soldier| &soldier.soldier_id == soldier_id)
        {
            return Some(soldier);
        }
        if let Some(found) = find_soldier(&unit.subunits, soldier_id) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: serde_json::Value) -> Vec<UnitRecord> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn attaches_children_under_their_parent() {
        let roots = build_hierarchy(records(json!([
            {"unit_id": "C1", "name": "Alpha Co", "parent_unit_id": "B1", "level": "company",
             "soldiers": [{"soldier_id": "S1", "name": "Doe", "rank": "SGT", "unit_id": "C1"}]},
            {"unit_id": "B1", "name": "1st Bn", "parent_unit_id": null, "level": "battalion"},
            {"unit_id": "P1", "name": "1st Plt", "parent_unit_id": "C1", "level": "platoon"},
            {"unit_id": "C2", "name": "Bravo Co", "parent_unit_id": "B1", "level": "company"}
        ])));

        assert_eq!(roots.len(), 1);
        let battalion = &roots[0];
        assert_eq!(battalion.unit_id.as_str(), "B1");
        assert!(battalion.soldiers.is_empty());
        let companies: Vec<&str> = battalion
            .subunits
            .iter()
            .map(|unit| unit.unit_id.as_str())
            .collect();
        assert_eq!(companies, vec!["C1", "C2"]);
        assert_eq!(battalion.subunits[0].soldiers.len(), 1);
        assert_eq!(battalion.subunits[0].subunits[0].unit_id.as_str(), "P1");
        assert_eq!(count_units(&roots), 4);
    }

    #[test]
    fn orphans_and_missing_ids_are_dropped() {
        let roots = build_hierarchy(records(json!([
            {"unit_id": "B1", "name": "1st Bn", "level": "battalion"},
            {"unit_id": "X1", "name": "Lost", "parent_unit_id": "NOPE", "level": "squad"},
            {"name": "No id", "parent_unit_id": "B1", "level": "squad"},
            {"unit_id": "B2", "name": "2nd Bn", "parent_unit_id": "", "level": "battalion"}
        ])));
        let ids: Vec<&str> = roots.iter().map(|unit| unit.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["B1", "B2"]);
        assert_eq!(count_units(&roots), 2);
    }

    #[test]
    fn cycles_are_unreachable() {
        let roots = build_hierarchy(records(json!([
            {"unit_id": "A", "name": "A", "parent_unit_id": "B", "level": "x"},
            {"unit_id": "B", "name": "B", "parent_unit_id": "A", "level": "x"},
            {"unit_id": "S", "name": "Self", "parent_unit_id": "S", "level": "x"}
        ])));
        assert!(roots.is_empty());
    }

    #[test]
    fn last_record_for_an_id_wins() {
        let roots = build_hierarchy(records(json!([
            {"unit_id": "B1", "name": "1st Bn", "level": "battalion"},
            {"unit_id": "B2", "name": "2nd Bn", "level": "battalion"},
            {"unit_id": "C1", "name": "Old", "parent_unit_id": "B1", "level": "company"},
            {"unit_id": "C1", "name": "New", "parent_unit_id": "B2", "level": "company"}
        ])));
        assert!(roots[0].subunits.is_empty());
        assert_eq!(roots[1].subunits.len(), 1);
        assert_eq!(roots[1].subunits[0].name, "New");
        assert_eq!(count_units(&roots), 3);
    }

    #[test]
    fn finds_nested_units_and_soldiers() {
        let roots = build_hierarchy(records(json!([
            {"unit_id": "B1", "name": "1st Bn", "level": "battalion"},
            {"unit_id": "C1", "name": "Alpha Co", "parent_unit_id": "B1", "level": "company",
             "soldiers": [{"soldier_id": "S1", "name": "Doe", "rank": "SGT", "unit_id": "C1"}]}
        ])));
        let company = find_unit(&roots, &UnitId::new("C1")).unwrap();
        assert_eq!(company.name, "Alpha Co");
        assert!(find_unit(&roots, &UnitId::new("C9")).is_none());
        let soldier = find_soldier(&roots, &SoldierId::new("S1")).unwrap();
        assert_eq!(soldier.name, "Doe");
    }
}
