use crate::domain::{Soldier, Unit};
use crate::hierarchy::{find_soldier, find_unit};
use crate::ids::{SoldierId, UnitId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Unit,
    Soldier,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("unit"),
            Self::Soldier => f.write_str("soldier"),
        }
    }
}

/// Selectable projection over the hierarchy: either a whole unit subtree or
/// a single soldier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Unit(Unit),
    Soldier(Soldier),
}

impl TreeNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Unit(_) => NodeKind::Unit,
            Self::Soldier(_) => NodeKind::Soldier,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Unit(unit) => unit.unit_id.as_str(),
            Self::Soldier(soldier) => soldier.soldier_id.as_str(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Unit(unit) => &unit.name,
            Self::Soldier(soldier) => &soldier.name,
        }
    }

    /// The unit itself, or the unit a soldier belongs to.
    pub fn unit_id(&self) -> &UnitId {
        match self {
            Self::Unit(unit) => &unit.unit_id,
            Self::Soldier(soldier) => &soldier.unit_id,
        }
    }

    /// Direct children: a unit's soldiers first, then its subunits.
    pub fn children(&self) -> Vec<TreeNode> {
        match self {
            Self::Unit(unit) => unit
                .soldiers
                .iter()
                .cloned()
                .map(Self::Soldier)
                .chain(unit.subunits.iter().cloned().map(Self::Unit))
                .collect(),
            Self::Soldier(_) => Vec::new(),
        }
    }

    /// Every soldier identifier reachable from this node.
    ///
    /// Duplicates in the input are kept. The walk has no cycle guard; the
    /// forest produced by the hierarchy builder is acyclic by construction.
    pub fn collect_soldier_ids(&self) -> Vec<SoldierId> {
        match self {
            Self::Soldier(soldier) => vec![soldier.soldier_id.clone()],
            Self::Unit(unit) => {
                let mut soldier_ids = Vec::new();
                collect_unit_soldier_ids(unit, &mut soldier_ids);
                soldier_ids
            }
        }
    }
}

fn collect_unit_soldier_ids(unit: &Unit, soldier_ids: &mut Vec<SoldierId>) {
    soldier_ids.extend(unit.soldiers.iter().map(|soldier| soldier.soldier_id.clone()));
    for subunit in &unit.subunits {
        collect_unit_soldier_ids(subunit, soldier_ids);
    }
}

/// Lightweight reference to a node, as sent by a client selecting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub id: String,
}

impl NodeRef {
    pub fn resolve(&self, roots: &[Unit]) -> Option<TreeNode> {
        match self.kind {
            NodeKind::Unit => find_unit(roots, &UnitId::new(self.id.as_str()))
                .cloned()
                .map(TreeNode::Unit),
            NodeKind::Soldier => find_soldier(roots, &SoldierId::new(self.id.as_str()))
                .cloned()
                .map(TreeNode::Soldier),
        }
    }
}

impl From<&TreeNode> for NodeRef {
    fn from(node: &TreeNode) -> Self {
        Self {
            kind: node.kind(),
            id: node.id().to_string(),
        }
    }
}
