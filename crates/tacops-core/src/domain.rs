use crate::ids::{InputId, SoldierId, UnitId};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoldierStatus {
    Active,
    Injured,
    Missing,
    #[serde(other)]
    Unknown,
}

impl Default for SoldierStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Soldier {
    pub soldier_id: SoldierId,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rank: String,
    pub unit_id: UnitId,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: SoldierStatus,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_level: Option<String>,
}

/// Flat unit row as served by `GET /hierarchy`.
///
/// `unit_id` is optional on the wire so that a malformed row can be
/// skipped by the hierarchy builder instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    #[serde(default)]
    pub unit_id: Option<UnitId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub parent_unit_id: Option<UnitId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub level: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub soldiers: Option<Vec<Soldier>>,
}

impl UnitRecord {
    /// Parent reference, treating an empty string the same as an absent one.
    pub fn parent(&self) -> Option<&UnitId> {
        self.parent_unit_id.as_ref().filter(|parent| !parent.is_blank())
    }
}

/// A unit in the assembled command hierarchy, owning its directly assigned
/// soldiers and its child units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub unit_id: UnitId,
    pub name: String,
    pub parent_unit_id: Option<UnitId>,
    pub level: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub soldiers: Vec<Soldier>,
    #[serde(default)]
    pub subunits: Vec<Unit>,
}

impl Unit {
    pub fn from_record(unit_id: UnitId, record: UnitRecord) -> Self {
        let parent_unit_id = record.parent().cloned();
        Self {
            unit_id,
            name: record.name,
            parent_unit_id,
            level: record.level,
            created_at: record.created_at,
            soldiers: record.soldiers.unwrap_or_default(),
            subunits: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    pub input_id: InputId,
    pub soldier_id: SoldierId,
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub raw_text: String,
    #[serde(default)]
    pub raw_audio_ref: Option<String>,
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soldier_tolerates_nulls_and_unknown_status() {
        let soldier: Soldier = serde_json::from_value(serde_json::json!({
            "soldier_id": "S1",
            "name": "Alpha",
            "rank": null,
            "unit_id": "C1",
            "status": "kia"
        }))
        .unwrap();
        assert_eq!(soldier.rank, "");
        assert_eq!(soldier.status, SoldierStatus::Unknown);
        assert!(soldier.device_id.is_none());
    }

    #[test]
    fn blank_parent_counts_as_root() {
        let record: UnitRecord = serde_json::from_value(serde_json::json!({
            "unit_id": "B1",
            "name": "1st Battalion",
            "parent_unit_id": "",
            "level": "battalion"
        }))
        .unwrap();
        assert!(record.parent().is_none());
        assert!(record.soldiers.is_none());
    }
}
