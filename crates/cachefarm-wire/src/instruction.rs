//! Refresh instructions exchanged between farm servers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::codec::encode_ids;
use crate::error::WireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RefreshMethodType {
    RefreshAll,
    RefreshByGuid,
    RefreshById,
    RefreshByIds,
    RefreshByJson,
    RemoveById,
}

impl RefreshMethodType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RefreshAll => "refresh_all",
            Self::RefreshByGuid => "refresh_by_guid",
            Self::RefreshById => "refresh_by_id",
            Self::RefreshByIds => "refresh_by_ids",
            Self::RefreshByJson => "refresh_by_json",
            Self::RemoveById => "remove_by_id",
        }
    }
}

impl TryFrom<u8> for RefreshMethodType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::RefreshAll),
            1 => Ok(Self::RefreshByGuid),
            2 => Ok(Self::RefreshById),
            3 => Ok(Self::RefreshByIds),
            4 => Ok(Self::RefreshByJson),
            5 => Ok(Self::RemoveById),
            other => Err(format!("unknown refresh method type {other}")),
        }
    }
}

impl From<RefreshMethodType> for u8 {
    fn from(value: RefreshMethodType) -> Self {
        match value {
            RefreshMethodType::RefreshAll => 0,
            RefreshMethodType::RefreshByGuid => 1,
            RefreshMethodType::RefreshById => 2,
            RefreshMethodType::RefreshByIds => 3,
            RefreshMethodType::RefreshByJson => 4,
            RefreshMethodType::RemoveById => 5,
        }
    }
}

/// One refresh operation to replay on a receiving server.
///
/// Instructions are hashable so a receiver can skip duplicates inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RefreshInstruction {
    pub refresh_type: RefreshMethodType,
    pub refresher_id: Uuid,
    #[serde(default)]
    pub guid_id: Uuid,
    #[serde(default)]
    pub int_id: i32,
    #[serde(default)]
    pub json_ids: Option<String>,
    #[serde(default)]
    pub json_id_count: usize,
    #[serde(default)]
    pub json_payload: Option<String>,
}

impl RefreshInstruction {
    fn bare(refresh_type: RefreshMethodType, refresher_id: Uuid) -> Self {
        Self {
            refresh_type,
            refresher_id,
            guid_id: Uuid::nil(),
            int_id: 0,
            json_ids: None,
            json_id_count: 1,
            json_payload: None,
        }
    }

    pub fn refresh_all(refresher_id: Uuid) -> Self {
        Self::bare(RefreshMethodType::RefreshAll, refresher_id)
    }

    pub fn refresh_by_guid(refresher_id: Uuid, guid_id: Uuid) -> Self {
        Self {
            guid_id,
            ..Self::bare(RefreshMethodType::RefreshByGuid, refresher_id)
        }
    }

    pub fn refresh_by_id(refresher_id: Uuid, int_id: i32) -> Self {
        Self {
            int_id,
            ..Self::bare(RefreshMethodType::RefreshById, refresher_id)
        }
    }

    pub fn refresh_by_ids(refresher_id: Uuid, ids: &[i32]) -> Result<Self, WireError> {
        Ok(Self {
            json_ids: Some(encode_ids(ids)?),
            json_id_count: ids.len(),
            ..Self::bare(RefreshMethodType::RefreshByIds, refresher_id)
        })
    }

    pub fn refresh_by_json(refresher_id: Uuid, json_payload: impl Into<String>) -> Self {
        Self {
            json_payload: Some(json_payload.into()),
            ..Self::bare(RefreshMethodType::RefreshByJson, refresher_id)
        }
    }

    pub fn remove_by_id(refresher_id: Uuid, int_id: i32) -> Self {
        Self {
            int_id,
            ..Self::bare(RefreshMethodType::RemoveById, refresher_id)
        }
    }
}

/// Reads an instruction batch whose elements are instruction objects or
/// (possibly nested) arrays of them.
pub fn flatten_instructions(json: &str) -> Result<Vec<RefreshInstruction>, WireError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries = match serde_json::from_str::<Value>(json)? {
        Value::Array(entries) => entries,
        Value::Null => return Ok(Vec::new()),
        Value::Object(_) => return Err(WireError::NotAnArray { found: "object" }),
        _ => return Err(WireError::NotAnArray { found: "scalar" }),
    };

    let mut out = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        collect(entry, index, &mut out)?;
    }
    Ok(out)
}

fn collect(value: Value, index: usize, out: &mut Vec<RefreshInstruction>) -> Result<(), WireError> {
    match value {
        Value::Array(nested) => {
            for inner in nested {
                collect(inner, index, out)?;
            }
            Ok(())
        }
        other => {
            let instruction =
                serde_json::from_value(other).map_err(|source| WireError::malformed(index, source))?;
            out.push(instruction);
            Ok(())
        }
    }
}
