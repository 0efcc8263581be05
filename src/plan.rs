//! Relocation batch plan: the list of `(source, new base, SID offset,
//! output path)` records a caller wants turned into relocated tunes.
//!
//! This module owns no relocation logic; it only describes the work and
//! turns one record plus a parsed [`PsidHeader`](crate::container::PsidHeader)
//! into a [`RelocationJob`](crate::types::RelocationJob).

use crate::container::PsidHeader;
use crate::error::{RelocatorError, Result};
use crate::types::RelocationJob;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One tune's relocation instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Path to the source PSID/RSID file.
    pub source: PathBuf,
    /// Address to relink the tune at.
    pub new_base: u16,
    /// SID page offset (`0x00`, `0x20`, `0x40`, or `0x60`).
    pub sid_offset: u8,
    /// Path the relocated flat binary should be written to.
    pub output: PathBuf,
    /// Address one past the last address the tune's data occupies. When
    /// absent, defaults to the end of the parsed payload.
    #[serde(default)]
    pub data_end: Option<u16>,
    /// Extra entry points beyond the header's init/play addresses, for
    /// tunes whose driver jumps somewhere the header doesn't name.
    #[serde(default)]
    pub extra_entry_points: Vec<u16>,
}

/// A full batch of relocation instructions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelocationBatch {
    /// Every tune to relocate, in the order they should be processed.
    pub entries: Vec<PlanEntry>,
}

impl RelocationBatch {
    /// Load a batch plan from a JSON document at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a batch plan from a JSON string.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| RelocatorError::PlanParseError {
            message: e.to_string(),
        })
    }
}

impl PlanEntry {
    /// Build a [`RelocationJob`] from this entry, a parsed header, and
    /// the header's original payload bytes.
    pub fn to_job(&self, header: &PsidHeader, payload: Vec<u8>) -> RelocationJob {
        let data_end = self
            .data_end
            .unwrap_or_else(|| header.load_address.wrapping_add(payload.len() as u16));

        let mut entry_points: BTreeSet<u16> = header.entry_points().into_iter().collect();
        entry_points.extend(&self.extra_entry_points);

        RelocationJob {
            original_base: header.load_address,
            data_end,
            new_base: self.new_base,
            sid_offset: self.sid_offset,
            entry_points,
            bytes: payload,
        }
    }
}
