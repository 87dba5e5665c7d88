//! Participant classification table.

use crate::source::{cell, PlainCsvSource, RawTable, TableSource};
use rebid_core::config::ParticipantColumns;
use rebid_core::{Error, ParticipantCategory, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Classification flags of one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantInfo {
    /// Can both inject and absorb power.
    pub is_storage_resource: bool,
    /// Runs the target autobidder software.
    pub uses_target_autobidder: bool,
    /// Display name.
    pub name: String,
}

impl ParticipantInfo {
    pub fn category(&self) -> ParticipantCategory {
        ParticipantCategory::from_flags(self.is_storage_resource, self.uses_target_autobidder)
    }
}

/// Lookup from participant id to classification flags.
#[derive(Debug, Clone, Default)]
pub struct ParticipantTable {
    entries: HashMap<String, ParticipantInfo>,
}

impl ParticipantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a participant.
    pub fn insert(&mut self, participant: impl Into<String>, info: ParticipantInfo) {
        self.entries.insert(participant.into(), info);
    }

    pub fn get(&self, participant: &str) -> Option<&ParticipantInfo> {
        self.entries.get(participant)
    }

    /// Category of a participant, `None` when it is not in the table.
    pub fn category_of(&self, participant: &str) -> Option<ParticipantCategory> {
        self.get(participant).map(ParticipantInfo::category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read the table from a CSV file with a header row.
    pub fn from_path(path: impl AsRef<Path>, columns: &ParticipantColumns) -> Result<Self> {
        Self::from_table(&PlainCsvSource::open(path)?.read_table()?, columns)
    }

    /// Read the table from any CSV reader with a header row.
    pub fn from_reader<R: Read>(reader: R, columns: &ParticipantColumns) -> Result<Self> {
        Self::from_table(&PlainCsvSource::new(reader).read_table()?, columns)
    }

    /// Build the table from raw rows.
    ///
    /// Repeated ids with identical flags are tolerated; repeated ids with
    /// conflicting flags are an error since either choice would guess a category.
    pub fn from_table(table: &RawTable, columns: &ParticipantColumns) -> Result<Self> {
        let id_col = table.require_column(&columns.participant)?;
        let type_col = table.require_column(&columns.dispatch_type)?;
        let auto_col = table.require_column(&columns.autobidder)?;
        let name_col = table.column_index(&columns.name);

        let mut result = Self::new();
        for (i, row) in table.rows().enumerate() {
            let id = cell(row, id_col);
            if id.is_empty() {
                debug!(row = i + 1, "skipping participant row without id");
                continue;
            }

            let info = ParticipantInfo {
                is_storage_resource: cell(row, type_col)
                    .eq_ignore_ascii_case(columns.storage_dispatch_type.trim()),
                uses_target_autobidder: parse_flag(cell(row, auto_col)).ok_or_else(|| {
                    Error::participants(format!(
                        "row {}: unrecognised {} value {:?}",
                        i + 1,
                        columns.autobidder,
                        cell(row, auto_col)
                    ))
                })?,
                name: name_col.map(|c| cell(row, c).to_string()).unwrap_or_default(),
            };

            match result.entries.get(id) {
                Some(existing)
                    if existing.is_storage_resource != info.is_storage_resource
                        || existing.uses_target_autobidder != info.uses_target_autobidder =>
                {
                    return Err(Error::participants(format!(
                        "participant {} listed twice with different classification",
                        id
                    )));
                }
                Some(_) => {}
                None => result.insert(id, info),
            }
        }

        info!(participants = result.len(), "loaded participant table");
        Ok(result)
    }
}

/// Parse a boolean flag. Empty cells read as `false`.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" | "1.0" => Some(true),
        "false" | "0" | "no" | "n" | "f" | "0.0" | "" => Some(false),
        _ => None,
    }
}
