use std::collections::BTreeMap;

use crate::error::ValidationError;

/// Minimum number of distinct fields the matching service needs.
pub const MIN_SELECTED_COLUMNS: usize = 2;

/// Check a field selection before it is sent anywhere.
pub fn validate_field_selection(fields: &[String]) -> Result<(), ValidationError> {
    let mut distinct: Vec<&str> = fields.iter().map(String::as_str).collect();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() < MIN_SELECTED_COLUMNS {
        return Err(ValidationError::TooFewColumns { selected: distinct.len() });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Column Selector
// ---------------------------------------------------------------------------

/// Which fields participate in matching. Selection order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    available: Vec<String>,
    selected: Vec<String>,
}

impl ColumnSelection {
    pub fn new(available: Vec<String>) -> Self {
        Self { available, selected: Vec::new() }
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selected.iter().any(|s| s == name)
    }

    /// Flip one field. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, name: &str) -> Result<bool, ValidationError> {
        self.check_known(name)?;
        if let Some(pos) = self.selected.iter().position(|s| s == name) {
            self.selected.remove(pos);
            Ok(false)
        } else {
            self.selected.push(name.to_string());
            Ok(true)
        }
    }

    /// Replace the selection. Duplicates collapse; unknown names are rejected
    /// and leave the previous selection in place.
    pub fn set<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), ValidationError> {
        let mut next: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            self.check_known(name)?;
            if !next.iter().any(|n| n == name) {
                next.push(name.to_string());
            }
        }
        self.selected = next;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// The selection, if it is usable for a submission.
    pub fn validated(&self) -> Result<Vec<String>, ValidationError> {
        validate_field_selection(&self.selected)?;
        Ok(self.selected.clone())
    }

    fn check_known(&self, name: &str) -> Result<(), ValidationError> {
        if self.available.iter().any(|a| a == name) {
            Ok(())
        } else {
            Err(ValidationError::UnknownColumn(name.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Two-file column mapping
// ---------------------------------------------------------------------------

/// Position of a file in a two-file upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSlot {
    First,
    Second,
}

/// Maps the narrower file's columns ("source") onto the wider file's
/// columns ("target"). Each target column can be claimed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    source_slot: FileSlot,
    source_columns: Vec<String>,
    target_columns: Vec<String>,
    mappings: BTreeMap<String, String>,
}

/// A mapping with every source column assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedMapping {
    pub source_slot: FileSlot,
    pub target_columns: Vec<String>,
    /// source column -> target column
    pub mappings: BTreeMap<String, String>,
}

impl ColumnMapping {
    /// Decide source/target by column count (ties keep the first file as
    /// target) and pre-map columns that share a name.
    pub fn auto(first: &[String], second: &[String]) -> Self {
        let (source_slot, source, target) = if first.len() >= second.len() {
            (FileSlot::Second, second, first)
        } else {
            (FileSlot::First, first, second)
        };

        let mappings = source
            .iter()
            .filter(|col| target.contains(col))
            .map(|col| (col.clone(), col.clone()))
            .collect();

        Self {
            source_slot,
            source_columns: source.to_vec(),
            target_columns: target.to_vec(),
            mappings,
        }
    }

    pub fn source_slot(&self) -> FileSlot {
        self.source_slot
    }

    pub fn source_columns(&self) -> &[String] {
        &self.source_columns
    }

    pub fn target_columns(&self) -> &[String] {
        &self.target_columns
    }

    pub fn target_of(&self, source: &str) -> Option<&str> {
        self.mappings.get(source).map(String::as_str)
    }

    pub fn map(&mut self, source: &str, target: &str) -> Result<(), ValidationError> {
        if !self.source_columns.iter().any(|c| c == source) {
            return Err(ValidationError::UnknownColumn(source.to_string()));
        }
        if !self.target_columns.iter().any(|c| c == target) {
            return Err(ValidationError::UnknownColumn(target.to_string()));
        }
        if let Some((owner, _)) = self
            .mappings
            .iter()
            .find(|(owner, t)| t.as_str() == target && owner.as_str() != source)
        {
            return Err(ValidationError::TargetAlreadyMapped {
                target: target.to_string(),
                source: owner.clone(),
            });
        }
        self.mappings.insert(source.to_string(), target.to_string());
        Ok(())
    }

    pub fn unmap(&mut self, source: &str) {
        self.mappings.remove(source);
    }

    pub fn reset(&mut self) {
        self.mappings.clear();
    }

    pub fn unmapped(&self) -> Vec<String> {
        self.source_columns
            .iter()
            .filter(|c| !self.mappings.contains_key(*c))
            .cloned()
            .collect()
    }

    pub fn complete(self) -> Result<CompletedMapping, ValidationError> {
        let missing = self.unmapped();
        if !missing.is_empty() {
            return Err(ValidationError::UnmappedColumns(missing));
        }
        Ok(CompletedMapping {
            source_slot: self.source_slot,
            target_columns: self.target_columns,
            mappings: self.mappings,
        })
    }
}

impl CompletedMapping {
    /// Target columns that some source column feeds; these are the only
    /// fields both files can be matched on.
    pub fn shared_columns(&self) -> Vec<String> {
        self.target_columns
            .iter()
            .filter(|t| self.mappings.values().any(|m| m == *t))
            .cloned()
            .collect()
    }
}
