//! Configuration for new leadsheets

use super::errors::EditError;
use crate::models::TimeSignature;
use serde::{Deserialize, Serialize};

/// Settings used when creating a leadsheet
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LeadSheetConfig {
    /// Bar count of a new leadsheet
    pub initial_size_in_bars: u32,

    /// Name of the section created at bar 0
    pub initial_section_name: String,

    /// Time signature of the section created at bar 0
    pub initial_time_signature: TimeSignature,

    /// Maximum number of committed edits kept for undo
    pub undo_limit: usize,

    /// Run the full invariant check after every mutation
    pub verify_after_mutation: bool,
}

impl Default for LeadSheetConfig {
    fn default() -> Self {
        Self {
            initial_size_in_bars: 8,
            initial_section_name: "A".to_string(),
            initial_time_signature: TimeSignature::FOUR_FOUR,
            undo_limit: 100,
            verify_after_mutation: true,
        }
    }
}

impl LeadSheetConfig {
    /// Parse a config from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, EditError> {
        let config: LeadSheetConfig = serde_json::from_str(json)
            .map_err(|e| EditError::InvariantViolation(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EditError> {
        if self.initial_size_in_bars == 0 {
            return Err(EditError::InvariantViolation(
                "A leadsheet needs at least one bar".to_string(),
            ));
        }
        if self.initial_section_name.trim().is_empty() {
            return Err(EditError::InvariantViolation(
                "The initial section needs a name".to_string(),
            ));
        }
        let ts = self.initial_time_signature;
        if TimeSignature::new(ts.upper(), ts.lower()).is_none() {
            return Err(EditError::InvariantViolation(format!(
                "Unsupported time signature {}",
                ts
            )));
        }
        Ok(())
    }
}
