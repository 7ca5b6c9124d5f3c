//! Shared helpers for WASM API operations
//!
//! This module contains common patterns for logging, serialization,
//! deserialization, argument validation and error conversion used by the
//! editor facade.

use crate::leadsheet::EditError;
use crate::models::{Beat, ItemKind, Position, TimeSignature};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

// ============================================================================
// Logging Macros
// ============================================================================

/// Log a debug message with [WASM] prefix
#[macro_export]
macro_rules! wasm_log {
    ($($arg:tt)*) => {
        log::debug!("[WASM] {}", format!($($arg)*))
    };
}

/// Log an info message with [WASM] prefix
#[macro_export]
macro_rules! wasm_info {
    ($($arg:tt)*) => {
        log::info!("[WASM] {}", format!($($arg)*))
    };
}

/// Log a warning message with [WASM] ⚠️ prefix
#[macro_export]
macro_rules! wasm_warn {
    ($($arg:tt)*) => {
        log::warn!("[WASM] ⚠️ {}", format!($($arg)*))
    };
}

/// Log an error message with [WASM] ❌ prefix
#[macro_export]
macro_rules! wasm_error {
    ($($arg:tt)*) => {
        log::error!("[WASM] ❌ {}", format!($($arg)*))
    };
}

// ============================================================================
// Serialization/Deserialization Helpers
// ============================================================================

/// Deserialize a value from JavaScript with automatic error handling
pub fn deserialize<T: DeserializeOwned>(
    value: JsValue,
    error_context: &str,
) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| {
        let msg = format!("{}: {}", error_context, e);
        wasm_error!("{}", msg);
        JsValue::from_str(&msg)
    })
}

/// Serialize a value to JavaScript with automatic error handling
pub fn serialize<T: Serialize>(value: &T, error_context: &str) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| {
        let msg = format!("{}: {}", error_context, e);
        wasm_error!("{}", msg);
        JsValue::from_str(&msg)
    })
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Build a position from a bar and a fractional beat `numer/denom`
pub fn validate_position(bar: u32, numer: i32, denom: i32) -> Result<Position, String> {
    if denom <= 0 {
        return Err(format!("Invalid beat denominator: {} (must be positive)", denom));
    }
    if numer < 0 {
        return Err(format!("Invalid beat: {}/{} (must not be negative)", numer, denom));
    }
    Ok(Position::new(bar, Beat::new(numer, denom)))
}

/// Parse a time signature such as `"3/4"`
pub fn validate_time_signature(text: &str) -> Result<TimeSignature, String> {
    text.parse::<TimeSignature>()
}

/// Convert an optional item kind number to an enum
pub fn validate_kind(kind: Option<u8>) -> Result<Option<ItemKind>, String> {
    match kind {
        None => Ok(None),
        Some(value) => ItemKind::from_u8(value)
            .map(Some)
            .ok_or_else(|| format!("Invalid item kind: {} (must be 0-2)", value)),
    }
}

// ============================================================================
// Result Conversion Helpers
// ============================================================================

/// Convert a validation error to a JsValue
pub fn validation_error(msg: impl Into<String>) -> JsValue {
    let msg = msg.into();
    wasm_error!("{}", msg);
    JsValue::from_str(&msg)
}

/// Convert an edit error to a JsValue; rejections are only worth a warning
pub fn edit_error(err: EditError) -> JsValue {
    let msg = err.to_string();
    if err.is_rejection() {
        wasm_warn!("{}", msg);
    } else {
        wasm_error!("{}", msg);
    }
    JsValue::from_str(&msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_position() {
        assert_eq!(validate_position(2, 3, 2), Ok(Position::on_fraction(2, 3, 2)));
        assert!(validate_position(2, 1, 0).is_err());
        assert!(validate_position(2, -1, 1).is_err());
    }

    #[test]
    fn test_validate_time_signature() {
        assert_eq!(validate_time_signature("3/4"), Ok(TimeSignature::THREE_FOUR));
        assert!(validate_time_signature("3/5").is_err());
        assert!(validate_time_signature("waltz").is_err());
    }

    #[test]
    fn test_validate_kind() {
        assert_eq!(validate_kind(None), Ok(None));
        assert_eq!(validate_kind(Some(1)), Ok(Some(ItemKind::ChordSymbol)));
        assert!(validate_kind(Some(7)).is_err());
    }
}
