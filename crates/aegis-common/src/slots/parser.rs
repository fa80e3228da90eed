//! SlotParser - strict JSON into `StructuredSlots`.
//!
//! Unknown fields are ignored (serde's default behavior, since we don't
//! set `deny_unknown_fields`); a missing required field or type mismatch
//! produces a `ParseFailure` that preserves the raw string for
//! diagnostics - the caller never sees a panic or an exception.

use crate::types::StructuredSlots;

/// A parse failure, with the original text kept for diagnostics/logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub raw: String,
    pub message: String,
}

/// Parses one model output string into `StructuredSlots`.
pub fn parse_slots(raw: &str) -> Result<StructuredSlots, ParseFailure> {
    serde_json::from_str::<StructuredSlots>(raw).map_err(|e| ParseFailure {
        raw: raw.to_string(),
        message: e.to_string(),
    })
}
