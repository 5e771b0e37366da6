use core::str::FromStr;

use serde::{Deserialize, Serialize};

use varscan_core::{DomainError, ValueObject};

/// A barcode value as scanned or assigned (non-empty, surrounding whitespace
/// stripped).
///
/// "Empty barcode" is not a `Barcode` — callers model the unassigned state as
/// `Option<Barcode>`, which keeps "cleared by a cascade" distinct from "set to
/// an empty string".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Barcode(String);

impl Barcode {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, DomainError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("barcode cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Barcode {}

impl core::fmt::Display for Barcode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Barcode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
