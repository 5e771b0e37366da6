//! Barcode uniqueness policy, evaluated at variant-save time.
//!
//! Uniqueness is a cross-template concern, so it cannot live inside one
//! template aggregate; it consults the storage collaborator's search
//! primitive instead and blocks the save when a foreign duplicate exists.

use varscan_core::{DomainError, DomainResult};

use crate::barcode::Barcode;
use crate::lookup::BarcodeLookup;
use crate::template::TemplateId;
use crate::variant::VariantId;

/// A variant barcode assignment awaiting validation, as seen by the product
/// editor right after the field was set or changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeClaim {
    pub variant_id: VariantId,
    pub template_id: TemplateId,
    pub template_uses_shared_barcode: bool,
    pub barcode: Option<Barcode>,
}

/// Validate a freshly set/changed variant barcode.
///
/// - an unset barcode always passes;
/// - a variant of a sharing-enabled template always passes (duplicates within
///   the template are the point of the feature);
/// - otherwise any *other* variant holding the same code that is not a
///   sharing-enabled sibling — another template entirely, or the same
///   template with sharing disabled — makes the save fail with
///   [`DomainError::DuplicateBarcode`].
pub fn validate_barcode_uniqueness<L: BarcodeLookup>(
    lookup: &L,
    claim: &BarcodeClaim,
) -> DomainResult<()> {
    let Some(code) = &claim.barcode else {
        return Ok(());
    };

    if claim.template_uses_shared_barcode {
        return Ok(());
    }

    let conflicting = lookup.find_by_barcode(code, false).into_iter().any(|hit| {
        hit.variant_id != claim.variant_id
            && (hit.template_id != claim.template_id || !hit.template_uses_shared_barcode)
    });

    if conflicting {
        return Err(DomainError::duplicate_barcode(code.as_str()));
    }

    Ok(())
}
