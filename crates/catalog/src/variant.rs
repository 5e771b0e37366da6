use serde::{Deserialize, Serialize};

use varscan_core::{Entity, EntityId};

use crate::barcode::Barcode;

/// Product variant identifier.
///
/// Ordered (UUIDv7 is time-ordered), so sorting by `VariantId` gives
/// record-identity order — the deterministic tie-break used by resolution.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VariantId(pub EntityId);

impl VariantId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for VariantId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A concrete sellable unit belonging to exactly one product template.
///
/// Variants keep their identity while their attributes change; a cascade may
/// rewrite `barcode` on every variant of a template at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub variant_id: VariantId,
    pub display_name: String,
    /// Human-readable attribute combination (e.g. "Red, L"). Empty for
    /// single-variant templates.
    pub attribute_label: String,
    pub barcode: Option<Barcode>,
    pub available_in_pos: bool,
}

impl Entity for ProductVariant {
    type Id = VariantId;

    fn id(&self) -> &Self::Id {
        &self.variant_id
    }
}
