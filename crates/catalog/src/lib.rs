//! Catalog domain module (event-sourced).
//!
//! This crate contains the business rules for the shared-barcode product
//! catalog: the template/variant write model, the cascade that keeps variant
//! barcodes in step with a template's shared code, and the barcode-uniqueness
//! policy. Implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod barcode;
pub mod lookup;
pub mod template;
pub mod uniqueness;
pub mod variant;

pub use barcode::Barcode;
pub use lookup::{BarcodeLookup, TemplateHit, VariantHit};
pub use template::{
    AddVariant, CreateTemplate, ProductTemplate, SetSharedBarcode, SetUseSharedBarcode,
    SetVariantBarcode, SetVariantPosAvailability, SharedBarcodeSet, TemplateCommand,
    TemplateCreated, TemplateEvent, TemplateId, UseSharedBarcodeSet, VariantAdded,
    VariantBarcodeSet, VariantPosAvailabilitySet,
};
pub use uniqueness::{BarcodeClaim, validate_barcode_uniqueness};
pub use variant::{ProductVariant, VariantId};
