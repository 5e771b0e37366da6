//! The search seam between the catalog and the storage/query collaborator.
//!
//! Resolution and uniqueness validation never walk the backing store
//! themselves; they consume this trait. The host application wires it to its
//! query engine, tests and the in-memory infrastructure wire it to the
//! `BarcodeIndex` projection.

use crate::barcode::Barcode;
use crate::template::TemplateId;
use crate::variant::VariantId;

/// One variant matching a barcode search, denormalized with everything the
/// decision logic needs: the owning template and its sharing flag ride along
/// with each hit, so neither resolution nor uniqueness validation goes back
/// to the store for a second query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantHit {
    pub variant_id: VariantId,
    pub template_id: TemplateId,
    pub display_name: String,
    pub attribute_label: String,
    pub available_in_pos: bool,
    pub template_uses_shared_barcode: bool,
}

/// A sharing-enabled template whose shared code matched a search, with its
/// (optionally POS-filtered) variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateHit {
    pub template_id: TemplateId,
    pub variants: Vec<VariantHit>,
}

/// Exact-match search primitive supplied by the storage/query collaborator.
pub trait BarcodeLookup {
    /// All variants whose `barcode` equals `code`. When `pos_only`, restrict
    /// to variants flagged `available_in_pos`. Order is unspecified; callers
    /// needing determinism sort by `variant_id`.
    fn find_by_barcode(&self, code: &Barcode, pos_only: bool) -> Vec<VariantHit>;

    /// Templates with sharing enabled whose `shared_barcode` equals `code`,
    /// each carrying its (optionally POS-filtered) variants. This backs the
    /// resolution fallback for codes no variant currently carries.
    fn shared_templates_with_code(&self, code: &Barcode, pos_only: bool) -> Vec<TemplateHit>;
}

impl<L> BarcodeLookup for &L
where
    L: BarcodeLookup + ?Sized,
{
    fn find_by_barcode(&self, code: &Barcode, pos_only: bool) -> Vec<VariantHit> {
        (**self).find_by_barcode(code, pos_only)
    }

    fn shared_templates_with_code(&self, code: &Barcode, pos_only: bool) -> Vec<TemplateHit> {
        (**self).shared_templates_with_code(code, pos_only)
    }
}
