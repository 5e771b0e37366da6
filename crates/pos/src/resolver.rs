use serde::{Deserialize, Serialize};

use varscan_catalog::{Barcode, BarcodeLookup, TemplateId, VariantHit, VariantId};
use varscan_core::{DomainError, DomainResult};

/// One selectable variant in an ambiguous scan, carrying what the terminal
/// shows on the picker button: display name plus attribute combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantChoice {
    pub variant_id: VariantId,
    pub display_name: String,
    pub attribute_label: String,
}

impl From<&VariantHit> for VariantChoice {
    fn from(hit: &VariantHit) -> Self {
        Self {
            variant_id: hit.variant_id,
            display_name: hit.display_name.clone(),
            attribute_label: hit.attribute_label.clone(),
        }
    }
}

/// Outcome of resolving a scanned code.
///
/// Ambiguity is a first-class result, not an error: the caller prompts the
/// user and adds the chosen variant to the order. "No match at all" is the
/// only failure ([`DomainError::NotFound`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// The code names exactly one variant.
    Found(VariantId),
    /// The code is shared by several variants of one sharing-enabled
    /// template; the caller must disambiguate.
    Ambiguous {
        template_id: TemplateId,
        options: Vec<VariantChoice>,
    },
}

/// Resolve a scanned barcode to a variant identity or an ambiguity payload.
///
/// Candidates are all variants carrying the code (POS-filtered when
/// `pos_only`). When no variant carries the code directly, templates whose
/// `shared_barcode` equals the code supply their variants instead — this
/// covers codes entered on the template before any cascade ran.
///
/// Several candidates under a single sharing-enabled template are the
/// expected ambiguity. Any other multi-match shape is a data conflict that
/// the uniqueness policy should have prevented; it resolves to the first
/// candidate in record-identity order so the till keeps working, and logs a
/// warning.
pub fn resolve_by_barcode<L: BarcodeLookup>(
    lookup: &L,
    code: &Barcode,
    pos_only: bool,
) -> DomainResult<Resolution> {
    let mut hits = lookup.find_by_barcode(code, pos_only);

    if hits.is_empty() {
        hits = lookup
            .shared_templates_with_code(code, pos_only)
            .into_iter()
            .flat_map(|t| t.variants)
            .collect();
    }

    // Record-identity order: UUIDv7 variant ids sort by creation time.
    hits.sort_by_key(|h| h.variant_id);

    match hits.as_slice() {
        [] => Err(DomainError::not_found()),
        [only] => Ok(Resolution::Found(only.variant_id)),
        [first, rest @ ..] => {
            let one_template = rest.iter().all(|h| h.template_id == first.template_id);

            if one_template && first.template_uses_shared_barcode {
                return Ok(Resolution::Ambiguous {
                    template_id: first.template_id,
                    options: hits.iter().map(VariantChoice::from).collect(),
                });
            }

            // Duplicates across templates, or within one template that never
            // opted into sharing. The uniqueness policy should have blocked
            // this; degrade to the first match so the scan still lands.
            tracing::warn!(
                barcode = %code,
                matches = hits.len(),
                "barcode matches conflicting variants; falling back to first by record identity"
            );
            Ok(Resolution::Found(first.variant_id))
        }
    }
}
