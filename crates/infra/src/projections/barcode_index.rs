use std::collections::{BTreeMap, BTreeSet, HashMap};

use varscan_catalog::{
    Barcode, BarcodeLookup, TemplateEvent, TemplateHit, TemplateId, VariantHit, VariantId,
};
use varscan_events::{EventEnvelope, Projection};

#[derive(Debug, Clone, PartialEq, Eq)]
struct VariantEntry {
    display_name: String,
    attribute_label: String,
    barcode: Option<Barcode>,
    available_in_pos: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TemplateEntry {
    shared_barcode: Option<Barcode>,
    use_shared_barcode: bool,
    variants: BTreeMap<VariantId, VariantEntry>,
}

impl TemplateEntry {
    /// Key under which this template is findable by its shared code, if any.
    fn shared_key(&self) -> Option<String> {
        if self.use_shared_barcode {
            self.shared_barcode.as_ref().map(|c| c.as_str().to_string())
        } else {
            None
        }
    }
}

/// Queryable barcode read model (the scanning pipeline's search primitive).
///
/// Maintains a mirror of each template plus two inverted maps: barcode →
/// variants carrying it, and shared code → sharing-enabled templates (the
/// resolution fallback). Disposable: rebuild by replaying catalog events.
#[derive(Debug, Default)]
pub struct BarcodeIndex {
    templates: HashMap<TemplateId, TemplateEntry>,
    /// Variants carrying each code, in record-identity order.
    by_barcode: HashMap<String, BTreeSet<(VariantId, TemplateId)>>,
    /// Sharing-enabled templates by their shared code.
    shared_codes: HashMap<String, BTreeSet<TemplateId>>,
}

impl BarcodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn reindex_variant(
        by_barcode: &mut HashMap<String, BTreeSet<(VariantId, TemplateId)>>,
        template_id: TemplateId,
        variant_id: VariantId,
        old: Option<&Barcode>,
        new: Option<&Barcode>,
    ) {
        if old == new {
            return;
        }
        if let Some(code) = old {
            if let Some(holders) = by_barcode.get_mut(code.as_str()) {
                holders.remove(&(variant_id, template_id));
                if holders.is_empty() {
                    by_barcode.remove(code.as_str());
                }
            }
        }
        if let Some(code) = new {
            by_barcode
                .entry(code.as_str().to_string())
                .or_default()
                .insert((variant_id, template_id));
        }
    }

    fn set_variant_barcode(
        &mut self,
        template_id: TemplateId,
        variant_id: VariantId,
        barcode: Option<Barcode>,
    ) {
        let Some(template) = self.templates.get_mut(&template_id) else {
            return;
        };
        let Some(variant) = template.variants.get_mut(&variant_id) else {
            return;
        };
        Self::reindex_variant(
            &mut self.by_barcode,
            template_id,
            variant_id,
            variant.barcode.as_ref(),
            barcode.as_ref(),
        );
        variant.barcode = barcode;
    }

    /// Mirror of the aggregate's cascade: rewrite every variant barcode from
    /// the template's current flag + shared code.
    fn cascade(&mut self, template_id: TemplateId) {
        let Some(template) = self.templates.get_mut(&template_id) else {
            return;
        };
        let target = if template.use_shared_barcode {
            match template.shared_barcode.clone() {
                Some(code) => Some(code),
                // Flag set without a code: cascade is a no-op.
                None => return,
            }
        } else {
            None
        };
        for (variant_id, variant) in template.variants.iter_mut() {
            Self::reindex_variant(
                &mut self.by_barcode,
                template_id,
                *variant_id,
                variant.barcode.as_ref(),
                target.as_ref(),
            );
            variant.barcode = target.clone();
        }
    }

    fn reindex_shared(
        &mut self,
        template_id: TemplateId,
        old: Option<String>,
        new: Option<String>,
    ) {
        if old == new {
            return;
        }
        if let Some(code) = old {
            if let Some(holders) = self.shared_codes.get_mut(&code) {
                holders.remove(&template_id);
                if holders.is_empty() {
                    self.shared_codes.remove(&code);
                }
            }
        }
        if let Some(code) = new {
            self.shared_codes.entry(code).or_default().insert(template_id);
        }
    }

    fn shared_key_of(&self, template_id: TemplateId) -> Option<String> {
        self.templates
            .get(&template_id)
            .and_then(TemplateEntry::shared_key)
    }

    fn hit_for(
        template_id: TemplateId,
        template: &TemplateEntry,
        variant_id: VariantId,
        variant: &VariantEntry,
    ) -> VariantHit {
        VariantHit {
            variant_id,
            template_id,
            display_name: variant.display_name.clone(),
            attribute_label: variant.attribute_label.clone(),
            available_in_pos: variant.available_in_pos,
            template_uses_shared_barcode: template.use_shared_barcode,
        }
    }
}

impl Projection for BarcodeIndex {
    type Ev = TemplateEvent;

    fn apply(&mut self, envelope: &EventEnvelope<TemplateEvent>) {
        match envelope.payload() {
            TemplateEvent::TemplateCreated(e) => {
                self.templates.insert(e.template_id, TemplateEntry::default());
            }
            TemplateEvent::VariantAdded(e) => {
                let template = self.templates.entry(e.template_id).or_default();
                template.variants.insert(
                    e.variant_id,
                    VariantEntry {
                        display_name: e.display_name.clone(),
                        attribute_label: e.attribute_label.clone(),
                        barcode: None,
                        available_in_pos: e.available_in_pos,
                    },
                );
                self.set_variant_barcode(e.template_id, e.variant_id, e.barcode.clone());
            }
            TemplateEvent::VariantBarcodeSet(e) => {
                self.set_variant_barcode(e.template_id, e.variant_id, e.barcode.clone());
            }
            TemplateEvent::VariantPosAvailabilitySet(e) => {
                if let Some(template) = self.templates.get_mut(&e.template_id) {
                    if let Some(variant) = template.variants.get_mut(&e.variant_id) {
                        variant.available_in_pos = e.available_in_pos;
                    }
                }
            }
            TemplateEvent::UseSharedBarcodeSet(e) => {
                let old_key = self.shared_key_of(e.template_id);
                if let Some(template) = self.templates.get_mut(&e.template_id) {
                    template.use_shared_barcode = e.value;
                }
                self.cascade(e.template_id);
                let new_key = self.shared_key_of(e.template_id);
                self.reindex_shared(e.template_id, old_key, new_key);
            }
            TemplateEvent::SharedBarcodeSet(e) => {
                let old_key = self.shared_key_of(e.template_id);
                let sharing = match self.templates.get_mut(&e.template_id) {
                    Some(template) => {
                        template.shared_barcode = e.barcode.clone();
                        template.use_shared_barcode
                    }
                    None => return,
                };
                if sharing {
                    self.cascade(e.template_id);
                }
                let new_key = self.shared_key_of(e.template_id);
                self.reindex_shared(e.template_id, old_key, new_key);
            }
        }
    }
}

impl BarcodeLookup for BarcodeIndex {
    fn find_by_barcode(&self, code: &Barcode, pos_only: bool) -> Vec<VariantHit> {
        let Some(holders) = self.by_barcode.get(code.as_str()) else {
            return Vec::new();
        };
        holders
            .iter()
            .filter_map(|(variant_id, template_id)| {
                let template = self.templates.get(template_id)?;
                let variant = template.variants.get(variant_id)?;
                (!pos_only || variant.available_in_pos)
                    .then(|| Self::hit_for(*template_id, template, *variant_id, variant))
            })
            .collect()
    }

    fn shared_templates_with_code(&self, code: &Barcode, pos_only: bool) -> Vec<TemplateHit> {
        let Some(holders) = self.shared_codes.get(code.as_str()) else {
            return Vec::new();
        };
        holders
            .iter()
            .filter_map(|template_id| {
                let template = self.templates.get(template_id)?;
                let variants = template
                    .variants
                    .iter()
                    .filter(|(_, v)| !pos_only || v.available_in_pos)
                    .map(|(variant_id, variant)| {
                        Self::hit_for(*template_id, template, *variant_id, variant)
                    })
                    .collect();
                Some(TemplateHit {
                    template_id: *template_id,
                    variants,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;
    use varscan_catalog::{
        SharedBarcodeSet, TemplateCreated, UseSharedBarcodeSet, VariantAdded, VariantBarcodeSet,
    };
    use varscan_core::{AggregateId, EntityId};

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn barcode(s: &str) -> Barcode {
        Barcode::new(s).unwrap()
    }

    /// Applies events to the index with per-template sequence numbering.
    struct Feeder {
        index: BarcodeIndex,
        sequences: HashMap<TemplateId, u64>,
    }

    impl Feeder {
        fn new() -> Self {
            Self {
                index: BarcodeIndex::new(),
                sequences: HashMap::new(),
            }
        }

        fn feed(&mut self, template_id: TemplateId, event: TemplateEvent) {
            let seq = self.sequences.entry(template_id).or_insert(0);
            *seq += 1;
            self.index.apply(&EventEnvelope::new(
                Uuid::now_v7(),
                template_id.0,
                "catalog.template",
                *seq,
                event,
            ));
        }

        fn template(&mut self) -> TemplateId {
            let template_id = TemplateId::new(AggregateId::new());
            self.feed(
                template_id,
                TemplateEvent::TemplateCreated(TemplateCreated {
                    template_id,
                    name: "T-Shirt".to_string(),
                    occurred_at: test_time(),
                }),
            );
            template_id
        }

        fn variant(&mut self, template_id: TemplateId, code: Option<&str>) -> VariantId {
            let variant_id = VariantId::new(EntityId::new());
            self.feed(
                template_id,
                TemplateEvent::VariantAdded(VariantAdded {
                    template_id,
                    variant_id,
                    display_name: "T-Shirt".to_string(),
                    attribute_label: "Red, M".to_string(),
                    barcode: code.map(barcode),
                    available_in_pos: true,
                    occurred_at: test_time(),
                }),
            );
            variant_id
        }

        fn enable_sharing(&mut self, template_id: TemplateId, code: &str) {
            self.feed(
                template_id,
                TemplateEvent::SharedBarcodeSet(SharedBarcodeSet {
                    template_id,
                    barcode: Some(barcode(code)),
                    occurred_at: test_time(),
                }),
            );
            self.feed(
                template_id,
                TemplateEvent::UseSharedBarcodeSet(UseSharedBarcodeSet {
                    template_id,
                    value: true,
                    occurred_at: test_time(),
                }),
            );
        }
    }

    #[test]
    fn indexed_variant_is_found_with_its_metadata() {
        let mut feeder = Feeder::new();
        let t = feeder.template();
        let v = feeder.variant(t, Some("111"));

        let hits = feeder.index.find_by_barcode(&barcode("111"), false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].variant_id, v);
        assert_eq!(hits[0].template_id, t);
        assert_eq!(hits[0].attribute_label, "Red, M");
        assert!(!hits[0].template_uses_shared_barcode);
    }

    #[test]
    fn cascade_moves_variants_between_codes() {
        let mut feeder = Feeder::new();
        let t = feeder.template();
        let v1 = feeder.variant(t, Some("111"));
        let v2 = feeder.variant(t, Some("222"));

        feeder.enable_sharing(t, "123");

        assert!(feeder.index.find_by_barcode(&barcode("111"), false).is_empty());
        assert!(feeder.index.find_by_barcode(&barcode("222"), false).is_empty());

        let hits = feeder.index.find_by_barcode(&barcode("123"), false);
        assert_eq!(
            hits.iter().map(|h| h.variant_id).collect::<Vec<_>>(),
            vec![v1, v2]
        );
        assert!(hits.iter().all(|h| h.template_uses_shared_barcode));
    }

    #[test]
    fn disabling_sharing_empties_the_code_and_fallback_registry() {
        let mut feeder = Feeder::new();
        let t = feeder.template();
        feeder.variant(t, None);
        feeder.enable_sharing(t, "123");

        feeder.feed(
            t,
            TemplateEvent::UseSharedBarcodeSet(UseSharedBarcodeSet {
                template_id: t,
                value: false,
                occurred_at: test_time(),
            }),
        );

        assert!(feeder.index.find_by_barcode(&barcode("123"), false).is_empty());
        assert!(feeder
            .index
            .shared_templates_with_code(&barcode("123"), false)
            .is_empty());
    }

    #[test]
    fn shared_code_registry_backs_the_fallback_search() {
        let mut feeder = Feeder::new();
        let t = feeder.template();
        let v1 = feeder.variant(t, None);
        let v2 = feeder.variant(t, None);
        feeder.enable_sharing(t, "123");

        // Variants drift away from the shared code; the template itself is
        // still findable by it.
        for v in [v1, v2] {
            feeder.feed(
                t,
                TemplateEvent::VariantBarcodeSet(VariantBarcodeSet {
                    template_id: t,
                    variant_id: v,
                    barcode: Some(barcode(&format!("999-{v}"))),
                    occurred_at: test_time(),
                }),
            );
        }

        assert!(feeder.index.find_by_barcode(&barcode("123"), false).is_empty());
        let templates = feeder
            .index
            .shared_templates_with_code(&barcode("123"), false);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].template_id, t);
        assert_eq!(templates[0].variants.len(), 2);
    }

    #[test]
    fn changing_shared_code_reregisters_the_template() {
        let mut feeder = Feeder::new();
        let t = feeder.template();
        feeder.variant(t, None);
        feeder.enable_sharing(t, "123");

        feeder.feed(
            t,
            TemplateEvent::SharedBarcodeSet(SharedBarcodeSet {
                template_id: t,
                barcode: Some(barcode("456")),
                occurred_at: test_time(),
            }),
        );

        assert!(feeder
            .index
            .shared_templates_with_code(&barcode("123"), false)
            .is_empty());
        assert_eq!(
            feeder
                .index
                .shared_templates_with_code(&barcode("456"), false)
                .len(),
            1
        );
        // The cascade re-propagated too.
        assert_eq!(feeder.index.find_by_barcode(&barcode("456"), false).len(), 1);
    }

    #[test]
    fn moving_a_code_between_variants_leaves_a_single_holder() {
        let mut feeder = Feeder::new();
        let t = feeder.template();
        let v1 = feeder.variant(t, Some("777"));
        let v2 = feeder.variant(t, None);

        feeder.feed(
            t,
            TemplateEvent::VariantBarcodeSet(VariantBarcodeSet {
                template_id: t,
                variant_id: v1,
                barcode: None,
                occurred_at: test_time(),
            }),
        );
        feeder.feed(
            t,
            TemplateEvent::VariantBarcodeSet(VariantBarcodeSet {
                template_id: t,
                variant_id: v2,
                barcode: Some(barcode("777")),
                occurred_at: test_time(),
            }),
        );

        let hits = feeder.index.find_by_barcode(&barcode("777"), false);
        assert_eq!(hits.iter().map(|h| h.variant_id).collect::<Vec<_>>(), vec![v2]);
    }
}
