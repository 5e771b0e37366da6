//! Integration tests for the full pipeline:
//! Command → EventStore → BarcodeIndex → resolution / uniqueness validation.

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::Utc;

    use varscan_catalog::{
        AddVariant, Barcode, BarcodeClaim, CreateTemplate, SetSharedBarcode, SetUseSharedBarcode,
        SetVariantBarcode, SetVariantPosAvailability, TemplateCommand, TemplateId, VariantId,
    };
    use varscan_core::{AggregateId, DomainError, EntityId};
    use varscan_events::ProjectionRunner;
    use varscan_pos::Resolution;

    use crate::catalog_service::{CatalogService, DispatchError};
    use crate::event_store::{EventStore, InMemoryEventStore};
    use crate::projections::BarcodeIndex;

    fn service() -> CatalogService<InMemoryEventStore> {
        CatalogService::new(InMemoryEventStore::new())
    }

    fn barcode(s: &str) -> Barcode {
        Barcode::new(s).unwrap()
    }

    fn create_template(service: &CatalogService<InMemoryEventStore>, name: &str) -> TemplateId {
        let template_id = TemplateId::new(AggregateId::new());
        service
            .execute(&TemplateCommand::CreateTemplate(CreateTemplate {
                template_id,
                name: name.to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        template_id
    }

    fn add_variant(
        service: &CatalogService<InMemoryEventStore>,
        template_id: TemplateId,
        label: &str,
        code: Option<&str>,
    ) -> VariantId {
        let variant_id = VariantId::new(EntityId::new());
        service
            .execute(&TemplateCommand::AddVariant(AddVariant {
                template_id,
                variant_id,
                display_name: "T-Shirt".to_string(),
                attribute_label: label.to_string(),
                barcode: code.map(barcode),
                available_in_pos: true,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        variant_id
    }

    fn set_shared(
        service: &CatalogService<InMemoryEventStore>,
        template_id: TemplateId,
        code: &str,
    ) {
        service
            .execute(&TemplateCommand::SetSharedBarcode(SetSharedBarcode {
                template_id,
                barcode: Some(barcode(code)),
                occurred_at: Utc::now(),
            }))
            .unwrap();
    }

    fn toggle_sharing(
        service: &CatalogService<InMemoryEventStore>,
        template_id: TemplateId,
        value: bool,
    ) -> usize {
        service
            .execute(&TemplateCommand::SetUseSharedBarcode(SetUseSharedBarcode {
                template_id,
                value,
                occurred_at: Utc::now(),
            }))
            .unwrap()
            .len()
    }

    #[test]
    fn worked_example_shared_code_cascades_and_scans_ambiguous() -> Result<()> {
        let service = service();
        let t = create_template(&service, "T-Shirt");
        let v1 = add_variant(&service, t, "Red, M", None);
        let v2 = add_variant(&service, t, "Blue, L", None);

        set_shared(&service, t, "123");
        toggle_sharing(&service, t, true);

        // Every variant now carries the shared code.
        let template = service.load_template(t)?;
        assert!(template
            .variants()
            .iter()
            .all(|v| v.barcode == Some(barcode("123"))));

        // Scanning it is ambiguous, listing both variants for the picker.
        match service.resolve_by_barcode(&barcode("123"), true)? {
            Resolution::Ambiguous {
                template_id,
                options,
            } => {
                assert_eq!(template_id, t);
                assert_eq!(
                    options.iter().map(|o| o.variant_id).collect::<Vec<_>>(),
                    vec![v1, v2]
                );
                assert_eq!(options[0].attribute_label, "Red, M");
                assert_eq!(options[1].attribute_label, "Blue, L");
            }
            other => panic!("Expected Ambiguous, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn unique_barcode_resolves_to_single_variant() -> Result<()> {
        let service = service();
        let t = create_template(&service, "Mug");
        let v = add_variant(&service, t, "", Some("4006381333931"));

        assert_eq!(
            service.resolve_by_barcode(&barcode("4006381333931"), true)?,
            Resolution::Found(v)
        );
        Ok(())
    }

    #[test]
    fn unknown_code_is_not_found() {
        let service = service();
        create_template(&service, "Mug");

        match service.resolve_by_barcode(&barcode("0000000"), false) {
            Err(DispatchError::Domain(DomainError::NotFound)) => {}
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn pos_restriction_hides_non_pos_variants() -> Result<()> {
        let service = service();
        let t = create_template(&service, "Poster");
        let v1 = add_variant(&service, t, "A2", None);
        let v2 = add_variant(&service, t, "A1", None);
        set_shared(&service, t, "555");
        toggle_sharing(&service, t, true);

        service
            .execute(&TemplateCommand::SetVariantPosAvailability(
                SetVariantPosAvailability {
                    template_id: t,
                    variant_id: v2,
                    available_in_pos: false,
                    occurred_at: Utc::now(),
                },
            ))
            .unwrap();

        // Only one POS candidate left: the scan resolves directly.
        assert_eq!(
            service.resolve_by_barcode(&barcode("555"), true)?,
            Resolution::Found(v1)
        );
        // Without the POS filter both still surface.
        assert!(matches!(
            service.resolve_by_barcode(&barcode("555"), false)?,
            Resolution::Ambiguous { .. }
        ));
        Ok(())
    }

    #[test]
    fn disabling_sharing_clears_codes_and_reenabling_restores_them() -> Result<()> {
        let service = service();
        let t = create_template(&service, "T-Shirt");
        add_variant(&service, t, "Red, M", None);
        add_variant(&service, t, "Blue, L", None);
        set_shared(&service, t, "123");
        toggle_sharing(&service, t, true);

        toggle_sharing(&service, t, false);
        let cleared = service.load_template(t)?;
        assert!(cleared.variants().iter().all(|v| v.barcode.is_none()));
        assert!(matches!(
            service.resolve_by_barcode(&barcode("123"), false),
            Err(DispatchError::Domain(DomainError::NotFound))
        ));

        // Round-trip: same code comes back on every variant.
        toggle_sharing(&service, t, true);
        let restored = service.load_template(t)?;
        assert!(restored
            .variants()
            .iter()
            .all(|v| v.barcode == Some(barcode("123"))));
        assert!(matches!(
            service.resolve_by_barcode(&barcode("123"), false)?,
            Resolution::Ambiguous { .. }
        ));
        Ok(())
    }

    #[test]
    fn cascade_commands_are_idempotent_through_the_service() {
        let service = service();
        let t = create_template(&service, "T-Shirt");
        add_variant(&service, t, "Red, M", None);
        set_shared(&service, t, "123");

        assert_eq!(toggle_sharing(&service, t, true), 1);
        // Same command again: no events, no store growth.
        assert_eq!(toggle_sharing(&service, t, true), 0);

        let history = service.store().load_stream(t.0).unwrap();
        let before = history.len();
        assert_eq!(toggle_sharing(&service, t, true), 0);
        assert_eq!(service.store().load_stream(t.0).unwrap().len(), before);
    }

    #[test]
    fn duplicate_barcode_across_templates_blocks_the_save() {
        let service = service();
        let t1 = create_template(&service, "Mug");
        add_variant(&service, t1, "", Some("777"));

        let t2 = create_template(&service, "Glass");
        let v2 = add_variant(&service, t2, "", None);

        let claim = BarcodeClaim {
            variant_id: v2,
            template_id: t2,
            template_uses_shared_barcode: false,
            barcode: Some(barcode("777")),
        };
        match service.validate_barcode_uniqueness(&claim) {
            Err(DispatchError::Domain(DomainError::DuplicateBarcode(code))) => {
                assert_eq!(code, "777");
            }
            other => panic!("Expected DuplicateBarcode, got {other:?}"),
        }
    }

    #[test]
    fn shared_siblings_pass_uniqueness_validation() {
        let service = service();
        let t = create_template(&service, "T-Shirt");
        let v1 = add_variant(&service, t, "Red, M", None);
        add_variant(&service, t, "Blue, L", None);
        set_shared(&service, t, "123");
        toggle_sharing(&service, t, true);

        let claim = BarcodeClaim {
            variant_id: v1,
            template_id: t,
            template_uses_shared_barcode: true,
            barcode: Some(barcode("123")),
        };
        service.validate_barcode_uniqueness(&claim).unwrap();
    }

    #[test]
    fn template_level_fallback_finds_drifted_shared_templates() -> Result<()> {
        let service = service();
        let t = create_template(&service, "T-Shirt");
        let v1 = add_variant(&service, t, "Red, M", None);
        let v2 = add_variant(&service, t, "Blue, L", None);
        set_shared(&service, t, "123");
        toggle_sharing(&service, t, true);

        // Manual edits move both variants off the shared code.
        for (v, code) in [(v1, "888"), (v2, "999")] {
            service
                .execute(&TemplateCommand::SetVariantBarcode(SetVariantBarcode {
                    template_id: t,
                    variant_id: v,
                    barcode: Some(barcode(code)),
                    occurred_at: Utc::now(),
                }))
                .unwrap();
        }

        // No variant carries "123" anymore, but the template still does:
        // scanning it surfaces the template's variants for disambiguation.
        match service.resolve_by_barcode(&barcode("123"), false)? {
            Resolution::Ambiguous {
                template_id,
                options,
            } => {
                assert_eq!(template_id, t);
                assert_eq!(options.len(), 2);
            }
            other => panic!("Expected Ambiguous, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn rebuilt_index_answers_like_the_live_one() -> Result<()> {
        let service = service();
        let t = create_template(&service, "T-Shirt");
        add_variant(&service, t, "Red, M", None);
        add_variant(&service, t, "Blue, L", None);
        set_shared(&service, t, "123");
        toggle_sharing(&service, t, true);

        // Replay the persisted stream into a fresh index.
        let history = service.store().load_stream(t.0).unwrap();
        let envelopes: Vec<_> = history
            .iter()
            .map(|stored| {
                let event: varscan_catalog::TemplateEvent =
                    serde_json::from_value(stored.payload.clone()).unwrap();
                varscan_events::EventEnvelope::new(
                    stored.event_id,
                    stored.aggregate_id,
                    stored.aggregate_type.clone(),
                    stored.sequence_number,
                    event,
                )
            })
            .collect();
        let rebuilt =
            ProjectionRunner::rebuild_from_scratch(BarcodeIndex::new, envelopes.iter()).unwrap();

        let live = service.resolve_by_barcode(&barcode("123"), false)?;
        let replayed = varscan_pos::resolve_by_barcode(&rebuilt, &barcode("123"), false)
            .map_err(DispatchError::Domain)?;
        assert_eq!(live, replayed);
        Ok(())
    }

    #[test]
    fn service_works_over_a_shared_store_handle() {
        let store = std::sync::Arc::new(InMemoryEventStore::new());
        let service = CatalogService::new(store.clone());

        let template_id = TemplateId::new(AggregateId::new());
        service
            .execute(&TemplateCommand::CreateTemplate(CreateTemplate {
                template_id,
                name: "Mug".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();

        // The same store handle sees the appended history from outside.
        assert_eq!(store.load_stream(template_id.0).unwrap().len(), 1);
    }

    #[test]
    fn two_templates_sharing_across_is_resolved_deterministically() -> Result<()> {
        // Cross-template duplicate: possible only when uniqueness validation
        // was bypassed. The scan still lands, on the earliest variant.
        let service = service();
        let t1 = create_template(&service, "Mug");
        let v1 = add_variant(&service, t1, "", Some("42"));
        let t2 = create_template(&service, "Glass");
        add_variant(&service, t2, "", Some("42"));

        assert_eq!(
            service.resolve_by_barcode(&barcode("42"), false)?,
            Resolution::Found(v1)
        );
        Ok(())
    }
}
