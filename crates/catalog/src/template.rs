use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use varscan_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use varscan_events::Event;

use crate::barcode::Barcode;
use crate::variant::{ProductVariant, VariantId};

/// Product template identifier.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TemplateId(pub AggregateId);

impl TemplateId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: ProductTemplate.
///
/// The template owns its variants, which is what makes the shared-barcode
/// cascade atomic: one applied event rewrites the whole variant set, so a
/// partially cascaded template is never observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductTemplate {
    id: TemplateId,
    name: String,
    shared_barcode: Option<Barcode>,
    use_shared_barcode: bool,
    variants: Vec<ProductVariant>,
    version: u64,
    created: bool,
}

impl ProductTemplate {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TemplateId) -> Self {
        Self {
            id,
            name: String::new(),
            shared_barcode: None,
            use_shared_barcode: false,
            variants: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TemplateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shared_barcode(&self) -> Option<&Barcode> {
        self.shared_barcode.as_ref()
    }

    pub fn use_shared_barcode(&self) -> bool {
        self.use_shared_barcode
    }

    pub fn variants(&self) -> &[ProductVariant] {
        &self.variants
    }

    pub fn variant(&self, variant_id: VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.variant_id == variant_id)
    }

    /// Sharing is active only when the flag is set *and* a shared code exists;
    /// a set flag with no code cascades nothing.
    pub fn sharing_active(&self) -> bool {
        self.use_shared_barcode && self.shared_barcode.is_some()
    }
}

impl AggregateRoot for ProductTemplate {
    type Id = TemplateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTemplate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTemplate {
    pub template_id: TemplateId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddVariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddVariant {
    pub template_id: TemplateId,
    pub variant_id: VariantId,
    pub display_name: String,
    pub attribute_label: String,
    pub barcode: Option<Barcode>,
    pub available_in_pos: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetVariantBarcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetVariantBarcode {
    pub template_id: TemplateId,
    pub variant_id: VariantId,
    pub barcode: Option<Barcode>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetVariantPosAvailability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetVariantPosAvailability {
    pub template_id: TemplateId,
    pub variant_id: VariantId,
    pub available_in_pos: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetUseSharedBarcode (the product editor's sharing toggle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetUseSharedBarcode {
    pub template_id: TemplateId,
    pub value: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetSharedBarcode (the product editor's shared code field).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSharedBarcode {
    pub template_id: TemplateId,
    pub barcode: Option<Barcode>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateCommand {
    CreateTemplate(CreateTemplate),
    AddVariant(AddVariant),
    SetVariantBarcode(SetVariantBarcode),
    SetVariantPosAvailability(SetVariantPosAvailability),
    SetUseSharedBarcode(SetUseSharedBarcode),
    SetSharedBarcode(SetSharedBarcode),
}

impl TemplateCommand {
    /// The aggregate this command targets.
    pub fn template_id(&self) -> TemplateId {
        match self {
            TemplateCommand::CreateTemplate(cmd) => cmd.template_id,
            TemplateCommand::AddVariant(cmd) => cmd.template_id,
            TemplateCommand::SetVariantBarcode(cmd) => cmd.template_id,
            TemplateCommand::SetVariantPosAvailability(cmd) => cmd.template_id,
            TemplateCommand::SetUseSharedBarcode(cmd) => cmd.template_id,
            TemplateCommand::SetSharedBarcode(cmd) => cmd.template_id,
        }
    }
}

/// Event: TemplateCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCreated {
    pub template_id: TemplateId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VariantAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantAdded {
    pub template_id: TemplateId,
    pub variant_id: VariantId,
    pub display_name: String,
    pub attribute_label: String,
    pub barcode: Option<Barcode>,
    pub available_in_pos: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VariantBarcodeSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantBarcodeSet {
    pub template_id: TemplateId,
    pub variant_id: VariantId,
    pub barcode: Option<Barcode>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VariantPosAvailabilitySet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPosAvailabilitySet {
    pub template_id: TemplateId,
    pub variant_id: VariantId,
    pub available_in_pos: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UseSharedBarcodeSet. Applying this event performs the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseSharedBarcodeSet {
    pub template_id: TemplateId,
    pub value: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SharedBarcodeSet. Applying this event re-propagates when sharing
/// is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedBarcodeSet {
    pub template_id: TemplateId,
    pub barcode: Option<Barcode>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateEvent {
    TemplateCreated(TemplateCreated),
    VariantAdded(VariantAdded),
    VariantBarcodeSet(VariantBarcodeSet),
    VariantPosAvailabilitySet(VariantPosAvailabilitySet),
    UseSharedBarcodeSet(UseSharedBarcodeSet),
    SharedBarcodeSet(SharedBarcodeSet),
}

impl Event for TemplateEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TemplateEvent::TemplateCreated(_) => "catalog.template.created",
            TemplateEvent::VariantAdded(_) => "catalog.template.variant_added",
            TemplateEvent::VariantBarcodeSet(_) => "catalog.template.variant_barcode_set",
            TemplateEvent::VariantPosAvailabilitySet(_) => {
                "catalog.template.variant_pos_availability_set"
            }
            TemplateEvent::UseSharedBarcodeSet(_) => "catalog.template.use_shared_barcode_set",
            TemplateEvent::SharedBarcodeSet(_) => "catalog.template.shared_barcode_set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TemplateEvent::TemplateCreated(e) => e.occurred_at,
            TemplateEvent::VariantAdded(e) => e.occurred_at,
            TemplateEvent::VariantBarcodeSet(e) => e.occurred_at,
            TemplateEvent::VariantPosAvailabilitySet(e) => e.occurred_at,
            TemplateEvent::UseSharedBarcodeSet(e) => e.occurred_at,
            TemplateEvent::SharedBarcodeSet(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductTemplate {
    type Command = TemplateCommand;
    type Event = TemplateEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TemplateEvent::TemplateCreated(e) => {
                self.id = e.template_id;
                self.name = e.name.clone();
                self.shared_barcode = None;
                self.use_shared_barcode = false;
                self.variants = Vec::new();
                self.created = true;
            }
            TemplateEvent::VariantAdded(e) => {
                self.variants.push(ProductVariant {
                    variant_id: e.variant_id,
                    display_name: e.display_name.clone(),
                    attribute_label: e.attribute_label.clone(),
                    barcode: e.barcode.clone(),
                    available_in_pos: e.available_in_pos,
                });
            }
            TemplateEvent::VariantBarcodeSet(e) => {
                if let Some(variant) = self.variant_mut(e.variant_id) {
                    variant.barcode = e.barcode.clone();
                }
            }
            TemplateEvent::VariantPosAvailabilitySet(e) => {
                if let Some(variant) = self.variant_mut(e.variant_id) {
                    variant.available_in_pos = e.available_in_pos;
                }
            }
            TemplateEvent::UseSharedBarcodeSet(e) => {
                self.use_shared_barcode = e.value;
                self.cascade();
            }
            TemplateEvent::SharedBarcodeSet(e) => {
                self.shared_barcode = e.barcode.clone();
                if self.use_shared_barcode {
                    self.cascade();
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TemplateCommand::CreateTemplate(cmd) => self.handle_create(cmd),
            TemplateCommand::AddVariant(cmd) => self.handle_add_variant(cmd),
            TemplateCommand::SetVariantBarcode(cmd) => self.handle_set_variant_barcode(cmd),
            TemplateCommand::SetVariantPosAvailability(cmd) => {
                self.handle_set_variant_pos_availability(cmd)
            }
            TemplateCommand::SetUseSharedBarcode(cmd) => self.handle_set_use_shared_barcode(cmd),
            TemplateCommand::SetSharedBarcode(cmd) => self.handle_set_shared_barcode(cmd),
        }
    }
}

impl ProductTemplate {
    fn variant_mut(&mut self, variant_id: VariantId) -> Option<&mut ProductVariant> {
        self.variants.iter_mut().find(|v| v.variant_id == variant_id)
    }

    /// Rewrite every variant barcode from the current flag + shared code.
    ///
    /// Flag set with a code: copy the code onto every variant. Flag cleared:
    /// clear every variant. Flag set without a code: leave variants alone.
    fn cascade(&mut self) {
        if self.use_shared_barcode {
            if let Some(code) = self.shared_barcode.clone() {
                for variant in &mut self.variants {
                    variant.barcode = Some(code.clone());
                }
            }
        } else {
            for variant in &mut self.variants {
                variant.barcode = None;
            }
        }
    }

    /// Would `cascade()` change any variant, given a hypothetical flag value?
    fn cascade_would_change(&self, use_shared: bool) -> bool {
        if use_shared {
            match &self.shared_barcode {
                Some(code) => self
                    .variants
                    .iter()
                    .any(|v| v.barcode.as_ref() != Some(code)),
                None => false,
            }
        } else {
            self.variants.iter().any(|v| v.barcode.is_some())
        }
    }

    fn ensure_template_id(&self, template_id: TemplateId) -> Result<(), DomainError> {
        if self.id != template_id {
            return Err(DomainError::invariant("template_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateTemplate) -> Result<Vec<TemplateEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("template already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![TemplateEvent::TemplateCreated(TemplateCreated {
            template_id: cmd.template_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_variant(&self, cmd: &AddVariant) -> Result<Vec<TemplateEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_template_id(cmd.template_id)?;

        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }

        if self.variant(cmd.variant_id).is_some() {
            return Err(DomainError::conflict("variant already exists"));
        }

        // A variant admitted while sharing is active carries the shared code,
        // otherwise the shared-mode invariant would be false until the next
        // cascade.
        let barcode = if self.sharing_active() {
            self.shared_barcode.clone()
        } else {
            cmd.barcode.clone()
        };

        Ok(vec![TemplateEvent::VariantAdded(VariantAdded {
            template_id: cmd.template_id,
            variant_id: cmd.variant_id,
            display_name: cmd.display_name.clone(),
            attribute_label: cmd.attribute_label.clone(),
            barcode,
            available_in_pos: cmd.available_in_pos,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_variant_barcode(
        &self,
        cmd: &SetVariantBarcode,
    ) -> Result<Vec<TemplateEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_template_id(cmd.template_id)?;

        let Some(variant) = self.variant(cmd.variant_id) else {
            return Err(DomainError::not_found());
        };

        if variant.barcode == cmd.barcode {
            return Ok(vec![]);
        }

        Ok(vec![TemplateEvent::VariantBarcodeSet(VariantBarcodeSet {
            template_id: cmd.template_id,
            variant_id: cmd.variant_id,
            barcode: cmd.barcode.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_variant_pos_availability(
        &self,
        cmd: &SetVariantPosAvailability,
    ) -> Result<Vec<TemplateEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_template_id(cmd.template_id)?;

        let Some(variant) = self.variant(cmd.variant_id) else {
            return Err(DomainError::not_found());
        };

        if variant.available_in_pos == cmd.available_in_pos {
            return Ok(vec![]);
        }

        Ok(vec![TemplateEvent::VariantPosAvailabilitySet(
            VariantPosAvailabilitySet {
                template_id: cmd.template_id,
                variant_id: cmd.variant_id,
                available_in_pos: cmd.available_in_pos,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_set_use_shared_barcode(
        &self,
        cmd: &SetUseSharedBarcode,
    ) -> Result<Vec<TemplateEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_template_id(cmd.template_id)?;

        // Idempotent: nothing to record when the flag and every variant
        // barcode already match the target state.
        if self.use_shared_barcode == cmd.value && !self.cascade_would_change(cmd.value) {
            return Ok(vec![]);
        }

        Ok(vec![TemplateEvent::UseSharedBarcodeSet(UseSharedBarcodeSet {
            template_id: cmd.template_id,
            value: cmd.value,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_shared_barcode(
        &self,
        cmd: &SetSharedBarcode,
    ) -> Result<Vec<TemplateEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_template_id(cmd.template_id)?;

        let repropagates = self.use_shared_barcode
            && cmd.barcode.is_some()
            && self
                .variants
                .iter()
                .any(|v| v.barcode != cmd.barcode);

        if self.shared_barcode == cmd.barcode && !repropagates {
            return Ok(vec![]);
        }

        Ok(vec![TemplateEvent::SharedBarcodeSet(SharedBarcodeSet {
            template_id: cmd.template_id,
            barcode: cmd.barcode.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
