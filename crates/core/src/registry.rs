use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::error::CardError;
use crate::models::{SlotMap, SlotType, SlotValue, TemplateId};
use crate::render::coerce;
use crate::templates;

pub type RenderHook = fn(&mut SlotMap);

pub const PHRASE_BAND: (f32, f32) = (0.8, 1.0);
pub const SHAPE_BAND: (f32, f32) = (0.5, 0.8);

#[derive(Debug, Clone)]
pub enum TriggerDescriptor {
    Phrases {
        phrases: &'static [&'static str],
        weight: f32,
    },
    Shape {
        name: &'static str,
        pattern: Regex,
        context: &'static [&'static str],
        weight: f32,
    },
    Topic { vocabulary: &'static [&'static str] },
}

impl TriggerDescriptor {
    pub fn phrases(phrases: &'static [&'static str], weight: f32) -> Self {
        Self::Phrases { phrases, weight }
    }

    pub fn shape(
        name: &'static str,
        pattern: &str,
        context: &'static [&'static str],
        weight: f32,
    ) -> Result<Self, regex::Error> {
        Ok(Self::Shape {
            name,
            pattern: Regex::new(pattern)?,
            context,
            weight,
        })
    }

    pub fn topic(vocabulary: &'static [&'static str]) -> Self {
        Self::Topic { vocabulary }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRule {
    Utterance,
    HeroTopic,
    HeroTitle,
    Severity,
    Component,
    Measurement,
    ReportTitle,
    Period,
    Amount,
    Trend,
    FormTitle,
    FormSubject,
    FormFields,
    ListTitle,
    Count,
    ListItems,
    FlightNumber,
    Place,
    IsoDate,
    When,
    Ticker,
    Cuisine,
    RestaurantQuery,
    PopupTool,
    PopupTitle,
    PopupText,
    PopupButton,
    Live,
    Derived,
}

#[derive(Debug, Clone)]
pub struct SlotSpec {
    pub name: &'static str,
    pub ty: SlotType,
    pub required: bool,
    pub default: Option<SlotValue>,
    pub rule: SlotRule,
    pub carry: bool,
}

impl SlotSpec {
    pub fn required(name: &'static str, ty: SlotType, rule: SlotRule) -> Self {
        Self {
            name,
            ty,
            required: true,
            default: None,
            rule,
            carry: false,
        }
    }

    pub fn optional(name: &'static str, ty: SlotType, rule: SlotRule) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty, rule)
        }
    }

    pub fn with_default(mut self, value: impl Into<SlotValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn carried(mut self) -> Self {
        self.carry = true;
        self
    }

    pub fn is_live(&self) -> bool {
        self.rule == SlotRule::Live
    }
}

#[derive(Debug, Clone)]
pub struct TemplateDefinition {
    pub id: TemplateId,
    pub triggers: Vec<TriggerDescriptor>,
    pub slots: Vec<SlotSpec>,
    pub render: RenderHook,
}

impl TemplateDefinition {
    pub fn new(id: TemplateId) -> Self {
        Self {
            id,
            triggers: Vec::new(),
            slots: Vec::new(),
            render: no_hook,
        }
    }

    pub fn trigger(mut self, descriptor: TriggerDescriptor) -> Self {
        self.triggers.push(descriptor);
        self
    }

    pub fn slot(mut self, spec: SlotSpec) -> Self {
        self.slots.push(spec);
        self
    }

    pub fn render_with(mut self, hook: RenderHook) -> Self {
        self.render = hook;
        self
    }

    pub fn slot_spec(&self, name: &str) -> Option<&SlotSpec> {
        self.slots.iter().find(|spec| spec.name == name)
    }

    pub fn required_slots(&self) -> impl Iterator<Item = &SlotSpec> {
        self.slots.iter().filter(|spec| spec.required)
    }

    pub fn has_required_slots(&self) -> bool {
        self.slots.iter().any(|spec| spec.required)
    }

    fn validate(&self) -> Result<(), CardError> {
        if self.id == TemplateId::Unrecognized {
            return Err(CardError::invalid(
                self.id,
                "the fallback pseudo-template cannot be registered",
            ));
        }

        if self.triggers.is_empty() {
            return Err(CardError::invalid(self.id, "no trigger descriptors"));
        }

        for trigger in &self.triggers {
            match trigger {
                TriggerDescriptor::Phrases { phrases, weight } => {
                    if phrases.is_empty() || !in_band(*weight, PHRASE_BAND, true) {
                        return Err(CardError::invalid(
                            self.id,
                            format!("phrase trigger weight {weight} outside {PHRASE_BAND:?}"),
                        ));
                    }
                }
                TriggerDescriptor::Shape { name, weight, .. } => {
                    if !in_band(*weight, SHAPE_BAND, false) {
                        return Err(CardError::invalid(
                            self.id,
                            format!("shape trigger {name} weight {weight} outside {SHAPE_BAND:?}"),
                        ));
                    }
                }
                TriggerDescriptor::Topic { vocabulary } => {
                    if vocabulary.is_empty() {
                        return Err(CardError::invalid(self.id, "empty topic vocabulary"));
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        for spec in &self.slots {
            if !seen.insert(spec.name) {
                return Err(CardError::invalid(
                    self.id,
                    format!("slot {} declared twice", spec.name),
                ));
            }

            if spec.required && spec.default.is_some() {
                return Err(CardError::invalid(
                    self.id,
                    format!("required slot {} cannot declare a default", spec.name),
                ));
            }

            if let Some(default) = &spec.default {
                if coerce(default, spec.ty).is_none() {
                    return Err(CardError::invalid(
                        self.id,
                        format!("default for {} is not a valid {}", spec.name, spec.ty.label()),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn no_hook(_: &mut SlotMap) {}

fn in_band(weight: f32, (low, high): (f32, f32), inclusive_high: bool) -> bool {
    weight >= low && if inclusive_high { weight <= high } else { weight < high }
}

#[derive(Debug, Default)]
pub struct TemplateRegistryBuilder {
    definitions: Vec<TemplateDefinition>,
}

impl TemplateRegistryBuilder {
    pub fn register(mut self, definition: TemplateDefinition) -> Result<Self, CardError> {
        definition.validate()?;

        if self
            .definitions
            .iter()
            .any(|existing| existing.id == definition.id)
        {
            return Err(CardError::DuplicateTemplate(definition.id));
        }

        self.definitions.push(definition);
        Ok(self)
    }

    pub fn build(self) -> TemplateRegistry {
        let index = self
            .definitions
            .iter()
            .enumerate()
            .map(|(position, definition)| (definition.id, position))
            .collect();

        TemplateRegistry {
            definitions: self.definitions,
            index,
        }
    }
}

#[derive(Debug)]
pub struct TemplateRegistry {
    definitions: Vec<TemplateDefinition>,
    index: HashMap<TemplateId, usize>,
}

impl TemplateRegistry {
    pub fn builder() -> TemplateRegistryBuilder {
        TemplateRegistryBuilder::default()
    }

    pub fn standard() -> Result<Self, CardError> {
        templates::catalogue()?
            .into_iter()
            .try_fold(Self::builder(), TemplateRegistryBuilder::register)
            .map(TemplateRegistryBuilder::build)
    }

    pub fn lookup(&self, id: TemplateId) -> Result<&TemplateDefinition, CardError> {
        self.index
            .get(&id)
            .map(|position| &self.definitions[*position])
            .ok_or(CardError::UnknownTemplate(id))
    }

    // Registration order. Only ever used as a tie-break.
    pub fn all(&self) -> &[TemplateDefinition] {
        &self.definitions
    }

    pub fn position(&self, id: TemplateId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
