use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type SlotMap = BTreeMap<String, SlotValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TemplateId {
    Hero,
    Alert,
    DataSummary,
    Form,
    List,
    Simple,
    FlightUpdate,
    Weather,
    StockUpdate,
    RestaurantDetails,
    PopupAction,
    Unrecognized,
}

impl TemplateId {
    pub const CATALOGUE: [TemplateId; 11] = [
        Self::Hero,
        Self::Alert,
        Self::DataSummary,
        Self::Form,
        Self::List,
        Self::Simple,
        Self::FlightUpdate,
        Self::Weather,
        Self::StockUpdate,
        Self::RestaurantDetails,
        Self::PopupAction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hero => "Hero",
            Self::Alert => "Alert",
            Self::DataSummary => "DataSummary",
            Self::Form => "Form",
            Self::List => "List",
            Self::Simple => "Simple",
            Self::FlightUpdate => "FlightUpdate",
            Self::Weather => "Weather",
            Self::StockUpdate => "StockUpdate",
            Self::RestaurantDetails => "RestaurantDetails",
            Self::PopupAction => "PopupAction",
            Self::Unrecognized => "Unrecognized",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Hero => "Hero",
            Self::Alert => "Alert",
            Self::DataSummary => "Data Summary",
            Self::Form => "Form",
            Self::List => "List",
            Self::Simple => "Simple",
            Self::FlightUpdate => "Flight Update",
            Self::Weather => "Weather",
            Self::StockUpdate => "Stock Update",
            Self::RestaurantDetails => "Restaurant Details",
            Self::PopupAction => "Popup Action",
            Self::Unrecognized => "Unrecognized",
        }
    }

    /// Accepts `FlightUpdate`, `flight_update`, `flight-update` and similar spellings.
    pub fn parse(value: &str) -> Option<Self> {
        let wanted = value
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();

        Self::CATALOGUE
            .into_iter()
            .chain(std::iter::once(Self::Unrecognized))
            .find(|id| id.as_str().to_lowercase() == wanted)
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "values")]
pub enum SlotType {
    Text,
    Number,
    Date,
    Identifier,
    Enum(&'static [&'static str]),
    List,
}

impl SlotType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Identifier => "identifier",
            Self::Enum(_) => "enum",
            Self::List => "list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotValue {
    Number(f64),
    Date(NaiveDate),
    Text(String),
    List(Vec<String>),
}

impl SlotValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Number(value) => format_number(*value),
            Self::Date(date) => date.format("%Y-%m-%d").to_string(),
            Self::Text(value) => value.clone(),
            Self::List(values) => values.join(", "),
        }
    }
}

impl From<&str> for SlotValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SlotValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for SlotValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<NaiveDate> for SlotValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<Vec<String>> for SlotValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedSlots(SlotMap);

impl ExtractedSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<SlotValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&SlotValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(SlotValue::as_text)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SlotValue)> {
        self.0.iter()
    }

    pub fn extend(&mut self, other: ExtractedSlots) {
        self.0.extend(other.0);
    }

    pub fn into_map(self) -> SlotMap {
        self.0
    }
}

impl From<SlotMap> for ExtractedSlots {
    fn from(map: SlotMap) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, SlotValue)> for ExtractedSlots {
    fn from_iter<T: IntoIterator<Item = (String, SlotValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub previous_template_id: TemplateId,
    #[serde(default)]
    pub previous_slots: ExtractedSlots,
}

impl ConversationContext {
    pub fn from_payload(payload: &CardPayload) -> Option<Self> {
        if payload.status != CardStatus::Complete {
            return None;
        }

        Some(Self {
            previous_template_id: payload.template_id,
            previous_slots: ExtractedSlots::from(payload.slots.clone()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ConversationContext>,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, context: ConversationContext) -> Self {
        self.context = Some(context);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Evidence {
    Phrase { phrase: &'static str },
    Shape { name: &'static str, matched: String },
    Topic { hits: Vec<&'static str> },
    Semantic { model: &'static str, similarity: f32 },
    FollowUp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub template_id: TemplateId,
    pub confidence: f32,
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Complete,
    Fallback,
}

impl CardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPayload {
    pub template_id: TemplateId,
    pub status: CardStatus,
    pub slots: SlotMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl CardPayload {
    pub fn is_complete(&self) -> bool {
        self.status == CardStatus::Complete
    }

    pub fn slot(&self, name: &str) -> Option<&SlotValue> {
        self.slots.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.slot(name).and_then(SlotValue::as_text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFieldKind {
    Text,
    Date,
    Number,
    Checkbox,
}

impl FormFieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Date => "date",
            Self::Number => "number",
            Self::Checkbox => "checkbox",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    pub label: String,
    pub kind: FormFieldKind,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    pub form_id: String,
    pub title: String,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub form_id: String,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}
