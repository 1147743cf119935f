pub mod adaptive;
pub mod classify;
pub mod error;
pub mod extract;
pub mod forms;
pub mod intent;
pub mod models;
pub mod policy;
pub mod registry;
pub mod render;
pub mod templates;

pub use adaptive::to_adaptive_card;
pub use classify::{SemanticScorer, TemplateClassifier};
pub use error::CardError;
pub use extract::SlotExtractor;
pub use intent::{is_follow_up, normalize_text, tokenize};
pub use models::*;
pub use policy::DispatchPolicy;
pub use registry::{
    RenderHook, SlotRule, SlotSpec, TemplateDefinition, TemplateRegistry,
    TemplateRegistryBuilder, TriggerDescriptor,
};
pub use render::render_card;
