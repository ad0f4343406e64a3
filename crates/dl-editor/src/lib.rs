pub mod commands;
pub mod config;
pub mod controller;
pub mod details;
pub mod draft;
pub mod error;
pub mod groups;
pub mod layer;
pub mod predicates;

pub use commands::{
    CommandAction, CommandEvent, CommandKind, CommandListener, CommandStack,
    CreateAnnotationCommand, DeleteAnnotationCommand, DrawCommand,
};
pub use config::LayerConfig;
pub use controller::{DrawController, DrawUpdate};
pub use details::{DisplayDetails, DrawKind, StoredDetails};
pub use draft::{AnnotationDraft, DecorationDraft};
pub use error::DrawError;
pub use groups::{GroupKey, parse_group_key, resolve_active_group_key};
pub use layer::DrawLayer;
