pub mod config;
pub mod domain;
pub mod errors;

pub use domain::command::{CommandOutcome, ProfileCommand};
pub use domain::profile::{
    FieldKind, FieldValue, ListField, ListTarget, Profile, StringField, StringTarget, UserId,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
