use crate::domain::profile::{ListTarget, Profile, StringTarget};

/// The closed set of profile edits the agent can request. Every tool call the
/// model makes decodes into exactly one of these before anything touches a
/// record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProfileCommand {
    SetString { field: StringTarget, value: String },
    AddToList { field: ListTarget, item: String },
    RemoveFromList { field: ListTarget, item: String },
}

impl ProfileCommand {
    pub fn field_name(&self) -> &str {
        match self {
            Self::SetString { field, .. } => field.name(),
            Self::AddToList { field, .. } | Self::RemoveFromList { field, .. } => field.name(),
        }
    }

    /// Apply the command to a record. Application itself cannot fail; no-op
    /// cases are reported through the outcome.
    pub fn apply(&self, profile: &mut Profile) -> CommandOutcome {
        match self {
            Self::SetString { field, value } => {
                profile.set_string(field, value);
                CommandOutcome::Set { field: field.name().to_string(), value: value.clone() }
            }
            Self::AddToList { field, item } => {
                if profile.add_to_list(field, item) {
                    CommandOutcome::Added { field: field.name().to_string(), item: item.clone() }
                } else {
                    CommandOutcome::AlreadyPresent {
                        field: field.name().to_string(),
                        item: item.clone(),
                    }
                }
            }
            Self::RemoveFromList { field, item } => {
                if profile.remove_from_list(field, item) {
                    CommandOutcome::Removed { field: field.name().to_string(), item: item.clone() }
                } else {
                    CommandOutcome::NotPresent {
                        field: field.name().to_string(),
                        item: item.clone(),
                    }
                }
            }
        }
    }
}

/// Result of applying a [`ProfileCommand`], including the no-op cases so the
/// agent hears accurate state back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Set { field: String, value: String },
    Added { field: String, item: String },
    AlreadyPresent { field: String, item: String },
    Removed { field: String, item: String },
    NotPresent { field: String, item: String },
}

impl CommandOutcome {
    /// Human-readable confirmation returned to the agent as the tool result.
    pub fn confirmation(&self) -> String {
        match self {
            Self::Set { field, value } => format!("Set {field} to '{value}'."),
            Self::Added { field, item } => format!("Added '{item}' to {field}."),
            Self::AlreadyPresent { field, item } => format!("'{item}' is already in {field}."),
            Self::Removed { field, item } => format!("Removed '{item}' from {field}."),
            Self::NotPresent { field, item } => format!("'{item}' was not in {field}."),
        }
    }
}
