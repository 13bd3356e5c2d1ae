use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Field names the agent may never write through any tool. `user_id` is the
/// record's identity; `id` was the identity key in earlier document schemas
/// and stays reserved so old documents cannot be corrupted.
const RESERVED_FIELDS: &[&str] = &["user_id", "id"];

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringField {
    Name,
    Headline,
    Summary,
    CurrentTitle,
    CurrentCompany,
    Location,
    ExperienceLevel,
}

impl StringField {
    pub const ALL: [StringField; 7] = [
        StringField::Name,
        StringField::Headline,
        StringField::Summary,
        StringField::CurrentTitle,
        StringField::CurrentCompany,
        StringField::Location,
        StringField::ExperienceLevel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Headline => "headline",
            Self::Summary => "summary",
            Self::CurrentTitle => "current_title",
            Self::CurrentCompany => "current_company",
            Self::Location => "location",
            Self::ExperienceLevel => "experience_level",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListField {
    Skills,
    Tools,
    Strengths,
    Industries,
    Certifications,
    ExperienceParagraphs,
    ProjectParagraphs,
    CustomProfileNotes,
    PendingQuestions,
}

impl ListField {
    pub const ALL: [ListField; 9] = [
        ListField::Skills,
        ListField::Tools,
        ListField::Strengths,
        ListField::Industries,
        ListField::Certifications,
        ListField::ExperienceParagraphs,
        ListField::ProjectParagraphs,
        ListField::CustomProfileNotes,
        ListField::PendingQuestions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skills => "skills",
            Self::Tools => "tools",
            Self::Strengths => "strengths",
            Self::Industries => "industries",
            Self::Certifications => "certifications",
            Self::ExperienceParagraphs => "experience_paragraphs",
            Self::ProjectParagraphs => "project_paragraphs",
            Self::CustomProfileNotes => "custom_profile_notes",
            Self::PendingQuestions => "pending_questions",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

/// What kind of value a field holds. Used in kind-mismatch diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    List,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => write!(f, "a string value"),
            Self::List => write!(f, "a list"),
        }
    }
}

/// Target of a string overwrite: a schema field or an extension-map entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StringTarget {
    Known(StringField),
    Custom(String),
}

impl StringTarget {
    pub fn parse(name: &str) -> Result<Self, DomainError> {
        let name = validate_field_name(name)?;
        if let Some(field) = StringField::from_name(name) {
            return Ok(Self::Known(field));
        }
        if ListField::from_name(name).is_some() {
            return Err(DomainError::FieldKindMismatch {
                name: name.to_string(),
                expected: FieldKind::Scalar,
                actual: FieldKind::List,
            });
        }
        Ok(Self::Custom(name.to_string()))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Known(field) => field.as_str(),
            Self::Custom(name) => name,
        }
    }
}

/// Target of a list add/remove: a schema field or an extension-map entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListTarget {
    Known(ListField),
    Custom(String),
}

impl ListTarget {
    pub fn parse(name: &str) -> Result<Self, DomainError> {
        let name = validate_field_name(name)?;
        if let Some(field) = ListField::from_name(name) {
            return Ok(Self::Known(field));
        }
        if StringField::from_name(name).is_some() {
            return Err(DomainError::FieldKindMismatch {
                name: name.to_string(),
                expected: FieldKind::List,
                actual: FieldKind::Scalar,
            });
        }
        Ok(Self::Custom(name.to_string()))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Known(field) => field.as_str(),
            Self::Custom(name) => name,
        }
    }
}

fn validate_field_name(name: &str) -> Result<&str, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::BlankFieldName);
    }
    if RESERVED_FIELDS.contains(&name) {
        return Err(DomainError::ReservedField { name: name.to_string() });
    }
    Ok(name)
}

/// Value held by an extension-map entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

/// A user's job-search profile.
///
/// Serializes to the document store's wire shape: a flat map of field name to
/// scalar string or string sequence, keyed by `user_id`. Empty fields are
/// omitted on the wire and read back as empty. Extension-map entries sit
/// inline beside the schema fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub headline: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_company: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub experience_level: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strengths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub industries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certifications: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub experience_paragraphs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub project_paragraphs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_profile_notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_questions: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, FieldValue>,
}

impl Profile {
    /// Fresh record with every field empty. Records are created lazily, so
    /// this is both the first-read default and the reset target.
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            name: String::new(),
            headline: String::new(),
            summary: String::new(),
            current_title: String::new(),
            current_company: String::new(),
            location: String::new(),
            experience_level: String::new(),
            skills: Vec::new(),
            tools: Vec::new(),
            strengths: Vec::new(),
            industries: Vec::new(),
            certifications: Vec::new(),
            experience_paragraphs: Vec::new(),
            project_paragraphs: Vec::new(),
            custom_profile_notes: Vec::new(),
            pending_questions: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn string_field(&self, field: StringField) -> &str {
        match field {
            StringField::Name => &self.name,
            StringField::Headline => &self.headline,
            StringField::Summary => &self.summary,
            StringField::CurrentTitle => &self.current_title,
            StringField::CurrentCompany => &self.current_company,
            StringField::Location => &self.location,
            StringField::ExperienceLevel => &self.experience_level,
        }
    }

    fn string_field_mut(&mut self, field: StringField) -> &mut String {
        match field {
            StringField::Name => &mut self.name,
            StringField::Headline => &mut self.headline,
            StringField::Summary => &mut self.summary,
            StringField::CurrentTitle => &mut self.current_title,
            StringField::CurrentCompany => &mut self.current_company,
            StringField::Location => &mut self.location,
            StringField::ExperienceLevel => &mut self.experience_level,
        }
    }

    pub fn list_field(&self, field: ListField) -> &[String] {
        match field {
            ListField::Skills => &self.skills,
            ListField::Tools => &self.tools,
            ListField::Strengths => &self.strengths,
            ListField::Industries => &self.industries,
            ListField::Certifications => &self.certifications,
            ListField::ExperienceParagraphs => &self.experience_paragraphs,
            ListField::ProjectParagraphs => &self.project_paragraphs,
            ListField::CustomProfileNotes => &self.custom_profile_notes,
            ListField::PendingQuestions => &self.pending_questions,
        }
    }

    fn list_field_mut(&mut self, field: ListField) -> &mut Vec<String> {
        match field {
            ListField::Skills => &mut self.skills,
            ListField::Tools => &mut self.tools,
            ListField::Strengths => &mut self.strengths,
            ListField::Industries => &mut self.industries,
            ListField::Certifications => &mut self.certifications,
            ListField::ExperienceParagraphs => &mut self.experience_paragraphs,
            ListField::ProjectParagraphs => &mut self.project_paragraphs,
            ListField::CustomProfileNotes => &mut self.custom_profile_notes,
            ListField::PendingQuestions => &mut self.pending_questions,
        }
    }

    /// Overwrite a string field wholesale.
    pub fn set_string(&mut self, target: &StringTarget, value: &str) {
        match target {
            StringTarget::Known(field) => *self.string_field_mut(*field) = value.to_string(),
            StringTarget::Custom(name) => {
                self.extra.insert(name.clone(), FieldValue::Scalar(value.to_string()));
            }
        }
    }

    /// Append an item to a list field unless it is already present.
    /// Returns whether the list changed.
    pub fn add_to_list(&mut self, target: &ListTarget, item: &str) -> bool {
        match target {
            ListTarget::Known(field) => push_unique(self.list_field_mut(*field), item),
            ListTarget::Custom(name) => match self.extra.get_mut(name.as_str()) {
                Some(FieldValue::List(items)) => push_unique(items, item),
                // Absent entry, or a scalar left behind by an earlier
                // SetStringField: start a fresh one-item list.
                _ => {
                    self.extra.insert(name.clone(), FieldValue::List(vec![item.to_string()]));
                    true
                }
            },
        }
    }

    /// Remove the first occurrence of an item from a list field.
    /// Absent items are a no-op. Returns whether the list changed.
    pub fn remove_from_list(&mut self, target: &ListTarget, item: &str) -> bool {
        match target {
            ListTarget::Known(field) => remove_first(self.list_field_mut(*field), item),
            ListTarget::Custom(name) => match self.extra.get_mut(name.as_str()) {
                Some(FieldValue::List(items)) => remove_first(items, item),
                _ => false,
            },
        }
    }
}

fn push_unique(items: &mut Vec<String>, item: &str) -> bool {
    if items.iter().any(|existing| existing == item) {
        return false;
    }
    items.push(item.to_string());
    true
}

fn remove_first(items: &mut Vec<String>, item: &str) -> bool {
    match items.iter().position(|existing| existing == item) {
        Some(index) => {
            items.remove(index);
            true
        }
        None => false,
    }
}
