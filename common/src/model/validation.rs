use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a single manifest violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The payload could not be parsed as a JSON object at all.
    Malformed,
    /// A required field is missing or empty.
    Required,
    /// A field is present with the wrong JSON type.
    Type,
    /// A field has the right type but an unacceptable value.
    Invalid,
    /// A field refers to something that isn't declared elsewhere in the manifest.
    Reference,
    /// An identifier that must be unique appears more than once.
    Duplicate,
}

/// A structured violation reported back to the submitter.
///
/// `field` is a dotted path into the document, e.g. `funding.plans[0].currency`.
/// The whole list is returned together so a submitter can fix everything in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: ViolationKind,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ViolationKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}
