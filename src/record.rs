//! The visit record aggregate and the intents that replace it.
//!
//! `RecordStore` is a plain value. Components never mutate it in place: the
//! controller applies a `RecordIntent` and swaps in the returned store.
//! Cloning is the snapshot operation; artifacts are `Arc`-backed so it is
//! cheap and immune to later edits.

use serde::{Deserialize, Serialize};

use crate::artifact::{ImageArtifact, SignatureArtifact};

/// The five personal-data fields, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalField {
    Name,
    Surname,
    Age,
    BirthDate,
    VisitReason,
}

impl PersonalField {
    pub const ALL: [PersonalField; 5] = [
        Self::Name,
        Self::Surname,
        Self::Age,
        Self::BirthDate,
        Self::VisitReason,
    ];

    /// Label printed in the document and shown in the summary.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Nombre",
            Self::Surname => "Apellidos",
            Self::Age => "Edad",
            Self::BirthDate => "Fecha de Nacimiento",
            Self::VisitReason => "Motivo de la visita",
        }
    }
}

/// Raw form input. No shape is enforced until the completion gate runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalData {
    pub name: String,
    pub surname: String,
    /// Kept as typed; parsed only during validation.
    pub age: String,
    /// Expected `YYYY-MM-DD`.
    pub birth_date: String,
    pub visit_reason: String,
}

impl PersonalData {
    pub fn get(&self, field: PersonalField) -> &str {
        match field {
            PersonalField::Name => &self.name,
            PersonalField::Surname => &self.surname,
            PersonalField::Age => &self.age,
            PersonalField::BirthDate => &self.birth_date,
            PersonalField::VisitReason => &self.visit_reason,
        }
    }

    /// Copy with one field replaced.
    pub fn with(&self, field: PersonalField, value: String) -> Self {
        let mut next = self.clone();
        let slot = match field {
            PersonalField::Name => &mut next.name,
            PersonalField::Surname => &mut next.surname,
            PersonalField::Age => &mut next.age,
            PersonalField::BirthDate => &mut next.birth_date,
            PersonalField::VisitReason => &mut next.visit_reason,
        };
        *slot = value;
        next
    }
}

/// A user action against the record.
#[derive(Debug, Clone)]
pub enum RecordIntent {
    SetField(PersonalField, String),
    ReplacePersonalData(PersonalData),
    SetImage(ImageArtifact),
    ClearImage,
    SetSignature(SignatureArtifact),
    ClearSignature,
    Reset,
}

impl RecordIntent {
    /// Short name for logs. Never includes field values.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetField(..) => "set_field",
            Self::ReplacePersonalData(_) => "replace_personal_data",
            Self::SetImage(_) => "set_image",
            Self::ClearImage => "clear_image",
            Self::SetSignature(_) => "set_signature",
            Self::ClearSignature => "clear_signature",
            Self::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStore {
    personal: PersonalData,
    image: Option<ImageArtifact>,
    signature: Option<SignatureArtifact>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn personal(&self) -> &PersonalData {
        &self.personal
    }

    pub fn image(&self) -> Option<&ImageArtifact> {
        self.image.as_ref()
    }

    pub fn signature(&self) -> Option<&SignatureArtifact> {
        self.signature.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply an intent, returning the replacement store.
    pub fn apply(&self, intent: RecordIntent) -> RecordStore {
        match intent {
            RecordIntent::SetField(field, value) => Self {
                personal: self.personal.with(field, value),
                ..self.clone()
            },
            RecordIntent::ReplacePersonalData(personal) => Self {
                personal,
                ..self.clone()
            },
            RecordIntent::SetImage(image) => Self {
                image: Some(image),
                ..self.clone()
            },
            RecordIntent::ClearImage => Self {
                image: None,
                ..self.clone()
            },
            RecordIntent::SetSignature(signature) => Self {
                signature: Some(signature),
                ..self.clone()
            },
            RecordIntent::ClearSignature => Self {
                signature: None,
                ..self.clone()
            },
            RecordIntent::Reset => Self::default(),
        }
    }
}
