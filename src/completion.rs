//! Completion gate. Decides whether a record may be exported.
//!
//! Pure: reads a record, reports every unmet requirement at once.
//! All personal fields and the signature are mandatory; the photo is not.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::record::{PersonalField, RecordStore};

/// Ages above this are treated as typos.
const MAX_AGE: u32 = 150;

/// Anything the gate can ask the user to complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTag {
    Name,
    Surname,
    Age,
    BirthDate,
    VisitReason,
    Signature,
}

impl FieldTag {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => PersonalField::Name.label(),
            Self::Surname => PersonalField::Surname.label(),
            Self::Age => PersonalField::Age.label(),
            Self::BirthDate => PersonalField::BirthDate.label(),
            Self::VisitReason => PersonalField::VisitReason.label(),
            Self::Signature => "Firma",
        }
    }
}

impl From<PersonalField> for FieldTag {
    fn from(field: PersonalField) -> Self {
        match field {
            PersonalField::Name => Self::Name,
            PersonalField::Surname => Self::Surname,
            PersonalField::Age => Self::Age,
            PersonalField::BirthDate => Self::BirthDate,
            PersonalField::VisitReason => Self::VisitReason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum IssueKind {
    Missing,
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: FieldTag,
    #[serde(flatten)]
    pub kind: IssueKind,
}

/// Outcome of the gate. `missing` holds every field with an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub ok: bool,
    pub missing: BTreeSet<FieldTag>,
    pub issues: Vec<FieldIssue>,
}

pub struct CompletionGate;

impl CompletionGate {
    pub fn is_complete(record: &RecordStore) -> CompletionReport {
        Self::is_complete_on(record, chrono::Local::now().date_naive())
    }

    /// Same as `is_complete` with an explicit "today" for birth-date checks.
    pub fn is_complete_on(record: &RecordStore, today: NaiveDate) -> CompletionReport {
        let personal = record.personal();
        let mut issues = Vec::new();

        for field in PersonalField::ALL {
            let value = personal.get(field).trim();
            if value.is_empty() {
                issues.push(FieldIssue {
                    field: field.into(),
                    kind: IssueKind::Missing,
                });
                continue;
            }
            if let Some(problem) = check_shape(field, value, today) {
                issues.push(FieldIssue {
                    field: field.into(),
                    kind: IssueKind::Invalid(problem),
                });
            }
        }

        if record.signature().is_none() {
            issues.push(FieldIssue {
                field: FieldTag::Signature,
                kind: IssueKind::Missing,
            });
        }

        let missing: BTreeSet<FieldTag> = issues.iter().map(|i| i.field).collect();
        CompletionReport {
            ok: missing.is_empty(),
            missing,
            issues,
        }
    }
}

/// Parse-time checks for fields stored as free text.
fn check_shape(field: PersonalField, value: &str, today: NaiveDate) -> Option<String> {
    match field {
        PersonalField::Age => match value.parse::<u32>() {
            Ok(age) if age <= MAX_AGE => None,
            Ok(_) => Some(format!("must be at most {MAX_AGE}")),
            Err(_) => Some("must be a whole number".into()),
        },
        PersonalField::BirthDate => match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            Ok(date) if date <= today => None,
            Ok(_) => Some("cannot be in the future".into()),
            Err(_) => Some("use YYYY-MM-DD".into()),
        },
        _ => None,
    }
}
