//! The fixed booking questionnaire.
//!
//! A call walks through [`STEPS`] in order, one field per step. Each step knows
//! the field it fills, its prompt, and the variant of the prompt spoken after
//! an answer could not be understood.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A booking field collected during the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Name,
    Date,
    Time,
    PartySize,
    ContactNumber,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Date => "date",
            Field::Time => "time",
            Field::PartySize => "partySize",
            Field::ContactNumber => "contactNumber",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage of the questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDefinition {
    pub field: Field,
    pub prompt: &'static str,
    pub retry_prompt: &'static str,
}

pub const STEPS: [StepDefinition; 5] = [
    StepDefinition {
        field: Field::Name,
        prompt: "Per favore, dimmi il tuo nome.",
        retry_prompt: "Non ho capito il nome. Puoi ripeterlo?",
    },
    StepDefinition {
        field: Field::Date,
        prompt: "Per quale giorno vuoi prenotare? Puoi dire ad esempio domani, sabato o il 12 maggio.",
        retry_prompt: "Non ho capito la data. Puoi ripeterla, ad esempio domani o il 12 maggio?",
    },
    StepDefinition {
        field: Field::Time,
        prompt: "A che ora desideri il tavolo?",
        retry_prompt: "Non ho capito l'orario. Puoi ripeterlo, ad esempio alle 20:30?",
    },
    StepDefinition {
        field: Field::PartySize,
        prompt: "Per quante persone?",
        retry_prompt: "Non ho capito il numero di persone. Quante persone sarete?",
    },
    StepDefinition {
        field: Field::ContactNumber,
        prompt: "Qual è il numero di telefono a cui inviare la conferma?",
        retry_prompt: "Non ho capito il numero. Puoi ripeterlo cifra per cifra?",
    },
];

pub const STEP_COUNT: usize = STEPS.len();

/// A normalized answer, tagged with the field it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    Name(String),
    Date(NaiveDate),
    /// Zero-padded `HH:MM`. Range checking happens when the booking start is built.
    Time(String),
    PartySize(u32),
    ContactNumber(String),
}

impl FieldValue {
    pub fn field(&self) -> Field {
        match self {
            FieldValue::Name(_) => Field::Name,
            FieldValue::Date(_) => Field::Date,
            FieldValue::Time(_) => Field::Time,
            FieldValue::PartySize(_) => Field::PartySize,
            FieldValue::ContactNumber(_) => Field::ContactNumber,
        }
    }
}

/// The answers gathered so far on one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedFields {
    pub name: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub party_size: Option<u32>,
    pub contact_number: Option<String>,
}

impl CollectedFields {
    /// Stores a value under its field, replacing any previous answer to the same step.
    pub fn set(&mut self, value: FieldValue) {
        match value {
            FieldValue::Name(v) => self.name = Some(v),
            FieldValue::Date(v) => self.date = Some(v),
            FieldValue::Time(v) => self.time = Some(v),
            FieldValue::PartySize(v) => self.party_size = Some(v),
            FieldValue::ContactNumber(v) => self.contact_number = Some(v),
        }
    }

    pub fn contains(&self, field: Field) -> bool {
        match field {
            Field::Name => self.name.is_some(),
            Field::Date => self.date.is_some(),
            Field::Time => self.time.is_some(),
            Field::PartySize => self.party_size.is_some(),
            Field::ContactNumber => self.contact_number.is_some(),
        }
    }

    /// The first field of the questionnaire that has no answer yet.
    pub fn first_missing(&self) -> Option<Field> {
        STEPS
            .iter()
            .map(|step| step.field)
            .find(|field| !self.contains(*field))
    }

    pub fn is_complete(&self) -> bool {
        self.first_missing().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_follow_fixed_order() {
        let fields: Vec<Field> = STEPS.iter().map(|s| s.field).collect();
        assert_eq!(
            fields,
            vec![
                Field::Name,
                Field::Date,
                Field::Time,
                Field::PartySize,
                Field::ContactNumber
            ]
        );
        assert_eq!(STEP_COUNT, 5);
    }

    #[test]
    fn test_collected_fields_tracks_missing() {
        let mut fields = CollectedFields::default();
        assert_eq!(fields.first_missing(), Some(Field::Name));

        fields.set(FieldValue::Name("Mario".into()));
        fields.set(FieldValue::Time("20:30".into()));
        assert_eq!(fields.first_missing(), Some(Field::Date));
        assert!(!fields.is_complete());

        fields.set(FieldValue::Date(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()));
        fields.set(FieldValue::PartySize(2));
        fields.set(FieldValue::ContactNumber("+393331234567".into()));
        assert!(fields.is_complete());
    }

    #[test]
    fn test_field_value_serializes_with_field_tag() {
        let json = serde_json::to_string(&FieldValue::PartySize(4)).unwrap();
        assert_eq!(json, r#"{"field":"partySize","value":4}"#);
    }
}
