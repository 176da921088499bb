use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::PageText;
use crate::error::Result;

/// Literal the model uses for fields absent from the record.
pub const NOT_SPECIFIED: &str = "Not Specified";

/// One extracted medical field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    /// A value with the pages it was read from.
    Extracted {
        value: serde_json::Value,
        #[serde(default)]
        source_pages: Vec<i64>,
    },
    /// Sub-fields, e.g. age/sex/race under patient information.
    Group(BTreeMap<String, FieldValue>),
    /// Bare text, including [`NOT_SPECIFIED`].
    Text(String),
}

impl FieldValue {
    pub fn is_specified(&self) -> bool {
        match self {
            FieldValue::Text(text) => text != NOT_SPECIFIED,
            FieldValue::Extracted { value, .. } => value.as_str() != Some(NOT_SPECIFIED),
            FieldValue::Group(fields) => fields.values().any(FieldValue::is_specified),
        }
    }
}

/// Structured fields plus a narrative summary of the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MedicalRecord {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub summary: String,
}

/// Turns resolved page text into a structured medical record.
#[async_trait]
pub trait TransformService: Send + Sync {
    async fn analyze(&self, pages: &[PageText]) -> Result<MedicalRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mixed_field_shapes() {
        let json = r#"{
            "fields": {
                "Diagnosis": {"value": "Major depressive disorder", "source_pages": [1, 3]},
                "Patient Information": {
                    "Age": {"value": 42, "source_pages": [1]},
                    "Race": "Not Specified"
                },
                "Doctor's Name": "Not Specified"
            },
            "summary": "Adult patient treated for depression."
        }"#;

        let record: MedicalRecord = serde_json::from_str(json).unwrap();
        assert_eq!(
            record.fields["Diagnosis"],
            FieldValue::Extracted {
                value: serde_json::json!("Major depressive disorder"),
                source_pages: vec![1, 3],
            }
        );
        assert!(record.fields["Patient Information"].is_specified());
        assert!(!record.fields["Doctor's Name"].is_specified());
        assert_eq!(record.summary, "Adult patient treated for depression.");
    }
}
