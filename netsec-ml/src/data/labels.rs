//! Target label vocabulary.
//!
//! The mapping from raw label text to numeric code is configuration. The
//! default vocabulary is the binary `{"1" -> 1, "-1" -> -1}` convention.

use crate::data::dataset::cell_to_field;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One raw label and the code it encodes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMapping {
    pub label: String,
    pub code: i32,
}

impl LabelMapping {
    pub fn new(label: impl Into<String>, code: i32) -> Self {
        Self {
            label: label.into(),
            code,
        }
    }
}

/// Injective label <-> code mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    mappings: Vec<LabelMapping>,
}

impl LabelEncoder {
    /// Build an encoder; labels and codes must both be unique.
    pub fn new(mappings: Vec<LabelMapping>) -> Result<Self, PipelineError> {
        if mappings.is_empty() {
            return Err(PipelineError::config("label vocabulary is empty"));
        }
        let mut labels = HashSet::new();
        let mut codes = HashSet::new();
        for m in &mappings {
            let label = m.label.trim();
            if !labels.insert(label.to_string()) {
                return Err(PipelineError::config(format!(
                    "label '{label}' appears more than once in the vocabulary"
                )));
            }
            if !codes.insert(m.code) {
                return Err(PipelineError::config(format!(
                    "code {} is assigned to more than one label",
                    m.code
                )));
            }
        }
        let mappings = mappings
            .into_iter()
            .map(|m| LabelMapping::new(m.label.trim(), m.code))
            .collect();
        Ok(Self { mappings })
    }

    pub fn mappings(&self) -> &[LabelMapping] {
        &self.mappings
    }

    pub fn codes(&self) -> Vec<i32> {
        self.mappings.iter().map(|m| m.code).collect()
    }

    /// Encode raw label text.
    pub fn encode_str(&self, raw: &str) -> Result<i32, PipelineError> {
        let raw = raw.trim();
        if let Some(m) = self.mappings.iter().find(|m| m.label == raw) {
            return Ok(m.code);
        }
        // "1.0" and "1" name the same class
        if let Ok(value) = raw.parse::<f64>() {
            if let Some(m) = self
                .mappings
                .iter()
                .find(|m| m.label.parse::<f64>().is_ok_and(|l| l == value))
            {
                return Ok(m.code);
            }
        }
        Err(PipelineError::unknown_label(format!(
            "label '{raw}' is not in the vocabulary {:?}",
            self.mappings.iter().map(|m| &m.label).collect::<Vec<_>>()
        )))
    }

    /// Encode a dataset cell. Missing labels are unknown labels.
    pub fn encode(&self, cell: &Value) -> Result<i32, PipelineError> {
        if cell.is_null() {
            return Err(PipelineError::unknown_label("missing target label"));
        }
        self.encode_str(&cell_to_field(cell))
    }

    pub fn decode(&self, code: i32) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.code == code)
            .map(|m| m.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn binary() -> LabelEncoder {
        LabelEncoder::new(vec![LabelMapping::new("1", 1), LabelMapping::new("-1", -1)]).unwrap()
    }

    #[test]
    fn test_every_label_roundtrips() {
        let enc = binary();
        for m in enc.mappings() {
            let code = enc.encode_str(&m.label).unwrap();
            assert_eq!(enc.decode(code), Some(m.label.as_str()));
        }
    }

    #[test]
    fn test_encode_cells() {
        let enc = binary();
        assert_eq!(enc.encode(&json!(1)).unwrap(), 1);
        assert_eq!(enc.encode(&json!(-1.0)).unwrap(), -1);
        assert_eq!(enc.encode(&json!(" -1 ")).unwrap(), -1);
        assert_eq!(enc.encode_str("1.0").unwrap(), 1);
    }

    #[test]
    fn test_unknown_label() {
        let enc = binary();
        assert_eq!(
            enc.encode(&json!("0")).unwrap_err().kind(),
            ErrorKind::UnknownLabel
        );
        assert_eq!(
            enc.encode(&Value::Null).unwrap_err().kind(),
            ErrorKind::UnknownLabel
        );
    }

    #[test]
    fn test_non_injective_vocabulary_rejected() {
        let err = LabelEncoder::new(vec![LabelMapping::new("0", -1), LabelMapping::new("-1", -1)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = LabelEncoder::new(vec![LabelMapping::new("1", 1), LabelMapping::new(" 1", 2)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        assert!(LabelEncoder::new(Vec::new()).is_err());
    }

    #[test]
    fn test_custom_vocabulary() {
        let enc = LabelEncoder::new(vec![
            LabelMapping::new("phishing", -1),
            LabelMapping::new("legitimate", 1),
        ])
        .unwrap();
        assert_eq!(enc.encode_str("phishing").unwrap(), -1);
        assert_eq!(enc.decode(1), Some("legitimate"));
        assert_eq!(enc.decode(0), None);
    }
}
