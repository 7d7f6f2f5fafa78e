//! Engine tuning knobs

use serde::{Deserialize, Serialize};

use crate::types::{DocumentType, ReconResult, ReconciliationError};

/// Tuning for every stage of the engine
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierSettings,
    pub anomaly: AnomalySettings,
    pub validation: ValidationSettings,
}

impl EngineConfig {
    /// Load settings from JSON; missing sections fall back to defaults
    pub fn from_json_str(json: &str) -> ReconResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ReconciliationError::Configuration(format!("invalid engine config: {e}")))
    }
}

/// Keyword scoring thresholds for the item classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub payment_min_confidence: f64,
    pub credit_note_min_confidence: f64,
    pub invoice_min_confidence: f64,
    /// Highest score a synonym of two characters or fewer may reach
    pub short_token_score_cap: f64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            payment_min_confidence: 0.6,
            credit_note_min_confidence: 0.65,
            invoice_min_confidence: 0.0,
            short_token_score_cap: 0.8,
        }
    }
}

impl ClassifierSettings {
    pub fn min_confidence(&self, document_type: DocumentType) -> f64 {
        match document_type {
            DocumentType::Payment => self.payment_min_confidence,
            DocumentType::CreditNote => self.credit_note_min_confidence,
            DocumentType::Invoice => self.invoice_min_confidence,
            DocumentType::Unknown => f64::INFINITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalySettings {
    /// Single-word rules (`summary`, `balance`) only fire on texts this short
    pub short_text_max_tokens: usize,
}

impl Default for AnomalySettings {
    fn default() -> Self {
        Self {
            short_text_max_tokens: 3,
        }
    }
}

/// Line item field compared against the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceField {
    #[default]
    Number,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub reference_field: ReferenceField,
    /// Longest run of adjacent alphanumeric spans joined when scanning source text
    pub ngram_max: usize,
    /// Leading digits used to bucket a reference family
    pub digit_prefix_len: usize,
    pub min_samples_for_prefixing: usize,
    pub coverage_threshold: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            reference_field: ReferenceField::Number,
            ngram_max: 5,
            digit_prefix_len: 3,
            min_samples_for_prefixing: 3,
            coverage_threshold: 0.6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{"classifier": {"payment_min_confidence": 0.7}, "validation": {"reference_field": "reference"}}"#,
        )
        .unwrap();

        assert_eq!(config.classifier.payment_min_confidence, 0.7);
        assert_eq!(config.classifier.credit_note_min_confidence, 0.65);
        assert_eq!(config.anomaly.short_text_max_tokens, 3);
        assert_eq!(config.validation.reference_field, ReferenceField::Reference);
        assert_eq!(config.validation.ngram_max, 5);
    }

    #[test]
    fn test_invalid_json_is_configuration_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{not json"),
            Err(ReconciliationError::Configuration(_))
        ));
    }
}
