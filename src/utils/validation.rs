//! Validation utilities

use crate::parsing::DateTemplate;
use crate::traits::*;
use crate::types::*;

const DECIMAL_SEPARATORS: &[&str] = &[".", ","];
const THOUSANDS_SEPARATORS: &[&str] = &[",", ".", " ", "'", ""];

/// Validate decimal and thousands separators
pub fn validate_separators(decimal: &str, thousands: &str) -> ReconResult<()> {
    if !DECIMAL_SEPARATORS.contains(&decimal) {
        return Err(ReconciliationError::Configuration(format!(
            "decimal_separator must be one of {DECIMAL_SEPARATORS:?}, got {decimal:?}"
        )));
    }

    if !THOUSANDS_SEPARATORS.contains(&thousands) {
        return Err(ReconciliationError::Configuration(format!(
            "thousands_separator must be one of {THOUSANDS_SEPARATORS:?}, got {thousands:?}"
        )));
    }

    if decimal == thousands {
        return Err(ReconciliationError::Configuration(
            "decimal_separator and thousands_separator must differ".to_string(),
        ));
    }

    Ok(())
}

/// Validate that a date template compiles and names a year, month and day
pub fn validate_date_format(template: &str) -> ReconResult<()> {
    let compiled = DateTemplate::compile(template)?;
    if !compiled.is_complete() {
        return Err(ReconciliationError::Configuration(format!(
            "date_format {template:?} must contain year, month and day tokens"
        )));
    }
    Ok(())
}

/// Validate a configured header label
pub fn validate_header_label(label: &str) -> ReconResult<()> {
    if label.trim().is_empty() {
        return Err(ReconciliationError::Configuration(
            "Column header cannot be empty".to_string(),
        ));
    }

    if label.len() > 200 {
        return Err(ReconciliationError::Configuration(
            "Column header cannot exceed 200 characters".to_string(),
        ));
    }

    Ok(())
}

/// Stricter configuration validator for contacts set up by hand
pub struct StrictColumnConfigValidator;

impl ColumnConfigValidator for StrictColumnConfigValidator {
    fn validate_config(&self, config: &ColumnConfig) -> ReconResult<()> {
        config.validate()?;
        validate_date_format(config.date_template()?)?;
        validate_separators(&config.decimal_separator, &config.thousands_separator)?;

        for column in &config.total_columns {
            validate_header_label(&column.column)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ColumnConfig {
        ColumnConfig::new("DD/MM/YYYY")
            .with_number_column("Invoice No")
            .with_total_column(TotalColumn::new("Amount"))
    }

    #[test]
    fn test_validate_separators() {
        assert!(validate_separators(".", ",").is_ok());
        assert!(validate_separators(",", ".").is_ok());
        assert!(validate_separators(",", " ").is_ok());
        assert!(validate_separators(".", ".").is_err());
        assert!(validate_separators(";", ",").is_err());
        assert!(validate_separators(".", "_").is_err());
    }

    #[test]
    fn test_validate_date_format() {
        assert!(validate_date_format("Do MMMM YYYY").is_ok());
        assert!(validate_date_format("MMMM YYYY").is_err());
        assert!(validate_date_format("").is_err());
    }

    #[test]
    fn test_strict_validator() {
        let validator = StrictColumnConfigValidator;
        assert!(validator.validate_config(&base_config()).is_ok());

        let bad = base_config().with_separators(",", ",");
        assert!(validator.validate_config(&bad).is_err());

        let bad = base_config().with_total_column(TotalColumn::new("  "));
        assert!(validator.validate_config(&bad).is_err());
    }
}
