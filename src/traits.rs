//! Traits for storage abstraction and extensibility

use async_trait::async_trait;

use crate::types::*;

/// Storage abstraction for statements and their line items
///
/// Every call is scoped by tenant; an implementation must never return or
/// touch another tenant's records.
#[async_trait]
pub trait StatementStorage: Send + Sync {
    /// Get a statement header
    async fn get_header(
        &self,
        tenant_id: &str,
        statement_id: &str,
    ) -> ReconResult<Option<StatementHeader>>;

    /// Insert or replace a statement header
    async fn save_header(&mut self, header: &StatementHeader) -> ReconResult<()>;

    /// List the line items of a statement, ordered by row ordinal
    async fn list_line_items(
        &self,
        tenant_id: &str,
        statement_id: &str,
    ) -> ReconResult<Vec<LineItem>>;

    /// Insert or replace line items by item id
    async fn upsert_line_items(&mut self, tenant_id: &str, items: &[LineItem]) -> ReconResult<()>;

    /// Delete line items by id
    async fn delete_line_items(
        &mut self,
        tenant_id: &str,
        statement_id: &str,
        item_ids: &[String],
    ) -> ReconResult<()>;

    /// Set the completion flag of one line item
    async fn set_item_completed(
        &mut self,
        tenant_id: &str,
        statement_id: &str,
        item_id: &str,
        completed: bool,
    ) -> ReconResult<()>;

    /// Record a manual document type correction on one line item
    async fn set_item_document_type(
        &mut self,
        tenant_id: &str,
        statement_id: &str,
        item_id: &str,
        document_type: DocumentType,
    ) -> ReconResult<()>;
}

/// Storage for the serialized statement document handed to downstream viewers
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    async fn put_statement_json(
        &mut self,
        tenant_id: &str,
        statement_id: &str,
        document: &serde_json::Value,
    ) -> ReconResult<()>;

    async fn get_statement_json(
        &self,
        tenant_id: &str,
        statement_id: &str,
    ) -> ReconResult<Option<serde_json::Value>>;
}

/// Validation rules for a contact's column configuration
pub trait ColumnConfigValidator: Send + Sync {
    /// Validate a configuration before any row is mapped
    fn validate_config(&self, config: &ColumnConfig) -> ReconResult<()>;
}

/// Default configuration validator
pub struct DefaultColumnConfigValidator;

impl ColumnConfigValidator for DefaultColumnConfigValidator {
    fn validate_config(&self, config: &ColumnConfig) -> ReconResult<()> {
        config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validator_delegates_to_config() {
        let validator = DefaultColumnConfigValidator;
        let config = ColumnConfig::new("DD/MM/YYYY").with_number_column("Invoice No");
        assert!(validator.validate_config(&config).is_ok());
        assert!(validator.validate_config(&ColumnConfig::default()).is_err());
    }
}
