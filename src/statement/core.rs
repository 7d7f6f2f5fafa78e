//! Statement processor that runs an extraction through the whole pipeline

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::reconciliation::{
    MatchReport, MatchingEngine, ReconciliationMerger, ValidationGate, ValidationOutcome,
};
use crate::statement::{rows_from_tables, AnomalyDetector, AnomalySummary, ItemClassifier, RowMapper, TableGrid};
use crate::traits::*;
use crate::types::*;

/// One extraction of one statement, ready to be processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRun {
    pub tenant_id: String,
    pub contact_id: String,
    pub statement_id: String,
    /// Extraction job that produced the rows
    pub job_id: Option<String>,
    pub config: ColumnConfig,
    pub rows: Vec<RawRow>,
    /// Plain text of the source document, when it has any
    pub source_text: Option<String>,
}

impl ExtractionRun {
    pub fn new(
        tenant_id: impl Into<String>,
        contact_id: impl Into<String>,
        statement_id: impl Into<String>,
        config: ColumnConfig,
        rows: Vec<RawRow>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            contact_id: contact_id.into(),
            statement_id: statement_id.into(),
            job_id: None,
            config,
            rows,
            source_text: None,
        }
    }

    /// Build a run from the extractor's table grids
    pub fn from_tables(
        tenant_id: impl Into<String>,
        contact_id: impl Into<String>,
        statement_id: impl Into<String>,
        config: ColumnConfig,
        tables: &[TableGrid],
    ) -> Self {
        let rows = rows_from_tables(tables, &config);
        Self::new(tenant_id, contact_id, statement_id, config, rows)
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }
}

/// Serialized form of a processed statement, stored as the statement artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementDocument {
    pub header: StatementHeader,
    pub items: Vec<LineItem>,
    pub anomalies: AnomalySummary,
    pub validation: ValidationOutcome,
}

/// Outcome of processing one extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub header: StatementHeader,
    pub items: Vec<LineItem>,
    pub inserted: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub anomalies: AnomalySummary,
    pub validation: ValidationOutcome,
}

/// Runs extractions through mapping, classification, flagging and merge,
/// and applies user edits to persisted statements
pub struct StatementProcessor<S: StatementStorage + ArtifactStorage> {
    storage: S,
    validator: Box<dyn ColumnConfigValidator>,
    config: EngineConfig,
    merger: ReconciliationMerger,
    matcher: MatchingEngine,
}

impl<S: StatementStorage + ArtifactStorage> StatementProcessor<S> {
    /// Create a processor with default settings
    pub fn new(storage: S) -> Self {
        Self::with_validator(storage, Box::new(DefaultColumnConfigValidator))
    }

    /// Create a processor with a custom configuration validator
    pub fn with_validator(storage: S, validator: Box<dyn ColumnConfigValidator>) -> Self {
        Self {
            storage,
            validator,
            config: EngineConfig::default(),
            merger: ReconciliationMerger::new(),
            matcher: MatchingEngine::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process one extraction.
    ///
    /// A configuration problem or a storage failure aborts the run. Field
    /// parse failures become flags and a reference mismatch is only logged
    /// and reported.
    pub async fn process(&mut self, run: ExtractionRun) -> ReconResult<ProcessingReport> {
        let ExtractionRun {
            tenant_id,
            contact_id,
            statement_id,
            job_id,
            config,
            rows,
            source_text,
        } = run;

        self.validator.validate_config(&config)?;
        let classifier = ItemClassifier::new(&config, self.config.classifier.clone());
        let mapper = RowMapper::new(config)?;

        let mut items = mapper.map_rows(&statement_id, &rows);
        classifier.apply(&mut items);
        let anomalies = AnomalyDetector::new(self.config.anomaly.clone()).apply(&mut items);

        let existing = self
            .storage
            .list_line_items(&tenant_id, &statement_id)
            .await?;
        let outcome = self.merger.merge(&existing, items);

        self.storage
            .upsert_line_items(&tenant_id, &outcome.items)
            .await?;
        if !outcome.removed.is_empty() {
            self.storage
                .delete_line_items(&tenant_id, &statement_id, &outcome.removed)
                .await?;
        }

        let mut header = match self.storage.get_header(&tenant_id, &statement_id).await? {
            Some(header) => header,
            None => StatementHeader::with_id(statement_id.as_str(), tenant_id.as_str(), contact_id),
        };
        if job_id.is_some() {
            header.job_id = job_id;
        }
        header.recompute(&outcome.items);
        self.storage.save_header(&header).await?;

        info!(
            statement_id = %statement_id,
            items = outcome.items.len(),
            earliest = ?header.earliest_item_date,
            latest = ?header.latest_item_date,
            "Persisted statement"
        );

        let validation: ValidationOutcome = ValidationGate::new(self.config.validation.clone())
            .check(source_text.as_deref(), &outcome.items)
            .map_err(|mismatch| {
                warn!(statement_id = %statement_id, error = %mismatch, "Reference validation mismatch");
                mismatch
            })
            .into();

        let document = StatementDocument {
            header: header.clone(),
            items: outcome.items.clone(),
            anomalies: anomalies.clone(),
            validation: validation.clone(),
        };
        let json = serde_json::to_value(&document)?;
        self.storage
            .put_statement_json(&tenant_id, &statement_id, &json)
            .await?;

        Ok(ProcessingReport {
            header,
            items: outcome.items,
            inserted: outcome.inserted,
            updated: outcome.updated,
            removed: outcome.removed,
            anomalies,
            validation,
        })
    }

    /// Load a statement with its items
    pub async fn get_statement(
        &self,
        tenant_id: &str,
        statement_id: &str,
    ) -> ReconResult<(StatementHeader, Vec<LineItem>)> {
        let header = self
            .storage
            .get_header(tenant_id, statement_id)
            .await?
            .ok_or_else(|| ReconciliationError::StatementNotFound(statement_id.to_string()))?;
        let items = self.storage.list_line_items(tenant_id, statement_id).await?;
        Ok((header, items))
    }

    /// Match the current items of a statement against a ledger snapshot
    pub async fn match_statement(
        &self,
        tenant_id: &str,
        statement_id: &str,
        ledger: &[LedgerDocument],
    ) -> ReconResult<MatchReport> {
        let (_, items) = self.get_statement(tenant_id, statement_id).await?;
        let report = self.matcher.match_items(&items, ledger);
        info!(
            statement_id,
            exact = report.count(MatchType::Exact),
            substring = report.count(MatchType::Substring),
            unmatched = report.count(MatchType::None),
            "Matched statement"
        );
        Ok(report)
    }

    /// Mark one line item completed or not
    pub async fn set_item_completed(
        &mut self,
        tenant_id: &str,
        statement_id: &str,
        item_id: &str,
        completed: bool,
    ) -> ReconResult<()> {
        self.storage
            .set_item_completed(tenant_id, statement_id, item_id, completed)
            .await
    }

    /// Mark every line item, and the statement itself, completed or not
    pub async fn set_all_items_completed(
        &mut self,
        tenant_id: &str,
        statement_id: &str,
        completed: bool,
    ) -> ReconResult<()> {
        let (mut header, items) = self.get_statement(tenant_id, statement_id).await?;
        for item in &items {
            self.storage
                .set_item_completed(tenant_id, statement_id, &item.item_id, completed)
                .await?;
        }
        header.completed = completed;
        self.storage.save_header(&header).await
    }

    /// Record a manual document type; it survives later reprocessing
    pub async fn set_item_document_type(
        &mut self,
        tenant_id: &str,
        statement_id: &str,
        item_id: &str,
        document_type: DocumentType,
    ) -> ReconResult<()> {
        self.storage
            .set_item_document_type(tenant_id, statement_id, item_id, document_type)
            .await
    }
}
