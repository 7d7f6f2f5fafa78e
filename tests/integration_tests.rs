//! Integration tests for statement-recon

use statement_recon::{
    utils::{MemoryStorage, StrictColumnConfigValidator},
    ArtifactStorage, ColumnConfig, DocumentType, EngineConfig, ExtractionRun, Flag,
    LedgerDocument, MatchType, RawRow, ReconciliationError, StatementProcessor, StatementStorage,
    TableGrid, TotalColumn, ValidationOutcome,
};
use chrono::NaiveDate;

fn supplier_config() -> ColumnConfig {
    ColumnConfig::new("DD/MM/YYYY")
        .with_date_column("Date")
        .with_number_column("Number")
        .with_reference_column("Details")
        .with_total_column(TotalColumn::debit("Debit"))
        .with_total_column(TotalColumn::credit("Credit"))
}

fn row(ordinal: usize, date: &str, number: &str, details: &str, debit: &str, credit: &str) -> RawRow {
    RawRow::new(ordinal)
        .with_cell("Date", date)
        .with_cell("Number", number)
        .with_cell("Details", details)
        .with_cell("Debit", debit)
        .with_cell("Credit", credit)
}

fn statement_rows() -> Vec<RawRow> {
    vec![
        row(1, "01/03/2024", "", "Balance brought forward", "500.00", ""),
        row(2, "03/03/2024", "INV-12345", "Goods", "1,200.00", ""),
        row(3, "10/03/2024", "Invoice # INV 12346", "Goods", "300.00", ""),
        row(4, "12/03/2024", "Credit Note 9", "Returned stock", "", "50.00"),
        row(5, "20/03/2024", "Payment 456", "Thank you", "", "1,000.00"),
        row(6, "32/13/2024", "INV-12347", "Goods", "75.00", ""),
    ]
}

fn run(rows: Vec<RawRow>) -> ExtractionRun {
    ExtractionRun::new("tenant-1", "contact-1", "stmt-1", supplier_config(), rows)
}

#[tokio::test]
async fn test_complete_reconciliation_workflow() {
    let storage = MemoryStorage::new();
    let mut processor = StatementProcessor::new(storage.clone());

    let report = processor
        .process(run(statement_rows()).with_job_id("job-1"))
        .await
        .unwrap();

    // Classification
    let types: Vec<DocumentType> = report.items.iter().map(|i| i.document_type).collect();
    assert_eq!(
        types,
        vec![
            DocumentType::Invoice,
            DocumentType::Invoice,
            DocumentType::Invoice,
            DocumentType::CreditNote,
            DocumentType::Payment,
            DocumentType::Invoice,
        ]
    );

    // Flags
    assert!(report.items[0].has_flag(Flag::MissingNumber));
    assert!(report.items[0].has_flag(Flag::Outlier));
    assert!(report.items[5].has_flag(Flag::InvalidDate));
    assert_eq!(report.items[5].date, None);
    assert!(report.items[1].flags.is_empty());
    assert_eq!(report.anomalies.flagged, 1);

    // Header dates ignore the undated row
    assert_eq!(
        report.header.earliest_item_date,
        NaiveDate::from_ymd_opt(2024, 3, 1)
    );
    assert_eq!(report.header.latest_item_date, NaiveDate::from_ymd_opt(2024, 3, 20));
    assert_eq!(report.header.job_id.as_deref(), Some("job-1"));

    // Matching
    let ledger = vec![
        LedgerDocument::invoice("doc-1", "INV-12345"),
        LedgerDocument::invoice("doc-2", "INV-12346"),
        LedgerDocument::invoice("doc-3", "456"),
        LedgerDocument::credit_note("doc-4", "CN-9"),
    ];
    let matches = processor
        .match_statement("tenant-1", "stmt-1", &ledger)
        .await
        .unwrap();

    let by_id = |id: &str| matches.result_for(id).unwrap().clone();
    assert_eq!(by_id("stmt-1#item-0002").match_type, MatchType::Exact);
    assert_eq!(
        by_id("stmt-1#item-0002").matched_document_id.as_deref(),
        Some("doc-1")
    );
    assert_eq!(by_id("stmt-1#item-0003").match_type, MatchType::Substring);
    assert_eq!(by_id("stmt-1#item-0005").match_type, MatchType::None);
    assert_eq!(by_id("stmt-1#item-0001").match_type, MatchType::None);
    assert_eq!(matches.results.len(), 6);

    // Artifact
    let artifact = storage
        .get_statement_json("tenant-1", "stmt-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(artifact["items"].as_array().unwrap().len(), 6);
    assert_eq!(artifact["items"][3]["document_type"], "credit_note");
    assert_eq!(artifact["validation"]["status"], "skipped");
}

#[tokio::test]
async fn test_reprocessing_is_idempotent_and_keeps_user_state() {
    let storage = MemoryStorage::new();
    let mut processor = StatementProcessor::new(storage.clone());
    processor.process(run(statement_rows())).await.unwrap();

    processor
        .set_item_completed("tenant-1", "stmt-1", "stmt-1#item-0002", true)
        .await
        .unwrap();
    processor
        .set_item_document_type("tenant-1", "stmt-1", "stmt-1#item-0005", DocumentType::CreditNote)
        .await
        .unwrap();

    let (_, before) = processor.get_statement("tenant-1", "stmt-1").await.unwrap();
    let second = processor.process(run(statement_rows())).await.unwrap();
    let (_, after) = processor.get_statement("tenant-1", "stmt-1").await.unwrap();

    assert_eq!(before, after);
    assert_eq!(second.items, after);
    assert!(second.inserted.is_empty());
    assert!(second.removed.is_empty());
    assert!(after[1].completed);
    assert_eq!(after[4].document_type, DocumentType::CreditNote);

    let third = processor.process(run(statement_rows())).await.unwrap();
    assert_eq!(third.items, after);
}

#[tokio::test]
async fn test_reprocessing_with_fewer_rows_removes_stale_items() {
    let storage = MemoryStorage::new();
    let mut processor = StatementProcessor::new(storage.clone());
    processor.process(run(statement_rows())).await.unwrap();

    let fewer: Vec<RawRow> = statement_rows().into_iter().take(3).collect();
    let report = processor.process(run(fewer)).await.unwrap();

    assert_eq!(report.removed.len(), 3);
    assert_eq!(
        storage.list_line_items("tenant-1", "stmt-1").await.unwrap().len(),
        3
    );
    assert_eq!(report.header.item_count, 3);
    assert_eq!(report.header.latest_item_date, NaiveDate::from_ymd_opt(2024, 3, 10));
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let storage = MemoryStorage::new();
    let mut processor = StatementProcessor::new(storage.clone());
    processor.process(run(statement_rows())).await.unwrap();

    let other = ExtractionRun::new("tenant-2", "contact-1", "stmt-1", supplier_config(), vec![
        row(1, "01/04/2024", "INV-1", "Goods", "10.00", ""),
    ]);
    processor.process(other).await.unwrap();

    assert_eq!(storage.list_line_items("tenant-1", "stmt-1").await.unwrap().len(), 6);
    assert_eq!(storage.list_line_items("tenant-2", "stmt-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_persistence_failure_is_fatal() {
    let storage = MemoryStorage::new();
    storage.set_fail_writes(true);
    let mut processor = StatementProcessor::new(storage);

    assert!(matches!(
        processor.process(run(statement_rows())).await,
        Err(ReconciliationError::Persistence(_))
    ));
}

#[tokio::test]
async fn test_validation_mismatch_does_not_abort() {
    let mut processor = StatementProcessor::new(MemoryStorage::new());
    let rows = vec![
        row(1, "03/03/2024", "INV-100", "Goods", "10.00", ""),
        row(2, "04/03/2024", "INV-101", "Goods", "20.00", ""),
    ];
    let text = "Statement of account\nINV-100 10.00\nINV-101 20.00\nINV-102 30.00";

    let report = processor
        .process(run(rows).with_source_text(text))
        .await
        .unwrap();

    match report.validation {
        ValidationOutcome::Mismatch(mismatch) => {
            assert!(mismatch.missing.is_empty());
            assert_eq!(mismatch.source_only, vec!["INV102".to_string()]);
        }
        other => panic!("expected mismatch, got {other:?}"),
    }
    assert_eq!(report.items.len(), 2);
}

#[tokio::test]
async fn test_strict_validator_rejects_clashing_separators() {
    let mut processor = StatementProcessor::with_validator(
        MemoryStorage::new(),
        Box::new(StrictColumnConfigValidator),
    );
    let config = supplier_config().with_separators(",", ",");
    let run = ExtractionRun::new("t", "c", "s", config, statement_rows());

    assert!(matches!(
        processor.process(run).await,
        Err(ReconciliationError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_processing_from_table_grids() {
    let tables = vec![
        TableGrid::from_strs(
            1,
            &[
                &["Acme Supplies", "", "", "", ""],
                &["Date", "Number", "Details", "Debit", "Credit"],
                &["03/03/2024", "INV-1", "Goods", "10.00", ""],
            ],
        ),
        TableGrid::from_strs(
            2,
            &[
                &["Date", "Number", "Details", "Debit", "Credit"],
                &["05/03/2024", "INV-2", "Goods", "20.00", ""],
                &["06/03/2024", "PMT-7", "Payment", "", "30.00"],
            ],
        ),
    ];
    let run = ExtractionRun::from_tables("t", "c", "s", supplier_config(), &tables);
    let mut processor = StatementProcessor::new(MemoryStorage::new())
        .with_config(EngineConfig::default());

    let report = processor.process(run).await.unwrap();

    let numbers: Vec<&str> = report.items.iter().map(|i| i.number.as_str()).collect();
    assert_eq!(numbers, vec!["INV-1", "INV-2", "PMT-7"]);
    assert_eq!(report.items[2].item_id, "s#item-0003");
    assert_eq!(report.items[2].document_type, DocumentType::Payment);
}
