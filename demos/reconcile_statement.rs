//! Processes a small supplier statement and matches it against a ledger.
//!
//! Run with `RUST_LOG=statement_recon=debug` to see classification decisions.

use statement_recon::{
    ColumnConfig, DocumentType, ExtractionRun, LedgerDocument, MemoryStorage, ReconResult,
    StatementProcessor, TableGrid, TotalColumn,
};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> ReconResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "statement_recon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ColumnConfig::new("DD/MM/YYYY")
        .with_date_column("Date")
        .with_number_column("Reference")
        .with_total_column(TotalColumn::new("Debit"))
        .with_total_column(TotalColumn::new("Credit"));

    let tables = vec![TableGrid::from_strs(
        1,
        &[
            &["Acme Supplies Ltd", "", "", ""],
            &["Date", "Reference", "Debit", "Credit"],
            &["01/03/2024", "Balance b/f", "500.00", ""],
            &["03/03/2024", "INV-12345", "1,200.00", ""],
            &["10/03/2024", "Invoice # INV 12346", "300.00", ""],
            &["12/03/2024", "Credit Note 9", "", "50.00"],
            &["20/03/2024", "Payment 456", "", "1,000.00"],
        ],
    )];

    let run = ExtractionRun::from_tables("tenant-1", "acme", "statement-1", config, &tables)
        .with_job_id("demo-job");

    let mut processor = StatementProcessor::new(MemoryStorage::new());
    let report = processor.process(run).await?;

    println!(
        "Statement {} ({:?} .. {:?})",
        report.header.statement_id, report.header.earliest_item_date, report.header.latest_item_date
    );
    for item in &report.items {
        let flags: Vec<&str> = item.flags.iter().map(|f| f.code()).collect();
        println!(
            "  #{:<2} {:<22} {:<12} {:?}",
            item.ordinal, item.number, item.document_type, flags
        );
    }

    let ledger = vec![
        LedgerDocument::invoice("doc-1", "INV-12345"),
        LedgerDocument::invoice("doc-2", "INV-12346"),
        LedgerDocument::credit_note("doc-3", "CN-0009"),
    ];
    let matches = processor
        .match_statement("tenant-1", "statement-1", &ledger)
        .await?;

    for result in &matches.results {
        println!(
            "  {:<22} -> {:<10} {:?}",
            result.statement_number,
            result.matched_document_id.as_deref().unwrap_or("-"),
            result.match_type
        );
    }

    processor
        .set_item_document_type("tenant-1", "statement-1", "statement-1#item-0001", DocumentType::Unknown)
        .await?;

    Ok(())
}
