//! Core types and data structures for statement reconciliation

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::parsing::{normalize_header, normalize_label, NumberFormat};

/// Document type assigned to a statement line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// A charge raised against the customer
    Invoice,
    /// A credit issued back to the customer
    CreditNote,
    /// Money received against the account
    Payment,
    /// Not enough evidence to decide
    #[default]
    Unknown,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::CreditNote => "credit_note",
            DocumentType::Payment => "payment",
            DocumentType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Signed role of a configured amount column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountRole {
    /// Amounts in this column increase what the customer owes
    Debit,
    /// Amounts in this column reduce what the customer owes
    Credit,
    /// A single running column: positive values are debits, negative values credits
    Signed,
}

impl AmountRole {
    /// Infer a role from a column label such as `Debit`, `Dr Amount` or `Amount CR`
    pub fn from_label(label: &str) -> Self {
        let norm = normalize_label(label);
        if Self::looks_debit(&norm) {
            AmountRole::Debit
        } else if Self::looks_credit(&norm) {
            AmountRole::Credit
        } else {
            AmountRole::Signed
        }
    }

    pub(crate) fn looks_debit(norm: &str) -> bool {
        ["debit", "dr"]
            .iter()
            .any(|hint| norm.starts_with(hint) || norm.ends_with(hint))
    }

    pub(crate) fn looks_credit(norm: &str) -> bool {
        ["credit", "cr"]
            .iter()
            .any(|hint| norm.starts_with(hint) || norm.ends_with(hint))
    }
}

/// A source column that carries an amount for the line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalColumn {
    /// Header label of the source column
    pub column: String,
    /// Explicit role; inferred from the label when absent
    #[serde(default)]
    pub role: Option<AmountRole>,
}

impl TotalColumn {
    /// Column whose role is inferred from its label
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            role: None,
        }
    }

    pub fn debit(column: impl Into<String>) -> Self {
        Self::with_role(column, AmountRole::Debit)
    }

    pub fn credit(column: impl Into<String>) -> Self {
        Self::with_role(column, AmountRole::Credit)
    }

    pub fn signed(column: impl Into<String>) -> Self {
        Self::with_role(column, AmountRole::Signed)
    }

    fn with_role(column: impl Into<String>, role: AmountRole) -> Self {
        Self {
            column: column.into(),
            role: Some(role),
        }
    }

    /// Role used for classification
    pub fn effective_role(&self) -> AmountRole {
        self.role
            .unwrap_or_else(|| AmountRole::from_label(&self.column))
    }
}

fn default_decimal_separator() -> String {
    ".".to_string()
}

fn default_thousands_separator() -> String {
    ",".to_string()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Per-tenant, per-counterparty mapping from semantic fields to source columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Column holding the document number (invoice number, credit note number, ...)
    #[serde(default)]
    pub number_column: Option<String>,
    /// Column holding the transaction date
    #[serde(default)]
    pub date_column: Option<String>,
    /// Column holding the due date
    #[serde(default)]
    pub due_date_column: Option<String>,
    /// Column holding free-text reference/description
    #[serde(default)]
    pub reference_column: Option<String>,
    /// Amount columns, in display order
    #[serde(default)]
    pub total_columns: Vec<TotalColumn>,
    /// Date template such as `DD/MM/YYYY` or `Do MMMM YYYY`
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: String,
    #[serde(default = "default_thousands_separator")]
    pub thousands_separator: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            number_column: None,
            date_column: None,
            due_date_column: None,
            reference_column: None,
            total_columns: Vec::new(),
            date_format: None,
            decimal_separator: default_decimal_separator(),
            thousands_separator: default_thousands_separator(),
        }
    }
}

impl ColumnConfig {
    /// Create a configuration with the given date template
    pub fn new(date_format: impl Into<String>) -> Self {
        Self {
            date_format: Some(date_format.into()),
            ..Self::default()
        }
    }

    pub fn with_number_column(mut self, column: impl Into<String>) -> Self {
        self.number_column = Some(column.into());
        self
    }

    pub fn with_date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = Some(column.into());
        self
    }

    pub fn with_due_date_column(mut self, column: impl Into<String>) -> Self {
        self.due_date_column = Some(column.into());
        self
    }

    pub fn with_reference_column(mut self, column: impl Into<String>) -> Self {
        self.reference_column = Some(column.into());
        self
    }

    pub fn with_total_column(mut self, column: TotalColumn) -> Self {
        self.total_columns.push(column);
        self
    }

    pub fn with_separators(
        mut self,
        decimal_separator: impl Into<String>,
        thousands_separator: impl Into<String>,
    ) -> Self {
        self.decimal_separator = decimal_separator.into();
        self.thousands_separator = thousands_separator.into();
        self
    }

    pub fn number_header(&self) -> Option<&str> {
        non_blank(&self.number_column)
    }

    pub fn date_header(&self) -> Option<&str> {
        non_blank(&self.date_column)
    }

    pub fn due_date_header(&self) -> Option<&str> {
        non_blank(&self.due_date_column)
    }

    pub fn reference_header(&self) -> Option<&str> {
        non_blank(&self.reference_column)
    }

    /// Amount columns with a non-blank header
    pub fn amount_columns(&self) -> impl Iterator<Item = &TotalColumn> {
        self.total_columns
            .iter()
            .filter(|c| !c.column.trim().is_empty())
    }

    /// The configured date template, or a configuration error when it is missing
    pub fn date_template(&self) -> ReconResult<&str> {
        non_blank(&self.date_format).ok_or_else(|| {
            ReconciliationError::Configuration(
                "date_format must be configured for this contact".to_string(),
            )
        })
    }

    pub fn number_format(&self) -> NumberFormat {
        NumberFormat::new(
            self.decimal_separator.clone(),
            self.thousands_separator.clone(),
        )
    }

    /// Header labels the configuration expects to find in a table
    pub fn header_candidates(&self) -> Vec<String> {
        let mut candidates: Vec<String> = [
            self.number_header(),
            self.date_header(),
            self.due_date_header(),
            self.reference_header(),
        ]
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
        candidates.extend(self.amount_columns().map(|c| c.column.trim().to_string()));
        candidates
    }

    /// Check the fields every extraction depends on.
    ///
    /// This is the single configuration gate: a missing `date_format`, or a
    /// configuration that maps neither a number column nor any amount column,
    /// aborts the run before any row is processed.
    pub fn validate(&self) -> ReconResult<()> {
        self.date_template()?;

        if self.number_header().is_none() && self.amount_columns().next().is_none() {
            return Err(ReconciliationError::Configuration(
                "either number_column or at least one total column must be configured"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// One extracted table row
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawRow {
    /// Position of the row within the extraction pass, starting at 1
    pub ordinal: usize,
    /// Header label to cell text, in column order
    pub cells: IndexMap<String, String>,
}

impl RawRow {
    pub fn new(ordinal: usize) -> Self {
        Self {
            ordinal,
            cells: IndexMap::new(),
        }
    }

    /// Build a row from (header, cell) pairs
    pub fn from_cells<I, K, V>(ordinal: usize, cells: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            ordinal,
            cells: cells
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn with_cell(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.cells.insert(header.into(), value.into());
        self
    }

    /// Look up a cell by header, ignoring case and whitespace differences
    pub fn get(&self, header: &str) -> Option<&str> {
        if let Some(value) = self.cells.get(header) {
            return Some(value.as_str());
        }
        let wanted = normalize_header(header);
        if wanted.is_empty() {
            return None;
        }
        self.cells
            .iter()
            .find(|(label, _)| normalize_header(label) == wanted)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(|v| v.trim().is_empty())
    }
}

/// Flag codes attached to line items
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Flag {
    /// A date cell had text that the configured template could not parse
    #[serde(rename = "invalid-date")]
    InvalidDate,
    /// The line has no document number
    #[serde(rename = "missing-number")]
    MissingNumber,
    /// The line looks like a balance or summary row rather than a transaction.
    /// The code keeps the label downstream consumers already understand.
    #[serde(rename = "ml-outlier")]
    Outlier,
}

impl Flag {
    pub fn code(&self) -> &'static str {
        match self {
            Flag::InvalidDate => "invalid-date",
            Flag::MissingNumber => "missing-number",
            Flag::Outlier => "ml-outlier",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

/// Structured evidence for a flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDetail {
    /// Field that triggered the flag (`date`, `number`, `reference`)
    pub field: String,
    /// Issue code, e.g. `invalid-date`, `missing-number`, `keyword-reference`
    pub issue: String,
    /// Keyword rule that fired, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    /// Offending value, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FlagDetail {
    pub fn new(field: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            issue: issue.into(),
            keyword: None,
            value: None,
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// One reconciled statement line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Deterministic id: parent statement id plus row ordinal
    pub item_id: String,
    /// Parent statement
    pub statement_id: String,
    /// Row ordinal within the extraction pass
    pub ordinal: usize,
    pub date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    /// Document number as printed on the statement (empty when missing)
    pub number: String,
    /// Free-text reference (empty when missing)
    pub reference: String,
    /// Classified (or manually corrected) document type
    pub document_type: DocumentType,
    /// Document type set by a user; survives reprocessing
    #[serde(default)]
    pub manual_document_type: Option<DocumentType>,
    /// Amount column label to signed amount
    pub total: IndexMap<String, BigDecimal>,
    /// Original cells, kept verbatim for audit
    pub raw: IndexMap<String, String>,
    pub flags: BTreeSet<Flag>,
    /// Flag code to evidence
    pub flag_details: BTreeMap<String, Vec<FlagDetail>>,
    /// User-controlled completion state
    pub completed: bool,
}

impl LineItem {
    /// Create an empty line item for the given row ordinal
    pub fn new(statement_id: impl Into<String>, ordinal: usize) -> Self {
        let statement_id = statement_id.into();
        Self {
            item_id: Self::item_id_for(&statement_id, ordinal),
            statement_id,
            ordinal,
            date: None,
            due_date: None,
            number: String::new(),
            reference: String::new(),
            document_type: DocumentType::Unknown,
            manual_document_type: None,
            total: IndexMap::new(),
            raw: IndexMap::new(),
            flags: BTreeSet::new(),
            flag_details: BTreeMap::new(),
            completed: false,
        }
    }

    /// Stable item id for a statement row
    pub fn item_id_for(statement_id: &str, ordinal: usize) -> String {
        format!("{statement_id}#item-{ordinal:04}")
    }

    /// Add a flag and its evidence; repeated calls with the same evidence are no-ops
    pub fn add_flag(&mut self, flag: Flag, detail: FlagDetail) {
        self.flags.insert(flag);
        let details = self.flag_details.entry(flag.code().to_string()).or_default();
        if !details.contains(&detail) {
            details.push(detail);
        }
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }

    /// Document type after applying any manual correction
    pub fn effective_document_type(&self) -> DocumentType {
        self.manual_document_type.unwrap_or(self.document_type)
    }
}

/// One reconciled statement document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementHeader {
    pub statement_id: String,
    pub tenant_id: String,
    /// Counterparty the statement was issued by
    pub contact_id: String,
    /// Derived from the line items; never edited by hand
    pub earliest_item_date: Option<NaiveDate>,
    /// Derived from the line items; never edited by hand
    pub latest_item_date: Option<NaiveDate>,
    pub item_count: usize,
    /// Aggregate completion state, owned by the surrounding workflow
    pub completed: bool,
    /// Extraction job that last produced the items
    pub job_id: Option<String>,
    pub created_at: NaiveDateTime,
}

impl StatementHeader {
    /// Create a header for a newly uploaded statement with a generated id
    pub fn new(tenant_id: impl Into<String>, contact_id: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), tenant_id, contact_id)
    }

    /// Create a header for a known statement id
    pub fn with_id(
        statement_id: impl Into<String>,
        tenant_id: impl Into<String>,
        contact_id: impl Into<String>,
    ) -> Self {
        Self {
            statement_id: statement_id.into(),
            tenant_id: tenant_id.into(),
            contact_id: contact_id.into(),
            earliest_item_date: None,
            latest_item_date: None,
            item_count: 0,
            completed: false,
            job_id: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Recompute the derived fields from the current item set
    pub fn recompute(&mut self, items: &[LineItem]) {
        self.earliest_item_date = items.iter().filter_map(|i| i.date).min();
        self.latest_item_date = items.iter().filter_map(|i| i.date).max();
        self.item_count = items.len();
    }
}

/// Kind of external ledger document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerDocumentKind {
    Invoice,
    CreditNote,
}

/// External invoice or credit note eligible for matching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDocument {
    pub id: String,
    pub number: String,
    pub kind: LedgerDocumentKind,
}

impl LedgerDocument {
    pub fn new(id: impl Into<String>, number: impl Into<String>, kind: LedgerDocumentKind) -> Self {
        Self {
            id: id.into(),
            number: number.into(),
            kind,
        }
    }

    pub fn invoice(id: impl Into<String>, number: impl Into<String>) -> Self {
        Self::new(id, number, LedgerDocumentKind::Invoice)
    }

    pub fn credit_note(id: impl Into<String>, number: impl Into<String>) -> Self {
        Self::new(id, number, LedgerDocumentKind::CreditNote)
    }
}

/// How a line item was matched to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Trimmed statement number equals the ledger number
    Exact,
    /// Normalised numbers contain one another
    Substring,
    None,
}

/// Outcome of matching one line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub line_item_id: String,
    /// Statement number as printed
    pub statement_number: String,
    pub matched_document_id: Option<String>,
    pub matched_document_number: Option<String>,
    pub matched_document_kind: Option<LedgerDocumentKind>,
    pub match_type: MatchType,
    /// Always exactly 1.0 when matched, absent otherwise
    pub match_score: Option<f64>,
}

impl MatchResult {
    pub fn matched(item: &LineItem, document: &LedgerDocument, match_type: MatchType) -> Self {
        Self {
            line_item_id: item.item_id.clone(),
            statement_number: item.number.clone(),
            matched_document_id: Some(document.id.clone()),
            matched_document_number: Some(document.number.clone()),
            matched_document_kind: Some(document.kind),
            match_type,
            match_score: Some(1.0),
        }
    }

    pub fn unmatched(item: &LineItem) -> Self {
        Self {
            line_item_id: item.item_id.clone(),
            statement_number: item.number.clone(),
            matched_document_id: None,
            matched_document_number: None,
            matched_document_kind: None,
            match_type: MatchType::None,
            match_score: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.match_type != MatchType::None
    }
}

/// Errors that can occur while reconciling a statement
#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Statement not found: {0}")]
    StatementNotFound(String),
    #[error("Line item not found: {0}")]
    LineItemNotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconciliationError>;
