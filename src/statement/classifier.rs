//! Document type classification from amount columns and keywords
//!
//! The amount buckets decide which types are possible; keywords in the
//! number and reference text choose between them.

use bigdecimal::{BigDecimal, Zero};
use std::collections::HashMap;
use tracing::debug;

use crate::config::ClassifierSettings;
use crate::parsing::{compact_upper, has_amount, normalize_label, NumberFormat};
use crate::types::*;

const PAYMENT_SYNONYMS: &[&str] = &[
    "payment",
    "paid",
    "receipt",
    "remittance",
    "banktransfer",
    "directdebit",
    "ddpayment",
    "cashreceipt",
];

const CREDIT_NOTE_SYNONYMS: &[&str] = &["creditnote", "credit", "creditmemo", "crn", "cr", "cn"];

const INVOICE_SYNONYMS: &[&str] = &["invoice", "inv", "taxinvoice", "bill"];

/// Evaluation order; ties go to the earlier entry
const SYNONYM_TABLE: &[(DocumentType, &[&str])] = &[
    (DocumentType::Payment, PAYMENT_SYNONYMS),
    (DocumentType::CreditNote, CREDIT_NOTE_SYNONYMS),
    (DocumentType::Invoice, INVOICE_SYNONYMS),
];

/// Short synonyms only count as whole tokens or prefixes, never as substrings
const MIN_CONTAINMENT_LEN: usize = 4;

/// Evidence behind a classification
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub document_type: DocumentType,
    pub has_debit: bool,
    pub has_credit: bool,
    pub score: f64,
    pub synonym: Option<&'static str>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct KeywordHit {
    document_type: DocumentType,
    score: f64,
    synonym: &'static str,
    token: Option<String>,
}

/// Assigns document types to line items
#[derive(Debug, Clone)]
pub struct ItemClassifier {
    roles: HashMap<String, AmountRole>,
    number_format: NumberFormat,
    settings: ClassifierSettings,
}

impl ItemClassifier {
    pub fn new(config: &ColumnConfig, settings: ClassifierSettings) -> Self {
        let roles = config
            .amount_columns()
            .map(|c| (normalize_label(&c.column), c.effective_role()))
            .collect();
        Self {
            roles,
            number_format: config.number_format(),
            settings,
        }
    }

    fn role_for(&self, label: &str) -> AmountRole {
        let norm = normalize_label(label);
        self.roles
            .get(&norm)
            .copied()
            .unwrap_or_else(|| AmountRole::from_label(label))
    }

    /// Which sides of the ledger the line carries a non-zero amount on
    pub fn amount_buckets(&self, item: &LineItem) -> (bool, bool) {
        let zero = BigDecimal::zero();
        let mut debit = false;
        let mut credit = false;

        for (label, amount) in &item.total {
            if amount.is_zero() {
                continue;
            }
            match self.role_for(label) {
                AmountRole::Debit => debit = true,
                AmountRole::Credit => credit = true,
                AmountRole::Signed if *amount > zero => debit = true,
                AmountRole::Signed => credit = true,
            }
        }

        if !debit || !credit {
            for (header, cell) in &item.raw {
                let norm = normalize_label(header);
                if self.roles.contains_key(&norm) {
                    continue;
                }
                let has_value = || has_amount(cell, &self.number_format);
                if !debit && AmountRole::looks_debit(&norm) && has_value() {
                    debit = true;
                } else if !credit && AmountRole::looks_credit(&norm) && has_value() {
                    credit = true;
                }
            }
        }

        (debit, credit)
    }

    fn token_score(&self, token: &str, synonym: &str) -> f64 {
        let shorter = token.len().min(synonym.len());
        let score = if token == synonym {
            1.0
        } else if shorter >= 2 && (token.starts_with(synonym) || synonym.starts_with(token)) {
            0.9
        } else {
            similarity_ratio(token, synonym)
        };

        if synonym.len() <= 2 {
            score.min(self.settings.short_token_score_cap)
        } else {
            score
        }
    }

    fn best_keyword(&self, text: &str, candidates: &[DocumentType]) -> Option<KeywordHit> {
        let compact = compact_upper(text);
        if compact.is_empty() {
            return None;
        }
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_ascii_uppercase())
            .collect();

        let mut best: Option<KeywordHit> = None;
        for (document_type, synonyms) in SYNONYM_TABLE {
            if !candidates.contains(document_type) {
                continue;
            }
            for &synonym in *synonyms {
                let upper = synonym.to_ascii_uppercase();
                let hit = if upper.len() >= MIN_CONTAINMENT_LEN && compact.contains(&upper) {
                    KeywordHit {
                        document_type: *document_type,
                        score: 1.0,
                        synonym,
                        token: None,
                    }
                } else {
                    let mut token_best: Option<(f64, &String)> = None;
                    for token in &tokens {
                        let score = self.token_score(token, &upper);
                        if token_best.map_or(true, |(s, _)| score > s) {
                            token_best = Some((score, token));
                        }
                    }
                    let Some((score, token)) = token_best else {
                        continue;
                    };
                    KeywordHit {
                        document_type: *document_type,
                        score,
                        synonym,
                        token: Some(token.clone()),
                    }
                };

                if best.as_ref().map_or(true, |b| hit.score > b.score) {
                    best = Some(hit);
                }
            }
        }
        best
    }

    /// Classify one line item without modifying it
    pub fn classify(&self, item: &LineItem) -> Classification {
        let (has_debit, has_credit) = self.amount_buckets(item);
        let mut classification = Classification {
            document_type: DocumentType::Unknown,
            has_debit,
            has_credit,
            score: 0.0,
            synonym: None,
            token: None,
        };

        let (candidates, default): (&[DocumentType], DocumentType) = match (has_debit, has_credit) {
            (true, false) => {
                classification.document_type = DocumentType::Invoice;
                return classification;
            }
            (false, false) => return classification,
            (false, true) => (
                &[DocumentType::Payment, DocumentType::CreditNote],
                DocumentType::Payment,
            ),
            (true, true) => (
                &[
                    DocumentType::Payment,
                    DocumentType::CreditNote,
                    DocumentType::Invoice,
                ],
                DocumentType::Invoice,
            ),
        };

        let text = format!("{} {}", item.number, item.reference);
        classification.document_type = default;
        if let Some(hit) = self.best_keyword(&text, candidates) {
            if hit.score > 0.0 && hit.score >= self.settings.min_confidence(hit.document_type) {
                classification.document_type = hit.document_type;
                classification.score = hit.score;
                classification.synonym = Some(hit.synonym);
                classification.token = hit.token;
            }
        }
        classification
    }

    /// Classify items in place, leaving manual corrections untouched
    pub fn apply(&self, items: &mut [LineItem]) {
        for item in items.iter_mut() {
            if let Some(manual) = item.manual_document_type {
                item.document_type = manual;
                continue;
            }
            let result = self.classify(item);
            debug!(
                item_id = %item.item_id,
                document_type = %result.document_type,
                debit = result.has_debit,
                credit = result.has_credit,
                score = result.score,
                synonym = result.synonym.unwrap_or(""),
                token = result.token.as_deref().unwrap_or(""),
                "Classified line item"
            );
            item.document_type = result.document_type;
        }
    }
}

/// Ratcliff/Obershelp similarity in `[0, 1]`
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (ai, bi, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..ai], &b[..bi]) + matching_chars(&a[ai + len..], &b[bi + len..])
}

fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        for j in 0..b.len() {
            cur[j + 1] = if a[i] == b[j] { prev[j] + 1 } else { 0 };
            let len = cur[j + 1];
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn config() -> ColumnConfig {
        ColumnConfig::new("DD/MM/YYYY")
            .with_number_column("Number")
            .with_total_column(TotalColumn::new("Debit"))
            .with_total_column(TotalColumn::new("Credit"))
    }

    fn classifier() -> ItemClassifier {
        ItemClassifier::new(&config(), ClassifierSettings::default())
    }

    fn item(number: &str, debit: Option<&str>, credit: Option<&str>) -> LineItem {
        let mut item = LineItem::new("s", 1);
        item.number = number.to_string();
        if let Some(d) = debit {
            item.total.insert("Debit".to_string(), BigDecimal::from_str(d).unwrap());
        }
        if let Some(c) = credit {
            item.total.insert("Credit".to_string(), BigDecimal::from_str(c).unwrap());
        }
        item
    }

    #[test]
    fn test_debit_only_is_invoice() {
        let result = classifier().classify(&item("INV-1", Some("100"), None));
        assert_eq!(result.document_type, DocumentType::Invoice);
    }

    #[test]
    fn test_credit_only_defaults_to_payment() {
        let result = classifier().classify(&item("12345", None, Some("50")));
        assert_eq!(result.document_type, DocumentType::Payment);
    }

    #[test]
    fn test_credit_note_keyword_on_credit_line() {
        let result = classifier().classify(&item("Credit Note 9", None, Some("50")));
        assert_eq!(result.document_type, DocumentType::CreditNote);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_short_synonym_does_not_match_inside_words() {
        // "CR" appears inside "ACCRUAL" but is not a token
        let result = classifier().classify(&item("ACCRUAL 7", None, Some("50")));
        assert_eq!(result.document_type, DocumentType::Payment);

        // A bare "CN" token scores at most the cap
        let capped = classifier().classify(&item("CN 12", None, Some("50")));
        assert_eq!(capped.score, 0.8);
        assert_eq!(capped.document_type, DocumentType::CreditNote);
    }

    #[test]
    fn test_both_sides_uses_keywords_then_invoice() {
        let result = classifier().classify(&item("Payment received", Some("10"), Some("10")));
        assert_eq!(result.document_type, DocumentType::Payment);

        let result = classifier().classify(&item("X-9", Some("10"), Some("10")));
        assert_eq!(result.document_type, DocumentType::Invoice);
    }

    #[test]
    fn test_no_amounts_is_unknown() {
        let result = classifier().classify(&item("INV-1", None, None));
        assert_eq!(result.document_type, DocumentType::Unknown);
    }

    #[test]
    fn test_signed_column_uses_sign() {
        let config = ColumnConfig::new("DD/MM/YYYY").with_total_column(TotalColumn::new("Amount"));
        let classifier = ItemClassifier::new(&config, ClassifierSettings::default());

        let mut negative = LineItem::new("s", 1);
        negative
            .total
            .insert("Amount".to_string(), BigDecimal::from_str("-20").unwrap());
        assert_eq!(classifier.amount_buckets(&negative), (false, true));

        let mut positive = LineItem::new("s", 2);
        positive
            .total
            .insert("Amount".to_string(), BigDecimal::from_str("20").unwrap());
        assert_eq!(classifier.amount_buckets(&positive), (true, false));
    }

    #[test]
    fn test_raw_cells_fill_missing_bucket() {
        let mut line = item("123", None, None);
        line.raw.insert("Amount Dr".to_string(), "12.00".to_string());
        assert_eq!(classifier().amount_buckets(&line), (true, false));
    }

    #[test]
    fn test_manual_override_is_kept() {
        let mut items = vec![item("INV-1", Some("100"), None)];
        items[0].manual_document_type = Some(DocumentType::Payment);
        classifier().apply(&mut items);
        assert_eq!(items[0].document_type, DocumentType::Payment);
    }

    #[test]
    fn test_similarity_ratio() {
        assert_eq!(similarity_ratio("abcd", "abcd"), 1.0);
        assert_eq!(similarity_ratio("abcd", "wxyz"), 0.0);
        assert!((similarity_ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
    }
}
