//! One-to-one matching of statement lines to ledger documents
//!
//! Exact number matches are taken first, then substring matches on the
//! normalised numbers. A ledger document is reserved, by id and by number,
//! as soon as it matches, so no document is used twice in a pass.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::parsing::compact_upper;
use crate::types::*;

/// Numbers containing these words are never substring-matched
const PAYMENT_KEYWORDS: &[&str] = &["payment", "paid", "remittance", "receipt"];

/// Whether a statement number reads like a payment reference
pub fn is_payment_reference(number: &str) -> bool {
    let lower = number.to_lowercase();
    PAYMENT_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Ledger documents already used in the current pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservations {
    document_ids: HashSet<String>,
    document_numbers: HashSet<String>,
}

impl Reservations {
    pub fn reserve(&mut self, document: &LedgerDocument) {
        self.document_ids.insert(document.id.clone());
        self.document_numbers
            .insert(document.number.trim().to_string());
    }

    /// A document is unavailable once its id or its number has been used
    pub fn is_reserved(&self, document: &LedgerDocument) -> bool {
        self.document_ids.contains(&document.id)
            || self.document_numbers.contains(document.number.trim())
    }

    pub fn len(&self) -> usize {
        self.document_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document_ids.is_empty()
    }
}

/// Results of one matching pass, one per line item in item order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub results: Vec<MatchResult>,
    pub reservations: Reservations,
}

impl MatchReport {
    pub fn result_for(&self, item_id: &str) -> Option<&MatchResult> {
        self.results.iter().find(|r| r.line_item_id == item_id)
    }

    pub fn matched(&self) -> impl Iterator<Item = &MatchResult> {
        self.results.iter().filter(|r| r.is_matched())
    }

    pub fn count(&self, match_type: MatchType) -> usize {
        self.results
            .iter()
            .filter(|r| r.match_type == match_type)
            .count()
    }
}

/// Matches line items against a ledger snapshot
#[derive(Debug, Clone, Default)]
pub struct MatchingEngine;

impl MatchingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run one matching pass. Nothing is persisted; re-run whenever the
    /// ledger or the items change.
    pub fn match_items(&self, items: &[LineItem], ledger: &[LedgerDocument]) -> MatchReport {
        let mut reservations = Reservations::default();
        let mut outcomes: HashMap<usize, (&LedgerDocument, MatchType)> = HashMap::new();

        // A later line with the same number shadows an earlier one
        let mut by_number: HashMap<&str, usize> = HashMap::new();
        let mut first_seen: Vec<&str> = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            let key = item.number.trim();
            if key.is_empty() {
                continue;
            }
            if by_number.insert(key, idx).is_none() {
                first_seen.push(key);
            } else {
                debug!(item_id = %item.item_id, number = key, "Number repeated in statement");
            }
        }

        for document in ledger {
            let key = document.number.trim();
            if key.is_empty() || reservations.is_reserved(document) {
                continue;
            }
            let Some(&idx) = by_number.get(key) else {
                continue;
            };
            if outcomes.contains_key(&idx) {
                continue;
            }
            info!(
                item_id = %items[idx].item_id,
                document_id = %document.id,
                number = key,
                match_type = "exact",
                "Matched statement line"
            );
            reservations.reserve(document);
            outcomes.insert(idx, (document, MatchType::Exact));
        }

        // Numbers compete for substring hits in order of first appearance
        for key in first_seen {
            let Some(&idx) = by_number.get(key) else {
                continue;
            };
            if outcomes.contains_key(&idx) {
                continue;
            }
            let item = &items[idx];
            if is_payment_reference(key) {
                info!(item_id = %item.item_id, number = key, "Skipping payment reference");
                continue;
            }

            let target = compact_upper(key);
            if target.is_empty() {
                continue;
            }

            let mut best: Option<(&LedgerDocument, usize)> = None;
            for document in ledger {
                if reservations.is_reserved(document) {
                    continue;
                }
                let candidate = compact_upper(document.number.trim());
                if candidate.is_empty() {
                    continue;
                }
                if (candidate.contains(&target) || target.contains(&candidate))
                    && best.map_or(true, |(_, len)| candidate.len() > len)
                {
                    best = Some((document, candidate.len()));
                }
            }

            match best {
                Some((document, _)) => {
                    info!(
                        item_id = %item.item_id,
                        document_id = %document.id,
                        number = key,
                        match_type = "substring",
                        "Matched statement line"
                    );
                    reservations.reserve(document);
                    outcomes.insert(idx, (document, MatchType::Substring));
                }
                None => info!(item_id = %item.item_id, number = key, "No ledger match"),
            }
        }

        let results = items
            .iter()
            .enumerate()
            .map(|(idx, item)| match outcomes.get(&idx) {
                Some((document, match_type)) => MatchResult::matched(item, document, *match_type),
                None => MatchResult::unmatched(item),
            })
            .collect();

        MatchReport {
            results,
            reservations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(ordinal: usize, number: &str) -> LineItem {
        let mut item = LineItem::new("stmt", ordinal);
        item.number = number.to_string();
        item
    }

    #[test]
    fn test_exact_match() {
        let ledger = vec![LedgerDocument::invoice("doc-1", "INV-12345")];
        let report = MatchingEngine::new().match_items(&[line(1, " INV-12345 ")], &ledger);

        let result = &report.results[0];
        assert_eq!(result.match_type, MatchType::Exact);
        assert_eq!(result.matched_document_id.as_deref(), Some("doc-1"));
        assert_eq!(result.match_score, Some(1.0));
    }

    #[test]
    fn test_substring_match_on_normalised_numbers() {
        let ledger = vec![LedgerDocument::invoice("doc-1", "INV-12345")];
        let report = MatchingEngine::new().match_items(&[line(1, "Invoice # INV 12345")], &ledger);

        assert_eq!(report.results[0].match_type, MatchType::Substring);
        assert_eq!(report.results[0].match_score, Some(1.0));
    }

    #[test]
    fn test_payment_reference_is_not_substring_matched() {
        let ledger = vec![LedgerDocument::invoice("doc-1", "456")];
        let report = MatchingEngine::new().match_items(&[line(1, "Payment 456")], &ledger);

        assert_eq!(report.results[0].match_type, MatchType::None);
        assert_eq!(report.results[0].match_score, None);
    }

    #[test]
    fn test_payment_reference_still_matches_exactly() {
        let ledger = vec![LedgerDocument::invoice("doc-1", "Payment 456")];
        let report = MatchingEngine::new().match_items(&[line(1, "Payment 456")], &ledger);
        assert_eq!(report.results[0].match_type, MatchType::Exact);
    }

    #[test]
    fn test_documents_are_used_once() {
        let ledger = vec![LedgerDocument::invoice("doc-1", "INV-1")];
        let items = vec![line(1, "INV-1"), line(2, "Re INV-1")];
        let report = MatchingEngine::new().match_items(&items, &ledger);

        assert_eq!(report.results[0].match_type, MatchType::Exact);
        assert_eq!(report.results[1].match_type, MatchType::None);
        assert_eq!(report.reservations.len(), 1);
    }

    #[test]
    fn test_reserved_number_blocks_second_document() {
        let ledger = vec![
            LedgerDocument::invoice("doc-1", "INV-7"),
            LedgerDocument::credit_note("doc-2", "INV-7"),
        ];
        let items = vec![line(1, "INV-7"), line(2, "INV-7/A")];
        let report = MatchingEngine::new().match_items(&items, &ledger);

        assert_eq!(report.results[0].matched_document_id.as_deref(), Some("doc-1"));
        assert_eq!(report.results[1].match_type, MatchType::None);
    }

    #[test]
    fn test_longest_candidate_wins() {
        let ledger = vec![
            LedgerDocument::invoice("short", "123"),
            LedgerDocument::invoice("long", "INV-123"),
        ];
        let report = MatchingEngine::new().match_items(&[line(1, "Ref INV123")], &ledger);
        assert_eq!(report.results[0].matched_document_id.as_deref(), Some("long"));
    }

    #[test]
    fn test_later_duplicate_number_shadows_earlier() {
        let ledger = vec![LedgerDocument::invoice("doc-1", "INV-9")];
        let items = vec![line(1, "INV-9"), line(2, "INV-9")];
        let report = MatchingEngine::new().match_items(&items, &ledger);

        assert_eq!(report.results[0].match_type, MatchType::None);
        assert_eq!(report.results[1].match_type, MatchType::Exact);
    }

    #[test]
    fn test_repeated_number_competes_at_first_appearance() {
        let ledger = vec![LedgerDocument::invoice("doc-1", "AB12")];
        let items = vec![line(1, "AB1"), line(2, "B12"), line(3, "AB1")];
        let report = MatchingEngine::new().match_items(&items, &ledger);

        assert_eq!(report.results[0].match_type, MatchType::None);
        assert_eq!(report.results[1].match_type, MatchType::None);
        assert_eq!(report.results[2].match_type, MatchType::Substring);
        assert_eq!(report.results[2].matched_document_id.as_deref(), Some("doc-1"));
    }

    #[test]
    fn test_blank_numbers_never_match() {
        let ledger = vec![LedgerDocument::invoice("doc-1", "")];
        let report = MatchingEngine::new().match_items(&[line(1, "  ")], &ledger);
        assert_eq!(report.count(MatchType::None), 1);
    }

    #[test]
    fn test_one_result_per_item_in_order() {
        let ledger = vec![LedgerDocument::invoice("doc-1", "A1")];
        let items = vec![line(1, "Z9"), line(2, "A1"), line(3, "")];
        let report = MatchingEngine::new().match_items(&items, &ledger);

        let ids: Vec<_> = report.results.iter().map(|r| r.line_item_id.as_str()).collect();
        assert_eq!(ids, vec!["stmt#item-0001", "stmt#item-0002", "stmt#item-0003"]);
        assert_eq!(report.matched().count(), 1);
    }
}
