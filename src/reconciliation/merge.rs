//! Idempotent merge of a fresh extraction into the persisted line items

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::types::LineItem;

/// Result of merging one extraction pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// The full item set after the merge, ordered by ordinal
    pub items: Vec<LineItem>,
    /// Ids not previously persisted
    pub inserted: Vec<String>,
    /// Ids that replaced a persisted item
    pub updated: Vec<String>,
    /// Persisted ids absent from the fresh pass
    pub removed: Vec<String>,
    pub earliest_item_date: Option<NaiveDate>,
    pub latest_item_date: Option<NaiveDate>,
}

/// Earliest and latest dated item
pub fn date_range(items: &[LineItem]) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let dates = items.iter().filter_map(|i| i.date);
    (dates.clone().min(), dates.max())
}

/// Reconciles re-extractions with what users have already worked on
#[derive(Debug, Clone, Default)]
pub struct ReconciliationMerger;

impl ReconciliationMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge a fresh pass into the existing items.
    ///
    /// Extracted fields come from the fresh pass. `completed` and any manual
    /// document type are carried over by item id; new items start
    /// uncompleted. Existing items missing from the fresh pass are removed.
    pub fn merge(&self, existing: &[LineItem], fresh: Vec<LineItem>) -> MergeOutcome {
        let previous: HashMap<&str, &LineItem> = existing
            .iter()
            .map(|item| (item.item_id.as_str(), item))
            .collect();

        let mut seen = HashSet::with_capacity(fresh.len());
        let mut items = Vec::with_capacity(fresh.len());
        let mut inserted = Vec::new();
        let mut updated = Vec::new();

        for mut item in fresh {
            if !seen.insert(item.item_id.clone()) {
                warn!(item_id = %item.item_id, "Duplicate item id in extraction, keeping the first");
                continue;
            }

            match previous.get(item.item_id.as_str()) {
                Some(prior) => {
                    item.completed = prior.completed;
                    item.manual_document_type = prior.manual_document_type;
                    if let Some(manual) = prior.manual_document_type {
                        item.document_type = manual;
                    }
                    updated.push(item.item_id.clone());
                }
                None => {
                    item.completed = false;
                    item.manual_document_type = None;
                    inserted.push(item.item_id.clone());
                }
            }
            items.push(item);
        }

        items.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.item_id.cmp(&b.item_id)));

        let mut removed: Vec<String> = existing
            .iter()
            .filter(|item| !seen.contains(&item.item_id))
            .map(|item| item.item_id.clone())
            .collect();
        removed.sort();
        removed.dedup();

        let (earliest_item_date, latest_item_date) = date_range(&items);

        info!(
            inserted = inserted.len(),
            updated = updated.len(),
            removed = removed.len(),
            "Merged line items"
        );

        MergeOutcome {
            items,
            inserted,
            updated,
            removed,
            earliest_item_date,
            latest_item_date,
        }
    }
}
