//! Flagging lines that look like balances or summaries rather than documents

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

use crate::config::AnomalySettings;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Constraint {
    Always,
    /// Only on short texts
    Short,
    /// Only on short texts without any digit ("Balance 2023" is a document)
    ShortWithoutNumber,
}

struct KeywordRule {
    tokens: &'static [&'static str],
    label: &'static str,
    constraint: Constraint,
}

const fn rule(tokens: &'static [&'static str], label: &'static str) -> KeywordRule {
    KeywordRule {
        tokens,
        label,
        constraint: Constraint::Always,
    }
}

/// Checked in order; the first rule whose tokens are all present wins
const KEYWORD_RULES: &[KeywordRule] = &[
    rule(&["brought", "forward"], "brought forward"),
    rule(&["carried", "forward"], "carried forward"),
    rule(&["balance", "forward"], "balance forward"),
    rule(&["forward", "balance"], "forward balance"),
    rule(&["balance", "b", "f"], "balance b/f"),
    rule(&["balance", "c", "f"], "balance c/f"),
    rule(&["balance", "bf"], "balance bf"),
    rule(&["balance", "cf"], "balance cf"),
    rule(&["closing", "balance"], "closing balance"),
    rule(&["opening", "balance"], "opening balance"),
    rule(&["previous", "balance"], "previous balance"),
    rule(&["statement", "balance"], "statement balance"),
    rule(&["statement", "total"], "statement total"),
    rule(&["outstanding", "balance"], "outstanding balance"),
    rule(&["ending", "balance"], "ending balance"),
    rule(&["final", "balance"], "final balance"),
    rule(&["amount", "due"], "amount due"),
    rule(&["balance", "brought"], "balance brought"),
    rule(&["balance", "carried"], "balance carried"),
    KeywordRule {
        tokens: &["summary"],
        label: "summary",
        constraint: Constraint::Short,
    },
    KeywordRule {
        tokens: &["balance"],
        label: "balance",
        constraint: Constraint::ShortWithoutNumber,
    },
];

/// Lowercase, turn `/` and punctuation into spaces, split on whitespace
fn keyword_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// One flagged line in the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedItem {
    pub item_id: String,
    pub ordinal: usize,
    pub issues: Vec<String>,
}

/// What one detection pass found
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub total: usize,
    pub flagged: usize,
    /// Issue code to number of occurrences
    pub rules: BTreeMap<String, usize>,
    pub flagged_items: Vec<FlaggedItem>,
}

/// Keyword-based detection of non-document lines
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    settings: AnomalySettings,
}

impl AnomalyDetector {
    pub fn new(settings: AnomalySettings) -> Self {
        Self { settings }
    }

    /// Label of the first keyword rule the text triggers
    pub fn keyword_hit(&self, text: &str) -> Option<&'static str> {
        let tokens = keyword_tokens(text);
        if tokens.is_empty() {
            return None;
        }
        let present: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        let short = tokens.len() <= self.settings.short_text_max_tokens;

        KEYWORD_RULES
            .iter()
            .find(|rule| {
                rule.tokens.iter().all(|t| present.contains(t))
                    && match rule.constraint {
                        Constraint::Always => true,
                        Constraint::Short => short,
                        Constraint::ShortWithoutNumber => {
                            short && !text.chars().any(|c| c.is_ascii_digit())
                        }
                    }
            })
            .map(|rule| rule.label)
    }

    /// Flags and evidence for one line
    pub fn inspect(&self, item: &LineItem) -> Vec<(Flag, FlagDetail)> {
        let mut found = Vec::new();
        let number = item.number.trim();
        if number.is_empty() {
            found.push((
                Flag::MissingNumber,
                FlagDetail::new("number", Flag::MissingNumber.code()),
            ));
        } else if let Some(keyword) = self.keyword_hit(number) {
            found.push((
                Flag::Outlier,
                FlagDetail::new("number", "keyword-number")
                    .with_keyword(keyword)
                    .with_value(number),
            ));
        }

        let reference = item.reference.trim();
        if !reference.is_empty() {
            if let Some(keyword) = self.keyword_hit(reference) {
                found.push((
                    Flag::Outlier,
                    FlagDetail::new("reference", "keyword-reference")
                        .with_keyword(keyword)
                        .with_value(reference),
                ));
            }
        }
        found
    }

    /// Add flags to every item and summarise. Flags are only ever added,
    /// so running the detector twice leaves the items unchanged.
    pub fn apply(&self, items: &mut [LineItem]) -> AnomalySummary {
        let mut summary = AnomalySummary {
            total: items.len(),
            ..AnomalySummary::default()
        };

        for item in items.iter_mut() {
            let found = self.inspect(item);
            if found.is_empty() {
                continue;
            }
            let mut issues = Vec::with_capacity(found.len());
            for (flag, detail) in found {
                *summary.rules.entry(detail.issue.clone()).or_default() += 1;
                issues.push(detail.issue.clone());
                item.add_flag(flag, detail);
            }
            summary.flagged_items.push(FlaggedItem {
                item_id: item.item_id.clone(),
                ordinal: item.ordinal,
                issues,
            });
        }
        summary.flagged = summary.flagged_items.len();

        info!(
            total = summary.total,
            flagged = summary.flagged,
            rules = ?summary.rules,
            "Anomaly flagging complete"
        );
        summary
    }
}
