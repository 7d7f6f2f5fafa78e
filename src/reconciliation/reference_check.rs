//! Best-effort cross-check of extracted references against the source text
//!
//! Two directions are checked. Every extracted reference must appear in the
//! source text, and the source text must not contain further references of
//! the same "family" that the extraction missed. A disagreement is reported
//! as a [`ValidationMismatch`]; callers log it and carry on.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::config::{ReferenceField, ValidationSettings};
use crate::types::LineItem;

static SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z0-9]+").unwrap());

static FAMILY_MEMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]*)([0-9]+)$").unwrap());

/// Spans containing these are skipped when scanning (times, section numbers)
const HARD_SEPARATORS: &[char] = &[':', '.'];

/// Uppercase and drop whitespace, `-`, `_`, `/` and `.`
pub fn normalize_reference(value: &str) -> String {
    value
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_' | '/' | '.'))
        .collect()
}

/// Extracted references disagree with the source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error(
    "extracted references disagree with source text: {found} of {checked} found, {} missing, {} only in source",
    .missing.len(),
    .source_only.len()
)]
pub struct ValidationMismatch {
    pub checked: usize,
    pub found: usize,
    pub unique_references: usize,
    /// Extracted references not present in the source text
    pub missing: Vec<String>,
    /// Family matches in the source text that were not extracted
    pub source_only: Vec<String>,
}

/// A check that found no disagreement
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// No source text was available, so nothing was compared
    pub skipped: bool,
    pub checked: usize,
    pub source_candidates: usize,
}

/// Validation outcome as recorded in reports and artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Passed { checked: usize, source_candidates: usize },
    Skipped,
    Mismatch(ValidationMismatch),
}

impl From<Result<ValidationReport, ValidationMismatch>> for ValidationOutcome {
    fn from(result: Result<ValidationReport, ValidationMismatch>) -> Self {
        match result {
            Ok(report) if report.skipped => ValidationOutcome::Skipped,
            Ok(report) => ValidationOutcome::Passed {
                checked: report.checked,
                source_candidates: report.source_candidates,
            },
            Err(mismatch) => ValidationOutcome::Mismatch(mismatch),
        }
    }
}

fn digit_range(prefix: &str, lo: usize, hi: usize) -> String {
    if lo == hi {
        format!(r"{prefix}[0-9]{{{lo}}}")
    } else {
        format!(r"{prefix}[0-9]{{{lo},{hi}}}")
    }
}

/// Learn a regex matching the family of the given references
/// (`INV10231`, `INV10297` -> `INV102[0-9]{2}`). Returns `None` without examples.
pub fn learn_reference_family(refs: &[String], settings: &ValidationSettings) -> Option<Regex> {
    let examples: BTreeSet<String> = refs
        .iter()
        .filter(|r| !r.trim().is_empty())
        .map(|r| normalize_reference(r))
        .filter(|r| !r.is_empty())
        .collect();
    if examples.is_empty() {
        return None;
    }

    let mut families: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut leftovers = Vec::new();
    for example in &examples {
        match FAMILY_MEMBER.captures(example) {
            Some(caps) => families
                .entry(caps[1].to_string())
                .or_default()
                .push(caps[2].to_string()),
            None => leftovers.push(regex::escape(example)),
        }
    }

    let mut parts = Vec::new();
    for (prefix, tails) in &families {
        let escaped = regex::escape(prefix);
        let lo = tails.iter().map(String::len).min().unwrap_or(0);
        let hi = tails.iter().map(String::len).max().unwrap_or(0);

        if tails.len() < settings.min_samples_for_prefixing || lo == 0 {
            parts.push(digit_range(&escaped, lo, hi));
            continue;
        }

        let mut buckets: IndexMap<&str, usize> = IndexMap::new();
        for tail in tails {
            let key = &tail[..settings.digit_prefix_len.min(tail.len())];
            *buckets.entry(key).or_default() += 1;
        }

        let total = tails.len() as f64;
        let share = settings.coverage_threshold / buckets.len().max(1) as f64;
        let mut kept: Vec<&str> = buckets
            .iter()
            .filter(|&(_, &count)| count as f64 / total >= share || count >= 2)
            .map(|(&key, _)| key)
            .collect();
        if kept.is_empty() {
            let mut by_count: Vec<(&str, usize)> = buckets.iter().map(|(&k, &c)| (k, c)).collect();
            by_count.sort_by(|a, b| b.1.cmp(&a.1));
            let mut covered = 0;
            for (key, count) in by_count {
                kept.push(key);
                covered += count;
                if covered as f64 / total >= settings.coverage_threshold {
                    break;
                }
            }
        }

        let covered: usize = kept.iter().filter_map(|k| buckets.get(k)).sum();
        if (covered as f64) / total < settings.coverage_threshold {
            parts.push(digit_range(&escaped, lo, hi));
            continue;
        }

        for key in kept {
            let lens = tails.iter().filter(|t| t.starts_with(key)).map(String::len);
            let lo_k = lens.clone().min().unwrap_or(key.len());
            let hi_k = lens.max().unwrap_or(key.len());
            let head = format!("{escaped}{}", regex::escape(key));
            parts.push(digit_range(
                &head,
                lo_k.saturating_sub(key.len()),
                hi_k.saturating_sub(key.len()),
            ));
        }
    }

    if !leftovers.is_empty() {
        parts.push(format!("(?:{})", leftovers.join("|")));
    }

    let pattern = format!("^(?:{})$", parts.join("|"));
    match Regex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!(pattern, error = %e, "Could not build reference family pattern");
            None
        }
    }
}

/// Family matches found in the source text, joining up to `ngram_max`
/// adjacent alphanumeric spans so `INV 123` is seen as `INV123`
pub fn scan_source_candidates(text: &str, family: &Regex, ngram_max: usize) -> BTreeSet<String> {
    let upper = text.to_uppercase();
    let spans: Vec<(usize, usize)> = SPAN
        .find_iter(&upper)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut candidates = BTreeSet::new();
    for n in 1..=ngram_max.min(spans.len()) {
        for window in spans.windows(n) {
            let segment = &upper[window[0].0..window[n - 1].1];
            if segment.contains(HARD_SEPARATORS) {
                continue;
            }
            let normalized = normalize_reference(segment);
            if family.is_match(&normalized) {
                candidates.insert(normalized);
            }
        }
    }
    candidates
}

/// Compares extracted references with the text of the source document
#[derive(Debug, Clone, Default)]
pub struct ValidationGate {
    settings: ValidationSettings,
}

impl ValidationGate {
    pub fn new(settings: ValidationSettings) -> Self {
        Self { settings }
    }

    fn reference_of<'a>(&self, item: &'a LineItem) -> &'a str {
        match self.settings.reference_field {
            ReferenceField::Number => item.number.trim(),
            ReferenceField::Reference => item.reference.trim(),
        }
    }

    /// Check items against the source text. A missing or blank text skips the check.
    pub fn check(
        &self,
        source_text: Option<&str>,
        items: &[LineItem],
    ) -> Result<ValidationReport, ValidationMismatch> {
        let Some(text) = source_text.filter(|t| !t.trim().is_empty()) else {
            warn!("Source document has no extractable text; skipping reference validation");
            return Ok(ValidationReport {
                skipped: true,
                ..ValidationReport::default()
            });
        };

        let refs: Vec<String> = items
            .iter()
            .map(|item| self.reference_of(item))
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        let unique: BTreeSet<String> = refs.iter().map(|r| normalize_reference(r)).collect();

        let normalized_text = normalize_reference(text);
        let missing: Vec<String> = refs
            .iter()
            .filter(|r| !normalized_text.contains(&normalize_reference(r)))
            .cloned()
            .collect();
        let found = refs.len() - missing.len();

        let candidates = learn_reference_family(&refs, &self.settings)
            .map(|family| scan_source_candidates(text, &family, self.settings.ngram_max))
            .unwrap_or_default();
        let source_only: Vec<String> = candidates.difference(&unique).cloned().collect();

        info!(
            checked = refs.len(),
            found,
            source_candidates = candidates.len(),
            source_only = source_only.len(),
            "Reference validation"
        );

        if !missing.is_empty() || !source_only.is_empty() {
            return Err(ValidationMismatch {
                checked: refs.len(),
                found,
                unique_references: unique.len(),
                missing,
                source_only,
            });
        }

        Ok(ValidationReport {
            skipped: false,
            checked: refs.len(),
            source_candidates: candidates.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(numbers: &[&str]) -> Vec<LineItem> {
        numbers
            .iter()
            .enumerate()
            .map(|(idx, n)| {
                let mut item = LineItem::new("s", idx + 1);
                item.number = n.to_string();
                item
            })
            .collect()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_normalize_reference() {
        assert_eq!(normalize_reference(" inv-12/3.4_5 "), "INV12345");
    }

    #[test]
    fn test_family_narrows_by_leading_digits() {
        let family = learn_reference_family(
            &strings(&["INV-10231", "INV-10297", "INV-10255"]),
            &ValidationSettings::default(),
        )
        .unwrap();

        assert!(family.is_match("INV10200"));
        assert!(!family.is_match("INV99999"));
        assert!(!family.is_match("INV102"));
    }

    #[test]
    fn test_sparse_family_uses_length_range() {
        let family =
            learn_reference_family(&strings(&["INV-1", "INV-123"]), &ValidationSettings::default())
                .unwrap();
        assert!(family.is_match("INV12"));
        assert!(!family.is_match("INV1234"));
    }

    #[test]
    fn test_non_conforming_refs_are_literals() {
        let family =
            learn_reference_family(&strings(&["AB-12-CD"]), &ValidationSettings::default()).unwrap();
        assert!(family.is_match("AB12CD"));
        assert!(!family.is_match("AB13CD"));
    }

    #[test]
    fn test_non_ascii_digits_are_matched_literally() {
        // Arabic-Indic digits
        let numbers = [
            "INV-\u{661}\u{662}\u{663}\u{664}",
            "INV-\u{661}\u{662}\u{663}\u{665}",
            "INV-\u{661}\u{662}\u{663}\u{666}",
        ];
        let family = learn_reference_family(&strings(&numbers), &ValidationSettings::default())
            .unwrap();
        assert!(family.is_match("INV\u{661}\u{662}\u{663}\u{664}"));
        assert!(!family.is_match("INV1234"));

        let mismatch = ValidationGate::default()
            .check(Some("INV 100 some text"), &items(&numbers))
            .unwrap_err();
        assert_eq!(mismatch.missing.len(), 3);
        assert!(mismatch.source_only.is_empty());
    }

    #[test]
    fn test_scan_joins_split_references() {
        let family =
            learn_reference_family(&strings(&["INV123", "INV456"]), &ValidationSettings::default())
                .unwrap();
        let found = scan_source_candidates("Invoice INV 789 due 12:30", &family, 5);
        assert!(found.contains("INV789"));
    }

    #[test]
    fn test_check_passes_when_text_agrees() {
        let gate = ValidationGate::default();
        let text = "Statement\nINV-100 10.00\nINV-101 20.00";
        let report = gate.check(Some(text), &items(&["INV-100", "INV-101"])).unwrap();
        assert!(!report.skipped);
        assert_eq!(report.checked, 2);
    }

    #[test]
    fn test_check_reports_missing_and_source_only() {
        let gate = ValidationGate::default();
        let text = "INV-100 10.00\nINV-102 30.00";
        let mismatch = gate
            .check(Some(text), &items(&["INV-100", "INV-101"]))
            .unwrap_err();

        assert_eq!(mismatch.missing, vec!["INV-101".to_string()]);
        assert_eq!(mismatch.source_only, vec!["INV102".to_string()]);
        assert_eq!(mismatch.found, 1);
    }

    #[test]
    fn test_check_skips_without_text() {
        let gate = ValidationGate::default();
        assert!(gate.check(None, &items(&["INV-1"])).unwrap().skipped);
        assert!(gate.check(Some("   "), &items(&["INV-1"])).unwrap().skipped);
    }

    #[test]
    fn test_outcome_from_result() {
        let outcome: ValidationOutcome = Ok::<_, ValidationMismatch>(ValidationReport {
            skipped: true,
            ..ValidationReport::default()
        })
        .into();
        assert_eq!(outcome, ValidationOutcome::Skipped);
    }
}
