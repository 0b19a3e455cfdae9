//! In-memory aggregation store: one entry per processed document.
//!
//! The store is an explicit object with an explicit lifecycle (created at
//! run start, cleared on demand) rather than ambient global state. Interior
//! mutex: one writer at a time, readers get consistent snapshots taken under
//! the same lock.

use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{DeckEntry, DeckRecord};

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").expect("year regex"));

/// Field-level predicates over records, mirroring the dashboard filters:
/// industry, funding stage, founding-year range. All set fields must match.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Case-insensitive industry match.
    pub industry: Option<String>,
    /// Case-insensitive funding-stage match.
    pub funding_stage: Option<String>,
    pub founded_after: Option<i32>,
    pub founded_before: Option<i32>,
}

impl RecordFilter {
    pub fn matches(&self, record: &DeckRecord) -> bool {
        if let Some(ref want) = self.industry
            && !record.industry.eq_ignore_ascii_case(want)
        {
            return false;
        }
        if let Some(ref want) = self.funding_stage
            && !record.funding_stage.eq_ignore_ascii_case(want)
        {
            return false;
        }
        if self.founded_after.is_some() || self.founded_before.is_some() {
            let Some(year) = founding_year_of(record) else {
                return false;
            };
            if let Some(after) = self.founded_after
                && year < after
            {
                return false;
            }
            if let Some(before) = self.founded_before
                && year > before
            {
                return false;
            }
        }
        true
    }
}

/// First four-digit year found in the record's founding-year field.
/// Handles both "2019" and looser strings like "Oct 2019".
fn founding_year_of(record: &DeckRecord) -> Option<i32> {
    let text = record.founding_year.as_deref()?;
    YEAR.captures(text)?.get(1)?.as_str().parse().ok()
}

/// The session-wide collection of processed decks.
#[derive(Debug, Default)]
pub struct DeckLibrary {
    entries: Mutex<Vec<DeckEntry>>,
}

impl DeckLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by document key. Replacement (re-extraction of the
    /// same file) keeps the entry's original position.
    pub fn add(&self, entry: DeckEntry) {
        let mut entries = self.entries.lock().unwrap();
        match entries.iter_mut().find(|e| e.key == entry.key) {
            Some(slot) => *slot = entry,
            None => entries.push(entry),
        }
    }

    pub fn get(&self, key: &str) -> Option<DeckEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.key == key)
            .cloned()
    }

    /// Snapshot of all entries in insertion order.
    pub fn all(&self) -> Vec<DeckEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Lazily filter a snapshot with field-level predicates.
    pub fn filter(&self, filter: &RecordFilter) -> impl Iterator<Item = DeckEntry> + use<> {
        let filter = filter.clone();
        self.all()
            .into_iter()
            .filter(move |e| filter.matches(&e.record))
    }

    /// Lazily filter a snapshot with an arbitrary predicate.
    pub fn filter_with<F>(&self, predicate: F) -> impl Iterator<Item = DeckEntry> + use<F>
    where
        F: Fn(&DeckEntry) -> bool,
    {
        self.all().into_iter().filter(move |e| predicate(e))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeckError, EntryStatus};

    fn entry(key: &str, name: &str, industry: &str, year: Option<&str>, stage: &str) -> DeckEntry {
        DeckEntry::extracted(
            key,
            DeckRecord {
                startup_name: name.into(),
                industry: industry.into(),
                founding_year: year.map(String::from),
                funding_stage: stage.into(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn all_preserves_insertion_order() {
        let lib = DeckLibrary::new();
        lib.add(entry("b.pdf", "Beta", "Fintech", Some("2020"), "Seed"));
        lib.add(entry("a.pdf", "Alpha", "Edtech", Some("2018"), "Series A"));
        lib.add(entry("c.pdf", "Gamma", "Fintech", None, ""));

        let keys: Vec<String> = lib.all().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["b.pdf", "a.pdf", "c.pdf"]);
    }

    #[test]
    fn add_replaces_by_key_in_place() {
        let lib = DeckLibrary::new();
        lib.add(entry("a.pdf", "Old", "Fintech", None, ""));
        lib.add(entry("b.pdf", "Other", "Edtech", None, ""));
        lib.add(entry("a.pdf", "New", "Fintech", None, ""));

        assert_eq!(lib.len(), 2);
        let all = lib.all();
        assert_eq!(all[0].key, "a.pdf");
        assert_eq!(all[0].record.startup_name, "New");
    }

    #[test]
    fn failed_entry_replaces_and_is_replaced() {
        let lib = DeckLibrary::new();
        let err = DeckError::MalformedExtraction("bad".into());
        lib.add(DeckEntry::failed("a.pdf", &err));
        assert_eq!(lib.get("a.pdf").unwrap().status, EntryStatus::Failed);

        // Re-extraction of the same document overwrites the failure row.
        lib.add(entry("a.pdf", "Acme", "Fintech", None, ""));
        assert_eq!(lib.get("a.pdf").unwrap().status, EntryStatus::Extracted);
        assert_eq!(lib.len(), 1);
    }

    #[test]
    fn filter_by_industry_is_case_insensitive() {
        let lib = DeckLibrary::new();
        lib.add(entry("a.pdf", "Alpha", "Fintech", None, ""));
        lib.add(entry("b.pdf", "Beta", "Edtech", None, ""));

        let filter = RecordFilter {
            industry: Some("fintech".into()),
            ..Default::default()
        };
        let hits: Vec<DeckEntry> = lib.filter(&filter).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.startup_name, "Alpha");
    }

    #[test]
    fn filter_by_year_range() {
        let lib = DeckLibrary::new();
        lib.add(entry("a.pdf", "A", "X", Some("2017"), ""));
        lib.add(entry("b.pdf", "B", "X", Some("Oct 2019"), ""));
        lib.add(entry("c.pdf", "C", "X", Some("2022"), ""));
        lib.add(entry("d.pdf", "D", "X", None, ""));

        let filter = RecordFilter {
            founded_after: Some(2018),
            founded_before: Some(2020),
            ..Default::default()
        };
        let names: Vec<String> = lib
            .filter(&filter)
            .map(|e| e.record.startup_name)
            .collect();
        // Records without a parseable year never match a year-range filter.
        assert_eq!(names, vec!["B"]);
    }

    #[test]
    fn combined_predicates_must_all_match() {
        let lib = DeckLibrary::new();
        lib.add(entry("a.pdf", "A", "Fintech", Some("2019"), "Seed"));
        lib.add(entry("b.pdf", "B", "Fintech", Some("2019"), "Series A"));

        let filter = RecordFilter {
            industry: Some("Fintech".into()),
            funding_stage: Some("seed".into()),
            ..Default::default()
        };
        let names: Vec<String> = lib
            .filter(&filter)
            .map(|e| e.record.startup_name)
            .collect();
        assert_eq!(names, vec!["A"]);
    }

    #[test]
    fn clear_empties_the_store() {
        let lib = DeckLibrary::new();
        lib.add(entry("a.pdf", "A", "X", None, ""));
        assert!(!lib.is_empty());
        lib.clear();
        assert!(lib.is_empty());
    }

    #[test]
    fn concurrent_adds_serialize() {
        let lib = std::sync::Arc::new(DeckLibrary::new());
        let mut handles = vec![];
        for t in 0..8 {
            let lib = lib.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    lib.add(entry(
                        &format!("deck-{}-{}.pdf", t, i),
                        "X",
                        "Y",
                        None,
                        "",
                    ));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(lib.len(), 8 * 50);
    }
}
