//! Category normalization: map free-text labels onto the canonical set,
//! learning new canonical categories on demand.
//!
//! Lookup order: exact (case-insensitive) > synonym table > compact match
//! (spaces and `&` removed) > mint a new category > fallback "Other".

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Terminal fallback entry, always present and always last.
pub const FALLBACK_CATEGORY: &str = "Other";

/// Canonical categories for a fresh session.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Meals",
    "Travel",
    "Office Supplies",
    "Software",
    "Marketing",
    "Entertainment",
    "Utilities",
    "Rent",
    "Professional Services",
    FALLBACK_CATEGORY,
];

/// Free-text labels (lowercase) and the canonical name they stand for.
///
/// One table serves both ingestion and upload-time classification.
const SYNONYMS: &[(&str, &str)] = &[
    ("food", "Meals"),
    ("food & dining", "Meals"),
    ("food and dining", "Meals"),
    ("dining", "Meals"),
    ("restaurant", "Meals"),
    ("restaurants", "Meals"),
    ("grocery", "Meals"),
    ("groceries", "Meals"),
    ("coffee", "Meals"),
    ("meal", "Meals"),
    ("movie", "Entertainment"),
    ("movies", "Entertainment"),
    ("concert", "Entertainment"),
    ("concerts", "Entertainment"),
    ("hotel", "Travel"),
    ("hotels", "Travel"),
    ("lodging", "Travel"),
    ("flight", "Travel"),
    ("flights", "Travel"),
    ("airfare", "Travel"),
    ("transportation", "Travel"),
    ("supplies", "Office Supplies"),
    ("office", "Office Supplies"),
    ("stationery", "Office Supplies"),
    ("subscription", "Software"),
    ("subscriptions", "Software"),
    ("saas", "Software"),
    ("advertising", "Marketing"),
    ("ads", "Marketing"),
    ("promotion", "Marketing"),
    ("electricity", "Utilities"),
    ("internet", "Utilities"),
    ("phone", "Utilities"),
    ("consulting", "Professional Services"),
    ("legal", "Professional Services"),
    ("accounting", "Professional Services"),
];

/// Ordered canonical category names, unique case-insensitively, with
/// [`FALLBACK_CATEGORY`] as the terminal entry. Only ever appended to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct CategorySet {
    names: Vec<String>,
}

impl From<Vec<String>> for CategorySet {
    fn from(names: Vec<String>) -> Self {
        Self::from_names(names)
    }
}

impl From<CategorySet> for Vec<String> {
    fn from(set: CategorySet) -> Self {
        set.names
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::from_names(DEFAULT_CATEGORIES.iter().copied())
    }
}

impl CategorySet {
    /// Build from stored names, dropping blanks and case-insensitive repeats
    /// and moving the fallback to the end.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self { names: Vec::new() };
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || name.eq_ignore_ascii_case(FALLBACK_CATEGORY) {
                continue;
            }
            if set.find_exact(name).is_none() {
                set.names.push(name.to_string());
            }
        }
        set.names.push(FALLBACK_CATEGORY.to_string());
        set
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Case-insensitive exact match; returns the canonical spelling.
    pub fn find_exact(&self, label: &str) -> Option<&str> {
        let label = label.trim().to_lowercase();
        self.names
            .iter()
            .find(|n| n.to_lowercase() == label)
            .map(String::as_str)
    }

    /// Match ignoring case, spaces and `&`.
    pub fn find_compact(&self, label: &str) -> Option<&str> {
        let key = compact(label);
        if key.is_empty() {
            return None;
        }
        self.names
            .iter()
            .find(|n| compact(n) == key)
            .map(String::as_str)
    }

    /// Append `name` ahead of the fallback unless an equivalent entry
    /// already exists. Returns true if the set changed.
    ///
    /// The existence check runs here, immediately before insertion, so two
    /// back-to-back inserts of the same unseen label mint only one entry.
    pub fn insert(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.find_exact(name).is_some() || self.find_compact(name).is_some() {
            return false;
        }
        let at = self.names.len().saturating_sub(1);
        self.names.insert(at, name.to_string());
        true
    }

    fn remove(&mut self, name: &str) {
        if name != FALLBACK_CATEGORY {
            self.names.retain(|n| n != name);
        }
    }
}

/// Lowercase with spaces and `&` removed.
fn compact(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '&')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Canonical name a synonym maps to, if `label` is a known synonym.
pub fn synonym_for(label: &str) -> Option<&'static str> {
    let key = label.trim().to_lowercase();
    SYNONYMS
        .iter()
        .find(|(syn, _)| *syn == key)
        .map(|(_, canonical)| *canonical)
}

/// Persistence hook invoked whenever the category set grows.
pub trait CategorySink {
    fn persist(&self, names: &[String]) -> Result<()>;
}

/// Sink for sessions whose category set is never written back.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unpersisted;

impl CategorySink for Unpersisted {
    fn persist(&self, _names: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Which rule produced a normalization result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchRule {
    Exact,
    Synonym,
    Compact,
    Minted,
    Fallback,
}

/// Outcome of normalizing one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// Name to show with the record right away
    pub display: String,
    /// Guaranteed member of the category set
    pub canonical: String,
    pub rule: MatchRule,
}

impl Normalized {
    fn settled(name: &str, rule: MatchRule) -> Self {
        Self {
            display: name.to_string(),
            canonical: name.to_string(),
            rule,
        }
    }
}

/// Mutable normalization context: the session's category set plus where to
/// persist it. Passed explicitly to every normalization call.
pub struct CategoryContext<'a> {
    pub set: &'a mut CategorySet,
    sink: &'a dyn CategorySink,
}

impl<'a> CategoryContext<'a> {
    pub fn new(set: &'a mut CategorySet, sink: &'a dyn CategorySink) -> Self {
        Self { set, sink }
    }

    /// Normalize `raw`, minting and persisting a new category if needed.
    pub fn normalize(&mut self, raw: &str) -> Normalized {
        let raw = raw.trim();
        if raw.is_empty() {
            return Normalized::settled(FALLBACK_CATEGORY, MatchRule::Fallback);
        }

        if let Some(name) = self.set.find_exact(raw) {
            return Normalized::settled(name, MatchRule::Exact);
        }

        if let Some(name) = synonym_for(raw).and_then(|c| self.set.find_exact(c)) {
            return Normalized::settled(name, MatchRule::Synonym);
        }

        if let Some(name) = self.set.find_compact(raw) {
            return Normalized::settled(name, MatchRule::Compact);
        }

        self.mint(raw)
    }

    /// Canonical category for `raw`; "Other" when it cannot be guaranteed.
    pub fn normalize_category(&mut self, raw: &str) -> String {
        self.normalize(raw).canonical
    }

    fn mint(&mut self, raw: &str) -> Normalized {
        if !self.set.insert(raw) {
            // Another entry became equivalent since the lookups above.
            let name = self
                .set
                .find_exact(raw)
                .or_else(|| self.set.find_compact(raw))
                .unwrap_or(FALLBACK_CATEGORY);
            return Normalized::settled(name, MatchRule::Exact);
        }

        match self.sink.persist(self.set.names()) {
            Ok(()) => {
                info!(category = raw, "minted new canonical category");
                Normalized::settled(raw, MatchRule::Minted)
            }
            Err(e) => {
                warn!(category = raw, error = %e, "failed to persist new category; using fallback");
                self.set.remove(raw);
                Normalized {
                    display: raw.to_string(),
                    canonical: FALLBACK_CATEGORY.to_string(),
                    rule: MatchRule::Fallback,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSink {
        writes: RefCell<Vec<Vec<String>>>,
    }

    impl CategorySink for RecordingSink {
        fn persist(&self, names: &[String]) -> Result<()> {
            self.writes.borrow_mut().push(names.to_vec());
            Ok(())
        }
    }

    struct FailingSink;

    impl CategorySink for FailingSink {
        fn persist(&self, _names: &[String]) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_default_set_ends_with_other() {
        let set = CategorySet::default();
        assert_eq!(set.names().last().map(String::as_str), Some(FALLBACK_CATEGORY));
    }

    #[test]
    fn test_from_names_dedupes_and_moves_fallback() {
        let set = CategorySet::from_names(["Other", "Meals", "meals", " ", "Travel"]);
        assert_eq!(set.names(), ["Meals", "Travel", "Other"]);
    }

    #[test]
    fn test_exact_match_returns_canonical_spelling() {
        let mut set = CategorySet::default();
        let mut ctx = CategoryContext::new(&mut set, &Unpersisted);
        let n = ctx.normalize("office supplies");
        assert_eq!(n.canonical, "Office Supplies");
        assert_eq!(n.rule, MatchRule::Exact);
    }

    #[test]
    fn test_synonyms() {
        let mut set = CategorySet::default();
        let mut ctx = CategoryContext::new(&mut set, &Unpersisted);
        assert_eq!(ctx.normalize_category("Food & Dining"), "Meals");
        assert_eq!(ctx.normalize_category("restaurant"), "Meals");
        assert_eq!(ctx.normalize_category("grocery"), "Meals");
        assert_eq!(ctx.normalize_category("Concert"), "Entertainment");
        assert_eq!(ctx.normalize_category("flights"), "Travel");
        assert_eq!(ctx.normalize_category("supplies"), "Office Supplies");
        assert_eq!(ctx.normalize_category("subscription"), "Software");
        assert_eq!(ctx.normalize_category("advertising"), "Marketing");
    }

    #[test]
    fn test_synonym_skipped_when_target_missing() {
        // "hotel" maps to Travel, which this set lacks, so it is minted
        let mut set = CategorySet::from_names(["Meals"]);
        let mut ctx = CategoryContext::new(&mut set, &Unpersisted);
        let n = ctx.normalize("hotel");
        assert_eq!(n.rule, MatchRule::Minted);
        assert_eq!(n.canonical, "hotel");
    }

    #[test]
    fn test_compact_match() {
        let mut set = CategorySet::from_names(["Bar & Grill"]);
        let mut ctx = CategoryContext::new(&mut set, &Unpersisted);
        let n = ctx.normalize("bargrill");
        assert_eq!(n.canonical, "Bar & Grill");
        assert_eq!(n.rule, MatchRule::Compact);

        let n = ctx.normalize("OfficeSupplies");
        assert_eq!(n.rule, MatchRule::Minted);
    }

    #[test]
    fn test_mint_persists_and_keeps_fallback_last() {
        let sink = RecordingSink::default();
        let mut set = CategorySet::default();
        {
            let mut ctx = CategoryContext::new(&mut set, &sink);
            let n = ctx.normalize("Pet Care");
            assert_eq!(n.rule, MatchRule::Minted);
            assert_eq!(n.canonical, "Pet Care");
        }
        assert_eq!(set.names().last().map(String::as_str), Some(FALLBACK_CATEGORY));
        assert!(set.find_exact("pet care").is_some());
        assert_eq!(sink.writes.borrow().len(), 1);
    }

    #[test]
    fn test_mint_is_idempotent() {
        let sink = RecordingSink::default();
        let mut set = CategorySet::default();
        let before = set.len();
        let mut ctx = CategoryContext::new(&mut set, &sink);
        ctx.normalize("Pet Care");
        ctx.normalize("pet care");
        ctx.normalize("PetCare");
        assert_eq!(set.len(), before + 1);
        assert_eq!(sink.writes.borrow().len(), 1);
    }

    #[test]
    fn test_insert_checks_existence() {
        let mut set = CategorySet::default();
        assert!(set.insert("Pet Care"));
        assert!(!set.insert("PET CARE"));
        assert!(!set.insert("Pet&Care"));
    }

    #[test]
    fn test_empty_label_falls_back() {
        let mut set = CategorySet::default();
        let mut ctx = CategoryContext::new(&mut set, &Unpersisted);
        let n = ctx.normalize("   ");
        assert_eq!(n.canonical, FALLBACK_CATEGORY);
        assert_eq!(n.rule, MatchRule::Fallback);
    }

    #[test]
    fn test_persist_failure_falls_back_but_keeps_display() {
        let mut set = CategorySet::default();
        let before = set.clone();
        let mut ctx = CategoryContext::new(&mut set, &FailingSink);
        let n = ctx.normalize("Pet Care");
        assert_eq!(n.display, "Pet Care");
        assert_eq!(n.canonical, FALLBACK_CATEGORY);
        assert_eq!(set, before);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let mut set = CategorySet::default();
        let mut ctx = CategoryContext::new(&mut set, &Unpersisted);
        for raw in ["Food & Dining", "movie", "Pet Care", "office supplies", "", "Bar & Grill"] {
            let once = ctx.normalize_category(raw);
            let twice = ctx.normalize_category(&once);
            assert_eq!(once, twice, "label {raw:?}");
        }
    }

    #[test]
    fn test_deserialize_goes_through_from_names() {
        let set: CategorySet = serde_json::from_str(r#"["Other", "Meals", "meals", " ", "Travel"]"#).unwrap();
        assert_eq!(set.names(), ["Meals", "Travel", "Other"]);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["Meals","Travel","Other"]"#);
    }
}
