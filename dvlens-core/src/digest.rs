// Digest extraction - keyword triage of large log corpora
//
// Reduces an arbitrarily large corpus to a bounded set of categorised
// excerpts. Matching is plain case-insensitive substring search; there is no
// attempt to parse the log grammar.

use crate::corpus::{FileSummary, LogCorpus, LogFile};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

/// Triage categories. Declaration order is the attribution priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Error,
    Warning,
    Consensus,
    Relay,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Error,
        Category::Warning,
        Category::Consensus,
        Category::Relay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Error => "error",
            Category::Warning => "warning",
            Category::Consensus => "consensus",
            Category::Relay => "relay",
        }
    }

    fn default_needles(&self) -> &'static [&'static str] {
        match self {
            Category::Error => &["error", "fatal", "panic", "crit"],
            Category::Warning => &["warn"],
            Category::Consensus => &["consensus", "qbft", "leader", "duty"],
            Category::Relay => &["relay", "p2p", "peer"],
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive substring matcher for one category.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    category: Category,
    /// None when built without needles; such a matcher accepts nothing
    pattern: Option<Regex>,
}

impl CategoryMatcher {
    pub fn new(category: Category, needles: &[&str]) -> Result<Self, regex::Error> {
        let alternation = needles
            .iter()
            .filter(|needle| !needle.is_empty())
            .map(|needle| regex::escape(needle))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = if alternation.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("(?i){}", alternation))?)
        };

        Ok(Self { category, pattern })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn matches(&self, line: &str) -> bool {
        self.pattern.as_ref().is_some_and(|re| re.is_match(line))
    }
}

static DEFAULT_MATCHERS: LazyLock<Vec<CategoryMatcher>> = LazyLock::new(|| {
    Category::ALL
        .iter()
        .map(|category| {
            CategoryMatcher::new(*category, category.default_needles())
                .expect("Failed to compile category matcher")
        })
        .collect()
});

/// Tunables for one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionPolicy {
    /// Hard limit on lines examined, regardless of how many categories are still open
    pub max_scan_lines: usize,
    /// Corpora strictly smaller than this many bytes skip triage entirely
    pub small_corpus_bytes: usize,
    caps: BTreeMap<Category, usize>,
    matchers: Vec<CategoryMatcher>,
}

impl Default for ExtractionPolicy {
    fn default() -> Self {
        Self::new(5000, 25, 8000)
    }
}

impl ExtractionPolicy {
    pub fn new(max_scan_lines: usize, per_category_cap: usize, small_corpus_bytes: usize) -> Self {
        Self {
            max_scan_lines,
            small_corpus_bytes,
            caps: Category::ALL
                .iter()
                .map(|category| (*category, per_category_cap))
                .collect(),
            matchers: DEFAULT_MATCHERS.clone(),
        }
    }

    /// Override the cap of a single category.
    pub fn with_cap(mut self, category: Category, cap: usize) -> Self {
        self.caps.insert(category, cap);
        self
    }

    /// Replace the matchers. They are re-sorted into priority order.
    pub fn with_matchers(mut self, mut matchers: Vec<CategoryMatcher>) -> Self {
        matchers.sort_by_key(CategoryMatcher::category);
        self.matchers = matchers;
        self
    }

    pub fn cap(&self, category: Category) -> usize {
        self.caps.get(&category).copied().unwrap_or(0)
    }

    /// First category in priority order whose matcher accepts the line.
    pub fn classify(&self, line: &str) -> Option<Category> {
        self.matchers
            .iter()
            .find(|matcher| matcher.matches(line))
            .map(CategoryMatcher::category)
    }
}

/// A corpus line retained by triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Excerpt {
    pub file: String,
    pub line_number: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestBody {
    /// Small corpus passed through untouched
    Verbatim(Vec<LogFile>),
    Triaged(BTreeMap<Category, Vec<Excerpt>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    body: DigestBody,
    files: Vec<FileSummary>,
    scanned_lines: usize,
    total_chars: usize,
}

impl Digest {
    pub fn body(&self) -> &DigestBody {
        &self.body
    }

    pub fn files(&self) -> &[FileSummary] {
        &self.files
    }

    pub fn is_verbatim(&self) -> bool {
        matches!(self.body, DigestBody::Verbatim(_))
    }

    /// Excerpts attributed to a category; always empty for a verbatim digest.
    pub fn lines(&self, category: Category) -> &[Excerpt] {
        match &self.body {
            DigestBody::Triaged(map) => map.get(&category).map(Vec::as_slice).unwrap_or(&[]),
            DigestBody::Verbatim(_) => &[],
        }
    }

    pub fn scanned_lines(&self) -> usize {
        self.scanned_lines
    }

    /// Characters of log content carried by the digest.
    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        Category::ALL
            .iter()
            .map(|category| (*category, self.lines(*category).len()))
            .collect()
    }
}

/// Reduce a corpus to a digest. Pure function of its inputs.
pub fn extract_digest(corpus: &LogCorpus, policy: &ExtractionPolicy) -> Digest {
    let files = corpus.summaries();

    if !corpus.is_empty() && corpus.size_bytes() < policy.small_corpus_bytes {
        debug!(
            "Corpus of {} bytes is below the {} byte triage threshold, passing through",
            corpus.size_bytes(),
            policy.small_corpus_bytes
        );
        let total_chars = corpus.files().iter().map(|f| f.content.chars().count()).sum();
        return Digest {
            body: DigestBody::Verbatim(corpus.files().to_vec()),
            files,
            scanned_lines: corpus.line_count(),
            total_chars,
        };
    }

    let mut categories: BTreeMap<Category, Vec<Excerpt>> = Category::ALL
        .iter()
        .map(|category| (*category, Vec::new()))
        .collect();
    let mut scanned_lines = 0;
    let mut total_chars = 0;

    for line in corpus.lines().take(policy.max_scan_lines) {
        scanned_lines += 1;

        let Some(category) = policy.classify(line.text) else {
            continue;
        };

        // Attribution is exclusive: a full category drops the line rather
        // than passing it down to a lower-priority one.
        let bucket = categories.entry(category).or_default();
        if bucket.len() < policy.cap(category) {
            total_chars += line.text.chars().count();
            bucket.push(Excerpt {
                file: line.file.to_string(),
                line_number: line.line_number,
                text: line.text.to_string(),
            });
        }
    }

    debug!(
        "Scanned {} of {} lines, kept {:?}",
        scanned_lines,
        corpus.line_count(),
        categories.iter().map(|(c, v)| (c.as_str(), v.len())).collect::<Vec<_>>()
    );

    Digest {
        body: DigestBody::Triaged(categories),
        files,
        scanned_lines,
        total_chars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(digest: &Digest, category: Category) -> Vec<&str> {
        digest.lines(category).iter().map(|e| e.text.as_str()).collect()
    }

    fn triage_only(cap: usize) -> ExtractionPolicy {
        ExtractionPolicy::new(10_000, cap, 0)
    }

    #[test]
    fn test_priority_attribution_is_exclusive() {
        let corpus = LogCorpus::from_text(
            "charon.log",
            "INFO start\nERROR: relay timeout after 30s\nWARN: leader rotation delayed",
        );

        let digest = extract_digest(&corpus, &triage_only(10));

        assert_eq!(texts(&digest, Category::Error), vec!["ERROR: relay timeout after 30s"]);
        assert_eq!(texts(&digest, Category::Warning), vec!["WARN: leader rotation delayed"]);
        assert!(texts(&digest, Category::Consensus).is_empty());
        assert!(texts(&digest, Category::Relay).is_empty());
    }

    #[test]
    fn test_error_beats_consensus() {
        let corpus = LogCorpus::from_text("charon.log", "qbft consensus error in round 3");
        let digest = extract_digest(&corpus, &triage_only(10));

        assert_eq!(digest.lines(Category::Error).len(), 1);
        assert!(digest.lines(Category::Consensus).is_empty());
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let corpus = LogCorpus::from_text("charon.log", "QBFT Leader changed\nPeer connected via Relay");
        let digest = extract_digest(&corpus, &triage_only(10));

        assert_eq!(texts(&digest, Category::Consensus), vec!["QBFT Leader changed"]);
        assert_eq!(texts(&digest, Category::Relay), vec!["Peer connected via Relay"]);
    }

    #[test]
    fn test_category_cap_is_respected() {
        let content = (0..50).map(|i| format!("error number {}", i)).collect::<Vec<_>>().join("\n");
        let corpus = LogCorpus::from_text("charon.log", content);

        let digest = extract_digest(&corpus, &triage_only(7));
        assert_eq!(digest.lines(Category::Error).len(), 7);
        assert_eq!(digest.lines(Category::Error)[0].text, "error number 0");
        assert_eq!(digest.lines(Category::Error)[6].line_number, 7);
    }

    #[test]
    fn test_individual_cap_override() {
        let corpus = LogCorpus::from_text("charon.log", "warn a\nwarn b\nwarn c\nerror a\nerror b");
        let policy = triage_only(10).with_cap(Category::Warning, 1);

        let digest = extract_digest(&corpus, &policy);
        assert_eq!(texts(&digest, Category::Warning), vec!["warn a"]);
        assert_eq!(digest.lines(Category::Error).len(), 2);
    }

    #[test]
    fn test_full_category_drops_line_instead_of_demoting() {
        let corpus = LogCorpus::from_text("charon.log", "error one\nerror with peer two");
        let policy = triage_only(10).with_cap(Category::Error, 1);

        let digest = extract_digest(&corpus, &policy);
        assert_eq!(texts(&digest, Category::Error), vec!["error one"]);
        assert!(digest.lines(Category::Relay).is_empty());
    }

    #[test]
    fn test_scan_stops_at_max_scan_lines() {
        let mut lines = vec!["INFO nothing to see".to_string(); 100];
        lines.push("ERROR late failure".to_string());
        let corpus = LogCorpus::from_text("charon.log", lines.join("\n"));

        let policy = ExtractionPolicy::new(100, 10, 0);
        let digest = extract_digest(&corpus, &policy);

        assert_eq!(digest.scanned_lines(), 100);
        assert!(digest.lines(Category::Error).is_empty());
    }

    #[test]
    fn test_scan_spans_files_in_order() {
        let corpus = LogCorpus::new(vec![
            LogFile::new("charon.log", "charon", "error in charon"),
            LogFile::new("vc.log", "validator", "error in validator"),
        ]);

        let digest = extract_digest(&corpus, &triage_only(10));
        let errors = digest.lines(Category::Error);
        assert_eq!(errors[0].file, "charon.log");
        assert_eq!(errors[1].file, "vc.log");
        assert_eq!(digest.files().len(), 2);
    }

    #[test]
    fn test_empty_corpus_yields_empty_categories() {
        let corpus = LogCorpus::new(Vec::new());
        let digest = extract_digest(&corpus, &ExtractionPolicy::default());

        assert!(!digest.is_verbatim());
        assert!(Category::ALL.iter().all(|c| digest.lines(*c).is_empty()));
        assert_eq!(digest.total_chars(), 0);
    }

    #[test]
    fn test_small_corpus_passes_through_verbatim() {
        let content = "INFO boot\nsomething unmatched\nERROR x";
        let corpus = LogCorpus::from_text("charon.log", content);
        let policy = ExtractionPolicy::new(1, 1, 1024);

        let digest = extract_digest(&corpus, &policy);
        match digest.body() {
            DigestBody::Verbatim(files) => assert_eq!(files[0].content, content),
            other => panic!("expected verbatim digest, got {:?}", other),
        }
        assert_eq!(digest.total_chars(), content.chars().count());
    }

    #[test]
    fn test_corpus_at_threshold_is_triaged() {
        let corpus = LogCorpus::from_text("charon.log", "error");
        let policy = ExtractionPolicy::new(10, 10, 5);

        assert!(!extract_digest(&corpus, &policy).is_verbatim());
    }

    #[test]
    fn test_custom_matchers_are_reordered_by_priority() {
        let policy = triage_only(5).with_matchers(vec![
            CategoryMatcher::new(Category::Relay, &["timeout"]).unwrap(),
            CategoryMatcher::new(Category::Error, &["timeout"]).unwrap(),
        ]);

        assert_eq!(policy.classify("relay TIMEOUT"), Some(Category::Error));
        assert_eq!(policy.classify("nothing"), None);
    }

    #[test]
    fn test_empty_needle_list_matches_nothing() {
        let matcher = CategoryMatcher::new(Category::Relay, &[]).unwrap();
        assert!(!matcher.matches("relay"));
        assert!(!matcher.matches(""));
    }
}
