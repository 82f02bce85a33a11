// Local analysis - offline report built from the digest, no network access.

use crate::corpus::LogCorpus;
use crate::digest::{extract_digest, Category, ExtractionPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Model id reported for local reports.
pub const LOCAL_MODEL: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalReport {
    pub text: String,
    pub counts: BTreeMap<Category, usize>,
}

/// Report generator that never leaves the process.
pub trait LocalAnalyzer: Send + Sync {
    fn analyze(&self, corpus: &LogCorpus) -> LocalReport;
}

/// Markdown listing of the categorised excerpts and their counts.
#[derive(Debug, Clone)]
pub struct DigestReportAnalyzer {
    policy: ExtractionPolicy,
}

impl DigestReportAnalyzer {
    pub fn new(mut policy: ExtractionPolicy) -> Self {
        // the report is always triaged, however small the upload
        policy.small_corpus_bytes = 0;
        Self { policy }
    }
}

impl Default for DigestReportAnalyzer {
    fn default() -> Self {
        Self::new(ExtractionPolicy::default())
    }
}

impl LocalAnalyzer for DigestReportAnalyzer {
    fn analyze(&self, corpus: &LogCorpus) -> LocalReport {
        let digest = extract_digest(corpus, &self.policy);
        let counts = digest.category_counts();

        let mut text = String::from("# Local Log Digest\n\n## Files\n\n");
        for file in digest.files() {
            let _ = writeln!(
                text,
                "- `{}` ({}, {} lines)",
                file.name, file.file_type, file.line_count
            );
        }

        let _ = write!(
            text,
            "\n## Summary\n\nScanned {} line(s).\n\n| Category | Lines |\n|---|---|\n",
            digest.scanned_lines()
        );
        for (category, count) in &counts {
            let _ = writeln!(text, "| {} | {} |", category, count);
        }

        for category in Category::ALL {
            let excerpts = digest.lines(category);
            if excerpts.is_empty() {
                continue;
            }
            let _ = write!(text, "\n## {}\n\n```\n", heading(category));
            for excerpt in excerpts {
                let _ = writeln!(text, "{}:{}  {}", excerpt.file, excerpt.line_number, excerpt.text);
            }
            text.push_str("```\n");
        }

        if counts.values().all(|count| *count == 0) {
            text.push_str("\nNo error, warning, consensus or relay lines were found.\n");
        }

        LocalReport { text, counts }
    }
}

fn heading(category: Category) -> &'static str {
    match category {
        Category::Error => "Errors",
        Category::Warning => "Warnings",
        Category::Consensus => "Consensus",
        Category::Relay => "Relay and Peers",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::LogFile;

    #[test]
    fn test_small_corpus_is_still_triaged() {
        let corpus = LogCorpus::new(vec![LogFile::new(
            "charon.log",
            "charon",
            "INFO start\nERROR: relay timeout after 30s\nWARN: leader rotation delayed\n",
        )]);

        let report = DigestReportAnalyzer::default().analyze(&corpus);

        assert_eq!(report.counts[&Category::Error], 1);
        assert_eq!(report.counts[&Category::Warning], 1);
        assert_eq!(report.counts[&Category::Relay], 0);
        assert!(report.text.contains("charon.log:2  ERROR: relay timeout after 30s"));
        assert!(report.text.contains("## Warnings"));
        assert!(!report.text.contains("## Relay and Peers"));
    }

    #[test]
    fn test_quiet_corpus() {
        let corpus = LogCorpus::from_text("quiet.log", "INFO all good\nINFO still good\n");
        let report = DigestReportAnalyzer::default().analyze(&corpus);

        assert!(report.counts.values().all(|c| *c == 0));
        assert!(report.text.contains("No error, warning, consensus or relay lines"));
    }
}
