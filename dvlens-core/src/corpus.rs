use serde::{Deserialize, Serialize};

/// File type used when the caller does not declare one.
pub const GENERIC_FILE_TYPE: &str = "generic";

const VALIDATOR_CLIENT_HINTS: &[&str] = &[
    "validator",
    "lighthouse",
    "teku",
    "prysm",
    "nimbus",
    "lodestar",
];

/// One uploaded log file as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFile {
    pub name: String,
    #[serde(rename = "type", default = "default_file_type")]
    pub file_type: String,
    #[serde(default)]
    pub content: String,
}

fn default_file_type() -> String {
    GENERIC_FILE_TYPE.to_string()
}

impl LogFile {
    pub fn new(
        name: impl Into<String>,
        file_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            file_type: file_type.into(),
            content: content.into(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}

/// Name, type and size of a file, used in prompt headers and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub name: String,
    pub file_type: String,
    pub line_count: usize,
}

/// A single line of the corpus together with its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorpusLine<'a> {
    pub file: &'a str,
    /// 1-based line number within the originating file
    pub line_number: usize,
    pub text: &'a str,
}

/// The full set of files submitted for one analysis request.
///
/// Immutable once built; the byte size is computed up front so the digest
/// bypass decision never has to rescan the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCorpus {
    files: Vec<LogFile>,
    size_bytes: usize,
}

impl LogCorpus {
    pub fn new(files: Vec<LogFile>) -> Self {
        let size_bytes = files.iter().map(|f| f.content.len()).sum();
        Self { files, size_bytes }
    }

    /// Wraps a bare block of text, e.g. a piped log stream.
    pub fn from_text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(vec![LogFile::new(name, GENERIC_FILE_TYPE, content)])
    }

    pub fn files(&self) -> &[LogFile] {
        &self.files
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// True when no file carries anything but whitespace.
    pub fn is_empty(&self) -> bool {
        self.files.iter().all(|f| f.content.trim().is_empty())
    }

    pub fn line_count(&self) -> usize {
        self.files.iter().map(LogFile::line_count).sum()
    }

    pub fn summaries(&self) -> Vec<FileSummary> {
        self.files
            .iter()
            .map(|f| FileSummary {
                name: f.name.clone(),
                file_type: f.file_type.clone(),
                line_count: f.line_count(),
            })
            .collect()
    }

    /// Lines in corpus order: every line of the first file, then the second, and so on.
    pub fn lines(&self) -> impl Iterator<Item = CorpusLine<'_>> {
        self.files.iter().flat_map(|file| {
            file.content
                .lines()
                .enumerate()
                .map(move |(idx, text)| CorpusLine {
                    file: &file.name,
                    line_number: idx + 1,
                    text,
                })
        })
    }
}

/// Guess the node component a log file came from by its name.
pub fn infer_file_type(file_name: &str) -> Option<&'static str> {
    let lower = file_name.to_lowercase();
    if lower.contains("charon") {
        return Some("charon");
    }
    if VALIDATOR_CLIENT_HINTS.iter().any(|hint| lower.contains(hint)) {
        return Some("validator");
    }
    None
}

/// Decode raw file bytes into text.
///
/// Honors a UTF-8/UTF-16 byte order mark, otherwise tries strict UTF-8 and
/// falls back to Windows-1252, which accepts every byte sequence.
pub fn decode_log_bytes(data: &[u8]) -> String {
    use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

    if let Some((encoding, bom_len)) = Encoding::for_bom(data) {
        let (text, _) = encoding.decode_without_bom_handling(&data[bom_len..]);
        return text.into_owned();
    }

    match UTF_8.decode_without_bom_handling_and_without_replacement(data) {
        Some(text) => text.into_owned(),
        None => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(data);
            text.into_owned()
        }
    }
}
