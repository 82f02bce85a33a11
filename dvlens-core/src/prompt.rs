use crate::digest::{Category, Digest, DigestBody};
use std::fmt::Write;

/// Sent as the provider `system` field alongside every composed prompt.
pub const SYSTEM_INSTRUCTION: &str = "You are an experienced operator of Obol distributed validator \
clusters. You read Charon middleware and validator client logs and explain cluster health to node \
operators in clear, actionable terms. Only draw conclusions the supplied log lines support.";

const PROMPT_HEADER: &str = "Analyze the following logs from a distributed validator node \
(Charon middleware and its validator client).";

const REPORT_INSTRUCTIONS: &str = r#"Write a health report in markdown with exactly these sections:

## Cluster Health Score
A score from 0 to 100 with a one-line justification.

## Critical Issues
Each issue with the log evidence that shows it and its likely impact on duties.

## Consensus Analysis
QBFT rounds, leader changes, timeouts and missed or late duties.

## Middleware Status
Charon peer connectivity, relay usage, beacon node and validator client health.

## Recommendations
Concrete, ordered steps the operator should take next."#;

const TRUNCATION_MARKER: &str = "\n[... log content truncated to fit the prompt budget ...]";

/// Build the provider prompt from a digest.
///
/// The result never exceeds `char_ceiling` characters. When the log section
/// does not fit it is cut first; the instructions are only cut if they alone
/// exceed the ceiling.
pub fn compose_prompt(digest: &Digest, char_ceiling: usize) -> String {
    let mut head = String::new();
    head.push_str(PROMPT_HEADER);
    head.push_str("\n\nFILES:\n");
    for file in digest.files() {
        let _ = writeln!(
            head,
            "- {} (type: {}, {} lines)",
            file.name, file.file_type, file.line_count
        );
    }

    let body = match digest.body() {
        DigestBody::Verbatim(files) => {
            let mut body = String::from("\nFULL LOG CONTENT:\n");
            for file in files {
                let _ = writeln!(body, "=== {} ({}) ===", file.name, file.file_type);
                body.push_str(&file.content);
                if !file.content.ends_with('\n') {
                    body.push('\n');
                }
            }
            body
        }
        DigestBody::Triaged(_) => render_triaged(digest),
    };

    let tail = format!("\n{}", REPORT_INSTRUCTIONS);
    assemble(&head, &body, &tail, char_ceiling)
}

fn render_triaged(digest: &Digest) -> String {
    let mut body = format!(
        "\nLOG DIGEST (categorised excerpts from the first {} lines):\n",
        digest.scanned_lines()
    );
    for category in Category::ALL {
        let excerpts = digest.lines(category);
        let _ = writeln!(
            body,
            "\n### {} ({})",
            category.as_str().to_uppercase(),
            excerpts.len()
        );
        if excerpts.is_empty() {
            body.push_str("(no matching lines)\n");
        }
        for excerpt in excerpts {
            let _ = writeln!(body, "[{}:{}] {}", excerpt.file, excerpt.line_number, excerpt.text);
        }
    }
    body
}

/// Clamp a caller-supplied, already composed prompt to the ceiling.
pub fn bound_prompt(prompt: &str, char_ceiling: usize) -> String {
    if prompt.chars().count() <= char_ceiling {
        return prompt.to_string();
    }
    assemble("", prompt, "", char_ceiling)
}

fn assemble(head: &str, body: &str, tail: &str, char_ceiling: usize) -> String {
    let frame_chars = head.chars().count() + tail.chars().count();
    let body_chars = body.chars().count();

    if frame_chars + body_chars <= char_ceiling {
        return format!("{}{}{}", head, body, tail);
    }

    let marker_chars = TRUNCATION_MARKER.chars().count();
    if frame_chars + marker_chars <= char_ceiling {
        let keep = char_ceiling - frame_chars - marker_chars;
        return format!("{}{}{}{}", head, truncate_chars(body, keep), TRUNCATION_MARKER, tail);
    }

    let whole = format!("{}{}{}", head, body, tail);
    truncate_chars(&whole, char_ceiling).to_string()
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
