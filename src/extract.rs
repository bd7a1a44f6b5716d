/// Breakdown section extraction: locate the repository breakdown in a bot
/// comment and total the per-repository failure counts.
///
/// The bot posts comments shaped like:
/// - `## Repository breakdown:` followed by `* repo: N` bullets
/// - `## Table` followed by a markdown table and platform lines
use crate::config::ExtractorKind;
use regex::Regex;
use std::sync::LazyLock;

pub const BREAKDOWN_HEADER: &str = "## Repository breakdown:";
pub const TABLE_HEADER: &str = "## Table";

static SECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)## Repository breakdown:(.*?)## Table(.*?)$").unwrap()
});

// ASCII-only classes: Unicode digits and spaces are not counts.
static COUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u::\s*([0-9]+))").unwrap());

/// The two blocks cut out of one comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakdownSection {
    /// Text between the breakdown header and the table header.
    pub repositories: String,
    /// Everything after the table header, to the end of the comment.
    pub platforms: String,
}

impl BreakdownSection {
    /// Sum of every `: N` count in the repository block.
    pub fn total_failures(&self) -> u64 {
        sum_counts(&self.repositories)
    }
}

/// Finds the breakdown section in raw comment text.
pub trait SectionExtractor: Send + Sync {
    /// Human-readable extractor name, for logs.
    fn name(&self) -> &str;

    /// Return the section, or `None` if the text has no breakdown.
    fn extract(&self, text: &str) -> Option<BreakdownSection>;
}

/// Build the extractor selected in config.
pub fn extractor_for(kind: ExtractorKind) -> Box<dyn SectionExtractor> {
    match kind {
        ExtractorKind::Regex => Box::new(RegexExtractor),
        ExtractorKind::Lines => Box::new(LineExtractor),
    }
}

/// Lazy multi-line match between the two headers.
pub struct RegexExtractor;

impl SectionExtractor for RegexExtractor {
    fn name(&self) -> &str {
        "regex"
    }

    fn extract(&self, text: &str) -> Option<BreakdownSection> {
        let caps = SECTION_PATTERN.captures(text)?;
        Some(BreakdownSection {
            repositories: caps.get(1)?.as_str().to_string(),
            platforms: caps.get(2)?.as_str().to_string(),
        })
    }
}

/// Walks the comment line by line, switching state on each header.
pub struct LineExtractor;

enum LineState {
    Searching,
    Repositories,
    Platforms,
}

impl SectionExtractor for LineExtractor {
    fn name(&self) -> &str {
        "lines"
    }

    fn extract(&self, text: &str) -> Option<BreakdownSection> {
        let mut state = LineState::Searching;
        let mut repositories: Vec<&str> = Vec::new();
        let mut platforms: Vec<&str> = Vec::new();

        for line in text.split('\n') {
            match state {
                LineState::Searching => {
                    if let Some(idx) = line.find(BREAKDOWN_HEADER) {
                        let rest = &line[idx + BREAKDOWN_HEADER.len()..];
                        if let Some(end) = rest.find(TABLE_HEADER) {
                            repositories.push(&rest[..end]);
                            platforms.push(&rest[end + TABLE_HEADER.len()..]);
                            state = LineState::Platforms;
                        } else {
                            repositories.push(rest);
                            state = LineState::Repositories;
                        }
                    }
                }
                LineState::Repositories => {
                    if let Some(idx) = line.find(TABLE_HEADER) {
                        repositories.push(&line[..idx]);
                        platforms.push(&line[idx + TABLE_HEADER.len()..]);
                        state = LineState::Platforms;
                    } else {
                        repositories.push(line);
                    }
                }
                LineState::Platforms => platforms.push(line),
            }
        }

        match state {
            LineState::Platforms => Some(BreakdownSection {
                repositories: repositories.join("\n"),
                platforms: platforms.join("\n"),
            }),
            // No table header means the section never closed.
            _ => None,
        }
    }
}

/// Sum every `:` + optional whitespace + digit run in `block`.
///
/// Counts too large for `u64` are skipped; the sum saturates.
pub fn sum_counts(block: &str) -> u64 {
    COUNT_PATTERN
        .captures_iter(block)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u64>().ok())
        .fold(0u64, |acc, n| acc.saturating_add(n))
}
