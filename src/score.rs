/// Per-bug scoring: pick the bot comment with the highest failure total.
use crate::bugzilla::Comment;
use crate::classify::{breakdown_from, platforms_from};
use crate::extract::SectionExtractor;
use chrono::{DateTime, Utc};

/// Which comments count and how high a total must be to report.
#[derive(Debug, Clone)]
pub struct ScoringRules {
    /// Minimum best total for a bug to be reported.
    pub threshold: u64,
    /// Comments by any other author are ignored.
    pub author: String,
    /// Comments created before this instant are ignored.
    pub cutoff: DateTime<Utc>,
}

/// Highest-scoring breakdown found in a bug's comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestMatch {
    pub failures: u64,
    pub breakdown: Vec<String>,
    pub platforms: Vec<String>,
}

/// Scan `comments` newest-first and return the best breakdown, if it
/// reaches the threshold.
///
/// A later (older) comment only replaces the current best when its total is
/// strictly greater, so among equal totals the newest wins.
pub fn score_comments(
    comments: &[Comment],
    rules: &ScoringRules,
    extractor: &dyn SectionExtractor,
) -> Option<BestMatch> {
    let mut best: Option<BestMatch> = None;
    let mut max = 0u64;

    for comment in comments.iter().rev() {
        if comment.author != rules.author {
            continue;
        }
        let created = match DateTime::parse_from_rfc3339(&comment.creation_time) {
            Ok(t) => t.with_timezone(&Utc),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    creation_time = %comment.creation_time,
                    "skipping comment with unparseable timestamp"
                );
                continue;
            }
        };
        if created < rules.cutoff {
            continue;
        }
        let Some(section) = extractor.extract(&comment.text) else {
            continue;
        };

        let total = section.total_failures();
        if total > max {
            max = total;
            best = Some(BestMatch {
                failures: total,
                breakdown: breakdown_from(&section.repositories),
                platforms: platforms_from(&section.platforms),
            });
        }
    }

    best.filter(|b| b.failures >= rules.threshold)
}
