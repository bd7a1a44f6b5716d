/// Fan-out/fan-in over intermittent bugs: fetch every bug's comments under a
/// concurrency limit, score them, and collect the bugs that pass.
use crate::bugzilla::{Bug, BugSource, Comment};
use crate::config::TriageConfig;
use crate::extract::{extractor_for, SectionExtractor};
use crate::links::Links;
use crate::score::{score_comments, ScoringRules};
use chrono::{DateTime, Days, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// One reported intermittent bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredResult {
    pub id: u64,
    pub link: String,
    pub failures: u64,
    pub summary: String,
    pub platforms: Vec<String>,
    pub breakdown: Vec<String>,
    pub needinfo: Option<String>,
    pub graph_link: String,
    pub assignee: Option<String>,
}

/// Everything one run needs to score and annotate bugs.
pub struct RunContext {
    pub rules: ScoringRules,
    pub links: Links,
    pub extractor: Box<dyn SectionExtractor>,
    /// Assignee value treated as "unassigned".
    pub unassigned: String,
    /// Maximum comment fetches in flight.
    pub concurrency: usize,
}

impl RunContext {
    /// Resolve config against the current time.
    pub fn from_config(config: &TriageConfig, now: DateTime<Utc>) -> Self {
        let days_back = config.scoring.days_back;
        let cutoff = now
            .checked_sub_days(Days::new(u64::from(days_back)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self {
            rules: ScoringRules {
                threshold: config.scoring.threshold,
                author: config.scoring.author.clone(),
                cutoff,
            },
            links: Links::new(
                &config.report.bug_url,
                &config.report.graph_url,
                now.date_naive(),
                days_back,
            ),
            extractor: extractor_for(config.scoring.extractor),
            unassigned: config.report.unassigned.clone(),
            concurrency: config.bugzilla.concurrency.clamp(1, Semaphore::MAX_PERMITS),
        }
    }
}

/// Score one bug's comments and build its report entry.
pub fn analyze_bug(bug: &Bug, comments: &[Comment], ctx: &RunContext) -> Option<ScoredResult> {
    let best = score_comments(comments, &ctx.rules, ctx.extractor.as_ref())?;
    Some(ScoredResult {
        id: bug.id,
        link: ctx.links.bug(bug.id),
        failures: best.failures,
        summary: bug.summary.clone(),
        platforms: best.platforms,
        breakdown: best.breakdown,
        needinfo: bug.needinfo().map(str::to_string),
        graph_link: ctx.links.graph(bug.id),
        assignee: bug.assignee(&ctx.unassigned).map(str::to_string),
    })
}

/// Analyze every bug concurrently and return those that pass the threshold,
/// highest failure count first.
///
/// A bug whose comments cannot be fetched or decoded is left out; no single
/// bug can fail the run.
pub async fn analyze_all<S: BugSource>(
    source: Arc<S>,
    bugs: Vec<Bug>,
    ctx: Arc<RunContext>,
) -> Vec<ScoredResult> {
    if bugs.is_empty() {
        return Vec::new();
    }

    let total = bugs.len();
    let permits = Arc::new(Semaphore::new(
        ctx.concurrency.clamp(1, Semaphore::MAX_PERMITS),
    ));
    let results: Arc<Mutex<HashMap<u64, ScoredResult>>> = Arc::new(Mutex::new(HashMap::new()));
    let mut tasks = JoinSet::new();

    tracing::info!(
        bugs = total,
        concurrency = ctx.concurrency,
        extractor = ctx.extractor.name(),
        "analyzing intermittent bugs"
    );

    for bug in bugs {
        let source = Arc::clone(&source);
        let permits = Arc::clone(&permits);
        let results = Arc::clone(&results);
        let ctx = Arc::clone(&ctx);

        tasks.spawn(async move {
            let fetched = {
                // Held only across the fetch; dropped on every exit path.
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                source.comments(bug.id).await
            };

            let comments = match fetched {
                Ok(c) => c,
                Err(e) => {
                    tracing::debug!(bug = bug.id, error = %e, "dropping bug, comment fetch failed");
                    return;
                }
            };

            if let Some(result) = analyze_bug(&bug, &comments, &ctx) {
                tracing::debug!(bug = bug.id, failures = result.failures, "bug passed threshold");
                results
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(bug.id, result);
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::warn!(error = %e, "bug analysis task did not complete");
        }
    }

    let mut flat: Vec<ScoredResult> = results
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .drain()
        .map(|(_, result)| result)
        .collect();
    flat.sort_by(|a, b| b.failures.cmp(&a.failures).then(a.id.cmp(&b.id)));

    tracing::info!(analyzed = total, reported = flat.len(), "analysis complete");
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bugzilla::BugzillaError;
    use crate::extract::RegexExtractor;
    use crate::score::tests::{bot_text, comment, rules, BOT};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-memory comment source with an optional per-call delay.
    struct FakeSource {
        comments: HashMap<u64, Vec<Comment>>,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(comments: HashMap<u64, Vec<Comment>>) -> Self {
            Self {
                comments,
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl BugSource for FakeSource {
        async fn comments(&self, bug_id: u64) -> Result<Vec<Comment>, BugzillaError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.comments
                .get(&bug_id)
                .cloned()
                .ok_or(BugzillaError::MissingBug(bug_id))
        }
    }

    fn bug(id: u64) -> Bug {
        Bug {
            id,
            summary: format!("Intermittent failure {id}"),
            flags: Vec::new(),
            assigned_to: "nobody@mozilla.org".to_string(),
        }
    }

    fn ctx(concurrency: usize) -> Arc<RunContext> {
        Arc::new(RunContext {
            rules: rules(),
            links: Links::new(
                "https://bugzilla.example/show_bug.cgi",
                "https://graphs.example/bugdetails",
                NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
                7,
            ),
            extractor: Box::new(RegexExtractor),
            unassigned: "nobody@mozilla.org".to_string(),
            concurrency,
        })
    }

    fn weekly(total: u64) -> Vec<Comment> {
        vec![comment(
            BOT,
            "2026-10-12T08:00:00Z",
            bot_text(&[("autoland", total)], &["linux1804-64"]),
        )]
    }

    #[tokio::test]
    async fn empty_input_returns_nothing() {
        let source = Arc::new(FakeSource::new(HashMap::new()));
        let out = analyze_all(Arc::clone(&source), Vec::new(), ctx(15)).await;
        assert!(out.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn results_are_filtered_and_sorted() {
        let mut comments = HashMap::new();
        comments.insert(1, weekly(25));
        comments.insert(2, weekly(12));
        comments.insert(3, weekly(80));
        comments.insert(4, weekly(25));
        let source = Arc::new(FakeSource::new(comments));

        let out = analyze_all(source, (1..=4).map(bug).collect(), ctx(2)).await;
        let ids: Vec<u64> = out.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1, 4]);
        assert!(out.iter().all(|r| r.failures >= 20));
        assert!(out.windows(2).all(|w| w[0].failures >= w[1].failures));
    }

    #[tokio::test]
    async fn result_carries_links_and_people() {
        let mut comments = HashMap::new();
        comments.insert(9, weekly(25));
        let source = Arc::new(FakeSource::new(comments));
        let mut b = bug(9);
        b.assigned_to = "dev@example.com".to_string();
        b.flags = serde_json::from_str(r#"[{"name": "needinfo", "requestee": "lead@example.com"}]"#)
            .unwrap();

        let out = analyze_all(source, vec![b], ctx(15)).await;
        assert_eq!(out.len(), 1);
        let r = &out[0];
        assert_eq!(r.failures, 25);
        assert_eq!(r.platforms, vec!["linux1804-64"]);
        assert_eq!(r.breakdown, vec!["autoland: 25"]);
        assert_eq!(r.link, "https://bugzilla.example/show_bug.cgi?id=9");
        assert_eq!(
            r.graph_link,
            "https://graphs.example/bugdetails?startday=2026-10-09&endday=2026-10-16&tree=all&bug=9"
        );
        assert_eq!(r.assignee.as_deref(), Some("dev@example.com"));
        assert_eq!(r.needinfo.as_deref(), Some("lead@example.com"));
    }

    #[tokio::test]
    async fn unassigned_sentinel_becomes_none() {
        let mut comments = HashMap::new();
        comments.insert(5, weekly(30));
        let source = Arc::new(FakeSource::new(comments));
        let out = analyze_all(source, vec![bug(5)], ctx(15)).await;
        assert_eq!(out[0].assignee, None);
        assert_eq!(out[0].needinfo, None);
    }

    #[tokio::test]
    async fn failed_fetches_are_dropped_silently() {
        let mut comments = HashMap::new();
        comments.insert(1, weekly(50));
        let source = Arc::new(FakeSource::new(comments));

        // Bugs 2 and 3 have no comments in the fake and fail to fetch.
        let out = analyze_all(Arc::clone(&source), vec![bug(1), bug(2), bug(3)], ctx(1)).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(source.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn in_flight_fetches_respect_limit() {
        for limit in [1usize, 3, 8] {
            let comments: HashMap<u64, Vec<Comment>> = (1..=24).map(|id| (id, weekly(21))).collect();
            let mut fake = FakeSource::new(comments);
            fake.delay = Duration::from_millis(10);
            let source = Arc::new(fake);

            let out = analyze_all(Arc::clone(&source), (1..=24).map(bug).collect(), ctx(limit)).await;
            assert_eq!(out.len(), 24);
            let peak = source.peak.load(Ordering::SeqCst);
            assert!(peak >= 1 && peak <= limit, "peak {peak} exceeded limit {limit}");
        }
    }

    #[tokio::test]
    async fn oversized_limit_does_not_panic() {
        let mut comments = HashMap::new();
        comments.insert(1, weekly(30));
        let source = Arc::new(FakeSource::new(comments));
        let out = analyze_all(source, vec![bug(1)], ctx(usize::MAX)).await;
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn run_context_clamps_config_concurrency() {
        let mut config = TriageConfig::default();
        config.bugzilla.concurrency = usize::MAX;
        let ctx = RunContext::from_config(&config, Utc::now());
        assert_eq!(ctx.concurrency, Semaphore::MAX_PERMITS);
    }

    #[test]
    fn run_context_from_config() {
        let config = TriageConfig::default();
        let now = DateTime::parse_from_rfc3339("2026-10-16T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let ctx = RunContext::from_config(&config, now);
        assert_eq!(ctx.rules.threshold, 20);
        assert_eq!(ctx.rules.author, "orangefactor@bots.tld");
        assert_eq!(
            ctx.rules.cutoff,
            DateTime::parse_from_rfc3339("2026-10-09T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc)
        );
        assert_eq!(ctx.concurrency, 15);
        assert_eq!(ctx.extractor.name(), "regex");
        assert_eq!(
            ctx.links.window_start(),
            NaiveDate::from_ymd_opt(2026, 10, 9).unwrap()
        );
    }
}
