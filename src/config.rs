use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from triage.toml.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TriageConfig {
    pub bugzilla: BugzillaConfig,
    pub scoring: ScoringConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BugzillaConfig {
    /// REST endpoint for bug queries; comment fetches append `/{id}/comment`.
    pub base_url: String,
    pub product: String,
    pub components: Vec<String>,
    pub keywords: String,
    /// Substring that marks a bug summary as a perma failure.
    pub perma_marker: String,
    /// Maximum number of comment fetches in flight at once.
    pub concurrency: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub threshold: u64,
    pub days_back: u32,
    /// Only comments by this author are scored.
    pub author: String,
    pub extractor: ExtractorKind,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output: PathBuf,
    pub bug_url: String,
    pub graph_url: String,
    /// Assignee value Bugzilla uses for "nobody".
    pub unassigned: String,
    pub open_browser: bool,
}

/// Which section extractor scans comment text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    #[default]
    Regex,
    Lines,
}

// --- Default implementations ---

impl Default for BugzillaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://bugzilla.mozilla.org/rest/bug".to_string(),
            product: "Testing".to_string(),
            components: ["AWSY", "mozperftest", "Performance", "Raptor", "Talos"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            keywords: "intermittent-failure".to_string(),
            perma_marker: "Perma".to_string(),
            concurrency: 15,
            timeout_secs: 30,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: 20,
            days_back: 7,
            author: "orangefactor@bots.tld".to_string(),
            extractor: ExtractorKind::Regex,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("report.html"),
            bug_url: "https://bugzilla.mozilla.org/show_bug.cgi".to_string(),
            graph_url: "https://treeherder.mozilla.org/intermittent-failures/bugdetails"
                .to_string(),
            unassigned: "nobody@mozilla.org".to_string(),
            open_browser: true,
        }
    }
}

/// Errors that can occur while loading the config file.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Load config from `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<TriageConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(TriageConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub concurrency: Option<usize>,
    pub output: Option<PathBuf>,
    pub no_open: bool,
}

impl TriageConfig {
    /// Merge CLI overrides into the loaded config.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(n) = overrides.concurrency {
            self.bugzilla.concurrency = n;
        }
        if let Some(output) = overrides.output {
            self.report.output = output;
        }
        if overrides.no_open {
            self.report.open_browser = false;
        }
        if self.bugzilla.concurrency == 0 {
            tracing::warn!("concurrency of 0 is not usable, clamping to 1");
            self.bugzilla.concurrency = 1;
        }
        let max = tokio::sync::Semaphore::MAX_PERMITS;
        if self.bugzilla.concurrency > max {
            tracing::warn!(
                requested = self.bugzilla.concurrency,
                max,
                "concurrency above the permit limit, clamping"
            );
            self.bugzilla.concurrency = max;
        }
    }
}
