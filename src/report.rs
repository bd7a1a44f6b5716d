/// HTML report: render scored intermittents and perma bugs to a single
/// static page.
///
/// Uses atomic write pattern: write to temp file then rename.
use crate::aggregate::ScoredResult;
use crate::perma::PermaBug;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

const STYLE: &str = "\
body { font-family: sans-serif; padding: 1em; }
h2 { margin: .8em 0 .4em; }
ul.buglist { list-style: disc; padding-left: 1em; margin: 0; }
ul.details { list-style: circle; padding-left: 1.5em; margin-top: 0.25em; margin-bottom: 0; }
ul.subdetails { list-style: square; padding-left: 2em; margin: 0; }
.section { margin-top: 12px; }
";

/// Escape text for element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn bug_heading(out: &mut String, link: &str, id: u64, summary: &str) {
    out.push_str(&format!(
        "<a href=\"{}\" target=\"_blank\">Bug {} - {}</a>\n",
        escape(link),
        id,
        escape(summary)
    ));
}

fn graph_item(out: &mut String, graph_link: &str) {
    out.push_str(&format!(
        "    <li>(<a href=\"{}\" target=\"_blank\">Orange Factor Graph</a>)</li>\n",
        escape(graph_link)
    ));
}

fn sublist(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("    <li>{label}:\n      <ul class=\"subdetails\">"));
    for item in items {
        out.push_str(&format!("<li>{}</li>", escape(item)));
    }
    out.push_str("</ul>\n    </li>\n");
}

fn people(out: &mut String, assignee: Option<&str>, needinfo: Option<&str>) {
    if let Some(who) = assignee {
        out.push_str(&format!(
            "    <li><b>Assigned To</b>: {}</li>\n",
            escape(who)
        ));
    }
    if let Some(who) = needinfo {
        out.push_str(&format!("    <li><b>NEEDINFO</b>: {}</li>\n", escape(who)));
    }
}

/// Render the full report page.
pub fn render(intermittents: &[ScoredResult], permas: &[PermaBug], generated: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head><meta charset=\"UTF-8\"><title>Bugzilla Report</title>\n");
    out.push_str(&format!("<style>\n{STYLE}</style>\n</head><body>\n\n"));
    out.push_str(&format!(
        "<p style=\"font-size: 0.9em; color: #666;\">Last updated: {}</p>\n",
        generated.format("%Y-%m-%d %H:%M UTC")
    ));

    out.push_str("<h2>🟧 Intermittent Failures</h2>\n<ul class=\"buglist\">\n");
    for r in intermittents {
        out.push_str("<li>");
        bug_heading(&mut out, &r.link, r.id, &r.summary);
        out.push_str("  <ul class=\"details\">\n");
        graph_item(&mut out, &r.graph_link);
        out.push_str(&format!("    <li>{} Failures</li>\n", r.failures));
        sublist(&mut out, "Platforms", &r.platforms);
        sublist(&mut out, "Repository Breakdown", &r.breakdown);
        people(&mut out, r.assignee.as_deref(), r.needinfo.as_deref());
        out.push_str("  </ul>\n</li>\n");
    }
    out.push_str("</ul>\n");

    if !permas.is_empty() {
        out.push_str("\n<div class=\"section\">\n<h2>🟥 Perma Failures</h2>\n<ul class=\"buglist\">\n");
        for p in permas {
            out.push_str("<li>");
            bug_heading(&mut out, &p.link, p.id, &p.summary);
            out.push_str("  <ul class=\"details\">\n");
            graph_item(&mut out, &p.graph_link);
            people(&mut out, p.assignee.as_deref(), p.needinfo.as_deref());
            out.push_str("  </ul>\n</li>\n");
        }
        out.push_str("</ul>\n</div>\n");
    }

    out.push_str("\n</body></html>\n");
    out
}

/// Errors that can occur while writing the report.
#[derive(Debug)]
pub enum ReportError {
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Write { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            ReportError::Rename { from, to, source } => {
                write!(
                    f,
                    "failed to rename {} to {}: {}",
                    from.display(),
                    to.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Write { source, .. } => Some(source),
            ReportError::Rename { source, .. } => Some(source),
        }
    }
}

/// Atomically write `html` to `path`.
///
/// Writes to a temporary file in the same directory, then renames so a
/// browser never sees a partial page.
pub fn write_report(path: &Path, html: &str) -> Result<(), ReportError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp_path = dir.join(format!(".orange-triage.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, html.as_bytes()).map_err(|e| ReportError::Write {
        path: tmp_path.clone(),
        source: e,
    })?;

    std::fs::rename(&tmp_path, path).map_err(|e| ReportError::Rename {
        from: tmp_path,
        to: path.to_path_buf(),
        source: e,
    })?;

    tracing::debug!(path = %path.display(), bytes = html.len(), "report written");
    Ok(())
}
