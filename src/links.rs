use chrono::{Days, NaiveDate};

/// Builds the bug and graph links shown in the report.
#[derive(Debug, Clone)]
pub struct Links {
    bug_url: String,
    graph_url: String,
    start: NaiveDate,
    end: NaiveDate,
}

impl Links {
    /// Graph links cover `days_back` days ending at `today`.
    pub fn new(bug_url: &str, graph_url: &str, today: NaiveDate, days_back: u32) -> Self {
        let start = today
            .checked_sub_days(Days::new(u64::from(days_back)))
            .unwrap_or(NaiveDate::MIN);
        Self {
            bug_url: bug_url.to_string(),
            graph_url: graph_url.to_string(),
            start,
            end: today,
        }
    }

    pub fn bug(&self, id: u64) -> String {
        format!("{}?id={}", self.bug_url, id)
    }

    /// Orange factor graph for the bug over the lookback window.
    pub fn graph(&self, id: u64) -> String {
        format!(
            "{}?startday={}&endday={}&tree=all&bug={}",
            self.graph_url,
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d"),
            id
        )
    }

    pub fn window_start(&self) -> NaiveDate {
        self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links() -> Links {
        Links::new(
            "https://bugzilla.mozilla.org/show_bug.cgi",
            "https://treeherder.mozilla.org/intermittent-failures/bugdetails",
            NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
            7,
        )
    }

    #[test]
    fn bug_link() {
        assert_eq!(
            links().bug(1234),
            "https://bugzilla.mozilla.org/show_bug.cgi?id=1234"
        );
    }

    #[test]
    fn graph_link_spans_window_across_month_boundary() {
        assert_eq!(
            links().graph(1234),
            "https://treeherder.mozilla.org/intermittent-failures/bugdetails?startday=2026-02-24&endday=2026-03-03&tree=all&bug=1234"
        );
    }

    #[test]
    fn window_start_is_days_back() {
        assert_eq!(
            links().window_start(),
            NaiveDate::from_ymd_opt(2026, 2, 24).unwrap()
        );
    }
}
