use crate::bugzilla::Bug;
use crate::links::Links;

/// A bug whose summary marks it as a permanent failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermaBug {
    pub id: u64,
    pub link: String,
    pub summary: String,
    pub assignee: Option<String>,
    pub graph_link: String,
    pub needinfo: Option<String>,
}

/// Annotate every perma bug from the list query. No scoring is applied.
pub fn perma_bugs(bugs: &[Bug], links: &Links, unassigned: &str) -> Vec<PermaBug> {
    bugs.iter()
        .map(|bug| PermaBug {
            id: bug.id,
            link: links.bug(bug.id),
            summary: bug.summary.clone(),
            assignee: bug.assignee(unassigned).map(str::to_string),
            graph_link: links.graph(bug.id),
            needinfo: bug.needinfo().map(str::to_string),
        })
        .collect()
}
