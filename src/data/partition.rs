//! Ownership partition of the record set.

use crate::data::Issue;

/// Split issues into (mine, other) by assignee id.
///
/// Stable: relative order within each bucket matches the input order. An
/// empty `owner_id` puts everything in "other".
pub fn partition_by_assignee(issues: &[Issue], owner_id: &str) -> (Vec<Issue>, Vec<Issue>) {
    let mut mine = Vec::new();
    let mut other = Vec::new();

    for issue in issues {
        let is_mine = !owner_id.is_empty()
            && issue.assignee_id.as_deref() == Some(owner_id);
        if is_mine {
            mine.push(issue.clone());
        } else {
            other.push(issue.clone());
        }
    }

    (mine, other)
}
