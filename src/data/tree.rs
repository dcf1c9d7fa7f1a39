//! Hierarchical row derivation for the issue tables.
//!
//! [`build_rows`] is a pure function from a flat record list plus an
//! expand/collapse overlay to an ordered, depth-annotated row sequence.
//! Rows are a transient view model: rebuilt wholesale after every record
//! set or expansion change, never patched in place.

use crate::data::{ChildRef, Issue};
use std::collections::{HashMap, HashSet};

/// A single display row derived from the record set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub state: String,
    pub priority: crate::data::Priority,
    pub depth: usize,
    pub parent_id: Option<String>,
    pub has_children: bool,
    pub expanded: bool,
}

impl Row {
    fn from_issue(issue: &Issue, depth: usize, expanded: bool) -> Self {
        Self {
            id: issue.id.clone(),
            identifier: issue.identifier.clone(),
            title: issue.title.clone(),
            state: issue.state.clone(),
            priority: issue.priority,
            depth,
            parent_id: issue.parent.as_ref().map(|p| p.id.clone()),
            has_children: !issue.children.is_empty(),
            expanded,
        }
    }

    fn from_child_ref(child: &ChildRef, depth: usize, parent_id: &str) -> Self {
        Self {
            id: child.id.clone(),
            identifier: child.identifier.clone(),
            title: child.title.clone(),
            state: child.state.clone(),
            priority: child.priority,
            depth,
            parent_id: Some(parent_id.to_string()),
            has_children: false,
            expanded: false,
        }
    }
}

/// Maps issue id to its position in the input record slice.
pub type IdIndex = HashMap<String, usize>;

/// Build display rows from a flat record list and an expansion overlay.
///
/// Top-level rows are records with no parent, or whose parent is absent
/// from this record set (orphaned children are promoted rather than
/// hidden). Children are emitted at depth+1 from the refs embedded in the
/// parent, in ref order, when the parent id is expanded. A child that is
/// itself present in the record set is emitted through its full record so
/// its own children can expand in turn.
///
/// Output is fully determined by the inputs: input order is preserved for
/// top-level rows and child-ref order for children.
pub fn build_rows(issues: &[Issue], expanded: &HashMap<String, bool>) -> (Vec<Row>, IdIndex) {
    let mut index = IdIndex::with_capacity(issues.len());
    for (i, issue) in issues.iter().enumerate() {
        index.entry(issue.id.clone()).or_insert(i);
    }

    let mut rows = Vec::with_capacity(issues.len());
    for issue in issues {
        let top_level = match &issue.parent {
            None => true,
            Some(parent) => !index.contains_key(&parent.id),
        };
        if !top_level {
            continue;
        }
        let mut path = HashSet::new();
        push_issue(issue, 0, issues, &index, expanded, &mut rows, &mut path);
    }

    (rows, index)
}

fn push_issue(
    issue: &Issue,
    depth: usize,
    issues: &[Issue],
    index: &IdIndex,
    expanded: &HashMap<String, bool>,
    rows: &mut Vec<Row>,
    path: &mut HashSet<String>,
) {
    // Guard against reference cycles in malformed server data.
    if !path.insert(issue.id.clone()) {
        return;
    }

    let is_expanded = is_expanded(expanded, &issue.id);
    rows.push(Row::from_issue(issue, depth, is_expanded));

    if is_expanded {
        for child in &issue.children {
            match index.get(&child.id) {
                Some(&i) => push_issue(&issues[i], depth + 1, issues, index, expanded, rows, path),
                None => rows.push(Row::from_child_ref(child, depth + 1, &issue.id)),
            }
        }
    }

    path.remove(&issue.id);
}

/// Whether an id is expanded. Absent keys default to collapsed.
pub fn is_expanded(expanded: &HashMap<String, bool>, id: &str) -> bool {
    expanded.get(id).copied().unwrap_or(false)
}

/// Flip the expansion state of one id.
pub fn toggle_expanded(expanded: &mut HashMap<String, bool>, id: &str) {
    let entry = expanded.entry(id.to_string()).or_insert(false);
    *entry = !*entry;
}

/// Expand every record that has children.
pub fn expand_all(expanded: &mut HashMap<String, bool>, issues: &[Issue]) {
    for issue in issues {
        if !issue.children.is_empty() {
            expanded.insert(issue.id.clone(), true);
        }
    }
}

/// Collapse everything (absent keys mean collapsed).
pub fn collapse_all(expanded: &mut HashMap<String, bool>) {
    expanded.clear();
}
