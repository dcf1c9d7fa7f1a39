//! Core data model: issues, references, fetch parameters, and pages.

pub mod partition;
pub mod tree;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single issue record as held in the authoritative record set.
///
/// Identity (`id`) is immutable; everything else reflects the most recent
/// fetch. Child and parent references are embedded by the server and carry
/// enough data to render without an extra round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub identifier: String, // e.g., "ENG-123"
    pub title: String,
    pub description: Option<String>,
    pub state: String,
    pub state_id: Option<String>,
    pub assignee: Option<String>,
    pub assignee_id: Option<String>,
    pub priority: Priority,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub team_id: Option<String>,
    pub project_id: Option<String>,
    pub archived: bool,
    pub labels: Vec<Label>,
    pub parent: Option<IssueRef>,
    pub children: Vec<ChildRef>,
    pub comments: Vec<Comment>,
}

/// Issue label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub color: String,
}

/// Reference to a parent issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRef {
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub url: String,
}

/// Reference to a child/sub-issue, embedded in the parent record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildRef {
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub url: String,
    pub state: String,
    pub priority: Priority,
}

/// A comment on an issue, present only after a detail fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub body: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Issue priority (0-4 from the API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    #[default]
    NoPriority = 0,
    Urgent = 1,
    High = 2,
    Medium = 3,
    Low = 4,
}

impl Priority {
    /// Create from the API integer value (0-4).
    pub fn from_int(value: i64) -> Self {
        match value {
            1 => Self::Urgent,
            2 => Self::High,
            3 => Self::Medium,
            4 => Self::Low,
            _ => Self::NoPriority,
        }
    }

    /// Sort order (lower = higher priority; no-priority sorts last).
    pub fn sort_order(&self) -> u8 {
        match self {
            Self::Urgent => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
            Self::NoPriority => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Urgent => "Urgent",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::NoPriority => "None",
        }
    }
}

/// Sort field for issue fetches.
///
/// `UpdatedAt` and `CreatedAt` are applied server-side; `Priority` is
/// sorted client-side after each merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    UpdatedAt,
    CreatedAt,
    Priority,
}

impl SortField {
    /// Value accepted by the API's orderBy argument, if server-side.
    pub fn api_value(&self) -> Option<&'static str> {
        match self {
            Self::UpdatedAt => Some("updatedAt"),
            Self::CreatedAt => Some("createdAt"),
            Self::Priority => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::UpdatedAt => "Updated",
            Self::CreatedAt => "Created",
            Self::Priority => "Priority",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Self::UpdatedAt => Self::CreatedAt,
            Self::CreatedAt => Self::Priority,
            Self::Priority => Self::UpdatedAt,
        }
    }
}

/// Parameters for a paginated issue fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchParams {
    pub team_id: Option<String>,
    pub project_id: Option<String>,
    pub state_id: Option<String>,
    pub search: String,
    pub order_by: SortField,
    pub page_size: usize,
}

/// One page of issues plus its continuation cursor.
#[derive(Debug, Clone, Default)]
pub struct IssuePage {
    pub issues: Vec<Issue>,
    pub end_cursor: Option<String>,
    pub has_more: bool,
}

/// Current user identity, used for the mine/other partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}
