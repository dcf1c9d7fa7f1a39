//! Tracker API client: the page/detail fetch boundary.
//!
//! Hand-written GraphQL documents with typed serde responses. The
//! controller never calls this module directly; it is wired in through the
//! fetcher closures in [`crate::sync`].

use crate::config::Config;
use crate::data::{
    ChildRef, Comment, FetchParams, Issue, IssuePage, IssueRef, Label, Priority, User,
};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Shared HTTP client for all API requests to enable connection pooling.
pub static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(5)
        .build()
        .expect("Failed to create HTTP client")
});

const ISSUE_FIELDS: &str = r#"
    id
    identifier
    title
    description
    url
    createdAt
    updatedAt
    priority
    archivedAt
    state {
        id
        name
    }
    assignee {
        id
        name
    }
    team {
        id
    }
    project {
        id
    }
    labels {
        nodes {
            name
            color
        }
    }
    parent {
        id
        identifier
        title
        url
    }
    children {
        nodes {
            id
            identifier
            title
            url
            priority
            state {
                name
            }
        }
    }
"#;

#[derive(Debug, Clone)]
pub struct ApiClient {
    endpoint: String,
    token: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            endpoint: config.api.endpoint.clone(),
            token: config.api.token.clone(),
        }
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        query: String,
        variables: serde_json::Value,
    ) -> Result<T> {
        let response = HTTP_CLIENT
            .post(&self.endpoint)
            .header("Authorization", &self.token)
            .header("Content-Type", "application/json")
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .context("API request failed")?;

        let body: GraphQlResponse<T> = response
            .json()
            .await
            .context("Failed to decode API response")?;

        if let Some(errors) = body.errors {
            let message = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(anyhow!("API error: {message}"));
        }
        body.data.ok_or_else(|| anyhow!("API returned no data"))
    }

    /// Fetch one page of issues for the given filter/sort and cursor.
    pub async fn fetch_issues_page(
        &self,
        params: &FetchParams,
        cursor: Option<&str>,
    ) -> Result<IssuePage> {
        let query = format!(
            r#"
            query Issues($filter: IssueFilter, $orderBy: PaginationOrderBy, $first: Int, $after: String) {{
                issues(filter: $filter, orderBy: $orderBy, first: $first, after: $after) {{
                    nodes {{
                        {ISSUE_FIELDS}
                    }}
                    pageInfo {{
                        hasNextPage
                        endCursor
                    }}
                }}
            }}
            "#
        );

        let first = if params.page_size == 0 {
            50
        } else {
            params.page_size
        };
        let variables = json!({
            "filter": build_issue_filter(params),
            "orderBy": params.order_by.api_value(),
            "first": first,
            "after": cursor,
        });

        let data: IssuesData = self.post(query, variables).await?;
        let issues = data
            .issues
            .nodes
            .into_iter()
            .filter_map(parse_issue_node)
            .collect();

        Ok(IssuePage {
            issues,
            end_cursor: data.issues.page_info.end_cursor,
            has_more: data.issues.page_info.has_next_page,
        })
    }

    /// Fetch the full record for one issue, including comments.
    pub async fn fetch_issue(&self, id: &str) -> Result<Issue> {
        let query = format!(
            r#"
            query Issue($id: String!) {{
                issue(id: $id) {{
                    {ISSUE_FIELDS}
                    comments {{
                        nodes {{
                            id
                            body
                            createdAt
                            user {{
                                name
                            }}
                        }}
                    }}
                }}
            }}
            "#
        );

        let data: IssueData = self.post(query, json!({ "id": id })).await?;
        parse_issue_node(data.issue).ok_or_else(|| anyhow!("Issue {id} missing required fields"))
    }

    /// Fetch the authenticated user's identity.
    pub async fn current_user(&self) -> Result<User> {
        let query = r#"
            query Viewer {
                viewer {
                    id
                    name
                }
            }
        "#;

        let data: ViewerData = self.post(query.to_string(), json!({})).await?;
        Ok(User {
            id: data.viewer.id,
            name: data.viewer.name,
        })
    }
}

/// Build the GraphQL issue filter for the given params.
///
/// Free-text search requires every whitespace-separated term to match at
/// least one of title, description, or identifier.
fn build_issue_filter(params: &FetchParams) -> serde_json::Value {
    let mut filter = serde_json::Map::new();
    if let Some(team_id) = &params.team_id {
        filter.insert("team".into(), json!({ "id": { "eq": team_id } }));
    }
    if let Some(project_id) = &params.project_id {
        filter.insert("project".into(), json!({ "id": { "eq": project_id } }));
    }
    if let Some(state_id) = &params.state_id {
        filter.insert("state".into(), json!({ "id": { "eq": state_id } }));
    }

    let terms: Vec<&str> = params.search.split_whitespace().collect();
    match terms.as_slice() {
        [] => {}
        [term] => {
            filter.insert("or".into(), json!(search_or_filters(term)));
        }
        _ => {
            let ands: Vec<_> = terms
                .iter()
                .map(|term| json!({ "or": search_or_filters(term) }))
                .collect();
            filter.insert("and".into(), json!(ands));
        }
    }

    serde_json::Value::Object(filter)
}

fn search_or_filters(term: &str) -> Vec<serde_json::Value> {
    vec![
        json!({ "title": { "containsIgnoreCase": term } }),
        json!({ "description": { "containsIgnoreCase": term } }),
        json!({ "identifier": { "containsIgnoreCase": term } }),
    ]
}

// Type-safe response structures for the GraphQL API.

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IssuesData {
    issues: IssueConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueConnection {
    nodes: Vec<IssueNode>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IssueData {
    issue: IssueNode,
}

#[derive(Debug, Deserialize)]
struct ViewerData {
    viewer: ViewerNode,
}

#[derive(Debug, Deserialize)]
struct ViewerNode {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueNode {
    id: String,
    identifier: String,
    title: String,
    description: Option<String>,
    url: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
    priority: Option<i64>,
    archived_at: Option<String>,
    state: Option<StateNode>,
    assignee: Option<UserNode>,
    team: Option<IdNode>,
    project: Option<IdNode>,
    labels: Option<LabelConnection>,
    parent: Option<ParentNode>,
    children: Option<ChildConnection>,
    comments: Option<CommentConnection>,
}

#[derive(Debug, Deserialize)]
struct StateNode {
    id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserNode {
    id: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdNode {
    id: String,
}

#[derive(Debug, Deserialize)]
struct LabelConnection {
    nodes: Vec<LabelNode>,
}

#[derive(Debug, Deserialize)]
struct LabelNode {
    name: String,
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParentNode {
    id: String,
    identifier: Option<String>,
    title: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChildConnection {
    nodes: Vec<ChildNode>,
}

#[derive(Debug, Deserialize)]
struct ChildNode {
    id: String,
    identifier: Option<String>,
    title: Option<String>,
    url: Option<String>,
    priority: Option<i64>,
    state: Option<StateNode>,
}

#[derive(Debug, Deserialize)]
struct CommentConnection {
    nodes: Vec<CommentNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    id: String,
    body: String,
    created_at: Option<String>,
    user: Option<CommentAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommentAuthor {
    name: Option<String>,
}

fn parse_timestamp(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Parse a typed IssueNode into an Issue, skipping nodes with incomplete
/// parent or child references rather than failing the whole page.
fn parse_issue_node(node: IssueNode) -> Option<Issue> {
    let state = node.state?;

    let parent = node.parent.and_then(|p| {
        Some(IssueRef {
            id: p.id,
            identifier: p.identifier?,
            title: p.title.unwrap_or_default(),
            url: p.url.unwrap_or_default(),
        })
    });

    let children = node
        .children
        .map(|c| {
            c.nodes
                .into_iter()
                .filter_map(|child| {
                    Some(ChildRef {
                        id: child.id,
                        identifier: child.identifier?,
                        title: child.title.unwrap_or_default(),
                        url: child.url.unwrap_or_default(),
                        state: child.state.map(|s| s.name).unwrap_or_default(),
                        priority: Priority::from_int(child.priority.unwrap_or(0)),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let labels = node
        .labels
        .map(|l| {
            l.nodes
                .into_iter()
                .map(|label| Label {
                    name: label.name,
                    color: label.color.unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    let comments = node
        .comments
        .map(|c| {
            c.nodes
                .into_iter()
                .map(|comment| Comment {
                    id: comment.id,
                    body: comment.body,
                    author: comment.user.and_then(|u| u.name),
                    created_at: parse_timestamp(comment.created_at.as_deref()),
                })
                .collect()
        })
        .unwrap_or_default();

    Some(Issue {
        id: node.id,
        identifier: node.identifier,
        title: node.title,
        description: node.description,
        state: state.name,
        state_id: state.id,
        assignee: node.assignee.as_ref().and_then(|a| a.name.clone()),
        assignee_id: node.assignee.map(|a| a.id),
        priority: Priority::from_int(node.priority.unwrap_or(0)),
        url: node.url.unwrap_or_default(),
        created_at: parse_timestamp(node.created_at.as_deref()),
        updated_at: parse_timestamp(node.updated_at.as_deref()),
        team_id: node.team.map(|t| t.id),
        project_id: node.project.map(|p| p.id),
        archived: node.archived_at.is_some(),
        labels,
        parent,
        children,
        comments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_node() -> IssueNode {
        serde_json::from_value(json!({
            "id": "issue-1",
            "identifier": "ENG-1",
            "title": "First issue",
            "state": { "id": "state-1", "name": "Todo" }
        }))
        .expect("valid node")
    }

    #[test]
    fn test_parse_minimal_node() {
        let issue = parse_issue_node(minimal_node()).expect("should parse");
        assert_eq!(issue.id, "issue-1");
        assert_eq!(issue.identifier, "ENG-1");
        assert_eq!(issue.state, "Todo");
        assert_eq!(issue.priority, Priority::NoPriority);
        assert!(issue.children.is_empty());
        assert!(!issue.archived);
    }

    #[test]
    fn test_parse_node_without_state_is_skipped() {
        let node: IssueNode = serde_json::from_value(json!({
            "id": "issue-2",
            "identifier": "ENG-2",
            "title": "No state"
        }))
        .expect("valid node");
        assert!(parse_issue_node(node).is_none());
    }

    #[test]
    fn test_incomplete_child_refs_are_skipped() {
        let node: IssueNode = serde_json::from_value(json!({
            "id": "issue-3",
            "identifier": "ENG-3",
            "title": "Parent",
            "state": { "name": "Todo" },
            "children": { "nodes": [
                { "id": "child-1" },
                {
                    "id": "child-2",
                    "identifier": "ENG-5",
                    "title": "Valid child",
                    "priority": 2,
                    "state": { "name": "Done" }
                }
            ]}
        }))
        .expect("valid node");

        let issue = parse_issue_node(node).expect("should parse");
        assert_eq!(issue.children.len(), 1);
        assert_eq!(issue.children[0].identifier, "ENG-5");
        assert_eq!(issue.children[0].priority, Priority::High);
    }

    #[test]
    fn test_search_filter_requires_every_term() {
        let params = FetchParams {
            search: "login bug".to_string(),
            ..Default::default()
        };
        let filter = build_issue_filter(&params);
        let ands = filter["and"].as_array().expect("and filter");
        assert_eq!(ands.len(), 2);
        assert_eq!(ands[0]["or"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_single_term_search_uses_or_filter() {
        let params = FetchParams {
            search: "login".to_string(),
            ..Default::default()
        };
        let filter = build_issue_filter(&params);
        assert!(filter.get("and").is_none());
        assert_eq!(filter["or"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_team_filter_shape() {
        let params = FetchParams {
            team_id: Some("team-1".to_string()),
            ..Default::default()
        };
        let filter = build_issue_filter(&params);
        assert_eq!(filter["team"]["id"]["eq"], "team-1");
    }
}
