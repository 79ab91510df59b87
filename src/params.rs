//! Tool parameter types.
//!
//! These structs are both the advertised input contract (through their
//! `JsonSchema` derive) and the gate every call passes before reaching GitHub.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::MilestoneError;

/// Checks that serde and schemars cannot express.
pub trait Validate {
    fn validate(&self) -> Result<(), MilestoneError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StateFilter {
    #[default]
    Open,
    Closed,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    DueOn,
    Completeness,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl StateFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            StateFilter::Open => "open",
            StateFilter::Closed => "closed",
            StateFilter::All => "all",
        }
    }
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::DueOn => "due_on",
            SortField::Completeness => "completeness",
        }
    }
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

fn default_per_page() -> u32 {
    30
}

fn default_page() -> u32 {
    1
}

/// Keeps an explicit `null` apart from a missing key: absent stays `None`,
/// `null` becomes `Some(None)`.
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListMilestonesParams {
    #[schemars(description = "Repository owner (username or organization)")]
    pub owner: String,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Filter by milestone state")]
    #[serde(default)]
    pub state: StateFilter,

    #[schemars(description = "Sort milestones by")]
    #[serde(default)]
    pub sort: SortField,

    #[schemars(description = "Sort direction")]
    #[serde(default)]
    pub direction: Direction,

    #[schemars(description = "Results per page", range(min = 1, max = 100))]
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    #[schemars(description = "Page number", range(min = 1))]
    #[serde(default = "default_page")]
    pub page: u32,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MilestoneParams {
    #[schemars(description = "Repository owner (username or organization)")]
    pub owner: String,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Milestone number", range(min = 1))]
    pub milestone_number: u64,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateMilestoneParams {
    #[schemars(description = "Repository owner (username or organization)")]
    pub owner: String,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Milestone title", length(min = 1))]
    pub title: String,

    #[schemars(description = "Milestone description")]
    #[serde(default)]
    pub description: Option<String>,

    #[schemars(description = "Due date (ISO 8601 format)", extend("format" = "date-time"))]
    #[serde(default)]
    pub due_on: Option<String>,

    #[schemars(
        description = "Milestone state (GitHub defaults to open)",
        extend("default" = "open")
    )]
    #[serde(default)]
    pub state: Option<MilestoneState>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateMilestoneParams {
    #[schemars(description = "Repository owner (username or organization)")]
    pub owner: String,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Milestone number to update", range(min = 1))]
    pub milestone_number: u64,

    #[schemars(description = "New milestone title", length(min = 1))]
    #[serde(default)]
    pub title: Option<String>,

    #[schemars(
        with = "Option<String>",
        description = "New milestone description (null clears it)"
    )]
    #[serde(default, deserialize_with = "explicit_null")]
    pub description: Option<Option<String>>,

    #[schemars(
        with = "Option<String>",
        description = "New due date (ISO 8601 format, null clears it)",
        extend("format" = "date-time")
    )]
    #[serde(default, deserialize_with = "explicit_null")]
    pub due_on: Option<Option<String>>,

    #[schemars(description = "New milestone state")]
    #[serde(default)]
    pub state: Option<MilestoneState>,
}

/// Outbound body for `POST /repos/{owner}/{repo}/milestones`.
#[derive(Debug, Serialize)]
pub struct CreateMilestoneBody<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_on: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<MilestoneState>,
}

impl<'a> From<&'a CreateMilestoneParams> for CreateMilestoneBody<'a> {
    fn from(params: &'a CreateMilestoneParams) -> Self {
        Self {
            title: &params.title,
            description: params.description.as_deref(),
            due_on: params.due_on.as_deref(),
            state: params.state,
        }
    }
}

/// Outbound body for `PATCH /repos/{owner}/{repo}/milestones/{number}`.
#[derive(Debug, Serialize)]
pub struct UpdateMilestoneBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_on: Option<Option<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<MilestoneState>,
}

impl<'a> From<&'a UpdateMilestoneParams> for UpdateMilestoneBody<'a> {
    fn from(params: &'a UpdateMilestoneParams) -> Self {
        Self {
            title: params.title.as_deref(),
            description: params.description.as_ref().map(|d| d.as_deref()),
            due_on: params.due_on.as_ref().map(|d| d.as_deref()),
            state: params.state,
        }
    }
}

/// Query string for `GET /repos/{owner}/{repo}/milestones`.
#[derive(Debug)]
pub struct ListMilestonesQuery {
    pub state: StateFilter,
    pub sort: SortField,
    pub direction: Direction,
    pub per_page: u32,
    pub page: u32,
}

impl std::fmt::Display for ListMilestonesQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "state={}&sort={}&direction={}&per_page={}&page={}",
            self.state.as_str(),
            self.sort.as_str(),
            self.direction.as_str(),
            self.per_page,
            self.page
        )
    }
}

impl From<&ListMilestonesParams> for ListMilestonesQuery {
    fn from(params: &ListMilestonesParams) -> Self {
        Self {
            state: params.state,
            sort: params.sort,
            direction: params.direction,
            per_page: params.per_page,
            page: params.page,
        }
    }
}

/// Validate that a GitHub owner/repo name doesn't contain characters that
/// could be used for URL injection in API routes.
pub fn sanitize_github_name(name: &str, field: &'static str) -> Result<(), MilestoneError> {
    if name.is_empty() {
        return Err(MilestoneError::InvalidParam {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    for ch in ['/', '?', '#', '%', '&', '\0', ' ', '\n', '\t'] {
        if name.contains(ch) {
            return Err(MilestoneError::InvalidParam {
                field,
                reason: format!("contains invalid character {:?}", ch),
            });
        }
    }
    Ok(())
}

fn check_repo(owner: &str, repo: &str) -> Result<(), MilestoneError> {
    sanitize_github_name(owner, "owner")?;
    sanitize_github_name(repo, "repo")
}

fn check_number(number: u64) -> Result<(), MilestoneError> {
    if number == 0 {
        return Err(MilestoneError::InvalidParam {
            field: "milestone_number",
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(())
}

fn check_title(title: &str) -> Result<(), MilestoneError> {
    if title.is_empty() {
        return Err(MilestoneError::InvalidParam {
            field: "title",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

fn check_due_on(due_on: &str) -> Result<(), MilestoneError> {
    chrono::DateTime::parse_from_rfc3339(due_on)
        .map(|_| ())
        .map_err(|e| MilestoneError::InvalidParam {
            field: "due_on",
            reason: format!("not an ISO 8601 timestamp ({})", e),
        })
}

impl Validate for ListMilestonesParams {
    fn validate(&self) -> Result<(), MilestoneError> {
        check_repo(&self.owner, &self.repo)?;
        if !(1..=100).contains(&self.per_page) {
            return Err(MilestoneError::InvalidParam {
                field: "per_page",
                reason: "must be between 1 and 100".to_string(),
            });
        }
        if self.page == 0 {
            return Err(MilestoneError::InvalidParam {
                field: "page",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Validate for MilestoneParams {
    fn validate(&self) -> Result<(), MilestoneError> {
        check_repo(&self.owner, &self.repo)?;
        check_number(self.milestone_number)
    }
}

impl Validate for CreateMilestoneParams {
    fn validate(&self) -> Result<(), MilestoneError> {
        check_repo(&self.owner, &self.repo)?;
        check_title(&self.title)?;
        if let Some(ref due_on) = self.due_on {
            check_due_on(due_on)?;
        }
        Ok(())
    }
}

impl Validate for UpdateMilestoneParams {
    fn validate(&self) -> Result<(), MilestoneError> {
        check_repo(&self.owner, &self.repo)?;
        check_number(self.milestone_number)?;
        if let Some(ref title) = self.title {
            check_title(title)?;
        }
        if let Some(Some(ref due_on)) = self.due_on {
            check_due_on(due_on)?;
        }
        Ok(())
    }
}
