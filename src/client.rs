use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, USER_AGENT as USER_AGENT_HEADER};
use http::{HeaderValue, StatusCode, Uri};
use http_body_util::combinators::BoxBody;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use octocrab::service::middleware::base_uri::BaseUriLayer;
use octocrab::service::middleware::extra_headers::ExtraHeadersLayer;
use octocrab::{AuthState, FromResponse, OctocrabBuilder};
use serde_json::Value;

use crate::error::MilestoneError;
use crate::params::{
    CreateMilestoneBody, CreateMilestoneParams, ListMilestonesParams, ListMilestonesQuery,
    MilestoneParams, UpdateMilestoneBody, UpdateMilestoneParams,
};

/// Identifier sent as `User-Agent` on every request.
pub const USER_AGENT: &str = concat!("github-milestones-mcp-server/", env!("CARGO_PKG_VERSION"));

const DEFAULT_API_URL: &str = "https://api.github.com";

type OctoResponse = http::Response<BoxBody<Bytes, octocrab::Error>>;

/// The one authenticated GitHub session, shared by every tool call.
///
/// Each method issues a single request and returns the text payload for the
/// tool result; failures come back as [`MilestoneError::Remote`].
#[derive(Clone)]
pub struct MilestonesClient {
    github: Arc<octocrab::Octocrab>,
}

impl MilestonesClient {
    /// Build a client for `token`. `base_url` overrides api.github.com.
    ///
    /// The service stack is assembled by hand so that exactly one
    /// `User-Agent` goes out and no request is retried or redirected.
    pub fn new(token: String, base_url: Option<&str>) -> Result<Self, MilestoneError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(MilestoneError::MissingToken);
        }

        let base_uri: Uri = base_url
            .unwrap_or(DEFAULT_API_URL)
            .parse()
            .map_err(|e: http::uri::InvalidUri| MilestoneError::Client(e.to_string()))?;

        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| MilestoneError::Client(e.to_string()))?;
        authorization.set_sensitive(true);
        let headers = vec![
            (USER_AGENT_HEADER, HeaderValue::from_static(USER_AGENT)),
            (ACCEPT, HeaderValue::from_static("application/vnd.github+json")),
            (AUTHORIZATION, authorization),
        ];

        let connector = HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| MilestoneError::Client(e.to_string()))?
            .https_or_http()
            .enable_http1()
            .build();
        let service = Client::builder(TokioExecutor::new()).build(connector);

        let github = OctocrabBuilder::new_empty()
            .with_service(service)
            .with_layer(&BaseUriLayer::new(base_uri))
            .with_layer(&ExtraHeadersLayer::new(Arc::new(headers)))
            .with_auth(AuthState::None)
            .build()
            .map_err(|e| MilestoneError::Client(e.to_string()))?;

        Ok(Self {
            github: Arc::new(github),
        })
    }

    pub async fn list(&self, params: &ListMilestonesParams) -> Result<String, MilestoneError> {
        let route = milestones_route(&params.owner, &params.repo);
        let query = ListMilestonesQuery::from(params);

        let response = self.github._get(format!("{}?{}", route, query)).await;
        let milestones = read_json("list", response).await?;

        tracing::debug!(
            repo = %format!("{}/{}", params.owner, params.repo),
            count = milestones.as_array().map(|a| a.len()).unwrap_or(0),
            "Listed milestones"
        );
        Ok(pretty(&milestones))
    }

    pub async fn get(&self, params: &MilestoneParams) -> Result<String, MilestoneError> {
        let route = milestone_route(&params.owner, &params.repo, params.milestone_number);

        let response = self.github._get(route).await;
        let milestone = read_json("get", response).await?;

        Ok(pretty(&milestone))
    }

    pub async fn create(&self, params: &CreateMilestoneParams) -> Result<String, MilestoneError> {
        let route = milestones_route(&params.owner, &params.repo);
        let body = CreateMilestoneBody::from(params);

        let response = self.github._post(route, Some(&body)).await;
        let milestone = read_json("create", response).await?;

        tracing::info!(
            repo = %format!("{}/{}", params.owner, params.repo),
            number = ?milestone.get("number"),
            "Created milestone"
        );
        Ok(format!(
            "Successfully created milestone \"{}\". Details:\n{}",
            params.title,
            pretty(&milestone)
        ))
    }

    pub async fn update(&self, params: &UpdateMilestoneParams) -> Result<String, MilestoneError> {
        let route = milestone_route(&params.owner, &params.repo, params.milestone_number);
        let body = UpdateMilestoneBody::from(params);

        let response = self.github._patch(route, Some(&body)).await;
        let milestone = read_json("update", response).await?;

        tracing::info!(
            repo = %format!("{}/{}", params.owner, params.repo),
            number = params.milestone_number,
            "Updated milestone"
        );
        Ok(format!(
            "Successfully updated milestone #{}. Details:\n{}",
            params.milestone_number,
            pretty(&milestone)
        ))
    }

    pub async fn delete(&self, params: &MilestoneParams) -> Result<String, MilestoneError> {
        let route = milestone_route(&params.owner, &params.repo, params.milestone_number);

        // 204 with an empty body, so only the status is checked.
        let response = self.github._delete(route, None::<&()>).await;
        check_status("delete", response).await?;

        tracing::info!(
            repo = %format!("{}/{}", params.owner, params.repo),
            number = params.milestone_number,
            "Deleted milestone"
        );
        Ok(format!(
            "Successfully deleted milestone #{} from {}/{}",
            params.milestone_number, params.owner, params.repo
        ))
    }
}

fn milestones_route(owner: &str, repo: &str) -> String {
    format!("/repos/{}/{}/milestones", owner, repo)
}

fn milestone_route(owner: &str, repo: &str, number: u64) -> String {
    format!("/repos/{}/{}/milestones/{}", owner, repo, number)
}

/// Fail on a non-success status, keeping the status even when the body is
/// not a GitHub error document.
async fn check_status(
    verb: &'static str,
    response: octocrab::Result<OctoResponse>,
) -> Result<OctoResponse, MilestoneError> {
    let response = response.map_err(|e| remote_failure(verb, None, e))?;
    let status = response.status();
    octocrab::map_github_error(response)
        .await
        .map_err(|e| remote_failure(verb, Some(status), e))
}

async fn read_json(
    verb: &'static str,
    response: octocrab::Result<OctoResponse>,
) -> Result<Value, MilestoneError> {
    let response = check_status(verb, response).await?;
    let status = response.status();
    Value::from_response(response)
        .await
        .map_err(|e| remote_failure(verb, Some(status), e))
}

fn remote_failure(
    verb: &'static str,
    status: Option<StatusCode>,
    e: octocrab::Error,
) -> MilestoneError {
    let err = MilestoneError::remote(verb, status, e);
    tracing::warn!(status = ?err.status(), "{}", err);
    err
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
