use std::sync::Arc;

use rmcp::model::*;
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};
use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::client::MilestonesClient;
use crate::error::MilestoneError;
use crate::params::{
    CreateMilestoneParams, ListMilestonesParams, MilestoneParams, UpdateMilestoneParams, Validate,
};

pub const LIST_MILESTONES: &str = "list_milestones";
pub const GET_MILESTONE: &str = "get_milestone";
pub const CREATE_MILESTONE: &str = "create_milestone";
pub const UPDATE_MILESTONE: &str = "update_milestone";
pub const DELETE_MILESTONE: &str = "delete_milestone";

#[derive(Clone)]
pub struct McpMilestonesServer {
    client: MilestonesClient,
}

impl McpMilestonesServer {
    pub fn new(client: MilestonesClient) -> Self {
        Self { client }
    }

    /// The advertised tool catalog. Input schemas are generated from the
    /// same parameter types `dispatch` deserializes into.
    pub fn tools() -> Vec<Tool> {
        vec![
            tool::<ListMilestonesParams>(
                LIST_MILESTONES,
                "List milestones for a GitHub repository",
            ),
            tool::<MilestoneParams>(GET_MILESTONE, "Get details of a specific milestone"),
            tool::<CreateMilestoneParams>(
                CREATE_MILESTONE,
                "Create a new milestone in a GitHub repository",
            ),
            tool::<UpdateMilestoneParams>(UPDATE_MILESTONE, "Update an existing milestone"),
            tool::<MilestoneParams>(DELETE_MILESTONE, "Delete a milestone from a repository"),
        ]
    }

    /// Route one tool call. Arguments are validated against the tool's
    /// parameter type before any request leaves the process.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, MilestoneError> {
        let arguments = arguments.ok_or(MilestoneError::MissingArguments)?;
        tracing::debug!(tool = name, "Dispatching tool call");

        let text = match name {
            LIST_MILESTONES => {
                self.client
                    .list(&parse::<ListMilestonesParams>(arguments)?)
                    .await?
            }
            GET_MILESTONE => self.client.get(&parse::<MilestoneParams>(arguments)?).await?,
            CREATE_MILESTONE => {
                self.client
                    .create(&parse::<CreateMilestoneParams>(arguments)?)
                    .await?
            }
            UPDATE_MILESTONE => {
                self.client
                    .update(&parse::<UpdateMilestoneParams>(arguments)?)
                    .await?
            }
            DELETE_MILESTONE => {
                self.client
                    .delete(&parse::<MilestoneParams>(arguments)?)
                    .await?
            }
            _ => return Err(MilestoneError::UnknownTool(name.to_string())),
        };

        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

fn parse<P>(arguments: JsonObject) -> Result<P, MilestoneError>
where
    P: DeserializeOwned + Validate,
{
    // The path prefix names the offending field ("per_page: invalid type ...").
    let params: P = serde_path_to_error::deserialize(serde_json::Value::Object(arguments))
        .map_err(|e| MilestoneError::InvalidArguments(e.to_string()))?;
    params.validate()?;
    Ok(params)
}

fn tool<P: JsonSchema>(name: &'static str, description: &'static str) -> Tool {
    Tool::new(name, description, input_schema::<P>())
}

/// Draft-07 schema with enums inlined, so clients need not resolve `$ref`s.
fn input_schema<P: JsonSchema>() -> Arc<JsonObject> {
    let schema = SchemaSettings::draft07()
        .with(|s| s.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<P>();
    match serde_json::to_value(schema) {
        Ok(serde_json::Value::Object(mut map)) => {
            map.remove("$schema");
            Arc::new(map)
        }
        _ => Arc::new(JsonObject::new()),
    }
}

impl ServerHandler for McpMilestonesServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "github-milestones-mcp-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "GitHub milestones server. Use list_milestones to see a repository's milestones, \
                 get_milestone for one milestone by number, create_milestone and update_milestone \
                 to change them, and delete_milestone to remove one."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(Self::tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.dispatch(&request.name, request.arguments)
            .await
            .map_err(|e| e.to_mcp_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use serde_json::{json, Value};
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_server(mock: &MockServer) -> McpMilestonesServer {
        let client = MilestonesClient::new("test-token".to_string(), Some(mock.uri().as_str()))
            .unwrap();
        McpMilestonesServer::new(client)
    }

    /// Fails the test on drop if any request reaches GitHub.
    async fn no_requests(mock: &MockServer) {
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(mock)
            .await;
    }

    fn args(value: Value) -> Option<JsonObject> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    fn schema_of(name: &str) -> Value {
        let tool = McpMilestonesServer::tools()
            .into_iter()
            .find(|t| t.name == name)
            .unwrap();
        Value::Object((*tool.input_schema).clone())
    }

    const ALL_TOOLS: [&str; 5] = [
        LIST_MILESTONES,
        GET_MILESTONE,
        CREATE_MILESTONE,
        UPDATE_MILESTONE,
        DELETE_MILESTONE,
    ];

    #[test]
    fn test_catalog_names() {
        let names: Vec<String> = McpMilestonesServer::tools()
            .iter()
            .map(|t| t.name.to_string())
            .collect();
        assert_eq!(names, ALL_TOOLS);
    }

    #[test]
    fn test_catalog_schemas_are_strict_objects() {
        for name in ALL_TOOLS {
            let schema = schema_of(name);
            assert_eq!(schema["type"], "object", "{}", name);
            assert_eq!(schema["additionalProperties"], false, "{}", name);
        }
    }

    #[test]
    fn test_catalog_required_fields() {
        let required = |name: &str| {
            let mut fields: Vec<String> = schema_of(name)["required"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_str().unwrap().to_string())
                .collect();
            fields.sort();
            fields
        };
        assert_eq!(required(LIST_MILESTONES), ["owner", "repo"]);
        assert_eq!(required(GET_MILESTONE), ["milestone_number", "owner", "repo"]);
        assert_eq!(required(CREATE_MILESTONE), ["owner", "repo", "title"]);
        assert_eq!(required(UPDATE_MILESTONE), ["milestone_number", "owner", "repo"]);
        assert_eq!(required(DELETE_MILESTONE), ["milestone_number", "owner", "repo"]);
    }

    #[test]
    fn test_list_schema_declares_bounds_and_defaults() {
        let props = &schema_of(LIST_MILESTONES)["properties"];
        assert_eq!(props["per_page"]["minimum"], 1);
        assert_eq!(props["per_page"]["maximum"], 100);
        assert_eq!(props["per_page"]["default"], 30);
        assert_eq!(props["page"]["minimum"], 1);
        assert_eq!(props["state"]["default"], "open");
        assert_eq!(props["state"]["enum"], json!(["open", "closed", "all"]));
    }

    #[test]
    fn test_create_schema_declares_title_and_due_on() {
        let props = &schema_of(CREATE_MILESTONE)["properties"];
        assert_eq!(props["title"]["minLength"], 1);
        assert_eq!(props["due_on"]["format"], "date-time");
        assert_eq!(props["state"]["default"], "open");
    }

    #[tokio::test]
    async fn test_missing_arguments_rejected_for_every_tool() {
        let mock = MockServer::start().await;
        no_requests(&mock).await;
        let server = make_server(&mock);

        for name in ALL_TOOLS {
            let err = server.dispatch(name, None).await.unwrap_err();
            assert!(matches!(err, MilestoneError::MissingArguments), "{}", name);
            assert_eq!(err.category(), ErrorCategory::InputShape);
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_rejected() {
        let mock = MockServer::start().await;
        no_requests(&mock).await;
        let server = make_server(&mock);

        let err = server
            .dispatch(
                "rename_milestone",
                args(json!({"owner": "acme", "repo": "widgets", "milestone_number": 1})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: rename_milestone");
        assert_eq!(err.category(), ErrorCategory::UnknownOperation);
        assert_eq!(
            err.to_mcp_error().message,
            "Tool execution failed: Unknown tool: rename_milestone"
        );
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_github() {
        let mock = MockServer::start().await;
        no_requests(&mock).await;
        let server = make_server(&mock);

        let cases = [
            (GET_MILESTONE, json!({"owner": "acme", "repo": "widgets"})),
            (GET_MILESTONE, json!({"owner": "acme", "repo": "widgets", "milestone_number": 0})),
            (
                DELETE_MILESTONE,
                json!({"owner": "acme", "repo": "widgets", "milestone_number": 1, "force": true}),
            ),
            (CREATE_MILESTONE, json!({"owner": "acme", "repo": "widgets", "title": ""})),
            (LIST_MILESTONES, json!({"owner": "acme/evil", "repo": "widgets"})),
            (
                UPDATE_MILESTONE,
                json!({"owner": "acme", "repo": "widgets", "milestone_number": 2, "state": "all"}),
            ),
        ];
        for (name, value) in cases {
            let err = server.dispatch(name, args(value)).await.unwrap_err();
            assert_eq!(err.category(), ErrorCategory::InputShape, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_rejections_name_the_field() {
        let mock = MockServer::start().await;
        no_requests(&mock).await;
        let server = make_server(&mock);

        let err = server
            .dispatch(
                LIST_MILESTONES,
                args(json!({"owner": "acme", "repo": "widgets", "per_page": 1000})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MilestoneError::InvalidParam { field: "per_page", .. }));

        let cases = [
            (
                LIST_MILESTONES,
                json!({"owner": "acme", "repo": "widgets", "state": "merged"}),
                "state",
            ),
            (
                GET_MILESTONE,
                json!({"owner": "acme", "repo": "widgets", "milestone_number": "x"}),
                "milestone_number",
            ),
            (
                UPDATE_MILESTONE,
                json!({"owner": "acme", "repo": "widgets", "milestone_number": 3.0}),
                "milestone_number",
            ),
        ];
        for (name, value, field) in cases {
            let err = server.dispatch(name, args(value)).await.unwrap_err();
            assert!(matches!(err, MilestoneError::InvalidArguments(_)), "{}", name);
            assert!(err.to_string().contains(field), "{}: {}", name, err);
        }
    }

    #[tokio::test]
    async fn test_delete_returns_text_envelope() {
        let mock = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/acme/widgets/milestones/7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock)
            .await;
        let server = make_server(&mock);

        let result = server
            .dispatch(
                DELETE_MILESTONE,
                args(json!({"owner": "acme", "repo": "widgets", "milestone_number": 7})),
            )
            .await
            .unwrap();

        let envelope = serde_json::to_value(&result).unwrap();
        let content = envelope["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(
            content[0]["text"],
            "Successfully deleted milestone #7 from acme/widgets"
        );
    }

    #[tokio::test]
    async fn test_remote_failure_is_doubly_wrapped() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/milestones/3"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "Not Found",
                "documentation_url": "https://docs.github.com/rest"
            })))
            .mount(&mock)
            .await;
        let server = make_server(&mock);

        let err = server
            .dispatch(
                GET_MILESTONE,
                args(json!({"owner": "acme", "repo": "widgets", "milestone_number": 3})),
            )
            .await
            .unwrap_err();
        let mcp = err.to_mcp_error();
        assert_eq!(
            mcp.message,
            "Tool execution failed: Failed to get milestone: Not Found"
        );
        let data = mcp.data.unwrap();
        assert_eq!(data["category"], "remote_call");
        assert_eq!(data["status"], 404);
    }

    #[tokio::test]
    async fn test_get_info_advertises_tools() {
        let mock = MockServer::start().await;
        let info = make_server(&mock).get_info();
        assert!(info.capabilities.tools.is_some());
        assert_eq!(info.server_info.name, "github-milestones-mcp-server");
    }
}
