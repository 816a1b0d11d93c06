//! MCP service management endpoints

use crate::pipeline::{ApiClient, HttpRequest};
use mcpdesk_core::{ApiResponse, DeskResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpStatus {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub enabled_tools_count: usize,
    #[serde(default)]
    pub enabled_tools: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A hosted service as listed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServiceInfo {
    pub id: i64,
    pub module_id: i64,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub service_uuid: String,
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    pub sse_url: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub config_params: Option<Value>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub can_edit: Option<bool>,
    #[serde(default)]
    pub service_type: Option<i32>,
    #[serde(default)]
    pub service_type_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolLoadRequest {
    pub module_path: String,
    pub function_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub struct McpServiceApi {
    client: ApiClient,
    prefix: String,
}

impl McpServiceApi {
    pub fn new(client: ApiClient, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    fn path(&self, endpoint: &str) -> String {
        format!("{}/service/{}", self.prefix, endpoint)
    }

    pub async fn status(&self) -> DeskResult<McpStatus> {
        let response: ApiResponse<McpStatus> = self.client.get_json(&self.path("status")).await?;
        Ok(response.into_data()?.unwrap_or_default())
    }

    pub async fn enabled_tools(&self) -> DeskResult<Vec<String>> {
        let response: ApiResponse<Vec<String>> =
            self.client.get_json(&self.path("enabled_tools")).await?;
        Ok(response.into_data()?.unwrap_or_default())
    }

    pub async fn restart(&self) -> DeskResult<Option<Value>> {
        let response: ApiResponse<Value> = self
            .client
            .send_json(HttpRequest::post(self.path("restart")))
            .await?;
        response.into_data()
    }

    pub async fn list_services(&self, module_id: Option<i64>) -> DeskResult<Vec<McpServiceInfo>> {
        let mut request = HttpRequest::get(self.path("list"));
        if let Some(module_id) = module_id {
            request = request.with_query("module_id", module_id);
        }

        let response: ApiResponse<Vec<McpServiceInfo>> = self.client.send_json(request).await?;
        Ok(response.into_data()?.unwrap_or_default())
    }

    pub async fn load_tool(&self, tool: &ToolLoadRequest) -> DeskResult<Option<Value>> {
        let response: ApiResponse<Value> =
            self.client.post_json(&self.path("load_tool"), tool).await?;
        response.into_data()
    }

    pub async fn unload_tool(&self, tool_name: &str) -> DeskResult<Option<Value>> {
        let response: ApiResponse<Value> = self
            .client
            .post_json(&self.path("unload_tool"), &json!({ "tool_name": tool_name }))
            .await?;
        response.into_data()
    }

    pub async fn update_sse_url(&self, sse_url: &str) -> DeskResult<Option<Value>> {
        let response: ApiResponse<Value> = self
            .client
            .put_json(&self.path("sse_url"), &json!({ "sse_url": sse_url }))
            .await?;
        response.into_data()
    }
}
