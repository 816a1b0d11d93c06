//! Authentication endpoints and the login flow

use crate::pipeline::{ApiClient, HttpRequest};
use crate::session::SessionStore;
use mcpdesk_core::{
    log_operation_error, log_operation_start, log_operation_success, string_or_number,
    ApiResponse, DeskError, DeskResult, SessionCredential,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRef {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub tenants: Vec<TenantRef>,
    pub token: String,
}

impl LoginResponse {
    pub fn credential(&self) -> SessionCredential {
        SessionCredential::new(self.user_id.clone(), self.token.clone(), self.is_admin)
    }
}

impl std::fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginResponse")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("is_admin", &self.is_admin)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub tenants: Vec<TenantRef>,
}

pub struct AuthApi {
    client: ApiClient,
    store: Arc<SessionStore>,
}

impl AuthApi {
    pub fn new(client: ApiClient, store: Arc<SessionStore>) -> Self {
        Self { client, store }
    }

    /// Exchange username and password for a session and persist it
    pub async fn login(&self, username: &str, password: &str) -> DeskResult<LoginResponse> {
        log_operation_start!("login", username = %username);

        let body = json!({ "username": username, "password": password });
        let result = async {
            let response: ApiResponse<LoginResponse> =
                self.client.post_json("/api/auth/login", &body).await?;
            let login = response.require_data()?;
            self.store.save(&login.credential())?;
            Ok::<_, DeskError>(login)
        }
        .await;

        match &result {
            Ok(login) => {
                log_operation_success!("login", user_id = %login.user_id, is_admin = login.is_admin);
            }
            Err(e) => {
                log_operation_error!("login", e, username = %username);
            }
        }
        result
    }

    /// Tell the backend, then drop the local session whatever it answered
    pub async fn logout(&self) -> DeskResult<()> {
        if let Err(e) = self.client.execute(HttpRequest::post("/api/auth/logout")).await {
            warn!(error = %e, "Logout request failed, clearing the local session anyway");
        }
        self.store.clear()
    }

    pub async fn current_user(&self) -> DeskResult<CurrentUser> {
        let response: ApiResponse<CurrentUser> =
            self.client.get_json("/api/auth/current-user").await?;
        response.require_data()
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> DeskResult<()> {
        let body = json!({ "old_password": old_password, "new_password": new_password });
        let response: ApiResponse<Value> = self
            .client
            .post_json("/api/auth/change-password", &body)
            .await?;
        response.into_data().map(|_| ())
    }
}
