//! Provider API calls made with the caller's access token.

use portcullis_core::{Identity, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::config::{ProviderConfig, ResourceKind};
use crate::error::ProviderError;
use crate::oauth::build_http_client;

const WORKSPACES_QUERY: &str = "query { me { workspaces { id name } } }";
const PROJECT_QUERY: &str = "query project($id: String!) { project(id: $id) { id name } }";

/// Identity claims returned by the user info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    /// Subject identifier.
    pub sub: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Avatar URL.
    #[serde(default)]
    pub picture: Option<String>,
}

impl UserInfo {
    /// Converts the claims into the gateway's identity type.
    #[must_use]
    pub fn into_identity(self) -> Identity {
        Identity::new(self.sub, self.email, self.name)
    }
}

/// A workspace the caller belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Workspace {
    /// Workspace identifier.
    pub id: String,
    /// Workspace name.
    pub name: String,
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

/// Returns true if a GraphQL error message says the caller may not see the
/// resource, as opposed to the query itself failing.
fn is_refusal(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    ["not authorized", "unauthorized", "forbidden", "permission", "not found"]
        .iter()
        .any(|marker| message.contains(marker))
}

#[derive(Deserialize)]
struct WorkspacesData {
    me: WorkspacesMe,
}

#[derive(Deserialize)]
struct WorkspacesMe {
    workspaces: Vec<Workspace>,
}

#[derive(Deserialize)]
struct ProjectData {
    project: Option<ProjectNode>,
}

#[derive(Deserialize)]
struct ProjectNode {
    id: String,
}

/// Client for the provider's user info and GraphQL endpoints.
#[derive(Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    userinfo_url: String,
    graphql_url: String,
}

impl ApiClient {
    /// Creates a client for the configured endpoints.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: build_http_client(config)?,
            userinfo_url: config.userinfo_url().to_string(),
            graphql_url: config.graphql_url().to_string(),
        })
    }

    /// Fetches the identity behind an access token.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::UserInfo` on transport failure, timeout,
    /// non-200 status, or an undecodable body.
    #[instrument(skip_all)]
    pub async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, ProviderError> {
        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::UserInfo {
                details: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ProviderError::UserInfo {
                details: format!("unexpected status: {}", status.as_u16()),
            }
            .into());
        }

        let user_info: UserInfo = response.json().await.map_err(|e| ProviderError::UserInfo {
            details: format!("decode response: {}", e),
        })?;

        debug!(subject = %user_info.sub, "fetched user info");
        Ok(user_info)
    }

    /// Lists the workspaces the caller belongs to.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::AccessCheck` on transport failure, non-200
    /// status, an undecodable body, or a GraphQL error.
    #[instrument(skip_all)]
    pub async fn fetch_workspaces(&self, access_token: &str) -> Result<Vec<Workspace>, ProviderError> {
        let response: GraphQlResponse<WorkspacesData> =
            self.graphql(access_token, WORKSPACES_QUERY, None).await?;

        if let Some(error) = response.errors.first() {
            return Err(ProviderError::AccessCheck {
                details: format!("graphql error: {}", error.message),
            }
            .into());
        }

        let data = response.data.ok_or_else(|| ProviderError::AccessCheck {
            details: "graphql response has no data".to_string(),
        })?;
        Ok(data.me.workspaces)
    }

    /// Returns true if the caller is a member of the workspace.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::fetch_workspaces`].
    pub async fn has_workspace_access(
        &self,
        access_token: &str,
        workspace_id: &str,
    ) -> Result<bool, ProviderError> {
        let workspaces = self.fetch_workspaces(access_token).await?;
        Ok(workspaces.iter().any(|ws| ws.id == workspace_id))
    }

    /// Returns true if the caller can see the project.
    ///
    /// The provider answers a project lookup with `null` when the token has
    /// no grant for it, either bare or alongside a "not authorized" or "not
    /// found" GraphQL error. Those are denials; any other GraphQL error is a
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::AccessCheck` on transport failure, non-200
    /// status, an undecodable body, or a GraphQL error that is not a refusal.
    #[instrument(skip_all)]
    pub async fn has_project_access(
        &self,
        access_token: &str,
        project_id: &str,
    ) -> Result<bool, ProviderError> {
        let response: GraphQlResponse<ProjectData> = self
            .graphql(access_token, PROJECT_QUERY, Some(json!({ "id": project_id })))
            .await?;

        let found = response
            .data
            .and_then(|data| data.project)
            .is_some_and(|project| project.id == project_id);
        if found {
            return Ok(true);
        }

        match response.errors.iter().find(|e| !is_refusal(&e.message)) {
            Some(error) => Err(ProviderError::AccessCheck {
                details: format!("graphql error: {}", error.message),
            }
            .into()),
            None => {
                if let Some(error) = response.errors.first() {
                    debug!(error = %error.message, "project lookup refused");
                }
                Ok(false)
            }
        }
    }

    /// Runs the membership check for the given resource.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::AccessCheck` if the query fails.
    pub async fn has_access(
        &self,
        access_token: &str,
        kind: ResourceKind,
        resource_id: &str,
    ) -> Result<bool, ProviderError> {
        match kind {
            ResourceKind::Workspace => self.has_workspace_access(access_token, resource_id).await,
            ResourceKind::Project => self.has_project_access(access_token, resource_id).await,
        }
    }

    async fn graphql<T>(
        &self,
        access_token: &str,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<GraphQlResponse<T>, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .http_client
            .post(&self.graphql_url)
            .bearer_auth(access_token)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await
            .map_err(|e| ProviderError::AccessCheck {
                details: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ProviderError::AccessCheck {
                details: format!("unexpected status: {}", status.as_u16()),
            }
            .into());
        }

        let body = response.json().await.map_err(|e| ProviderError::AccessCheck {
            details: format!("decode response: {}", e),
        })?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        let config = ProviderConfig::new(
            "client".to_string(),
            "secret".to_string(),
            "ws_1".to_string(),
        )
        .with_endpoint_base(&server.uri())
        .with_timeout_seconds(1);
        ApiClient::new(&config).expect("client")
    }

    #[tokio::test]
    async fn fetch_user_info_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/me"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "u1",
                "email": "a@b.com",
                "name": "A",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let info = client(&server).fetch_user_info("tok").await.expect("user info");
        assert_eq!(
            info.into_identity(),
            Identity::new("u1".to_string(), "a@b.com".to_string(), "A".to_string())
        );
    }

    #[tokio::test]
    async fn fetch_user_info_tolerates_missing_optional_claims() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sub": "u2" })))
            .mount(&server)
            .await;

        let info = client(&server).fetch_user_info("tok").await.expect("user info");
        assert_eq!(info.sub, "u2");
        assert!(info.email.is_empty());
        assert!(info.picture.is_none());
    }

    #[tokio::test]
    async fn fetch_user_info_rejects_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).fetch_user_info("tok").await.expect_err("should fail");
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn fetch_user_info_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/me"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "sub": "u1" }))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        assert!(client(&server).fetch_user_info("tok").await.is_err());
    }

    #[tokio::test]
    async fn workspace_membership_matches_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql/v2"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "me": { "workspaces": [
                    { "id": "ws_other", "name": "Other" },
                    { "id": "ws_1", "name": "Mine" },
                ]}}
            })))
            .mount(&server)
            .await;

        let api = client(&server);
        assert!(api.has_workspace_access("tok", "ws_1").await.expect("check"));
        assert!(!api.has_workspace_access("tok", "ws_missing").await.expect("check"));
    }

    #[tokio::test]
    async fn workspace_graphql_error_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{ "message": "Not Authorized" }],
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .has_access("tok", ResourceKind::Workspace, "ws_1")
            .await
            .expect_err("should fail");
        assert!(err.to_string().contains("Not Authorized"));
    }

    #[tokio::test]
    async fn project_access_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql/v2"))
            .and(body_partial_json(json!({ "variables": { "id": "prj_1" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "project": { "id": "prj_1", "name": "App" } }
            })))
            .mount(&server)
            .await;

        let allowed = client(&server)
            .has_access("tok", ResourceKind::Project, "prj_1")
            .await
            .expect("check");
        assert!(allowed);
    }

    #[tokio::test]
    async fn project_refusal_is_a_denial() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "project": null },
                "errors": [{ "message": "Not Authorized" }],
            })))
            .mount(&server)
            .await;

        let allowed = client(&server)
            .has_project_access("tok", "prj_1")
            .await
            .expect("check");
        assert!(!allowed);
    }

    #[tokio::test]
    async fn missing_project_without_errors_is_a_denial() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "project": null },
            })))
            .mount(&server)
            .await;

        let allowed = client(&server)
            .has_project_access("tok", "prj_1")
            .await
            .expect("check");
        assert!(!allowed);
    }

    #[tokio::test]
    async fn project_not_found_is_a_denial() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{ "message": "Project not found" }],
            })))
            .mount(&server)
            .await;

        let allowed = client(&server)
            .has_project_access("tok", "prj_1")
            .await
            .expect("check");
        assert!(!allowed);
    }

    #[tokio::test]
    async fn project_internal_error_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{ "message": "Internal server error" }],
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .has_project_access("tok", "prj_1")
            .await
            .expect_err("should fail");
        assert!(matches!(
            err.current_context(),
            ProviderError::AccessCheck { .. }
        ));
    }

    #[test]
    fn refusal_messages_are_recognised() {
        assert!(is_refusal("Not Authorized"));
        assert!(is_refusal("You do not have permission to view this"));
        assert!(!is_refusal("Internal server error"));
        assert!(!is_refusal("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn membership_query_rejects_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql/v2"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        assert!(
            client(&server)
                .has_access("tok", ResourceKind::Project, "prj_1")
                .await
                .is_err()
        );
    }
}
