use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde_json::{json, Value};
use tracing::{debug, warn};

use spaces_core::catalog::Access;
use spaces_core::request::{path_segments, NewSpace, SpaceRequest, SpaceUpdate};
use spaces_core::{AuthContext, HubError, SpacesBackend};

use crate::config::HubConfig;

/// Client for the Spaces endpoints of the Hugging Face API.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone, Debug)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HubClient {
    pub fn new(config: &HubConfig) -> Result<Self, HubError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            HubError::InvalidRequest(format!("invalid base URL {}: {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(HubError::InvalidRequest(format!(
                "base URL {} cannot carry a path",
                config.base_url
            )));
        }
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()
            .map_err(|e| HubError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    // ── Spaces ───────────────────────────────────────────────────────

    /// Spaces owned by the token's user (`/me` resolves the owner name).
    pub async fn list_my_spaces(&self, auth: &AuthContext) -> Result<Value, HubError> {
        let me = self.get_json(self.endpoint(&["me"])?, auth).await?;
        let owner = me
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| HubError::Decode("user info has no name".into()))?;
        self.list_by_owner(owner, auth).await
    }

    pub async fn list_by_owner(&self, owner: &str, auth: &AuthContext) -> Result<Value, HubError> {
        let mut url = self.endpoint(&["spaces"])?;
        url.query_pairs_mut().append_pair("owner", owner);
        self.get_json(url, auth).await
    }

    pub async fn search(&self, query: &str, auth: &AuthContext) -> Result<Value, HubError> {
        let mut url = self.endpoint(&["spaces"])?;
        url.query_pairs_mut().append_pair("search", query);
        self.get_json(url, auth).await
    }

    pub async fn get_space(&self, space_id: &str, auth: &AuthContext) -> Result<Value, HubError> {
        let url = self.space_endpoint(space_id, &[])?;
        self.get_json(url, auth).await
    }

    pub async fn create_space(&self, space: &NewSpace, auth: &AuthContext) -> Result<Value, HubError> {
        let url = self.endpoint(&["spaces", "create"])?;
        let request = self.http.post(url).json(&creation_payload(space));
        let response = self.send(request, auth).await?;
        self.read_json(response).await
    }

    /// Create the target space, copy the source into it, then return the
    /// target's fresh state.
    pub async fn duplicate_space(
        &self,
        source_space_id: &str,
        space: &NewSpace,
        auth: &AuthContext,
    ) -> Result<Value, HubError> {
        let created = self.create_space(space, auth).await?;
        let owner = match &space.organization {
            Some(org) => org.clone(),
            None => created
                .get("owner")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| HubError::Decode("created space has no owner".into()))?,
        };
        let target = format!("{owner}/{}", space.name);

        let url = self.space_endpoint(&target, &["duplicate"])?;
        let request = self.http.post(url).json(&json!({ "from": source_space_id }));
        self.send(request, auth).await?;

        self.get_space(&target, auth).await
    }

    pub async fn update_space(
        &self,
        space_id: &str,
        changes: &SpaceUpdate,
        auth: &AuthContext,
    ) -> Result<Value, HubError> {
        let url = self.space_endpoint(space_id, &[])?;
        let response = self.send(self.http.put(url).json(changes), auth).await?;
        self.read_json(response).await
    }

    pub async fn delete_space(&self, space_id: &str, auth: &AuthContext) -> Result<Value, HubError> {
        let url = self.space_endpoint(space_id, &[])?;
        self.send(self.http.delete(url), auth).await?;
        Ok(Value::Null)
    }

    pub async fn rename_space(
        &self,
        space_id: &str,
        new_name: &str,
        auth: &AuthContext,
    ) -> Result<Value, HubError> {
        let url = self.space_endpoint(space_id, &["rename"])?;
        let request = self.http.post(url).json(&json!({ "name": new_name }));
        let response = self.send(request, auth).await?;
        self.read_json(response).await
    }

    pub async fn restart_space(
        &self,
        space_id: &str,
        hardware: Option<&str>,
        auth: &AuthContext,
    ) -> Result<Value, HubError> {
        let url = self.space_endpoint(space_id, &["restart"])?;
        let body = match hardware {
            Some(hardware) => json!({ "hardware": hardware }),
            None => json!({}),
        };
        self.send(self.http.post(url).json(&body), auth).await?;
        Ok(Value::Null)
    }

    pub async fn pause_space(&self, space_id: &str, auth: &AuthContext) -> Result<Value, HubError> {
        let url = self.space_endpoint(space_id, &["pause"])?;
        self.send(self.http.post(url), auth).await?;
        Ok(Value::Null)
    }

    pub async fn logs(&self, space_id: &str, count: u64, auth: &AuthContext) -> Result<Value, HubError> {
        let mut url = self.space_endpoint(space_id, &["logs"])?;
        url.query_pairs_mut().append_pair("n", &count.to_string());
        let response = self.send(self.http.get(url), auth).await?;
        self.read_text(response).await
    }

    // ── Catalog endpoints ────────────────────────────────────────────

    pub async fn hardware(&self, auth: &AuthContext) -> Result<Value, HubError> {
        self.get_json(self.endpoint(&["spaces", "hardware"])?, auth).await
    }

    pub async fn runtimes(&self, auth: &AuthContext) -> Result<Value, HubError> {
        self.get_json(self.endpoint(&["spaces", "runtimes"])?, auth).await
    }

    // ── Files ────────────────────────────────────────────────────────

    /// List files below `path`; an empty path lists the repository root.
    pub async fn list_files(
        &self,
        space_id: &str,
        path: &str,
        auth: &AuthContext,
    ) -> Result<Value, HubError> {
        let url = self.file_endpoint(space_id, "tree", path, true)?;
        self.get_json(url, auth).await
    }

    pub async fn read_file(
        &self,
        space_id: &str,
        path: &str,
        auth: &AuthContext,
    ) -> Result<Value, HubError> {
        let url = self.file_endpoint(space_id, "raw", path, false)?;
        let response = self.send(self.http.get(url), auth).await?;
        self.read_text(response).await
    }

    pub async fn write_text_file(
        &self,
        space_id: &str,
        path: &str,
        content: &str,
        auth: &AuthContext,
    ) -> Result<Value, HubError> {
        let url = self.file_endpoint(space_id, "upload", path, false)?;
        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "text/plain")
            .body(content.to_owned());
        self.send(request, auth).await?;
        Ok(Value::Null)
    }

    /// Upload a file from the server's local filesystem as multipart `file`.
    pub async fn upload_file(
        &self,
        space_id: &str,
        path: &str,
        local_path: &Path,
        auth: &AuthContext,
    ) -> Result<Value, HubError> {
        let url = self.file_endpoint(space_id, "upload", path, false)?;
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| HubError::LocalFile {
                path: local_path.display().to_string(),
                message: e.to_string(),
            })?;
        let file_name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("file")
            .to_owned();
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        self.send(self.http.post(url).multipart(form), auth).await?;
        Ok(Value::Null)
    }

    pub async fn delete_file(
        &self,
        space_id: &str,
        path: &str,
        auth: &AuthContext,
    ) -> Result<Value, HubError> {
        let url = self.file_endpoint(space_id, "delete", path, false)?;
        self.send(self.http.delete(url), auth).await?;
        Ok(Value::Null)
    }

    // ── Plumbing ─────────────────────────────────────────────────────

    fn endpoint(&self, segments: &[&str]) -> Result<Url, HubError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| HubError::InvalidRequest("base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `spaces/<owner>/<name>/<tail..>`
    fn space_endpoint(&self, space_id: &str, tail: &[&str]) -> Result<Url, HubError> {
        let mut segments = vec!["spaces"];
        segments.extend(checked_segments(space_id, "space id")?);
        segments.extend_from_slice(tail);
        self.endpoint(&segments)
    }

    fn file_endpoint(
        &self,
        space_id: &str,
        action: &str,
        path: &str,
        allow_root: bool,
    ) -> Result<Url, HubError> {
        let mut segments = vec!["spaces"];
        segments.extend(checked_segments(space_id, "space id")?);
        segments.push(action);
        if !(allow_root && path.is_empty()) {
            segments.extend(checked_segments(path, "file path")?);
        }
        self.endpoint(&segments)
    }

    async fn get_json(&self, url: Url, auth: &AuthContext) -> Result<Value, HubError> {
        let response = self.send(self.http.request(Method::GET, url), auth).await?;
        self.read_json(response).await
    }

    /// Attach credentials, send, and turn non-2xx statuses into errors that
    /// keep the API's response body.
    async fn send(&self, request: RequestBuilder, auth: &AuthContext) -> Result<Response, HubError> {
        let request = match auth.token() {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        };
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(status = status.as_u16(), error = %e, "failed to read error body");
                String::new()
            }
        };
        debug!(status = status.as_u16(), "Hugging Face API returned an error status");
        Err(HubError::from_status(status.as_u16(), body))
    }

    /// Empty bodies decode to `null`.
    async fn read_json(&self, response: Response) -> Result<Value, HubError> {
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| HubError::Decode(e.to_string()))
    }

    async fn read_text(&self, response: Response) -> Result<Value, HubError> {
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        Ok(Value::String(text))
    }

    fn transport_error(&self, err: reqwest::Error) -> HubError {
        if err.is_timeout() {
            HubError::Timeout(self.timeout)
        } else {
            HubError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl SpacesBackend for HubClient {
    async fn execute(&self, request: &SpaceRequest, auth: &AuthContext) -> Result<Value, HubError> {
        let operation = request.operation();
        if operation.access() == Access::Token && !auth.has_token() {
            return Err(HubError::AuthRequired);
        }
        debug!(operation = operation.name(), "calling Hugging Face API");

        match request {
            SpaceRequest::ListMySpaces => self.list_my_spaces(auth).await,
            SpaceRequest::ListByUser { user } => self.list_by_owner(user, auth).await,
            SpaceRequest::Get { space_id } => self.get_space(space_id, auth).await,
            SpaceRequest::Create(space) => self.create_space(space, auth).await,
            SpaceRequest::Duplicate {
                source_space_id,
                space,
            } => self.duplicate_space(source_space_id, space, auth).await,
            SpaceRequest::Update { space_id, changes } => {
                self.update_space(space_id, changes, auth).await
            }
            SpaceRequest::Delete { space_id } => self.delete_space(space_id, auth).await,
            SpaceRequest::ListHardware => self.hardware(auth).await,
            SpaceRequest::ListFiles { space_id, path } => self.list_files(space_id, path, auth).await,
            SpaceRequest::ReadFile { space_id, path } => self.read_file(space_id, path, auth).await,
            SpaceRequest::WriteTextFile {
                space_id,
                path,
                content,
            } => self.write_text_file(space_id, path, content, auth).await,
            SpaceRequest::UploadFile {
                space_id,
                path,
                local_path,
            } => self.upload_file(space_id, path, local_path, auth).await,
            SpaceRequest::DeleteFile { space_id, path } => {
                self.delete_file(space_id, path, auth).await
            }
            SpaceRequest::Logs { space_id, count } => self.logs(space_id, *count, auth).await,
            SpaceRequest::Restart { space_id, hardware } => {
                self.restart_space(space_id, hardware.as_deref(), auth).await
            }
            SpaceRequest::Pause { space_id } => self.pause_space(space_id, auth).await,
            SpaceRequest::Search { query } => self.search(query, auth).await,
            SpaceRequest::Rename { space_id, new_name } => {
                self.rename_space(space_id, new_name, auth).await
            }
            SpaceRequest::ListRuntimes => self.runtimes(auth).await,
        }
    }
}

fn creation_payload(space: &NewSpace) -> Value {
    let mut payload = json!({
        "name": space.name,
        "private": space.private.unwrap_or(false),
        "sdk": non_empty(space.sdk.as_deref()).unwrap_or("gradio"),
        "hardware": non_empty(space.hardware.as_deref()).unwrap_or("cpu-basic"),
    });
    if let Some(org) = non_empty(space.organization.as_deref()) {
        payload["organization"] = json!(org);
    }
    payload
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Split an id or path on `/`, refusing segments that would escape or
/// collapse the endpoint path. Each segment is percent-encoded by `Url`.
fn checked_segments<'a>(value: &'a str, what: &str) -> Result<Vec<&'a str>, HubError> {
    path_segments(value).ok_or_else(|| HubError::InvalidRequest(format!("invalid {what}: '{value}'")))
}
