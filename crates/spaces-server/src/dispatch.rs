//! Operation dispatch: resolve, validate, authorize, invoke, wrap.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use spaces_core::{
    ArgumentError, AuthContext, Catalog, FieldProblem, HubError, SpaceRequest, SpacesBackend,
};

use crate::rpc::{self, RpcError};

/// Classified dispatch failure.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown operation: {name}")]
    UnknownOperation { name: String },
    #[error("Invalid arguments for {operation}: {source}")]
    InvalidArguments {
        operation: &'static str,
        #[source]
        source: ArgumentError,
    },
    #[error("{operation} requires a Hugging Face API token")]
    AuthRequired { operation: &'static str },
    #[error("{operation} failed: {source}")]
    BackendFailure {
        operation: &'static str,
        #[source]
        source: HubError,
    },
    #[error("{operation} timed out after {}s", .after.as_secs())]
    BackendTimeout {
        operation: &'static str,
        after: Duration,
    },
}

impl DispatchError {
    /// Machine-readable kind carried in `data.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownOperation { .. } => "UNKNOWN_OPERATION",
            Self::InvalidArguments { .. } => "INVALID_ARGUMENTS",
            Self::AuthRequired { .. } => "AUTH_REQUIRED",
            Self::BackendFailure { .. } => "BACKEND_FAILURE",
            Self::BackendTimeout { .. } => "BACKEND_TIMEOUT",
        }
    }

    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::UnknownOperation { .. } | Self::InvalidArguments { .. } => rpc::INVALID_PARAMS,
            Self::AuthRequired { .. } => rpc::AUTH_REQUIRED,
            Self::BackendFailure { .. } => rpc::BACKEND_FAILURE,
            Self::BackendTimeout { .. } => rpc::BACKEND_TIMEOUT,
        }
    }

    pub fn operation(&self) -> &str {
        match self {
            Self::UnknownOperation { name } => name,
            Self::InvalidArguments { operation, .. }
            | Self::AuthRequired { operation }
            | Self::BackendFailure { operation, .. }
            | Self::BackendTimeout { operation, .. } => operation,
        }
    }

    /// `{kind, operation, fields?, status?}`
    pub fn details(&self) -> Value {
        let mut data = json!({
            "kind": self.kind(),
            "operation": self.operation(),
        });
        match self {
            Self::InvalidArguments { source, .. } => {
                data["fields"] = json!(source.fields());
            }
            Self::BackendFailure { source, .. } => {
                if let Some(status) = source.status() {
                    data["status"] = json!(status);
                }
            }
            _ => {}
        }
        data
    }

    pub fn to_rpc_error(&self) -> RpcError {
        RpcError {
            code: self.rpc_code(),
            message: self.to_string(),
            data: Some(self.details()),
        }
    }

    fn from_backend(operation: &'static str, source: HubError) -> Self {
        match source {
            HubError::AuthRequired => Self::AuthRequired { operation },
            HubError::Timeout(after) => Self::BackendTimeout { operation, after },
            // The upload source lives on this host; the API never saw the call.
            HubError::LocalFile { message, .. } => Self::InvalidArguments {
                operation,
                source: ArgumentError::Fields(vec![FieldProblem::Unreadable {
                    field: "filePath".to_owned(),
                    reason: message,
                }]),
            },
            source => Self::BackendFailure { operation, source },
        }
    }
}

/// Routes named operations to the backend with validation and a deadline.
pub struct Dispatcher {
    catalog: Catalog,
    backend: Arc<dyn SpacesBackend>,
    backend_timeout: Duration,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn SpacesBackend>, backend_timeout: Duration) -> Self {
        Self {
            catalog: Catalog::new(),
            backend,
            backend_timeout,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Run one operation. The error is logged before it is returned.
    pub async fn dispatch(
        &self,
        name: &str,
        args: &Value,
        auth: &AuthContext,
    ) -> Result<Value, DispatchError> {
        let result = self.run(name, args, auth).await;
        if let Err(err) = &result {
            warn!(operation = name, kind = err.kind(), error = %err, "operation failed");
        }
        result
    }

    async fn run(&self, name: &str, args: &Value, auth: &AuthContext) -> Result<Value, DispatchError> {
        let descriptor = self
            .catalog
            .get(name)
            .ok_or_else(|| DispatchError::UnknownOperation {
                name: name.to_owned(),
            })?;
        let operation = descriptor.name;

        descriptor
            .validate(args)
            .map_err(|source| DispatchError::InvalidArguments { operation, source })?;

        if descriptor.requires_token() && !auth.has_token() {
            return Err(DispatchError::AuthRequired { operation });
        }

        let request = SpaceRequest::from_arguments(descriptor.operation, args)
            .map_err(|source| DispatchError::InvalidArguments { operation, source })?;

        debug!(operation, "invoking backend");
        let value = tokio::time::timeout(self.backend_timeout, self.backend.execute(&request, auth))
            .await
            .map_err(|_| DispatchError::BackendTimeout {
                operation,
                after: self.backend_timeout,
            })?
            .map_err(|source| DispatchError::from_backend(operation, source))?;

        Ok(request.shape_result(value))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use spaces_core::ApiToken;

    /// Backend double that counts calls and returns a canned response.
    pub(crate) struct StubBackend {
        pub calls: AtomicUsize,
        response: Result<Value, HubError>,
        stall: bool,
    }

    impl StubBackend {
        pub fn returning(value: Value) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Ok(value),
                stall: false,
            }
        }

        pub fn failing(err: HubError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Err(err),
                stall: false,
            }
        }

        pub fn stalled() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Ok(Value::Null),
                stall: true,
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpacesBackend for StubBackend {
        async fn execute(&self, _request: &SpaceRequest, _auth: &AuthContext) -> Result<Value, HubError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                std::future::pending::<()>().await;
            }
            self.response.clone()
        }
    }

    fn dispatcher(backend: &Arc<StubBackend>) -> Dispatcher {
        Dispatcher::new(backend.clone(), Duration::from_secs(30))
    }

    fn token() -> AuthContext {
        AuthContext::with_token(ApiToken::parse("hf_test").unwrap())
    }

    #[tokio::test]
    async fn unknown_operation_never_reaches_backend() {
        let backend = Arc::new(StubBackend::returning(json!({})));
        let err = dispatcher(&backend)
            .dispatch("reboot-universe", &json!({}), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownOperation { .. }));
        assert_eq!(err.rpc_code(), rpc::INVALID_PARAMS);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn get_space_wraps_domain_object() {
        let space = json!({"id": "user/demo", "owner": "user", "private": false});
        let backend = Arc::new(StubBackend::returning(space.clone()));
        let result = dispatcher(&backend)
            .dispatch("get-space", &json!({"spaceId": "user/demo"}), &AuthContext::anonymous())
            .await
            .unwrap();
        assert_eq!(result, json!({ "space": space }));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn create_without_name_is_rejected_before_backend() {
        let backend = Arc::new(StubBackend::returning(json!({})));
        let err = dispatcher(&backend)
            .dispatch("create-space", &json!({}), &token())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_ARGUMENTS");
        assert_eq!(err.details()["fields"], json!(["name"]));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn delete_without_token_needs_auth() {
        let backend = Arc::new(StubBackend::returning(Value::Null));
        let err = dispatcher(&backend)
            .dispatch("delete-space", &json!({"spaceId": "user/demo"}), &AuthContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::AuthRequired { operation: "delete-space" }));
        assert_eq!(err.rpc_code(), rpc::AUTH_REQUIRED);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn validation_precedes_auth_check() {
        let backend = Arc::new(StubBackend::returning(Value::Null));
        let err = dispatcher(&backend)
            .dispatch("delete-space", &json!({}), &AuthContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_ARGUMENTS");
    }

    #[tokio::test]
    async fn traversal_in_space_id_is_invalid_arguments() {
        let backend = Arc::new(StubBackend::returning(json!({})));
        let err = dispatcher(&backend)
            .dispatch("get-space", &json!({"spaceId": "../admin"}), &AuthContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_ARGUMENTS");
        assert_eq!(err.rpc_code(), rpc::INVALID_PARAMS);
        assert_eq!(err.details()["fields"], json!(["spaceId"]));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn traversal_in_file_path_is_refused_by_real_client() {
        let client = spaces_hub::HubClient::new(&spaces_hub::HubConfig {
            base_url: "http://127.0.0.1:9/api".into(),
            ..Default::default()
        })
        .unwrap();
        let dispatcher = Dispatcher::new(Arc::new(client), Duration::from_secs(5));
        let err = dispatcher
            .dispatch(
                "delete-space-file",
                &json!({"spaceId": "user/demo", "path": "a/../../secrets"}),
                &token(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_ARGUMENTS");
        assert_eq!(err.details()["fields"], json!(["path"]));
    }

    #[tokio::test]
    async fn unreadable_upload_source_names_file_path() {
        let backend = Arc::new(StubBackend::failing(HubError::LocalFile {
            path: "/nonexistent/a.bin".into(),
            message: "No such file or directory".into(),
        }));
        let err = dispatcher(&backend)
            .dispatch(
                "upload-file",
                &json!({"spaceId": "user/demo", "path": "a.bin", "filePath": "/nonexistent/a.bin"}),
                &token(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_ARGUMENTS");
        assert_eq!(err.details()["fields"], json!(["filePath"]));
        assert!(err.to_string().contains("No such file"));
    }

    #[tokio::test]
    async fn backend_failure_keeps_status_and_detail() {
        let backend = Arc::new(StubBackend::failing(HubError::from_status(
            404,
            "Repository not found".into(),
        )));
        let err = dispatcher(&backend)
            .dispatch("get-space", &json!({"spaceId": "user/missing"}), &AuthContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "BACKEND_FAILURE");
        assert_eq!(err.details()["status"], 404);
        assert_eq!(err.details()["operation"], "get-space");
        assert!(err.to_string().contains("Repository not found"));
    }

    #[tokio::test]
    async fn error_message_never_contains_token() {
        let backend = Arc::new(StubBackend::failing(HubError::from_status(
            401,
            "Invalid credentials".into(),
        )));
        let err = dispatcher(&backend)
            .dispatch("pause-space", &json!({"spaceId": "user/demo"}), &token())
            .await
            .unwrap_err();
        let rendered = serde_json::to_string(&err.to_rpc_error()).unwrap();
        assert!(!rendered.contains("hf_test"));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backend_times_out() {
        let backend = Arc::new(StubBackend::stalled());
        let dispatcher = Dispatcher::new(backend.clone(), Duration::from_secs(5));
        let err = dispatcher
            .dispatch("get-space-hardware", &json!({}), &AuthContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::BackendTimeout { .. }));
        assert_eq!(err.rpc_code(), rpc::BACKEND_TIMEOUT);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn http_timeout_is_classified_as_timeout() {
        let backend = Arc::new(StubBackend::failing(HubError::Timeout(Duration::from_secs(30))));
        let err = dispatcher(&backend)
            .dispatch("get-space-runtimes", &json!({}), &AuthContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "BACKEND_TIMEOUT");
    }

    #[tokio::test]
    async fn rpc_error_envelope_shape() {
        let backend = Arc::new(StubBackend::returning(Value::Null));
        let err = dispatcher(&backend)
            .dispatch("create-space", &json!({"name": 5}), &token())
            .await
            .unwrap_err();
        let rpc_error = err.to_rpc_error();
        assert_eq!(rpc_error.code, rpc::INVALID_PARAMS);
        let data = rpc_error.data.unwrap();
        assert_eq!(data["kind"], "INVALID_ARGUMENTS");
        assert_eq!(data["operation"], "create-space");
        assert_eq!(data["fields"], json!(["name"]));
    }
}
