use async_trait::async_trait;
use serde_json::Value;

use crate::errors::HubError;
use crate::request::SpaceRequest;
use crate::security::AuthContext;

/// Executes space requests against the Hugging Face API.
///
/// Implementations return the raw domain value (a space object, a file
/// listing, log text, ...); result wrapping happens in
/// [`SpaceRequest::shape_result`]. `Value::Null` is fine for calls whose
/// response carries nothing useful.
#[async_trait]
pub trait SpacesBackend: Send + Sync {
    async fn execute(&self, request: &SpaceRequest, auth: &AuthContext) -> Result<Value, HubError>;
}
