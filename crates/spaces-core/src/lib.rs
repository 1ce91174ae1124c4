pub mod backend;
pub mod catalog;
pub mod errors;
pub mod ids;
pub mod request;
pub mod security;

pub use backend::SpacesBackend;
pub use catalog::{Access, Catalog, FieldSpec, FieldType, Operation, OperationDescriptor, ToolDefinition};
pub use errors::{ArgumentError, FieldProblem, HubError};
pub use ids::SessionId;
pub use request::{NewSpace, SpaceRequest, SpaceUpdate};
pub use security::{ApiToken, AuthContext};
