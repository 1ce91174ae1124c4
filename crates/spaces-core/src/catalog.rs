//! Static catalog of callable Spaces operations.
//!
//! Every operation is a variant of [`Operation`]; its name, description,
//! access class and argument schema come from exhaustive matches, so a new
//! variant cannot be added without a descriptor. [`Catalog`] indexes the
//! descriptors by name in registration order.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::errors::{json_type_name, ArgumentError, FieldProblem};

/// Primitive type tag of an argument field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Boolean,
    Number,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Number => "number",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Number => value.is_number(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named argument of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldType,
    pub required: bool,
    pub description: &'static str,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// Whether an operation may run without a credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Public,
    Token,
}

/// Every operation the server exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    ListMySpaces,
    GetSpacesByUser,
    GetSpace,
    CreateSpace,
    DuplicateSpace,
    UpdateSpace,
    DeleteSpace,
    GetSpaceHardware,
    ListSpaceFiles,
    GetSpaceFile,
    UploadTextFile,
    UploadFile,
    DeleteSpaceFile,
    GetSpaceLogs,
    RestartSpace,
    PauseSpace,
    SearchSpaces,
    RenameSpace,
    GetSpaceRuntimes,
}

const SPACE_ID_DESC: &str = "The ID of the space (format: 'username/space-name')";
const SDK_DESC: &str = "SDK to use for the space (e.g., 'gradio', 'streamlit', 'static', 'docker')";
const HARDWARE_DESC: &str = "Hardware type for the space (e.g., 'cpu-basic', 'gpu-t4')";
const ORG_DESC: &str = "Optional organization to create the space under";

const SPACE_ID: FieldSpec = FieldSpec::required("spaceId", FieldType::String, SPACE_ID_DESC);

const NO_FIELDS: &[FieldSpec] = &[];
const SPACE_ONLY: &[FieldSpec] = &[SPACE_ID];

const USER_FIELDS: &[FieldSpec] = &[FieldSpec::required(
    "user",
    FieldType::String,
    "Username or organization to list spaces for",
)];

const CREATE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("name", FieldType::String, "Name for the new space"),
    FieldSpec::optional("organization", FieldType::String, ORG_DESC),
    FieldSpec::optional(
        "private",
        FieldType::Boolean,
        "Whether the space should be private (default: false)",
    ),
    FieldSpec::optional("sdk", FieldType::String, SDK_DESC),
    FieldSpec::optional("hardwareType", FieldType::String, HARDWARE_DESC),
];

const DUPLICATE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required(
        "sourceSpaceId",
        FieldType::String,
        "ID of the space to duplicate (format: 'username/space-name')",
    ),
    FieldSpec::required("name", FieldType::String, "Name for the new space"),
    FieldSpec::optional("organization", FieldType::String, ORG_DESC),
    FieldSpec::optional(
        "private",
        FieldType::Boolean,
        "Whether the space should be private (default: false)",
    ),
    FieldSpec::optional("sdk", FieldType::String, SDK_DESC),
    FieldSpec::optional("hardwareType", FieldType::String, HARDWARE_DESC),
];

const UPDATE_FIELDS: &[FieldSpec] = &[
    SPACE_ID,
    FieldSpec::optional("private", FieldType::Boolean, "Whether the space should be private"),
    FieldSpec::optional("title", FieldType::String, "Title of the space"),
    FieldSpec::optional("emoji", FieldType::String, "Emoji for the space"),
    FieldSpec::optional("colorFrom", FieldType::String, "Starting color for gradient"),
    FieldSpec::optional("colorTo", FieldType::String, "Ending color for gradient"),
    FieldSpec::optional("pinned", FieldType::Boolean, "Whether the space should be pinned"),
    FieldSpec::optional("sdk", FieldType::String, "SDK to use for the space"),
    FieldSpec::optional("hardwareType", FieldType::String, "Hardware type for the space"),
];

const LIST_FILES_FIELDS: &[FieldSpec] = &[
    SPACE_ID,
    FieldSpec::optional(
        "path",
        FieldType::String,
        "Path within the space to list files for (default: root)",
    ),
];

const FILE_FIELDS: &[FieldSpec] = &[
    SPACE_ID,
    FieldSpec::required("path", FieldType::String, "Path to the file within the space"),
];

const UPLOAD_TEXT_FIELDS: &[FieldSpec] = &[
    SPACE_ID,
    FieldSpec::required(
        "path",
        FieldType::String,
        "Path where the file should be created/updated within the space",
    ),
    FieldSpec::required("content", FieldType::String, "Text content to upload"),
];

const UPLOAD_FILE_FIELDS: &[FieldSpec] = &[
    SPACE_ID,
    FieldSpec::required(
        "path",
        FieldType::String,
        "Path where the file should be created/updated within the space",
    ),
    FieldSpec::required("filePath", FieldType::String, "Path to the local file to upload"),
];

const LOGS_FIELDS: &[FieldSpec] = &[
    SPACE_ID,
    FieldSpec::optional(
        "count",
        FieldType::Number,
        "Number of log lines to retrieve (default: 100)",
    ),
];

const RESTART_FIELDS: &[FieldSpec] = &[
    SPACE_ID,
    FieldSpec::optional(
        "hardwareType",
        FieldType::String,
        "Optional new hardware type to use when restarting",
    ),
];

const SEARCH_FIELDS: &[FieldSpec] = &[FieldSpec::required("query", FieldType::String, "Search query")];

const RENAME_FIELDS: &[FieldSpec] = &[
    SPACE_ID,
    FieldSpec::required("newName", FieldType::String, "New name for the space"),
];

impl Operation {
    /// Registration order of the catalog.
    pub const ALL: [Operation; 19] = [
        Operation::ListMySpaces,
        Operation::GetSpacesByUser,
        Operation::GetSpace,
        Operation::CreateSpace,
        Operation::DuplicateSpace,
        Operation::UpdateSpace,
        Operation::DeleteSpace,
        Operation::GetSpaceHardware,
        Operation::ListSpaceFiles,
        Operation::GetSpaceFile,
        Operation::UploadTextFile,
        Operation::UploadFile,
        Operation::DeleteSpaceFile,
        Operation::GetSpaceLogs,
        Operation::RestartSpace,
        Operation::PauseSpace,
        Operation::SearchSpaces,
        Operation::RenameSpace,
        Operation::GetSpaceRuntimes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ListMySpaces => "list-my-spaces",
            Self::GetSpacesByUser => "get-spaces-by-user",
            Self::GetSpace => "get-space",
            Self::CreateSpace => "create-space",
            Self::DuplicateSpace => "duplicate-space",
            Self::UpdateSpace => "update-space",
            Self::DeleteSpace => "delete-space",
            Self::GetSpaceHardware => "get-space-hardware",
            Self::ListSpaceFiles => "list-space-files",
            Self::GetSpaceFile => "get-space-file",
            Self::UploadTextFile => "upload-text-file",
            Self::UploadFile => "upload-file",
            Self::DeleteSpaceFile => "delete-space-file",
            Self::GetSpaceLogs => "get-space-logs",
            Self::RestartSpace => "restart-space",
            Self::PauseSpace => "pause-space",
            Self::SearchSpaces => "search-spaces",
            Self::RenameSpace => "rename-space",
            Self::GetSpaceRuntimes => "get-space-runtimes",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ListMySpaces => "List all Hugging Face spaces for the authenticated user",
            Self::GetSpacesByUser => "List Hugging Face spaces by a specific user or organization",
            Self::GetSpace => "Get details about a specific Hugging Face space",
            Self::CreateSpace => "Create a new Hugging Face space",
            Self::DuplicateSpace => "Duplicate an existing Hugging Face space",
            Self::UpdateSpace => "Update metadata of a Hugging Face space",
            Self::DeleteSpace => "Delete a Hugging Face space",
            Self::GetSpaceHardware => "Get available hardware options for Hugging Face spaces",
            Self::ListSpaceFiles => "List files in a Hugging Face space",
            Self::GetSpaceFile => "Get the content of a file from a Hugging Face space",
            Self::UploadTextFile => "Upload text content to a file in a Hugging Face space",
            Self::UploadFile => "Upload a file from the local filesystem to a Hugging Face space",
            Self::DeleteSpaceFile => "Delete a file from a Hugging Face space",
            Self::GetSpaceLogs => "Get logs for a Hugging Face space",
            Self::RestartSpace => "Restart a Hugging Face space",
            Self::PauseSpace => "Pause a running Hugging Face space",
            Self::SearchSpaces => "Search for Hugging Face spaces",
            Self::RenameSpace => "Rename a Hugging Face space",
            Self::GetSpaceRuntimes => "Get available runtime options for Hugging Face spaces",
        }
    }

    pub fn access(self) -> Access {
        match self {
            Self::GetSpacesByUser
            | Self::GetSpace
            | Self::GetSpaceHardware
            | Self::SearchSpaces
            | Self::GetSpaceRuntimes => Access::Public,
            _ => Access::Token,
        }
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Self::ListMySpaces | Self::GetSpaceHardware | Self::GetSpaceRuntimes => NO_FIELDS,
            Self::GetSpacesByUser => USER_FIELDS,
            Self::GetSpace | Self::DeleteSpace | Self::PauseSpace => SPACE_ONLY,
            Self::CreateSpace => CREATE_FIELDS,
            Self::DuplicateSpace => DUPLICATE_FIELDS,
            Self::UpdateSpace => UPDATE_FIELDS,
            Self::ListSpaceFiles => LIST_FILES_FIELDS,
            Self::GetSpaceFile | Self::DeleteSpaceFile => FILE_FIELDS,
            Self::UploadTextFile => UPLOAD_TEXT_FIELDS,
            Self::UploadFile => UPLOAD_FILE_FIELDS,
            Self::GetSpaceLogs => LOGS_FIELDS,
            Self::RestartSpace => RESTART_FIELDS,
            Self::SearchSpaces => SEARCH_FIELDS,
            Self::RenameSpace => RENAME_FIELDS,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn descriptor(self) -> OperationDescriptor {
        OperationDescriptor {
            operation: self,
            name: self.name(),
            description: self.description(),
            access: self.access(),
            fields: self.fields(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable catalog entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub operation: Operation,
    pub name: &'static str,
    pub description: &'static str,
    pub access: Access,
    pub fields: &'static [FieldSpec],
}

impl OperationDescriptor {
    pub fn requires_token(&self) -> bool {
        self.access == Access::Token
    }

    /// JSON Schema advertised to clients.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in self.fields {
            properties.insert(
                field.name.to_owned(),
                json!({ "type": field.kind.as_str(), "description": field.description }),
            );
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_owned(),
            description: self.description.to_owned(),
            input_schema: self.input_schema(),
        }
    }

    /// Check `args` against the schema, reporting every problem at once.
    ///
    /// `null` arguments count as an empty object, and a `null` field counts
    /// as absent. Undeclared fields are rejected rather than dropped.
    pub fn validate(&self, args: &Value) -> Result<(), ArgumentError> {
        let empty = Map::new();
        let object = match args {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => return Err(ArgumentError::NotAnObject(json_type_name(other))),
        };

        let mut problems = Vec::new();
        for field in self.fields {
            match object.get(field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        problems.push(FieldProblem::Missing(field.name.to_owned()));
                    }
                }
                Some(value) if !field.kind.accepts(value) => {
                    problems.push(FieldProblem::WrongType {
                        field: field.name.to_owned(),
                        expected: field.kind,
                        found: json_type_name(value),
                    });
                }
                Some(_) => {}
            }
        }

        let mut unexpected: Vec<&String> = object
            .keys()
            .filter(|key| !self.fields.iter().any(|f| f.name == key.as_str()))
            .collect();
        unexpected.sort();
        problems.extend(unexpected.into_iter().map(|k| FieldProblem::Unexpected(k.clone())));

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ArgumentError::Fields(problems))
        }
    }
}

/// Wire form of a catalog entry in `tools/list`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Name-indexed, ordered set of operation descriptors.
pub struct Catalog {
    entries: Vec<OperationDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        let entries: Vec<OperationDescriptor> =
            Operation::ALL.iter().map(|op| op.descriptor()).collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name, i))
            .collect::<HashMap<_, _>>();
        debug_assert_eq!(index.len(), entries.len(), "duplicate operation name");
        Self { entries, index }
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> &[OperationDescriptor] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&OperationDescriptor> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries.iter().map(OperationDescriptor::to_definition).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// A full, valid argument object for `op`.
    fn sample_args(op: Operation) -> Map<String, Value> {
        op.fields()
            .iter()
            .map(|f| {
                let value = match f.kind {
                    FieldType::String => json!("user/demo"),
                    FieldType::Boolean => json!(true),
                    FieldType::Number => json!(10),
                };
                (f.name.to_owned(), value)
            })
            .collect()
    }

    #[test]
    fn catalog_has_every_operation_in_order() {
        let catalog = Catalog::new();
        assert_eq!(catalog.len(), 19);
        let names: Vec<&str> = catalog.list().iter().map(|d| d.name).collect();
        assert_eq!(names.first(), Some(&"list-my-spaces"));
        assert_eq!(names.last(), Some(&"get-space-runtimes"));
        for (descriptor, op) in catalog.list().iter().zip(Operation::ALL) {
            assert_eq!(descriptor.operation, op);
        }
    }

    #[test]
    fn listing_is_stable() {
        let catalog = Catalog::new();
        let first: Vec<&str> = catalog.list().iter().map(|d| d.name).collect();
        let second: Vec<&str> = catalog.list().iter().map(|d| d.name).collect();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_value(catalog.definitions()).unwrap(),
            serde_json::to_value(catalog.definitions()).unwrap()
        );
    }

    #[test]
    fn names_round_trip_and_are_unique() {
        let mut seen = HashSet::new();
        for op in Operation::ALL {
            assert!(seen.insert(op.name()), "duplicate {}", op.name());
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
        assert_eq!(Operation::from_name("drop-database"), None);
    }

    #[test]
    fn field_names_unique_per_operation() {
        for op in Operation::ALL {
            let mut seen = HashSet::new();
            for field in op.fields() {
                assert!(seen.insert(field.name), "{op}: duplicate field {}", field.name);
            }
        }
    }

    #[test]
    fn public_operations() {
        let public: Vec<&str> = Operation::ALL
            .into_iter()
            .filter(|op| op.access() == Access::Public)
            .map(Operation::name)
            .collect();
        assert_eq!(
            public,
            vec![
                "get-spaces-by-user",
                "get-space",
                "get-space-hardware",
                "search-spaces",
                "get-space-runtimes"
            ]
        );
        assert!(Operation::DeleteSpace.descriptor().requires_token());
    }

    #[test]
    fn input_schema_shape() {
        let schema = Operation::CreateSpace.descriptor().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["name"]));
        assert_eq!(schema["properties"]["private"]["type"], "boolean");
        assert_eq!(schema["properties"]["name"]["type"], "string");

        let empty = Operation::ListMySpaces.descriptor().input_schema();
        assert_eq!(empty["required"], json!([]));
        assert!(empty["properties"].as_object().unwrap().is_empty());
    }

    #[test]
    fn definition_uses_input_schema_key() {
        let def = Operation::GetSpaceLogs.descriptor().to_definition();
        let wire = serde_json::to_value(&def).unwrap();
        assert_eq!(wire["name"], "get-space-logs");
        assert_eq!(wire["inputSchema"]["properties"]["count"]["type"], "number");
    }

    #[test]
    fn valid_arguments_pass() {
        for op in Operation::ALL {
            let args = Value::Object(sample_args(op));
            assert!(op.descriptor().validate(&args).is_ok(), "{op} rejected its own sample");
        }
    }

    #[test]
    fn omitting_any_required_field_names_it() {
        for op in Operation::ALL {
            for field in op.fields().iter().filter(|f| f.required) {
                let mut args = sample_args(op);
                args.remove(field.name);
                let err = op.descriptor().validate(&Value::Object(args)).unwrap_err();
                assert_eq!(err.fields(), vec![field.name], "{op} without {}", field.name);
            }
        }
    }

    #[test]
    fn null_arguments_are_empty_object() {
        let descriptor = Operation::GetSpaceHardware.descriptor();
        assert!(descriptor.validate(&Value::Null).is_ok());

        let err = Operation::CreateSpace.descriptor().validate(&Value::Null).unwrap_err();
        assert_eq!(err.fields(), vec!["name"]);
    }

    #[test]
    fn null_field_counts_as_absent() {
        let descriptor = Operation::CreateSpace.descriptor();
        assert!(descriptor.validate(&json!({"name": "demo", "sdk": null})).is_ok());
        let err = descriptor.validate(&json!({"name": null})).unwrap_err();
        assert_eq!(err, ArgumentError::Fields(vec![FieldProblem::Missing("name".into())]));
    }

    #[test]
    fn wrong_type_is_reported() {
        let err = Operation::CreateSpace
            .descriptor()
            .validate(&json!({"name": "demo", "private": "yes"}))
            .unwrap_err();
        assert_eq!(
            err,
            ArgumentError::Fields(vec![FieldProblem::WrongType {
                field: "private".into(),
                expected: FieldType::Boolean,
                found: "string",
            }])
        );

        let err = Operation::GetSpaceLogs
            .descriptor()
            .validate(&json!({"spaceId": "a/b", "count": "20"}))
            .unwrap_err();
        assert_eq!(err.fields(), vec!["count"]);
    }

    #[test]
    fn undeclared_fields_are_rejected() {
        let err = Operation::GetSpace
            .descriptor()
            .validate(&json!({"spaceId": "a/b", "zeta": 1, "alpha": true}))
            .unwrap_err();
        assert_eq!(err.fields(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn non_object_arguments_rejected() {
        let err = Operation::GetSpace.descriptor().validate(&json!(["a/b"])).unwrap_err();
        assert_eq!(err, ArgumentError::NotAnObject("array"));
    }

    #[test]
    fn all_problems_reported_together() {
        let err = Operation::DuplicateSpace
            .descriptor()
            .validate(&json!({"private": 1}))
            .unwrap_err();
        assert_eq!(err.fields(), vec!["sourceSpaceId", "name", "private"]);
    }
}
